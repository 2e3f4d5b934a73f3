use std::time::Duration;

use crate::model::PlayerId;

/// Receives everything the game wants to show.
///
/// The game only ever calls into the display; it never reads anything back,
/// so an implementation is free to render, log, record, or drop the calls.
pub trait Display: Send + Sync {
    /// Time left in the round, and whether it is low enough to warn about.
    fn set_countdown(&self, remaining: Duration, warn: bool);

    fn set_score(&self, player: PlayerId, score: u32);

    /// Time left on a player's freeze; zero clears the indicator.
    fn set_freeze(&self, player: PlayerId, remaining: Duration);

    fn announce_winners(&self, winners: &[PlayerId]);
}
