use std::time::Duration;

use log::{debug, info, warn};
use parking_lot::Mutex;

use setdealer_game::{Display, PlayerId};

/// Shows the game by writing it to the log.
///
/// Countdown updates arrive many times a second, so only a change in the
/// whole number of seconds left is logged.
#[derive(Default)]
pub struct LogDisplay {
    last_second: Mutex<Option<u64>>,
}

impl LogDisplay {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Display for LogDisplay {
    fn set_countdown(&self, remaining: Duration, warn: bool) {
        let secs = remaining.as_secs();
        {
            let mut last = self.last_second.lock();
            if *last == Some(secs) {
                return;
            }
            *last = Some(secs);
        }
        if warn {
            warn!("{}s left in the round", secs);
        } else if secs % 10 == 0 {
            info!("{}s left in the round", secs);
        } else {
            debug!("{}s left in the round", secs);
        }
    }

    fn set_score(&self, player: PlayerId, score: u32) {
        info!("player {} now has {} points", player, score);
    }

    fn set_freeze(&self, player: PlayerId, remaining: Duration) {
        if remaining == Duration::from_millis(0) {
            debug!("player {} is free", player);
        } else {
            debug!("player {} frozen for {}s", player, remaining.as_secs());
        }
    }

    fn announce_winners(&self, winners: &[PlayerId]) {
        let names: Vec<String> = winners.iter().map(|p| p.to_string()).collect();
        info!("game over; winners: {}", names.join(", "));
    }
}
