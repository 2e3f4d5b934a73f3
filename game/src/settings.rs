use std::default::Default;
use std::time::Duration;

use serde::Deserialize;
use snafu::ensure;

use crate::error::{self, Result};

/// Read-only game configuration, supplied once at startup.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Number of slots on the table.
    pub table_size: usize,
    /// Number of cards in the full deck.
    pub deck_size: usize,
    /// Number of cards in one selection; also the arity of each card feature.
    pub feature_size: usize,
    /// Number of features printed on each card.
    pub features: u32,
    /// Length of a round before the table is forcibly reshuffled.
    pub turn_timeout_millis: u64,
    /// Remaining time below which the countdown is shown as a warning.
    pub turn_timeout_warning_millis: u64,
    /// Freeze applied to a player after an accepted selection.
    pub point_freeze_millis: u64,
    /// Freeze applied to a player after a rejected selection.
    pub penalty_freeze_millis: u64,
    /// How often the dealer wakes to refill the table.
    pub table_delay_millis: u64,
    /// How often the dealer wakes once the countdown is in the warning phase.
    pub warning_delay_millis: u64,
    /// Fixes the dealer's shuffling, for reproducible games.
    pub seed: Option<u64>,
    /// Log the valid combinations on the table after every deal.
    pub hints: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            table_size: 12,
            deck_size: 81,
            feature_size: 3,
            features: 4,
            turn_timeout_millis: 60_000,
            turn_timeout_warning_millis: 5_000,
            point_freeze_millis: 1_000,
            penalty_freeze_millis: 3_000,
            table_delay_millis: 100,
            warning_delay_millis: 10,
            seed: None,
            hints: false,
        }
    }
}

impl Settings {
    /// Check the relationships between the fields that the game relies on.
    pub fn validate(&self) -> Result<()> {
        ensure!(self.feature_size > 0, error::EmptySelection);
        ensure!(
            self.feature_size <= self.table_size,
            error::SelectionTooLarge {
                feature_size: self.feature_size,
                table_size: self.table_size,
            }
        );
        let expected = (self.feature_size as u64).checked_pow(self.features);
        ensure!(
            expected == Some(self.deck_size as u64),
            error::DeckSizeMismatch {
                deck_size: self.deck_size,
                feature_size: self.feature_size,
                features: self.features,
            }
        );
        Ok(())
    }

    pub fn turn_timeout(&self) -> Duration {
        Duration::from_millis(self.turn_timeout_millis)
    }

    pub fn turn_timeout_warning(&self) -> Duration {
        Duration::from_millis(self.turn_timeout_warning_millis)
    }

    pub fn point_freeze(&self) -> Duration {
        Duration::from_millis(self.point_freeze_millis)
    }

    pub fn penalty_freeze(&self) -> Duration {
        Duration::from_millis(self.penalty_freeze_millis)
    }

    pub fn table_delay(&self) -> Duration {
        Duration::from_millis(self.table_delay_millis)
    }

    pub fn warning_delay(&self) -> Duration {
        Duration::from_millis(self.warning_delay_millis)
    }

    // A player re-checks its selection this often before submitting it...
    pub(crate) fn submit_backoff(&self) -> Duration {
        Duration::from_millis((self.point_freeze_millis / 10).max(1))
    }

    // ...and gives up once this much time has passed.
    pub(crate) fn submit_patience(&self) -> Duration {
        self.point_freeze().max(self.submit_backoff())
    }
}
