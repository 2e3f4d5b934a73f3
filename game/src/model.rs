use std::fmt;

use serde::{Deserialize, Serialize};

/// A card, identified by its index into the full deck.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize)]
pub struct CardId(pub usize);

/// A fixed position on the table which holds zero or one card.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize)]
pub struct SlotId(pub usize);

/// A seat at the table, numbered from zero.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize)]
pub struct PlayerId(pub usize);

// Auxillary macro for printing the newtypes above as their bare index.

macro_rules! derive_display {
    ($ty:ident) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

derive_display!(CardId);
derive_display!(SlotId);
derive_display!(PlayerId);

/// A complete selection waiting for the dealer's verdict.
///
/// The cards are the ones the player saw on its token slots at the moment of
/// submission, `cards[i]` in `slots[i]`. By the time the dealer gets to it,
/// the table may have changed, so the dealer must check again.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct Candidate {
    pub cards: Vec<CardId>,
    pub slots: Vec<SlotId>,
    pub player: PlayerId,
}

/// The dealer's verdict on a submitted candidate.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Resolution {
    /// The cards formed a valid combination and have been retired.
    Accepted,
    /// The cards did not form a valid combination; they stay on the table.
    Rejected,
    /// At least one card left the table before the candidate was checked.
    Stale,
}
