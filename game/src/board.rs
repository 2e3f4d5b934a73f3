//! The shared table: which card sits in which slot, who has a token where,
//! and the queue of selections waiting for the dealer.
use std::collections::BTreeSet;
use std::time::Duration;

use crossbeam_channel::{select, unbounded, Receiver, Sender};
use log::debug;
use parking_lot::{Mutex, MutexGuard};

use crate::model::{Candidate, CardId, PlayerId, SlotId};
use crate::shutdown::Listener;

pub struct Board {
    slots: Mutex<Slots>,
    pending_tx: Sender<Candidate>,
    pending_rx: Receiver<Candidate>,
}

impl Board {
    /// Create an empty board.
    pub fn new(table_size: usize, deck_size: usize) -> Self {
        let (pending_tx, pending_rx) = unbounded();
        Board {
            slots: Mutex::new(Slots::new(table_size, deck_size)),
            pending_tx,
            pending_rx,
        }
    }

    /// Wait for exclusive access to the slot, card and token state.
    ///
    /// Use this when several steps must see a consistent table; the helpers
    /// below each take the lock for a single step.
    pub fn lock(&self) -> MutexGuard<'_, Slots> {
        self.slots.lock()
    }

    pub fn place_card(&self, card: CardId, slot: SlotId) {
        self.lock().place_card(card, slot)
    }

    pub fn remove_card(&self, slot: SlotId) -> Option<(CardId, BTreeSet<PlayerId>)> {
        self.lock().remove_card(slot)
    }

    pub fn place_token(&self, player: PlayerId, slot: SlotId) -> bool {
        self.lock().place_token(player, slot)
    }

    pub fn remove_token(&self, player: PlayerId, slot: SlotId) -> bool {
        self.lock().remove_token(player, slot)
    }

    pub fn count_cards(&self) -> usize {
        self.lock().count_cards()
    }

    pub fn card_at(&self, slot: SlotId) -> Option<CardId> {
        self.lock().card_at(slot)
    }

    pub fn slot_of(&self, card: CardId) -> Option<SlotId> {
        self.lock().slot_of(card)
    }

    pub fn has_token(&self, player: PlayerId, slot: SlotId) -> bool {
        self.lock().has_token(player, slot)
    }

    /// Append a candidate to the pending queue.
    ///
    /// This does not take the slot lock; the queue synchronizes itself.
    pub fn submit(&self, candidate: Candidate) {
        debug!(
            "player {} submitted cards {:?}",
            candidate.player, candidate.cards
        );
        // we hold a receiver ourselves, so the channel never disconnects.
        let _ = self.pending_tx.send(candidate);
    }

    /// Take the oldest pending candidate, if there is one.
    pub fn next_candidate(&self) -> Option<Candidate> {
        self.pending_rx.try_recv().ok()
    }

    /// Number of candidates waiting for the dealer.
    pub fn pending(&self) -> usize {
        self.pending_rx.len()
    }

    /// Block until a candidate arrives, the timeout elapses, or the listener
    /// is told to stop.
    pub fn wait_candidate(&self, timeout: Duration, stop: &Listener) -> Option<Candidate> {
        select! {
            recv(self.pending_rx) -> candidate => candidate.ok(),
            recv(stop.stopped()) -> _ => None,
            default(timeout) => None,
        }
    }
}

/// The lock-protected part of the board.
pub struct Slots {
    slot_to_card: Vec<Option<CardId>>,
    card_to_slot: Vec<Option<SlotId>>,
    tokens: Vec<BTreeSet<PlayerId>>,
}

impl Slots {
    fn new(table_size: usize, deck_size: usize) -> Self {
        Slots {
            slot_to_card: vec![None; table_size],
            card_to_slot: vec![None; deck_size],
            tokens: vec![BTreeSet::new(); table_size],
        }
    }

    pub fn table_size(&self) -> usize {
        self.slot_to_card.len()
    }

    /// Put a card into an empty slot.
    ///
    /// Panics if the slot is taken or the card is already on the table, since
    /// only the dealer places cards and it always checks first.
    pub fn place_card(&mut self, card: CardId, slot: SlotId) {
        assert!(self.slot_to_card[slot.0].is_none(), "slot {} is taken", slot);
        assert!(self.card_to_slot[card.0].is_none(), "card {} is placed", card);
        self.slot_to_card[slot.0] = Some(card);
        self.card_to_slot[card.0] = Some(slot);
    }

    /// Take the card out of a slot, along with every token on it.
    ///
    /// Returns the card and the players who lost a token, or `None` if the
    /// slot was already empty.
    pub fn remove_card(&mut self, slot: SlotId) -> Option<(CardId, BTreeSet<PlayerId>)> {
        let card = self.slot_to_card.get_mut(slot.0)?.take()?;
        self.card_to_slot[card.0] = None;
        let tokens = std::mem::take(&mut self.tokens[slot.0]);
        Some((card, tokens))
    }

    /// Put a player's token on an occupied slot. Returns whether it was added.
    pub fn place_token(&mut self, player: PlayerId, slot: SlotId) -> bool {
        if self.card_at(slot).is_none() {
            return false;
        }
        self.tokens[slot.0].insert(player)
    }

    /// Take a player's token off a slot. Returns whether it was there.
    pub fn remove_token(&mut self, player: PlayerId, slot: SlotId) -> bool {
        match self.tokens.get_mut(slot.0) {
            Some(tokens) => tokens.remove(&player),
            None => false,
        }
    }

    pub fn has_token(&self, player: PlayerId, slot: SlotId) -> bool {
        self.tokens
            .get(slot.0)
            .map_or(false, |tokens| tokens.contains(&player))
    }

    pub fn tokens(&self, slot: SlotId) -> Option<&BTreeSet<PlayerId>> {
        self.tokens.get(slot.0)
    }

    pub fn card_at(&self, slot: SlotId) -> Option<CardId> {
        self.slot_to_card.get(slot.0).copied().flatten()
    }

    pub fn slot_of(&self, card: CardId) -> Option<SlotId> {
        self.card_to_slot.get(card.0).copied().flatten()
    }

    pub fn count_cards(&self) -> usize {
        self.slot_to_card.iter().filter(|c| c.is_some()).count()
    }

    /// The cards currently on the table, in slot order.
    pub fn cards(&self) -> Vec<CardId> {
        self.slot_to_card.iter().filter_map(|c| *c).collect()
    }

    pub fn empty_slots(&self) -> Vec<SlotId> {
        self.slot_to_card
            .iter()
            .enumerate()
            .filter(|(_, c)| c.is_none())
            .map(|(i, _)| SlotId(i))
            .collect()
    }

    pub fn occupied_slots(&self) -> Vec<SlotId> {
        self.slot_to_card
            .iter()
            .enumerate()
            .filter(|(_, c)| c.is_some())
            .map(|(i, _)| SlotId(i))
            .collect()
    }

    /// Whether the table still looks the way the candidate saw it: each card
    /// in the slot it was chosen from, under the player's token.
    ///
    /// Tokens go away with their card, so a card taken off and dealt again,
    /// even into the same slot, no longer counts.
    pub fn still_holds(&self, candidate: &Candidate) -> bool {
        candidate.cards.len() == candidate.slots.len()
            && candidate
                .cards
                .iter()
                .zip(&candidate.slots)
                .all(|(&card, &slot)| {
                    self.card_at(slot) == Some(card) && self.has_token(candidate.player, slot)
                })
    }
}
