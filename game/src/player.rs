//! A seat at the table and the thread that plays it.
use std::collections::VecDeque;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, select, Receiver, Sender};
use log::{debug, error, info};
use parking_lot::{Condvar, Mutex};
use snafu::ResultExt;

use crate::board::{Board, Slots};
use crate::display::Display;
use crate::error::{self, Result};
use crate::model::{Candidate, CardId, PlayerId, Resolution, SlotId};
use crate::settings::Settings;
use crate::shutdown::Listener;
use Phase::*;

/// Where a player is in its selection cycle.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Phase {
    /// Taking input and toggling tokens.
    Selecting,
    /// A full selection has been submitted; waiting on the dealer.
    AwaitingResolution,
    /// Frozen after an accepted selection.
    Rewarded,
    /// Frozen after a rejected selection.
    Penalized,
    /// The player thread has exited, or is about to.
    Stopped,
}

pub struct Player {
    id: PlayerId,
    human: bool,
    settings: Arc<Settings>,
    board: Arc<Board>,
    display: Arc<dyn Display>,
    state: Mutex<State>,
    // Signalled when the dealer publishes a resolution, when the board
    // changes, and on stop. Only the player thread waits on it.
    resolved: Condvar,
    // Signalled when there may be room for more input, and on stop. Only the
    // actor thread waits on it.
    capacity: Condvar,
    input_tx: Sender<SlotId>,
    input_rx: Receiver<SlotId>,
}

// The mutex-synchronized part of a player.
struct State {
    phase: Phase,
    /// Slots this player holds a token on, oldest first.
    pending: VecDeque<SlotId>,
    resolution: Option<Resolution>,
    score: u32,
    /// Cards on the table as of the last board change notification.
    table_cards: usize,
    stopping: bool,
}

impl Player {
    pub fn new(
        id: PlayerId,
        human: bool,
        settings: Arc<Settings>,
        board: Arc<Board>,
        display: Arc<dyn Display>,
    ) -> Self {
        let (input_tx, input_rx) = bounded(settings.feature_size);
        let state = State {
            phase: Selecting,
            pending: VecDeque::with_capacity(settings.feature_size),
            resolution: None,
            score: 0,
            table_cards: 0,
            stopping: false,
        };
        Player {
            id,
            human,
            settings,
            board,
            display,
            state: Mutex::new(state),
            resolved: Condvar::new(),
            capacity: Condvar::new(),
            input_tx,
            input_rx,
        }
    }

    pub fn id(&self) -> PlayerId {
        self.id
    }

    pub fn is_human(&self) -> bool {
        self.human
    }

    pub fn score(&self) -> u32 {
        self.state.lock().score
    }

    pub fn phase(&self) -> Phase {
        self.state.lock().phase
    }

    /// The slots this player currently believes it has a token on.
    pub fn pending_slots(&self) -> Vec<SlotId> {
        self.state.lock().pending.iter().copied().collect()
    }

    /// Deliver an input event: the player chose the slot with this index.
    ///
    /// Out-of-range slots are ignored, as is anything chosen while the player
    /// is waiting on the dealer or frozen, or while earlier input is still
    /// queued up to the selection size.
    pub fn slot_chosen(&self, slot: usize) {
        if slot >= self.settings.table_size {
            debug!("player {} chose nonexistent slot {}", self.id, slot);
            return;
        }
        if self.state.lock().phase != Selecting {
            return;
        }
        if self.input_tx.try_send(SlotId(slot)).is_err() {
            debug!("player {} input queue full; dropping slot {}", self.id, slot);
        }
    }

    /// Publish the dealer's verdict on this player's candidate.
    pub fn resolve(&self, resolution: Resolution) {
        let mut state = self.state.lock();
        if state.phase != AwaitingResolution || state.resolution.is_some() {
            error!(
                "player {} got resolution {:?} while {:?}",
                self.id, resolution, state.phase
            );
            return;
        }
        state.resolution = Some(resolution);
        self.resolved.notify_all();
    }

    /// Tell the player that the dealer put cards on or took them off the
    /// table.
    pub fn board_changed(&self) {
        let slots = self.board.lock();
        let mut state = self.state.lock();
        state.table_cards = slots.count_cards();
        let id = self.id;
        state.pending.retain(|&s| slots.has_token(id, s));
        self.resolved.notify_all();
        self.capacity.notify_all();
    }

    /// Ask the player, and its actor if it has one, to stop.
    ///
    /// Any wait in progress returns promptly.
    pub fn terminate(&self) {
        let mut state = self.state.lock();
        state.stopping = true;
        self.resolved.notify_all();
        self.capacity.notify_all();
    }

    pub(crate) fn table_size(&self) -> usize {
        self.settings.table_size
    }

    /// Block the caller until the player can take more input.
    ///
    /// Returns `false` once the player is stopping.
    pub(crate) fn wait_for_room(&self) -> bool {
        let mut state = self.state.lock();
        loop {
            if state.stopping {
                return false;
            }
            if state.phase == Selecting
                && state.table_cards > 0
                && state.pending.len() < self.settings.feature_size
                && self.input_rx.is_empty()
            {
                return true;
            }
            self.capacity.wait(&mut state);
        }
    }

    fn stopping(&self) -> bool {
        self.state.lock().stopping
    }

    // The player thread's main loop.
    fn run(&self, actor: Option<JoinHandle<()>>, stop: Listener) {
        info!("player {} starting", self.id);
        loop {
            if stop.stopping() || self.stopping() {
                break;
            }
            select! {
                recv(self.input_rx) -> slot => match slot {
                    Ok(slot) => self.handle(slot),
                    Err(_) => break,
                },
                recv(stop.stopped()) -> _ => break,
            }
        }
        self.terminate();
        self.state.lock().phase = Stopped;
        if let Some(actor) = actor {
            if actor.join().is_err() {
                error!("computer {} panicked", self.id);
            }
        }
        info!("player {} terminated", self.id);
    }

    fn handle(&self, slot: SlotId) {
        if self.toggle(slot) {
            if self.submit() {
                if let Some(resolution) = self.await_resolution() {
                    self.apply(resolution);
                }
            } else {
                debug!("player {} abandoned a stale selection", self.id);
                self.prune();
            }
            // anything that arrived meanwhile was chosen while frozen.
            while self.input_rx.try_recv().is_ok() {}
        }
        let _state = self.state.lock();
        self.capacity.notify_all();
    }

    // Toggle this player's token on a slot. Returns whether that completed a
    // selection.
    pub(crate) fn toggle(&self, slot: SlotId) -> bool {
        let mut slots = self.board.lock();
        let mut state = self.state.lock();
        let id = self.id;
        state.pending.retain(|&s| slots.has_token(id, s));
        if slots.card_at(slot).is_none() {
            return false;
        }
        if let Some(i) = state.pending.iter().position(|&s| s == slot) {
            slots.remove_token(id, slot);
            state.pending.remove(i);
            return false;
        }
        if state.pending.len() >= self.settings.feature_size {
            return false;
        }
        slots.place_token(id, slot);
        state.pending.push_back(slot);
        state.pending.len() == self.settings.feature_size
    }

    // Confirm the selection is still on the table and hand it to the dealer.
    //
    // A slot may be empty for a moment while the dealer is refilling, so this
    // re-checks with a short backoff. It gives up when a slot holds a card
    // without our token, or when it runs out of patience.
    pub(crate) fn submit(&self) -> bool {
        let give_up = Instant::now() + self.settings.submit_patience();
        loop {
            let candidate = {
                let slots = self.board.lock();
                let mut state = self.state.lock();
                match snapshot(&slots, self.id, &state.pending) {
                    Snapshot::Ready(cards) => {
                        state.phase = AwaitingResolution;
                        state.resolution = None;
                        Some(Candidate {
                            cards,
                            slots: state.pending.iter().copied().collect(),
                            player: self.id,
                        })
                    }
                    Snapshot::Replaced => return false,
                    Snapshot::Empty => None,
                }
            };
            if let Some(candidate) = candidate {
                self.board.submit(candidate);
                return true;
            }
            let now = Instant::now();
            if now >= give_up {
                return false;
            }
            let mut state = self.state.lock();
            if state.stopping {
                return false;
            }
            let backoff = self.settings.submit_backoff().min(give_up - now);
            self.resolved.wait_for(&mut state, backoff);
        }
    }

    // Sleep until the dealer publishes a resolution, or the player is
    // stopped.
    pub(crate) fn await_resolution(&self) -> Option<Resolution> {
        let mut state = self.state.lock();
        while state.resolution.is_none() && !state.stopping {
            self.resolved.wait(&mut state);
        }
        let resolution = state.resolution.take();
        if resolution.is_none() {
            state.phase = Selecting;
        }
        resolution
    }

    fn apply(&self, resolution: Resolution) {
        debug!("player {} resolution: {:?}", self.id, resolution);
        match resolution {
            Resolution::Accepted => {
                self.clear_tokens(Rewarded);
                self.freeze(self.settings.point_freeze());
                let score = {
                    let mut state = self.state.lock();
                    state.score += 1;
                    state.score
                };
                self.display.set_score(self.id, score);
            }
            Resolution::Rejected => {
                self.clear_tokens(Penalized);
                self.freeze(self.settings.penalty_freeze());
            }
            Resolution::Stale => self.clear_tokens(Selecting),
        }
        self.state.lock().phase = Selecting;
    }

    fn clear_tokens(&self, phase: Phase) {
        let mut slots = self.board.lock();
        let mut state = self.state.lock();
        for slot in state.pending.drain(..) {
            slots.remove_token(self.id, slot);
        }
        state.phase = phase;
    }

    fn prune(&self) {
        let slots = self.board.lock();
        let mut state = self.state.lock();
        let id = self.id;
        state.pending.retain(|&s| slots.has_token(id, s));
        state.phase = Selecting;
    }

    // Pause for the given time, showing the remaining freeze once a second.
    // Returns early if the player is stopped.
    fn freeze(&self, duration: Duration) {
        let until = Instant::now() + duration;
        loop {
            let now = Instant::now();
            if now >= until {
                break;
            }
            let remaining = until - now;
            self.display.set_freeze(self.id, remaining);
            let tick = now + remaining.min(Duration::from_secs(1));
            let mut state = self.state.lock();
            // board changes wake us too; only the tick moves the display on.
            while !state.stopping && Instant::now() < tick {
                self.resolved.wait_until(&mut state, tick);
            }
            if state.stopping {
                break;
            }
        }
        self.display.set_freeze(self.id, Duration::from_millis(0));
    }
}

/// Start the thread for a player, which joins the actor thread before it
/// exits.
pub fn spawn(
    player: Arc<Player>,
    actor: Option<JoinHandle<()>>,
    stop: Listener,
) -> Result<JoinHandle<()>> {
    let name = format!("player-{}", player.id);
    thread::Builder::new()
        .name(name.clone())
        .spawn(move || player.run(actor, stop))
        .context(error::Spawn { name })
}

enum Snapshot {
    Ready(Vec<CardId>),
    Empty,
    Replaced,
}

fn snapshot(slots: &Slots, id: PlayerId, pending: &VecDeque<SlotId>) -> Snapshot {
    let mut cards = Vec::with_capacity(pending.len());
    for &slot in pending {
        match slots.card_at(slot) {
            None => return Snapshot::Empty,
            Some(_) if !slots.has_token(id, slot) => return Snapshot::Replaced,
            Some(card) => cards.push(card),
        }
    }
    Snapshot::Ready(cards)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shutdown;

    #[derive(Default)]
    struct Freezes(Mutex<Vec<Duration>>);

    impl Display for Freezes {
        fn set_countdown(&self, _: Duration, _: bool) {}
        fn set_score(&self, _: PlayerId, _: u32) {}
        fn set_freeze(&self, _: PlayerId, remaining: Duration) {
            self.0.lock().push(remaining);
        }
        fn announce_winners(&self, _: &[PlayerId]) {}
    }

    fn setup() -> (Arc<Board>, Arc<Player>) {
        setup_with(Arc::new(Freezes::default()))
    }

    fn setup_with(display: Arc<Freezes>) -> (Arc<Board>, Arc<Player>) {
        let settings = Arc::new(Settings {
            point_freeze_millis: 10,
            penalty_freeze_millis: 10,
            ..Settings::default()
        });
        let board = Arc::new(Board::new(settings.table_size, settings.deck_size));
        for i in 0..12 {
            board.place_card(CardId(i), SlotId(i));
        }
        let player = Arc::new(Player::new(
            PlayerId(0),
            true,
            settings,
            board.clone(),
            display,
        ));
        player.board_changed();
        (board, player)
    }

    #[test]
    fn toggling_twice_removes_the_token() {
        let (board, player) = setup();
        assert!(!player.toggle(SlotId(4)));
        assert!(board.has_token(PlayerId(0), SlotId(4)));
        assert_eq!(player.pending_slots(), vec![SlotId(4)]);
        assert!(!player.toggle(SlotId(4)));
        assert!(!board.has_token(PlayerId(0), SlotId(4)));
        assert!(player.pending_slots().is_empty());
    }

    #[test]
    fn empty_slots_are_ignored() {
        let (board, player) = setup();
        board.remove_card(SlotId(3));
        assert!(!player.toggle(SlotId(3)));
        assert!(player.pending_slots().is_empty());
    }

    #[test]
    fn third_token_completes_a_selection() {
        let (_, player) = setup();
        assert!(!player.toggle(SlotId(0)));
        assert!(!player.toggle(SlotId(1)));
        assert!(player.toggle(SlotId(2)));
    }

    #[test]
    fn submit_snapshots_the_selected_cards() {
        let (board, player) = setup();
        for s in &[5, 7, 9] {
            player.toggle(SlotId(*s));
        }
        assert!(player.submit());
        assert_eq!(player.phase(), AwaitingResolution);
        let candidate = board.next_candidate().expect("a candidate");
        assert_eq!(candidate.player, PlayerId(0));
        assert_eq!(candidate.cards, vec![CardId(5), CardId(7), CardId(9)]);
        assert_eq!(candidate.slots, vec![SlotId(5), SlotId(7), SlotId(9)]);
    }

    #[test]
    fn submit_gives_up_when_a_card_was_replaced() {
        let (board, player) = setup();
        for s in &[0, 1, 2] {
            player.toggle(SlotId(*s));
        }
        board.remove_card(SlotId(1));
        board.place_card(CardId(40), SlotId(1));
        assert!(!player.submit());
        assert!(board.next_candidate().is_none());
    }

    #[test]
    fn submit_waits_out_an_empty_slot_then_gives_up() {
        let (board, player) = setup();
        for s in &[0, 1, 2] {
            player.toggle(SlotId(*s));
        }
        board.remove_card(SlotId(2));
        let started = Instant::now();
        assert!(!player.submit());
        // patience is the point freeze, 10ms here
        assert!(started.elapsed() >= Duration::from_millis(10));
        player.prune();
        assert_eq!(player.pending_slots(), vec![SlotId(0), SlotId(1)]);
        assert_eq!(player.phase(), Selecting);
    }

    #[test]
    fn board_change_forgets_cleared_tokens() {
        let (board, player) = setup();
        player.toggle(SlotId(6));
        player.toggle(SlotId(8));
        board.remove_card(SlotId(6));
        player.board_changed();
        assert_eq!(player.pending_slots(), vec![SlotId(8)]);
    }

    #[test]
    fn rejection_clears_tokens_and_keeps_score() {
        let (board, player) = setup();
        for s in &[0, 1, 2] {
            player.toggle(SlotId(*s));
        }
        assert!(player.submit());
        player.resolve(Resolution::Rejected);
        let resolution = player.await_resolution().expect("a resolution");
        player.apply(resolution);
        assert_eq!(player.score(), 0);
        assert_eq!(player.phase(), Selecting);
        assert!(player.pending_slots().is_empty());
        assert_eq!(board.count_cards(), 12);
        assert!(!board.has_token(PlayerId(0), SlotId(0)));
    }

    #[test]
    fn acceptance_scores_one_point() {
        let (board, player) = setup();
        for s in &[0, 1, 2] {
            player.toggle(SlotId(*s));
        }
        assert!(player.submit());
        for s in 0..3 {
            board.remove_card(SlotId(s));
        }
        player.resolve(Resolution::Accepted);
        let resolution = player.await_resolution().expect("a resolution");
        player.apply(resolution);
        assert_eq!(player.score(), 1);
        assert!(player.pending_slots().is_empty());
    }

    #[test]
    fn board_changes_do_not_tick_the_freeze() {
        let display = Arc::new(Freezes::default());
        let (_, player) = setup_with(display.clone());
        let frozen = {
            let player = player.clone();
            thread::spawn(move || player.freeze(Duration::from_millis(150)))
        };
        let until = Instant::now() + Duration::from_millis(100);
        while Instant::now() < until {
            player.board_changed();
            thread::sleep(Duration::from_millis(5));
        }
        frozen.join().expect("freeze to finish");
        // one update for the only tick under a second, then the clear
        let shown = display.0.lock();
        assert_eq!(shown.len(), 2);
        assert!(shown[0] > Duration::from_millis(100));
        assert_eq!(shown[1], Duration::from_millis(0));
    }

    #[test]
    fn termination_cuts_a_freeze_short() {
        let display = Arc::new(Freezes::default());
        let (_, player) = setup_with(display.clone());
        let frozen = {
            let player = player.clone();
            thread::spawn(move || player.freeze(Duration::from_secs(30)))
        };
        thread::sleep(Duration::from_millis(20));
        let started = Instant::now();
        player.terminate();
        frozen.join().expect("freeze to finish");
        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(display.0.lock().last(), Some(&Duration::from_millis(0)));
    }

    #[test]
    fn resolution_outside_of_waiting_is_ignored() {
        let (_, player) = setup();
        player.resolve(Resolution::Accepted);
        assert_eq!(player.phase(), Selecting);
        assert!(player.state.lock().resolution.is_none());
    }

    #[test]
    fn termination_releases_a_waiting_player() {
        let (_, player) = setup();
        for s in &[0, 1, 2] {
            player.toggle(SlotId(*s));
        }
        assert!(player.submit());
        let waiter = {
            let player = player.clone();
            thread::spawn(move || player.await_resolution())
        };
        thread::sleep(Duration::from_millis(20));
        player.terminate();
        assert_eq!(waiter.join().expect("waiter to finish"), None);
    }

    #[test]
    fn thread_stops_when_the_listener_does() {
        let (_, player) = setup();
        let guard = shutdown::guard("test");
        let handle = spawn(player.clone(), None, guard.listener()).expect("spawn");
        player.slot_chosen(0);
        player.slot_chosen(99);
        drop(guard);
        handle.join().expect("player thread to finish");
        assert_eq!(player.phase(), Stopped);
    }
}
