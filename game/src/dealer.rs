//! The dealer thread: deals, times rounds, and judges every selection.
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

use log::{debug, error, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::board::Board;
use crate::display::Display;
use crate::model::{Candidate, CardId, PlayerId, Resolution};
use crate::player::Player;
use crate::rules::Validator;
use crate::settings::Settings;
use crate::shutdown::{self, Guard, Listener};

/// What a finished game looks like.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Outcome {
    /// Rounds started, including one cut short by termination.
    pub rounds: usize,
    /// Selections accepted over the whole game.
    pub accepted: usize,
    /// Every player's final score, by id.
    pub scores: Vec<(PlayerId, u32)>,
    /// The players tied at the highest score.
    pub winners: Vec<PlayerId>,
}

pub struct Dealer {
    settings: Arc<Settings>,
    board: Arc<Board>,
    players: Vec<Arc<Player>>,
    validator: Arc<dyn Validator>,
    display: Arc<dyn Display>,
    /// Cards not yet retired by an accepted selection, on the table or not.
    deck: Vec<CardId>,
    retired: usize,
    reshuffle_time: Instant,
    rounds: usize,
    accepted: usize,
    rng: StdRng,
    stop: Listener,
    // Dropped once the game is over, which stops the player threads.
    players_guard: Option<Guard>,
}

impl Dealer {
    pub fn new(
        settings: Arc<Settings>,
        board: Arc<Board>,
        players: Vec<Arc<Player>>,
        validator: Arc<dyn Validator>,
        display: Arc<dyn Display>,
        stop: Listener,
    ) -> Self {
        let rng = match settings.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let deck = (0..settings.deck_size).map(CardId).collect();
        Dealer {
            reshuffle_time: Instant::now() + settings.turn_timeout(),
            settings,
            board,
            players,
            validator,
            display,
            deck,
            retired: 0,
            rounds: 0,
            accepted: 0,
            rng,
            stop,
            players_guard: Some(shutdown::guard("players")),
        }
    }

    /// A listener that fires once the game is over.
    pub fn players_listener(&self) -> Listener {
        match &self.players_guard {
            Some(guard) => guard.listener(),
            // only reachable after `run`, which consumes the dealer.
            None => unreachable!("players guard taken before the game ended"),
        }
    }

    /// Play rounds until the game is over, then stop and join the player
    /// threads and announce the winners.
    pub fn run(mut self, player_threads: Vec<JoinHandle<()>>) -> Outcome {
        info!("dealer starting");
        while !self.should_finish() {
            self.place_cards_on_table();
            self.timer_loop();
            self.update_timer_display(false);
            self.remove_all_cards_from_table();
        }
        self.stop_players(player_threads);
        let outcome = self.announce_winners();
        info!("dealer terminated");
        outcome
    }

    /// Cards in play: not yet retired, whether on the table or not.
    pub fn deck(&self) -> &[CardId] {
        &self.deck
    }

    /// Cards in play which are not on the table.
    pub fn undealt(&self) -> usize {
        let slots = self.board.lock();
        self.deck
            .iter()
            .filter(|&&c| slots.slot_of(c).is_none())
            .count()
    }

    /// Cards permanently removed by accepted selections.
    pub fn retired(&self) -> usize {
        self.retired
    }

    // The inner loop of a round, which runs until the countdown runs out.
    fn timer_loop(&mut self) {
        self.rounds += 1;
        info!(
            "round {} starts with {} cards on the table",
            self.rounds,
            self.board.count_cards()
        );
        self.update_timer_display(true);
        while !self.stop.stopping() && Instant::now() < self.reshuffle_time {
            let woken_by = self.sleep_until_woken_or_timeout();
            self.update_timer_display(false);
            let accepted = self.resolve_candidates(woken_by);
            self.place_cards_on_table();
            if accepted > 0 && self.no_combinations_left() {
                info!("no combinations left after round {}", self.rounds);
                break;
            }
        }
    }

    fn should_finish(&self) -> bool {
        self.stop.stopping() || self.no_combinations_left()
    }

    fn no_combinations_left(&self) -> bool {
        self.validator.count_valid(&self.deck, 1) == 0
    }

    /// Judge every candidate waiting in the queue, oldest first. Returns how
    /// many were accepted.
    pub fn remove_cards_from_table(&mut self) -> usize {
        self.resolve_candidates(None)
    }

    fn resolve_candidates(&mut self, first: Option<Candidate>) -> usize {
        let mut accepted = 0;
        let mut next = first.or_else(|| self.board.next_candidate());
        while let Some(candidate) = next {
            if self.resolve(candidate) {
                accepted += 1;
            }
            next = self.board.next_candidate();
        }
        accepted
    }

    fn resolve(&mut self, candidate: Candidate) -> bool {
        let player = match self.players.get(candidate.player.0) {
            Some(player) => player.clone(),
            None => {
                error!("candidate from unknown player {}", candidate.player);
                return false;
            }
        };
        if !self.board.lock().still_holds(&candidate) {
            debug!(
                "discarding stale cards {:?} from player {}",
                candidate.cards, candidate.player
            );
            player.resolve(Resolution::Stale);
            return false;
        }
        if !self.validator.is_valid(&candidate.cards) {
            debug!(
                "player {} submitted invalid cards {:?}",
                candidate.player, candidate.cards
            );
            player.resolve(Resolution::Rejected);
            return false;
        }
        info!(
            "player {} found valid cards {:?}",
            candidate.player, candidate.cards
        );
        {
            let mut slots = self.board.lock();
            for &card in &candidate.cards {
                if let Some(slot) = slots.slot_of(card) {
                    slots.remove_card(slot);
                }
            }
        }
        self.deck.retain(|c| !candidate.cards.contains(c));
        self.retired += candidate.cards.len();
        self.accepted += 1;
        player.resolve(Resolution::Accepted);
        // a successful selection buys the table more time.
        self.update_timer_display(true);
        self.notify_players();
        true
    }

    /// Fill empty slots with random cards from the deck, as far as it goes.
    pub fn place_cards_on_table(&mut self) {
        let placed = {
            let mut slots = self.board.lock();
            let mut undealt: Vec<CardId> = self
                .deck
                .iter()
                .copied()
                .filter(|&c| slots.slot_of(c).is_none())
                .collect();
            let mut empty = slots.empty_slots();
            let mut placed = 0;
            while !empty.is_empty() && !undealt.is_empty() {
                let card = undealt.swap_remove(self.rng.gen_range(0, undealt.len()));
                let slot = empty.swap_remove(self.rng.gen_range(0, empty.len()));
                slots.place_card(card, slot);
                placed += 1;
            }
            if !empty.is_empty() {
                debug!("deck exhausted with {} empty slots", empty.len());
            }
            placed
        };
        if placed == 0 {
            return;
        }
        debug!("dealt {} cards", placed);
        if self.settings.hints {
            let cards = self.board.lock().cards();
            for hint in self.validator.find_valid(&cards, 0) {
                info!("hint: {:?}", hint);
            }
        }
        self.notify_players();
    }

    /// Take every card off the table. The cards stay in the deck.
    ///
    /// Candidates still in the queue were chosen from the old table, so their
    /// players are released with a stale verdict.
    pub fn remove_all_cards_from_table(&mut self) {
        {
            let mut slots = self.board.lock();
            for slot in slots.occupied_slots() {
                slots.remove_card(slot);
            }
        }
        debug!("cleared the table");
        while let Some(candidate) = self.board.next_candidate() {
            match self.players.get(candidate.player.0) {
                Some(player) => {
                    debug!(
                        "discarding cards {:?} from player {} with the table",
                        candidate.cards, candidate.player
                    );
                    player.resolve(Resolution::Stale);
                }
                None => error!("candidate from unknown player {}", candidate.player),
            }
        }
        self.notify_players();
    }

    // Sleep until a candidate shows up, or for a short while; shorter still
    // once the countdown is in the warning phase.
    fn sleep_until_woken_or_timeout(&self) -> Option<Candidate> {
        let remaining = self.reshuffle_time.saturating_duration_since(Instant::now());
        let delay = if remaining > self.settings.turn_timeout_warning() {
            self.settings.table_delay()
        } else {
            self.settings.warning_delay()
        };
        self.board.wait_candidate(delay.min(remaining), &self.stop)
    }

    fn update_timer_display(&mut self, reset: bool) {
        let now = Instant::now();
        if reset {
            self.reshuffle_time = now + self.settings.turn_timeout();
        }
        let remaining = self.reshuffle_time.saturating_duration_since(now);
        let warn = remaining <= self.settings.turn_timeout_warning();
        self.display.set_countdown(remaining, warn);
    }

    fn notify_players(&self) {
        for player in &self.players {
            player.board_changed();
        }
    }

    fn stop_players(&mut self, player_threads: Vec<JoinHandle<()>>) {
        self.players_guard.take();
        for player in &self.players {
            player.terminate();
        }
        for thread in player_threads {
            if thread.join().is_err() {
                error!("a player thread panicked");
            }
        }
    }

    fn announce_winners(&self) -> Outcome {
        let scores: Vec<(PlayerId, u32)> =
            self.players.iter().map(|p| (p.id(), p.score())).collect();
        let best = scores.iter().map(|&(_, s)| s).max().unwrap_or(0);
        let winners: Vec<PlayerId> = scores
            .iter()
            .filter(|&&(_, s)| s == best)
            .map(|&(id, _)| id)
            .collect();
        info!("winners: {:?} with {} points", winners, best);
        self.display.announce_winners(&winners);
        Outcome {
            rounds: self.rounds,
            accepted: self.accepted,
            scores,
            winners,
        }
    }
}

impl Drop for Dealer {
    // However the dealer goes away, nobody may be left waiting on it.
    fn drop(&mut self) {
        self.players_guard.take();
        for player in &self.players {
            player.terminate();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SlotId;
    use crate::player::Phase;
    use crate::rules::Rules;
    use parking_lot::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct Countdowns(Mutex<Vec<Duration>>);

    impl Display for Countdowns {
        fn set_countdown(&self, remaining: Duration, _: bool) {
            self.0.lock().push(remaining);
        }
        fn set_score(&self, _: PlayerId, _: u32) {}
        fn set_freeze(&self, _: PlayerId, _: Duration) {}
        fn announce_winners(&self, _: &[PlayerId]) {}
    }

    struct Fixture {
        board: Arc<Board>,
        players: Vec<Arc<Player>>,
        display: Arc<Countdowns>,
        dealer: Dealer,
        _guard: Guard,
    }

    fn fixture() -> Fixture {
        let settings = Arc::new(Settings {
            seed: Some(7),
            point_freeze_millis: 10,
            penalty_freeze_millis: 10,
            ..Settings::default()
        });
        let board = Arc::new(Board::new(settings.table_size, settings.deck_size));
        let display = Arc::new(Countdowns::default());
        let players: Vec<Arc<Player>> = (0..2)
            .map(|i| {
                Arc::new(Player::new(
                    PlayerId(i),
                    true,
                    settings.clone(),
                    board.clone(),
                    display.clone(),
                ))
            })
            .collect();
        let guard = shutdown::guard("test");
        let dealer = Dealer::new(
            settings.clone(),
            board.clone(),
            players.clone(),
            Arc::new(Rules::from_settings(&settings)),
            display.clone(),
            guard.listener(),
        );
        Fixture {
            board,
            players,
            display,
            dealer,
            _guard: guard,
        }
    }

    fn assert_conserved(f: &Fixture) {
        let on_table = f.board.count_cards();
        assert_eq!(f.dealer.undealt() + on_table + f.dealer.retired(), 81);
    }

    // find the slots holding a valid combination, or an invalid one.
    fn slots_for(f: &Fixture, valid: bool) -> Vec<SlotId> {
        let slots = f.board.lock();
        let cards = slots.cards();
        let rules = Rules::from_settings(&Settings::default());
        let n = cards.len();
        for a in 0..n {
            for b in a + 1..n {
                for c in b + 1..n {
                    let combo = [cards[a], cards[b], cards[c]];
                    if rules.is_valid(&combo) == valid {
                        return combo.iter().map(|&c| slots.slot_of(c).unwrap()).collect();
                    }
                }
            }
        }
        vec![]
    }

    fn select(player: &Player, slots: &[SlotId]) {
        for slot in slots {
            player.toggle(*slot);
        }
        assert!(player.submit());
    }

    #[test]
    fn fills_the_table_exactly_once() {
        let mut f = fixture();
        f.dealer.place_cards_on_table();
        assert_eq!(f.board.count_cards(), 12);
        f.dealer.place_cards_on_table();
        assert_eq!(f.board.count_cards(), 12);
        assert_eq!(f.dealer.undealt(), 69);
        assert_conserved(&f);
    }

    #[test]
    fn clearing_the_table_keeps_the_deck() {
        let mut f = fixture();
        f.dealer.place_cards_on_table();
        f.dealer.remove_all_cards_from_table();
        assert_eq!(f.board.count_cards(), 0);
        assert_eq!(f.dealer.deck().len(), 81);
        assert_conserved(&f);
    }

    #[test]
    fn accepting_retires_the_cards() {
        let mut f = fixture();
        // with a seeded rng, keep dealing until the table has a combination.
        while slots_for(&f, true).is_empty() {
            f.dealer.remove_all_cards_from_table();
            f.dealer.place_cards_on_table();
        }
        let chosen = slots_for(&f, true);
        let cards: Vec<CardId> = chosen.iter().map(|&s| f.board.card_at(s).unwrap()).collect();
        select(&f.players[0], &chosen);
        let before = f.display.0.lock().len();
        assert_eq!(f.dealer.remove_cards_from_table(), 1);
        for slot in &chosen {
            assert_eq!(f.board.card_at(*slot), None);
        }
        for card in &cards {
            assert!(!f.dealer.deck().contains(card));
        }
        assert_eq!(f.dealer.retired(), 3);
        assert_eq!(f.players[0].await_resolution(), Some(Resolution::Accepted));
        // the countdown was reset to the full timeout
        let countdowns = f.display.0.lock();
        assert!(countdowns.len() > before);
        assert!(*countdowns.last().unwrap() > Duration::from_millis(59_000));
        drop(countdowns);
        assert_conserved(&f);
        f.dealer.place_cards_on_table();
        assert_eq!(f.board.count_cards(), 12);
        assert_conserved(&f);
    }

    #[test]
    fn rejecting_leaves_the_table_alone() {
        let mut f = fixture();
        f.dealer.place_cards_on_table();
        let chosen = slots_for(&f, false);
        let before: Vec<_> = (0..12).map(|s| f.board.card_at(SlotId(s))).collect();
        select(&f.players[1], &chosen);
        assert_eq!(f.dealer.remove_cards_from_table(), 0);
        let after: Vec<_> = (0..12).map(|s| f.board.card_at(SlotId(s))).collect();
        assert_eq!(before, after);
        assert_eq!(f.players[1].await_resolution(), Some(Resolution::Rejected));
        assert_eq!(f.dealer.retired(), 0);
    }

    #[test]
    fn stale_candidates_release_their_player() {
        let mut f = fixture();
        f.dealer.place_cards_on_table();
        let chosen = slots_for(&f, false);
        select(&f.players[0], &chosen);
        f.dealer.remove_all_cards_from_table();
        assert_eq!(f.dealer.remove_cards_from_table(), 0);
        assert_eq!(f.players[0].await_resolution(), Some(Resolution::Stale));
        assert_eq!(f.dealer.deck().len(), 81);
        assert_eq!(f.board.pending(), 0);
    }

    #[test]
    fn clearing_the_table_releases_queued_candidates() {
        let mut f = fixture();
        while slots_for(&f, true).is_empty() {
            f.dealer.remove_all_cards_from_table();
            f.dealer.place_cards_on_table();
        }
        select(&f.players[0], &slots_for(&f, true));
        f.dealer.remove_all_cards_from_table();
        assert_eq!(f.board.pending(), 0);
        assert_eq!(f.players[0].await_resolution(), Some(Resolution::Stale));
        // the same cards dealt again are no longer this player's selection
        f.dealer.place_cards_on_table();
        assert_eq!(f.dealer.remove_cards_from_table(), 0);
        assert_eq!(f.dealer.retired(), 0);
        assert_eq!(f.dealer.deck().len(), 81);
        assert_conserved(&f);
    }

    #[test]
    fn cards_moved_to_other_slots_make_a_candidate_stale() {
        let mut f = fixture();
        while slots_for(&f, true).is_empty() {
            f.dealer.remove_all_cards_from_table();
            f.dealer.place_cards_on_table();
        }
        let chosen = slots_for(&f, true);
        select(&f.players[0], &chosen);
        {
            // swap the chosen cards with three others; all stay on the table
            let mut slots = f.board.lock();
            let others: Vec<SlotId> = slots
                .occupied_slots()
                .into_iter()
                .filter(|s| !chosen.contains(s))
                .take(3)
                .collect();
            let moved: Vec<CardId> = chosen
                .iter()
                .map(|&s| slots.remove_card(s).unwrap().0)
                .collect();
            let displaced: Vec<CardId> = others
                .iter()
                .map(|&s| slots.remove_card(s).unwrap().0)
                .collect();
            for (card, &slot) in moved.into_iter().zip(&others) {
                slots.place_card(card, slot);
            }
            for (card, &slot) in displaced.into_iter().zip(&chosen) {
                slots.place_card(card, slot);
            }
        }
        assert_eq!(f.board.count_cards(), 12);
        assert_eq!(f.dealer.remove_cards_from_table(), 0);
        assert_eq!(f.players[0].await_resolution(), Some(Resolution::Stale));
        assert_eq!(f.dealer.retired(), 0);
        assert_conserved(&f);
    }

    #[test]
    fn candidates_are_resolved_once_in_order() {
        let mut f = fixture();
        while slots_for(&f, true).is_empty() {
            f.dealer.remove_all_cards_from_table();
            f.dealer.place_cards_on_table();
        }
        // both players pick the same combination; only the first one counts.
        let chosen = slots_for(&f, true);
        select(&f.players[1], &chosen);
        select(&f.players[0], &chosen);
        assert_eq!(f.dealer.remove_cards_from_table(), 1);
        assert_eq!(f.players[1].await_resolution(), Some(Resolution::Accepted));
        assert_eq!(f.players[0].await_resolution(), Some(Resolution::Stale));
        assert_eq!(f.board.pending(), 0);
    }

    #[test]
    fn winners_include_every_tie() {
        let f = fixture();
        let outcome = f.dealer.announce_winners();
        assert_eq!(outcome.winners, vec![PlayerId(0), PlayerId(1)]);
        assert_eq!(outcome.scores, vec![(PlayerId(0), 0), (PlayerId(1), 0)]);
    }

    #[test]
    fn dropping_the_dealer_stops_the_players() {
        let f = fixture();
        let players = f.players.clone();
        drop(f);
        for player in players {
            assert!(!player.wait_for_room());
            assert_eq!(player.phase(), Phase::Selecting);
        }
    }
}
