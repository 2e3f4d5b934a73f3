#![warn(rust_2018_idioms)]

pub mod actor;
pub mod board;
pub mod dealer;
pub mod display;
pub mod error;
pub mod model;
pub mod player;
pub mod rules;
pub mod settings;
pub mod shutdown;

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver};
use log::info;
use snafu::{ensure, ResultExt};

pub use crate::board::Board;
pub use crate::dealer::{Dealer, Outcome};
pub use crate::display::Display;
pub use crate::error::{Error, Result};
pub use crate::model::{Candidate, CardId, PlayerId, Resolution, SlotId};
pub use crate::player::{Phase, Player};
pub use crate::rules::{Rules, Validator};
pub use crate::settings::Settings;

/// Who plays a seat.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Seat {
    /// Input arrives through `Game::slot_chosen`.
    Human,
    /// A computer actor thread chooses slots at random.
    Computer,
}

/// A running game: the dealer thread plus a thread per seat.
pub struct Game {
    // Dropping this tells the dealer to wrap up.
    guard: Option<shutdown::Guard>,
    board: Arc<Board>,
    players: Vec<Arc<Player>>,
    dealer: JoinHandle<Outcome>,
    finished_rx: Receiver<()>,
}

impl Game {
    /// Validate the settings, seat the players, and start every thread.
    pub fn start(
        settings: Settings,
        seats: &[Seat],
        validator: Arc<dyn Validator>,
        display: Arc<dyn Display>,
    ) -> Result<Game> {
        settings.validate()?;
        ensure!(!seats.is_empty(), error::NoPlayers);
        let settings = Arc::new(settings);
        let board = Arc::new(Board::new(settings.table_size, settings.deck_size));
        let players: Vec<Arc<Player>> = seats
            .iter()
            .enumerate()
            .map(|(i, &seat)| {
                Arc::new(Player::new(
                    PlayerId(i),
                    seat == Seat::Human,
                    settings.clone(),
                    board.clone(),
                    display.clone(),
                ))
            })
            .collect();

        let guard = shutdown::guard("game");
        let dealer = Dealer::new(
            settings,
            board.clone(),
            players.clone(),
            validator,
            display,
            guard.listener(),
        );

        let mut player_threads = Vec::with_capacity(players.len());
        for player in &players {
            let actor = if player.is_human() {
                None
            } else {
                Some(actor::spawn(player.clone())?)
            };
            player_threads.push(player::spawn(
                player.clone(),
                actor,
                dealer.players_listener(),
            )?);
        }

        // The dealer thread holds the sender; its exit disconnects the channel.
        let (finished_tx, finished_rx) = bounded::<()>(0);
        let dealer = thread::Builder::new()
            .name("dealer".into())
            .spawn(move || {
                let _finished = finished_tx;
                dealer.run(player_threads)
            })
            .context(error::Spawn { name: "dealer" })?;

        info!("game started with {} players", players.len());
        Ok(Game {
            guard: Some(guard),
            board,
            players,
            dealer,
            finished_rx,
        })
    }

    /// Deliver an input event to a player. Unknown players are ignored.
    pub fn slot_chosen(&self, player: PlayerId, slot: usize) {
        if let Some(p) = self.players.get(player.0) {
            p.slot_chosen(slot);
        }
    }

    /// The shared table, for observers that draw it.
    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn players(&self) -> &[Arc<Player>] {
        &self.players
    }

    /// A channel that becomes disconnected once the dealer thread is done.
    pub fn finished(&self) -> &Receiver<()> {
        &self.finished_rx
    }

    /// Ask the game to stop. This returns immediately; use `join` to wait.
    pub fn terminate(&mut self) {
        self.guard.take();
    }

    /// Wait for the game to end, by itself or after `terminate`.
    pub fn join(self) -> Result<Outcome> {
        let Game { guard, dealer, .. } = self;
        let outcome = dealer.join().map_err(|_| Error::DealerPanicked);
        drop(guard);
        outcome
    }
}
