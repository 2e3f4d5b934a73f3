use std::error::Error;
use std::sync::Arc;

use crossbeam_channel::{bounded, never, select, Receiver};
use log::{debug, info};

use setdealer_game::{Game, PlayerId, Rules};

use crate::display::LogDisplay;
use crate::input;
use crate::settings::Settings;

// Room for a full selection from every human before the reader blocks.
const INPUT_CAPACITY: usize = 16;

enum Event {
    Shutdown,
    Finished,
    Choice(PlayerId, usize),
    InputClosed,
}

/// Execute the entire life-cycle of one game.
///
/// Returns once the game is over by itself, or once `shutdown_rx` receives a
/// message or is disconnected.
pub fn run(settings: Settings, shutdown_rx: Receiver<()>) -> Result<Stats, Box<dyn Error>> {
    let seats = settings.players.seats();
    let rules = Rules::from_settings(&settings.game);
    let mut game = Game::start(
        settings.game,
        &seats,
        Arc::new(rules),
        Arc::new(LogDisplay::new()),
    )?;

    let (input_tx, mut input_rx) = bounded(INPUT_CAPACITY);
    if settings.players.human > 0 {
        info!(
            "reading choices for {} human players from stdin",
            settings.players.human
        );
        input::spawn(input_tx)?;
    } else {
        drop(input_tx);
    }

    loop {
        let event = select! {
            recv(shutdown_rx) -> _ => Event::Shutdown,
            recv(game.finished()) -> _ => Event::Finished,
            recv(input_rx) -> choice => match choice {
                Ok((player, slot)) => Event::Choice(player, slot),
                Err(_) => Event::InputClosed,
            },
        };
        match event {
            Event::Shutdown => {
                info!("received shutdown notice");
                game.terminate();
                break;
            }
            Event::Finished => {
                debug!("game finished by itself");
                break;
            }
            Event::Choice(player, slot) => game.slot_chosen(player, slot),
            Event::InputClosed => {
                debug!("no more input");
                input_rx = never();
            }
        }
    }

    info!("waiting for the game to wind down");
    let outcome = game.join()?;
    Ok(Stats {
        rounds: outcome.rounds,
        accepted: outcome.accepted,
        winners: outcome.winners,
        scores: outcome.scores,
    })
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Stats {
    pub rounds: usize,
    pub accepted: usize,
    pub winners: Vec<PlayerId>,
    pub scores: Vec<(PlayerId, u32)>,
}
