use std::sync::Arc;
use std::thread::{self, JoinHandle};

use log::info;
use rand::Rng;
use snafu::ResultExt;

use crate::error::{self, Result};
use crate::player::Player;

/// Start a computer actor for a player.
///
/// The actor repeatedly chooses a slot at random and delivers it to the
/// player as input. Whenever the player cannot take more input, the actor
/// sleeps until the player has room again. It exits once the player is
/// terminated.
pub fn spawn(player: Arc<Player>) -> Result<JoinHandle<()>> {
    let name = format!("computer-{}", player.id());
    thread::Builder::new()
        .name(name.clone())
        .spawn(move || run(&player))
        .context(error::Spawn { name })
}

fn run(player: &Player) {
    info!("computer {} starting", player.id());
    let mut rng = rand::thread_rng();
    while player.wait_for_room() {
        let slot = rng.gen_range(0, player.table_size());
        player.slot_chosen(slot);
    }
    info!("computer {} terminated", player.id());
}
