#![warn(rust_2018_idioms)]

use std::str::FromStr;
use std::thread;

use crossbeam_channel::{bounded, select, Receiver};
use flexi_logger::LogSpecBuilder;
use log::{error, info, LevelFilter};

use setdealer_server::{run, settings};

fn main() -> anyhow::Result<()> {
    let settings = settings::load()?;
    setup_logger(&settings.logging)?;
    let signal_rx = setup_signal()?;

    // Spin up the game.
    let (shutdown_tx, shutdown_rx) = bounded::<()>(0);
    let (done_tx, done_rx) = bounded::<()>(0);
    let server = thread::Builder::new()
        .name("server".into())
        .spawn(move || {
            let _done = done_tx;
            match run(settings, shutdown_rx) {
                Ok(stats) => info!(
                    "played {} rounds, {} accepted selections; final scores {:?}",
                    stats.rounds, stats.accepted, stats.scores
                ),
                Err(e) => error!("server stopped: {}", e),
            }
        })?;

    // Wait either for the signal, or for the game to end by itself.
    select! {
        recv(signal_rx) -> _ => {
            info!("sending shutdown notice");
            drop(shutdown_tx);
        },
        recv(done_rx) -> _ => info!("the game is over"),
    }
    if server.join().is_err() {
        error!("server thread panicked");
    }
    info!("good-bye, world!");
    Ok(())
}

fn setup_logger(l: &settings::Logging) -> anyhow::Result<()> {
    let mut spec_builder = LogSpecBuilder::new();
    spec_builder.default(LevelFilter::from_str(&l.level)?);
    let spec = spec_builder.build();
    flexi_logger::Logger::with(spec)
        .format(|w, now, r| flexi_logger::default_format(w, now, r))
        .start()?;
    Ok(())
}

fn setup_signal() -> anyhow::Result<Receiver<()>> {
    let (signal_tx, signal_rx) = bounded(2);
    ctrlc::set_handler(move || {
        info!("received interrupt signal");
        let _ = signal_tx.try_send(());
    })?;
    Ok(signal_rx)
}
