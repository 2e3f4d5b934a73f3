use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam_channel::{bounded, Receiver, Sender};
use log::debug;

/// Create a new stop signal, and return a guard for it.
pub fn guard(name: &'static str) -> Guard {
    let (stopped_tx, stopped_rx) = bounded(0);
    Guard {
        name,
        stopping: Arc::new(AtomicBool::new(false)),
        _stopped_tx: stopped_tx,
        stopped_rx,
    }
}

/// Ensures that every listener notices when a group of threads must stop.
///
/// This type implements `Drop`, on which it uses a combination of an atomic
/// bool and a disconnected channel to notify listening threads. The atomic is
/// for loop heads; the channel is for threads blocked in a `select!`. The
/// owner should be arranged so that no matter how it exits, this guard gets
/// dropped.
pub struct Guard {
    name: &'static str,
    stopping: Arc<AtomicBool>,
    // Never sent on. Dropping it disconnects every receiver.
    _stopped_tx: Sender<()>,
    stopped_rx: Receiver<()>,
}

impl Guard {
    /// Create a listener for this guard.
    pub fn listener(&self) -> Listener {
        Listener {
            stopping: self.stopping.clone(),
            stopped_rx: self.stopped_rx.clone(),
        }
    }
}

impl Drop for Guard {
    fn drop(&mut self) {
        debug!("dropping {} guard", self.name);
        self.stopping.store(true, Ordering::Release);
        // `_stopped_tx` goes right after this, waking anything blocked on
        // `Listener::stopped`.
    }
}

/// The receiving side of a stop signal.
#[derive(Clone)]
pub struct Listener {
    stopping: Arc<AtomicBool>,
    stopped_rx: Receiver<()>,
}

impl Listener {
    /// Inquire whether the owner of the guard has begun shutdown.
    pub fn stopping(&self) -> bool {
        self.stopping.load(Ordering::Acquire)
    }

    /// A channel that becomes disconnected once the guard is dropped.
    ///
    /// Nothing is ever sent on it, so a `recv` arm firing in a `select!`
    /// always means the guard is gone.
    pub fn stopped(&self) -> &Receiver<()> {
        &self.stopped_rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn dropping_the_guard_notifies_listeners() {
        let guard = guard("test");
        let listener = guard.listener();
        let other = listener.clone();
        assert!(!listener.stopping());
        assert!(listener
            .stopped()
            .recv_timeout(Duration::from_millis(10))
            .is_err());
        drop(guard);
        assert!(listener.stopping());
        assert!(other.stopping());
        assert!(other.stopped().recv().is_err());
    }
}
