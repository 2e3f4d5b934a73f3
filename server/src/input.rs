use std::io::{self, BufRead};
use std::thread;

use crossbeam_channel::Sender;
use log::{error, info, warn};

use setdealer_game::PlayerId;

/// Read `<player> <slot>` lines from stdin and forward them to the runner.
///
/// The thread is detached: a blocking read cannot be interrupted, so it exits
/// on end of input or on the first line after the runner has gone away.
pub(crate) fn spawn(tx: Sender<(PlayerId, usize)>) -> io::Result<()> {
    thread::Builder::new()
        .name("stdin".into())
        .spawn(move || {
            let stdin = io::stdin();
            read(stdin.lock(), &tx);
        })?;
    Ok(())
}

// The body of the input thread.
fn read<R: BufRead>(reader: R, tx: &Sender<(PlayerId, usize)>) {
    info!("stdin starting");
    forward(reader, tx);
    info!("stdin terminated");
}

fn forward<R: BufRead>(reader: R, tx: &Sender<(PlayerId, usize)>) {
    for line in reader.lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                error!("reading input: {}", e);
                return;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        match parse(&line) {
            Some(choice) => {
                if tx.send(choice).is_err() {
                    return;
                }
            }
            None => warn!("ignoring input {:?}; expected `<player> <slot>`", line),
        }
    }
}

fn parse(line: &str) -> Option<(PlayerId, usize)> {
    let mut words = line.split_whitespace();
    let player = words.next()?.parse().ok()?;
    let slot = words.next()?.parse().ok()?;
    if words.next().is_some() {
        return None;
    }
    Some((PlayerId(player), slot))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;
    use std::io::Cursor;

    #[test]
    fn parses_player_and_slot() {
        assert_eq!(parse("0 11"), Some((PlayerId(0), 11)));
        assert_eq!(parse("  2\t3 "), Some((PlayerId(2), 3)));
    }

    #[test]
    fn rejects_malformed_lines() {
        assert_eq!(parse("0"), None);
        assert_eq!(parse("a 1"), None);
        assert_eq!(parse("0 -1"), None);
        assert_eq!(parse("0 1 2"), None);
    }

    #[test]
    fn forwards_good_lines_only() {
        let (tx, rx) = unbounded();
        forward(Cursor::new("0 1\nnonsense\n\n1 4\n"), &tx);
        let got: Vec<_> = rx.try_iter().collect();
        assert_eq!(got, vec![(PlayerId(0), 1), (PlayerId(1), 4)]);
    }

    #[test]
    fn reading_ends_with_the_input() {
        let (tx, rx) = unbounded();
        read(Cursor::new("3 7\n"), &tx);
        drop(tx);
        assert_eq!(rx.recv(), Ok((PlayerId(3), 7)));
        // end of input returns rather than blocking
        assert!(rx.recv().is_err());
    }

    #[test]
    fn stops_once_nobody_listens() {
        let (tx, rx) = unbounded();
        drop(rx);
        // returns instead of reading the rest
        forward(Cursor::new("0 1\n0 2\n"), &tx);
    }
}
