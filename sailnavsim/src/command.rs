//! CommandIngress (C4, §4.2): a FIFO reader thread plus a mutex-guarded queue
//! fed by both the FIFO and `NetServer`'s `boatcmd` request. The simulation
//! loop drains the queue during its command phase (§4.6 step 5).

use std::collections::VecDeque;
use std::io::BufRead;
use std::sync::Mutex;

use sailnavsim_types::Command;
use tracing::{debug, warn};

/// The command queue: producer (FIFO reader thread, NetServer workers) and
/// consumer (Sim thread) serialize access through this mutex only (§5).
#[derive(Default)]
pub struct CommandQueue {
    inner: Mutex<VecDeque<Command>>,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self { inner: Mutex::new(VecDeque::new()) }
    }

    /// Parses `line` and enqueues it. Malformed lines are discarded with a
    /// diagnostic (§4.2); never returns an error to the caller.
    pub fn submit_line(&self, line: &str) {
        match Command::parse(line) {
            Ok(cmd) => self.push(cmd),
            Err(e) => warn!("dropping malformed command line {line:?}: {e}"),
        }
    }

    pub fn push(&self, cmd: Command) {
        let mut q = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        q.push_back(cmd);
    }

    /// Drains every queued command in FIFO order, for the command phase.
    pub fn drain(&self) -> Vec<Command> {
        let mut q = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        q.drain(..).collect()
    }
}

/// Blocking FIFO reader: reads newline-delimited command lines from
/// `fifo_path` and submits each to `queue`. Intended to run on its own
/// dedicated OS thread for the lifetime of the process (§5 "Command
/// reader"). A FIFO that never gets a writer simply blocks on open/read;
/// that is the expected steady state when no external command producer is
/// running.
pub fn run_fifo_reader(fifo_path: std::path::PathBuf, queue: std::sync::Arc<CommandQueue>) {
    loop {
        let file = match std::fs::File::open(&fifo_path) {
            Ok(f) => f,
            Err(e) => {
                warn!("command FIFO {} unavailable: {e}; retrying in 1s", fifo_path.display());
                std::thread::sleep(std::time::Duration::from_secs(1));
                continue;
            }
        };
        let reader = std::io::BufReader::new(file);
        for line in reader.lines() {
            match line {
                Ok(line) => {
                    if line.is_empty() {
                        continue;
                    }
                    debug!("fifo command line: {line}");
                    queue.submit_line(&line);
                }
                Err(e) => {
                    warn!("command FIFO read error: {e}");
                    break;
                }
            }
        }
        // A FIFO writer closing its end yields EOF; reopen and keep serving.
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_line_is_dropped_without_panic() {
        let q = CommandQueue::new();
        q.submit_line("not,a,valid,,,,command,line,,,,,");
        q.submit_line("Boat0,stop");
        let drained = q.drain();
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].target, "Boat0");
    }

    #[test]
    fn drain_is_fifo_and_empties_queue() {
        let q = CommandQueue::new();
        q.submit_line("A,stop");
        q.submit_line("B,start");
        let drained = q.drain();
        assert_eq!(drained.iter().map(|c| c.target.as_str()).collect::<Vec<_>>(), vec!["A", "B"]);
        assert!(q.drain().is_empty());
    }
}
