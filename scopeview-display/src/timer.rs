//! Single-thread deadline timer used to defer histogram updates.
//!
//! Deadlines live in a min-heap on the timer thread. At most one deadline
//! per key is live: scheduling a key again replaces its deadline, and
//! cancelled or replaced entries are skipped when they surface.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use log::{debug, trace};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Deadline {
    at: Instant,
    key: usize,
}

impl PartialOrd for Deadline {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Deadline {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering for min-heap (earliest deadline first)
        other
            .at
            .cmp(&self.at)
            .then_with(|| other.key.cmp(&self.key))
    }
}

#[derive(Debug)]
enum TimerCommand {
    Schedule(Deadline),
    Cancel(usize),
    Shutdown,
}

/// Fires a callback with a key once that key's deadline passes.
#[derive(Debug)]
pub struct DebounceTimer {
    tx: Sender<TimerCommand>,
    handle: Option<JoinHandle<()>>,
}

impl DebounceTimer {
    /// Starts the timer thread. `on_fire` runs on that thread with the key
    /// and the deadline it was scheduled for.
    ///
    /// # Errors
    /// Returns [`Error::Spawn`] if the thread cannot be started.
    pub fn spawn<F>(name: &str, on_fire: F) -> Result<Self>
    where
        F: FnMut(usize, Instant) + Send + 'static,
    {
        let (tx, rx) = channel();
        let handle = thread::Builder::new()
            .name(name.to_owned())
            .spawn(move || run_timer(&rx, on_fire))
            .map_err(|source| Error::Spawn {
                name: name.to_owned(),
                source,
            })?;
        Ok(Self {
            tx,
            handle: Some(handle),
        })
    }

    /// Fires `key` at `at`, replacing any pending deadline for it.
    pub fn schedule(&self, key: usize, at: Instant) {
        let _ = self.tx.send(TimerCommand::Schedule(Deadline { at, key }));
    }

    /// Drops any pending deadline for `key`.
    pub fn cancel(&self, key: usize) {
        let _ = self.tx.send(TimerCommand::Cancel(key));
    }

    /// Stops the timer thread; pending deadlines never fire.
    pub fn shutdown(&mut self) {
        let _ = self.tx.send(TimerCommand::Shutdown);
        if let Some(handle) = self.handle.take() {
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
        }
    }
}

impl Drop for DebounceTimer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_timer<F: FnMut(usize, Instant)>(rx: &Receiver<TimerCommand>, mut on_fire: F) {
    let mut heap = BinaryHeap::new();
    let mut live: HashMap<usize, Instant> = HashMap::new();

    loop {
        let now = Instant::now();
        while heap.peek().is_some_and(|d: &Deadline| d.at <= now) {
            let Some(due) = heap.pop() else { break };
            if live.get(&due.key) == Some(&due.at) {
                live.remove(&due.key);
                trace!("timer fired for key {}", due.key);
                on_fire(due.key, due.at);
            }
        }

        let command = match heap.peek() {
            Some(next) => match rx.recv_timeout(next.at.saturating_duration_since(Instant::now())) {
                Ok(command) => command,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            },
            None => match rx.recv() {
                Ok(command) => command,
                Err(_) => break,
            },
        };

        match command {
            TimerCommand::Schedule(deadline) => {
                live.insert(deadline.key, deadline.at);
                heap.push(deadline);
            }
            TimerCommand::Cancel(key) => {
                live.remove(&key);
            }
            TimerCommand::Shutdown => break,
        }
    }
    debug!("timer thread exiting with {} pending deadlines", live.len());
}
