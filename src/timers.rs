//! Wall-clock timer backend
//!
//! Each session owns one timer thread. Arm/disarm requests are sent to it
//! over a command channel; elapsed timers come back to the REPL loop as
//! [`TimerFired`] events so every dispatch still happens on the main thread.

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use sparklet_core::{TimerBackend, TimerId};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashSet};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::trace;

/// An elapsed timer, tagged with the session generation that armed it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerFired {
    pub epoch: u64,
    pub id: TimerId,
}

enum TimerCommand {
    Arm(TimerId, Instant),
    Disarm(TimerId),
    Shutdown,
}

pub struct ThreadTimers {
    epoch: u64,
    command_tx: Sender<TimerCommand>,
    thread: Option<JoinHandle<()>>,
}

impl ThreadTimers {
    /// Spawn the timer thread. Firings are sent on `fired_tx`.
    pub fn new(epoch: u64, fired_tx: Sender<TimerFired>) -> Self {
        let (command_tx, command_rx) = unbounded();
        let thread = thread::spawn(move || {
            TimerThread::new(epoch, command_rx, fired_tx).run();
        });

        ThreadTimers {
            epoch,
            command_tx,
            thread: Some(thread),
        }
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }
}

impl TimerBackend for ThreadTimers {
    fn arm(&mut self, id: TimerId, delay: Duration) {
        let _ = self
            .command_tx
            .send(TimerCommand::Arm(id, Instant::now() + delay));
    }

    fn disarm(&mut self, id: TimerId) {
        let _ = self.command_tx.send(TimerCommand::Disarm(id));
    }
}

impl Drop for ThreadTimers {
    fn drop(&mut self) {
        let _ = self.command_tx.send(TimerCommand::Shutdown);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

struct TimerThread {
    epoch: u64,
    command_rx: Receiver<TimerCommand>,
    fired_tx: Sender<TimerFired>,
    deadlines: BinaryHeap<Reverse<(Instant, TimerId)>>,
    armed: HashSet<TimerId>,
}

impl TimerThread {
    fn new(epoch: u64, command_rx: Receiver<TimerCommand>, fired_tx: Sender<TimerFired>) -> Self {
        Self {
            epoch,
            command_rx,
            fired_tx,
            deadlines: BinaryHeap::new(),
            armed: HashSet::new(),
        }
    }

    fn run(&mut self) {
        loop {
            self.emit_due();

            // Block until the next deadline, or indefinitely when idle
            let command = match self.next_deadline() {
                Some(deadline) => {
                    let wait = deadline.saturating_duration_since(Instant::now());
                    match self.command_rx.recv_timeout(wait) {
                        Ok(command) => command,
                        Err(RecvTimeoutError::Timeout) => continue,
                        Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                None => match self.command_rx.recv() {
                    Ok(command) => command,
                    Err(_) => break,
                },
            };

            match command {
                TimerCommand::Arm(id, deadline) => {
                    self.armed.insert(id);
                    self.deadlines.push(Reverse((deadline, id)));
                }
                TimerCommand::Disarm(id) => {
                    self.armed.remove(&id);
                }
                TimerCommand::Shutdown => break,
            }
        }
    }

    fn next_deadline(&mut self) -> Option<Instant> {
        while let Some(Reverse((deadline, id))) = self.deadlines.peek().copied() {
            if self.armed.contains(&id) {
                return Some(deadline);
            }
            self.deadlines.pop();
        }
        None
    }

    fn emit_due(&mut self) {
        let now = Instant::now();
        while let Some(Reverse((deadline, id))) = self.deadlines.peek().copied() {
            if deadline > now {
                break;
            }
            self.deadlines.pop();
            if self.armed.remove(&id) {
                trace!(epoch = self.epoch, %id, "Timer elapsed");
                if self
                    .fired_tx
                    .send(TimerFired {
                        epoch: self.epoch,
                        id,
                    })
                    .is_err()
                {
                    return;
                }
            }
        }
    }
}
