//! Periodic driver of the explorer's maintenance.
//!
//! A single background thread fires [Tick::Clean] and [Tick::Update] at their own fixed
//! rates. Ticks are queued on a channel and drained by the thread owning the
//! [crate::PeerExplorer], so maintenance never runs concurrently with message handling.

use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use flume::{Receiver, RecvTimeoutError, Sender};
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// Purge expired requests, retry or evict unresponsive nodes.
    Clean,
    /// Bootstrap or ask known nodes for more nodes.
    Update,
}

#[derive(Debug)]
pub struct Scheduler {
    clean_period: Duration,
    update_period: Duration,
    ticks_sender: Sender<Tick>,
    ticks: Receiver<Tick>,
    worker: Option<Worker>,
}

#[derive(Debug)]
struct Worker {
    shutdown: Sender<()>,
    handle: JoinHandle<()>,
}

impl Scheduler {
    pub fn new(clean_period: Duration, update_period: Duration) -> Self {
        let (ticks_sender, ticks) = flume::unbounded();

        Self {
            clean_period,
            update_period,
            ticks_sender,
            ticks,
            worker: None,
        }
    }

    // === Getters ===

    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    // === Public Methods ===

    /// Spawn the timer thread. Returns `false` if it was already running.
    pub fn start(&mut self) -> bool {
        if self.worker.is_some() {
            return false;
        }

        let (shutdown, shutdown_receiver) = flume::bounded(1);
        let ticks = self.ticks_sender.clone();
        let clean_period = self.clean_period;
        let update_period = self.update_period;

        let handle = thread::Builder::new()
            .name("peer-explorer-scheduler".to_string())
            .spawn(move || run(clean_period, update_period, ticks, shutdown_receiver));

        match handle {
            Ok(handle) => {
                self.worker = Some(Worker { shutdown, handle });
                true
            }
            Err(error) => {
                debug!(?error, "Failed to spawn scheduler thread");
                false
            }
        }
    }

    /// Stop the timer thread and wait for it to exit. Pending ticks are discarded.
    pub fn stop(&mut self) {
        if let Some(worker) = self.worker.take() {
            let _ = worker.shutdown.send(());
            let _ = worker.handle.join();
        }

        let _ = self.ticks.drain();
    }

    /// Ticks fired since the last call.
    pub fn ticks(&self) -> Vec<Tick> {
        self.ticks.drain().collect()
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(clean_period: Duration, update_period: Duration, ticks: Sender<Tick>, shutdown: Receiver<()>) {
    let start = Instant::now();
    let mut next_clean = start + clean_period;
    let mut next_update = start + update_period;

    loop {
        match shutdown.recv_deadline(next_clean.min(next_update)) {
            Err(RecvTimeoutError::Timeout) => {}
            // Stopped or dropped.
            _ => break,
        }

        let now = Instant::now();

        if now >= next_clean {
            trace!(context = "scheduler", "clean");
            if ticks.send(Tick::Clean).is_err() {
                break;
            }
            next_clean += clean_period;
        }

        if now >= next_update {
            trace!(context = "scheduler", "update");
            if ticks.send(Tick::Update).is_err() {
                break;
            }
            next_update += update_period;
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn fires_both_ticks() {
        let mut scheduler = Scheduler::new(Duration::from_millis(5), Duration::from_millis(15));

        assert!(scheduler.start());
        assert!(scheduler.is_running());

        thread::sleep(Duration::from_millis(100));

        let ticks = scheduler.ticks();
        let cleans = ticks.iter().filter(|t| **t == Tick::Clean).count();
        let updates = ticks.iter().filter(|t| **t == Tick::Update).count();

        assert!(cleans > updates);
        assert!(updates >= 1);

        scheduler.stop();
    }

    #[test]
    fn idempotent_start_and_stop() {
        let mut scheduler = Scheduler::new(Duration::from_millis(5), Duration::from_millis(5));

        assert!(scheduler.start());
        assert!(!scheduler.start());

        scheduler.stop();
        scheduler.stop();

        assert!(!scheduler.is_running());

        thread::sleep(Duration::from_millis(20));
        assert!(scheduler.ticks().is_empty());
    }
}
