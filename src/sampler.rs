//! Periodic sampling task.
//!
//! Ticks the shared [`PullMachine`] on a fixed period (50 ms by default). Ticks that
//! fall behind are skipped rather than bunched up, so the derived velocity never sees
//! two samples a few microseconds apart. Every sample is handed to a callback, which is
//! where a renderer or status printer hooks in.

use crate::error::{AppResult, PullMachineError};
use crate::measurement_types::Sample;
use crate::session::PullMachine;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

/// Session shared between the sampler and the control surface.
pub type SharedMachine = Arc<Mutex<PullMachine>>;

/// Drives [`PullMachine::tick`] on a fixed period until told to stop.
pub struct Sampler {
    machine: SharedMachine,
    period: Duration,
}

impl Sampler {
    /// Sampler using the period from the session's configuration.
    pub fn new(machine: SharedMachine) -> Self {
        let period = machine.lock().config().sampler.period();
        Self { machine, period }
    }

    /// Override the tick period.
    pub fn with_period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    /// Tick period.
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Tick until `shutdown` flips to `true` (or its sender is dropped).
    /// Returns the number of ticks run.
    pub async fn run<F>(self, mut shutdown: watch::Receiver<bool>, mut on_sample: F) -> u64
    where
        F: FnMut(&Sample),
    {
        let mut ticker = tokio::time::interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut ticks = 0u64;

        info!(period_ms = self.period.as_millis() as u64, "Sampler started");
        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                _ = ticker.tick() => {
                    let sample = self.machine.lock().tick();
                    ticks += 1;
                    on_sample(&sample);
                }
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        debug!("Sampler shutdown sender dropped");
                        break;
                    }
                }
            }
        }
        info!(ticks, "Sampler stopped");
        ticks
    }

    /// Run on the tokio runtime and return a handle that stops it.
    pub fn spawn<F>(self, on_sample: F) -> SamplerHandle
    where
        F: FnMut(&Sample) + Send + 'static,
    {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(self.run(shutdown_rx, on_sample));
        SamplerHandle {
            shutdown: shutdown_tx,
            task,
        }
    }
}

/// Handle to a spawned [`Sampler`].
pub struct SamplerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<u64>,
}

impl SamplerHandle {
    /// Signal the sampler and wait for the in-progress tick to finish.
    pub async fn stop(self) -> AppResult<u64> {
        // A closed channel means the task already ended.
        let _ = self.shutdown.send(true);
        self.task
            .await
            .map_err(|e| PullMachineError::Sampler(e.to_string()))
    }

    /// Whether the task has ended.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
