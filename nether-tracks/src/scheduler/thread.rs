//! Scheduler thread implementation

use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, trace, warn};

use super::EngineCommand;
use super::handle::SchedulerHandle;
use super::metrics::SchedulerMetrics;
use crate::engine::TrackEngine;

/// Commands that fit in the queue between two ticks
const COMMAND_QUEUE_DEPTH: usize = 64;

/// Scheduler thread state
pub struct Scheduler {
    /// Receive commands from callers
    rx: mpsc::Receiver<EngineCommand>,

    /// Engine shared with the handle
    engine: Arc<Mutex<TrackEngine>>,

    /// Commands received since the last tick
    pending: Vec<EngineCommand>,

    /// Time between ticks
    period: Duration,

    metrics: SchedulerMetrics,
}

impl Scheduler {
    /// Move an engine onto a new scheduler thread
    pub fn spawn(engine: TrackEngine) -> SchedulerHandle {
        Self::spawn_shared(Arc::new(Mutex::new(engine)))
    }

    /// Drive an engine that is already shared
    pub fn spawn_shared(engine: Arc<Mutex<TrackEngine>>) -> SchedulerHandle {
        let (tx, rx) = mpsc::sync_channel::<EngineCommand>(COMMAND_QUEUE_DEPTH);
        let mut scheduler = Self::new(rx, engine.clone());

        let handle = thread::Builder::new()
            .name("track-scheduler".into())
            .spawn(move || scheduler.run())
            .expect("failed to spawn track scheduler thread");

        SchedulerHandle {
            tx: Some(tx),
            handle: Some(handle),
            engine,
        }
    }

    pub(super) fn new(rx: mpsc::Receiver<EngineCommand>, engine: Arc<Mutex<TrackEngine>>) -> Self {
        let fps = lock(&engine).config().callback_fps.max(1);
        Self {
            rx,
            engine,
            pending: Vec::with_capacity(COMMAND_QUEUE_DEPTH),
            period: Duration::from_secs(1) / fps,
            metrics: SchedulerMetrics::new(),
        }
    }

    /// Main loop: wait for commands until the deadline, then tick
    fn run(&mut self) {
        debug!(period_us = self.period.as_micros() as u64, "Track scheduler started");
        let mut deadline = Instant::now() + self.period;

        loop {
            let timeout = deadline.saturating_duration_since(Instant::now());
            match self.rx.recv_timeout(timeout) {
                Ok(command) => {
                    self.pending.push(command);
                    if Instant::now() < deadline {
                        continue;
                    }
                }
                Err(mpsc::RecvTimeoutError::Timeout) => {}
                Err(mpsc::RecvTimeoutError::Disconnected) => {
                    debug!("Track scheduler exiting (channel disconnected)");
                    break;
                }
            }

            self.tick_once();

            deadline += self.period;
            let now = Instant::now();
            if now > deadline + self.period {
                // Fell more than a period behind; skip ahead instead of bursting
                self.metrics.late_ticks += 1;
                deadline = now + self.period;
            }

            self.metrics.maybe_log();
        }

        debug!("Track scheduler finished");
    }

    /// Apply buffered commands and run one engine tick
    pub(super) fn tick_once(&mut self) {
        // Pick up anything that raced the deadline
        while let Ok(command) = self.rx.try_recv() {
            self.pending.push(command);
        }

        let started = Instant::now();
        let mut engine = lock(&self.engine);
        for command in self.pending.drain(..) {
            match engine.apply(command) {
                Ok(()) => self.metrics.commands_applied += 1,
                Err(_) => self.metrics.commands_failed += 1,
            }
        }
        engine.tick();
        let active = engine.active_count();
        drop(engine);

        let elapsed = started.elapsed();
        trace!(elapsed_us = elapsed.as_micros() as u64, active, "tick");
        self.metrics.record_tick(elapsed, active);
    }

    #[cfg(test)]
    pub(super) fn metrics(&self) -> &SchedulerMetrics {
        &self.metrics
    }
}

fn lock(engine: &Mutex<TrackEngine>) -> std::sync::MutexGuard<'_, TrackEngine> {
    engine.lock().unwrap_or_else(|e| {
        warn!("Engine mutex poisoned; continuing");
        e.into_inner()
    })
}
