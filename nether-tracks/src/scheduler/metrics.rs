//! Scheduler health monitoring

use std::time::{Duration, Instant};

use tracing::debug;

/// Tick timing and command counters, logged once per second
#[derive(Debug, Clone)]
pub(super) struct SchedulerMetrics {
    /// Ticks run this interval
    pub ticks: u64,
    /// Ticks that started more than one period late
    pub late_ticks: u64,
    /// Commands applied this interval
    pub commands_applied: u64,
    /// Commands the engine rejected
    pub commands_failed: u64,
    /// Average tick body duration (microseconds)
    pub avg_tick_us: f64,
    /// Longest tick body this interval (microseconds)
    pub max_tick_us: u64,
    /// Active tracks after the last tick
    pub active_tracks: usize,
    pub last_log_time: Instant,
}

impl SchedulerMetrics {
    pub fn new() -> Self {
        Self {
            ticks: 0,
            late_ticks: 0,
            commands_applied: 0,
            commands_failed: 0,
            avg_tick_us: 0.0,
            max_tick_us: 0,
            active_tracks: 0,
            last_log_time: Instant::now(),
        }
    }

    /// Fold one tick's duration into the running average
    pub fn record_tick(&mut self, elapsed: Duration, active_tracks: usize) {
        let us = elapsed.as_micros() as u64;
        self.ticks += 1;
        // Exponential moving average
        self.avg_tick_us = self.avg_tick_us * 0.9 + us as f64 * 0.1;
        self.max_tick_us = self.max_tick_us.max(us);
        self.active_tracks = active_tracks;
    }

    /// Log metrics if enough time has passed (every 1 second)
    pub fn maybe_log(&mut self) {
        if self.last_log_time.elapsed().as_secs() < 1 {
            return;
        }
        debug!(
            "SCHEDULER METRICS [tid={:?}]: ticks={}, late={}, commands={} (failed {}), \
             tracks={}, avg_tick={:.2}μs, max_tick={}μs",
            std::thread::current().id(),
            self.ticks,
            self.late_ticks,
            self.commands_applied,
            self.commands_failed,
            self.active_tracks,
            self.avg_tick_us,
            self.max_tick_us
        );

        // Reset counters for next interval (show per-second rates)
        self.ticks = 0;
        self.late_ticks = 0;
        self.commands_applied = 0;
        self.commands_failed = 0;
        self.max_tick_us = 0;
        self.last_log_time = Instant::now();
    }
}
