//! Scheduler thread handle
//!
//! Queues commands for the scheduler thread and shuts it down on drop.

use std::sync::mpsc::{SyncSender, TrySendError};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;

use tracing::{debug, warn};

use super::EngineCommand;
use crate::engine::{StartOptions, TrackEngine};
use crate::error::Result;
use crate::pool::TrackRef;
use crate::sound::SoundId;
use crate::track::VolumeGroup;

/// Handle to the scheduler thread
///
/// Returned from [`super::Scheduler::spawn`]. Dropping it stops the thread.
pub struct SchedulerHandle {
    /// Sender for commands (Option to allow explicit drop before join)
    pub(super) tx: Option<SyncSender<EngineCommand>>,

    /// Thread join handle
    pub(super) handle: Option<JoinHandle<()>>,

    /// Engine shared with the scheduler thread
    pub(super) engine: Arc<Mutex<TrackEngine>>,
}

impl SchedulerHandle {
    /// Queue a command for the next tick
    ///
    /// Non-blocking; returns false if the queue is full or the thread is
    /// gone.
    pub fn send(&self, command: EngineCommand) -> bool {
        let Some(ref tx) = self.tx else {
            warn!("Scheduler sender already dropped");
            return false;
        };
        match tx.try_send(command) {
            Ok(()) => true,
            Err(TrySendError::Full(command)) => {
                debug!(?command, "Scheduler command queue full, dropping command");
                false
            }
            Err(TrySendError::Disconnected(_)) => {
                warn!("Scheduler thread disconnected");
                false
            }
        }
    }

    /// Lock the engine for direct access
    pub fn engine(&self) -> MutexGuard<'_, TrackEngine> {
        self.engine.lock().unwrap_or_else(|e| {
            warn!("Engine mutex poisoned; continuing");
            e.into_inner()
        })
    }

    /// Start a sound under the engine lock
    pub fn start_sound(
        &self,
        sound: SoundId,
        group: VolumeGroup,
        volume: i32,
        priority: i32,
    ) -> Result<TrackRef> {
        self.engine().start_sound(sound, group, volume, priority)
    }

    pub fn start_sound_with(&self, options: StartOptions) -> Result<TrackRef> {
        self.engine().start_sound_with(options)
    }

    /// Ticks run so far
    pub fn music_timer(&self) -> u64 {
        self.engine().music_timer()
    }

    /// Check if the scheduler thread is still running
    pub fn is_alive(&self) -> bool {
        self.handle
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }
}

impl Drop for SchedulerHandle {
    fn drop(&mut self) {
        // Drop the sender first: the thread exits when recv_timeout reports
        // Disconnected, so joining while it is alive would deadlock.
        drop(self.tx.take());

        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
