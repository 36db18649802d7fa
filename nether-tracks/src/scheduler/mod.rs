//! Callback scheduler
//!
//! Drives [`crate::TrackEngine::tick`] at `callback_fps` from a dedicated thread.
//! Callers talk to the engine through a [`SchedulerHandle`]: control
//! requests are queued as [`EngineCommand`]s and applied at the top of the
//! next tick under the same lock as the tick itself.
//!
//! # Architecture
//!
//! ```text
//! Caller Thread                   Scheduler Thread
//!     │                                 │
//! [stop/fade/hook/...]──(channel)──►[buffer commands]
//!     │                                 │ deadline
//!     │                             [lock engine]
//!     │                             [apply commands]
//!     │                             [tick]──────► OutputSink
//! [start_sound]────(lock engine)───►    │
//! ```
//!
//! Starting a sound locks the engine directly because the caller needs the
//! allocated [`TrackRef`] back.
//!
//! # Usage
//!
//! ```ignore
//! let handle = Scheduler::spawn(engine);
//! let track = handle.start_sound(SoundId(1), VolumeGroup::Music, 127, 0)?;
//! handle.send(EngineCommand::SetFade { track, volume: 0, ticks: 60 });
//! ```

mod handle;
mod metrics;
mod thread;

pub use handle::SchedulerHandle;
pub use thread::Scheduler;

use crate::engine::Trigger;
use crate::pool::TrackRef;

/// Control request applied at the top of the next tick
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EngineCommand {
    Stop(TrackRef),
    StopAll,
    SetHook { track: TrackRef, hook: i32 },
    ArmTrigger(Trigger),
    DisarmTrigger,
    /// Fade to `volume` (0..=127) over `ticks`
    SetFade {
        track: TrackRef,
        volume: i32,
        ticks: i32,
    },
    SetPan { track: TrackRef, pan: i8 },
    /// Set volume (0..=127) immediately
    SetVolume { track: TrackRef, volume: i32 },
    SetPaused(bool),
    SetRadioChatter(bool),
}
