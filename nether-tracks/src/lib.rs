//! Nether-Tracks: region-based digital track engine for Nethercore
//!
//! Plays several streams of stored PCM at once. Each stream ("track") walks
//! through the **regions** of a sound, and the engine decides at every
//! region boundary whether to continue, take an authored **jump**, or fire
//! a caller-armed **trigger**. Jumps and triggers may crossfade by cloning
//! the track into a **shadow** that fades the old region out while the
//! original carries on.
//!
//! This crate is only the engine core. Sound bundles are read by a
//! [`RegionStore`] and the final mix is done by an [`OutputSink`]; both are
//! traits supplied by the host.
//!
//! # Tick pass
//!
//! ```text
//! Scheduler (callback_fps)
//!     │
//! [apply queued commands]
//!     │
//! [detect speech]──────────────────────── any voice-group track?
//!     │
//! for each used slot:
//!     [fade]     ── volume toward target, release on silence
//!     [ducking]  ── music gain reduction while speech plays
//!     [feed]     ── decode region bytes ──► OutputSink::enqueue
//!         │
//!         └─ end of region ──► [transition] ── next / jump / trigger
//!     [gain]     ── OutputSink::set_channel_volume_balance
//! ```
//!
//! # Usage
//!
//! ```
//! use std::sync::Arc;
//! use nether_tracks::{
//!     EngineConfig, MemoryRegionStore, RecordingSink, Region, SoundDescriptor, SoundId,
//!     TrackEngine, VolumeGroup,
//! };
//!
//! let mut store = MemoryRegionStore::new();
//! store.insert(
//!     SoundDescriptor::builder(SoundId(1), "theme")
//!         .format(8, 1, 11_025)
//!         .region(Region::new(0, 4_000))
//!         .data(vec![0x80; 4_000])
//!         .build(),
//! );
//!
//! let sink = RecordingSink::new();
//! let mut engine = TrackEngine::new(EngineConfig::default(), Arc::new(store), Box::new(sink.clone()));
//! let track = engine.start_sound(SoundId(1), VolumeGroup::Music, 127, 0).unwrap();
//! engine.tick();
//! assert!(engine.track(track).is_some());
//! ```

mod config;
mod curve;
mod ducking;
mod engine;
mod error;
mod fade;
mod feed;
mod persist;
mod pool;
mod scheduler;
mod sink;
mod sound;
mod track;

pub use config::{DuckingConfig, EngineConfig, MixProfile, ProfilePreset};
pub use curve::{linear_to_perceptual, perceptual_to_linear};
pub use ducking::effective_volume;
pub use engine::{StartOptions, TrackEngine, Trigger};
pub use error::{Result, TrackError};
pub use feed::{FeedStatus, apply_radio_chatter, decode_12bit};
pub use persist::{SAVE_VERSION, SaveHeader, SaveReader, SaveWriter, TrackRecord};
pub use pool::{TrackPool, TrackRef};
pub use scheduler::{EngineCommand, Scheduler, SchedulerHandle};
pub use sink::{
    DEFAULT_QUEUE_CAPACITY, MixerFlags, OutputSink, QueueHandle, RecordedQueue, RecordingSink,
    RingQueueSink,
};
pub use sound::{
    Jump, Marker, MemoryRegionStore, Region, RegionStore, SoundBuilder, SoundDescriptor, SoundId,
};
pub use track::{FadeState, Track, TrackKind, VolumeGroup};

// =============================================================================
// Constants
// =============================================================================

/// Full-scale track volume (127 on the public 0-127 scale, times 1000)
pub const MAX_VOLUME: i32 = 127_000;

/// Multiplier between the public 0-127 volume scale and the internal scale
pub const VOLUME_UNIT: i32 = 1000;

/// Pan range limit (-127 = hard left, 127 = hard right)
pub const MAX_PAN: i8 = 127;

/// Sound name length stored in save files
pub const SOUND_NAME_LEN: usize = 15;

/// Marker name that forces a jump even when the hook does not match
pub const START_MARKER: &str = "start";
