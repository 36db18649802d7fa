//! Track engine
//!
//! [`TrackEngine`] owns the track pool and implements every caller-facing
//! operation. The per-tick pass lives in `tick.rs` and the region
//! transition state machine in `transition.rs`.
//!
//! The engine itself is single-threaded; [`crate::Scheduler`] wraps it in a
//! mutex and drives [`TrackEngine::tick`] from its own thread.

mod tick;
mod transition;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::{EngineConfig, MixProfile};
use crate::error::{Result, TrackError};
use crate::fade::begin_fade;
use crate::pool::{TrackPool, TrackRef};
use crate::scheduler::EngineCommand;
use crate::sink::OutputSink;
use crate::sound::{RegionStore, SoundId};
use crate::track::{Track, TrackKind, VolumeGroup, feed_size_for, mixer_flags_for};
use crate::{MAX_PAN, MAX_VOLUME, VOLUME_UNIT};

/// Process-wide trigger armed by the caller
///
/// Fires on the next region transition (on any track) that enters a region
/// containing a marker called `marker`, then disarms itself.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Trigger {
    /// Marker name to match (case-insensitive)
    pub marker: String,
    /// Ticks the abandoned region takes to fade out
    pub fade_out_delay_ticks: i32,
    /// Sound the track continues with; `None` moves on to the next region
    pub follow_up: Option<SoundId>,
}

impl Trigger {
    pub fn new(marker: impl Into<String>, fade_out_delay_ticks: i32) -> Self {
        Self {
            marker: marker.into(),
            fade_out_delay_ticks,
            follow_up: None,
        }
    }
}

/// Parameters for [`TrackEngine::start_sound_with`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StartOptions {
    pub sound: SoundId,
    pub group: VolumeGroup,
    /// 0..=127
    pub volume: i32,
    pub pan: i8,
    pub priority: i32,
    /// Region entered on the first feed
    pub start_region: usize,
    pub hook: i32,
    /// Allow a second primary track on the same sound
    pub allow_overlap: bool,
}

impl StartOptions {
    pub fn new(sound: SoundId, group: VolumeGroup) -> Self {
        Self {
            sound,
            group,
            volume: 127,
            pan: 0,
            priority: 0,
            start_region: 0,
            hook: 0,
            allow_overlap: false,
        }
    }
}

/// Region-based track engine
pub struct TrackEngine {
    pub(crate) config: EngineConfig,
    pub(crate) profile: MixProfile,
    pub(crate) store: Arc<dyn RegionStore>,
    pub(crate) sink: Box<dyn OutputSink>,
    pub(crate) pool: TrackPool,
    pub(crate) trigger: Option<Trigger>,
    pub(crate) music_timer: u64,
    pub(crate) paused: bool,
    pub(crate) radio_chatter: bool,
    pub(crate) speech_active: bool,
}

impl TrackEngine {
    pub fn new(
        config: EngineConfig,
        store: Arc<dyn RegionStore>,
        sink: Box<dyn OutputSink>,
    ) -> Self {
        let profile = config.mix_profile();
        let pool = TrackPool::new(config.primary_tracks, config.shadow_tracks);
        info!(
            fps = config.callback_fps,
            primary = config.primary_tracks,
            shadow = config.shadow_tracks,
            "track engine created"
        );
        Self {
            config,
            profile,
            store,
            sink,
            pool,
            trigger: None,
            music_timer: 0,
            paused: false,
            radio_chatter: false,
            speech_active: false,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn profile(&self) -> &MixProfile {
        &self.profile
    }

    /// Direct access to the output sink
    pub fn sink_mut(&mut self) -> &mut dyn OutputSink {
        self.sink.as_mut()
    }

    // =========================================================================
    // Starting and stopping
    // =========================================================================

    /// Start a sound at its first region
    ///
    /// `volume` is on the public 0..=127 scale.
    pub fn start_sound(
        &mut self,
        sound: SoundId,
        group: VolumeGroup,
        volume: i32,
        priority: i32,
    ) -> Result<TrackRef> {
        self.start_sound_with(StartOptions {
            volume,
            priority,
            ..StartOptions::new(sound, group)
        })
    }

    /// Start a sound with full control over its initial state
    ///
    /// # Errors
    ///
    /// Fails without allocating anything when the sound cannot be opened,
    /// is already playing on a primary track (unless overlap is allowed) or
    /// no primary slot can be found.
    pub fn start_sound_with(&mut self, options: StartOptions) -> Result<TrackRef> {
        let descriptor = self.store.open_sound(options.sound)?;
        descriptor.validate()?;
        if options.start_region >= descriptor.region_count() {
            return Err(TrackError::CorruptSound {
                id: options.sound,
                reason: format!("start region {} out of range", options.start_region),
            });
        }
        if !options.allow_overlap && self.pool.find_primary(options.sound).is_some() {
            return Err(TrackError::AlreadyPlaying(options.sound));
        }

        let track_ref = self.allocate_primary(options.sound, options.group, options.priority)?;
        let flags = mixer_flags_for(
            descriptor.bits(),
            descriptor.channels(),
            descriptor.little_endian(),
        );
        let output = self.sink.create_queue(descriptor.sample_rate(), flags);
        let track = self
            .pool
            .get_mut(track_ref)
            .ok_or(TrackError::InvalidTrack(track_ref))?;
        track.bind_sound(descriptor);
        track.volume = options.volume.clamp(0, 127) * VOLUME_UNIT;
        track.pan = options.pan.clamp(-MAX_PAN, MAX_PAN);
        track.priority = options.priority;
        track.start_region = options.start_region;
        track.hook_id = options.hook;
        track.output = Some(output);

        debug!(
            sound = %options.sound,
            name = %track.sound_name,
            slot = track.slot,
            group = ?options.group,
            volume = options.volume,
            "sound started"
        );
        Ok(track_ref)
    }

    /// Start a track whose data is pushed by the caller
    ///
    /// The engine fades, ducks and sets gain on it but never reads regions
    /// for it. Only 8- and 16-bit data is accepted.
    pub fn start_stream(
        &mut self,
        sound: SoundId,
        group: VolumeGroup,
        sample_rate: u32,
        bits: u8,
        channels: u8,
        volume: i32,
    ) -> Result<TrackRef> {
        if bits != 8 && bits != 16 {
            return Err(TrackError::UnsupportedBitDepth(bits));
        }
        let track_ref = self.allocate_primary(sound, group, 0)?;
        let flags = mixer_flags_for(bits, channels, false);
        let output = self.sink.create_queue(sample_rate, flags);
        let track = self
            .pool
            .get_mut(track_ref)
            .ok_or(TrackError::InvalidTrack(track_ref))?;
        track.stream_owned = true;
        track.current_region = 0;
        track.mixer_flags = flags;
        track.feed_size = feed_size_for(bits, channels, sample_rate);
        track.volume = volume.clamp(0, 127) * VOLUME_UNIT;
        track.output = Some(output);
        debug!(sound = %sound, slot = track.slot, "stream started");
        Ok(track_ref)
    }

    /// Append caller-supplied bytes to a stream track
    pub fn push_stream(&mut self, track: TrackRef, data: Vec<u8>) -> Result<()> {
        let t = self
            .pool
            .get(track)
            .filter(|t| t.stream_owned)
            .ok_or(TrackError::InvalidTrack(track))?;
        if let Some(output) = t.output {
            let flags = t.mixer_flags;
            self.sink.enqueue(output, data, flags);
        }
        Ok(())
    }

    fn allocate_primary(
        &mut self,
        sound: SoundId,
        group: VolumeGroup,
        priority: i32,
    ) -> Result<TrackRef> {
        match self.pool.allocate(TrackKind::Primary, sound, group) {
            Err(TrackError::PoolFull(kind)) if self.config.priority_eviction => {
                let victim = self
                    .pool
                    .iter()
                    .filter(|t| t.kind == TrackKind::Primary && t.priority <= priority)
                    .min_by_key(|t| t.priority)
                    .map(|t| t.slot)
                    .ok_or(TrackError::PoolFull(kind))?;
                debug!(slot = victim, priority, "evicting lower-priority track");
                self.release_slot(victim, "evicted");
                self.pool.allocate(TrackKind::Primary, sound, group)
            }
            other => other,
        }
    }

    /// Stop a track immediately
    pub fn stop_sound(&mut self, track: TrackRef) -> Result<()> {
        if !self.pool.contains(track) {
            return Err(TrackError::InvalidTrack(track));
        }
        self.release_slot(track.index(), "stopped");
        Ok(())
    }

    /// Stop every track, shadows included
    pub fn stop_all_sounds(&mut self) {
        for index in self.pool.active_slots() {
            self.release_slot(index, "stop all");
        }
    }

    /// Free a slot and close its output queue
    pub(crate) fn release_slot(&mut self, index: usize, reason: &str) {
        if let Some(track) = self.pool.release_slot(index) {
            if let Some(output) = track.output {
                self.sink.finish(output);
            }
            debug!(
                sound = %track.sound_id,
                slot = index,
                kind = %track.kind,
                reason,
                "track released"
            );
        }
    }

    // =========================================================================
    // Per-track controls
    // =========================================================================

    fn track_mut(&mut self, track: TrackRef) -> Result<&mut Track> {
        self.pool
            .get_mut(track)
            .ok_or(TrackError::InvalidTrack(track))
    }

    /// Select the hook the next jump must match
    pub fn set_hook(&mut self, track: TrackRef, hook: i32) -> Result<()> {
        self.track_mut(track)?.hook_id = hook;
        Ok(())
    }

    /// Fade to `volume` (0..=127) over `ticks` ticks
    pub fn set_fade(&mut self, track: TrackRef, volume: i32, ticks: i32) -> Result<()> {
        let profile = self.profile.clone();
        let t = self.track_mut(track)?;
        begin_fade(t, volume.clamp(0, 127) * VOLUME_UNIT, ticks, &profile);
        Ok(())
    }

    /// Set pan (-127..=127)
    pub fn set_pan(&mut self, track: TrackRef, pan: i8) -> Result<()> {
        self.track_mut(track)?.pan = pan.clamp(-MAX_PAN, MAX_PAN);
        Ok(())
    }

    /// Set volume (0..=127) immediately, cancelling any fade
    pub fn set_volume(&mut self, track: TrackRef, volume: i32) -> Result<()> {
        let t = self.track_mut(track)?;
        t.volume = (volume.clamp(0, 127) * VOLUME_UNIT).min(MAX_VOLUME);
        t.fade = Default::default();
        Ok(())
    }

    // =========================================================================
    // Global controls
    // =========================================================================

    /// Arm the process-wide trigger, replacing any armed one
    pub fn arm_trigger(&mut self, trigger: Trigger) {
        debug!(marker = %trigger.marker, delay = trigger.fade_out_delay_ticks, "trigger armed");
        self.trigger = Some(trigger);
    }

    pub fn disarm_trigger(&mut self) {
        self.trigger = None;
    }

    /// Currently armed trigger
    pub fn trigger(&self) -> Option<&Trigger> {
        self.trigger.as_ref()
    }

    /// Ticks run since the engine was created
    pub fn music_timer(&self) -> u64 {
        self.music_timer
    }

    pub fn set_paused(&mut self, paused: bool) {
        if paused != self.paused {
            debug!(paused, "engine pause changed");
        }
        self.paused = paused;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Enable the radio chatter effect on the configured sound
    pub fn set_radio_chatter(&mut self, enabled: bool) {
        self.radio_chatter = enabled;
    }

    pub fn radio_chatter(&self) -> bool {
        self.radio_chatter
    }

    /// Whether the last tick saw a voice track
    pub fn is_speech_active(&self) -> bool {
        self.speech_active
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn track(&self, track: TrackRef) -> Option<&Track> {
        self.pool.get(track)
    }

    /// Live tracks with their references, in slot order
    pub fn tracks(&self) -> impl Iterator<Item = (TrackRef, &Track)> {
        self.pool
            .iter()
            .filter_map(|t| self.pool.ref_for(t.slot).map(|r| (r, t)))
    }

    pub fn active_count(&self) -> usize {
        self.pool.active_count()
    }

    /// Primary track playing `sound`
    pub fn find_track(&self, sound: SoundId) -> Option<TrackRef> {
        self.pool.find_primary(sound)
    }

    pub fn pool(&self) -> &TrackPool {
        &self.pool
    }

    // =========================================================================
    // Commands
    // =========================================================================

    /// Apply a queued command
    pub fn apply(&mut self, command: EngineCommand) -> Result<()> {
        match command {
            EngineCommand::Stop(track) => self.stop_sound(track),
            EngineCommand::StopAll => {
                self.stop_all_sounds();
                Ok(())
            }
            EngineCommand::SetHook { track, hook } => self.set_hook(track, hook),
            EngineCommand::ArmTrigger(trigger) => {
                self.arm_trigger(trigger);
                Ok(())
            }
            EngineCommand::DisarmTrigger => {
                self.disarm_trigger();
                Ok(())
            }
            EngineCommand::SetFade {
                track,
                volume,
                ticks,
            } => self.set_fade(track, volume, ticks),
            EngineCommand::SetPan { track, pan } => self.set_pan(track, pan),
            EngineCommand::SetVolume { track, volume } => self.set_volume(track, volume),
            EngineCommand::SetPaused(paused) => {
                self.set_paused(paused);
                Ok(())
            }
            EngineCommand::SetRadioChatter(enabled) => {
                self.set_radio_chatter(enabled);
                Ok(())
            }
        }
        .inspect_err(|e| warn!("command failed: {e}"))
    }
}
