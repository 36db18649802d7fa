//! Region transition engine
//!
//! Runs whenever a track exhausts its current region:
//!
//! ```text
//! fresh (region -1) ──► start_region
//! shadow            ──► release
//! region + 1 past end ──► release
//!       │
//!       ▼
//! armed trigger marker in new region? ──► shadow fades new region,
//!       │ no                              track moves on / follow-up sound
//!       ▼
//! jump (region, hook)? ── hook matches or dest is "start" ──► jump
//!       │ no / mid-crossfade / dangling
//!       ▼
//! sequential advance
//! ```
//!
//! A crossfade hands the track's output queue (with whatever it still has
//! buffered) to a shadow track that fades out, and gives the original track
//! a fresh queue. If no shadow slot is free the transition happens in
//! place.

use tracing::{debug, warn};

use super::{TrackEngine, Trigger};
use crate::error::{Result, TrackError};
use crate::fade::begin_fade;
use crate::pool::TrackRef;
use crate::sound::SoundId;
use crate::track::TrackKind;

impl TrackEngine {
    /// Move a track past the end of its region; false once it is released
    pub(crate) fn switch_region(&mut self, index: usize) -> bool {
        let Some(track) = self.pool.slot_mut(index) else {
            return false;
        };

        if track.current_region == -1 {
            track.current_region = track.start_region as i32;
            track.region_offset = 0;
            track.pcm12_carry = 0;
            debug!(slot = index, region = track.current_region, "initial region selected");
            return true;
        }
        if track.kind == TrackKind::Shadow {
            self.release_slot(index, "shadow reached end of region");
            return false;
        }
        let Some(sound) = track.sound.clone() else {
            self.release_slot(index, "no sound bound");
            return false;
        };

        let next = (track.current_region + 1) as usize;
        if next >= sound.region_count() {
            self.release_slot(index, "end of sound");
            return false;
        }
        track.current_region = next as i32;
        track.region_offset = 0;
        track.pcm12_carry = 0;

        let armed = self
            .trigger
            .as_ref()
            .is_some_and(|t| sound.has_marker(next, &t.marker));
        if armed && let Some(trigger) = self.trigger.take() {
            return self.fire_trigger(index, next, &trigger);
        }

        let hook = track.hook_id;
        let crossfading = track.is_crossfading();
        let Some((jump, matched)) = sound.jump_for(next, hook) else {
            debug!(slot = index, region = next, "sequential advance");
            return true;
        };
        let jump = *jump;
        if crossfading {
            debug!(slot = index, region = next, "jump skipped, track is crossfading");
            return true;
        }
        let forced = !matched && sound.is_start_region(jump.dest_region);
        if !matched && !forced {
            debug!(slot = index, region = next, hook, "hook mismatch, sequential advance");
            return true;
        }

        // A forced jump to the start marker always switches in place
        let fade_ticks = if forced {
            0
        } else {
            fade_ticks_for(jump.fade_delay_ms, self.config.callback_fps)
        };
        if fade_ticks > 0
            && let Some(track_ref) = self.pool.ref_for(index)
            && let Err(e) = self.crossfade(track_ref, fade_ticks)
        {
            warn!(slot = index, "crossfade skipped: {e}");
        }

        let Some(track) = self.pool.slot_mut(index) else {
            return false;
        };
        track.current_region = jump.dest_region as i32;
        track.region_offset = 0;
        track.pcm12_carry = 0;
        track.hook_id = 0;
        debug!(
            slot = index,
            from = next,
            to = jump.dest_region,
            fade_ticks,
            forced,
            "jump taken"
        );
        true
    }

    /// Spawn a shadow of the track that fades out its current region
    ///
    /// The shadow takes over the track's output queue; the track gets a new
    /// one.
    fn crossfade(&mut self, track: TrackRef, fade_ticks: i32) -> Result<TrackRef> {
        let source = self
            .pool
            .get(track)
            .cloned()
            .ok_or(TrackError::InvalidTrack(track))?;
        let sound = source
            .sound
            .clone()
            .ok_or(TrackError::SoundNotFound(source.sound_id))?;
        let index = track.index();

        let shadow_ref = self
            .pool
            .allocate(TrackKind::Shadow, source.sound_id, source.group)?;
        let new_output = self.sink.create_queue(sound.sample_rate(), source.mixer_flags);

        if let Some(shadow) = self.pool.get_mut(shadow_ref) {
            let slot = shadow.slot;
            *shadow = source;
            shadow.slot = slot;
            shadow.kind = TrackKind::Shadow;
            shadow.hook_id = 0;
            shadow.region_offset = 0;
            shadow.pcm12_carry = 0;
            shadow.pending_removal = false;
            begin_fade(shadow, 0, fade_ticks, &self.profile);
            debug!(
                from = index,
                shadow = slot,
                region = shadow.current_region,
                fade_ticks,
                "crossfade shadow spawned"
            );
        }
        if let Some(track) = self.pool.slot_mut(index) {
            track.output = Some(new_output);
        }
        Ok(shadow_ref)
    }

    /// Apply an armed trigger to the track that just entered `region`
    fn fire_trigger(&mut self, index: usize, region: usize, trigger: &Trigger) -> bool {
        debug!(
            slot = index,
            region,
            marker = %trigger.marker,
            delay = trigger.fade_out_delay_ticks,
            "trigger reached"
        );
        if let Some(track_ref) = self.pool.ref_for(index)
            && let Err(e) = self.crossfade(track_ref, trigger.fade_out_delay_ticks)
        {
            warn!(slot = index, "trigger crossfade skipped: {e}");
        }

        match trigger.follow_up {
            Some(follow_up) => self.continue_with(index, follow_up),
            None => {
                let Some(track) = self.pool.slot_mut(index) else {
                    return false;
                };
                let count = track.sound.as_ref().map_or(0, |s| s.region_count());
                if region + 1 >= count {
                    self.release_slot(index, "trigger at last region");
                    return false;
                }
                track.current_region = (region + 1) as i32;
                track.region_offset = 0;
                track.hook_id = 0;
                true
            }
        }
    }

    /// Rebind a track to the trigger's follow-up sound at region 0
    fn continue_with(&mut self, index: usize, follow_up: SoundId) -> bool {
        let elsewhere = self
            .pool
            .find_primary(follow_up)
            .is_some_and(|r| r.index() != index);
        if elsewhere {
            self.release_slot(index, "follow-up already playing");
            return false;
        }

        let descriptor = match self
            .store
            .open_sound(follow_up)
            .and_then(|d| d.validate().map(|()| d))
        {
            Ok(d) => d,
            Err(e) => {
                warn!(sound = %follow_up, "follow-up sound unavailable: {e}");
                self.release_slot(index, "follow-up unavailable");
                return false;
            }
        };

        let Some(track) = self.pool.slot_mut(index) else {
            return false;
        };
        let old_output = track.output.take();
        track.bind_sound(descriptor.clone());
        track.current_region = 0;
        track.region_offset = 0;
        track.hook_id = 0;
        let flags = track.mixer_flags;

        if let Some(output) = old_output {
            self.sink.finish(output);
        }
        let output = self.sink.create_queue(descriptor.sample_rate(), flags);
        if let Some(track) = self.pool.slot_mut(index) {
            track.output = Some(output);
        }
        debug!(slot = index, sound = %follow_up, "continuing with follow-up sound");
        true
    }
}

/// Crossfade length in ticks for a jump's fade delay
fn fade_ticks_for(fade_delay_ms: u32, fps: u32) -> i32 {
    i32::try_from(u64::from(fade_delay_ms) * u64::from(fps) / 1000).unwrap_or(i32::MAX)
}
