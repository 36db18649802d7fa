//! Per-tick pass
//!
//! Slots are collected up front, so shadows spawned by a transition during
//! this pass are first processed on the next tick.

use tracing::{error, trace, warn};

use super::TrackEngine;
use crate::ducking::{apply_ducking, detect_speech, effective_volume};
use crate::fade::{FadeOutcome, advance_fade};
use crate::feed::{read_chunk, tick_quota};

impl TrackEngine {
    /// Run one scheduler tick over every active track
    pub fn tick(&mut self) {
        if self.paused {
            return;
        }
        self.music_timer += 1;

        let ready = self.sink.is_ready();
        self.speech_active = detect_speech(&self.pool);
        let tick_ms = 1000 / self.config.callback_fps.max(1);

        for index in self.pool.active_slots() {
            self.tick_track(index, ready, tick_ms);
        }
    }

    fn tick_track(&mut self, index: usize, ready: bool, tick_ms: u32) {
        let Some(track) = self.pool.slot_mut(index) else {
            return;
        };

        if advance_fade(track, &self.profile) == FadeOutcome::Release {
            self.release_slot(index, "fade finished");
            return;
        }
        apply_ducking(track, self.speech_active, &self.profile, tick_ms);
        let stream_owned = track.stream_owned;

        if !ready {
            return;
        }
        if !stream_owned && !self.feed_track(index) {
            return;
        }

        let Some(track) = self.pool.slot(index) else {
            return;
        };
        if let Some(output) = track.output {
            let volume = effective_volume(track, &self.profile);
            let pan = track.pan;
            self.sink.set_channel_volume_balance(output, volume, pan);
        }
    }

    /// Push this tick's quota for one track; false once the track is gone
    fn feed_track(&mut self, index: usize) -> bool {
        let fresh = self
            .pool
            .slot(index)
            .is_some_and(|t| t.current_region == -1);
        if fresh && !self.switch_region(index) {
            return false;
        }

        let fps = self.config.callback_fps;
        let Some(track) = self.pool.slot(index) else {
            return false;
        };
        let (Some(sound), Some(output)) = (track.sound.clone(), track.output) else {
            error!(slot = index, "track has no sound or output bound");
            self.release_slot(index, "unbound");
            return false;
        };
        let drained = self.sink.is_drained(output);
        let mut quota = tick_quota(track, &sound, fps, drained);
        // Region changes in a row that yielded no data
        let mut idle_switches = 0;

        while quota > 0 {
            let Some(track) = self.pool.slot_mut(index) else {
                return false;
            };
            let (Some(sound), Some(output)) = (track.sound.clone(), track.output) else {
                return false;
            };
            let radio = self.radio_chatter && sound.id().0 == self.config.radio_chatter_sound;

            let chunk = match read_chunk(track, &sound, quota, radio) {
                Ok(chunk) => chunk,
                Err(e) => {
                    error!(sound = %sound.id(), slot = index, "feed failed: {e}");
                    self.release_slot(index, "feed error");
                    return false;
                }
            };
            let flags = track.mixer_flags;
            let taken = chunk.data.len();
            let reached_end = chunk.reached_end();
            trace!(slot = index, region = track.current_region, taken, status = ?chunk.status, "fed");
            if !chunk.data.is_empty() {
                self.sink.enqueue(output, chunk.data, flags);
            }
            quota = quota.saturating_sub(taken);

            if !reached_end {
                break;
            }
            if taken == 0 {
                idle_switches += 1;
                if idle_switches > sound.region_count() {
                    warn!(
                        sound = %sound.id(),
                        slot = index,
                        "regions yield no data, feed deferred"
                    );
                    break;
                }
            } else {
                idle_switches = 0;
            }
            if !self.switch_region(index) {
                return false;
            }
        }
        true
    }
}
