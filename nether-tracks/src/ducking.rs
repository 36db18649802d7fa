//! Speech ducking and output gain
//!
//! While any primary voice-group track plays, music-group tracks (shadows
//! included) ramp their `gain_reduction` toward the profile's ducking
//! target. The ramp runs in the curve's linear domain and covers a fixed
//! fraction of the remaining distance each tick:
//!
//! ```text
//! step = (target - current) * tick_ms / (tick_ms + window_ms)
//! ```
//!
//! so it always takes several ticks. When speech stops the reduction drops
//! to zero on the next tick.

use tracing::trace;

use crate::config::MixProfile;
use crate::curve::{linear_to_perceptual, perceptual_to_linear};
use crate::pool::TrackPool;
use crate::track::{Track, TrackKind, VolumeGroup};
use crate::{MAX_VOLUME, VOLUME_UNIT};

/// Whether a primary voice-group track is playing
pub fn detect_speech(pool: &TrackPool) -> bool {
    pool.iter()
        .any(|t| t.kind == TrackKind::Primary && t.group == VolumeGroup::Voice)
}

/// Update one track's gain reduction for this tick
pub fn apply_ducking(track: &mut Track, speech_active: bool, profile: &MixProfile, tick_ms: u32) {
    if track.group != VolumeGroup::Music {
        track.gain_reduction = 0;
        return;
    }
    let Some(ducking) = profile.ducking.as_ref() else {
        track.gain_reduction = 0;
        return;
    };

    if !speech_active {
        if track.gain_reduction > 0 {
            trace!(slot = track.slot, "ducking released");
        }
        track.gain_reduction = 0;
        return;
    }

    let target = ducking.target.clamp(0, MAX_VOLUME);
    if track.gain_reduction >= target {
        track.gain_reduction = target;
        return;
    }

    let current = perceptual_to_linear(track.gain_reduction, ducking.steepness);
    let goal = perceptual_to_linear(target, ducking.steepness);
    let tick_ms = i64::from(tick_ms.max(1));
    let span = tick_ms + i64::from(ducking.window_ms);
    let step = ((i64::from(goal - current) * tick_ms) / span).max(1) as i32;

    let next = linear_to_perceptual(current + step, ducking.steepness);
    // Rounding in the curve must not stall the ramp
    track.gain_reduction = next.max(track.gain_reduction + 1).min(target);
}

/// Output channel gain for a track (0..=255)
///
/// `volume - gain_reduction` on the public 0..=127 scale, times the
/// profile's multiplier for the track's group.
pub fn effective_volume(track: &Track, profile: &MixProfile) -> u8 {
    let level = (track.volume - track.gain_reduction).max(0) / VOLUME_UNIT;
    let mix = match track.group {
        VolumeGroup::Music => profile.music_mix,
        VolumeGroup::Voice => profile.voice_mix,
        VolumeGroup::Sfx => profile.sfx_mix,
    };
    (level as f32 * mix).round().clamp(0.0, 255.0) as u8
}
