//! Fade controller
//!
//! A fade moves `volume` to `target` in a fixed number of ticks. The step
//! is computed in the linear domain of the profile's curve for the fade
//! direction, and each tick converts volume to that domain, applies the
//! step and converts back. With no curve configured both conversions are
//! the identity and the fade is a plain linear ramp.
//!
//! The last tick always lands exactly on the target, so `N` ticks after
//! [`begin_fade`] the volume equals the target regardless of rounding.

use tracing::trace;

use crate::MAX_VOLUME;
use crate::config::MixProfile;
use crate::curve::{linear_to_perceptual, perceptual_to_linear};
use crate::track::{FadeState, Track};

/// Result of advancing one track's fade by a tick
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FadeOutcome {
    /// No fade running
    Idle,
    /// Volume moved, target not reached yet
    Stepped,
    /// Target reached, track stays
    Reached,
    /// Fade-out finished; the track must be released
    Release,
}

fn steepness(profile: &MixProfile, fading_in: bool) -> f64 {
    let curve = if fading_in {
        profile.fade_in_steepness
    } else {
        profile.fade_out_steepness
    };
    curve.unwrap_or(0.0)
}

/// Start a fade toward `target` (internal volume scale) over `ticks` ticks
///
/// Zero ticks is treated as one: the next tick lands on the target.
pub fn begin_fade(track: &mut Track, target: i32, ticks: i32, profile: &MixProfile) {
    let target = target.clamp(0, MAX_VOLUME);
    let ticks = ticks.max(1);

    if target == track.volume {
        track.fade = FadeState {
            active: false,
            target,
            step: 0,
            ticks_remaining: 0,
        };
        return;
    }

    let fading_in = target > track.volume;
    let s = steepness(profile, fading_in);
    let from = perceptual_to_linear(track.volume, s);
    let to = perceptual_to_linear(target, s);
    let mut step = (to - from) / ticks;
    if step == 0 {
        step = if fading_in { 1 } else { -1 };
    }

    track.fade = FadeState {
        active: true,
        target,
        step,
        ticks_remaining: ticks,
    };
    trace!(
        slot = track.slot,
        from = track.volume,
        target,
        ticks,
        step,
        "fade started"
    );
}

/// Advance a track's fade by one tick
pub fn advance_fade(track: &mut Track, profile: &MixProfile) -> FadeOutcome {
    if !track.fade.active {
        return FadeOutcome::Idle;
    }

    let fade = &mut track.fade;
    let fading_out = fade.step < 0;
    fade.ticks_remaining -= 1;

    let next = if fade.ticks_remaining <= 0 {
        fade.target
    } else {
        let s = steepness(profile, !fading_out);
        let linear = perceptual_to_linear(track.volume, s) + fade.step;
        let stepped = linear_to_perceptual(linear, s);
        if fading_out {
            stepped.min(track.volume).max(fade.target)
        } else {
            stepped.max(track.volume).min(fade.target)
        }
    };
    track.volume = next;

    let reached = next == fade.target;
    if reached {
        *fade = FadeState {
            active: false,
            target: next,
            step: 0,
            ticks_remaining: 0,
        };
    }

    if fading_out && (track.volume == 0 || (reached && profile.release_on_fade_out_target)) {
        return FadeOutcome::Release;
    }
    if reached {
        FadeOutcome::Reached
    } else {
        FadeOutcome::Stepped
    }
}
