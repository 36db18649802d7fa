//! Perceptual volume curve
//!
//! Fades and ducking step through a "linear" domain and store the result in
//! the perceptual (equal-power) domain the mixer consumes. Both directions
//! use a power law over the 0..=MAX_VOLUME range:
//!
//! ```text
//! linear     = MAX * (perceptual / MAX) ^ (1 + steepness)
//! perceptual = MAX * (linear     / MAX) ^ (1 / (1 + steepness))
//! ```
//!
//! `steepness = 0` is the identity, `1` is the classic equal-power
//! (square-root) relation, larger values bend harder.

use crate::MAX_VOLUME;

fn exponent(steepness: f64) -> f64 {
    1.0 + steepness.max(0.0)
}

/// Convert a linear-domain volume into the perceptual domain
pub fn linear_to_perceptual(value: i32, steepness: f64) -> i32 {
    if value <= 0 {
        return 0;
    }
    if value >= MAX_VOLUME {
        return MAX_VOLUME;
    }
    let max = MAX_VOLUME as f64;
    let mapped = (value as f64 / max).powf(1.0 / exponent(steepness));
    (mapped * max).round() as i32
}

/// Convert a perceptual-domain volume into the linear domain
pub fn perceptual_to_linear(value: i32, steepness: f64) -> i32 {
    if value <= 0 {
        return 0;
    }
    if value >= MAX_VOLUME {
        return MAX_VOLUME;
    }
    let max = MAX_VOLUME as f64;
    let mapped = (value as f64 / max).powf(exponent(steepness));
    (mapped * max).round() as i32
}
