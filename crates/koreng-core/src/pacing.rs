//! Narration pacing — estimates how long an utterance takes to speak.
//!
//! There is no completion signal from the audio backend, so the drill waits
//! for an estimate derived from character classes. Dense-script characters
//! (Hangul syllables) take longer to say than Latin letters, digits or
//! punctuation. The estimate is an approximation and will drift from the real
//! clip length.

use std::time::Duration;

use crate::types::RateFactor;

/// Seconds per Hangul syllable.
pub const DENSE_SECS_PER_CHAR: f64 = 0.25;
/// Seconds per any other character.
pub const OTHER_SECS_PER_CHAR: f64 = 0.12;
/// Fixed synthesis/network latency allowance added to every utterance.
pub const OVERHEAD_SECS: f64 = 0.5;

/// Whether `c` belongs to the dense target orthography (U+AC00 가 ..= U+D7A3 힣).
pub fn is_dense_script(c: char) -> bool {
    ('\u{AC00}'..='\u{D7A3}').contains(&c)
}

/// Estimated narration time in seconds. Never below `OVERHEAD_SECS / divisor`.
pub fn estimate(text: &str, rate: RateFactor) -> f64 {
    let (dense, other) = text.chars().fold((0usize, 0usize), |(d, o), c| {
        if is_dense_script(c) { (d + 1, o) } else { (d, o + 1) }
    });
    let secs = dense as f64 * DENSE_SECS_PER_CHAR + other as f64 * OTHER_SECS_PER_CHAR + OVERHEAD_SECS;
    secs / rate.divisor()
}

/// [`estimate`] as a [`Duration`] for timers.
pub fn estimate_duration(text: &str, rate: RateFactor) -> Duration {
    Duration::from_secs_f64(estimate(text, rate))
}
