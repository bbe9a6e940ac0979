//! Progress display math.

/// Fraction of the subject covered at `index`, in `[0.0, 1.0]`.
///
/// The denominator is `total - 1` floored at 1, so a one-sentence subject
/// reports 0.0 rather than dividing by zero.
pub fn progress_fraction(index: usize, total: usize) -> f32 {
    if total == 0 {
        return 0.0;
    }
    let denom = total.saturating_sub(1).max(1);
    (index as f32 / denom as f32).clamp(0.0, 1.0)
}

/// Human-readable position, e.g. `"2 / 10"`.
pub fn position_label(index: usize, total: usize) -> String {
    if total == 0 {
        return "0 / 0".to_string();
    }
    format!("{} / {}", index + 1, total)
}
