//! Sync score between two sample series.
//!
//! The score is the Pearson correlation of the most recent aligned samples,
//! mapped from [-1, 1] to [0, 1] and rounded to two decimals.

/// Fewer aligned samples than this yield no score.
pub const MIN_CORRELATION_SAMPLES: usize = 6;

/// Pearson correlation coefficient of the trailing `min(a.len(), b.len())`
/// samples of each series.
///
/// Returns `None` with fewer than [`MIN_CORRELATION_SAMPLES`] aligned samples
/// or when either side has zero variance.
pub fn pearson(a: &[f64], b: &[f64]) -> Option<f64> {
    let n = a.len().min(b.len());
    if n < MIN_CORRELATION_SAMPLES {
        return None;
    }
    let a = &a[a.len() - n..];
    let b = &b[b.len() - n..];

    let mean_a = a.iter().sum::<f64>() / n as f64;
    let mean_b = b.iter().sum::<f64>() / n as f64;

    let (mut cov, mut var_a, mut var_b) = (0.0, 0.0, 0.0);
    for (x, y) in a.iter().zip(b) {
        let dx = x - mean_a;
        let dy = y - mean_b;
        cov += dx * dy;
        var_a += dx * dx;
        var_b += dy * dy;
    }

    let denom = (var_a * var_b).sqrt();
    if denom <= f64::EPSILON || !denom.is_finite() {
        return None;
    }
    Some((cov / denom).clamp(-1.0, 1.0))
}

/// Normalised sync score in [0, 1], two decimals.
pub fn sync_score(a: &[f64], b: &[f64]) -> Option<f64> {
    pearson(a, b).map(|r| (((r + 1.0) / 2.0) * 100.0).round() / 100.0)
}
