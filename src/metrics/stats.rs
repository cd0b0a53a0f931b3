//! Order statistics over one closed window.
//!
//! All functions take the samples already sorted ascending. Callers must
//! not pass an empty slice to [`mean`] or [`percentile`]; [`Summary::compute`]
//! is the empty-safe entry point.

/// Arithmetic mean. `sorted` must be non-empty.
pub fn mean(sorted: &[f64]) -> f64 {
    debug_assert!(!sorted.is_empty());
    sorted.iter().sum::<f64>() / sorted.len() as f64
}

/// Nearest-rank percentile, `p` in `[0, 1]`.
///
/// Index is `floor(p * len)` clamped to `len - 1`, so `p = 0.99` on a
/// short window returns the maximum rather than reading past the end.
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    debug_assert!(!sorted.is_empty());
    sorted[rank(sorted.len(), p)]
}

/// Index used by [`percentile`] for a window of `len` samples.
pub fn rank(len: usize, p: f64) -> usize {
    let idx = (p * len as f64).floor() as usize;
    idx.min(len.saturating_sub(1))
}

/// Bessel-corrected sample standard deviation.
///
/// Undefined for fewer than two samples; returns `0.0` in that case.
pub fn sample_stdev(sorted: &[f64], mean: f64) -> f64 {
    let n = sorted.len();
    if n < 2 {
        return 0.0;
    }
    let sum_sq: f64 = sorted.iter().map(|x| (x - mean).powi(2)).sum();
    (sum_sq / (n - 1) as f64).sqrt()
}

/// The full statistics pipeline for one window.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Summary {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub stdev: f64,
    pub p90: f64,
    pub p95: f64,
    pub p99: f64,
}

impl Summary {
    /// Sort `samples` in place and summarise them.
    /// An empty window yields the all-zero summary.
    pub fn compute(samples: &mut [f64]) -> Self {
        if samples.is_empty() {
            return Self::default();
        }
        samples.sort_unstable_by(f64::total_cmp);

        let m = mean(samples);
        Self {
            count: samples.len(),
            min: samples[0],
            max: samples[samples.len() - 1],
            mean: m,
            stdev: sample_stdev(samples, m),
            p90: percentile(samples, 0.90),
            p95: percentile(samples, 0.95),
            p99: percentile(samples, 0.99),
        }
    }
}
