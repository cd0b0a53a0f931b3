use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;

use super::registry::Aspect;
use super::stats::Summary;

/// Request-latency distribution of the last closed window, in nanoseconds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LatencySnapshot {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub stdev: f64,
    pub p90: f64,
    pub p95: f64,
    pub p99: f64,
    pub timestamp: DateTime<Utc>,
}

impl LatencySnapshot {
    fn from_summary(s: Summary, timestamp: DateTime<Utc>) -> Self {
        Self {
            min: s.min,
            max: s.max,
            mean: s.mean,
            stdev: s.stdev,
            p90: s.p90,
            p95: s.p95,
            p99: s.p99,
            timestamp,
        }
    }
}

/// Single unnamed latency series, exposed as `RequestTime`.
///
/// A window with one sample or none does not replace the published
/// snapshot; a one-point distribution says nothing about spread.
pub struct RequestTimeAspect {
    samples: Mutex<Vec<f64>>,
    flush_lock: Mutex<()>,
    published: RwLock<Arc<LatencySnapshot>>,
}

impl Default for RequestTimeAspect {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestTimeAspect {
    pub const NAME: &'static str = "RequestTime";

    pub fn new() -> Self {
        Self {
            samples: Mutex::new(Vec::new()),
            flush_lock: Mutex::new(()),
            published: RwLock::new(Arc::new(LatencySnapshot::from_summary(
                Summary::default(),
                Utc::now(),
            ))),
        }
    }

    pub fn record(&self, elapsed: Duration) {
        self.record_nanos(elapsed.as_nanos() as f64);
    }

    pub fn record_nanos(&self, nanos: f64) {
        self.samples.lock().push(nanos);
    }

    /// Close the window. Returns the snapshot that is published afterwards,
    /// which is the previous one when the window held fewer than two samples.
    pub fn flush(&self) -> Arc<LatencySnapshot> {
        let _serial = self.flush_lock.lock();

        let mut window = std::mem::take(&mut *self.samples.lock());
        if window.len() <= 1 {
            tracing::trace!(samples = window.len(), "latency window too small, keeping previous");
            return self.snapshot();
        }

        let summary = Summary::compute(&mut window);
        let snap = Arc::new(LatencySnapshot::from_summary(summary, Utc::now()));
        tracing::debug!(samples = summary.count, p99_ns = summary.p99, "latency window flushed");

        *self.published.write() = Arc::clone(&snap);
        snap
    }

    pub fn snapshot(&self) -> Arc<LatencySnapshot> {
        Arc::clone(&self.published.read())
    }

    /// Samples recorded since the last flush.
    pub fn pending(&self) -> usize {
        self.samples.lock().len()
    }
}

impl Aspect for RequestTimeAspect {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn stats(&self) -> serde_json::Value {
        serde_json::to_value(&*self.snapshot()).unwrap_or_default()
    }

    fn flush(&self) {
        RequestTimeAspect::flush(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flushed_with(values: &[f64]) -> RequestTimeAspect {
        let rt = RequestTimeAspect::new();
        for &v in values {
            rt.record_nanos(v);
        }
        rt.flush();
        rt
    }

    #[test]
    fn flush_resets_buffer() {
        let rt = flushed_with(&[1.0, 2.0, 3.0]);
        rt.record_nanos(5.0);
        assert_eq!(rt.pending(), 1);
    }

    #[test]
    fn summarises_window() {
        let mut values = vec![0.0];
        values.extend((0..100).map(f64::from));
        let rt = flushed_with(&values);
        let s = rt.snapshot();

        assert_eq!(s.min, 0.0);
        assert_eq!(s.max, 99.0);
        assert!((s.mean - 49.0099).abs() < 0.001);
        assert!((s.stdev - 29.01).abs() / 29.01 < 0.01);
        assert_eq!(s.p90, 89.0);
        assert_eq!(s.p95, 94.0);
        assert_eq!(s.p99, 98.0);
    }

    #[test]
    fn single_sample_keeps_previous_snapshot() {
        let rt = flushed_with(&[10.0, 20.0]);
        let before = rt.snapshot();

        rt.record_nanos(1_000.0);
        let after = rt.flush();

        assert_eq!(*after, *before);
        assert_eq!(rt.pending(), 0);
    }

    #[test]
    fn empty_window_keeps_previous_snapshot() {
        let rt = flushed_with(&[10.0, 20.0]);
        let before = rt.snapshot();
        assert!(Arc::ptr_eq(&rt.flush(), &before));
    }

    #[test]
    fn record_converts_durations_to_nanos() {
        let rt = RequestTimeAspect::new();
        rt.record(Duration::from_micros(3));
        rt.record(Duration::from_micros(5));
        let s = rt.flush();
        assert_eq!(s.min, 3_000.0);
        assert_eq!(s.max, 5_000.0);
    }

    #[test]
    fn exposed_under_request_time() {
        let rt = RequestTimeAspect::new();
        assert_eq!(Aspect::name(&rt), "RequestTime");
        assert!(!rt.in_root());
    }
}
