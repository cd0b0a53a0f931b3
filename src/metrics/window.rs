use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;

use super::buffer::{Push, SampleBuffer};
use super::registry::Aspect;
use super::stats::Summary;
use super::DataPoint;

/// Published summary of one series for one closed window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WindowSnapshot {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub stdev: f64,
    pub p90: f64,
    pub p95: f64,
    pub p99: f64,
    pub timestamp: DateTime<Utc>,
}

impl WindowSnapshot {
    pub fn from_summary(s: Summary, timestamp: DateTime<Utc>) -> Self {
        Self {
            count: s.count,
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

    /// Zero-valued record for a series that received nothing this window.
    pub fn idle(timestamp: DateTime<Utc>) -> Self {
        Self::from_summary(Summary::default(), timestamp)
    }
}

/// Every series' snapshot, keyed by series name.
pub type SeriesSnapshots = BTreeMap<String, WindowSnapshot>;

/// Multi-series sampler: arbitrary `(name, value)` pairs, one summary per
/// name per window.
///
/// Writers take the buffer mutex only for an append. `flush` swaps the
/// buffers out under the same mutex, computes outside it, then replaces
/// the published `Arc`. Readers clone that `Arc` and never wait on the
/// statistics pass.
///
/// Points sent through [`WindowAggregator::channel`] are queued and drained
/// by `flush` itself, so a point whose `send` returned before a flush
/// started always belongs to the window that flush closes.
#[derive(Debug)]
pub struct WindowAggregator {
    name: String,
    buffer: Mutex<SampleBuffer>,
    inboxes: Mutex<Vec<mpsc::UnboundedReceiver<DataPoint>>>,
    // serialises whole flushes so publishes land in window order
    flush_lock: Mutex<()>,
    published: RwLock<Arc<SeriesSnapshots>>,
    rejected: AtomicU64,
    warned_capacity: AtomicBool,
}

impl WindowAggregator {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_max_series(name, None)
    }

    pub fn with_max_series(name: impl Into<String>, max_series: Option<usize>) -> Self {
        Self {
            name: name.into(),
            buffer: Mutex::new(SampleBuffer::new(max_series)),
            inboxes: Mutex::new(Vec::new()),
            flush_lock: Mutex::new(()),
            published: RwLock::new(Arc::new(SeriesSnapshots::new())),
            rejected: AtomicU64::new(0),
            warned_capacity: AtomicBool::new(false),
        }
    }

    /// Append `value` to the series `name`, creating the series on first use.
    pub fn ingest(&self, name: &str, value: f64) {
        let outcome = self.buffer.lock().push(name, value);
        self.note(outcome, name);
    }

    fn note(&self, outcome: Push, name: &str) {
        if outcome == Push::OverCapacity {
            self.rejected.fetch_add(1, Ordering::Relaxed);
            if !self.warned_capacity.swap(true, Ordering::Relaxed) {
                tracing::warn!(
                    aspect = %self.name,
                    series = name,
                    "series limit reached, dropping samples for new names"
                );
            }
        }
    }

    /// Move every queued channel point into the buffer. Receivers whose
    /// senders are all gone are dropped once empty.
    fn drain_inboxes(&self, buffer: &mut SampleBuffer) {
        let mut inboxes = self.inboxes.lock();
        inboxes.retain_mut(|rx| loop {
            match rx.try_recv() {
                Ok(point) => {
                    let outcome = buffer.push(&point.name, point.value);
                    self.note(outcome, &point.name);
                }
                Err(TryRecvError::Empty) => break true,
                Err(TryRecvError::Disconnected) => {
                    tracing::debug!(aspect = %self.name, "sample channel closed");
                    break false;
                }
            }
        });
    }

    /// Close the current window and publish one snapshot per known series.
    pub fn flush(&self) -> Arc<SeriesSnapshots> {
        let _serial = self.flush_lock.lock();

        let drained = {
            let mut buffer = self.buffer.lock();
            self.drain_inboxes(&mut buffer);
            buffer.take()
        };
        let now = Utc::now();

        let snapshots: SeriesSnapshots = drained
            .into_iter()
            .map(|(name, mut samples)| {
                let snap = if samples.is_empty() {
                    WindowSnapshot::idle(now)
                } else {
                    WindowSnapshot::from_summary(Summary::compute(&mut samples), now)
                };
                (name, snap)
            })
            .collect();

        tracing::debug!(aspect = %self.name, series = snapshots.len(), "window flushed");

        let snapshots = Arc::new(snapshots);
        *self.published.write() = Arc::clone(&snapshots);
        snapshots
    }

    /// Most recently published state.
    pub fn snapshot(&self) -> Arc<SeriesSnapshots> {
        Arc::clone(&self.published.read())
    }

    /// Samples dropped because `max_series` was reached.
    pub fn rejected_samples(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    /// Channel front door. Points are attributed to the window open when
    /// `send` returns; they become visible in the buffer at the next flush.
    pub fn channel(&self) -> mpsc::UnboundedSender<DataPoint> {
        let (tx, rx) = mpsc::unbounded_channel::<DataPoint>();
        self.inboxes.lock().push(rx);
        tx
    }
}

impl Aspect for WindowAggregator {
    fn name(&self) -> &str {
        &self.name
    }

    fn stats(&self) -> serde_json::Value {
        serde_json::to_value(&*self.snapshot()).unwrap_or_default()
    }

    fn flush(&self) {
        WindowAggregator::flush(self);
    }
}
