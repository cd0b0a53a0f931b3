use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;

use super::registry::Aspect;

/// Request accounting for the last closed window.
///
/// The `*_per_minute` names are kept for consumers that already parse them;
/// `window_secs` states the window they actually cover.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CounterSnapshot {
    pub request_sum_per_minute: u64,
    pub requests_per_minute: BTreeMap<String, u64>,
    pub request_codes_per_minute: BTreeMap<u16, u64>,
    pub window_secs: u64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct CounterWindow {
    total: u64,
    by_path: BTreeMap<String, u64>,
    by_code: BTreeMap<u16, u64>,
}

/// Request counter, exposed as `Counter`.
pub struct CounterAspect {
    window: Mutex<CounterWindow>,
    flush_lock: Mutex<()>,
    published: RwLock<Arc<CounterSnapshot>>,
    window_secs: u64,
}

impl CounterAspect {
    pub const NAME: &'static str = "Counter";

    /// `window` is the flush interval this counter is driven at.
    pub fn new(window: Duration) -> Self {
        let window_secs = window.as_secs();
        Self {
            window: Mutex::new(CounterWindow::default()),
            flush_lock: Mutex::new(()),
            published: RwLock::new(Arc::new(CounterWindow::default().publish(window_secs))),
            window_secs,
        }
    }

    pub fn record(&self, path: &str, status: u16) {
        let mut w = self.window.lock();
        w.total += 1;
        // avoid allocating the key for paths already seen this window
        match w.by_path.get_mut(path) {
            Some(n) => *n += 1,
            None => {
                w.by_path.insert(path.to_owned(), 1);
            }
        }
        *w.by_code.entry(status).or_insert(0) += 1;
    }

    pub fn flush(&self) -> Arc<CounterSnapshot> {
        let _serial = self.flush_lock.lock();

        let closed = std::mem::take(&mut *self.window.lock());
        let snap = Arc::new(closed.publish(self.window_secs));
        tracing::debug!(requests = snap.request_sum_per_minute, "counter window flushed");

        *self.published.write() = Arc::clone(&snap);
        snap
    }

    pub fn snapshot(&self) -> Arc<CounterSnapshot> {
        Arc::clone(&self.published.read())
    }
}

impl CounterWindow {
    fn publish(self, window_secs: u64) -> CounterSnapshot {
        CounterSnapshot {
            request_sum_per_minute: self.total,
            requests_per_minute: self.by_path,
            request_codes_per_minute: self.by_code,
            window_secs,
            timestamp: Utc::now(),
        }
    }
}

impl Aspect for CounterAspect {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn stats(&self) -> serde_json::Value {
        serde_json::to_value(&*self.snapshot()).unwrap_or_default()
    }

    fn flush(&self) {
        CounterAspect::flush(self);
    }
}
