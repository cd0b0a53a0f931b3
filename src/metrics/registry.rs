//! Aspect contract and the registry the exposition layer reads from.
//!
//! An aspect is one aggregator with an exposition name. The registry
//! assembles every aspect's last published snapshot into one JSON
//! document: nested aspects appear under their name, root aspects have
//! their object fields merged into the top level.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use serde_json::{Map, Value};

use super::scheduler::Scheduler;
use super::window::WindowAggregator;
use crate::error::{MonitorError, Result};

/// Flush/publish contract shared by every aggregator variant.
pub trait Aspect: Send + Sync {
    /// Key under which the aspect is served.
    fn name(&self) -> &str;

    /// Merge into the document root instead of nesting under `name()`.
    fn in_root(&self) -> bool {
        false
    }

    /// Serialised copy of the last published snapshot.
    fn stats(&self) -> Value;

    /// Close the current window and publish its snapshot.
    fn flush(&self);
}

/// Names the monitor endpoint routes itself; an aspect with one of these
/// names could not be served on its own path.
pub const RESERVED_NAMES: &[&str] = &["stream"];

#[derive(Default)]
pub struct MetricRegistry {
    aspects: RwLock<BTreeMap<String, Arc<dyn Aspect>>>,
    channels: RwLock<BTreeMap<String, Arc<WindowAggregator>>>,
    // lock order: aspects before scheduler
    scheduler: Mutex<Option<Scheduler>>,
    max_series: Option<usize>,
}

impl MetricRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// `max_series` bounds every named-series aspect created via [`Self::series`].
    pub fn with_max_series(max_series: Option<usize>) -> Self {
        Self {
            max_series,
            ..Self::default()
        }
    }

    /// Add `aspect`. Once [`Self::start`] has run, its flush loop starts
    /// immediately.
    pub fn register(&self, aspect: Arc<dyn Aspect>) -> Result<()> {
        let name = aspect.name().to_owned();
        if RESERVED_NAMES.contains(&name.as_str()) {
            return Err(MonitorError::ReservedName(name));
        }
        let mut aspects = self.aspects.write();
        if aspects.contains_key(&name) {
            return Err(MonitorError::DuplicateAspect(name));
        }
        tracing::debug!(aspect = %name, in_root = aspect.in_root(), "aspect registered");
        if let Some(scheduler) = self.scheduler.lock().as_mut() {
            scheduler.schedule(Arc::clone(&aspect));
        }
        aspects.insert(name, aspect);
        Ok(())
    }

    /// Named-series aspect `name`, registered on first use.
    ///
    /// Fails only if a different kind of aspect already owns `name`.
    pub fn series(&self, name: &str) -> Result<Arc<WindowAggregator>> {
        if let Some(existing) = self.channels.read().get(name) {
            return Ok(Arc::clone(existing));
        }

        let mut channels = self.channels.write();
        // lost the race to another creator
        if let Some(existing) = channels.get(name) {
            return Ok(Arc::clone(existing));
        }
        let agg = Arc::new(WindowAggregator::with_max_series(name, self.max_series));
        self.register(agg.clone())?;
        channels.insert(name.to_owned(), Arc::clone(&agg));
        Ok(agg)
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Aspect>> {
        self.aspects.read().get(name).cloned()
    }

    pub fn aspects(&self) -> Vec<Arc<dyn Aspect>> {
        self.aspects.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.aspects.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.aspects.read().is_empty()
    }

    /// Flush every registered aspect once.
    pub fn flush_all(&self) {
        for aspect in self.aspects() {
            aspect.flush();
        }
    }

    /// Spawn one flush loop per registered aspect, and one for every aspect
    /// registered later. A second call while running is ignored.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&self, period: Duration) {
        let aspects = self.aspects.read();
        let mut slot = self.scheduler.lock();
        if slot.is_some() {
            tracing::warn!("flush scheduler already running");
            return;
        }

        let mut scheduler = Scheduler::new(period);
        for aspect in aspects.values() {
            scheduler.schedule(Arc::clone(aspect));
        }
        tracing::info!(
            aspects = scheduler.len(),
            period_secs = scheduler.period().as_secs_f64(),
            "flush scheduler started"
        );
        *slot = Some(scheduler);
    }

    pub fn is_running(&self) -> bool {
        self.scheduler.lock().is_some()
    }

    /// Stop every flush loop and wait for them to exit.
    pub async fn shutdown(&self) {
        let scheduler = self.scheduler.lock().take();
        if let Some(scheduler) = scheduler {
            scheduler.shutdown().await;
        }
    }

    /// Exposition document built from every aspect's published snapshot.
    pub fn document(&self) -> Value {
        let mut doc = Map::new();
        let mut root = Vec::new();

        for aspect in self.aspects() {
            if aspect.in_root() {
                root.push(aspect);
            } else {
                doc.insert(aspect.name().to_owned(), aspect.stats());
            }
        }

        for aspect in root {
            match aspect.stats() {
                Value::Object(fields) => doc.extend(fields),
                other => {
                    doc.insert(aspect.name().to_owned(), other);
                }
            }
        }

        Value::Object(doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::counter::CounterAspect;
    use crate::metrics::latency::RequestTimeAspect;
    use serde_json::json;

    struct RootAspect;

    impl Aspect for RootAspect {
        fn name(&self) -> &str {
            "Root"
        }
        fn in_root(&self) -> bool {
            true
        }
        fn stats(&self) -> Value {
            json!({ "uptime": 42 })
        }
        fn flush(&self) {}
    }

    #[test]
    fn rejects_duplicate_names() {
        let reg = MetricRegistry::new();
        reg.register(Arc::new(RequestTimeAspect::new())).unwrap();
        let err = reg.register(Arc::new(RequestTimeAspect::new())).unwrap_err();
        assert!(matches!(err, MonitorError::DuplicateAspect(n) if n == "RequestTime"));
    }

    #[test]
    fn document_nests_and_merges() {
        let reg = MetricRegistry::new();
        reg.register(Arc::new(CounterAspect::new(Duration::from_secs(60)))).unwrap();
        reg.register(Arc::new(RootAspect)).unwrap();

        let doc = reg.document();
        assert_eq!(doc["uptime"], 42);
        assert!(doc.get("Root").is_none());
        assert_eq!(doc["Counter"]["request_sum_per_minute"], 0);
    }

    #[test]
    fn series_are_created_lazily_and_shared() {
        let reg = MetricRegistry::with_max_series(Some(4));
        assert!(reg.is_empty());

        let a = reg.series("Custom").unwrap();
        let b = reg.series("Custom").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(reg.len(), 1);

        a.ingest("bar", 1.0);
        reg.flush_all();
        assert_eq!(reg.document()["Custom"]["bar"]["count"], 1);
    }

    #[test]
    fn reserved_names_are_rejected() {
        let reg = MetricRegistry::new();
        let err = reg.series("stream").unwrap_err();
        assert!(matches!(err, MonitorError::ReservedName(n) if n == "stream"));
        assert!(reg.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn series_created_after_start_are_flushed() {
        let reg = MetricRegistry::new();
        reg.register(Arc::new(CounterAspect::new(Duration::from_secs(1)))).unwrap();
        reg.start(Duration::from_secs(1));
        assert!(reg.is_running());

        let late = reg.series("Late").unwrap();
        late.ingest("x", 1.0);
        late.ingest("x", 2.0);

        tokio::time::sleep(Duration::from_millis(1_500)).await;
        let x = &late.snapshot()["x"];
        assert_eq!(x.count, 2);
        assert_eq!(x.max, 2.0);
        assert_eq!(reg.document()["Late"]["x"]["count"], 2);

        reg.shutdown().await;
        assert!(!reg.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn second_start_is_ignored() {
        let reg = MetricRegistry::new();
        let agg = reg.series("Custom").unwrap();
        reg.start(Duration::from_secs(1));
        reg.start(Duration::from_secs(1));

        agg.ingest("x", 1.0);
        tokio::time::sleep(Duration::from_millis(1_500)).await;
        assert_eq!(agg.snapshot()["x"].count, 1);

        reg.shutdown().await;
    }

    #[test]
    fn series_name_clash_with_other_aspect() {
        let reg = MetricRegistry::new();
        reg.register(Arc::new(CounterAspect::new(Duration::from_secs(60)))).unwrap();
        assert!(reg.series("Counter").is_err());
    }
}
