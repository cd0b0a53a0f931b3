pub mod buffer;
pub mod counter;
pub mod latency;
pub mod registry;
pub mod scheduler;
pub mod stats;
pub mod stream;
pub mod window;

pub use counter::{CounterAspect, CounterSnapshot};
pub use latency::{LatencySnapshot, RequestTimeAspect};
pub use registry::{Aspect, MetricRegistry};
pub use scheduler::Scheduler;
pub use window::{SeriesSnapshots, WindowAggregator, WindowSnapshot};

/// A single named observation for a multi-series aspect.
/// This is the "write" side: producers create these and push them in.
#[derive(Debug, Clone, PartialEq)]
pub struct DataPoint {
    /// Series the value belongs to, e.g. "db_query_ns"
    pub name: String,
    pub value: f64,
}

impl DataPoint {
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}
