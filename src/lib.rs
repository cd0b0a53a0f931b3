//! Windowed request metrics for axum services.
//!
//! Request-path code feeds aspects (counter, latency, named series);
//! a scheduler flushes each aspect on a fixed period into an immutable
//! snapshot; the monitor endpoint serves the latest snapshots as JSON.

pub mod config;
pub mod error;
pub mod handlers;
pub mod logging;
pub mod metrics;
pub mod middleware;
pub mod server;

pub use error::{MonitorError, Result};
