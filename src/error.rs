//! Crate-wide error type.
//!
//! Only setup paths (config loading, aspect registration, binding) can
//! fail. Ingestion and flushing never return errors.

use thiserror::Error;

/// Shared result type.
pub type Result<T> = std::result::Result<T, MonitorError>;

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("aspect already registered: {0}")]
    DuplicateAspect(String),
    #[error("aspect name is reserved by the monitor endpoint: {0}")]
    ReservedName(String),
}
