//! Monitor configuration (strict YAML parsing).
//!
//! Every key has a default, so an empty document or a missing file yields
//! a usable configuration. Unknown keys are rejected.

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{MonitorError, Result};

/// Interval the `*_per_minute` field names were chosen for.
pub const NOMINAL_FLUSH_SECS: u64 = 60;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MonitorConfig {
    #[serde(default)]
    pub app: AppSection,

    #[serde(default)]
    pub monitor: MonitorSection,

    /// Window length; every aspect is flushed on this cadence.
    #[serde(default = "default_flush_interval_secs")]
    pub flush_interval_secs: u64,

    /// How often the SSE endpoint pushes the exposition document.
    #[serde(default = "default_stream_interval_ms")]
    pub stream_interval_ms: u64,

    /// Upper bound on distinct series names per named-series aspect.
    #[serde(default)]
    pub max_series: Option<usize>,
}

/// The instrumented demo application.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppSection {
    #[serde(default = "default_app_listen")]
    pub listen: String,
}

/// The exposition endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MonitorSection {
    #[serde(default = "default_monitor_listen")]
    pub listen: String,
}

fn default_app_listen() -> String {
    "0.0.0.0:8080".into()
}
fn default_monitor_listen() -> String {
    "0.0.0.0:9000".into()
}
fn default_flush_interval_secs() -> u64 {
    NOMINAL_FLUSH_SECS
}
fn default_stream_interval_ms() -> u64 {
    1_000
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            listen: default_app_listen(),
        }
    }
}

impl Default for MonitorSection {
    fn default() -> Self {
        Self {
            listen: default_monitor_listen(),
        }
    }
}

impl AppSection {
    pub fn addr(&self) -> Result<SocketAddr> {
        parse_listen(&self.listen)
    }
}

impl MonitorSection {
    pub fn addr(&self) -> Result<SocketAddr> {
        parse_listen(&self.listen)
    }
}

fn parse_listen(listen: &str) -> Result<SocketAddr> {
    listen.parse().map_err(|e| {
        MonitorError::InvalidConfig(format!(
            "listen address {listen:?} is not a valid SocketAddr: {e}"
        ))
    })
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            app: AppSection::default(),
            monitor: MonitorSection::default(),
            flush_interval_secs: default_flush_interval_secs(),
            stream_interval_ms: default_stream_interval_ms(),
            max_series: None,
        }
    }
}

impl MonitorConfig {
    pub fn validate(&self) -> Result<()> {
        self.app.addr()?;
        self.monitor.addr()?;
        if self.flush_interval_secs == 0 {
            return Err(MonitorError::InvalidConfig(
                "flush_interval_secs must be > 0".into(),
            ));
        }
        if self.stream_interval_ms == 0 {
            return Err(MonitorError::InvalidConfig(
                "stream_interval_ms must be > 0".into(),
            ));
        }
        if self.max_series == Some(0) {
            return Err(MonitorError::InvalidConfig(
                "max_series must be > 0 when set".into(),
            ));
        }
        Ok(())
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_secs(self.flush_interval_secs)
    }

    pub fn stream_interval(&self) -> Duration {
        Duration::from_millis(self.stream_interval_ms)
    }
}

/// Load and validate a config file. A missing file yields the defaults.
pub fn load_from_file(path: impl AsRef<Path>) -> Result<MonitorConfig> {
    let path = path.as_ref();
    if !path.exists() {
        tracing::info!(path = %path.display(), "no config file, using defaults");
        return Ok(MonitorConfig::default());
    }
    let s = std::fs::read_to_string(path)?;
    load_from_str(&s)
}

pub fn load_from_str(s: &str) -> Result<MonitorConfig> {
    // serde_yaml maps an empty document to unit, not to an empty mapping
    let cfg: MonitorConfig = if s.trim().is_empty() {
        MonitorConfig::default()
    } else {
        serde_yaml::from_str(s)?
    };
    cfg.validate()?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let cfg = load_from_str("").unwrap();
        assert_eq!(cfg.flush_interval_secs, 60);
        assert_eq!(cfg.stream_interval_ms, 1_000);
        assert_eq!(cfg.app.listen, "0.0.0.0:8080");
        assert_eq!(cfg.monitor.listen, "0.0.0.0:9000");
        assert!(cfg.max_series.is_none());
    }

    #[test]
    fn zero_interval_is_rejected() {
        let err = load_from_str("flush_interval_secs: 0").unwrap_err();
        assert!(matches!(err, MonitorError::InvalidConfig(_)));
    }

    #[test]
    fn bad_listen_address_is_rejected() {
        let err = load_from_str("monitor:\n  listen: \"nope\"\n").unwrap_err();
        assert!(matches!(err, MonitorError::InvalidConfig(_)));
    }
}
