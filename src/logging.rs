use tracing_subscriber::{fmt, EnvFilter};

/// Install the global `tracing` subscriber.
///
/// Honours `RUST_LOG`; falls back to `info` when unset or unparsable.
/// Safe to call more than once (later calls are no-ops).
pub fn init() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = fmt().with_env_filter(filter).try_init();
}
