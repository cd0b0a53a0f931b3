use std::future::IntoFuture;
use std::sync::Arc;

use aspect_monitor::config::{self, MonitorConfig, NOMINAL_FLUSH_SECS};
use aspect_monitor::handlers::AppState;
use aspect_monitor::metrics::stream::MonitorState;
use aspect_monitor::metrics::{CounterAspect, MetricRegistry, RequestTimeAspect};
use aspect_monitor::middleware::RequestAspects;
use aspect_monitor::{logging, server, Result};
use tokio::sync::watch;

const DEFAULT_CONFIG_PATH: &str = "monitor.yaml";

#[tokio::main]
async fn main() {
    logging::init();

    if let Err(e) = run().await {
        tracing::error!(error = %e, "aspect-monitor failed");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // ── 1. Load config ───────────────────────────────────────────
    let path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("MONITOR_CONFIG").ok())
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_owned());
    let cfg: MonitorConfig = config::load_from_file(&path)?;

    if cfg.flush_interval_secs != NOMINAL_FLUSH_SECS {
        tracing::warn!(
            flush_interval_secs = cfg.flush_interval_secs,
            "counter fields are named *_per_minute but cover window_secs seconds"
        );
    }

    // ── 2. Build aspects & registry ──────────────────────────────
    let counter = Arc::new(CounterAspect::new(cfg.flush_interval()));
    let latency = Arc::new(RequestTimeAspect::new());

    let registry = Arc::new(MetricRegistry::with_max_series(cfg.max_series));
    registry.register(counter.clone())?;
    registry.register(latency.clone())?;
    let custom = registry.series("Custom")?;

    // ── 3. Start flush loops ─────────────────────────────────────
    registry.start(cfg.flush_interval());

    // ── 4. Build routers ─────────────────────────────────────────
    let app = server::create_app_router(
        Arc::new(AppState {
            samples: custom.channel(),
        }),
        RequestAspects { counter, latency },
    );
    let monitor = server::create_monitor_router(Arc::new(MonitorState {
        registry: Arc::clone(&registry),
        stream_interval: cfg.stream_interval(),
    }));

    // ── 5. Bind & serve until ctrl-c ─────────────────────────────
    let app_addr = cfg.app.addr()?;
    let monitor_addr = cfg.monitor.addr()?;
    let app_listener = tokio::net::TcpListener::bind(app_addr).await?;
    let monitor_listener = tokio::net::TcpListener::bind(monitor_addr).await?;

    tracing::info!(%app_addr, %monitor_addr, "aspect-monitor listening");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to listen for ctrl-c, serving until killed");
            std::future::pending::<()>().await;
        }
        tracing::info!("shutdown requested");
        let _ = shutdown_tx.send(true);
    });

    let (app_res, monitor_res) = tokio::join!(
        axum::serve(app_listener, app)
            .with_graceful_shutdown(wait_for(shutdown_rx.clone()))
            .into_future(),
        axum::serve(monitor_listener, monitor)
            .with_graceful_shutdown(wait_for(shutdown_rx))
            .into_future(),
    );

    // ── 6. Stop flush loops ──────────────────────────────────────
    registry.shutdown().await;
    tracing::info!("aspect-monitor stopped");

    app_res?;
    monitor_res?;
    Ok(())
}

async fn wait_for(mut rx: watch::Receiver<bool>) {
    while !*rx.borrow() {
        if rx.changed().await.is_err() {
            return;
        }
    }
}
