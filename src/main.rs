//! Streaming market-data analytics service entry point: wires ingest, the tick bus, the
//! window store, the analytics scheduler, the snapshot store, and the broadcaster together,
//! with graceful shutdown fanned out to every background task.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::{routing::get, Router};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use market_analytics::broadcast::{self, BroadcastState, SubscriberRegistry};
use market_analytics::bus::TickBus;
use market_analytics::config::Config;
use market_analytics::ingest::{self, IngestMetrics};
use market_analytics::metrics::AppMetrics;
use market_analytics::scheduler::{self, AnalyticsMetrics};
use market_analytics::snapshot_store::SnapshotStore;
use market_analytics::window::WindowStore;

#[derive(Clone)]
struct HealthState {
    metrics: Arc<AppMetrics>,
    windows: Arc<WindowStore>,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let config = Arc::new(Config::from_env().context("failed to load configuration")?);

    info!(
        binance_symbols = ?config.binance_symbols,
        analytics_symbols = ?config.analytics_symbols,
        "market analytics service starting"
    );

    let bus = Arc::new(TickBus::new());
    let windows = Arc::new(WindowStore::new(config.window_max));
    let snapshots = Arc::new(SnapshotStore::new());
    let registry = Arc::new(SubscriberRegistry::new());

    let ingest_metrics = Arc::new(IngestMetrics::default());
    let analytics_metrics = Arc::new(AnalyticsMetrics::default());
    let app_metrics = Arc::new(AppMetrics {
        ingest: ingest_metrics.clone(),
        analytics: analytics_metrics.clone(),
    });

    let (shutdown_tx, _) = tokio::sync::broadcast::channel::<()>(1);

    // Ingest loop: connects to the exchange, decodes frames, publishes to the bus.
    let ingest_handle = {
        let stream_url = config.binance_stream_url.clone();
        let symbols = config.binance_symbols.clone();
        let bus = bus.clone();
        let metrics = ingest_metrics.clone();
        let shutdown_rx = shutdown_tx.subscribe();
        tokio::spawn(async move {
            ingest::binance::run(stream_url, symbols, &bus, &metrics, shutdown_rx).await;
        })
    };

    // Bridges bus deliveries into the window store.
    let bridge_handle = {
        let mut rx = bus.subscribe(ingest::MARKET_STREAM_CHANNEL);
        let windows = windows.clone();
        let mut shutdown_rx = shutdown_tx.subscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    tick = rx.recv() => {
                        match tick {
                            Ok(tick) => windows.append(tick),
                            Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                                tracing::warn!(skipped = n, "window bridge lagged behind bus");
                            }
                            Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                        }
                    }
                    _ = shutdown_rx.recv() => break,
                }
            }
        })
    };

    let analytics_handle = {
        let symbols = config.analytics_symbols.clone();
        let windows = windows.clone();
        let snapshots = snapshots.clone();
        let config = config.clone();
        let metrics = analytics_metrics.clone();
        let interval = Duration::from_secs(config.analytics_snapshot_interval_secs);
        let shutdown_rx = shutdown_tx.subscribe();
        tokio::spawn(async move {
            scheduler::run_analytics_scheduler(symbols, windows, snapshots, config, metrics, interval, shutdown_rx)
                .await;
        })
    };

    let broadcast_state = BroadcastState {
        registry: registry.clone(),
        snapshots: snapshots.clone(),
    };

    let broadcast_handle = {
        let state = broadcast_state.clone();
        let interval = Duration::from_secs(config.broadcast_interval_secs);
        let shutdown_rx = shutdown_tx.subscribe();
        tokio::spawn(async move {
            broadcast::run_broadcast_scheduler(state, interval, shutdown_rx).await;
        })
    };

    let health_state = HealthState {
        metrics: app_metrics.clone(),
        windows: windows.clone(),
    };

    let app = Router::new()
        .route("/health", get(move || health_handler(health_state.clone())))
        .route("/ws/market/:symbol", get(broadcast::websocket_handler))
        .with_state(broadcast_state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr = format!("0.0.0.0:{}", config.http_port);
    let listener = TcpListener::bind(&addr).await?;
    info!(addr, "http server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown_tx.clone()))
        .await
        .context("server error")?;

    for handle in [ingest_handle, bridge_handle, analytics_handle, broadcast_handle] {
        let _ = handle.await;
    }

    info!(metrics = ?app_metrics.snapshot(), "shutdown complete");
    Ok(())
}

/// Reports ingest/analytics counters and tracked symbol count, since there is no metrics
/// exporter elsewhere in the process to check these against.
async fn health_handler(state: HealthState) -> axum::Json<serde_json::Value> {
    let tracked_symbols = state.windows.symbols();
    axum::Json(serde_json::json!({
        "status": "ok",
        "trackedSymbols": tracked_symbols.len(),
        "metrics": state.metrics.snapshot(),
    }))
}

async fn shutdown_signal(shutdown_tx: tokio::sync::broadcast::Sender<()>) {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received");
    let _ = shutdown_tx.send(());
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "market_analytics=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
