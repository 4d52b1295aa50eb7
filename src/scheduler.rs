//! Analytics scheduler: periodic per-symbol invocation of the ABC analyzer.
//!
//! Per-symbol invocations never overlap: the scheduler awaits the analyzer (the CPU-bound
//! Monte Carlo sampling) before scheduling that symbol's next tick, but different symbols'
//! work runs concurrently via `tokio::spawn`.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rand_chacha::ChaCha8Rng;
use rand::SeedableRng;
use tracing::{info, instrument};

use crate::analytics;
use crate::config::Config;
use crate::error::SnapshotStoreError;
use crate::models::snapshot::MarketSnapshot;
use crate::snapshot_store::SnapshotStore;
use crate::window::WindowStore;

pub struct AnalyticsMetrics {
    pub snapshots_generated: std::sync::atomic::AtomicU64,
    pub cycles_skipped_insufficient_data: std::sync::atomic::AtomicU64,
}

impl Default for AnalyticsMetrics {
    fn default() -> Self {
        Self {
            snapshots_generated: std::sync::atomic::AtomicU64::new(0),
            cycles_skipped_insufficient_data: std::sync::atomic::AtomicU64::new(0),
        }
    }
}

/// Run one ABC analyzer cycle for `symbol` and persist the resulting snapshot.
#[instrument(skip(windows, snapshots, config, metrics))]
pub fn run_cycle(
    symbol: &str,
    windows: &WindowStore,
    snapshots: &SnapshotStore,
    config: &Config,
    metrics: &AnalyticsMetrics,
) -> Result<(), SnapshotStoreError> {
    let ticks = windows.snapshot(symbol);
    if ticks.len() < analytics::MIN_WINDOW {
        metrics
            .cycles_skipped_insufficient_data
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        return Ok(());
    }

    let prices: Vec<f64> = ticks.iter().map(|t| t.price_f64()).collect();
    let current_price = *prices.last().expect("checked non-empty above");

    let mut rng = match config.monte_carlo_seed {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed),
        None => ChaCha8Rng::from_entropy(),
    };

    let abc = analytics::analyze(
        &prices,
        config.monte_carlo_horizon_days,
        config.monte_carlo_simulations,
        &mut rng,
    );

    let snapshot = MarketSnapshot::from_abc(
        symbol.to_string(),
        Utc::now(),
        current_price,
        prices.len(),
        config.arima_horizon_periods,
        config.monte_carlo_simulations,
        abc,
    );

    snapshots.save(snapshot)?;
    metrics
        .snapshots_generated
        .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
    Ok(())
}

/// Periodic scheduler (default cadence 5s). Symbols run concurrently; a single
/// symbol's cycle never overlaps its own previous cycle.
pub async fn run_analytics_scheduler(
    symbols: Vec<String>,
    windows: Arc<WindowStore>,
    snapshots: Arc<SnapshotStore>,
    config: Arc<Config>,
    metrics: Arc<AnalyticsMetrics>,
    interval: Duration,
    mut shutdown: tokio::sync::broadcast::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let handles: Vec<_> = symbols
                    .iter()
                    .cloned()
                    .map(|symbol| {
                        let windows = windows.clone();
                        let snapshots = snapshots.clone();
                        let config = config.clone();
                        let metrics = metrics.clone();
                        tokio::task::spawn_blocking(move || {
                            if let Err(e) = run_cycle(&symbol, &windows, &snapshots, &config, &metrics) {
                                tracing::error!(symbol, error = %e, "analytics cycle failed");
                            }
                        })
                    })
                    .collect();
                for handle in handles {
                    let _ = handle.await;
                }
            }
            _ = shutdown.recv() => {
                info!("analytics scheduler shutting down");
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc as ChronoUtc;
    use rust_decimal::Decimal;

    fn seed_window(windows: &WindowStore, symbol: &str, n: usize) {
        for i in 0..n {
            windows.append(crate::models::Tick {
                symbol: symbol.to_string(),
                price: Decimal::from(100 + i as i64),
                volume: 1,
                timestamp: ChronoUtc::now(),
                exchange: "binance".to_string(),
                open: None,
                high: None,
                low: None,
            });
        }
    }

    fn test_config() -> Config {
        Config {
            binance_symbols: vec!["btc".to_string()],
            binance_stream_url: "wss://example.invalid".to_string(),
            analytics_symbols: vec!["BTC".to_string()],
            analytics_snapshot_interval_secs: 5,
            broadcast_symbols: vec!["BTC".to_string()],
            broadcast_interval_secs: 1,
            monte_carlo_simulations: 500,
            monte_carlo_horizon_days: 7,
            arima_horizon_periods: 7,
            window_max: 500,
            http_port: 0,
            monte_carlo_seed: Some(11),
        }
    }

    #[test]
    fn insufficient_data_skips_without_saving() {
        let windows = WindowStore::new(500);
        seed_window(&windows, "BTC", 10);
        let snapshots = SnapshotStore::new();
        let config = test_config();
        let metrics = AnalyticsMetrics::default();

        run_cycle("BTC", &windows, &snapshots, &config, &metrics).unwrap();

        assert!(snapshots.find_latest("BTC").is_none());
        assert_eq!(
            metrics
                .cycles_skipped_insufficient_data
                .load(std::sync::atomic::Ordering::Relaxed),
            1
        );
    }

    #[test]
    fn full_window_produces_and_saves_a_snapshot() {
        let windows = WindowStore::new(500);
        seed_window(&windows, "BTC", 200);
        let snapshots = SnapshotStore::new();
        let config = test_config();
        let metrics = AnalyticsMetrics::default();

        run_cycle("BTC", &windows, &snapshots, &config, &metrics).unwrap();

        assert!(snapshots.find_latest("BTC").is_some());
        assert_eq!(
            metrics.snapshots_generated.load(std::sync::atomic::Ordering::Relaxed),
            1
        );
    }
}
