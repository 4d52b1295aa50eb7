//! Process configuration, loaded from the environment.
//!
//! `Config::from_env` loads `dotenvy::dotenv().ok()` then falls back to a literal default
//! for every key, never hard-failing on a missing variable.

#[derive(Debug, Clone)]
pub struct Config {
    /// Symbols subscribed on the exchange feed, lowercase (e.g. "btc").
    pub binance_symbols: Vec<String>,
    /// Exchange combined-stream endpoint.
    pub binance_stream_url: String,
    /// Symbols the analytics scheduler generates snapshots for, uppercase canonical form.
    pub analytics_symbols: Vec<String>,
    pub analytics_snapshot_interval_secs: u64,
    /// Symbols the broadcaster serves.
    pub broadcast_symbols: Vec<String>,
    pub broadcast_interval_secs: u64,
    pub monte_carlo_simulations: usize,
    pub monte_carlo_horizon_days: usize,
    /// Legacy field: only the deprecated `arimaForecast.predictions` path consumes this.
    pub arima_horizon_periods: usize,
    pub window_max: usize,
    pub http_port: u16,
    /// Fixed seed for the Monte Carlo PRNG. Unset in production (seeded from OS entropy);
    /// tests pin this so simulation outputs are reproducible.
    pub monte_carlo_seed: Option<u64>,
}

fn env_string(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn split_csv(s: &str) -> Vec<String> {
    s.split(',')
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect()
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let binance_symbols = split_csv(&env_string("BINANCE_SYMBOLS", "btc,eth,bnb,sol,xrp"));

        let analytics_symbols = match std::env::var("ANALYTICS_SYMBOLS") {
            Ok(v) => split_csv(&v),
            Err(_) => binance_symbols
                .iter()
                .map(|s| s.to_ascii_uppercase())
                .collect(),
        };

        let broadcast_symbols = match std::env::var("BROADCAST_SYMBOLS") {
            Ok(v) => split_csv(&v),
            Err(_) => analytics_symbols.clone(),
        };

        Ok(Self {
            binance_symbols,
            binance_stream_url: env_string(
                "BINANCE_STREAM_URL",
                "wss://stream.binance.com:9443/stream",
            ),
            analytics_symbols,
            analytics_snapshot_interval_secs: env_parse("ANALYTICS_SNAPSHOT_INTERVAL_SECS", 5),
            broadcast_symbols,
            broadcast_interval_secs: env_parse("BROADCAST_INTERVAL_SECS", 1),
            monte_carlo_simulations: env_parse("MONTE_CARLO_SIMULATIONS", 10_000),
            monte_carlo_horizon_days: env_parse("MONTE_CARLO_HORIZON_DAYS", 7),
            arima_horizon_periods: env_parse("ARIMA_HORIZON_PERIODS", 7),
            window_max: env_parse("WINDOW_MAX", 500),
            http_port: env_parse("HTTP_PORT", 8080),
            monte_carlo_seed: std::env::var("MONTE_CARLO_SEED")
                .ok()
                .and_then(|v| v.parse().ok()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_csv_trims_and_drops_empties() {
        assert_eq!(split_csv("btc, eth ,,sol"), vec!["btc", "eth", "sol"]);
    }
}
