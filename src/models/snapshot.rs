//! The authoritative `MarketSnapshot` wire schema. Field names and JSON casing
//! are part of the external contract: consumers depend on them, so every struct here pins
//! `#[serde(rename_all = "camelCase")]` rather than relying on Rust's default snake_case.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::abc::{AbcResult, MarketRegime, PriceTarget};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BayesianMetrics {
    pub drift: f64,
    pub volatility: f64,
    pub confidence: f64,
    pub sample_size: usize,
    pub prior_mean: f64,
    pub prior_variance: f64,
}

/// Legacy forecast block. Only `predictions`/`confidence_interval_*` consume
/// `arima.horizon.periods`; the ABC pipeline itself ignores this field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArimaForecast {
    pub predictions: Vec<f64>,
    pub confidence_interval_lower: Vec<f64>,
    pub confidence_interval_upper: Vec<f64>,
    pub horizon: usize,
    /// Preserved verbatim even though the implemented model is Holt's double exponential
    /// smoothing, not a fitted ARIMA(1,1,1) — the string is part of the wire contract.
    pub model_order: String,
    pub aic: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonteCarloResults {
    pub simulations: usize,
    pub probability_up: f64,
    pub probability_down: f64,
    pub expected_return: f64,
    pub value_at_risk_95: f64,
    pub value_at_risk_99: f64,
    pub conditional_va_r: f64,
    pub percentiles: Vec<PriceTarget>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketSnapshot {
    pub symbol: String,
    pub timestamp: DateTime<Utc>,
    pub current_price: f64,
    pub market_state: MarketRegime,
    pub bayesian_metrics: BayesianMetrics,
    pub arima_forecast: ArimaForecast,
    pub monte_carlo_results: MonteCarloResults,
    pub abc_analysis: AbcResult,
}

impl MarketSnapshot {
    pub fn from_abc(
        symbol: String,
        timestamp: DateTime<Utc>,
        current_price: f64,
        sample_size: usize,
        arima_horizon_periods: usize,
        n_simulations: usize,
        abc: AbcResult,
    ) -> Self {
        let bayesian_metrics = BayesianMetrics {
            drift: abc.momentum_metrics.drift,
            volatility: abc.momentum_metrics.volatility,
            confidence: abc.momentum_metrics.confidence,
            sample_size,
            prior_mean: abc.momentum_metrics.prior_mean,
            prior_variance: abc.momentum_metrics.prior_variance,
        };

        // Legacy forecast path: a flat projection from the Holt trend, independent of the
        // ABC pipeline: `ARIMA_HORIZON_PERIODS` only feeds this, never the core.
        let mut predictions = Vec::with_capacity(arima_horizon_periods);
        let mut lower = Vec::with_capacity(arima_horizon_periods);
        let mut upper = Vec::with_capacity(arima_horizon_periods);
        let band = current_price * abc.momentum_metrics.volatility.max(0.01);
        for step in 1..=arima_horizon_periods {
            let projected = current_price + abc.arima_signal.trend * step as f64;
            predictions.push(projected);
            lower.push(projected - band);
            upper.push(projected + band);
        }

        let arima_forecast = ArimaForecast {
            predictions,
            confidence_interval_lower: lower,
            confidence_interval_upper: upper,
            horizon: arima_horizon_periods,
            model_order: "ARIMA(1,1,1)".to_string(),
            aic: 0.0,
        };

        let monte_carlo_results = MonteCarloResults {
            simulations: n_simulations,
            probability_up: abc.market_prediction.probability_up,
            probability_down: abc.market_prediction.probability_down,
            expected_return: abc.market_prediction.expected_return,
            value_at_risk_95: abc.market_prediction.value_at_risk_95,
            value_at_risk_99: abc.market_prediction.value_at_risk_99,
            conditional_va_r: abc.market_prediction.conditional_value_at_risk,
            percentiles: abc.market_prediction.price_targets.clone(),
        };

        Self {
            symbol,
            timestamp,
            current_price,
            market_state: abc.market_regime,
            bayesian_metrics,
            arima_forecast,
            monte_carlo_results,
            abc_analysis: abc,
        }
    }
}
