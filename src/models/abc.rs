//! Types produced by the ABC analytical core.

use serde::{Deserialize, Serialize};

/// Stage 1 output: Holt's double exponential smoothing trend plus a CUSUM structural-break
/// flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArimaSignal {
    pub trend: f64,
    pub trend_percentage: f64,
    pub structural_break_detected: bool,
    pub confidence: f64,
    pub description: String,
    pub cusum_statistic: f64,
    pub threshold: f64,
}

impl Default for ArimaSignal {
    fn default() -> Self {
        Self {
            trend: 0.0,
            trend_percentage: 0.0,
            structural_break_detected: false,
            confidence: 0.0,
            description: "Insufficient data".to_string(),
            cusum_statistic: 0.0,
            threshold: 0.0,
        }
    }
}

/// Stage 2 output: Bayesian posterior over drift/volatility of log-returns.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MomentumMetrics {
    pub drift: f64,
    pub volatility: f64,
    pub confidence: f64,
    pub prior_mean: f64,
    pub posterior_mean: f64,
    pub prior_variance: f64,
    pub posterior_variance: f64,
}

impl Default for MomentumMetrics {
    fn default() -> Self {
        Self {
            drift: 0.0,
            volatility: 0.0,
            confidence: 0.0,
            prior_mean: 0.0,
            posterior_mean: 0.0,
            prior_variance: 0.0,
            posterior_variance: 0.0,
        }
    }
}

/// A single percentile point on the Monte Carlo terminal-price distribution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceTarget {
    pub percentile: u8,
    pub price: f64,
    pub change_percent: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MarketScenario {
    UpwardMovement,
    DownwardMovement,
    SidewaysMovement,
}

/// Stage 3 output: GBM Monte Carlo forecast with risk metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketPrediction {
    pub probability_up: f64,
    pub probability_down: f64,
    pub probability_neutral: f64,
    pub expected_price_change: f64,
    pub expected_price_change_percent: f64,
    /// Raw fractional return over the forecast horizon, independent of the 2-decimal
    /// `expected_price_change_percent` wire field.
    pub expected_return: f64,
    pub most_likely_scenario: MarketScenario,
    /// Always exactly 5 entries, percentiles [5, 25, 50, 75, 95] in this order.
    pub price_targets: Vec<PriceTarget>,
    pub value_at_risk_95: f64,
    pub value_at_risk_99: f64,
    pub conditional_value_at_risk: f64,
}

impl Default for MarketPrediction {
    fn default() -> Self {
        Self {
            probability_up: 0.0,
            probability_down: 0.0,
            probability_neutral: 1.0,
            expected_price_change: 0.0,
            expected_price_change_percent: 0.0,
            expected_return: 0.0,
            most_likely_scenario: MarketScenario::SidewaysMovement,
            price_targets: default_price_targets(),
            value_at_risk_95: 0.0,
            value_at_risk_99: 0.0,
            conditional_value_at_risk: 0.0,
        }
    }
}

fn default_price_targets() -> Vec<PriceTarget> {
    [5u8, 25, 50, 75, 95]
        .iter()
        .map(|&p| PriceTarget {
            percentile: p,
            price: 0.0,
            change_percent: 0.0,
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MarketRegime {
    BullishStable,
    BullishVolatile,
    BearishStable,
    BearishVolatile,
    NeutralStable,
    NeutralVolatile,
    RegimeChange,
    HighVolatility,
    Unknown,
}

/// The composite analytical output of one analyzer invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbcResult {
    pub arima_signal: ArimaSignal,
    pub momentum_metrics: MomentumMetrics,
    pub market_prediction: MarketPrediction,
    pub abc_integration_confidence: f64,
    pub needs_recalibration: bool,
    pub market_regime: MarketRegime,
}

impl Default for AbcResult {
    fn default() -> Self {
        Self {
            arima_signal: ArimaSignal::default(),
            momentum_metrics: MomentumMetrics::default(),
            market_prediction: MarketPrediction::default(),
            abc_integration_confidence: 0.0,
            needs_recalibration: false,
            market_regime: MarketRegime::Unknown,
        }
    }
}
