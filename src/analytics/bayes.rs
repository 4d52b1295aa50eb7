//! Stage 2 — Bayesian conjugate update of the drift/volatility of log-returns, using the
//! Stage 1 trend and confidence as an informative prior.

use crate::models::abc::MomentumMetrics;
use crate::rounding::round8;

const TRADING_DAYS_PER_YEAR: f64 = 252.0;

fn log_returns(prices: &[f64]) -> Vec<f64> {
    prices
        .windows(2)
        .filter(|w| w[0] > 0.0 && w[1] > 0.0)
        .map(|w| (w[1] / w[0]).ln())
        .collect()
}

fn mean(xs: &[f64]) -> f64 {
    xs.iter().sum::<f64>() / xs.len() as f64
}

fn sample_variance(xs: &[f64], mu: f64) -> f64 {
    let n = xs.len();
    if n < 2 {
        return 0.0;
    }
    xs.iter().map(|x| (x - mu).powi(2)).sum::<f64>() / (n as f64 - 1.0)
}

/// Run Stage 2 given the Stage 1 `trend` and `arima_confidence`, and the price vector used
/// for Stage 1 (log-returns are derived from it here).
pub fn analyze(prices: &[f64], trend: f64, arima_confidence: f64, structural_break: bool) -> MomentumMetrics {
    let returns = log_returns(prices);
    let m = returns.len();

    if m == 0 {
        return MomentumMetrics::default();
    }

    let prior_mean = 10.0 * trend;
    let prior_variance = 0.01 * (2.0 - arima_confidence);
    let prior_n = 1.0 + arima_confidence;

    let sample_mean = mean(&returns);
    let sample_var = sample_variance(&returns, sample_mean);

    let post_n = prior_n + m as f64;
    let post_mean =
        (prior_n * prior_mean + m as f64 * sample_mean) / post_n;
    let post_var = (prior_n * prior_variance
        + m as f64 * sample_var
        + (prior_n * m as f64 / post_n) * (sample_mean - prior_mean).powi(2))
        / post_n;

    let drift = post_mean * TRADING_DAYS_PER_YEAR;
    let volatility = (post_var * TRADING_DAYS_PER_YEAR).max(0.0).sqrt();

    let mut confidence = 1.0 - 1.0 / ((m as f64 + 1.0).sqrt());
    if structural_break {
        confidence *= 0.7;
    }
    confidence = confidence.clamp(0.0, 1.0);

    MomentumMetrics {
        drift: round8(drift),
        volatility: round8(volatility),
        confidence: round8(confidence),
        prior_mean: round8(prior_mean),
        posterior_mean: round8(post_mean),
        prior_variance: round8(prior_variance),
        posterior_variance: round8(post_var),
    }
}
