//! Stage 1 — trend estimate via Holt's double exponential smoothing, plus a CUSUM
//! structural-break test.
//!
//! The output struct is still called an "ARIMA signal" and its description string still
//! names `ARIMA(1,1,1)` downstream (see `models::snapshot::ArimaForecast`) — that name is
//! part of the wire contract the original system shipped, even though the implemented model
//! is Holt's, not a fitted ARIMA. Both are preserved since the name is part of the wire
//! contract.

use crate::models::abc::ArimaSignal;
use crate::rounding::{round2, round8};

const ALPHA: f64 = 0.3;
const BETA: f64 = 0.1;

fn mean(xs: &[f64]) -> f64 {
    xs.iter().sum::<f64>() / xs.len() as f64
}

fn stdev(xs: &[f64], mu: f64) -> f64 {
    let n = xs.len() as f64;
    if n < 2.0 {
        return 0.0;
    }
    let var = xs.iter().map(|x| (x - mu).powi(2)).sum::<f64>() / n;
    var.sqrt()
}

/// Holt's level/trend recursion. Returns the final trend `T`.
fn holt_trend(prices: &[f64]) -> f64 {
    let n = prices.len();
    let mut level = prices[0];
    let mut trend = (prices[n - 1] - prices[0]) / n as f64;

    for price in &prices[1..] {
        let new_level = ALPHA * price + (1.0 - ALPHA) * (level + trend);
        trend = BETA * (new_level - level) + (1.0 - BETA) * trend;
        level = new_level;
    }

    trend
}

/// CUSUM structural-break statistic over the trailing 30% of the window.
///
/// Returns `(cusum, threshold, structural_break)`. If `n < 10` or `sigma == 0`, there is no
/// statistic to compute and no break is raised.
fn cusum_break(prices: &[f64], mu: f64, sigma: f64) -> (f64, f64, bool) {
    let n = prices.len();
    if n < 10 || sigma == 0.0 {
        return (0.0, 0.0, false);
    }

    let start = ((n as f64) * 0.7).floor() as usize;
    let mut cusum_acc = 0.0;
    let mut max_abs = 0.0f64;

    for price in &prices[start..n] {
        cusum_acc += (price - mu) / sigma;
        max_abs = max_abs.max(cusum_acc.abs());
    }

    let threshold = 3.0 * sigma;
    (max_abs, threshold, max_abs > threshold)
}

/// Run Stage 1 of the ABC pipeline over a price vector of length `>= MIN_WINDOW`.
pub fn analyze(prices: &[f64]) -> ArimaSignal {
    let n = prices.len();
    let trend = holt_trend(prices);
    let mu = mean(prices);
    let sigma = stdev(prices, mu);

    let trend_percentage = if mu != 0.0 { 100.0 * trend / mu } else { 0.0 };
    let (cusum, threshold, structural_break) = cusum_break(prices, mu, sigma);

    let mut confidence = 1.0 - 1.0 / ((n as f64 + 1.0).sqrt());
    if structural_break {
        confidence *= 0.7;
    }
    confidence = confidence.clamp(0.0, 1.0);

    let mut description = if trend_percentage.abs() < 1.0 {
        "Price stable".to_string()
    } else if trend_percentage > 0.0 {
        format!("Price increasing {:.2}% in trend", trend_percentage)
    } else {
        format!("Price decreasing {:.2}% in trend", trend_percentage.abs())
    };
    if structural_break {
        description.push_str(" [STRUCTURAL BREAK DETECTED]");
    }

    ArimaSignal {
        trend: round8(trend),
        trend_percentage: round2(trend_percentage),
        structural_break_detected: structural_break,
        confidence: round8(confidence),
        description,
        cusum_statistic: round8(cusum),
        threshold: round8(threshold),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geometric_series(start: f64, factor: f64, n: usize) -> Vec<f64> {
        (0..n).map(|i| start * factor.powi(i as i32)).collect()
    }

    #[test]
    fn monotone_upward_has_positive_trend_no_break() {
        let prices = geometric_series(100.0, 1.001, 200);
        let signal = analyze(&prices);
        assert!(signal.trend_percentage > 0.0);
        assert!(!signal.structural_break_detected);
    }

    #[test]
    fn monotone_downward_has_negative_trend() {
        let prices = geometric_series(100.0, 0.999, 200);
        let signal = analyze(&prices);
        assert!(signal.trend_percentage < 0.0);
    }

    #[test]
    fn step_change_triggers_structural_break() {
        let mut prices: Vec<f64> = (0..140).map(|i| 100.0 + 0.01 * (i % 3) as f64).collect();
        prices.extend((0..60).map(|i| 130.0 + 0.01 * (i % 3) as f64));
        let signal = analyze(&prices);
        assert!(signal.structural_break_detected);
    }

    #[test]
    fn flat_noise_is_reported_stable() {
        let prices: Vec<f64> = (0..200)
            .map(|i| 100.0 + 0.001 * ((i % 7) as f64 - 3.0))
            .collect();
        let signal = analyze(&prices);
        assert!(signal.trend_percentage.abs() < 1.0);
        assert_eq!(signal.description, "Price stable");
    }

    #[test]
    fn zero_stdev_yields_no_break() {
        let prices = vec![100.0; 50];
        let signal = analyze(&prices);
        assert_eq!(signal.cusum_statistic, 0.0);
        assert!(!signal.structural_break_detected);
    }

    #[test]
    fn short_window_skips_cusum() {
        let prices: Vec<f64> = (0..9).map(|i| 100.0 + i as f64).collect();
        let (cusum, _threshold, broke) = cusum_break(&prices, mean(&prices), 1.0);
        assert_eq!(cusum, 0.0);
        assert!(!broke);
    }
}
