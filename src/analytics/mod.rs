//! The ABC analyzer: a pure function from a price window to an [`AbcResult`].

pub mod arima;
pub mod bayes;
pub mod montecarlo;
pub mod regime;

use rand_chacha::ChaCha8Rng;

use crate::models::abc::AbcResult;

/// Below this many samples the window can't support a CUSUM test or a meaningful posterior;
/// the analyzer short-circuits to defaults rather than reporting spurious confidence.
pub const MIN_WINDOW: usize = 30;

pub const MONTE_CARLO_DEFAULT_SIMULATIONS: usize = 10_000;
pub const MONTE_CARLO_DEFAULT_HORIZON_DAYS: usize = 7;

/// Run the full three-stage pipeline over `prices` (oldest first), simulating
/// `n_paths` GBM paths `horizon_days` ahead using `rng`.
///
/// Returns `AbcResult::default()` (regime `UNKNOWN`) if `prices.len() < MIN_WINDOW`.
pub fn analyze(
    prices: &[f64],
    horizon_days: usize,
    n_paths: usize,
    rng: &mut ChaCha8Rng,
) -> AbcResult {
    if prices.len() < MIN_WINDOW {
        return AbcResult::default();
    }

    let current_price = *prices.last().expect("checked non-empty above");

    let arima_signal = arima::analyze(prices);
    let momentum_metrics = bayes::analyze(
        prices,
        arima_signal.trend,
        arima_signal.confidence,
        arima_signal.structural_break_detected,
    );
    let market_prediction = montecarlo::simulate(
        current_price,
        momentum_metrics.drift,
        momentum_metrics.volatility,
        horizon_days,
        n_paths,
        rng,
    );

    let abc_integration_confidence = regime::integration_confidence(&arima_signal, &momentum_metrics);
    let needs_recalibration = regime::needs_recalibration(&arima_signal, &momentum_metrics);
    let market_regime = regime::classify(&arima_signal, &momentum_metrics, &market_prediction);

    AbcResult {
        arima_signal,
        momentum_metrics,
        market_prediction,
        abc_integration_confidence,
        needs_recalibration,
        market_regime,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::abc::MarketRegime;
    use rand::SeedableRng;

    #[test]
    fn short_window_yields_default_unknown_regime() {
        let prices = vec![100.0; MIN_WINDOW - 1];
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let result = analyze(&prices, 7, 1_000, &mut rng);
        assert_eq!(result.market_regime, MarketRegime::Unknown);
        assert_eq!(result, AbcResult::default());
    }

    #[test]
    fn full_window_produces_populated_result() {
        let prices: Vec<f64> = (0..200).map(|i| 100.0 * 1.0005f64.powi(i)).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let result = analyze(&prices, 7, 2_000, &mut rng);
        assert_ne!(result.market_regime, MarketRegime::Unknown);
        assert_eq!(result.market_prediction.price_targets.len(), 5);
    }

    #[test]
    fn deterministic_given_seeded_rng() {
        let prices: Vec<f64> = (0..200).map(|i| 100.0 + (i as f64 * 0.1).sin()).collect();
        let mut rng_a = ChaCha8Rng::seed_from_u64(5);
        let mut rng_b = ChaCha8Rng::seed_from_u64(5);
        let a = analyze(&prices, 7, 1_000, &mut rng_a);
        let b = analyze(&prices, 7, 1_000, &mut rng_b);
        assert_eq!(a, b);
    }
}
