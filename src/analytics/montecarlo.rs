//! Stage 3 — geometric Brownian motion Monte Carlo forecast with risk metrics.

use std::f64::consts::PI;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::models::abc::{MarketPrediction, MarketScenario, PriceTarget};
use crate::rounding::{round2, round8};

const TRADING_DAYS_PER_YEAR: f64 = 252.0;
const PERCENTILES: [u8; 5] = [5, 25, 50, 75, 95];

/// Standard normal sample via the Box-Muller transform.
fn sample_standard_normal(rng: &mut ChaCha8Rng) -> f64 {
    let u1: f64 = rng.gen::<f64>().max(f64::MIN_POSITIVE);
    let u2: f64 = rng.gen();
    (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
}

fn percentile_index(n: usize, p: u8) -> usize {
    ((n as f64) * (p as f64) / 100.0).floor() as usize
}

/// Simulate `n_paths` independent GBM paths of `horizon_days` daily steps, starting at
/// `s0`, with annualised drift `mu` and volatility `sigma`. `rng` is caller-owned so tests
/// can seed it deterministically.
pub fn simulate(
    s0: f64,
    mu: f64,
    sigma: f64,
    horizon_days: usize,
    n_paths: usize,
    rng: &mut ChaCha8Rng,
) -> MarketPrediction {
    if s0 <= 0.0 || n_paths == 0 {
        return MarketPrediction::default();
    }

    let dt = 1.0 / TRADING_DAYS_PER_YEAR;
    let drift_term = (mu - 0.5 * sigma * sigma) * dt;
    let vol_term = sigma * dt.sqrt();

    let mut terminals = Vec::with_capacity(n_paths);
    for _ in 0..n_paths {
        let mut price = s0;
        for _ in 0..horizon_days {
            let z = sample_standard_normal(rng);
            price *= (drift_term + vol_term * z).exp();
        }
        terminals.push(price);
    }
    terminals.sort_by(|a, b| a.partial_cmp(b).unwrap());

    let n = terminals.len();
    let up = terminals.iter().filter(|&&t| t > s0).count();
    // probabilityDown counts "not strictly greater than s0" (includes equality).
    let down = n - up;

    let probability_up = up as f64 / n as f64;
    let probability_down = down as f64 / n as f64;
    let probability_neutral = (1.0 - probability_up - probability_down).max(0.0);

    let mean_terminal = terminals.iter().sum::<f64>() / n as f64;
    let expected_return = (mean_terminal - s0) / s0;
    let expected_price_change = s0 * expected_return;

    let var95_idx = percentile_index(n, 5).min(n - 1);
    let var99_idx = percentile_index(n, 1).min(n - 1);
    let value_at_risk_95 = s0 - terminals[var95_idx];
    let value_at_risk_99 = s0 - terminals[var99_idx];

    let tail_count = var95_idx.max(1);
    let conditional_value_at_risk = terminals[..tail_count]
        .iter()
        .map(|&t| s0 - t)
        .sum::<f64>()
        / tail_count as f64;

    let price_targets: Vec<PriceTarget> = PERCENTILES
        .iter()
        .map(|&p| {
            let idx = percentile_index(n, p).min(n - 1);
            let price = terminals[idx];
            PriceTarget {
                percentile: p,
                price: round8(price),
                change_percent: round2(100.0 * (price - s0) / s0),
            }
        })
        .collect();

    let most_likely_scenario = if probability_up >= probability_down && probability_up >= probability_neutral {
        MarketScenario::UpwardMovement
    } else if probability_down >= probability_up && probability_down >= probability_neutral {
        MarketScenario::DownwardMovement
    } else {
        MarketScenario::SidewaysMovement
    };

    MarketPrediction {
        probability_up: round8(probability_up),
        probability_down: round8(probability_down),
        probability_neutral: round8(probability_neutral),
        expected_price_change: round2(expected_price_change),
        expected_price_change_percent: round2(expected_return * 100.0),
        expected_return: round8(expected_return),
        most_likely_scenario,
        price_targets,
        value_at_risk_95: round8(value_at_risk_95),
        value_at_risk_99: round8(value_at_risk_99),
        conditional_value_at_risk: round8(conditional_value_at_risk),
    }
}

/// Build a PRNG from the configured seed, or from OS entropy if unset.
pub fn make_rng(seed: Option<u64>) -> ChaCha8Rng {
    match seed {
        Some(s) => ChaCha8Rng::seed_from_u64(s),
        None => ChaCha8Rng::from_entropy(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenario_serializes_as_screaming_snake_case() {
        assert_eq!(
            serde_json::to_value(MarketScenario::UpwardMovement).unwrap(),
            "UPWARD_MOVEMENT"
        );
        assert_eq!(
            serde_json::to_value(MarketScenario::DownwardMovement).unwrap(),
            "DOWNWARD_MOVEMENT"
        );
        assert_eq!(
            serde_json::to_value(MarketScenario::SidewaysMovement).unwrap(),
            "SIDEWAYS_MOVEMENT"
        );
    }

    #[test]
    fn seeded_simulation_is_deterministic() {
        let mut rng_a = ChaCha8Rng::seed_from_u64(42);
        let mut rng_b = ChaCha8Rng::seed_from_u64(42);
        let a = simulate(100.0, 0.05, 0.2, 7, 2_000, &mut rng_a);
        let b = simulate(100.0, 0.05, 0.2, 7, 2_000, &mut rng_b);
        assert_eq!(a, b);
    }

    #[test]
    fn probabilities_and_targets_satisfy_invariants() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let prediction = simulate(100.0, 0.02, 0.3, 7, 5_000, &mut rng);
        assert!((0.0..=1.0).contains(&prediction.probability_up));
        let sum = prediction.probability_up + prediction.probability_down;
        assert!((0.0..=1.0).contains(&sum));
        assert_eq!(prediction.probability_neutral, (1.0 - sum).max(0.0));
        assert_eq!(prediction.price_targets.len(), 5);
        let percentiles: Vec<u8> = prediction.price_targets.iter().map(|t| t.percentile).collect();
        assert_eq!(percentiles, vec![5, 25, 50, 75, 95]);
    }

    #[test]
    fn positive_drift_biases_probability_up() {
        let mut rng = ChaCha8Rng::seed_from_u64(99);
        let prediction = simulate(100.0, 0.4, 0.1, 7, 10_000, &mut rng);
        assert!(prediction.probability_up > 0.5);
    }

    #[test]
    fn zero_price_returns_default() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let prediction = simulate(0.0, 0.0, 0.1, 7, 100, &mut rng);
        assert_eq!(prediction, MarketPrediction::default());
    }
}
