//! Cross-stage integration: confidence blending, recalibration flag, and regime
//! classification.

use crate::models::abc::{ArimaSignal, MarketPrediction, MarketRegime, MomentumMetrics};
use crate::rounding::round8;

/// Volatility above this (annualised) marks `HIGH_VOLATILITY` / the `*_VOLATILE` split.
const HIGH_VOLATILITY_THRESHOLD: f64 = 0.50;
const REGIME_VOLATILITY_SPLIT: f64 = 0.30;
const BULLISH_TREND_THRESHOLD: f64 = 2.0;
const BULLISH_DRIFT_THRESHOLD: f64 = 0.05;
const BULLISH_PROB_UP_THRESHOLD: f64 = 0.6;
const BEARISH_TREND_THRESHOLD: f64 = -2.0;
const BEARISH_DRIFT_THRESHOLD: f64 = -0.05;
const BEARISH_PROB_UP_THRESHOLD: f64 = 0.4;

/// `sqrt(arimaConfidence * bayesConfidence)`, penalised 0.7x on a structural break.
pub fn integration_confidence(arima: &ArimaSignal, momentum: &MomentumMetrics) -> f64 {
    let blended = (arima.confidence * momentum.confidence).max(0.0).sqrt();
    let penalized = if arima.structural_break_detected {
        blended * 0.7
    } else {
        blended
    };
    round8(penalized.clamp(0.0, 1.0))
}

/// A structural break or annualised volatility over 50% means the posterior is stale enough
/// to warrant an out-of-cycle recompute. Exactly 0.50 does NOT trigger this (strict `>`).
pub fn needs_recalibration(arima: &ArimaSignal, momentum: &MomentumMetrics) -> bool {
    arima.structural_break_detected || momentum.volatility > HIGH_VOLATILITY_THRESHOLD
}

/// Classify the market regime from all three stages' outputs, in the spec's fixed priority
/// order: `REGIME_CHANGE` beats `HIGH_VOLATILITY` beats the bullish/bearish/neutral split.
pub fn classify(
    arima: &ArimaSignal,
    momentum: &MomentumMetrics,
    prediction: &MarketPrediction,
) -> MarketRegime {
    if arima.structural_break_detected {
        return MarketRegime::RegimeChange;
    }
    // Strict `>`: exactly the threshold is not "high volatility".
    if momentum.volatility > HIGH_VOLATILITY_THRESHOLD {
        return MarketRegime::HighVolatility;
    }

    let bullish_votes = [
        arima.trend_percentage > BULLISH_TREND_THRESHOLD,
        momentum.drift > BULLISH_DRIFT_THRESHOLD,
        prediction.probability_up > BULLISH_PROB_UP_THRESHOLD,
    ]
    .iter()
    .filter(|&&v| v)
    .count();
    let bearish_votes = [
        arima.trend_percentage < BEARISH_TREND_THRESHOLD,
        momentum.drift < BEARISH_DRIFT_THRESHOLD,
        prediction.probability_up < BEARISH_PROB_UP_THRESHOLD,
    ]
    .iter()
    .filter(|&&v| v)
    .count();

    let volatile = momentum.volatility > REGIME_VOLATILITY_SPLIT;

    if bullish_votes >= 2 {
        if volatile {
            MarketRegime::BullishVolatile
        } else {
            MarketRegime::BullishStable
        }
    } else if bearish_votes >= 2 {
        if volatile {
            MarketRegime::BearishVolatile
        } else {
            MarketRegime::BearishStable
        }
    } else if volatile {
        MarketRegime::NeutralVolatile
    } else {
        MarketRegime::NeutralStable
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signal(trend_pct: f64, structural_break: bool, confidence: f64) -> ArimaSignal {
        ArimaSignal {
            trend_percentage: trend_pct,
            structural_break_detected: structural_break,
            confidence,
            ..ArimaSignal::default()
        }
    }

    fn momentum(drift: f64, volatility: f64, confidence: f64) -> MomentumMetrics {
        MomentumMetrics {
            drift,
            volatility,
            confidence,
            ..MomentumMetrics::default()
        }
    }

    fn prediction(probability_up: f64) -> MarketPrediction {
        MarketPrediction {
            probability_up,
            ..MarketPrediction::default()
        }
    }

    #[test]
    fn structural_break_wins_over_volatility_and_trend() {
        let arima = signal(5.0, true, 0.9);
        let mom = momentum(0.2, 0.9, 0.9);
        assert_eq!(classify(&arima, &mom, &prediction(0.7)), MarketRegime::RegimeChange);
    }

    #[test]
    fn high_volatility_beats_bullish_trend() {
        let arima = signal(5.0, false, 0.9);
        let mom = momentum(0.2, 0.51, 0.9);
        assert_eq!(classify(&arima, &mom, &prediction(0.7)), MarketRegime::HighVolatility);
    }

    #[test]
    fn exactly_half_volatility_does_not_trigger_high_volatility() {
        let arima = signal(0.0, false, 0.9);
        let mom = momentum(0.0, 0.50, 0.9);
        assert_ne!(classify(&arima, &mom, &prediction(0.5)), MarketRegime::HighVolatility);
    }

    #[test]
    fn bullish_stable_requires_two_votes() {
        let arima = signal(3.0, false, 0.9);
        let mom = momentum(0.1, 0.1, 0.9);
        assert_eq!(classify(&arima, &mom, &prediction(0.5)), MarketRegime::BullishStable);
    }

    #[test]
    fn bearish_volatile_when_both_votes_and_volatility_above_split() {
        let arima = signal(-3.0, false, 0.9);
        let mom = momentum(-0.1, 0.35, 0.9);
        assert_eq!(classify(&arima, &mom, &prediction(0.5)), MarketRegime::BearishVolatile);
    }

    #[test]
    fn neutral_when_votes_split() {
        let arima = signal(3.0, false, 0.9);
        let mom = momentum(-0.1, 0.1, 0.9);
        assert_eq!(classify(&arima, &mom, &prediction(0.5)), MarketRegime::NeutralStable);
    }

    #[test]
    fn integration_confidence_penalized_on_break() {
        let arima = signal(0.0, true, 1.0);
        let mom = momentum(0.0, 0.0, 1.0);
        assert_eq!(integration_confidence(&arima, &mom), 0.7);
    }

    #[test]
    fn recalibration_triggers_on_break_or_high_volatility() {
        let calm = signal(0.0, false, 1.0);
        let low_vol = momentum(0.0, 0.2, 1.0);
        assert!(!needs_recalibration(&calm, &low_vol));

        let broken = signal(0.0, true, 1.0);
        assert!(needs_recalibration(&broken, &low_vol));

        let high_vol = momentum(0.0, 0.51, 1.0);
        assert!(needs_recalibration(&calm, &high_vol));
    }
}
