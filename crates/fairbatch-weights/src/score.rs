//! Accuracy/precision correction (delta1) and the weight update itself.

use fairbatch_core::constants::BPS_SCALE;
use fairbatch_core::error::FairbatchError;
use fairbatch_core::fixed::{mul_bps, rel_dev_bps};
use fairbatch_core::types::{Bps, Price, Weight};

/// Per-batch accuracy/precision correction for one oracle, in bps.
///
/// `x` = deviation of the oracle's trimmed average from the settlement price;
/// `y` = mean deviation of its raw observations from its own trimmed average
/// (0 with fewer than 2 observations). Both in bps.
///
/// `delta1 = -(2x² + 3y²) / 10_000 + bonus`
///
/// The quadratic is convex on purpose: sub-percent deviations cost almost
/// nothing, large ones dominate and can drive the term far below -100%. No
/// floor here; the weight clamp in `update_weight` bounds the damage.
/// Deviations are capped at 100x before squaring. Past the cap the penalty
/// already exceeds -100% many times over (the weight clamp floors it), and
/// the cap keeps the i128 quadratic exact even for saturated deviations.
const DEVIATION_CAP_BPS: i128 = 100 * BPS_SCALE as i128;

pub fn accuracy_precision_score(
    trimmed_avg: Price,
    settlement_price: Price,
    observations: &[Price],
    bonus: Bps,
) -> Result<Bps, FairbatchError> {
    let x = (rel_dev_bps(trimmed_avg, settlement_price)? as i128).min(DEVIATION_CAP_BPS);

    let y = if observations.len() < 2 {
        0i128
    } else {
        let mut sum = 0i128;
        for &obs in observations {
            sum += (rel_dev_bps(obs, trimmed_avg)? as i128).min(DEVIATION_CAP_BPS);
        }
        sum / observations.len() as i128
    };

    let penalty = (2 * x * x + 3 * y * y) / BPS_SCALE as i128;
    let delta = bonus as i128 - penalty;
    Ok(Bps::try_from(delta).unwrap_or(Bps::MIN))
}

/// Apply both correction terms to a persisted weight.
///
/// Two sequential multiplicative corrections, not one combined product:
/// `w → w·(1 + delta1) → ·(1 + delta2)`, each floored, the intermediate
/// floored at zero, the result clamped to `[w_min, w_max]`. Multiplicative
/// updates compound reputation: the same relative error costs a
/// high-weight oracle more absolute weight.
pub fn update_weight(old: Weight, delta1: Bps, delta2: Bps, w_min: Weight, w_max: Weight) -> Weight {
    let after_accuracy = mul_bps(old as u128, delta1);
    let after_dispute = mul_bps(after_accuracy, delta2);
    let clamped = after_dispute.clamp(w_min as u128, w_max as u128);
    clamped as Weight
}

#[cfg(test)]
mod tests {
    use super::*;
    use fairbatch_core::constants::{W_MAX, W_MIN};

    #[test]
    fn perfect_oracle_earns_the_bonus() {
        // Trimmed average equal to the settlement price, zero spread.
        let d1 = accuracy_precision_score(2000, 2000, &[2000, 2000, 2000], 10).unwrap();
        assert_eq!(d1, 10);
    }

    #[test]
    fn small_deviation_is_nearly_free() {
        // x = 100 bps (1%), tight spread → penalty 2 bps.
        let d1 = accuracy_precision_score(2020, 2000, &[2020, 2020], 0).unwrap();
        assert_eq!(d1, -2);
    }

    #[test]
    fn large_deviation_dominates() {
        // x = 50% = 5000 bps → 2x²/1e4 = 5000 bps = -50%.
        let d1 = accuracy_precision_score(3000, 2000, &[3000], 0).unwrap();
        assert_eq!(d1, -5000);
    }

    #[test]
    fn noisy_oracle_penalized_for_spread() {
        // Centered on the settlement price but wildly spread readings.
        let tight = accuracy_precision_score(2000, 2000, &[1995, 2005], 0).unwrap();
        let noisy = accuracy_precision_score(2000, 2000, &[1000, 3000], 0).unwrap();
        assert!(noisy < tight);
    }

    #[test]
    fn saturated_deviation_scores_without_wrapping() {
        // An average astronomically far from the settlement price saturates
        // the relative deviation; the score must stay finite and ruinous.
        let d1 = accuracy_precision_score(u128::MAX, 2000, &[u128::MAX], 10).unwrap();
        assert!(d1 <= -2 * DEVIATION_CAP_BPS as Bps, "got {d1}");
    }

    #[test]
    fn single_observation_has_zero_spread_term() {
        let d1 = accuracy_precision_score(2000, 2000, &[1234], 0).unwrap();
        assert_eq!(d1, 0);
    }

    #[test]
    fn update_weight_applies_corrections_sequentially() {
        // 1000 * 0.90 = 900, 900 * 1.10 = 990 — not 1000 * 0.99.
        assert_eq!(update_weight(1000, -1_000, 1_000, W_MIN, W_MAX), 990);
    }

    #[test]
    fn update_weight_clamps_low() {
        assert_eq!(update_weight(500, -20_000, 0, W_MIN, W_MAX), W_MIN);
    }

    #[test]
    fn update_weight_clamps_high() {
        assert_eq!(update_weight(W_MAX, 5_000, 0, W_MIN, W_MAX), W_MAX);
    }

    #[test]
    fn compounding_hits_high_weight_harder() {
        let high = 800;
        let low = 100;
        let loss_high = high - update_weight(high, -1_000, 0, W_MIN, W_MAX);
        let loss_low = low - update_weight(low, -1_000, 0, W_MIN, W_MAX);
        assert!(loss_high > loss_low);
    }
}
