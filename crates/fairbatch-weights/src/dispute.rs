//! Dispute-direction correction (delta2).

use fairbatch_core::constants::RANK_UNIT_BPS;
use fairbatch_core::types::Bps;

/// Per-batch, zero-sum dispute correction across the price-ranked oracles.
///
/// Rank 0 is the lowest trimmed average. Base penalty per rank is
/// `-(rank + 1)` rank-units (1 unit = 100 bps), scaled by
/// `dispute_ratio / void_threshold` so disputes below the void threshold
/// produce a proportionally smaller spread, then centered on the mean so
/// the corrections sum to zero — disputes alone never inflate or deflate
/// total reputation.
///
/// Buyer-dominated disputes claim the price was too high, so after
/// centering the lowest-priced oracles come out positive. When sell-side
/// disputes dominate every term is negated: the higher prices were the
/// defensible ones. A zero dispute ratio yields all-zero corrections.
///
/// Centering is exact in extended precision; the final truncating division
/// (toward zero, antisymmetric) leaves `|sum|` below `ranked_count` bps.
pub fn dispute_scores(
    ranked_count: usize,
    dispute_ratio_bps: Bps,
    void_threshold_bps: Bps,
    buy_dominates: bool,
) -> Vec<Bps> {
    if ranked_count == 0 {
        return Vec::new();
    }
    if dispute_ratio_bps <= 0 || void_threshold_bps <= 0 {
        return vec![0; ranked_count];
    }

    let n = ranked_count as i128;
    let scaled: Vec<i128> = (0..n)
        .map(|rank| -(rank + 1) * RANK_UNIT_BPS as i128 * dispute_ratio_bps as i128)
        .collect();
    let total: i128 = scaled.iter().sum();

    scaled
        .iter()
        .map(|&s| {
            // centered = s - total/n, kept exact by multiplying through by n.
            let centered = (s * n - total) / (n * void_threshold_bps as i128);
            let delta = if buy_dominates { centered } else { -centered };
            Bps::try_from(delta).unwrap_or(0)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use fairbatch_core::constants::VOID_THRESHOLD_BPS;

    #[test]
    fn buyer_dominated_scenario_rewards_low_prices() {
        // 5 oracles, 15% disputes, 33% void threshold.
        let d2 = dispute_scores(5, 1_500, 3_300, true);
        assert_eq!(d2, vec![90, 45, 0, -45, -90]);
    }

    #[test]
    fn seller_dominated_flips_the_ranking() {
        let d2 = dispute_scores(5, 1_500, 3_300, false);
        assert_eq!(d2, vec![-90, -45, 0, 45, 90]);
    }

    #[test]
    fn zero_dispute_ratio_is_all_zero() {
        assert_eq!(dispute_scores(4, 0, VOID_THRESHOLD_BPS, true), vec![0; 4]);
    }

    #[test]
    fn zero_sum_within_rounding_tolerance() {
        for n in 1..=12usize {
            for ratio in [1, 137, 1_500, 2_900, 3_300] {
                let sum: Bps = dispute_scores(n, ratio, VOID_THRESHOLD_BPS, true)
                    .iter()
                    .sum();
                assert!(
                    sum.unsigned_abs() < n as u64,
                    "n={n} ratio={ratio} sum={sum}"
                );
            }
        }
    }

    #[test]
    fn ratio_at_threshold_gives_full_spread() {
        // dispute_ratio == void_threshold → unscaled centered ranks.
        let d2 = dispute_scores(3, 3_300, 3_300, true);
        assert_eq!(d2, vec![100, 0, -100]);
    }

    #[test]
    fn larger_ratio_widens_the_spread() {
        let narrow = dispute_scores(5, 500, 3_300, true);
        let wide = dispute_scores(5, 3_000, 3_300, true);
        assert!(wide[0] > narrow[0]);
        assert!(wide[4] < narrow[4]);
    }

    #[test]
    fn empty_ranking_yields_empty() {
        assert!(dispute_scores(0, 1_000, 3_300, true).is_empty());
    }

    #[test]
    fn single_oracle_gets_zero() {
        // Centering a one-element set always lands on zero.
        assert_eq!(dispute_scores(1, 2_000, 3_300, true), vec![0]);
    }
}
