//! Pro-rata fill ratios and lazy per-order claim math.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use fairbatch_core::constants::BPS_SCALE;
use fairbatch_core::types::{BatchId, Bps, ParticipantId, Price, Side, Volume};

use crate::batch::{Batch, Order, Phase};

/// Fill ratio per side, in basis points of deposited volume.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FillRatios {
    pub buy_bps: Bps,
    pub sell_bps: Bps,
}

impl FillRatios {
    pub fn for_side(&self, side: Side) -> Bps {
        match side {
            Side::Buy => self.buy_bps,
            Side::Sell => self.sell_bps,
        }
    }
}

/// The smaller side fills completely; the larger side fills pro-rata.
/// An empty side leaves nothing to match, so both ratios are zero.
pub fn fill_ratios(buy_volume: Volume, sell_volume: Volume) -> FillRatios {
    if buy_volume == 0 || sell_volume == 0 {
        return FillRatios {
            buy_bps: 0,
            sell_bps: 0,
        };
    }
    if buy_volume <= sell_volume {
        FillRatios {
            buy_bps: BPS_SCALE,
            sell_bps: ((buy_volume * BPS_SCALE as u128) / sell_volume) as Bps,
        }
    } else {
        FillRatios {
            buy_bps: ((sell_volume * BPS_SCALE as u128) / buy_volume) as Bps,
            sell_bps: BPS_SCALE,
        }
    }
}

/// Result of claiming one order. `filled + refunded == amount` always.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimOutcome {
    pub filled: Volume,
    pub refunded: Volume,
}

/// Lazy settlement for one order of a terminal batch.
///
/// Disputed orders and voided batches refund in full regardless of the
/// batch's price. Otherwise the order fills at its side's ratio and the
/// remainder refunds — conservation holds by construction since the refund
/// is computed as the complement.
pub fn claim_outcome(batch: &Batch, order: &Order) -> ClaimOutcome {
    debug_assert!(batch.phase.is_terminal());

    if batch.phase == Phase::Voided || order.disputed {
        return ClaimOutcome {
            filled: 0,
            refunded: order.amount,
        };
    }

    let fill_bps = batch
        .fill
        .map(|f| f.for_side(order.side))
        .unwrap_or(0)
        .max(0) as u128;
    let filled = order.amount * fill_bps / BPS_SCALE as u128;
    ClaimOutcome {
        filled,
        refunded: order.amount - filled,
    }
}

/// Read-only settlement record for the payout collaborator.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SettlementRecord {
    pub batch_id: BatchId,
    pub voided: bool,
    /// `None` exactly when the batch was voided before pricing.
    pub settlement_price: Option<Price>,
    pub buy_fill_bps: Bps,
    pub sell_fill_bps: Bps,
    /// Disputed flag per participant; disputed orders refund in full.
    pub disputed: BTreeMap<ParticipantId, bool>,
}

impl SettlementRecord {
    pub fn from_batch(batch: &Batch) -> Self {
        let fill = batch.fill.unwrap_or(FillRatios {
            buy_bps: 0,
            sell_bps: 0,
        });
        Self {
            batch_id: batch.id,
            voided: batch.phase == Phase::Voided,
            settlement_price: batch.settlement_price,
            buy_fill_bps: fill.buy_bps,
            sell_fill_bps: fill.sell_bps,
            disputed: batch
                .orders
                .iter()
                .map(|(&p, o)| (p, o.disputed))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn smaller_side_fills_fully() {
        // buyVolume=175, sellVolume=140 → buy 80%, sell 100%.
        let f = fill_ratios(175, 140);
        assert_eq!(f.buy_bps, 8_000);
        assert_eq!(f.sell_bps, 10_000);

        let f = fill_ratios(140, 175);
        assert_eq!(f.buy_bps, 10_000);
        assert_eq!(f.sell_bps, 8_000);
    }

    #[test]
    fn balanced_book_fills_both_sides() {
        let f = fill_ratios(500, 500);
        assert_eq!(f.buy_bps, 10_000);
        assert_eq!(f.sell_bps, 10_000);
    }

    #[test]
    fn empty_side_matches_nothing() {
        assert_eq!(fill_ratios(0, 900), FillRatios { buy_bps: 0, sell_bps: 0 });
        assert_eq!(fill_ratios(900, 0), FillRatios { buy_bps: 0, sell_bps: 0 });
    }

    #[test]
    fn buyer_of_50_in_the_example_book_gets_40() {
        use crate::config::EngineConfig;
        use fairbatch_core::types::Side;

        let mut batch = Batch::new(0, 0, &EngineConfig::default());
        batch.phase = Phase::Settled;
        batch.fill = Some(fill_ratios(175, 140));
        let order = Order::new(Side::Buy, 50);
        let out = claim_outcome(&batch, &order);
        assert_eq!(out.filled, 40);
        assert_eq!(out.refunded, 10);
        assert_eq!(out.filled + out.refunded, order.amount);
    }

    #[test]
    fn disputed_order_refunds_in_full() {
        use crate::config::EngineConfig;
        use fairbatch_core::types::Side;

        let mut batch = Batch::new(0, 0, &EngineConfig::default());
        batch.phase = Phase::Settled;
        batch.fill = Some(fill_ratios(100, 100));
        let mut order = Order::new(Side::Sell, 77);
        order.disputed = true;
        let out = claim_outcome(&batch, &order);
        assert_eq!(out.filled, 0);
        assert_eq!(out.refunded, 77);
    }

    #[test]
    fn voided_batch_refunds_in_full() {
        use crate::config::EngineConfig;
        use fairbatch_core::types::Side;

        let mut batch = Batch::new(0, 0, &EngineConfig::default());
        batch.phase = Phase::Voided;
        let order = Order::new(Side::Buy, 33);
        let out = claim_outcome(&batch, &order);
        assert_eq!(out.filled, 0);
        assert_eq!(out.refunded, 33);
    }

    #[test]
    fn conservation_over_odd_amounts() {
        use crate::config::EngineConfig;
        use fairbatch_core::types::Side;

        let mut batch = Batch::new(0, 0, &EngineConfig::default());
        batch.phase = Phase::Settled;
        batch.fill = Some(fill_ratios(175, 140));
        for amount in [1u128, 3, 7, 49, 999_999_999_999] {
            let out = claim_outcome(&batch, &Order::new(Side::Buy, amount));
            assert_eq!(out.filled + out.refunded, amount);
        }
    }
}
