//! Batch data model: phases, orders, per-oracle statistics.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use fairbatch_core::types::{BatchId, Bps, OracleId, ParticipantId, Price, Side, Tick, Volume};

use crate::config::EngineConfig;
use crate::settlement::FillRatios;

// ── Phase ────────────────────────────────────────────────────────────────────

/// Lifecycle phase of a batch. Transitions are strictly forward; `Settled`
/// and `Voided` are explicit terminal variants so exhaustive matches catch
/// every outcome at compile time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    /// Accepting order deposits.
    Open,
    /// Polling oracles; observation rounds accumulate.
    Accumulating,
    /// Settlement price fixed; accepting disputes.
    Disputing,
    /// Dispute window closed; waiting to apply weights and fill ratios.
    Settling,
    /// Terminal: price applied, fills computed, claims enabled.
    Settled,
    /// Terminal: no settlement happened; every deposit refunds in full.
    Voided,
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Settled | Phase::Voided)
    }

    pub fn name(self) -> &'static str {
        match self {
            Phase::Open => "OPEN",
            Phase::Accumulating => "ACCUMULATING",
            Phase::Disputing => "DISPUTING",
            Phase::Settling => "SETTLING",
            Phase::Settled => "SETTLED",
            Phase::Voided => "VOIDED",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

// ── VoidReason ───────────────────────────────────────────────────────────────

/// Why a batch was voided. Recorded for the archive; never affects weights.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum VoidReason {
    /// Fewer valid oracles than the minimum after trimming and filtering.
    InsufficientOracles,
    /// Filtered oracle set carried no weight (defensive; the clamp should
    /// make this unreachable).
    ZeroTotalWeight,
    /// Disputed volume crossed the void threshold.
    DisputeThresholdExceeded,
    /// Liveness escape: the batch sat stuck far past its nominal duration.
    Emergency,
}

// ── Order ────────────────────────────────────────────────────────────────────

/// One participant's net position in a batch. Amount accumulates across
/// repeated deposits; the side is fixed by the first deposit and a repeat
/// deposit on the other side is rejected outright.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Order {
    pub side: Side,
    pub amount: Volume,
    pub disputed: bool,
    pub claimed: bool,
}

impl Order {
    pub fn new(side: Side, amount: Volume) -> Self {
        Self {
            side,
            amount,
            disputed: false,
            claimed: false,
        }
    }
}

// ── OracleBatchStats ─────────────────────────────────────────────────────────

/// One oracle's contribution to one batch. Everything here is batch-local;
/// only the weight correction it produces outlives the batch.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct OracleBatchStats {
    /// Accepted observations; rejected and stale readings never land here.
    pub observations: Vec<Price>,
    /// Trimmed average, computed once at the ACCUMULATING exit.
    pub trimmed_avg: Option<Price>,
    /// Accuracy/precision correction, bps.
    pub delta1: Option<Bps>,
    /// Dispute-direction correction, bps.
    pub delta2: Option<Bps>,
    /// Below the sample threshold or flagged as a cross-source outlier.
    /// Ignored oracles contribute nothing to the settlement price and earn
    /// no bonus, but a cross-source outlier still takes the delta1 hit.
    pub ignored: bool,
}

// ── Batch ────────────────────────────────────────────────────────────────────

/// One settlement epoch. Created when the previous batch turns terminal,
/// mutated only by the engine's transition functions, then archived.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Batch {
    pub id: BatchId,
    pub phase: Phase,
    pub opened_at: Tick,

    // Absolute deadlines, fixed at creation.
    pub open_deadline: Tick,
    pub accumulating_deadline: Tick,
    pub disputing_deadline: Tick,
    pub settling_deadline: Tick,

    /// Tick of the last observation round, if any.
    pub last_poll_at: Option<Tick>,
    /// Number of completed observation rounds.
    pub rounds: u64,

    pub buy_volume: Volume,
    pub sell_volume: Volume,
    pub disputed_buy_volume: Volume,
    pub disputed_sell_volume: Volume,

    /// Set exactly once, at the ACCUMULATING → DISPUTING transition.
    /// A voided batch never carries one.
    pub settlement_price: Option<Price>,
    /// Set at settlement; `None` until then and forever on voided batches.
    pub fill: Option<FillRatios>,
    pub void_reason: Option<VoidReason>,

    pub orders: BTreeMap<ParticipantId, Order>,
    pub stats: BTreeMap<OracleId, OracleBatchStats>,
}

impl Batch {
    pub fn new(id: BatchId, now: Tick, config: &EngineConfig) -> Self {
        let open_deadline = now + config.open_ticks;
        let accumulating_deadline = open_deadline + config.accumulating_ticks;
        let disputing_deadline = accumulating_deadline + config.disputing_ticks;
        let settling_deadline = disputing_deadline + config.settling_ticks;
        Self {
            id,
            phase: Phase::Open,
            opened_at: now,
            open_deadline,
            accumulating_deadline,
            disputing_deadline,
            settling_deadline,
            last_poll_at: None,
            rounds: 0,
            buy_volume: 0,
            sell_volume: 0,
            disputed_buy_volume: 0,
            disputed_sell_volume: 0,
            settlement_price: None,
            fill: None,
            void_reason: None,
            orders: BTreeMap::new(),
            stats: BTreeMap::new(),
        }
    }

    pub fn total_volume(&self) -> Volume {
        self.buy_volume + self.sell_volume
    }

    pub fn volume_for(&self, side: Side) -> Volume {
        match side {
            Side::Buy => self.buy_volume,
            Side::Sell => self.sell_volume,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deadlines_are_cumulative() {
        let cfg = EngineConfig {
            open_ticks: 10,
            accumulating_ticks: 20,
            disputing_ticks: 30,
            settling_ticks: 40,
            ..Default::default()
        };
        let b = Batch::new(3, 100, &cfg);
        assert_eq!(b.open_deadline, 110);
        assert_eq!(b.accumulating_deadline, 130);
        assert_eq!(b.disputing_deadline, 160);
        assert_eq!(b.settling_deadline, 200);
    }

    #[test]
    fn fresh_batch_is_open_and_empty() {
        let b = Batch::new(0, 0, &EngineConfig::default());
        assert_eq!(b.phase, Phase::Open);
        assert!(b.settlement_price.is_none());
        assert!(b.fill.is_none());
        assert_eq!(b.total_volume(), 0);
    }

    #[test]
    fn terminal_phases() {
        assert!(Phase::Settled.is_terminal());
        assert!(Phase::Voided.is_terminal());
        assert!(!Phase::Disputing.is_terminal());
    }
}
