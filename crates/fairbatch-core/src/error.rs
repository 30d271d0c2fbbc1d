use thiserror::Error;

use crate::types::{BatchId, OracleId, Tick, Weight};

#[derive(Debug, Error)]
pub enum FairbatchError {
    // ── Phase preconditions ──────────────────────────────────────────────────
    #[error("wrong phase: batch is {current}, operation requires {required}")]
    WrongPhase {
        current: &'static str,
        required: &'static str,
    },

    #[error("deadline not reached: now {now}, transition enabled at {deadline}")]
    DeadlineNotReached { now: Tick, deadline: Tick },

    #[error("collection interval not elapsed: last poll at {last_poll}, next at {next}")]
    CollectionIntervalNotElapsed { last_poll: Tick, next: Tick },

    #[error("emergency void not yet available (enabled at {enabled_at})")]
    EmergencyVoidNotAvailable { enabled_at: Tick },

    #[error("batch {0} is not terminal")]
    BatchNotTerminal(BatchId),

    #[error("unknown batch: {0}")]
    UnknownBatch(BatchId),

    // ── Orders ───────────────────────────────────────────────────────────────
    #[error("order amount must be greater than zero")]
    ZeroAmount,

    #[error("no order found for participant {0}")]
    UnknownOrder(String),

    #[error("order side is fixed at first deposit; repeat deposit on the other side rejected")]
    SideMismatch,

    #[error("order already disputed")]
    AlreadyDisputed,

    #[error("order already claimed")]
    AlreadyClaimed,

    // ── Oracles ──────────────────────────────────────────────────────────────
    #[error("unknown oracle: {0}")]
    UnknownOracle(OracleId),

    #[error("oracle endpoint already registered: {0}")]
    OracleAlreadyRegistered(String),

    #[error("initial weight {got} outside bounds [{min}, {max}]")]
    WeightOutOfBounds { got: Weight, min: Weight, max: Weight },

    // ── Aggregation ──────────────────────────────────────────────────────────
    #[error("insufficient samples: need {need}, have {have}")]
    InsufficientSamples { need: usize, have: usize },

    #[error("insufficient valid oracles: need {need}, have {have}")]
    InsufficientOracles { need: usize, have: usize },

    #[error("relative deviation against a zero reference value")]
    ZeroReference,

    #[error("arithmetic overflow during aggregation")]
    Overflow,

    // ── Serialization / storage ──────────────────────────────────────────────
    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("storage error: {0}")]
    Storage(String),
}
