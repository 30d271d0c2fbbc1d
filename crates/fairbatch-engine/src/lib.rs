//! fairbatch-engine
//!
//! The batch lifecycle state machine and per-batch settlement ledger.
//!
//! One batch is live at any moment and walks strictly forward through
//! OPEN → ACCUMULATING → DISPUTING → SETTLING → SETTLED, with VOIDED as
//! the terminal escape from any phase-exit decision point. A terminal
//! batch is archived read-only (claims read it lazily) and the next OPEN
//! batch spawns in the same step, so the system never stalls.
//!
//! The engine assumes a single-writer, globally serialized substrate:
//! every call runs to completion atomically, and racing callers of the
//! same transition see a plain precondition failure instead of a double
//! apply.

pub mod batch;
pub mod config;
pub mod engine;
pub mod settlement;

pub use batch::{Batch, OracleBatchStats, Order, Phase, VoidReason};
pub use config::EngineConfig;
pub use engine::BatchEngine;
pub use settlement::{fill_ratios, ClaimOutcome, FillRatios, SettlementRecord};
