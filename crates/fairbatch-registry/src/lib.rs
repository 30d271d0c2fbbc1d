//! fairbatch-registry
//!
//! The Oracle Registry — the only state that persists between batches —
//! plus the `PriceReporter` capability boundary to the external
//! price-reporter collaborators.

pub mod registry;
pub mod reporter;

pub use registry::{OracleEntry, OracleRegistry};
pub use reporter::{MockReporter, PriceReporter, Reading};
