//! fairbatch-stats
//!
//! The Deviation & Trim Engine: pure, stateless sample statistics.
//! Two steps, deliberately kept separate so each is unit-testable on its own:
//! first a per-source trimmed mean, then a cross-source neighbor-gap filter
//! over the per-source averages.

pub mod filter;
pub mod trim;

pub use filter::cross_source_filter;
pub use trim::trim;
