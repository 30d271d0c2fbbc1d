//! fairbatch-weights
//!
//! The Reputation/Weight Model: two per-batch correction terms and the
//! clamped multiplicative weight update that applies them. Pure functions;
//! the only state is the weight value the caller hands in.

pub mod dispute;
pub mod score;

pub use dispute::dispute_scores;
pub use score::{accuracy_precision_score, update_weight};
