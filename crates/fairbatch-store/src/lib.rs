//! fairbatch-store
//!
//! sled-backed persistence for the two things that outlive a process:
//! the oracle registry (the only cross-batch mutable state) and the
//! read-only archive of terminal batches that claims are paid from.

pub mod db;

pub use db::StoreDb;
