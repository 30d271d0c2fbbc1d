/// ─── FairBatch Protocol Constants ───────────────────────────────────────────
///
/// One settlement epoch ("batch") at a time; a bounded-weight oracle set
/// persists across batches. All percentages are basis points (1% = 100 bps).

use crate::types::{Bps, Tick, Weight};

// ── Fixed-point scale ────────────────────────────────────────────────────────

/// Basis-point scale: 10,000 bps = 100%.
pub const BPS_SCALE: i64 = 10_000;

// ── Oracle weights ───────────────────────────────────────────────────────────

/// Lower weight clamp. Never zero: an oracle can be minimized, not silenced.
pub const W_MIN: Weight = 1;

/// Upper weight clamp.
pub const W_MAX: Weight = 1_000;

/// Weight assigned to a freshly registered oracle when none is supplied.
pub const DEFAULT_INITIAL_WEIGHT: Weight = 500;

// ── Aggregation thresholds ───────────────────────────────────────────────────

/// Fraction trimmed from each end of a per-oracle sample before averaging.
pub const TRIM_FRACTION_BPS: Bps = 1_000; // 10%

/// Maximum neighbor-relative gap between adjacent per-source averages
/// before the farther-from-middle source is flagged as a cross-source outlier.
pub const CROSS_SOURCE_THRESHOLD_BPS: Bps = 300; // 3%

/// Minimum accepted observations for an oracle to enter aggregation at all.
pub const MIN_SAMPLES_PER_ORACLE: usize = 3;

/// Minimum observations that must survive trimming.
pub const MIN_SAMPLES_AFTER_TRIM: usize = 1;

/// Minimum non-ignored oracles required to compute a settlement price;
/// fewer voids the batch.
pub const MIN_VALID_ORACLES: usize = 2;

// ── Per-reading filter ───────────────────────────────────────────────────────

/// Maximum jump from an oracle's last accepted price within one reading.
pub const MAX_STEP_DEVIATION_BPS: Bps = 2_000; // 20%

/// A reading observed more than this many ticks ago is stale and skipped.
pub const STALE_AFTER_TICKS: Tick = 30;

// ── Reputation model ─────────────────────────────────────────────────────────

/// Flat participation bonus added to delta1 for non-ignored oracles.
pub const ACCURACY_BONUS_BPS: Bps = 10; // 0.1%

/// One dispute-ranking unit expressed in basis points (1 rank = 1%).
pub const RANK_UNIT_BPS: Bps = 100;

// ── Disputes ─────────────────────────────────────────────────────────────────

/// Dispute ratio above which the batch is voided instead of settled.
pub const VOID_THRESHOLD_BPS: Bps = 3_300; // 33%

// ── Default phase schedule (ticks) ───────────────────────────────────────────

pub const DEFAULT_OPEN_TICKS: Tick = 100;
pub const DEFAULT_ACCUMULATING_TICKS: Tick = 100;
pub const DEFAULT_DISPUTING_TICKS: Tick = 50;
pub const DEFAULT_SETTLING_TICKS: Tick = 25;

/// Minimum ticks between two observation rounds during ACCUMULATING.
pub const DEFAULT_COLLECTION_INTERVAL_TICKS: Tick = 10;

/// A batch stuck past this multiple of its nominal duration may be
/// emergency-voided by anyone: last-resort, all-or-nothing refund.
pub const EMERGENCY_VOID_MULTIPLE: Tick = 10;
