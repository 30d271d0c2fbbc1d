//! Fixed-point percentage arithmetic.
//!
//! One representation everywhere: basis points (parts per 10,000), signed
//! `i64` for corrections, `u128` for prices and volumes. Every division in
//! this module floors; callers relying on rounding direction get floor.

use crate::constants::BPS_SCALE;
use crate::error::FairbatchError;
use crate::types::{Bps, Price};

/// Relative deviation `|a - b| / b` in basis points, floored.
///
/// The second argument is the reference value; `b == 0` is an error rather
/// than a silent zero (a zero reference price means upstream data is broken).
pub fn rel_dev_bps(a: Price, b: Price) -> Result<Bps, FairbatchError> {
    if b == 0 {
        return Err(FairbatchError::ZeroReference);
    }
    let diff = a.abs_diff(b);
    let bps = diff.saturating_mul(BPS_SCALE as u128) / b;
    // Deviations beyond i64 range are astronomically far off anyway.
    Ok(Bps::try_from(bps).unwrap_or(Bps::MAX))
}

/// Apply a signed bps correction to an unsigned value: `v * (1 + bps/10_000)`,
/// truncated toward zero, floored at 0 (a correction below -100% empties the
/// value rather than flipping its sign).
pub fn mul_bps(v: u128, bps: Bps) -> u128 {
    let scaled = v as i128 * (BPS_SCALE as i128 + bps as i128);
    if scaled <= 0 {
        return 0;
    }
    (scaled / BPS_SCALE as i128) as u128
}

/// `numer * 10_000 / denom` as bps, floored. Zero denominator is an error.
pub fn ratio_bps(numer: u128, denom: u128) -> Result<Bps, FairbatchError> {
    if denom == 0 {
        return Err(FairbatchError::ZeroReference);
    }
    let bps = numer.saturating_mul(BPS_SCALE as u128) / denom;
    Ok(Bps::try_from(bps).unwrap_or(Bps::MAX))
}
