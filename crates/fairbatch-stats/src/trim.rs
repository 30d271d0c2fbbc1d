//! Per-source trimmed mean.

use fairbatch_core::constants::{BPS_SCALE, MIN_SAMPLES_AFTER_TRIM};
use fairbatch_core::error::FairbatchError;
use fairbatch_core::types::{Bps, Price};

/// Trimmed arithmetic mean of one oracle's accepted observations.
///
/// Sorts a copy ascending (stable, so ties keep insertion order — no
/// observable effect on the mean), drops `floor(n * trim_fraction)` values
/// from each end, and returns the floored mean of the middle slice.
///
/// Errors with `InsufficientSamples` when the input is empty or fewer than
/// `MIN_SAMPLES_AFTER_TRIM` observations survive the trim, and with
/// `Overflow` when the surviving values cannot be summed in u128.
pub fn trim(observations: &[Price], trim_fraction_bps: Bps) -> Result<Price, FairbatchError> {
    let n = observations.len();
    if n == 0 {
        return Err(FairbatchError::InsufficientSamples {
            need: MIN_SAMPLES_AFTER_TRIM,
            have: 0,
        });
    }

    let mut sorted = observations.to_vec();
    sorted.sort();

    let drop_each_end = (n * trim_fraction_bps.max(0) as usize / BPS_SCALE as usize).min(n / 2);
    let kept = n - 2 * drop_each_end;
    if kept < MIN_SAMPLES_AFTER_TRIM {
        return Err(FairbatchError::InsufficientSamples {
            need: MIN_SAMPLES_AFTER_TRIM,
            have: kept,
        });
    }

    let middle = &sorted[drop_each_end..drop_each_end + kept];
    let mut sum: Price = 0;
    for &v in middle {
        // A sum that overflows u128 means the reporter is feeding garbage;
        // the error degrades this one oracle, never the batch.
        sum = sum.checked_add(v).ok_or(FairbatchError::Overflow)?;
    }
    Ok(sum / kept as Price)
}
