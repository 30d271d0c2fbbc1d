//! Cross-source outlier filter.

use std::collections::BTreeSet;

use fairbatch_core::error::FairbatchError;
use fairbatch_core::fixed::rel_dev_bps;
use fairbatch_core::types::{Bps, OracleId, Price};

/// Flag cross-source outliers among per-oracle trimmed averages.
///
/// The averages are sorted ascending (stable, insertion order on ties) and
/// every adjacent pair is checked once: if `|hi - lo| / lo` exceeds the
/// threshold, the element of the pair farther from the middle of the sorted
/// sequence is flagged (the lower element for pairs in the lower half, the
/// upper element otherwise).
///
/// This is a local neighbor test, not a global one: a legitimate
/// sub-population survives as long as adjacent gaps stay under the
/// threshold. The pass runs once over the original sorted sequence — an
/// exclusion does not re-seed the comparison for the next pair.
///
/// Zero or one source returns the empty set; deciding whether zero valid
/// sources voids the batch is the caller's job.
pub fn cross_source_filter(
    averages: &[(OracleId, Price)],
    threshold_bps: Bps,
) -> Result<BTreeSet<OracleId>, FairbatchError> {
    let mut ignored = BTreeSet::new();
    if averages.len() < 2 {
        return Ok(ignored);
    }

    let mut sorted = averages.to_vec();
    sorted.sort_by_key(|&(_, avg)| avg);

    let n = sorted.len();
    for i in 0..n - 1 {
        let (lo_id, lo) = sorted[i];
        let (hi_id, hi) = sorted[i + 1];
        if rel_dev_bps(hi, lo)? > threshold_bps {
            if i < n / 2 {
                ignored.insert(lo_id);
            } else {
                ignored.insert(hi_id);
            }
        }
    }

    Ok(ignored)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(set: &BTreeSet<OracleId>) -> Vec<OracleId> {
        set.iter().copied().collect()
    }

    #[test]
    fn tight_cluster_flags_nothing() {
        let avgs = [(1, 2000), (2, 2010), (3, 1995), (4, 2005)];
        assert!(cross_source_filter(&avgs, 300).unwrap().is_empty());
    }

    #[test]
    fn low_outlier_flagged() {
        let avgs = [(1, 100), (2, 1990), (3, 2000), (4, 2010)];
        assert_eq!(ids(&cross_source_filter(&avgs, 300).unwrap()), vec![1]);
    }

    #[test]
    fn high_outlier_flagged() {
        let avgs = [(1, 1990), (2, 2000), (3, 2010), (4, 5000)];
        assert_eq!(ids(&cross_source_filter(&avgs, 300).unwrap()), vec![4]);
    }

    #[test]
    fn outliers_on_both_ends() {
        let avgs = [(1, 1990), (2, 2000), (3, 2010), (4, 5000), (5, 100)];
        assert_eq!(ids(&cross_source_filter(&avgs, 300).unwrap()), vec![4, 5]);
    }

    #[test]
    fn single_source_is_noop() {
        let avgs = [(9, 2000)];
        assert!(cross_source_filter(&avgs, 300).unwrap().is_empty());
    }

    #[test]
    fn empty_input_is_noop() {
        assert!(cross_source_filter(&[], 300).unwrap().is_empty());
    }

    #[test]
    fn gap_exactly_at_threshold_survives() {
        // 2060/2000 - 1 = 3.00% = 300 bps, not strictly greater.
        let avgs = [(1, 2000), (2, 2060)];
        assert!(cross_source_filter(&avgs, 300).unwrap().is_empty());
    }

    #[test]
    fn single_pass_keeps_original_neighbors() {
        // 100 is flagged against 1000; the 1000↔1030 pair is still compared
        // as-is (no re-pairing of 100's neighbors after exclusion).
        let avgs = [(1, 100), (2, 1000), (3, 1030)];
        assert_eq!(ids(&cross_source_filter(&avgs, 300).unwrap()), vec![1]);
    }

    #[test]
    fn two_sources_far_apart_flag_the_lower() {
        // With two sources there is no middle to trust; the documented
        // choice keeps the upper element.
        let avgs = [(7, 1000), (8, 2000)];
        assert_eq!(ids(&cross_source_filter(&avgs, 300).unwrap()), vec![7]);
    }
}
