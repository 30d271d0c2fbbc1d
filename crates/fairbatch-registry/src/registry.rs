//! Persistent oracle registry.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use fairbatch_core::constants::{MAX_STEP_DEVIATION_BPS, STALE_AFTER_TICKS, W_MAX, W_MIN};
use fairbatch_core::error::FairbatchError;
use fairbatch_core::fixed::rel_dev_bps;
use fairbatch_core::types::{Bps, OracleId, Price, Tick, Weight};

/// One registered price reporter. The weight is the only cross-batch
/// mutable state in the whole core.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct OracleEntry {
    /// Opaque endpoint identity (URL, address — the core never parses it).
    pub endpoint: String,
    /// Reputation weight, always within `[W_MIN, W_MAX]`.
    pub weight: Weight,
    /// Administrative switch; inactive oracles are skipped during polling.
    pub active: bool,
    /// Last reading that passed the per-reading filter.
    pub last_accepted_price: Option<Price>,
    /// Counter value of the last accepted reading.
    pub last_poll_at: Option<Tick>,
}

/// The set of registered reporters and their weights.
///
/// Passed by reference into each batch's settlement step so the weight
/// update stays a pure function of (old weight, corrections) — the
/// registry itself is plain data, not ambient global state.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct OracleRegistry {
    entries: BTreeMap<OracleId, OracleEntry>,
    next_id: OracleId,
}

impl OracleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a reporter endpoint. Weight is clamp-checked, not clamped:
    /// a caller asking for an out-of-bounds weight made a mistake.
    pub fn register(
        &mut self,
        endpoint: impl Into<String>,
        initial_weight: Weight,
    ) -> Result<OracleId, FairbatchError> {
        let endpoint = endpoint.into();
        if !(W_MIN..=W_MAX).contains(&initial_weight) {
            return Err(FairbatchError::WeightOutOfBounds {
                got: initial_weight,
                min: W_MIN,
                max: W_MAX,
            });
        }
        if self.entries.values().any(|e| e.endpoint == endpoint) {
            return Err(FairbatchError::OracleAlreadyRegistered(endpoint));
        }

        let id = self.next_id;
        self.next_id += 1;
        info!(oracle = id, %endpoint, weight = initial_weight, "oracle registered");
        self.entries.insert(
            id,
            OracleEntry {
                endpoint,
                weight: initial_weight,
                active: true,
                last_accepted_price: None,
                last_poll_at: None,
            },
        );
        Ok(id)
    }

    pub fn deactivate(&mut self, id: OracleId) -> Result<(), FairbatchError> {
        let entry = self
            .entries
            .get_mut(&id)
            .ok_or(FairbatchError::UnknownOracle(id))?;
        entry.active = false;
        info!(oracle = id, "oracle deactivated");
        Ok(())
    }

    pub fn reactivate(&mut self, id: OracleId) -> Result<(), FairbatchError> {
        let entry = self
            .entries
            .get_mut(&id)
            .ok_or(FairbatchError::UnknownOracle(id))?;
        entry.active = true;
        info!(oracle = id, "oracle reactivated");
        Ok(())
    }

    pub fn get(&self, id: OracleId) -> Option<&OracleEntry> {
        self.entries.get(&id)
    }

    pub fn weight(&self, id: OracleId) -> Option<Weight> {
        self.entries.get(&id).map(|e| e.weight)
    }

    /// Ids of oracles eligible for polling.
    pub fn active_ids(&self) -> Vec<OracleId> {
        self.entries
            .iter()
            .filter(|(_, e)| e.active)
            .map(|(&id, _)| id)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&OracleId, &OracleEntry)> {
        self.entries.iter()
    }

    /// Per-reading filter: decide whether a reading from `id` observed at
    /// `observed_at` enters the current round's sample.
    ///
    /// Rejects readings that are stale beyond the heartbeat or that jump
    /// more than `MAX_STEP_DEVIATION_BPS` from the oracle's last accepted
    /// price. Accepted readings update the entry's filter state. Returns
    /// whether the reading was accepted.
    pub fn accept_reading(
        &mut self,
        id: OracleId,
        price: Price,
        observed_at: Tick,
        now: Tick,
    ) -> Result<bool, FairbatchError> {
        let entry = self
            .entries
            .get_mut(&id)
            .ok_or(FairbatchError::UnknownOracle(id))?;

        if !entry.active {
            return Ok(false);
        }
        if observed_at > now || now - observed_at > STALE_AFTER_TICKS {
            debug!(oracle = id, observed_at, now, "reading rejected: stale");
            return Ok(false);
        }
        if price == 0 {
            debug!(oracle = id, "reading rejected: zero price");
            return Ok(false);
        }
        if let Some(last) = entry.last_accepted_price {
            if rel_dev_bps(price, last)? > MAX_STEP_DEVIATION_BPS {
                debug!(oracle = id, price, last, "reading rejected: step deviation");
                return Ok(false);
            }
        }

        entry.last_accepted_price = Some(price);
        entry.last_poll_at = Some(now);
        Ok(true)
    }

    /// Apply per-batch corrections. Invoked exactly once per settled batch;
    /// voided batches never reach this point, leaving weights untouched.
    pub fn apply_weight_updates<F>(&mut self, corrections: &BTreeMap<OracleId, (Bps, Bps)>, update: F)
    where
        F: Fn(Weight, Bps, Bps) -> Weight,
    {
        for (&id, &(delta1, delta2)) in corrections {
            if let Some(entry) = self.entries.get_mut(&id) {
                let old = entry.weight;
                entry.weight = update(old, delta1, delta2).clamp(W_MIN, W_MAX);
                debug!(
                    oracle = id,
                    old, new = entry.weight, delta1, delta2, "weight updated"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry_with_one() -> (OracleRegistry, OracleId) {
        let mut reg = OracleRegistry::new();
        let id = reg.register("feed://alpha", 500).unwrap();
        (reg, id)
    }

    #[test]
    fn register_assigns_increasing_ids() {
        let mut reg = OracleRegistry::new();
        let a = reg.register("feed://a", 500).unwrap();
        let b = reg.register("feed://b", 500).unwrap();
        assert!(b > a);
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn duplicate_endpoint_rejected() {
        let mut reg = OracleRegistry::new();
        reg.register("feed://a", 500).unwrap();
        assert!(matches!(
            reg.register("feed://a", 500),
            Err(FairbatchError::OracleAlreadyRegistered(_))
        ));
    }

    #[test]
    fn out_of_bounds_initial_weight_rejected() {
        let mut reg = OracleRegistry::new();
        assert!(reg.register("feed://a", 0).is_err());
        assert!(reg.register("feed://b", W_MAX + 1).is_err());
    }

    #[test]
    fn inactive_oracles_are_skipped() {
        let (mut reg, id) = registry_with_one();
        reg.deactivate(id).unwrap();
        assert!(reg.active_ids().is_empty());
        assert!(!reg.accept_reading(id, 2000, 5, 5).unwrap());
        reg.reactivate(id).unwrap();
        assert_eq!(reg.active_ids(), vec![id]);
    }

    #[test]
    fn stale_reading_rejected() {
        let (mut reg, id) = registry_with_one();
        let now = STALE_AFTER_TICKS + 10;
        assert!(!reg.accept_reading(id, 2000, 0, now).unwrap());
        // A future-dated reading is equally unusable.
        assert!(!reg.accept_reading(id, 2000, now + 1, now).unwrap());
    }

    #[test]
    fn step_deviation_filter_uses_last_accepted() {
        let (mut reg, id) = registry_with_one();
        assert!(reg.accept_reading(id, 2000, 1, 1).unwrap());
        // +50% jump from 2000 rejected...
        assert!(!reg.accept_reading(id, 3000, 2, 2).unwrap());
        // ...and the filter anchor is still 2000, not 3000.
        assert!(reg.accept_reading(id, 2100, 3, 3).unwrap());
        assert_eq!(reg.get(id).unwrap().last_accepted_price, Some(2100));
    }

    #[test]
    fn first_reading_has_no_step_anchor() {
        let (mut reg, id) = registry_with_one();
        assert!(reg.accept_reading(id, 123_456, 0, 0).unwrap());
    }

    #[test]
    fn weight_updates_stay_clamped() {
        let (mut reg, id) = registry_with_one();
        let mut corrections = BTreeMap::new();
        corrections.insert(id, (-9_999i64, 0i64));
        reg.apply_weight_updates(&corrections, |w, d1, _| {
            fairbatch_core::fixed::mul_bps(w as u128, d1) as Weight
        });
        assert_eq!(reg.weight(id), Some(W_MIN));
    }
}
