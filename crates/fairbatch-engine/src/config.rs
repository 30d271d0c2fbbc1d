use serde::{Deserialize, Serialize};

use fairbatch_core::constants::{
    ACCURACY_BONUS_BPS, CROSS_SOURCE_THRESHOLD_BPS, DEFAULT_ACCUMULATING_TICKS,
    DEFAULT_COLLECTION_INTERVAL_TICKS, DEFAULT_DISPUTING_TICKS, DEFAULT_OPEN_TICKS,
    DEFAULT_SETTLING_TICKS, EMERGENCY_VOID_MULTIPLE, MIN_SAMPLES_PER_ORACLE, MIN_VALID_ORACLES,
    TRIM_FRACTION_BPS, VOID_THRESHOLD_BPS, W_MAX, W_MIN,
};
use fairbatch_core::types::{Bps, Tick, Weight};

/// Engine parameters, fixed for the lifetime of the engine.
///
/// Defaults mirror `fairbatch_core::constants`; deployments override them
/// from a JSON file (see `fairbatch-cli`).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    // Phase durations on the monotonic counter.
    pub open_ticks: Tick,
    pub accumulating_ticks: Tick,
    pub disputing_ticks: Tick,
    pub settling_ticks: Tick,
    /// Minimum ticks between observation rounds.
    pub collection_interval: Tick,
    /// Multiple of the nominal batch duration after which anyone may
    /// emergency-void a stuck batch.
    pub emergency_void_multiple: Tick,

    // Aggregation.
    pub trim_fraction_bps: Bps,
    pub cross_source_threshold_bps: Bps,
    pub min_samples_per_oracle: usize,
    pub min_valid_oracles: usize,

    // Disputes and reputation.
    pub void_threshold_bps: Bps,
    pub accuracy_bonus_bps: Bps,
    pub w_min: Weight,
    pub w_max: Weight,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            open_ticks: DEFAULT_OPEN_TICKS,
            accumulating_ticks: DEFAULT_ACCUMULATING_TICKS,
            disputing_ticks: DEFAULT_DISPUTING_TICKS,
            settling_ticks: DEFAULT_SETTLING_TICKS,
            collection_interval: DEFAULT_COLLECTION_INTERVAL_TICKS,
            emergency_void_multiple: EMERGENCY_VOID_MULTIPLE,
            trim_fraction_bps: TRIM_FRACTION_BPS,
            cross_source_threshold_bps: CROSS_SOURCE_THRESHOLD_BPS,
            min_samples_per_oracle: MIN_SAMPLES_PER_ORACLE,
            min_valid_oracles: MIN_VALID_ORACLES,
            void_threshold_bps: VOID_THRESHOLD_BPS,
            accuracy_bonus_bps: ACCURACY_BONUS_BPS,
            w_min: W_MIN,
            w_max: W_MAX,
        }
    }
}

impl EngineConfig {
    /// Nominal end-to-end batch duration.
    pub fn nominal_duration(&self) -> Tick {
        self.open_ticks + self.accumulating_ticks + self.disputing_ticks + self.settling_ticks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_constants() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.void_threshold_bps, VOID_THRESHOLD_BPS);
        assert_eq!(cfg.w_min, W_MIN);
        assert_eq!(cfg.nominal_duration(), 275);
    }

    #[test]
    fn partial_json_overrides_fall_back_to_defaults() {
        let cfg: EngineConfig = serde_json::from_str(r#"{"open_ticks": 7}"#).unwrap();
        assert_eq!(cfg.open_ticks, 7);
        assert_eq!(cfg.disputing_ticks, DEFAULT_DISPUTING_TICKS);
    }
}
