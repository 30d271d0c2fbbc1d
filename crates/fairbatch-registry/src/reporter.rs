//! Price-reporter capability boundary.

use std::collections::HashMap;

use fairbatch_core::types::{OracleId, Price, Tick};

/// One reading from an external price reporter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Reading {
    pub price: Price,
    /// Reporter-claimed observation time on the shared monotonic counter.
    pub observed_at: Tick,
}

/// Interface to an external price-reporter endpoint.
///
/// Every failure mode — endpoint error, timeout, feed gone stale beyond its
/// heartbeat — collapses to `None`: the engine skips that reporter for the
/// round and never blocks. A call must return within the same atomic step;
/// there is no pending-read state.
pub trait PriceReporter {
    /// Latest reading for `oracle`, if the endpoint answered.
    fn read_latest(&self, oracle: OracleId) -> Option<Reading>;

    /// Historical reading for a past observation round, used by off-core
    /// dispute verification.
    fn read_historical(&self, oracle: OracleId, round: u64) -> Option<Price>;
}

// ── MockReporter ─────────────────────────────────────────────────────────────

/// Deterministic scripted reporter for tests and simulation.
///
/// Each oracle holds a queue of responses consumed one per `read_latest`
/// call; an exhausted or missing script answers `None`, which is exactly
/// how a dead endpoint looks to the engine.
#[derive(Default)]
pub struct MockReporter {
    scripts: std::cell::RefCell<HashMap<OracleId, Vec<Option<Reading>>>>,
    history: HashMap<OracleId, Vec<Price>>,
}

impl MockReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script a sequence of responses for `oracle`; `None` entries model
    /// per-round endpoint failures.
    pub fn script(&mut self, oracle: OracleId, responses: Vec<Option<Reading>>) {
        let history = responses
            .iter()
            .flatten()
            .map(|r| r.price)
            .collect();
        self.history.insert(oracle, history);
        self.scripts.borrow_mut().insert(oracle, responses);
    }

    /// Script an always-fresh price sequence (observed_at = poll order).
    pub fn script_prices(&mut self, oracle: OracleId, prices: &[Price]) {
        let responses = prices
            .iter()
            .enumerate()
            .map(|(i, &price)| {
                Some(Reading {
                    price,
                    observed_at: i as Tick,
                })
            })
            .collect();
        self.script(oracle, responses);
    }
}

impl PriceReporter for MockReporter {
    fn read_latest(&self, oracle: OracleId) -> Option<Reading> {
        let mut scripts = self.scripts.borrow_mut();
        let queue = scripts.get_mut(&oracle)?;
        if queue.is_empty() {
            None
        } else {
            queue.remove(0)
        }
    }

    fn read_historical(&self, oracle: OracleId, round: u64) -> Option<Price> {
        self.history.get(&oracle)?.get(round as usize).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripted_responses_consumed_in_order() {
        let mut rep = MockReporter::new();
        rep.script(
            1,
            vec![
                Some(Reading { price: 2000, observed_at: 0 }),
                None,
                Some(Reading { price: 2010, observed_at: 2 }),
            ],
        );
        assert_eq!(rep.read_latest(1).unwrap().price, 2000);
        assert!(rep.read_latest(1).is_none());
        assert_eq!(rep.read_latest(1).unwrap().price, 2010);
        // Exhausted script looks like a dead endpoint.
        assert!(rep.read_latest(1).is_none());
    }

    #[test]
    fn unknown_oracle_answers_none() {
        let rep = MockReporter::new();
        assert!(rep.read_latest(42).is_none());
        assert!(rep.read_historical(42, 0).is_none());
    }

    #[test]
    fn historical_reads_skip_failure_rounds() {
        let mut rep = MockReporter::new();
        rep.script(
            7,
            vec![
                Some(Reading { price: 100, observed_at: 0 }),
                None,
                Some(Reading { price: 110, observed_at: 2 }),
            ],
        );
        assert_eq!(rep.read_historical(7, 0), Some(100));
        assert_eq!(rep.read_historical(7, 1), Some(110));
        assert_eq!(rep.read_historical(7, 2), None);
    }
}
