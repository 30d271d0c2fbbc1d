//! The batch state machine.

use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use fairbatch_core::error::FairbatchError;
use fairbatch_core::fixed::ratio_bps;
use fairbatch_core::types::{
    BatchId, Bps, OracleId, ParticipantId, Price, Side, Tick, Volume, Weight,
};
use fairbatch_registry::{OracleRegistry, PriceReporter};
use fairbatch_stats::{cross_source_filter, trim};
use fairbatch_weights::{accuracy_precision_score, dispute_scores, update_weight};

use crate::batch::{Batch, OracleBatchStats, Order, Phase, VoidReason};
use crate::config::EngineConfig;
use crate::settlement::{claim_outcome, fill_ratios, ClaimOutcome, SettlementRecord};

/// Owns the live batch, the terminal-batch archive, the oracle registry,
/// and the reporter capability. Every public method is one atomic step.
pub struct BatchEngine {
    config: EngineConfig,
    registry: OracleRegistry,
    reporter: Box<dyn PriceReporter>,
    current: Batch,
    archive: BTreeMap<BatchId, Batch>,
    next_batch_id: BatchId,
}

impl BatchEngine {
    pub fn new(
        config: EngineConfig,
        registry: OracleRegistry,
        reporter: Box<dyn PriceReporter>,
        now: Tick,
    ) -> Self {
        Self::with_next_id(config, registry, reporter, now, 0)
    }

    /// Resume with a previously persisted batch-id counter (the archive of
    /// older batches stays in the store; claims against them go through it).
    pub fn with_next_id(
        config: EngineConfig,
        registry: OracleRegistry,
        reporter: Box<dyn PriceReporter>,
        now: Tick,
        next_batch_id: BatchId,
    ) -> Self {
        let current = Batch::new(next_batch_id, now, &config);
        info!(batch = current.id, "batch opened");
        Self {
            config,
            registry,
            reporter,
            current,
            archive: BTreeMap::new(),
            next_batch_id: next_batch_id + 1,
        }
    }

    // ── Read access ──────────────────────────────────────────────────────────

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn current(&self) -> &Batch {
        &self.current
    }

    pub fn registry(&self) -> &OracleRegistry {
        &self.registry
    }

    pub fn archived(&self, id: BatchId) -> Option<&Batch> {
        self.archive.get(&id)
    }

    /// Historical reading passthrough for off-core dispute verification.
    pub fn historical_price(&self, oracle: OracleId, round: u64) -> Option<Price> {
        self.reporter.read_historical(oracle, round)
    }

    /// Read-only settlement record of a terminal batch, for the payout step.
    pub fn settlement_record(&self, id: BatchId) -> Result<SettlementRecord, FairbatchError> {
        if id == self.current.id {
            return Err(FairbatchError::BatchNotTerminal(id));
        }
        let batch = self
            .archive
            .get(&id)
            .ok_or(FairbatchError::UnknownBatch(id))?;
        Ok(SettlementRecord::from_batch(batch))
    }

    // ── Oracle administration ────────────────────────────────────────────────

    pub fn register_oracle(
        &mut self,
        endpoint: impl Into<String>,
        initial_weight: Weight,
    ) -> Result<OracleId, FairbatchError> {
        self.registry.register(endpoint, initial_weight)
    }

    pub fn deactivate_oracle(&mut self, id: OracleId) -> Result<(), FairbatchError> {
        self.registry.deactivate(id)
    }

    // ── Order intake ─────────────────────────────────────────────────────────

    /// Deposit into the current batch. Repeated deposits accumulate; a
    /// repeat under the other side is rejected, never re-interpreted.
    pub fn submit_order(
        &mut self,
        participant: ParticipantId,
        side: Side,
        amount: Volume,
    ) -> Result<(), FairbatchError> {
        self.require_phase(Phase::Open)?;
        if amount == 0 {
            return Err(FairbatchError::ZeroAmount);
        }

        match self.current.orders.get_mut(&participant) {
            Some(order) => {
                if order.side != side {
                    return Err(FairbatchError::SideMismatch);
                }
                order.amount += amount;
            }
            None => {
                self.current.orders.insert(participant, Order::new(side, amount));
            }
        }
        match side {
            Side::Buy => self.current.buy_volume += amount,
            Side::Sell => self.current.sell_volume += amount,
        }
        debug!(batch = self.current.id, %participant, %side, amount, "order deposit");
        Ok(())
    }

    // ── Observation rounds ───────────────────────────────────────────────────

    /// Run one observation round over the active oracles. Returns the number
    /// of accepted readings. Reporter failures are skipped per-oracle; they
    /// only shrink that oracle's sample.
    pub fn poll(&mut self, now: Tick) -> Result<usize, FairbatchError> {
        self.require_phase(Phase::Accumulating)?;
        if let Some(last) = self.current.last_poll_at {
            let next = last + self.config.collection_interval;
            if now < next {
                return Err(FairbatchError::CollectionIntervalNotElapsed {
                    last_poll: last,
                    next,
                });
            }
        }

        let mut accepted = 0usize;
        for id in self.registry.active_ids() {
            let Some(reading) = self.reporter.read_latest(id) else {
                debug!(oracle = id, "reporter gave no reading this round");
                continue;
            };
            if self
                .registry
                .accept_reading(id, reading.price, reading.observed_at, now)?
            {
                self.current
                    .stats
                    .entry(id)
                    .or_insert_with(OracleBatchStats::default)
                    .observations
                    .push(reading.price);
                accepted += 1;
            }
        }

        self.current.last_poll_at = Some(now);
        self.current.rounds += 1;
        debug!(
            batch = self.current.id,
            round = self.current.rounds,
            accepted,
            "observation round complete"
        );
        Ok(accepted)
    }

    // ── Disputes ─────────────────────────────────────────────────────────────

    /// File a dispute for the caller's order. One per order; disputed
    /// orders refund in full at claim time no matter how the batch ends.
    pub fn dispute(&mut self, participant: ParticipantId) -> Result<(), FairbatchError> {
        self.require_phase(Phase::Disputing)?;
        let order = self
            .current
            .orders
            .get_mut(&participant)
            .ok_or_else(|| FairbatchError::UnknownOrder(participant.to_hex()))?;
        if order.disputed {
            return Err(FairbatchError::AlreadyDisputed);
        }
        if order.claimed {
            return Err(FairbatchError::AlreadyClaimed);
        }

        order.disputed = true;
        let amount = order.amount;
        match order.side {
            Side::Buy => self.current.disputed_buy_volume += amount,
            Side::Sell => self.current.disputed_sell_volume += amount,
        }
        info!(batch = self.current.id, %participant, amount, "dispute recorded");
        Ok(())
    }

    // ── Phase transitions ────────────────────────────────────────────────────

    /// Attempt the next forward transition. The first committed caller wins;
    /// later callers land in the new phase and get a precondition failure.
    /// Returns the phase the live batch is in afterwards.
    pub fn close_phase(&mut self, now: Tick) -> Result<Phase, FairbatchError> {
        match self.current.phase {
            Phase::Open => {
                self.require_deadline(now, self.current.open_deadline)?;
                self.current.phase = Phase::Accumulating;
                info!(batch = self.current.id, "intake closed, accumulating");
                Ok(Phase::Accumulating)
            }
            Phase::Accumulating => {
                self.require_deadline(now, self.current.accumulating_deadline)?;
                self.close_accumulating(now)
            }
            Phase::Disputing => {
                self.require_deadline(now, self.current.disputing_deadline)?;
                self.close_disputing(now)
            }
            Phase::Settling => {
                self.require_deadline(now, self.current.settling_deadline)?;
                self.close_settling(now)
            }
            // The live batch is never terminal (a terminal batch is archived
            // in the same step that ends it), but exhaustive anyway.
            Phase::Settled | Phase::Voided => Err(FairbatchError::WrongPhase {
                current: self.current.phase.name(),
                required: "a non-terminal phase",
            }),
        }
    }

    /// Liveness escape: void a batch stuck far past its nominal duration.
    /// All-or-nothing — full refunds, weights untouched.
    pub fn emergency_void(&mut self, now: Tick) -> Result<(), FairbatchError> {
        let enabled_at = self.current.opened_at
            + self.config.emergency_void_multiple * self.config.nominal_duration();
        if now < enabled_at {
            return Err(FairbatchError::EmergencyVoidNotAvailable { enabled_at });
        }
        warn!(batch = self.current.id, "emergency void");
        self.void(VoidReason::Emergency, now);
        Ok(())
    }

    // ── Claims ───────────────────────────────────────────────────────────────

    /// Claim an order's payout from a terminal batch. Lazy: the outcome is
    /// computed here, not at settlement. Second claims are rejected.
    pub fn claim(
        &mut self,
        batch_id: BatchId,
        participant: ParticipantId,
    ) -> Result<ClaimOutcome, FairbatchError> {
        if batch_id == self.current.id {
            return Err(FairbatchError::BatchNotTerminal(batch_id));
        }
        let batch = self
            .archive
            .get_mut(&batch_id)
            .ok_or(FairbatchError::UnknownBatch(batch_id))?;
        let order = batch
            .orders
            .get_mut(&participant)
            .ok_or_else(|| FairbatchError::UnknownOrder(participant.to_hex()))?;
        if order.claimed {
            return Err(FairbatchError::AlreadyClaimed);
        }

        order.claimed = true;
        let order = order.clone();
        let outcome = claim_outcome(batch, &order);
        debug!(
            batch = batch_id,
            %participant,
            filled = outcome.filled,
            refunded = outcome.refunded,
            "claim paid"
        );
        Ok(outcome)
    }

    // ── Internals ────────────────────────────────────────────────────────────

    fn require_phase(&self, required: Phase) -> Result<(), FairbatchError> {
        if self.current.phase != required {
            return Err(FairbatchError::WrongPhase {
                current: self.current.phase.name(),
                required: required.name(),
            });
        }
        Ok(())
    }

    fn require_deadline(&self, now: Tick, deadline: Tick) -> Result<(), FairbatchError> {
        if now < deadline {
            return Err(FairbatchError::DeadlineNotReached { now, deadline });
        }
        Ok(())
    }

    /// ACCUMULATING exit: trim per oracle, filter across oracles, fix the
    /// settlement price, score delta1. Voids on insufficient data.
    fn close_accumulating(&mut self, now: Tick) -> Result<Phase, FairbatchError> {
        // Step 1: per-oracle trimmed averages; thin samples are ignored.
        for (&id, stats) in self.current.stats.iter_mut() {
            if stats.observations.len() < self.config.min_samples_per_oracle {
                stats.ignored = true;
                debug!(oracle = id, have = stats.observations.len(), "ignored: thin sample");
                continue;
            }
            match trim(&stats.observations, self.config.trim_fraction_bps) {
                Ok(avg) => stats.trimmed_avg = Some(avg),
                Err(_) => {
                    stats.ignored = true;
                    debug!(oracle = id, "ignored: trim failed");
                }
            }
        }

        // Step 2: cross-source outliers among the surviving averages.
        let averages: Vec<(OracleId, Price)> = self
            .current
            .stats
            .iter()
            .filter(|(_, s)| !s.ignored)
            .filter_map(|(&id, s)| s.trimmed_avg.map(|avg| (id, avg)))
            .collect();
        let outliers = cross_source_filter(&averages, self.config.cross_source_threshold_bps)?;
        for id in &outliers {
            if let Some(stats) = self.current.stats.get_mut(id) {
                stats.ignored = true;
            }
            warn!(batch = self.current.id, oracle = id, "cross-source outlier ignored");
        }

        // Step 3: weighted settlement price over the non-ignored set, both
        // sums accumulated at full scale before one final division. A
        // contribution that overflows the accumulator comes from a garbage
        // average; that oracle is ignored, never the batch.
        let contributors: Vec<(OracleId, Price)> = averages
            .into_iter()
            .filter(|(id, _)| !outliers.contains(id))
            .collect();
        let mut weighted_sum: u128 = 0;
        let mut weight_sum: u128 = 0;
        let mut priced = 0usize;
        for &(id, avg) in &contributors {
            let w = self.registry.weight(id).unwrap_or(0) as u128;
            let Some(sum) = avg.checked_mul(w).and_then(|t| weighted_sum.checked_add(t)) else {
                if let Some(stats) = self.current.stats.get_mut(&id) {
                    stats.ignored = true;
                }
                warn!(batch = self.current.id, oracle = id, "oracle ignored: average overflows aggregation");
                continue;
            };
            weighted_sum = sum;
            weight_sum += w;
            priced += 1;
        }
        if priced < self.config.min_valid_oracles {
            warn!(
                batch = self.current.id,
                valid = priced,
                "voiding: insufficient valid oracles"
            );
            self.void(VoidReason::InsufficientOracles, now);
            return Ok(Phase::Open);
        }
        if weight_sum == 0 {
            self.void(VoidReason::ZeroTotalWeight, now);
            return Ok(Phase::Open);
        }
        let price = weighted_sum / weight_sum;

        // Step 4: delta1 for every oracle holding a valid trimmed average.
        // Cross-source outliers are scored too (their distance is the
        // penalty) but never earn the participation bonus.
        for (&id, stats) in self.current.stats.iter_mut() {
            let Some(avg) = stats.trimmed_avg else { continue };
            let bonus = if stats.ignored {
                0
            } else {
                self.config.accuracy_bonus_bps
            };
            let delta1 = accuracy_precision_score(avg, price, &stats.observations, bonus)?;
            stats.delta1 = Some(delta1);
            debug!(oracle = id, delta1, "accuracy score");
        }

        self.current.settlement_price = Some(price);
        self.current.phase = Phase::Disputing;
        info!(batch = self.current.id, price, "settlement price fixed, disputing");
        Ok(Phase::Disputing)
    }

    /// DISPUTING exit: measure the dispute ratio, void past the threshold,
    /// otherwise score delta2 over the price-ranked oracle set.
    fn close_disputing(&mut self, now: Tick) -> Result<Phase, FairbatchError> {
        let total = self.current.total_volume();
        let disputed = self
            .current
            .disputed_buy_volume
            .max(self.current.disputed_sell_volume);
        let dispute_ratio: Bps = if total == 0 {
            0
        } else {
            ratio_bps(disputed, total)?
        };

        if dispute_ratio > self.config.void_threshold_bps {
            warn!(
                batch = self.current.id,
                dispute_ratio, "voiding: dispute threshold exceeded"
            );
            self.void(VoidReason::DisputeThresholdExceeded, now);
            return Ok(Phase::Open);
        }

        // Rank by trimmed average ascending; stable sort keeps registration
        // order on ties.
        let mut ranked: Vec<(OracleId, Price)> = self
            .current
            .stats
            .iter()
            .filter(|(_, s)| !s.ignored)
            .filter_map(|(&id, s)| s.trimmed_avg.map(|avg| (id, avg)))
            .collect();
        ranked.sort_by_key(|&(_, avg)| avg);

        let buy_dominates = self.current.disputed_buy_volume >= self.current.disputed_sell_volume;
        let scores = dispute_scores(
            ranked.len(),
            dispute_ratio,
            self.config.void_threshold_bps,
            buy_dominates,
        );
        for ((id, _), delta2) in ranked.into_iter().zip(scores) {
            if let Some(stats) = self.current.stats.get_mut(&id) {
                stats.delta2 = Some(delta2);
                debug!(oracle = id, delta2, "dispute score");
            }
        }

        self.current.phase = Phase::Settling;
        info!(batch = self.current.id, dispute_ratio, "dispute window closed, settling");
        Ok(Phase::Settling)
    }

    /// SETTLING exit: the one place weights change. Applies both correction
    /// terms, fixes fill ratios, archives the batch, opens the next.
    fn close_settling(&mut self, now: Tick) -> Result<Phase, FairbatchError> {
        let corrections: BTreeMap<OracleId, (Bps, Bps)> = self
            .current
            .stats
            .iter()
            .filter(|(_, s)| s.delta1.is_some() || s.delta2.is_some())
            .map(|(&id, s)| (id, (s.delta1.unwrap_or(0), s.delta2.unwrap_or(0))))
            .collect();
        let (w_min, w_max) = (self.config.w_min, self.config.w_max);
        self.registry
            .apply_weight_updates(&corrections, |w, d1, d2| {
                update_weight(w, d1, d2, w_min, w_max)
            });

        self.current.fill = Some(fill_ratios(
            self.current.buy_volume,
            self.current.sell_volume,
        ));
        self.current.phase = Phase::Settled;
        info!(
            batch = self.current.id,
            price = self.current.settlement_price,
            "batch settled"
        );
        self.advance(now);
        Ok(Phase::Open)
    }

    /// Terminal void from any phase-exit decision point. Downstream fields
    /// are cleared (a dispute-triggered void arrives after pricing) and the
    /// registry is never touched.
    fn void(&mut self, reason: VoidReason, now: Tick) {
        self.current.settlement_price = None;
        self.current.fill = None;
        self.current.void_reason = Some(reason);
        self.current.phase = Phase::Voided;
        self.advance(now);
    }

    /// Archive the (terminal) live batch and open the next one.
    fn advance(&mut self, now: Tick) {
        debug_assert!(self.current.phase.is_terminal());
        let id = self.next_batch_id;
        self.next_batch_id += 1;
        let finished = std::mem::replace(&mut self.current, Batch::new(id, now, &self.config));
        self.archive.insert(finished.id, finished);
        info!(batch = id, "batch opened");
    }
}
