//! fairbatch-sim — drive the batch engine end-to-end against a simulated
//! oracle set.
//!
//! Each run:
//!   1. Open (or create) the persistent store
//!   2. Load the oracle registry if one survives from a previous run
//!   3. Script a seeded random-walk price feed per oracle
//!   4. Walk N full batch lifecycles: orders → polls → disputes → settle
//!   5. Archive terminal batches and persist the registry
//!
//! Usage:
//!   fairbatch-sim [--data-dir <path>] [--batches <n>] [--oracles <n>]
//!                 [--seed <u64>] [--config <json>]

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{info, warn};

use fairbatch_core::constants::DEFAULT_INITIAL_WEIGHT;
use fairbatch_core::types::{ParticipantId, Price, Side, Tick};
use fairbatch_engine::{BatchEngine, EngineConfig, Phase};
use fairbatch_registry::{MockReporter, OracleRegistry, Reading};
use fairbatch_store::StoreDb;

#[derive(Parser, Debug)]
#[command(
    name = "fairbatch-sim",
    version,
    about = "FairBatch simulator — batch clearing against scripted oracles"
)]
struct Args {
    /// Directory for the persistent store.
    #[arg(long, default_value = "./fairbatch-data")]
    data_dir: PathBuf,

    /// Number of batch lifecycles to run.
    #[arg(long, default_value_t = 5)]
    batches: u64,

    /// Oracles to register on a fresh store.
    #[arg(long, default_value_t = 5)]
    oracles: u64,

    /// RNG seed for the simulated price feeds and traders.
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Optional engine config overrides (JSON, partial is fine).
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,fairbatch_engine=debug".parse().unwrap()),
        )
        .init();

    let args = Args::parse();
    let config = load_config(args.config.as_deref())?;
    info!(batches = args.batches, seed = args.seed, "fairbatch-sim starting");

    let store = StoreDb::open(&args.data_dir)
        .with_context(|| format!("opening store at {}", args.data_dir.display()))?;

    let registry = match store.load_registry()? {
        Some(reg) => {
            info!(oracles = reg.len(), "registry loaded from store");
            reg
        }
        None => {
            let mut reg = OracleRegistry::new();
            for i in 0..args.oracles {
                reg.register(format!("feed://oracle-{i}"), DEFAULT_INITIAL_WEIGHT)?;
            }
            info!(oracles = reg.len(), "fresh registry created");
            reg
        }
    };

    let mut rng = StdRng::seed_from_u64(args.seed);
    let reporter = script_feeds(&registry, &config, args.batches, &mut rng);
    let next_id = store.next_batch_id()?;
    let mut engine = BatchEngine::with_next_id(config, registry, Box::new(reporter), 0, next_id);

    for k in 0..args.batches {
        let base = k * engine.config().nominal_duration();
        run_batch(&mut engine, base, &mut rng)?;

        let finished_id = engine.current().id - 1;
        {
            let finished = engine
                .archived(finished_id)
                .expect("terminal batch is archived");
            match finished.phase {
                Phase::Settled => info!(
                    batch = finished_id,
                    price = finished.settlement_price,
                    buy_volume = finished.buy_volume,
                    sell_volume = finished.sell_volume,
                    "batch settled"
                ),
                Phase::Voided => warn!(batch = finished_id, reason = ?finished.void_reason, "batch voided"),
                _ => unreachable!("archived batches are terminal"),
            }
        }

        // Pay out before archiving so the persisted record carries the
        // claimed flags.
        pay_out(&mut engine, finished_id);
        let finished = engine
            .archived(finished_id)
            .expect("terminal batch is archived");
        store.archive_batch(finished)?;
        store.save_registry(engine.registry())?;
        store.put_next_batch_id(engine.current().id + 1)?;
    }

    for (id, entry) in engine.registry().iter() {
        info!(oracle = id, weight = entry.weight, endpoint = %entry.endpoint, "final weight");
    }
    Ok(())
}

fn load_config(path: Option<&std::path::Path>) -> anyhow::Result<EngineConfig> {
    match path {
        Some(p) => {
            let text = std::fs::read_to_string(p)
                .with_context(|| format!("reading config {}", p.display()))?;
            serde_json::from_str(&text).context("parsing engine config")
        }
        None => Ok(EngineConfig::default()),
    }
}

/// Script one random-walk feed per registered oracle, covering every poll
/// of every batch. One oracle in five drifts upward hard — reputation bait.
fn script_feeds(
    registry: &OracleRegistry,
    config: &EngineConfig,
    batches: u64,
    rng: &mut StdRng,
) -> MockReporter {
    let mut reporter = MockReporter::new();
    let rounds_per_batch = config.accumulating_ticks / config.collection_interval;

    for (&id, _) in registry.iter() {
        let drifts = id % 5 == 4;
        let mut price: Price = 2_000_000;
        let mut readings: Vec<Option<Reading>> = Vec::new();
        for k in 0..batches {
            let accumulating_from = k * config.nominal_duration() + config.open_ticks;
            for j in 0..rounds_per_batch {
                // 10% of rounds the endpoint just doesn't answer.
                if rng.gen_ratio(1, 10) {
                    readings.push(None);
                    continue;
                }
                let step = rng.gen_range(-50i64..=50) as i128;
                price = (price as i128 + price as i128 * step / 10_000).max(1) as Price;
                if drifts {
                    price += price / 200;
                }
                readings.push(Some(Reading {
                    price,
                    observed_at: accumulating_from + j * config.collection_interval,
                }));
            }
        }
        reporter.script(id, readings);
    }
    reporter
}

/// One full lifecycle starting at `base` on the counter.
fn run_batch(engine: &mut BatchEngine, base: Tick, rng: &mut StdRng) -> anyhow::Result<()> {
    let cfg = engine.config().clone();

    // Orders: a handful of traders per side.
    let mut traders: Vec<(ParticipantId, Side)> = Vec::new();
    for i in 0..rng.gen_range(2..=5u8) {
        let p = trader_id(engine.current().id, i, Side::Buy);
        engine.submit_order(p, Side::Buy, rng.gen_range(50..500) as u128)?;
        traders.push((p, Side::Buy));
    }
    for i in 0..rng.gen_range(2..=5u8) {
        let p = trader_id(engine.current().id, i, Side::Sell);
        engine.submit_order(p, Side::Sell, rng.gen_range(50..500) as u128)?;
        traders.push((p, Side::Sell));
    }

    engine.close_phase(base + cfg.open_ticks)?;

    let rounds = cfg.accumulating_ticks / cfg.collection_interval;
    for j in 0..rounds {
        let tick = base + cfg.open_ticks + j * cfg.collection_interval;
        let accepted = engine.poll(tick)?;
        info!(tick, accepted, "observation round");
    }

    let after_accumulating = engine.close_phase(base + cfg.open_ticks + cfg.accumulating_ticks)?;
    if after_accumulating == Phase::Open {
        // Voided at pricing; the next batch is already live.
        return Ok(());
    }

    // A dissatisfied trader disputes now and then.
    for (p, _) in &traders {
        if rng.gen_ratio(1, 12) {
            engine.dispute(*p)?;
        }
    }

    let after_disputing =
        engine.close_phase(base + cfg.open_ticks + cfg.accumulating_ticks + cfg.disputing_ticks)?;
    if after_disputing == Phase::Open {
        return Ok(());
    }

    engine.close_phase(base + cfg.nominal_duration())?;
    Ok(())
}

/// Claim every order of a finished batch and log the conservation check.
fn pay_out(engine: &mut BatchEngine, batch_id: u64) {
    let participants: Vec<ParticipantId> = engine
        .archived(batch_id)
        .map(|b| b.orders.keys().copied().collect())
        .unwrap_or_default();
    for p in participants {
        match engine.claim(batch_id, p) {
            Ok(out) => info!(batch = batch_id, participant = %p, filled = out.filled, refunded = out.refunded, "claim"),
            Err(e) => warn!(batch = batch_id, participant = %p, error = %e, "claim failed"),
        }
    }
}

fn trader_id(batch: u64, index: u8, side: Side) -> ParticipantId {
    let mut bytes = [0u8; 32];
    bytes[..8].copy_from_slice(&batch.to_be_bytes());
    bytes[8] = index;
    bytes[9] = match side {
        Side::Buy => 0,
        Side::Sell => 1,
    };
    ParticipantId::from_bytes(bytes)
}
