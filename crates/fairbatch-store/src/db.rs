use std::path::Path;

use tracing::info;

use fairbatch_core::error::FairbatchError;
use fairbatch_core::types::BatchId;
use fairbatch_engine::Batch;
use fairbatch_registry::OracleRegistry;

/// Persistent store backed by sled (pure-Rust, no C dependencies).
///
/// Named trees:
///   registry — fixed key  → bincode(OracleRegistry)
///   batches  — BatchId BE → bincode(Batch), terminal batches only
///   meta     — utf8 key   → raw bytes
pub struct StoreDb {
    _db: sled::Db,
    registry: sled::Tree,
    batches: sled::Tree,
    meta: sled::Tree,
}

const REGISTRY_KEY: &[u8] = b"registry";
const NEXT_BATCH_ID_KEY: &[u8] = b"next_batch_id";

impl StoreDb {
    /// Open or create the store at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, FairbatchError> {
        let db = sled::open(path).map_err(storage_err)?;
        let registry = db.open_tree("registry").map_err(storage_err)?;
        let batches = db.open_tree("batches").map_err(storage_err)?;
        let meta = db.open_tree("meta").map_err(storage_err)?;
        Ok(Self {
            _db: db,
            registry,
            batches,
            meta,
        })
    }

    // ── Registry ─────────────────────────────────────────────────────────────

    pub fn save_registry(&self, registry: &OracleRegistry) -> Result<(), FairbatchError> {
        let bytes = bincode::serialize(registry).map_err(ser_err)?;
        self.registry
            .insert(REGISTRY_KEY, bytes)
            .map_err(storage_err)?;
        Ok(())
    }

    pub fn load_registry(&self) -> Result<Option<OracleRegistry>, FairbatchError> {
        match self.registry.get(REGISTRY_KEY).map_err(storage_err)? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes).map_err(ser_err)?)),
            None => Ok(None),
        }
    }

    // ── Batch archive ────────────────────────────────────────────────────────

    /// Archive a terminal batch. The archive is append-only; claims read it,
    /// nothing rewrites it.
    pub fn archive_batch(&self, batch: &Batch) -> Result<(), FairbatchError> {
        let bytes = bincode::serialize(batch).map_err(ser_err)?;
        self.batches
            .insert(batch.id.to_be_bytes(), bytes)
            .map_err(storage_err)?;
        info!(batch = batch.id, phase = %batch.phase, "batch archived");
        Ok(())
    }

    pub fn get_batch(&self, id: BatchId) -> Result<Option<Batch>, FairbatchError> {
        match self.batches.get(id.to_be_bytes()).map_err(storage_err)? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes).map_err(ser_err)?)),
            None => Ok(None),
        }
    }

    pub fn batch_count(&self) -> usize {
        self.batches.len()
    }

    // ── Meta ─────────────────────────────────────────────────────────────────

    pub fn put_next_batch_id(&self, id: BatchId) -> Result<(), FairbatchError> {
        self.meta
            .insert(NEXT_BATCH_ID_KEY, &id.to_be_bytes())
            .map_err(storage_err)?;
        Ok(())
    }

    pub fn next_batch_id(&self) -> Result<BatchId, FairbatchError> {
        match self.meta.get(NEXT_BATCH_ID_KEY).map_err(storage_err)? {
            Some(bytes) => {
                let arr: [u8; 8] = bytes
                    .as_ref()
                    .try_into()
                    .map_err(|_| FairbatchError::Storage("corrupt next_batch_id".into()))?;
                Ok(BatchId::from_be_bytes(arr))
            }
            None => Ok(0),
        }
    }
}

fn storage_err(e: sled::Error) -> FairbatchError {
    FairbatchError::Storage(e.to_string())
}

fn ser_err(e: bincode::Error) -> FairbatchError {
    FairbatchError::Serialization(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fairbatch_engine::{Batch, EngineConfig, Phase};

    fn open_temp() -> (tempfile::TempDir, StoreDb) {
        let dir = tempfile::tempdir().unwrap();
        let db = StoreDb::open(dir.path()).unwrap();
        (dir, db)
    }

    #[test]
    fn registry_round_trips_with_weights_intact() {
        let (_dir, db) = open_temp();
        let mut reg = OracleRegistry::new();
        reg.register("feed://a", 123).unwrap();
        reg.register("feed://b", 777).unwrap();
        db.save_registry(&reg).unwrap();

        let loaded = db.load_registry().unwrap().unwrap();
        assert_eq!(loaded.len(), 2);
        let weights: Vec<_> = loaded.iter().map(|(_, e)| e.weight).collect();
        assert_eq!(weights, vec![123, 777]);
    }

    #[test]
    fn empty_store_has_no_registry_and_id_zero() {
        let (_dir, db) = open_temp();
        assert!(db.load_registry().unwrap().is_none());
        assert_eq!(db.next_batch_id().unwrap(), 0);
    }

    #[test]
    fn batches_archive_and_reload() {
        let (_dir, db) = open_temp();
        let mut batch = Batch::new(7, 0, &EngineConfig::default());
        batch.phase = Phase::Voided;
        db.archive_batch(&batch).unwrap();

        let loaded = db.get_batch(7).unwrap().unwrap();
        assert_eq!(loaded.id, 7);
        assert_eq!(loaded.phase, Phase::Voided);
        assert!(db.get_batch(8).unwrap().is_none());
        assert_eq!(db.batch_count(), 1);
    }

    #[test]
    fn archived_batch_keeps_claimed_flags() {
        use fairbatch_core::types::{ParticipantId, Side};
        use fairbatch_engine::Order;

        let (_dir, db) = open_temp();
        let mut batch = Batch::new(3, 0, &EngineConfig::default());
        batch.phase = Phase::Settled;
        let p = ParticipantId::from_bytes([9u8; 32]);
        let mut order = Order::new(Side::Buy, 50);
        order.claimed = true;
        batch.orders.insert(p, order);
        db.archive_batch(&batch).unwrap();

        let loaded = db.get_batch(3).unwrap().unwrap();
        assert!(loaded.orders.get(&p).unwrap().claimed);
    }

    #[test]
    fn next_batch_id_round_trips() {
        let (_dir, db) = open_temp();
        db.put_next_batch_id(42).unwrap();
        assert_eq!(db.next_batch_id().unwrap(), 42);
    }

    #[test]
    fn registry_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let db = StoreDb::open(dir.path()).unwrap();
            let mut reg = OracleRegistry::new();
            reg.register("feed://persistent", 321).unwrap();
            db.save_registry(&reg).unwrap();
        }
        let db = StoreDb::open(dir.path()).unwrap();
        let loaded = db.load_registry().unwrap().unwrap();
        assert_eq!(loaded.iter().next().unwrap().1.weight, 321);
    }
}
