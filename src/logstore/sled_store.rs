//! Durable `sled`-backed [`LogStore`].
//!
//! Grounded in the original coordinator's Badger-backed store
//! (`examples/original_source/badger.go`, `logs.go`): one embedded KV engine, a
//! monotonic counter for saga ids, and log records keyed by a big-endian
//! lsn so that a prefix scan in reverse yields the highest index.
//! `sled::Db::generate_id` already gives us a process-wide monotonic
//! counter, so there is no need to hand-roll Badger's `Sequence` type.
//!
//! The first id that counter ever hands out is reserved for an `Init`
//! sentinel record, written once on first open, the same way
//! `logs.go` seeds its log before any saga touches it.

use async_trait::async_trait;
use uuid::Uuid;

use super::{InitPayload, LogRecord, LogStore, LogStoreError, LogType};

const LOG_KEY_PREFIX: &str = "log:";

fn log_key(index: u64) -> Vec<u8> {
    let mut key = LOG_KEY_PREFIX.as_bytes().to_vec();
    key.extend_from_slice(&index.to_be_bytes());
    key
}

/// A durable, crash-safe log store backed by an embedded `sled` database.
pub struct SledLogStore {
    db: sled::Db,
    logs: sled::Tree,
}

impl SledLogStore {
    /// Open (or create) a store at `path`.
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self, LogStoreError> {
        let db = sled::open(path).map_err(|e| LogStoreError::Backend(e.to_string()))?;
        let logs = db
            .open_tree("logs")
            .map_err(|e| LogStoreError::Backend(e.to_string()))?;
        let store = Self { db, logs };
        store.ensure_init_record()?;
        Ok(store)
    }

    /// Open a transient in-memory store. Useful for tests that want the
    /// real `sled` code path without touching disk.
    pub fn open_in_memory() -> Result<Self, LogStoreError> {
        let db = sled::Config::new()
            .temporary(true)
            .open()
            .map_err(|e| LogStoreError::Backend(e.to_string()))?;
        let logs = db
            .open_tree("logs")
            .map_err(|e| LogStoreError::Backend(e.to_string()))?;
        let store = Self { db, logs };
        store.ensure_init_record()?;
        Ok(store)
    }

    /// Write the `Init` sentinel at lsn 0 the first time this store is
    /// opened. A no-op when reopening a store that already has one, so the
    /// layout never depends on which caller happens to touch the store first.
    fn ensure_init_record(&self) -> Result<(), LogStoreError> {
        if self
            .logs
            .contains_key(log_key(0))
            .map_err(|e| LogStoreError::Backend(e.to_string()))?
        {
            return Ok(());
        }
        let index = self.db.generate_id().map_err(|e| LogStoreError::Backend(e.to_string()))?;
        let data = rmp_serde::to_vec(&InitPayload { saga_id: 0 }).map_err(LogStoreError::from)?;
        let record = LogRecord {
            lsn: index,
            saga_id: 0,
            log_type: LogType::Init,
            data,
        };
        let encoded = record.encode()?;
        self.logs
            .insert(log_key(index), encoded)
            .map_err(|e| LogStoreError::Backend(e.to_string()))?;
        self.logs.flush().map_err(|e| LogStoreError::Backend(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl LogStore for SledLogStore {
    async fn new_saga_id(&self) -> Result<u64, LogStoreError> {
        self.db.generate_id().map_err(|e| LogStoreError::Backend(e.to_string()))
    }

    async fn new_request_id(&self) -> Result<String, LogStoreError> {
        Ok(Uuid::new_v4().to_string())
    }

    async fn last_index(&self) -> Result<u64, LogStoreError> {
        let prefix = LOG_KEY_PREFIX.as_bytes();
        match self
            .logs
            .scan_prefix(prefix)
            .last()
            .transpose()
            .map_err(|e| LogStoreError::Backend(e.to_string()))?
        {
            None => Ok(0),
            Some((key, _)) => {
                let idx_bytes = &key[key.len() - 8..];
                let mut buf = [0u8; 8];
                buf.copy_from_slice(idx_bytes);
                Ok(u64::from_be_bytes(buf))
            }
        }
    }

    async fn append(&self, saga_id: u64, log_type: LogType, data: Vec<u8>) -> Result<u64, LogStoreError> {
        let index = self.db.generate_id().map_err(|e| LogStoreError::Backend(e.to_string()))?;
        let record = LogRecord {
            lsn: index,
            saga_id,
            log_type,
            data,
        };
        let encoded = record.encode()?;
        self.logs
            .insert(log_key(index), encoded)
            .map_err(|e| LogStoreError::Backend(e.to_string()))?;
        self.logs.flush_async().await.map_err(|e| LogStoreError::Backend(e.to_string()))?;
        Ok(index)
    }

    async fn get(&self, index: u64) -> Result<LogRecord, LogStoreError> {
        let value = self
            .logs
            .get(log_key(index))
            .map_err(|e| LogStoreError::Backend(e.to_string()))?
            .ok_or(LogStoreError::NotFound { index })?;
        LogRecord::decode(&value).map_err(LogStoreError::from)
    }

    async fn close(&self) -> Result<(), LogStoreError> {
        self.db.flush_async().await.map_err(|e| LogStoreError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn remove_all(&self) -> Result<(), LogStoreError> {
        self.logs.clear().map_err(|e| LogStoreError::Backend(e.to_string()))?;
        self.logs.flush_async().await.map_err(|e| LogStoreError::Backend(e.to_string()))?;
        Ok(())
    }
}
