//! In-memory [`LogStore`] for unit and integration tests.
//!
//! Mirrors the teacher's `storage::mock` event store: a `Mutex`-guarded
//! in-memory map standing in for the durable backend, with the same
//! trait surface so tests exercise real coordinator/executor/recovery
//! code against a fast, disk-free fake.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use super::{LogRecord, LogStore, LogStoreError, LogType};

#[derive(Default)]
pub struct MockLogStore {
    records: Mutex<BTreeMap<u64, LogRecord>>,
    next_lsn: AtomicU64,
    next_saga_id: AtomicU64,
}

impl MockLogStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LogStore for MockLogStore {
    async fn new_saga_id(&self) -> Result<u64, LogStoreError> {
        Ok(self.next_saga_id.fetch_add(1, Ordering::SeqCst) + 1)
    }

    async fn new_request_id(&self) -> Result<String, LogStoreError> {
        Ok(Uuid::new_v4().to_string())
    }

    async fn last_index(&self) -> Result<u64, LogStoreError> {
        let records = self.records.lock().expect("mock log store poisoned");
        Ok(records.keys().next_back().copied().unwrap_or(0))
    }

    async fn append(&self, saga_id: u64, log_type: LogType, data: Vec<u8>) -> Result<u64, LogStoreError> {
        let index = self.next_lsn.fetch_add(1, Ordering::SeqCst) + 1;
        let record = LogRecord {
            lsn: index,
            saga_id,
            log_type,
            data,
        };
        self.records.lock().expect("mock log store poisoned").insert(index, record);
        Ok(index)
    }

    async fn get(&self, index: u64) -> Result<LogRecord, LogStoreError> {
        self.records
            .lock()
            .expect("mock log store poisoned")
            .get(&index)
            .cloned()
            .ok_or(LogStoreError::NotFound { index })
    }

    async fn close(&self) -> Result<(), LogStoreError> {
        Ok(())
    }

    async fn remove_all(&self) -> Result<(), LogStoreError> {
        self.records.lock().expect("mock log store poisoned").clear();
        self.next_lsn.store(0, Ordering::SeqCst);
        self.next_saga_id.store(0, Ordering::SeqCst);
        Ok(())
    }
}
