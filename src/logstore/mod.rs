//! Durable append-only log of saga state, behind the [`LogStore`] trait.
//!
//! Every coordinator decision (a saga being created, its graph, and each
//! vertex status transition) is appended here before the coordinator's
//! in-memory state is allowed to change, so `recovery::recover` can replay
//! the log from lsn 1 and reconstruct exactly the same state after a crash.

pub mod mock;
#[cfg(feature = "sled")]
pub mod sled_store;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{Saga, VertexId};

/// The three kinds of fact the log records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogType {
    /// A saga was created (assigned its id).
    Init,
    /// The saga's DAG, recorded once at creation.
    Graph,
    /// A single vertex's status transition.
    Vertex,
}

/// One entry in the append-only log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    pub lsn: u64,
    pub saga_id: u64,
    pub log_type: LogType,
    pub data: Vec<u8>,
}

impl LogRecord {
    pub fn encode(&self) -> Result<Vec<u8>, rmp_serde::encode::Error> {
        rmp_serde::to_vec(self)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, rmp_serde::decode::Error> {
        rmp_serde::from_slice(bytes)
    }
}

/// Payload of a [`LogType::Init`] record: the saga id alone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitPayload {
    pub saga_id: u64,
}

/// Payload of a [`LogType::Graph`] record: the saga's full vertex set and DAG,
/// as it existed at creation time.
pub type GraphPayload = Saga;

/// Payload of a [`LogType::Vertex`] record: one vertex's latest snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VertexPayload {
    pub vertex_id: VertexId,
    pub vertex: crate::model::Vertex,
}

#[derive(Debug, Error)]
pub enum LogStoreError {
    #[error("log index {index} not found in log store")]
    NotFound { index: u64 },

    #[error("log store backend error: {0}")]
    Backend(String),

    #[error("failed to encode log record: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    #[error("failed to decode log record: {0}")]
    Decode(#[from] rmp_serde::decode::Error),
}

/// Durable append-only store of saga log records, plus the two monotonic id
/// counters the coordinator needs (saga ids and request ids).
///
/// Implementations must be `Send + Sync` and safe to call concurrently from
/// many executor tasks — see `SledLogStore` (production) and `MockLogStore`
/// (tests).
#[async_trait]
pub trait LogStore: Send + Sync {
    /// Allocate a fresh, monotonically increasing saga id.
    async fn new_saga_id(&self) -> Result<u64, LogStoreError>;

    /// Allocate a fresh request id, stable for the lifetime of the action it
    /// is assigned to (invariant I7).
    async fn new_request_id(&self) -> Result<String, LogStoreError>;

    /// The lsn of the most recently appended record, or 0 if the log is empty.
    async fn last_index(&self) -> Result<u64, LogStoreError>;

    /// Append one record, returning the lsn it was written at.
    async fn append(&self, saga_id: u64, log_type: LogType, data: Vec<u8>) -> Result<u64, LogStoreError>;

    /// Fetch the record at `index`, or [`LogStoreError::NotFound`].
    async fn get(&self, index: u64) -> Result<LogRecord, LogStoreError>;

    /// Release all resources held by this store (counters, file handles).
    async fn close(&self) -> Result<(), LogStoreError>;

    /// Erase every record and reset counters. Test-only; production code
    /// never calls this.
    async fn remove_all(&self) -> Result<(), LogStoreError>;
}
