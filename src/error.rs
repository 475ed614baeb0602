//! Crate-wide error taxonomy.
//!
//! Mirrors the failure kinds the coordinator distinguishes: terminal
//! saga outcomes travel out through the reply channel as
//! [`CoordinatorError`], invariant violations and log failures are
//! fatal to the process, and external-call errors never escape the
//! executor (see `executor`).

use thiserror::Error;

/// Errors surfaced to a saga submitter or returned by coordinator-facing APIs.
#[derive(Debug, Error)]
pub enum CoordinatorError {
    /// The saga ran to completion and every vertex that executed was
    /// compensated. The submitter's business transaction did not commit.
    #[error("saga {saga_id} aborted during execution")]
    SagaAborted { saga_id: u64 },

    /// The coordinator replied before the saga reached a terminal state.
    /// This indicates a bug in the coordinator loop; it should never happen.
    #[error("saga {saga_id} did not finish during execution (internal bug)")]
    SagaUnfinished { saga_id: u64 },

    /// A saga-id or request-id was requested from a disconnected or closed log store.
    #[error("log store error: {0}")]
    LogStore(#[from] crate::logstore::LogStoreError),

    /// The submitted saga spec is not a well-formed DAG (see `graph::check_valid_saga`).
    #[error("invalid saga: {0}")]
    InvalidSaga(#[from] InvalidSaga),

    /// The coordinator's internal channels were closed — the coordinator task has exited.
    #[error("coordinator is no longer running")]
    CoordinatorStopped,
}

/// Reasons a saga or update is rejected as structurally invalid.
///
/// Any occurrence of these during normal operation (outside of client
/// submission validation) signals a coordinator bug or log corruption.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InvalidSaga {
    #[error("saga {saga_id} already exists")]
    DuplicateSagaId { saga_id: u64 },

    #[error("edge references vertex {vertex_id} which is not in the vertex set")]
    DanglingEdge { vertex_id: String },

    #[error("dag contains a cycle")]
    Cycle,

    #[error("vertex {vertex_id} violates forward-mode validity (I3)")]
    ForwardModeViolation { vertex_id: String },

    #[error("vertex {vertex_id} violates abort-mode validity (I4)")]
    AbortModeViolation { vertex_id: String },

    #[error("vertex {vertex_id} is not part of saga {saga_id}")]
    UnknownVertex { saga_id: u64, vertex_id: String },

    #[error("vertex {vertex_id} made an illegal status transition: {from:?} -> {to:?}")]
    IllegalTransition {
        vertex_id: String,
        from: crate::model::Status,
        to: crate::model::Status,
    },

    #[error("two DAGs are not adjacency-equivalent")]
    NotEquivalentDags,
}
