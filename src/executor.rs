//! Per-vertex workers: `process_t` (forward) and `process_c` (compensating).
//!
//! Each is spawned by the coordinator loop onto its own `tokio` task with an
//! owned `Vertex` snapshot — workers never touch the coordinator's saga map
//! directly, they only call the `LogStore`/`ExternalCaller` and post a
//! single [`Update`] back. See `spec.md` §4.3 for the exact eight-step
//! protocol each function follows.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use crate::external::{ExternalCaller, ExternalError};
use crate::logstore::{LogStore, LogType, VertexPayload};
use crate::model::{Status, Vertex};
use crate::utils::retry::RetryConfig;

/// A completed worker's result, posted back to the coordinator loop.
#[derive(Debug, Clone)]
pub struct Update {
    pub saga_id: u64,
    pub vertex: Vertex,
}

/// Tuning shared by every worker the executor spawns.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    pub retry: RetryConfig,
    pub call_timeout: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            retry: RetryConfig::for_external_calls(),
            call_timeout: Duration::from_secs(2),
        }
    }
}

async fn call_with_retry(
    caller: &dyn ExternalCaller,
    url: &str,
    method: &str,
    request_id: &str,
    body: &std::collections::HashMap<String, String>,
    config: &ExecutorConfig,
) -> Result<std::collections::HashMap<String, String>, ExternalError> {
    let mut attempt = 0;
    loop {
        let outcome = tokio::time::timeout(config.call_timeout, caller.call(url, method, request_id, body)).await;
        match outcome {
            Ok(Ok(response)) => return Ok(response),
            Ok(Err(err)) if config.retry.should_retry(attempt) => {
                warn!(attempt, %err, "external call failed, retrying");
                tokio::time::sleep(config.retry.delay_for_attempt(attempt)).await;
                attempt += 1;
            }
            Ok(Err(err)) => return Err(err),
            Err(_elapsed) if config.retry.should_retry(attempt) => {
                warn!(attempt, "external call timed out, retrying");
                tokio::time::sleep(config.retry.delay_for_attempt(attempt)).await;
                attempt += 1;
            }
            Err(_elapsed) => return Err(ExternalError::Timeout),
        }
    }
}

async fn persist_vertex(log_store: &dyn LogStore, saga_id: u64, vertex: &Vertex) {
    let payload = VertexPayload {
        vertex_id: vertex.id.clone(),
        vertex: vertex.clone(),
    };
    let data = match rmp_serde::to_vec(&payload) {
        Ok(data) => data,
        Err(err) => {
            error!(%err, vertex_id = %vertex.id, "failed to encode vertex log record");
            std::process::abort();
        }
    };
    if let Err(err) = log_store.append(saga_id, LogType::Vertex, data).await {
        error!(%err, vertex_id = %vertex.id, "failed to append vertex log record, log store durability guarantee violated");
        std::process::abort();
    }
}

/// Drive a vertex's forward transaction. See `spec.md` §4.3 `ProcessT`.
pub async fn process_t(
    saga_id: u64,
    mut vertex: Vertex,
    log_store: Arc<dyn LogStore>,
    caller: Arc<dyn ExternalCaller>,
    config: Arc<ExecutorConfig>,
    update_tx: mpsc::Sender<Update>,
) {
    if vertex.status == Status::EndT {
        return;
    }
    if !matches!(vertex.status, Status::NotReached | Status::StartT) {
        error!(vertex_id = %vertex.id, status = ?vertex.status, "process_t called on vertex in an illegal state");
        std::process::abort();
    }

    vertex.status = Status::StartT;
    persist_vertex(log_store.as_ref(), saga_id, &vertex).await;

    let result = call_with_retry(
        caller.as_ref(),
        &vertex.t.url,
        &vertex.t.method,
        &vertex.t.request_id,
        &vertex.t.body,
        &config,
    )
    .await;

    match result {
        Ok(response) => {
            vertex.t.response.extend(response);
            vertex.propagate_transfer_fields();
            vertex.status = Status::EndT;
            debug!(vertex_id = %vertex.id, "forward transaction completed");
        }
        Err(err) => {
            vertex.t.response.insert("error".to_string(), err.to_string());
            vertex.status = Status::Abort;
            warn!(vertex_id = %vertex.id, %err, "forward transaction aborted");
        }
    }

    persist_vertex(log_store.as_ref(), saga_id, &vertex).await;

    if update_tx.send(Update { saga_id, vertex }).await.is_err() {
        warn!(saga_id, "coordinator update channel closed, dropping worker result");
    }
}

/// Drive a vertex's compensating transaction. See `spec.md` §4.3 `ProcessC`.
pub async fn process_c(
    saga_id: u64,
    mut vertex: Vertex,
    log_store: Arc<dyn LogStore>,
    caller: Arc<dyn ExternalCaller>,
    config: Arc<ExecutorConfig>,
    update_tx: mpsc::Sender<Update>,
) {
    if vertex.status == Status::EndC {
        return;
    }
    if !matches!(vertex.status, Status::StartT | Status::EndT | Status::StartC) {
        error!(vertex_id = %vertex.id, status = ?vertex.status, "process_c called on vertex in an illegal state");
        std::process::abort();
    }

    if vertex.status == Status::StartT {
        // Forward half-done, outcome unknown: re-drive it to EndT/Abort first.
        // The resulting update re-enters compensation on a definite state.
        process_t(saga_id, vertex, log_store, caller, config, update_tx).await;
        return;
    }

    vertex.status = Status::StartC;
    persist_vertex(log_store.as_ref(), saga_id, &vertex).await;

    let result = call_with_retry(
        caller.as_ref(),
        &vertex.c.url,
        &vertex.c.method,
        &vertex.c.request_id,
        &vertex.c.body,
        &config,
    )
    .await;

    match result {
        Ok(response) => {
            vertex.c.response.extend(response);
            vertex.status = Status::EndC;
            debug!(vertex_id = %vertex.id, "compensation completed");
        }
        Err(err) => {
            vertex.c.response.insert("error".to_string(), err.to_string());
            vertex.status = Status::StartC;
            warn!(vertex_id = %vertex.id, %err, "compensation failed, will retry when saga is next driven");
        }
    }

    persist_vertex(log_store.as_ref(), saga_id, &vertex).await;

    if update_tx.send(Update { saga_id, vertex }).await.is_err() {
        warn!(saga_id, "coordinator update channel closed, dropping worker result");
    }
}
