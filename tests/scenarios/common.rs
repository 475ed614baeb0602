//! Shared helpers for the saga scenario tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use saga_coordinator::client::{submit, SagaSpec, VertexSpec};
use saga_coordinator::coordinator::{self, CoordinatorHandle};
use saga_coordinator::error::CoordinatorError;
use saga_coordinator::executor::ExecutorConfig;
use saga_coordinator::external::local::LocalCaller;
use saga_coordinator::external::{ExternalCaller, ExternalError};
use saga_coordinator::logstore::mock::MockLogStore;
use saga_coordinator::logstore::LogStore;

/// Build a `LOCAL` vertex whose id suffix encodes the forward outcome, per
/// `spec.md` §8's convention: suffix `1` succeeds, suffix `0` fails.
pub fn local_vertex(id: &str) -> VertexSpec {
    let success = if id.ends_with('1') { "1" } else { "0" };
    let mut spec = VertexSpec::new("http://svc/t", "LOCAL", "http://svc/c", "LOCAL");
    spec.t_body.insert("success".to_string(), success.to_string());
    spec.c_body.insert("success".to_string(), "1".to_string());
    spec
}

pub fn fast_retry_config() -> Arc<ExecutorConfig> {
    Arc::new(ExecutorConfig {
        retry: saga_coordinator::utils::retry::RetryConfig {
            base_delay: std::time::Duration::from_millis(1),
            max_delay: std::time::Duration::from_millis(5),
            max_retries: 10,
            jitter: 0.0,
        },
        call_timeout: std::time::Duration::from_millis(200),
    })
}

pub struct Harness {
    pub log_store: Arc<MockLogStore>,
    pub handle: CoordinatorHandle,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_caller(Arc::new(LocalCaller))
    }

    pub fn with_caller(caller: Arc<dyn ExternalCaller>) -> Self {
        let log_store = Arc::new(MockLogStore::new());
        let (handle, _join) = coordinator::spawn(log_store.clone(), caller, fast_retry_config());
        Self { log_store, handle }
    }

    pub async fn submit(&self, spec: SagaSpec) -> Result<(), CoordinatorError> {
        submit(spec, self.log_store.as_ref(), &self.handle)
            .await
            .map_err(|err| match err {
                saga_coordinator::client::ClientError::Coordinator(e) => e,
                other => panic!("unexpected client error: {other}"),
            })
    }

    /// Build and submit `spec`, returning the assigned saga id alongside the
    /// outcome so tests can inspect the durable log's final vertex statuses.
    pub async fn submit_with_id(&self, spec: SagaSpec) -> (u64, Result<(), CoordinatorError>) {
        let saga = saga_coordinator::client::build_saga(spec, self.log_store.as_ref())
            .await
            .expect("build_saga");
        let saga_id = saga.id;
        let outcome = self.handle.submit(saga).await;
        (saga_id, outcome)
    }
}

/// Reconstruct the last-known status of every vertex of `saga_id` by
/// scanning the durable log — the same last-record-wins rule `recovery`
/// applies, used here only to assert terminal vertex state.
pub async fn final_vertex_statuses(
    log_store: &dyn LogStore,
    saga_id: u64,
) -> HashMap<String, saga_coordinator::model::Status> {
    use saga_coordinator::logstore::{GraphPayload, LogType, VertexPayload};
    use saga_coordinator::model::Saga;

    let mut statuses = HashMap::new();
    let last_index = log_store.last_index().await.expect("last_index");
    for lsn in 1..=last_index {
        let record = match log_store.get(lsn).await {
            Ok(record) => record,
            Err(_) => continue,
        };
        if record.saga_id != saga_id {
            continue;
        }
        match record.log_type {
            // The graph record carries every vertex's initial (NotReached)
            // status; vertex records overlay it, last-write-wins, exactly
            // as `recovery::recover` reconstructs saga state.
            LogType::Graph => {
                let saga: GraphPayload = Saga::decode(&record.data).expect("decode graph payload");
                for (id, vertex) in saga.vertices {
                    statuses.insert(id, vertex.status);
                }
            }
            LogType::Vertex => {
                let payload: VertexPayload =
                    rmp_serde::from_slice(&record.data).expect("decode vertex payload");
                statuses.insert(payload.vertex_id, payload.vertex.status);
            }
            LogType::Init => {}
        }
    }
    statuses
}

/// An `ExternalCaller` that fails its first `flaky_attempts` calls, then
/// succeeds forever after — used to exercise the executor's retry loop
/// (`spec.md` §8 scenario S7).
pub struct FlakyThenSuccess {
    remaining_failures: AtomicU32,
}

impl FlakyThenSuccess {
    pub fn new(flaky_attempts: u32) -> Self {
        Self {
            remaining_failures: AtomicU32::new(flaky_attempts),
        }
    }
}

#[async_trait]
impl ExternalCaller for FlakyThenSuccess {
    async fn call(
        &self,
        _url: &str,
        _method: &str,
        _request_id: &str,
        _body: &HashMap<String, String>,
    ) -> Result<HashMap<String, String>, ExternalError> {
        let remaining = self.remaining_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.remaining_failures.fetch_sub(1, Ordering::SeqCst);
            return Err(ExternalError::Remote("temporary outage".to_string()));
        }
        let mut response = HashMap::new();
        response.insert("success".to_string(), "1".to_string());
        Ok(response)
    }
}
