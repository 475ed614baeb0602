//! S7 (transient external failure recovers via retry) and S8
//! (crash-recovery resumes a saga with no second submission).

use std::sync::Arc;
use std::time::Duration;

use saga_coordinator::client::{SagaSpec, VertexSpec};
use saga_coordinator::coordinator;
use saga_coordinator::executor::ExecutorConfig;
use saga_coordinator::external::local::LocalCaller;
use saga_coordinator::logstore::mock::MockLogStore;
use saga_coordinator::logstore::{LogStore, LogType, VertexPayload};
use saga_coordinator::model::{Action, Status, Vertex};
use saga_coordinator::recovery;

use super::common::{fast_retry_config, final_vertex_statuses, Harness};
use super::common::FlakyThenSuccess;

#[tokio::test]
async fn s7_transient_failure_recovers_via_retry() {
    // Two failures, then success; retry policy allows up to 10 attempts.
    let harness = Harness::with_caller(Arc::new(FlakyThenSuccess::new(2)));

    let mut spec = VertexSpec::new("http://svc/t", "LOCAL", "http://svc/c", "LOCAL");
    spec.t_body.insert("success".to_string(), "1".to_string());
    let saga_spec = SagaSpec::new().with_vertex("11", spec);

    let result = harness.submit(saga_spec).await;
    assert!(result.is_ok(), "saga should eventually commit: {result:?}");
}

#[tokio::test]
async fn s8_crash_recovery_resumes_without_a_second_submission() {
    let log_store = Arc::new(MockLogStore::new());

    // Build a saga the way `client::build_saga` would, then simulate a
    // coordinator that wrote the graph record and the pre-call ("StartT")
    // vertex record before crashing mid-RPC.
    let mut t = Action::new("http://svc/t", "LOCAL", "req-t-1");
    t.body.insert("success".to_string(), "1".to_string());
    let c = Action::new("http://svc/c", "LOCAL", "req-c-1");
    let mut vertex = Vertex::new("11", t, c);

    let mut vertices = std::collections::HashMap::new();
    vertices.insert("11".to_string(), vertex.clone());
    let mut dag = std::collections::HashMap::new();
    dag.insert("11".to_string(), std::collections::HashMap::new());
    let saga = saga_coordinator::model::Saga::new(1, vertices, dag);

    log_store
        .append(1, LogType::Graph, saga.encode().expect("encode graph"))
        .await
        .expect("append graph");

    vertex.status = Status::StartT;
    let payload = VertexPayload {
        vertex_id: "11".to_string(),
        vertex,
    };
    log_store
        .append(1, LogType::Vertex, rmp_serde::to_vec(&payload).expect("encode vertex"))
        .await
        .expect("append vertex");

    // "Restart": a fresh coordinator over the same log, now with a caller
    // that responds (the external service is back up).
    let caller = Arc::new(LocalCaller);
    let config: Arc<ExecutorConfig> = fast_retry_config();
    let (handle, _join) = coordinator::spawn(log_store.clone(), caller, config);

    recovery::recover(log_store.as_ref(), &handle).await;

    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    loop {
        let statuses = final_vertex_statuses(log_store.as_ref(), 1).await;
        if statuses.get("11") == Some(&Status::EndT) {
            break;
        }
        assert!(tokio::time::Instant::now() < deadline, "saga never reached EndT after recovery");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
