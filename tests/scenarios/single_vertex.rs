//! S1 (1-vertex success) and S2 (1-vertex fail).

use saga_coordinator::client::SagaSpec;
use saga_coordinator::error::CoordinatorError;

use super::common::{local_vertex, Harness};

#[tokio::test]
async fn s1_one_vertex_success_commits() {
    let harness = Harness::new();
    let spec = SagaSpec::new().with_vertex("11", local_vertex("11"));

    let result = harness.submit(spec).await;
    assert!(result.is_ok(), "saga should commit: {result:?}");
}

#[tokio::test]
async fn s2_one_vertex_fail_aborts() {
    let harness = Harness::new();
    let spec = SagaSpec::new().with_vertex("10", local_vertex("10"));

    let result = harness.submit(spec).await;
    assert!(matches!(result, Err(CoordinatorError::SagaAborted { .. })));
}
