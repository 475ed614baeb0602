//! S3-S6: multi-vertex sagas where one vertex aborts and every vertex that
//! ran is driven to its correct terminal status.

use saga_coordinator::client::SagaSpec;
use saga_coordinator::error::CoordinatorError;
use saga_coordinator::model::Status;

use super::common::{final_vertex_statuses, local_vertex, Harness};

#[tokio::test]
async fn s3_parallel_one_of_two_fails() {
    let harness = Harness::new();
    let spec = SagaSpec::new()
        .with_vertex("10", local_vertex("10"))
        .with_vertex("21", local_vertex("21"));

    let (saga_id, outcome) = harness.submit_with_id(spec).await;
    assert!(matches!(outcome, Err(CoordinatorError::SagaAborted { .. })));

    let statuses = final_vertex_statuses(harness.log_store.as_ref(), saga_id).await;
    assert_eq!(statuses["10"], Status::Abort);
    assert_eq!(statuses["21"], Status::EndC);
}

#[tokio::test]
async fn s4_sequential_first_aborts() {
    let harness = Harness::new();
    let spec = SagaSpec::new()
        .with_vertex("10", local_vertex("10"))
        .with_vertex("21", local_vertex("21"))
        .with_edge("10", "21", vec![]);

    let (saga_id, outcome) = harness.submit_with_id(spec).await;
    assert!(matches!(outcome, Err(CoordinatorError::SagaAborted { .. })));

    let statuses = final_vertex_statuses(harness.log_store.as_ref(), saga_id).await;
    assert_eq!(statuses["10"], Status::Abort);
    assert_eq!(statuses["21"], Status::NotReached);
}

#[tokio::test]
async fn s5_sequential_second_aborts() {
    let harness = Harness::new();
    let spec = SagaSpec::new()
        .with_vertex("11", local_vertex("11"))
        .with_vertex("20", local_vertex("20"))
        .with_edge("11", "20", vec![]);

    let (saga_id, outcome) = harness.submit_with_id(spec).await;
    assert!(matches!(outcome, Err(CoordinatorError::SagaAborted { .. })));

    let statuses = final_vertex_statuses(harness.log_store.as_ref(), saga_id).await;
    assert_eq!(statuses["11"], Status::EndC);
    assert_eq!(statuses["20"], Status::Abort);
}

#[tokio::test]
async fn s6_fan_out_one_child_aborts() {
    let harness = Harness::new();
    let spec = SagaSpec::new()
        .with_vertex("11", local_vertex("11"))
        .with_vertex("20", local_vertex("20"))
        .with_vertex("31", local_vertex("31"))
        .with_edge("11", "20", vec![])
        .with_edge("11", "31", vec![]);

    let (saga_id, outcome) = harness.submit_with_id(spec).await;
    assert!(matches!(outcome, Err(CoordinatorError::SagaAborted { .. })));

    let statuses = final_vertex_statuses(harness.log_store.as_ref(), saga_id).await;
    assert_eq!(statuses["11"], Status::EndC);
    assert_eq!(statuses["20"], Status::Abort);
    assert_eq!(statuses["31"], Status::EndC);
}
