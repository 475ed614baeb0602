//! Replays the durable log into a map of sagas and re-submits each one to a
//! running coordinator, so an interrupted saga resumes to the same terminal
//! outcome it would have reached without the crash. See `spec.md` §4.5.

use std::collections::HashMap;

use tracing::{error, info, warn};

use crate::coordinator::CoordinatorHandle;
use crate::logstore::{GraphPayload, LogStore, LogType, VertexPayload};
use crate::model::Saga;

fn fatal(err: impl std::fmt::Display) -> ! {
    error!(%err, "recovery hit a fatal invariant violation");
    std::process::abort();
}

/// Replay lsn 1..=`last_index()` and re-submit every reconstructed saga to
/// `handle`, with no waiter (recovered sagas have no original caller).
///
/// Must run before (or exclusively alongside, with create messages queued
/// ahead of fresh submissions) the coordinator accepts new client traffic.
pub async fn recover(log_store: &dyn LogStore, handle: &CoordinatorHandle) {
    let last_index = match log_store.last_index().await {
        Ok(index) => index,
        Err(err) => fatal(err),
    };

    let mut sagas: HashMap<u64, Saga> = HashMap::new();

    for lsn in 1..=last_index {
        let record = match log_store.get(lsn).await {
            Ok(record) => record,
            Err(crate::logstore::LogStoreError::NotFound { .. }) => continue,
            Err(err) => fatal(err),
        };

        match record.log_type {
            LogType::Init => {}
            LogType::Graph => {
                let saga: GraphPayload = match Saga::decode(&record.data) {
                    Ok(saga) => saga,
                    Err(err) => fatal(err),
                };
                if sagas.contains_key(&saga.id) {
                    fatal(format!("duplicate graph record for saga {}", saga.id));
                }
                sagas.insert(saga.id, saga);
            }
            LogType::Vertex => {
                let payload: VertexPayload = match rmp_serde::from_slice(&record.data) {
                    Ok(payload) => payload,
                    Err(err) => fatal(err),
                };
                let Some(saga) = sagas.get_mut(&record.saga_id) else {
                    fatal(format!(
                        "vertex log record for unknown saga {}",
                        record.saga_id
                    ));
                };
                if !saga.vertices.contains_key(&payload.vertex_id) {
                    fatal(format!(
                        "vertex log record for unknown vertex {} in saga {}",
                        payload.vertex_id, record.saga_id
                    ));
                }
                saga.vertices.insert(payload.vertex_id, payload.vertex);
            }
        }
    }

    if sagas.is_empty() {
        info!("recovery found no in-flight sagas to resume");
        return;
    }

    for (saga_id, saga) in sagas {
        info!(saga_id, "resubmitting recovered saga");
        if let Err(err) = handle.submit_recovered(saga).await {
            warn!(saga_id, %err, "failed to resubmit recovered saga, coordinator may be shutting down");
        }
    }
}
