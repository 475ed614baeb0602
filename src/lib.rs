//! Distributed saga coordinator: drives a DAG of transactional steps to
//! completion, rolling back via compensators on failure, with every state
//! transition appended to a durable log so an interrupted saga resumes to
//! the same terminal outcome after a crash.
//!
//! Module map mirrors `SPEC_FULL.md` §1's crate framing:
//! - [`model`] — vertex/edge/saga types, status lifecycle, encode/decode.
//! - [`graph`] — `saga_bfs` traversal and invariant checks over a saga.
//! - [`logstore`] — the durable append-only `LogStore` trait, plus `sled`
//!   and in-memory implementations.
//! - [`external`] — the `ExternalCaller` trait, plus HTTP and `LOCAL`
//!   implementations.
//! - [`executor`] — per-vertex forward/compensating workers.
//! - [`coordinator`] — the single-threaded event loop.
//! - [`recovery`] — replays the log into sagas and resumes them.
//! - [`config`] — coordinator configuration (log path, call timeout, retry,
//!   recovery toggle).
//! - [`client`] — thin saga-submission glue.
//! - [`error`] — the crate-wide error taxonomy.

pub mod client;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod executor;
pub mod external;
pub mod graph;
pub mod logstore;
pub mod model;
pub mod recovery;
pub mod utils;

use std::sync::Arc;

use tracing::info;

use crate::executor::ExecutorConfig;
use crate::external::http::HttpCaller;
use crate::external::ExternalCaller;
use crate::logstore::LogStore;

/// Stand up a coordinator from [`config::Config`]: open the durable log
/// store, spawn the event loop, and — if `auto_recover` is set — replay the
/// log and resume every in-flight saga before returning.
///
/// This is the crate's only opinionated entry point; callers who need a
/// different `LogStore` or `ExternalCaller` should call
/// [`coordinator::spawn`] directly instead.
#[cfg(feature = "sled")]
pub async fn bootstrap(
    config: &config::Config,
) -> Result<(coordinator::CoordinatorHandle, tokio::task::JoinHandle<()>), error::CoordinatorError> {
    let log_store: Arc<dyn LogStore> = Arc::new(
        logstore::sled_store::SledLogStore::open(&config.log_store.path)
            .map_err(error::CoordinatorError::LogStore)?,
    );
    let caller: Arc<dyn ExternalCaller> = Arc::new(HttpCaller::new());
    let executor_config = Arc::new(ExecutorConfig {
        retry: config.external_call.retry_config(),
        call_timeout: config.external_call.call_timeout(),
    });

    let (handle, join) = coordinator::spawn(log_store.clone(), caller, executor_config);

    if config.auto_recover {
        info!("replaying durable log to resume in-flight sagas");
        recovery::recover(log_store.as_ref(), &handle).await;
    }

    Ok((handle, join))
}
