//! The coordinator event loop: the single-threaded consumer that owns the
//! in-memory saga map and decides what to dispatch next.
//!
//! See `spec.md` §4.4 for the exact on-create / on-update algorithms this
//! module implements. Workers (`executor::process_t`/`process_c`) never
//! touch `sagas` or `waiters` directly — they only send an [`Update`]
//! back over `update_tx`, which is the only way shared saga state changes.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::{error, info, warn};

use crate::error::CoordinatorError;
use crate::executor::{self, ExecutorConfig, Update};
use crate::external::ExternalCaller;
use crate::graph;
use crate::logstore::{GraphPayload, LogStore, LogType};
use crate::model::{Saga, Status, VertexId};

/// A saga submission, with an optional reply slot. `reply` is `None` for
/// sagas re-submitted by `recovery::recover` — there is no original caller
/// left to notify.
pub struct CreateMsg {
    pub saga: Saga,
    pub reply: Option<oneshot::Sender<Result<(), CoordinatorError>>>,
    /// True when this saga is being replayed from the log rather than
    /// freshly submitted — the graph record is already durable, so the
    /// coordinator must not append a second one.
    pub recovered: bool,
}

/// Public, clonable front door to a running coordinator loop.
#[derive(Clone)]
pub struct CoordinatorHandle {
    create_tx: mpsc::Sender<CreateMsg>,
    log_store: Arc<dyn LogStore>,
}

impl CoordinatorHandle {
    /// Submit a freshly built saga and wait for it to reach a terminal state.
    pub async fn submit(&self, saga: Saga) -> Result<(), CoordinatorError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.create_tx
            .send(CreateMsg {
                saga,
                reply: Some(reply_tx),
                recovered: false,
            })
            .await
            .map_err(|_| CoordinatorError::CoordinatorStopped)?;
        reply_rx.await.map_err(|_| CoordinatorError::CoordinatorStopped)?
    }

    /// Re-submit a saga reconstructed by `recovery::recover`. Returns once
    /// the coordinator has accepted the saga; does not wait for it to finish
    /// (per `spec.md` §9: recovered sagas have no waiter).
    pub async fn submit_recovered(&self, saga: Saga) -> Result<(), CoordinatorError> {
        self.create_tx
            .send(CreateMsg {
                saga,
                reply: None,
                recovered: true,
            })
            .await
            .map_err(|_| CoordinatorError::CoordinatorStopped)
    }

    pub fn log_store(&self) -> &Arc<dyn LogStore> {
        &self.log_store
    }
}

struct State {
    sagas: HashMap<u64, Saga>,
    waiters: HashMap<u64, oneshot::Sender<Result<(), CoordinatorError>>>,
    /// Vertices with a worker currently running, keyed by saga id. Consulted
    /// by `dispatch_wavefront` so a vertex that's mid-call is never dispatched
    /// twice, and cleared for a vertex as soon as its `Update` arrives.
    in_flight: HashMap<u64, HashSet<VertexId>>,
    log_store: Arc<dyn LogStore>,
    caller: Arc<dyn ExternalCaller>,
    config: Arc<ExecutorConfig>,
    update_tx: mpsc::Sender<Update>,
}

/// Spawn the coordinator loop onto its own task and return a handle plus the
/// [`tokio::task::JoinHandle`] (useful for tests that want to await shutdown).
pub fn spawn(
    log_store: Arc<dyn LogStore>,
    caller: Arc<dyn ExternalCaller>,
    config: Arc<ExecutorConfig>,
) -> (CoordinatorHandle, tokio::task::JoinHandle<()>) {
    let (create_tx, create_rx) = mpsc::channel(64);
    let (update_tx, update_rx) = mpsc::channel(256);

    let handle = CoordinatorHandle {
        create_tx,
        log_store: log_store.clone(),
    };

    let state = State {
        sagas: HashMap::new(),
        waiters: HashMap::new(),
        in_flight: HashMap::new(),
        log_store,
        caller,
        config,
        update_tx,
    };

    let join = tokio::spawn(run(state, create_rx, update_rx));
    (handle, join)
}

async fn run(mut state: State, mut create_rx: mpsc::Receiver<CreateMsg>, mut update_rx: mpsc::Receiver<Update>) {
    loop {
        tokio::select! {
            biased;
            Some(update) = update_rx.recv() => {
                on_update(&mut state, update).await;
            }
            Some(create) = create_rx.recv() => {
                on_create(&mut state, create).await;
            }
            else => {
                info!("coordinator loop exiting: both channels closed");
                break;
            }
        }
    }
}

fn fatal(err: impl std::fmt::Display) -> ! {
    error!(%err, "coordinator hit a fatal invariant violation or log failure");
    std::process::abort();
}

fn notify_and_remove(state: &mut State, saga_id: u64, outcome: Result<(), CoordinatorError>) {
    state.sagas.remove(&saga_id);
    state.in_flight.remove(&saga_id);
    if let Some(waiter) = state.waiters.remove(&saga_id) {
        let _ = waiter.send(outcome);
    }
}

/// Dispatch every vertex in the current wavefront that doesn't already have a
/// worker running for it.
///
/// A vertex sitting in `StartT`/`StartC` with no entry in `state.in_flight`
/// means either: the coordinator just recovered it from the log (nothing is
/// actually running — see `spec.md` §4.5 / scenario S8), or a previous worker
/// ran and failed, leaving it there to be retried (§4.6, §4.3 ProcessC step
/// 7). Either way it gets re-dispatched; a vertex whose worker is still
/// mid-call is left alone.
fn dispatch_wavefront(state: &mut State, saga: &mut Saga) {
    let aborted = saga.aborted();
    let wavefront = graph::saga_bfs(saga);
    let saga_id = saga.id;

    for vertex_id in wavefront {
        let already_running = state
            .in_flight
            .get(&saga_id)
            .is_some_and(|running| running.contains(&vertex_id));
        if already_running {
            continue;
        }

        let Some(vertex) = saga.vertices.get_mut(&vertex_id) else {
            continue;
        };

        if !aborted && matches!(vertex.status, Status::NotReached | Status::StartT) {
            vertex.status = Status::StartT;
            spawn_worker(state, saga_id, vertex.clone(), Mode::Forward);
        } else if aborted && matches!(vertex.status, Status::EndT | Status::StartC) {
            vertex.status = Status::StartC;
            spawn_worker(state, saga_id, vertex.clone(), Mode::Compensate);
        }
    }
}

enum Mode {
    Forward,
    Compensate,
}

fn spawn_worker(state: &mut State, saga_id: u64, vertex: crate::model::Vertex, mode: Mode) {
    let log_store = state.log_store.clone();
    let caller = state.caller.clone();
    let config = state.config.clone();
    let update_tx = state.update_tx.clone();

    state.in_flight.entry(saga_id).or_default().insert(vertex.id.clone());

    tokio::spawn(async move {
        match mode {
            Mode::Forward => executor::process_t(saga_id, vertex, log_store, caller, config, update_tx).await,
            Mode::Compensate => executor::process_c(saga_id, vertex, log_store, caller, config, update_tx).await,
        }
    });
}

async fn on_create(state: &mut State, msg: CreateMsg) {
    let CreateMsg {
        mut saga,
        reply,
        recovered,
    } = msg;
    let saga_id = saga.id;

    if state.sagas.contains_key(&saga_id) || state.waiters.contains_key(&saga_id) {
        fatal(format!("saga {saga_id} already exists"));
    }

    if let Err(err) = graph::check_valid_saga(&saga) {
        fatal(err);
    }

    if !recovered {
        let payload: GraphPayload = saga.clone();
        let data = match payload.encode() {
            Ok(data) => data,
            Err(err) => fatal(err),
        };
        if let Err(err) = state.log_store.append(saga_id, LogType::Graph, data).await {
            fatal(err);
        }
    }

    if let Some(reply) = reply {
        state.waiters.insert(saga_id, reply);
    }

    let (finished, aborted) = graph::check_finished_or_abort(&saga);
    if finished {
        let outcome = terminal_outcome(saga_id, aborted);
        notify_and_remove(state, saga_id, outcome);
        return;
    }

    dispatch_wavefront(state, &mut saga);
    state.sagas.insert(saga_id, saga);
}

fn terminal_outcome(saga_id: u64, aborted: bool) -> Result<(), CoordinatorError> {
    if aborted {
        Err(CoordinatorError::SagaAborted { saga_id })
    } else {
        Ok(())
    }
}

async fn on_update(state: &mut State, update: Update) {
    let Update { saga_id, vertex } = update;

    if let Some(running) = state.in_flight.get_mut(&saga_id) {
        running.remove(&vertex.id);
    }

    // Take the saga out of the map while mutating it, rather than holding a
    // `&mut` borrow into `state.sagas` alongside `state` itself — this owned
    // saga is reinserted (or left out, if the saga just finished) below.
    let Some(mut saga) = state.sagas.remove(&saga_id) else {
        fatal(format!("update for unknown saga {saga_id}"));
    };

    let was_aborted = saga.aborted();
    let vertex_id = vertex.id.clone();
    let reached_endt = vertex.status == Status::EndT;
    saga.vertices.insert(vertex_id.clone(), vertex);

    if let Err(err) = graph::check_valid_saga(&saga) {
        fatal(err);
    }

    let (finished, aborted) = graph::check_finished_or_abort(&saga);
    if finished {
        let outcome = terminal_outcome(saga_id, aborted);
        notify_and_remove(state, saga_id, outcome);
        return;
    }

    let just_transitioned = aborted && !was_aborted;
    if !aborted && reached_endt {
        propagate_to_children(&mut saga, &vertex_id);
    }
    if just_transitioned {
        warn!(saga_id, vertex_id = %vertex_id, "saga entered abort mode, dispatching compensators");
    }

    dispatch_wavefront(state, &mut saga);
    state.sagas.insert(saga_id, saga);
}

/// Copy transfer fields from a just-completed parent's `T.response` into each
/// child's `T.body`, per the edge's `Fields` list.
fn propagate_to_children(saga: &mut Saga, parent_id: &str) {
    let Some(children) = saga.dag.get(parent_id).cloned() else {
        return;
    };
    let Some(parent_response) = saga.vertices.get(parent_id).map(|v| v.t.response.clone()) else {
        return;
    };

    for (child_id, edge) in children {
        if edge.fields.is_empty() {
            continue;
        }
        if let Some(child) = saga.vertices.get_mut(&child_id) {
            for field in &edge.fields {
                if let Some(value) = parent_response.get(field) {
                    child.t.body.insert(field.clone(), value.clone());
                }
            }
        }
    }
}
