//! Client-facing API: accepts a saga spec, assigns ids, and submits it to a
//! running coordinator. Thin by design — the public request/reply transport
//! itself is out of scope (`spec.md` §1); this module only covers the glue
//! described at interface level in §6.

use std::collections::HashMap;

use thiserror::Error;

use crate::coordinator::CoordinatorHandle;
use crate::error::CoordinatorError;
use crate::logstore::{LogStore, LogStoreError};
use crate::model::{Action, Edge, Saga, Vertex, VertexId};

/// One vertex of a user-submitted saga, before ids are assigned.
#[derive(Debug, Clone)]
pub struct VertexSpec {
    pub t_url: String,
    pub t_method: String,
    pub t_body: HashMap<String, String>,
    pub c_url: String,
    pub c_method: String,
    pub c_body: HashMap<String, String>,
    pub transfer_fields: Vec<String>,
}

impl VertexSpec {
    pub fn new(t_url: impl Into<String>, t_method: impl Into<String>, c_url: impl Into<String>, c_method: impl Into<String>) -> Self {
        Self {
            t_url: t_url.into(),
            t_method: t_method.into(),
            t_body: HashMap::new(),
            c_url: c_url.into(),
            c_method: c_method.into(),
            c_body: HashMap::new(),
            transfer_fields: Vec::new(),
        }
    }
}

/// One parent→child edge of a user-submitted saga.
#[derive(Debug, Clone)]
pub struct EdgeSpec {
    pub from: VertexId,
    pub to: VertexId,
    pub fields: Vec<String>,
}

/// A user-submitted saga: a vertex map plus an edge list, per `spec.md` §6.
#[derive(Debug, Clone, Default)]
pub struct SagaSpec {
    pub vertices: HashMap<VertexId, VertexSpec>,
    pub edges: Vec<EdgeSpec>,
}

impl SagaSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_vertex(mut self, id: impl Into<VertexId>, spec: VertexSpec) -> Self {
        self.vertices.insert(id.into(), spec);
        self
    }

    pub fn with_edge(mut self, from: impl Into<VertexId>, to: impl Into<VertexId>, fields: Vec<String>) -> Self {
        self.edges.push(EdgeSpec {
            from: from.into(),
            to: to.into(),
            fields,
        });
        self
    }
}

/// Errors raised while turning a [`SagaSpec`] into a durable [`Saga`], before
/// it ever reaches the coordinator loop.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("edge references vertex {0} which is not in the vertex set")]
    UnknownVertex(VertexId),

    #[error(transparent)]
    LogStore(#[from] LogStoreError),

    #[error(transparent)]
    Coordinator(#[from] CoordinatorError),
}

/// Assign a saga id and stable per-action request ids from `log_store`, and
/// build the `NotReached`-initialized [`Saga`] the coordinator expects.
///
/// This is the only place request ids are minted (invariant I7: once
/// written to the log they never change).
pub async fn build_saga(spec: SagaSpec, log_store: &dyn LogStore) -> Result<Saga, ClientError> {
    for edge in &spec.edges {
        if !spec.vertices.contains_key(&edge.from) {
            return Err(ClientError::UnknownVertex(edge.from.clone()));
        }
        if !spec.vertices.contains_key(&edge.to) {
            return Err(ClientError::UnknownVertex(edge.to.clone()));
        }
    }

    let saga_id = log_store.new_saga_id().await?;

    let mut vertices = HashMap::with_capacity(spec.vertices.len());
    for (id, vspec) in spec.vertices {
        let t_request_id = log_store.new_request_id().await?;
        let c_request_id = log_store.new_request_id().await?;

        let mut t = Action::new(vspec.t_url, vspec.t_method, t_request_id);
        t.body = vspec.t_body;
        let mut c = Action::new(vspec.c_url, vspec.c_method, c_request_id);
        c.body = vspec.c_body;

        let mut vertex = Vertex::new(id.clone(), t, c);
        vertex.transfer_fields = vspec.transfer_fields;
        vertices.insert(id, vertex);
    }

    let mut dag: HashMap<VertexId, HashMap<VertexId, Edge>> = HashMap::new();
    for id in vertices.keys() {
        dag.entry(id.clone()).or_default();
    }
    for edge in spec.edges {
        dag.entry(edge.from).or_default().insert(edge.to, Edge { fields: edge.fields });
    }

    Ok(Saga::new(saga_id, vertices, dag))
}

/// Build a saga from `spec` and submit it to `coordinator`, waiting for it
/// to reach a terminal state.
///
/// Returns `Ok(())` on finished-forward, or
/// [`CoordinatorError::SagaAborted`] on finished-compensated — no partial
/// outputs, per `spec.md` §6.
pub async fn submit(
    spec: SagaSpec,
    log_store: &dyn LogStore,
    coordinator: &CoordinatorHandle,
) -> Result<(), ClientError> {
    let saga = build_saga(spec, log_store).await?;
    coordinator.submit(saga).await.map_err(ClientError::from)
}
