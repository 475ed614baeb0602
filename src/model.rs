//! Saga data model: vertex status lifecycle, vertices, edges, and sagas.
//!
//! This module defines the types only — traversal algorithms and
//! invariant checks live in `graph`; persistence lives in `logstore`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A vertex identifier, stable within one saga.
pub type VertexId = String;

/// The lifecycle state of a single vertex's forward/compensating transaction.
///
/// See `spec.md` §3 for the full semantics of each state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    /// Nothing attempted yet.
    NotReached,
    /// Forward transaction persisted as begun; outcome unknown.
    StartT,
    /// Forward transaction completed successfully.
    EndT,
    /// Compensation persisted as begun.
    StartC,
    /// Compensation completed.
    EndC,
    /// Terminal failure of the forward transaction. No compensation needed —
    /// nothing durable was produced by this vertex.
    Abort,
}

/// One side of a vertex: either the forward action `T` or the compensating action `C`.
///
/// `request_id` is assigned once, at saga-create time, from the `LogStore`,
/// and never changes afterward (invariant I7) — it is the idempotency key
/// handed to the external service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    pub url: String,
    pub method: String,
    pub request_id: String,
    pub body: HashMap<String, String>,
    pub response: HashMap<String, String>,
}

impl Action {
    pub fn new(url: impl Into<String>, method: impl Into<String>, request_id: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: method.into(),
            request_id: request_id.into(),
            body: HashMap::new(),
            response: HashMap::new(),
        }
    }
}

/// One node of a saga, carrying a forward action and its paired compensator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vertex {
    pub id: VertexId,
    pub t: Action,
    pub c: Action,
    /// Ordered keys copied from `t.response` into `c.body` once `t` reaches `EndT`,
    /// so the compensator has the identifier the forward call produced
    /// (e.g. a reservation id).
    pub transfer_fields: Vec<String>,
    pub status: Status,
}

impl Vertex {
    pub fn new(id: impl Into<VertexId>, t: Action, c: Action) -> Self {
        Self {
            id: id.into(),
            t,
            c,
            transfer_fields: Vec::new(),
            status: Status::NotReached,
        }
    }

    /// Copy `TransferFields` from `t.response` into `c.body`, per executor step T.5.
    pub fn propagate_transfer_fields(&mut self) {
        for key in &self.transfer_fields {
            if let Some(value) = self.t.response.get(key) {
                self.c.body.insert(key.clone(), value.clone());
            }
        }
    }
}

/// A directed parent → child edge, carrying the fields copied from the
/// parent's forward response into the child's forward body once the
/// parent reaches `EndT`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub fields: Vec<String>,
}

/// A user-submitted DAG of vertices defining a business transaction that
/// either commits end-to-end or compensates every step that ran.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Saga {
    pub id: u64,
    pub vertices: HashMap<VertexId, Vertex>,
    /// Parent-id -> (child-id -> edge). Must be acyclic; key set equals `vertices`' key set.
    pub dag: HashMap<VertexId, HashMap<VertexId, Edge>>,
}

impl Saga {
    pub fn new(id: u64, vertices: HashMap<VertexId, Vertex>, dag: HashMap<VertexId, HashMap<VertexId, Edge>>) -> Self {
        Self { id, vertices, dag }
    }

    /// True iff any vertex is in `Abort`. Cheap to recompute; not cached,
    /// since the spec calls it "derived... not authoritative" and the
    /// vertex set never exceeds a few thousand entries.
    pub fn aborted(&self) -> bool {
        self.vertices.values().any(|v| v.status == Status::Abort)
    }

    /// Child-id -> (parent-id -> edge), derived from `dag`. Recomputed on
    /// demand rather than cached on `Saga`, since the vertex/edge set is
    /// fixed at create time (see DESIGN.md) — there is no incremental
    /// maintenance hazard to worry about.
    pub fn reverse_dag(&self) -> HashMap<VertexId, HashMap<VertexId, Edge>> {
        let mut reverse: HashMap<VertexId, HashMap<VertexId, Edge>> = HashMap::new();
        for (parent, children) in &self.dag {
            for (child, edge) in children {
                reverse
                    .entry(child.clone())
                    .or_default()
                    .insert(parent.clone(), edge.clone());
            }
        }
        reverse
    }

    /// Encode this saga for durable storage (MessagePack, matching the
    /// original coordinator's `EncodeMsgPack`).
    pub fn encode(&self) -> Result<Vec<u8>, rmp_serde::encode::Error> {
        rmp_serde::to_vec(self)
    }

    /// Decode a saga previously written by [`Saga::encode`].
    pub fn decode(bytes: &[u8]) -> Result<Self, rmp_serde::decode::Error> {
        rmp_serde::from_slice(bytes)
    }
}

impl Vertex {
    /// Encode this vertex for durable storage.
    pub fn encode(&self) -> Result<Vec<u8>, rmp_serde::encode::Error> {
        rmp_serde::to_vec(self)
    }

    /// Decode a vertex previously written by [`Vertex::encode`].
    pub fn decode(bytes: &[u8]) -> Result<Self, rmp_serde::decode::Error> {
        rmp_serde::from_slice(bytes)
    }
}
