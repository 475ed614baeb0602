//! Graph traversal and invariant checking over a [`Saga`].
//!
//! This is the heart of the executor: `saga_bfs` computes the wavefront —
//! the set of vertices dispatchable right now — and `check_valid_saga`
//! enforces the forward-mode/abort-mode validity invariants (I3/I4) that
//! every saga mutation must preserve.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::error::InvalidSaga;
use crate::model::{Saga, Status, VertexId};

/// Adjacency-only view of a DAG (no edge payload), used for direction-switch checks.
pub type Adjacency = HashMap<VertexId, HashSet<VertexId>>;

/// Flip a parent→children adjacency map into a child→parents one, or vice versa.
pub fn switch_direction(dag: &Adjacency) -> Adjacency {
    let mut reversed: Adjacency = HashMap::new();
    for key in dag.keys() {
        reversed.entry(key.clone()).or_default();
    }
    for (parent, children) in dag {
        for child in children {
            reversed.entry(child.clone()).or_default().insert(parent.clone());
        }
    }
    reversed
}

/// Verify that `a` (read as parent→children) and `b` (read as child→parents)
/// describe the same graph.
///
/// Used when validating user-supplied DAGs that arrive in one direction
/// but need to be cross-checked against a derived reverse view.
pub fn check_equivalent_dags(a: &Adjacency, b: &Adjacency) -> Result<(), InvalidSaga> {
    if switch_direction(a) == *b {
        Ok(())
    } else {
        Err(InvalidSaga::NotEquivalentDags)
    }
}

/// Vertices that appear as a key in `dag` but never as a child of any vertex.
/// This is where forward execution begins.
pub fn find_source_vertices(dag: &HashMap<VertexId, HashMap<VertexId, crate::model::Edge>>) -> Vec<VertexId> {
    let mut is_child: HashSet<&VertexId> = HashSet::new();
    for children in dag.values() {
        for child in children.keys() {
            is_child.insert(child);
        }
    }
    dag.keys()
        .filter(|id| !is_child.contains(id))
        .cloned()
        .collect()
}

/// `(finished, aborted)` per invariants I5/I6.
pub fn check_finished_or_abort(saga: &Saga) -> (bool, bool) {
    let aborted = saga.aborted();
    let finished = if !aborted {
        saga.vertices.values().all(|v| v.status == Status::EndT)
    } else {
        saga.vertices
            .values()
            .all(|v| matches!(v.status, Status::NotReached | Status::Abort | Status::EndC))
    };
    (finished, aborted)
}

/// Enforce I1 (well-formed graph), I2 (acyclic), and I3/I4 (forward/abort-mode
/// validity) on the saga as a whole.
pub fn check_valid_saga(saga: &Saga) -> Result<(), InvalidSaga> {
    // I1: every key in every nested map of dag is also a key of vertices.
    for (parent, children) in &saga.dag {
        if !saga.vertices.contains_key(parent) {
            return Err(InvalidSaga::DanglingEdge {
                vertex_id: parent.clone(),
            });
        }
        for child in children.keys() {
            if !saga.vertices.contains_key(child) {
                return Err(InvalidSaga::DanglingEdge {
                    vertex_id: child.clone(),
                });
            }
        }
    }

    // I2: acyclic.
    check_acyclic(saga)?;

    let aborted = saga.aborted();
    if !aborted {
        // I3.
        for vertex in saga.vertices.values() {
            if !matches!(vertex.status, Status::NotReached | Status::StartT | Status::EndT) {
                return Err(InvalidSaga::ForwardModeViolation {
                    vertex_id: vertex.id.clone(),
                });
            }
        }
        for (parent_id, children) in &saga.dag {
            let parent = &saga.vertices[parent_id];
            for child_id in children.keys() {
                let child = &saga.vertices[child_id];
                if parent.status != Status::EndT && child.status != Status::NotReached {
                    return Err(InvalidSaga::ForwardModeViolation {
                        vertex_id: child_id.clone(),
                    });
                }
            }
        }
    } else {
        // I4.
        for (parent_id, children) in &saga.dag {
            let parent = &saga.vertices[parent_id];
            if matches!(parent.status, Status::NotReached | Status::StartT | Status::Abort) {
                for child_id in children.keys() {
                    let child = &saga.vertices[child_id];
                    if child.status != Status::NotReached {
                        return Err(InvalidSaga::AbortModeViolation {
                            vertex_id: child_id.clone(),
                        });
                    }
                }
            }
        }
    }

    Ok(())
}

fn check_acyclic(saga: &Saga) -> Result<(), InvalidSaga> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Visiting,
        Done,
    }

    let mut marks: HashMap<&VertexId, Mark> = HashMap::new();

    fn visit<'a>(
        id: &'a VertexId,
        dag: &'a HashMap<VertexId, HashMap<VertexId, crate::model::Edge>>,
        marks: &mut HashMap<&'a VertexId, Mark>,
    ) -> Result<(), InvalidSaga> {
        match marks.get(id) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::Visiting) => return Err(InvalidSaga::Cycle),
            None => {}
        }
        marks.insert(id, Mark::Visiting);
        if let Some(children) = dag.get(id) {
            for child in children.keys() {
                visit(child, dag, marks)?;
            }
        }
        marks.insert(id, Mark::Done);
        Ok(())
    }

    for id in saga.vertices.keys() {
        visit(id, &saga.dag, &mut marks)?;
    }
    Ok(())
}

/// Compute the wavefront: the set of vertices the executor should dispatch right now.
///
/// Forward mode (saga not aborted): start from the sources; a vertex whose
/// status is `NotReached`/`StartT` is dispatchable and we do not descend past
/// it; a vertex at `EndT` has its children enqueued; anything else is dropped.
///
/// Abort mode: a vertex at `NotReached`/`Abort` is dropped without descending
/// (nothing to compensate there, and its subtree never ran); a vertex at
/// `EndT`/`StartC` needs compensation and is added without descending;
/// a vertex at `EndC` has its children enqueued (their subtrees may still
/// need compensation).
///
/// Each vertex appears at most once in the result.
pub fn saga_bfs(saga: &Saga) -> Vec<VertexId> {
    let aborted = saga.aborted();
    let sources = find_source_vertices(&saga.dag);

    let mut queue: VecDeque<VertexId> = sources.into_iter().collect();
    let mut seen: HashSet<VertexId> = HashSet::new();
    let mut result: Vec<VertexId> = Vec::new();
    let mut result_set: HashSet<VertexId> = HashSet::new();

    while let Some(id) = queue.pop_front() {
        if !seen.insert(id.clone()) {
            continue;
        }
        let Some(vertex) = saga.vertices.get(&id) else {
            continue;
        };

        if !aborted {
            match vertex.status {
                Status::NotReached | Status::StartT => {
                    if result_set.insert(id.clone()) {
                        result.push(id.clone());
                    }
                }
                Status::EndT => {
                    if let Some(children) = saga.dag.get(&id) {
                        for child in children.keys() {
                            queue.push_back(child.clone());
                        }
                    }
                }
                _ => {}
            }
        } else {
            match vertex.status {
                Status::NotReached | Status::Abort => {}
                Status::EndT | Status::StartC => {
                    if result_set.insert(id.clone()) {
                        result.push(id.clone());
                    }
                }
                Status::EndC => {
                    if let Some(children) = saga.dag.get(&id) {
                        for child in children.keys() {
                            queue.push_back(child.clone());
                        }
                    }
                }
                Status::StartT => {}
            }
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Action, Edge, Vertex};
    use std::collections::HashMap;

    fn vertex(id: &str, status: Status) -> Vertex {
        let mut v = Vertex::new(
            id,
            Action::new("u", "LOCAL", format!("{id}-t")),
            Action::new("u", "LOCAL", format!("{id}-c")),
        );
        v.status = status;
        v
    }

    fn saga_of(statuses: &[(&str, Status)], edges: &[(&str, &str)]) -> Saga {
        let mut vertices = HashMap::new();
        for (id, status) in statuses {
            vertices.insert(id.to_string(), vertex(id, *status));
        }
        let mut dag: HashMap<VertexId, HashMap<VertexId, Edge>> = HashMap::new();
        for (id, _) in statuses {
            dag.entry(id.to_string()).or_default();
        }
        for (parent, child) in edges {
            dag.entry(parent.to_string())
                .or_default()
                .insert(child.to_string(), Edge::default());
        }
        Saga::new(1, vertices, dag)
    }

    #[test]
    fn switch_direction_is_involutive() {
        let mut dag: Adjacency = HashMap::new();
        dag.insert("a".into(), ["b", "c"].iter().map(|s| s.to_string()).collect());
        dag.insert("b".into(), HashSet::new());
        dag.insert("c".into(), HashSet::new());

        let reversed = switch_direction(&dag);
        let back = switch_direction(&reversed);
        assert_eq!(dag, back);
        assert!(check_equivalent_dags(&dag, &reversed).is_ok());
    }

    #[test]
    fn find_source_vertices_excludes_children() {
        let dag = saga_of(
            &[("a", Status::NotReached), ("b", Status::NotReached)],
            &[("a", "b")],
        )
        .dag;
        let sources = find_source_vertices(&dag);
        assert_eq!(sources, vec!["a".to_string()]);
    }

    #[test]
    fn bfs_forward_mode_stops_at_first_incomplete_vertex() {
        let saga = saga_of(
            &[("a", Status::EndT), ("b", Status::NotReached), ("c", Status::NotReached)],
            &[("a", "b"), ("b", "c")],
        );
        let wave = saga_bfs(&saga);
        assert_eq!(wave, vec!["b".to_string()]);
    }

    #[test]
    fn bfs_abort_mode_compensates_from_committed_vertices() {
        // a -> b, a aborted, b already ran (EndT): b must compensate, a does not descend further.
        let saga = saga_of(&[("a", Status::Abort), ("b", Status::EndT)], &[("a", "b")]);
        let wave = saga_bfs(&saga);
        assert_eq!(wave, vec!["b".to_string()]);
    }

    #[test]
    fn bfs_abort_mode_walks_past_compensated_children() {
        let saga = saga_of(
            &[("a", Status::Abort), ("b", Status::EndC), ("c", Status::StartC)],
            &[("a", "b"), ("b", "c")],
        );
        let wave = saga_bfs(&saga);
        assert_eq!(wave, vec!["c".to_string()]);
    }

    #[test]
    fn finished_forward_requires_all_endt() {
        let saga = saga_of(&[("a", Status::EndT), ("b", Status::EndT)], &[("a", "b")]);
        assert_eq!(check_finished_or_abort(&saga), (true, false));
    }

    #[test]
    fn finished_compensated_requires_endc_or_notreached() {
        let saga = saga_of(&[("a", Status::Abort), ("b", Status::EndC)], &[("a", "b")]);
        assert_eq!(check_finished_or_abort(&saga), (true, true));
    }

    #[test]
    fn check_valid_saga_rejects_forward_mode_violation() {
        // child reached StartT while parent has not reached EndT — illegal per I3.
        let saga = saga_of(&[("a", Status::NotReached), ("b", Status::StartT)], &[("a", "b")]);
        assert!(matches!(
            check_valid_saga(&saga),
            Err(InvalidSaga::ForwardModeViolation { .. })
        ));
    }

    #[test]
    fn check_valid_saga_rejects_cycle() {
        let saga = saga_of(
            &[("a", Status::NotReached), ("b", Status::NotReached)],
            &[("a", "b"), ("b", "a")],
        );
        assert!(matches!(check_valid_saga(&saga), Err(InvalidSaga::Cycle)));
    }

    #[test]
    fn check_valid_saga_accepts_well_formed_forward_saga() {
        let saga = saga_of(&[("a", Status::EndT), ("b", Status::NotReached)], &[("a", "b")]);
        assert!(check_valid_saga(&saga).is_ok());
    }
}
