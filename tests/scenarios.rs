//! End-to-end saga scenarios from `spec.md` §8 (S1-S8), each run against
//! `LocalCaller` + `MockLogStore`, the way the teacher places cross-module
//! behavioral tests under its own `tests/integration` directory.

#[path = "scenarios/common.rs"]
mod common;

#[path = "scenarios/single_vertex.rs"]
mod single_vertex;

#[path = "scenarios/multi_vertex.rs"]
mod multi_vertex;

#[path = "scenarios/transient_and_recovery.rs"]
mod transient_and_recovery;
