//! Computation Graph
//!
//! This module holds the per-name computation records and the index of
//! dependency edges between names.
//!
//! # Overview
//!
//! The graph is a directed acyclic graph (DAG) where:
//!
//! - Nodes are named computations
//! - Edges are declared dependencies: if `sum` merges `a`, there is an edge
//!   from `a` to `sum`
//!
//! When a computation produces a new value, we walk the graph to find every
//! computation downstream of it and bump its change counter. Dirty
//! computations are re-evaluated later, in dependency order, when a full
//! snapshot is requested.
//!
//! # Design Decisions
//!
//! 1. Edges are keyed by name rather than by record, so a computation can
//!    declare a dependency on a name that is registered later.
//!
//! 2. Both forward (dependencies) and reverse (dependents) edges are kept:
//!    forward edges drive cycle checks and ordering, reverse edges drive
//!    propagation.

mod dependency;
mod record;

pub use dependency::{DependencyGraph, Edge};
pub use record::{Kind, Record};
pub(crate) use record::{Computation, Pending};
