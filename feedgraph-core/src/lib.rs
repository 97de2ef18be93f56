//! Feedgraph Core
//!
//! This crate provides the data layer behind a component tree: a registry
//! of named computations whose values are cached, recomputed by kind and
//! invalidated when something upstream changes.
//!
//! It implements:
//!
//! - Registration of computations with signature validation
//! - Value retrieval with per-kind recomputation rules
//! - Action submission and merge triggers
//! - Dirty propagation across dependents
//! - Best-effort snapshots of every known value
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `func`: Type descriptors, type-erased values and callables
//! - `shape`: Signature validation per computation kind
//! - `graph`: Computation records and the dependency index
//! - `store`: The registry, evaluation and propagation
//!
//! # Example
//!
//! ```rust
//! use feedgraph_core::{impure, merge, Store, State};
//!
//! let store = Store::new();
//! store.feed("clicks", impure(|n: &u32| n + 1), &[]).unwrap();
//! store
//!     .derived_feed(
//!         "label",
//!         merge(|_: &String, state: &State| {
//!             format!("clicked {} times", state.get_as::<u32>("clicks").copied().unwrap_or(0))
//!         }),
//!         &["clicks"],
//!     )
//!     .unwrap();
//!
//! // Reading an impure computation runs it and marks `label` as changed.
//! assert_eq!(store.get_as::<u32>("clicks").unwrap(), 1);
//! assert!(store.has_changes("label").unwrap());
//!
//! // A snapshot re-evaluates changed merges.
//! let snapshot = store.all();
//! assert_eq!(
//!     snapshot["label"].downcast_ref::<String>().map(String::as_str),
//!     Some("clicked 1 times")
//! );
//! ```

pub mod action;
pub mod config;
pub mod error;
pub mod func;
pub mod graph;
pub mod shape;
pub mod store;

pub use action::{Action, State};
pub use config::{ConfigError, StoreConfig};
pub use error::{FeedError, InvocationError, ShapeViolation};
pub use func::{
    action, controlled_merge, impure, merge, pure, try_action, try_controlled_merge, try_impure,
    try_merge, try_pure, Callable, FnCallable, TypeDesc, Value,
};
pub use graph::Kind;
pub use shape::validate;
pub use store::Store;
