//! Feed Store
//!
//! The store is the registry of named computations and their last known
//! values. It is the single entry point for registering computations,
//! reading values, submitting actions and taking snapshots.
//!
//! # How It Works
//!
//! 1. A computation is registered under a unique name. Its signature is
//!    validated, its kind is chosen, and a kind-specific invocation wrapper
//!    is built once.
//!
//! 2. Reading a pure or impure computation re-runs it. Reading any other
//!    kind returns the last value it produced.
//!
//! 3. Whenever a computation produces a new value, every computation
//!    downstream of it is marked as changed.
//!
//! 4. A snapshot (`all`) re-evaluates the changed merge computations in
//!    dependency order and returns every known value.
//!
//! # Thread Safety
//!
//! Both maps (name -> record, name -> value) live behind one reader/writer
//! lock. Registration holds the write lock for its whole
//! validate-then-insert sequence. No callable ever runs while the lock is
//! held, so a callable may itself read from the store.
//!
//! Pure and impure reads have a check-then-act window: two threads reading
//! the same name may both see the same previous value, both recompute, and
//! the last write wins. Enable
//! [`StoreConfig::single_flight`](crate::StoreConfig) to serialize
//! evaluations per name instead.

mod aggregate;
mod eval;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;
use smallvec::SmallVec;
use tracing::debug;

use crate::config::StoreConfig;
use crate::error::{FeedError, ShapeViolation};
use crate::func::{pure, Callable, Value};
use crate::graph::{DependencyGraph, Kind, Record};
use crate::shape;

/// The state guarded by the store's lock.
#[derive(Debug, Default)]
struct Registry {
    /// Records in registration order.
    records: IndexMap<String, Arc<Record>>,

    /// Last successfully computed value per name.
    values: HashMap<String, Value>,

    graph: DependencyGraph,
}

/// A registry of named computations.
///
/// Create one per application (or per component tree) and share it behind
/// an `Arc` if several threads need it.
#[derive(Debug, Default)]
pub struct Store {
    config: StoreConfig,
    registry: RwLock<Registry>,
}

/// What a registration declares besides the callable.
struct Declaration<'a> {
    kind: Option<Kind>,
    dependencies: &'a [&'a str],
    actions: &'a [&'a str],
}

fn dedup(names: &[&str]) -> SmallVec<[String; 4]> {
    let mut seen = HashSet::new();
    names
        .iter()
        .filter(|name| seen.insert(**name))
        .map(|name| (*name).to_owned())
        .collect()
}

impl Store {
    /// Create a store with the default config.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: StoreConfig) -> Self {
        Self {
            config,
            registry: RwLock::new(Registry::default()),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Register a pure, impure or action computation.
    ///
    /// The kind follows from the callable's parameter count: none is pure,
    /// one (the previous value) is impure, two (previous value and action)
    /// is action-driven. `actions` restricts which action types drive an
    /// action computation; empty means every action. A non-empty filter on
    /// a pure or impure computation is rejected.
    pub fn feed<C>(&self, name: impl Into<String>, callable: C, actions: &[&str]) -> Result<(), FeedError>
    where
        C: Callable + 'static,
    {
        self.register(
            name.into(),
            Arc::new(callable),
            Declaration {
                kind: None,
                dependencies: &[],
                actions,
            },
        )
    }

    /// Register a merge of the values of `merge` names.
    ///
    /// The callable takes the previous value followed by either a single
    /// `State` or one value per name in `merge`, in order. A lone merge
    /// parameter that accepts `State` (a dynamic one included) always
    /// selects the `State` form, even with a single merge name.
    pub fn derived_feed<C>(&self, name: impl Into<String>, callable: C, merge: &[&str]) -> Result<(), FeedError>
    where
        C: Callable + 'static,
    {
        if merge.is_empty() {
            return Err(FeedError::MustProvideMergeKeys);
        }
        self.register(
            name.into(),
            Arc::new(callable),
            Declaration {
                kind: Some(Kind::Derived),
                dependencies: merge,
                actions: &[],
            },
        )
    }

    /// Register a merge of the values of `merge` names that is driven by
    /// the action types in `actions` (empty means every action).
    pub fn derived_action_feed<C>(
        &self,
        name: impl Into<String>,
        callable: C,
        merge: &[&str],
        actions: &[&str],
    ) -> Result<(), FeedError>
    where
        C: Callable + 'static,
    {
        if merge.is_empty() {
            return Err(FeedError::MustProvideMergeKeys);
        }
        self.register(
            name.into(),
            Arc::new(callable),
            Declaration {
                kind: Some(Kind::ControlledMerge),
                dependencies: merge,
                actions,
            },
        )
    }

    /// Register a pure computation that always yields `value`.
    pub fn constant<T>(&self, name: impl Into<String>, value: T) -> Result<(), FeedError>
    where
        T: Clone + Send + Sync + 'static,
    {
        self.feed(name, pure(move || value.clone()), &[])
    }

    fn register(&self, name: String, callable: Arc<dyn Callable>, declaration: Declaration<'_>) -> Result<(), FeedError> {
        let mut registry = self.registry.write();

        if registry.records.contains_key(&name) {
            return Err(FeedError::NameInUse(name));
        }

        let params = callable.param_types();
        let returns = callable.return_types();
        let kind = match declaration.kind {
            Some(kind) => kind,
            None => Kind::for_source(params.len()).ok_or_else(|| FeedError::Shape {
                name: name.clone(),
                violation: ShapeViolation::UnexpectedArguments {
                    kind: Kind::Action,
                    expected: 2,
                    found: params.len(),
                },
            })?,
        };
        shape::validate(kind, params, returns).map_err(|violation| FeedError::Shape {
            name: name.clone(),
            violation,
        })?;
        if !kind.is_action_driven() && !declaration.actions.is_empty() {
            return Err(FeedError::UnexpectedActionFilter { name, kind });
        }

        let dependencies = dedup(declaration.dependencies);
        if self.config.reject_cycles {
            if let Some(path) = registry.graph.find_cycle(&name, &dependencies) {
                return Err(FeedError::CyclicDependency { path });
            }
        }

        let actions = declaration.actions.iter().map(|a| (*a).to_owned()).collect();
        let record = Record::build(&name, kind, callable, dependencies, actions)?;

        registry.graph.insert(&name, record.dependencies());
        debug!(
            name = %name,
            kind = ?kind,
            dependencies = ?record.dependencies(),
            "registered computation"
        );
        registry.records.insert(name, Arc::new(record));
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.registry.read().records.contains_key(name)
    }

    pub fn kind(&self, name: &str) -> Result<Kind, FeedError> {
        Ok(self.lookup(name)?.kind())
    }

    pub fn len(&self) -> usize {
        self.registry.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Registered names, in registration order.
    pub fn names(&self) -> Vec<String> {
        self.registry.read().records.keys().cloned().collect()
    }

    /// Declared dependencies of a merge computation.
    pub fn dependencies(&self, name: &str) -> Result<Vec<String>, FeedError> {
        Ok(self.lookup(name)?.dependencies().to_vec())
    }

    /// Whether `name` has been marked as changed since it last ran.
    pub fn has_changes(&self, name: &str) -> Result<bool, FeedError> {
        Ok(self.lookup(name)?.has_changes())
    }

    pub fn change_count(&self, name: &str) -> Result<u64, FeedError> {
        Ok(self.lookup(name)?.change_count())
    }

    /// Dependencies of `name` that changed since it last ran.
    pub fn changed_inputs(&self, name: &str) -> Result<Vec<String>, FeedError> {
        Ok(self.lookup(name)?.changed_inputs())
    }

    fn lookup(&self, name: &str) -> Result<Arc<Record>, FeedError> {
        self.registry
            .read()
            .records
            .get(name)
            .cloned()
            .ok_or_else(|| FeedError::NotExists(name.to_owned()))
    }
}
