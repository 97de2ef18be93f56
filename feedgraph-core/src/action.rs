//! Actions and Merge State
//!
//! An [`Action`] is an intent submitted from outside (usually by the event
//! layer) to drive action-based computations. A [`State`] is the snapshot of
//! dependency values handed to merge computations.

use std::collections::HashSet;

use indexmap::IndexMap;

use crate::func::Value;

/// An intent about an action to be performed against a computation's
/// previous value to produce a new one.
#[derive(Debug, Clone)]
pub struct Action {
    kind: String,
    value: Value,
}

impl Action {
    /// Create an action carrying a payload.
    pub fn new<T>(kind: impl Into<String>, value: T) -> Self
    where
        T: Send + Sync + 'static,
    {
        Self {
            kind: kind.into(),
            value: Value::new(value),
        }
    }

    /// Create an action without a payload.
    pub fn bare(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            value: Value::nil(),
        }
    }

    /// The action's type name, matched against action filters.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Borrow the payload as `T`.
    pub fn value_as<T: 'static>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }
}

/// Current values of a merge computation's dependencies.
///
/// Entries follow the declared dependency order. Dependencies that have
/// never been computed are absent.
#[derive(Debug, Clone, Default)]
pub struct State {
    values: IndexMap<String, Value>,
    changed: HashSet<String>,
}

impl State {
    pub(crate) fn new(values: IndexMap<String, Value>, changed: HashSet<String>) -> Self {
        Self { values, changed }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Borrow a dependency's value as `T`.
    pub fn get_as<T: 'static>(&self, name: &str) -> Option<&T> {
        self.values.get(name).and_then(|value| value.downcast_ref::<T>())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Whether `name` was reported as changed since the computation last
    /// ran.
    pub fn changed(&self, name: &str) -> bool {
        self.changed.contains(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(name, value)| (name.as_str(), value))
    }
}
