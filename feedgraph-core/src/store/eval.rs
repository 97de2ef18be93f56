//! Evaluation and change propagation.

use std::collections::HashSet;

use indexmap::IndexMap;
use tracing::{debug, trace, warn};

use super::Store;
use crate::action::{Action, State};
use crate::error::FeedError;
use crate::func::Value;
use crate::graph::{Computation, Kind, Pending, Record};

/// What started an evaluation.
#[derive(Clone, Copy)]
enum Trigger<'a> {
    /// A read or merge trigger against the current values.
    Refresh,

    /// A newly submitted action.
    Drive(&'a Action),

    /// The last action, re-applied to the value it was first applied to.
    Replay(&'a Action, &'a Value),
}

impl Trigger<'_> {
    fn action(&self) -> Option<&Action> {
        match *self {
            Trigger::Refresh => None,
            Trigger::Drive(action) | Trigger::Replay(action, _) => Some(action),
        }
    }
}

impl Store {
    /// Get the up-to-date value of `name`.
    ///
    /// Pure and impure computations are re-run on every call. Action and
    /// merge computations return the value they last produced, or
    /// [`FeedError::Uncomputed`] if they never ran.
    pub fn get(&self, name: &str) -> Result<Value, FeedError> {
        let record = self.lookup(name)?;
        if record.kind().recomputes_on_read() {
            return self.evaluate(&record, Trigger::Refresh);
        }

        self.registry
            .read()
            .values
            .get(name)
            .cloned()
            .ok_or_else(|| FeedError::Uncomputed(name.to_owned()))
    }

    /// Get the value of `name` as a `T`.
    pub fn get_as<T>(&self, name: &str) -> Result<T, FeedError>
    where
        T: Clone + 'static,
    {
        let value = self.get(name)?;
        value
            .downcast_ref::<T>()
            .cloned()
            .ok_or_else(|| FeedError::TypeMismatch {
                name: name.to_owned(),
                expected: std::any::type_name::<T>(),
                found: value.type_name(),
            })
    }

    /// Re-run a merge computation against the current values of its
    /// dependencies.
    ///
    /// A controlled merge re-applies the last action that drove it to the
    /// value that action was applied to, so an action never takes effect
    /// twice. Only the dependency values are fresh.
    pub fn merge(&self, name: &str) -> Result<Value, FeedError> {
        let record = self.lookup(name)?;
        match record.kind() {
            Kind::Derived => self.evaluate(&record, Trigger::Refresh),
            Kind::ControlledMerge => {
                let (action, base) = record
                    .last_drive()
                    .ok_or_else(|| FeedError::Uncomputed(name.to_owned()))?;
                self.evaluate(&record, Trigger::Replay(&action, &base))
            }
            kind => Err(FeedError::NotMerged {
                name: name.to_owned(),
                kind,
            }),
        }
    }

    /// Drive every action computation that listens to `action`'s type.
    ///
    /// Targets run in dependency order. Returns the names that produced a
    /// new value. The first failure stops the submission; values committed
    /// before it stay in place.
    pub fn submit(&self, action: &Action) -> Result<Vec<String>, FeedError> {
        let targets: Vec<String> = self
            .registry
            .read()
            .records
            .values()
            .filter(|record| record.listens_to(action.kind()))
            .map(|record| record.name().to_owned())
            .collect();

        self.drive(action, &targets)
    }

    /// Drive exactly the named action computations with `action`,
    /// regardless of their action filters.
    pub fn submit_to(&self, action: &Action, names: &[&str]) -> Result<Vec<String>, FeedError> {
        let mut targets = Vec::with_capacity(names.len());
        for name in names {
            let record = self.lookup(name)?;
            if !record.kind().is_action_driven() {
                return Err(FeedError::NotActionDriven((*name).to_owned()));
            }
            targets.push((*name).to_owned());
        }

        self.drive(action, &targets)
    }

    fn drive(&self, action: &Action, targets: &[String]) -> Result<Vec<String>, FeedError> {
        let ordered = self.registry.read().graph.topological_order(targets);
        let mut updated = Vec::with_capacity(ordered.len());

        for name in ordered {
            let record = self.lookup(&name)?;
            if let Err(error) = self.evaluate(&record, Trigger::Drive(action)) {
                warn!(name = %name, action = action.kind(), error = %error, "action failed");
                return Err(error);
            }
            updated.push(name);
        }

        Ok(updated)
    }

    /// Run a record's computation, cache the result and propagate.
    ///
    /// Action-driven kinds need a trigger that carries an action.
    fn evaluate(&self, record: &Record, trigger: Trigger<'_>) -> Result<Value, FeedError> {
        let _flight = self.config.single_flight.then(|| record.in_flight());

        let (previous, state, pending) = {
            let registry = self.registry.read();
            let previous = registry.values.get(record.name()).cloned();
            let pending = record.pending();
            let state = if record.kind().is_merge() {
                let values: IndexMap<String, Value> = record
                    .dependencies()
                    .iter()
                    .filter_map(|dep| registry.values.get(dep).map(|v| (dep.clone(), v.clone())))
                    .collect();
                State::new(values, pending.inputs.clone())
            } else {
                State::default()
            };
            (previous, state, pending)
        };
        // Lock released: the callable may re-enter the store.

        let previous = match trigger {
            Trigger::Replay(_, base) => base.clone(),
            _ => previous.unwrap_or_else(|| record.zero()),
        };
        let base = previous.clone();
        let action = trigger.action();
        let uncomputed = || FeedError::Uncomputed(record.name().to_owned());

        let value = match record.computation() {
            Computation::Pure(run) => run(),
            Computation::Impure(run) => run(previous),
            Computation::Action(run) => run(previous, action.ok_or_else(uncomputed)?),
            Computation::Derived(run) => run(previous, &state),
            Computation::ControlledMerge(run) => run(action.ok_or_else(uncomputed)?, previous, &state),
        }?;

        self.commit(record, value.clone(), &pending);
        if let (Trigger::Drive(action), Kind::ControlledMerge) = (trigger, record.kind()) {
            record.remember(action, base);
        }
        Ok(value)
    }

    fn commit(&self, record: &Record, value: Value, pending: &Pending) {
        self.registry
            .write()
            .values
            .insert(record.name().to_owned(), value);
        record.settle(pending);
        debug!(name = record.name(), kind = ?record.kind(), "stored new value");

        self.notify_update(record.name());
    }

    /// Mark everything downstream of `changed` as changed.
    pub(crate) fn notify_update(&self, changed: &str) {
        let registry = self.registry.read();
        let mut touched = HashSet::new();

        for edge in registry.graph.cascade(changed) {
            if let Some(record) = registry.records.get(edge.dependent) {
                record.mark_changed(edge.input);
                touched.insert(edge.dependent);
                trace!(dependent = edge.dependent, input = edge.input, "marked changed");
            }
        }

        if !touched.is_empty() {
            trace!(changed, dependents = touched.len(), "propagated update");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;
    use crate::func::{action, impure, merge, pure, try_impure, try_pure};

    #[test]
    fn pure_runs_on_every_get() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let store = Store::new();
        store
            .feed(
                "answer",
                pure(move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                    42_i32
                }),
                &[],
            )
            .unwrap();

        assert_eq!(store.get_as::<i32>("answer").unwrap(), 42);
        assert_eq!(store.get_as::<i32>("answer").unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn impure_feeds_back_previous_value() {
        let store = Store::new();
        store.feed("count", impure(|n: &i32| n + 1), &[]).unwrap();

        assert_eq!(store.get_as::<i32>("count").unwrap(), 1);
        assert_eq!(store.get_as::<i32>("count").unwrap(), 2);
        assert_eq!(store.get_as::<i32>("count").unwrap(), 3);
    }

    #[test]
    fn failed_recompute_keeps_cached_value() {
        let store = Store::new();
        store
            .feed(
                "count",
                try_impure(|n: &i32| {
                    if *n >= 2 {
                        Err(anyhow::anyhow!("limit reached"))
                    } else {
                        Ok(n + 1)
                    }
                }),
                &[],
            )
            .unwrap();

        assert_eq!(store.get_as::<i32>("count").unwrap(), 1);
        assert_eq!(store.get_as::<i32>("count").unwrap(), 2);

        let err = store.get("count").unwrap_err();
        assert_eq!(err.to_string(), "limit reached");
        assert!(err.callable_error().is_some());

        // Still 2: the failure was not cached and the previous value stays.
        assert!(store.get("count").is_err());
        assert_eq!(
            store.registry.read().values.get("count").and_then(|v| v.downcast_ref::<i32>().copied()),
            Some(2)
        );
    }

    #[test]
    fn pure_failure_is_returned_verbatim() {
        let store = Store::new();
        store
            .feed("broken", try_pure(|| Err::<i32, _>(anyhow::anyhow!("backend down"))), &[])
            .unwrap();

        let err = store.get("broken").unwrap_err();
        assert_eq!(err.to_string(), "backend down");
        assert!(matches!(store.merge("broken"), Err(FeedError::NotMerged { .. })));
    }

    #[test]
    fn get_as_reports_type_mismatch() {
        let store = Store::new();
        store.constant("name", String::from("feed")).unwrap();

        let err = store.get_as::<i32>("name").unwrap_err();
        assert!(matches!(err, FeedError::TypeMismatch { .. }));
        assert_eq!(store.get_as::<String>("name").unwrap(), "feed");
    }

    #[test]
    fn action_feed_is_snapshot_only() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let store = Store::new();
        store
            .feed(
                "total",
                action(move |total: &i64, action: &Action| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    total + action.value_as::<i64>().copied().unwrap_or(0)
                }),
                &["add"],
            )
            .unwrap();

        assert!(matches!(store.get("total"), Err(FeedError::Uncomputed(_))));

        let updated = store.submit(&Action::new("add", 5_i64)).unwrap();
        assert_eq!(updated, vec!["total"]);
        assert_eq!(store.get_as::<i64>("total").unwrap(), 5);
        assert_eq!(store.get_as::<i64>("total").unwrap(), 5);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // Filtered out.
        assert!(store.submit(&Action::new("remove", 1_i64)).unwrap().is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn submit_to_checks_targets_first() {
        let store = Store::new();
        store
            .feed("total", action(|t: &i64, _: &Action| t + 1), &["add"])
            .unwrap();
        store.constant("fixed", 1_i64).unwrap();

        let err = store
            .submit_to(&Action::bare("anything"), &["total", "fixed"])
            .unwrap_err();
        assert!(matches!(err, FeedError::NotActionDriven(ref name) if name == "fixed"));
        assert!(matches!(store.get("total"), Err(FeedError::Uncomputed(_))));

        let err = store.submit_to(&Action::bare("anything"), &["ghost"]).unwrap_err();
        assert!(matches!(err, FeedError::NotExists(_)));

        // Explicit targets ignore the filter.
        let updated = store.submit_to(&Action::bare("anything"), &["total"]).unwrap();
        assert_eq!(updated, vec!["total"]);
        assert_eq!(store.get_as::<i64>("total").unwrap(), 1);
    }

    #[test]
    fn merge_reads_dependency_values() {
        let store = Store::new();
        store.constant("a", 2_i32).unwrap();
        store.constant("b", 3_i32).unwrap();
        store
            .derived_feed(
                "sum",
                merge(|_: &i32, state: &State| {
                    state.get_as::<i32>("a").copied().unwrap_or(0)
                        + state.get_as::<i32>("b").copied().unwrap_or(0)
                }),
                &["a", "b"],
            )
            .unwrap();

        assert!(matches!(store.get("sum"), Err(FeedError::Uncomputed(_))));

        // Only `a` has a value so far.
        store.get("a").unwrap();
        assert_eq!(store.merge("sum").unwrap().downcast_ref::<i32>(), Some(&2));

        store.get("b").unwrap();
        assert_eq!(store.merge("sum").unwrap().downcast_ref::<i32>(), Some(&5));
        assert_eq!(store.get_as::<i32>("sum").unwrap(), 5);
    }

    #[test]
    fn recompute_propagates_to_dependents() {
        let store = Store::new();
        store.feed("a", impure(|n: &i32| n + 1), &[]).unwrap();
        store
            .derived_feed("b", merge(|prev: &i32, _: &State| *prev), &["a"])
            .unwrap();
        store
            .derived_feed("c", merge(|prev: &i32, _: &State| *prev), &["b"])
            .unwrap();

        store.get("a").unwrap();
        assert_eq!(store.change_count("b").unwrap(), 1);
        assert_eq!(store.change_count("c").unwrap(), 1);
        assert_eq!(store.changed_inputs("b").unwrap(), vec!["a"]);

        store.get("a").unwrap();
        assert_eq!(store.change_count("b").unwrap(), 2);

        store.merge("b").unwrap();
        assert!(!store.has_changes("b").unwrap());
        assert!(store.changed_inputs("b").unwrap().is_empty());
        // b's own update reached c again.
        assert_eq!(store.change_count("c").unwrap(), 3);
    }
}
