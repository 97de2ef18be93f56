//! Computation Records
//!
//! This module defines the record stored for every named computation: its
//! kind, the invocation wrapper built at registration, its declared inputs
//! and its change bookkeeping.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, ReentrantMutex, ReentrantMutexGuard};
use smallvec::SmallVec;

use crate::action::{Action, State};
use crate::error::{FeedError, InvocationError, ShapeViolation};
use crate::func::{Callable, Results, TypeDesc, Value};

/// The kind of a computation. Fixed at registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    /// Takes nothing. Recomputed on every read.
    Pure,

    /// Takes its previous value. Recomputed on every read.
    Impure,

    /// Takes its previous value and an action. Advanced only by submitted
    /// actions.
    Action,

    /// Takes its previous value and its dependencies' values. Advanced only
    /// by merge triggers.
    Derived,

    /// Takes an action, its previous value and its dependencies' values.
    ControlledMerge,
}

impl Kind {
    /// Pick the kind of a plain feed from its parameter count.
    pub fn for_source(params: usize) -> Option<Kind> {
        match params {
            0 => Some(Kind::Pure),
            1 => Some(Kind::Impure),
            2 => Some(Kind::Action),
            _ => None,
        }
    }

    /// Whether reads always recompute.
    pub fn recomputes_on_read(self) -> bool {
        matches!(self, Kind::Pure | Kind::Impure)
    }

    pub fn is_action_driven(self) -> bool {
        matches!(self, Kind::Action | Kind::ControlledMerge)
    }

    pub fn is_merge(self) -> bool {
        matches!(self, Kind::Derived | Kind::ControlledMerge)
    }
}

type Outcome = Result<Value, FeedError>;

/// Kind-specific invocation wrapper.
pub(crate) enum Computation {
    Pure(Box<dyn Fn() -> Outcome + Send + Sync>),
    Impure(Box<dyn Fn(Value) -> Outcome + Send + Sync>),
    Action(Box<dyn Fn(Value, &Action) -> Outcome + Send + Sync>),
    Derived(Box<dyn Fn(Value, &State) -> Outcome + Send + Sync>),
    ControlledMerge(Box<dyn Fn(&Action, Value, &State) -> Outcome + Send + Sync>),
}

/// How merge values are passed to a merge callable.
#[derive(Debug, Clone)]
enum MergeInputs {
    /// A single `State` argument.
    State,

    /// One argument per dependency, in declared order, with the zero value
    /// of each parameter standing in for missing values.
    Positional(SmallVec<[TypeDesc; 4]>),
}

impl MergeInputs {
    /// A lone merge parameter that accepts `State` (including a dynamic
    /// one) selects the state form, whatever the dependency count.
    fn detect(name: &str, merge_params: &[TypeDesc], dependencies: usize) -> Result<Self, FeedError> {
        if let [single] = merge_params {
            if single.accepts(&TypeDesc::state()) {
                return Ok(MergeInputs::State);
            }
        }
        if merge_params.len() != dependencies {
            return Err(FeedError::MergeArityMismatch {
                name: name.to_owned(),
                expected: merge_params.len(),
                found: dependencies,
            });
        }
        if let Some((index, ty)) = merge_params.iter().enumerate().find(|(_, ty)| !ty.has_zero()) {
            return Err(FeedError::Shape {
                name: name.to_owned(),
                violation: ShapeViolation::MergeValueNeedsZero {
                    index,
                    found: ty.name(),
                },
            });
        }
        Ok(MergeInputs::Positional(merge_params.iter().copied().collect()))
    }

    fn args(&self, dependencies: &[String], state: &State) -> SmallVec<[Value; 4]> {
        match self {
            MergeInputs::State => smallvec::smallvec![Value::new(state.clone())],
            MergeInputs::Positional(types) => dependencies
                .iter()
                .zip(types)
                .map(|(name, ty)| state.get(name).cloned().unwrap_or_else(|| ty.zero()))
                .collect(),
        }
    }
}

/// Turn raw results into the value to cache.
fn decode(name: &str, expected: usize, results: Results) -> Outcome {
    if results.len() != expected {
        return Err(InvocationError::Results {
            expected,
            found: results.len(),
        }
        .into());
    }

    let mut results = results.into_iter();
    let value = results.next().unwrap_or_default();
    match results.next() {
        None => Ok(value),
        Some(status) if status.is_nil() => Ok(value),
        Some(status) => match status.as_error() {
            Some(error) => Err(FeedError::Callable(Arc::clone(error))),
            None => Err(FeedError::TypeIsNotError {
                name: name.to_owned(),
                found: status.type_name(),
            }),
        },
    }
}

impl Computation {
    /// Build the wrapper for a validated callable.
    fn build(
        name: &str,
        kind: Kind,
        callable: Arc<dyn Callable>,
        dependencies: &[String],
    ) -> Result<Self, FeedError> {
        let returns = callable.return_types().len();
        let label = name.to_owned();

        let computation = match kind {
            Kind::Pure => Computation::Pure(Box::new(move || {
                decode(&label, returns, callable.invoke(&[])?)
            })),
            Kind::Impure => Computation::Impure(Box::new(move |previous: Value| {
                decode(&label, returns, callable.invoke(&[previous])?)
            })),
            Kind::Action => Computation::Action(Box::new(move |previous: Value, action: &Action| {
                let args = [previous, Value::new(action.clone())];
                decode(&label, returns, callable.invoke(&args)?)
            })),
            Kind::Derived => {
                let merge_params = callable.param_types().get(1..).unwrap_or(&[]);
                let inputs = MergeInputs::detect(name, merge_params, dependencies.len())?;
                let dependencies = dependencies.to_vec();
                Computation::Derived(Box::new(move |previous: Value, state: &State| {
                    let mut args: SmallVec<[Value; 4]> = SmallVec::new();
                    args.push(previous);
                    args.extend(inputs.args(&dependencies, state));
                    decode(&label, returns, callable.invoke(&args)?)
                }))
            }
            Kind::ControlledMerge => {
                let merge_params = callable.param_types().get(2..).unwrap_or(&[]);
                let inputs = MergeInputs::detect(name, merge_params, dependencies.len())?;
                let dependencies = dependencies.to_vec();
                Computation::ControlledMerge(Box::new(move |action: &Action, previous: Value, state: &State| {
                    let mut args: SmallVec<[Value; 4]> = SmallVec::new();
                    args.push(Value::new(action.clone()));
                    args.push(previous);
                    args.extend(inputs.args(&dependencies, state));
                    decode(&label, returns, callable.invoke(&args)?)
                }))
            }
        };
        Ok(computation)
    }
}

/// Change bookkeeping captured right before an evaluation.
#[derive(Debug, Clone, Default)]
pub(crate) struct Pending {
    pub changes: u64,
    pub inputs: HashSet<String>,
}

/// A registered computation.
pub struct Record {
    name: String,
    kind: Kind,
    computation: Computation,

    /// Declared dependencies (merge kinds only), deduplicated, in order.
    dependencies: SmallVec<[String; 4]>,

    /// Action types this computation responds to. Empty means all.
    actions: SmallVec<[String; 2]>,

    /// Zero value of the previous-value parameter.
    zero: Value,

    /// Number of change notifications since the last successful evaluation.
    changes: AtomicU64,

    /// Dependencies that notified since the last successful evaluation.
    notified: Mutex<HashSet<String>>,

    /// Last action that successfully drove this computation, with the
    /// previous value it was applied to.
    last_drive: Mutex<Option<(Action, Value)>>,

    /// Serializes evaluations of this name when single-flight is enabled.
    in_flight: ReentrantMutex<()>,
}

impl Record {
    /// Build a record for a callable whose signature already passed
    /// validation for `kind`.
    pub(crate) fn build(
        name: &str,
        kind: Kind,
        callable: Arc<dyn Callable>,
        dependencies: SmallVec<[String; 4]>,
        actions: SmallVec<[String; 2]>,
    ) -> Result<Self, FeedError> {
        let previous_slot = match kind {
            Kind::Pure => None,
            Kind::ControlledMerge => Some(1),
            _ => Some(0),
        };
        let zero = previous_slot
            .and_then(|slot| callable.param_types().get(slot))
            .map(TypeDesc::zero)
            .unwrap_or_default();
        let computation = Computation::build(name, kind, callable, &dependencies)?;

        Ok(Self {
            name: name.to_owned(),
            kind,
            computation,
            dependencies,
            actions,
            zero,
            changes: AtomicU64::new(0),
            notified: Mutex::new(HashSet::new()),
            last_drive: Mutex::new(None),
            in_flight: ReentrantMutex::new(()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    pub(crate) fn computation(&self) -> &Computation {
        &self.computation
    }

    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    pub fn actions(&self) -> &[String] {
        &self.actions
    }

    /// Check whether an action type drives this computation.
    pub fn listens_to(&self, action: &str) -> bool {
        self.kind.is_action_driven()
            && (self.actions.is_empty() || self.actions.iter().any(|a| a == action))
    }

    /// The previous value used when nothing has been cached yet.
    pub fn zero(&self) -> Value {
        self.zero.clone()
    }

    pub fn change_count(&self) -> u64 {
        self.changes.load(Ordering::Acquire)
    }

    pub fn has_changes(&self) -> bool {
        self.change_count() > 0
    }

    /// Inputs that notified since the last evaluation, in declared order.
    pub fn changed_inputs(&self) -> Vec<String> {
        let notified = self.notified.lock();
        self.dependencies
            .iter()
            .filter(|name| notified.contains(name.as_str()))
            .cloned()
            .collect()
    }

    /// Record that `input` changed.
    pub(crate) fn mark_changed(&self, input: &str) {
        self.notified.lock().insert(input.to_owned());
        self.changes.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn pending(&self) -> Pending {
        Pending {
            changes: self.change_count(),
            inputs: self.notified.lock().clone(),
        }
    }

    /// Clear the changes that were seen by a successful evaluation.
    ///
    /// Notifications that arrived while the evaluation ran stay counted.
    pub(crate) fn settle(&self, seen: &Pending) {
        let mut notified = self.notified.lock();
        let before = self
            .changes
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                Some(current.saturating_sub(seen.changes))
            })
            .unwrap_or_else(|current| current);
        if before <= seen.changes {
            notified.clear();
        }
    }

    /// The last driving action and the value it was applied to.
    pub(crate) fn last_drive(&self) -> Option<(Action, Value)> {
        self.last_drive.lock().clone()
    }

    pub(crate) fn remember(&self, action: &Action, base: Value) {
        *self.last_drive.lock() = Some((action.clone(), base));
    }

    pub(crate) fn in_flight(&self) -> ReentrantMutexGuard<'_, ()> {
        self.in_flight.lock()
    }
}

impl std::fmt::Debug for Record {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Record")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("dependencies", &self.dependencies)
            .field("actions", &self.actions)
            .field("changes", &self.change_count())
            .finish()
    }
}
