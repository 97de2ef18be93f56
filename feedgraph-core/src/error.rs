//! Error Types
//!
//! Every failure the store reports is a typed value returned to the caller
//! of the method that hit it. Nothing is retried and nothing aborts the
//! process.
//!
//! - Registration errors: [`FeedError::NameInUse`],
//!   [`FeedError::MustProvideMergeKeys`], [`FeedError::Shape`] (wrapping a
//!   [`ShapeViolation`]), [`FeedError::CyclicDependency`],
//!   [`FeedError::MergeArityMismatch`] and
//!   [`FeedError::UnexpectedActionFilter`].
//! - Lookup errors: [`FeedError::NotExists`], [`FeedError::Uncomputed`].
//! - Invocation errors: the callable's own failure
//!   ([`FeedError::Callable`]), [`FeedError::TypeIsNotError`] and
//!   [`FeedError::Invocation`].

use std::sync::Arc;

use thiserror::Error;

use crate::graph::Kind;

/// Why a callable's signature cannot be registered for a kind.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShapeViolation {
    #[error("function must return a value")]
    MustReturnValue,

    #[error("function must return at most a value and an error, found {found} returns")]
    TooManyReturns { found: usize },

    #[error("function returning two values must return an error as second")]
    SecondReturnMustBeError,

    #[error("function must return a new value of the same type as its previous-value argument")]
    ReturnMustMatchArgument,

    #[error("function must accept an Action")]
    MustAcceptAction,

    #[error("function must expect the previous value as argument")]
    MustAcceptLastValue,

    #[error("merging combines multiple values, arguments must be more than one")]
    MergingRequiresMultipleValues,

    #[error("function must accept the last value and the merge values")]
    MustAcceptLastValueAndMergeValues,

    #[error("{kind:?} computation expects {expected} arguments, found {found}")]
    UnexpectedArguments {
        kind: Kind,
        expected: usize,
        found: usize,
    },

    #[error("previous-value argument {found} has no zero value")]
    PreviousValueNeedsZero { found: &'static str },

    #[error("merge value argument {index} ({found}) has no zero value")]
    MergeValueNeedsZero { index: usize, found: &'static str },
}

/// Failures reported by the invocation facility itself, as opposed to
/// failures the callable chose to return.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvocationError {
    #[error("expected {expected} arguments, got {found}")]
    Arity { expected: usize, found: usize },

    #[error("argument {index}: expected {expected}, got {found}")]
    Argument {
        index: usize,
        expected: &'static str,
        found: &'static str,
    },

    #[error("expected {expected} results, got {found}")]
    Results { expected: usize, found: usize },
}

/// Errors returned by [`Store`](crate::Store) operations.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("computed name already used: {0}")]
    NameInUse(String),

    #[error("merge computations require at least one source name")]
    MustProvideMergeKeys,

    #[error("invalid signature for {name}: {violation}")]
    Shape {
        name: String,
        #[source]
        violation: ShapeViolation,
    },

    #[error("dependency cycle detected: {}", path.join(" -> "))]
    CyclicDependency { path: Vec<String> },

    #[error("{name} takes {expected} merge values but depends on {found} names")]
    MergeArityMismatch {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("{name} is a {kind:?} computation and cannot filter actions")]
    UnexpectedActionFilter { name: String, kind: Kind },

    #[error("computation does not exist: {0}")]
    NotExists(String),

    #[error("{0} is not computed yet, use the appropriate action")]
    Uncomputed(String),

    #[error("{0} is not driven by actions")]
    NotActionDriven(String),

    #[error("{name} is a {kind:?} computation, not a merge")]
    NotMerged { name: String, kind: Kind },

    #[error("{name} holds {found}, not {expected}")]
    TypeMismatch {
        name: String,
        expected: &'static str,
        found: &'static str,
    },

    /// The callable reported a failure through its error channel.
    #[error("{0}")]
    Callable(Arc<anyhow::Error>),

    #[error("{name} returned {found} where an error was expected")]
    TypeIsNotError { name: String, found: &'static str },

    #[error(transparent)]
    Invocation(#[from] InvocationError),
}

impl FeedError {
    /// The callable's own error, if this is a [`FeedError::Callable`].
    pub fn callable_error(&self) -> Option<&Arc<anyhow::Error>> {
        match self {
            FeedError::Callable(error) => Some(error),
            _ => None,
        }
    }

    /// Downcast the callable's own error to a concrete type.
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: std::fmt::Display + std::fmt::Debug + Send + Sync + 'static,
    {
        self.callable_error().and_then(|error| error.downcast_ref::<E>())
    }

    /// The violation behind a [`FeedError::Shape`].
    pub fn violation(&self) -> Option<&ShapeViolation> {
        match self {
            FeedError::Shape { violation, .. } => Some(violation),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    #[error("quota exceeded")]
    struct QuotaExceeded;

    #[test]
    fn callable_errors_display_verbatim() {
        let err = FeedError::Callable(Arc::new(anyhow::Error::new(QuotaExceeded)));
        assert_eq!(err.to_string(), "quota exceeded");
        assert!(err.downcast_ref::<QuotaExceeded>().is_some());
    }

    #[test]
    fn cycle_path_is_joined() {
        let err = FeedError::CyclicDependency {
            path: vec!["a".into(), "b".into(), "a".into()],
        };
        assert_eq!(err.to_string(), "dependency cycle detected: a -> b -> a");
    }

    #[test]
    fn shape_errors_expose_violation() {
        let err = FeedError::Shape {
            name: "total".into(),
            violation: ShapeViolation::MustReturnValue,
        };
        assert_eq!(err.violation(), Some(&ShapeViolation::MustReturnValue));
        assert!(FeedError::MustProvideMergeKeys.violation().is_none());
    }
}
