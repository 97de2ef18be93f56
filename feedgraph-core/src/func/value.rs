//! Type-Erased Values
//!
//! Every value that flows through the store (cached results, previous
//! values, action payloads, merge state) is carried as a [`Value`].
//!
//! A value is one of three things:
//!
//! - nil: the absence of a value (the "no error" second result, or the
//!   zero value of a type that has none)
//! - data: any `Send + Sync + 'static` payload behind an `Arc`
//! - error: a failure reported by a callable through its error channel
//!
//! Cloning a value only bumps a reference count, so values can be handed
//! out of the registry lock without copying the payload.

use std::any::{type_name, Any};
use std::fmt;
use std::sync::Arc;

#[derive(Clone)]
enum Repr {
    Nil,
    Data {
        type_name: &'static str,
        inner: Arc<dyn Any + Send + Sync>,
    },
    Error(Arc<anyhow::Error>),
}

/// A reference-counted, type-erased value.
#[derive(Clone)]
pub struct Value(Repr);

impl Value {
    /// Wrap a payload.
    pub fn new<T>(value: T) -> Self
    where
        T: Send + Sync + 'static,
    {
        Self(Repr::Data {
            type_name: type_name::<T>(),
            inner: Arc::new(value),
        })
    }

    /// The nil value.
    pub fn nil() -> Self {
        Self(Repr::Nil)
    }

    /// Wrap a failure so it can travel through a callable's error channel.
    pub fn error<E>(error: E) -> Self
    where
        E: Into<anyhow::Error>,
    {
        Self(Repr::Error(Arc::new(error.into())))
    }

    pub fn is_nil(&self) -> bool {
        matches!(self.0, Repr::Nil)
    }

    pub fn is_error(&self) -> bool {
        matches!(self.0, Repr::Error(_))
    }

    /// Get the carried error, if this is an error value.
    pub fn as_error(&self) -> Option<&Arc<anyhow::Error>> {
        match &self.0 {
            Repr::Error(error) => Some(error),
            _ => None,
        }
    }

    /// Borrow the payload as `T`.
    ///
    /// Returns `None` for nil and error values and for payloads of another
    /// type.
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        match &self.0 {
            Repr::Data { inner, .. } => inner.downcast_ref::<T>(),
            _ => None,
        }
    }

    /// Check whether the payload is a `T`.
    pub fn is<T: 'static>(&self) -> bool {
        self.downcast_ref::<T>().is_some()
    }

    /// Name of the carried type, for diagnostics.
    pub fn type_name(&self) -> &'static str {
        match &self.0 {
            Repr::Nil => "nil",
            Repr::Data { type_name, .. } => type_name,
            Repr::Error(_) => "error",
        }
    }

    /// Check whether two values share the same allocation.
    pub fn ptr_eq(&self, other: &Value) -> bool {
        match (&self.0, &other.0) {
            (Repr::Nil, Repr::Nil) => true,
            (Repr::Data { inner: a, .. }, Repr::Data { inner: b, .. }) => Arc::ptr_eq(a, b),
            (Repr::Error(a), Repr::Error(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Self::nil()
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Repr::Nil => f.write_str("Value(nil)"),
            Repr::Data { type_name, .. } => write!(f, "Value({type_name})"),
            Repr::Error(error) => write!(f, "Value(error: {error})"),
        }
    }
}
