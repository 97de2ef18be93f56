//! Type Descriptors
//!
//! A [`TypeDesc`] describes one parameter or return slot of a callable.
//! The shape validator works purely on descriptors, so signatures can be
//! checked (and unit-tested) without building a real callable.
//!
//! # Assignability
//!
//! `target.accepts(source)` answers "can a value of `source` be passed where
//! `target` is expected":
//!
//! - a dynamic target (`TypeDesc::any()`) accepts everything
//! - an error target accepts only error descriptors
//! - a concrete target accepts only the same concrete type

use std::any::{type_name, TypeId};
use std::fmt;

use super::value::Value;
use crate::action::{Action, State};

/// How a descriptor participates in assignability checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeClass {
    /// A specific Rust type.
    Concrete,

    /// The error channel. Carries an `anyhow::Error` at runtime.
    Error,

    /// Accepts any value.
    Dynamic,
}

/// Describes the type of one parameter or return slot.
#[derive(Clone, Copy)]
pub struct TypeDesc {
    id: TypeId,
    name: &'static str,
    class: TypeClass,
    zero: Option<fn() -> Value>,
}

fn zero_of<T>() -> Value
where
    T: Default + Send + Sync + 'static,
{
    Value::new(T::default())
}

struct ErrorChannel;
struct Dynamic;

impl TypeDesc {
    /// Descriptor for a concrete type without a zero value.
    pub fn of<T>() -> Self
    where
        T: Send + Sync + 'static,
    {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
            class: TypeClass::Concrete,
            zero: None,
        }
    }

    /// Descriptor for a concrete type whose zero value is `T::default()`.
    pub fn with_zero<T>() -> Self
    where
        T: Default + Send + Sync + 'static,
    {
        Self {
            zero: Some(zero_of::<T> as fn() -> Value),
            ..Self::of::<T>()
        }
    }

    /// Descriptor for the error channel.
    pub fn error() -> Self {
        Self {
            id: TypeId::of::<ErrorChannel>(),
            name: "error",
            class: TypeClass::Error,
            zero: None,
        }
    }

    /// Descriptor that accepts any value.
    pub fn any() -> Self {
        Self {
            id: TypeId::of::<Dynamic>(),
            name: "any",
            class: TypeClass::Dynamic,
            zero: None,
        }
    }

    pub fn action() -> Self {
        Self::of::<Action>()
    }

    pub fn state() -> Self {
        Self::of::<State>()
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn class(&self) -> TypeClass {
        self.class
    }

    pub fn is_error(&self) -> bool {
        self.class == TypeClass::Error
    }

    /// Check whether a value described by `source` can be passed where
    /// `self` is expected.
    pub fn accepts(&self, source: &TypeDesc) -> bool {
        match self.class {
            TypeClass::Dynamic => true,
            TypeClass::Error => source.class == TypeClass::Error,
            TypeClass::Concrete => source.class == TypeClass::Concrete && self.id == source.id,
        }
    }

    /// Whether [`zero`](Self::zero) yields something this slot accepts.
    ///
    /// A dynamic slot accepts nil, so it always has one.
    pub fn has_zero(&self) -> bool {
        self.zero.is_some() || self.class == TypeClass::Dynamic
    }

    /// The zero value of this type, or nil when it has none.
    pub fn zero(&self) -> Value {
        self.zero.map(|zero| zero()).unwrap_or_default()
    }
}

/// Free-function form of [`TypeDesc::accepts`].
pub fn is_assignable(target: &TypeDesc, source: &TypeDesc) -> bool {
    target.accepts(source)
}

impl PartialEq for TypeDesc {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.class == other.class
    }
}

impl Eq for TypeDesc {}

impl fmt::Debug for TypeDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concrete_types_accept_only_themselves() {
        let int = TypeDesc::of::<i32>();
        assert!(int.accepts(&TypeDesc::with_zero::<i32>()));
        assert!(!int.accepts(&TypeDesc::of::<i64>()));
        assert!(!int.accepts(&TypeDesc::error()));
        assert!(!int.accepts(&TypeDesc::any()));
    }

    #[test]
    fn error_accepts_only_errors() {
        let error = TypeDesc::error();
        assert!(error.accepts(&TypeDesc::error()));
        assert!(!error.accepts(&TypeDesc::of::<String>()));
        assert!(is_assignable(&error, &TypeDesc::error()));
    }

    #[test]
    fn dynamic_accepts_everything() {
        let any = TypeDesc::any();
        assert!(any.accepts(&TypeDesc::of::<i32>()));
        assert!(any.accepts(&TypeDesc::error()));
        assert!(any.accepts(&TypeDesc::action()));
    }

    #[test]
    fn zero_values() {
        assert_eq!(TypeDesc::with_zero::<u8>().zero().downcast_ref::<u8>(), Some(&0));
        assert!(TypeDesc::of::<u8>().zero().is_nil());
        assert!(TypeDesc::any().zero().is_nil());

        assert!(TypeDesc::with_zero::<u8>().has_zero());
        assert!(TypeDesc::any().has_zero());
        assert!(!TypeDesc::of::<u8>().has_zero());
        assert!(!TypeDesc::error().has_zero());
    }
}
