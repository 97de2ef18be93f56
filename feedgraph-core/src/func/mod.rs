//! Function Introspection and Invocation
//!
//! The store needs two capabilities from the computations it is given:
//!
//! 1. Introspection: the ordered parameter and return types of a callable,
//!    so its shape can be validated and its kind chosen.
//! 2. Invocation: calling it with a list of argument values and getting
//!    back its results or a failure.
//!
//! This module provides both through the [`Callable`] trait, a type-erased
//! [`Value`] and [`TypeDesc`] type descriptors. The store itself never looks
//! inside a callable beyond this surface.

mod callable;
mod types;
mod value;

pub use callable::{
    action, controlled_merge, impure, merge, pure, try_action, try_controlled_merge,
    try_impure, try_merge, try_pure, Callable, FnCallable, Results,
};
pub use types::{is_assignable, TypeClass, TypeDesc};
pub use value::Value;
