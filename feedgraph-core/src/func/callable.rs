//! Callables
//!
//! The store accepts computations of several shapes. Instead of reflecting
//! over arbitrary closures at runtime, every computation is handed to the
//! store as a [`Callable`]: something that can report its parameter and
//! return types and be invoked with a slice of [`Value`]s.
//!
//! [`FnCallable`] is the general implementation, built from explicit type
//! descriptors and a closure over values. The typed adapters in this module
//! (`pure`, `impure`, `action`, `merge`, `controlled_merge` and their
//! fallible `try_` variants) build an `FnCallable` with the right signature
//! from an ordinary Rust closure.

use smallvec::{smallvec, SmallVec};

use super::types::TypeDesc;
use super::value::Value;
use crate::action::{Action, State};
use crate::error::InvocationError;

/// Results of a single invocation, one per declared return type.
pub type Results = SmallVec<[Value; 2]>;

/// A computation the store can introspect and invoke.
pub trait Callable: Send + Sync {
    /// Declared parameter types, in call order.
    fn param_types(&self) -> &[TypeDesc];

    /// Declared return types. A second return is the error channel.
    fn return_types(&self) -> &[TypeDesc];

    /// Invoke with one argument per parameter.
    fn invoke(&self, args: &[Value]) -> Result<Results, InvocationError>;
}

type Body = Box<dyn Fn(&[Value]) -> Result<Results, InvocationError> + Send + Sync>;

/// A callable assembled from type descriptors and a closure.
pub struct FnCallable {
    params: SmallVec<[TypeDesc; 3]>,
    returns: SmallVec<[TypeDesc; 2]>,
    body: Body,
}

impl FnCallable {
    pub fn new<P, R, F>(params: P, returns: R, body: F) -> Self
    where
        P: IntoIterator<Item = TypeDesc>,
        R: IntoIterator<Item = TypeDesc>,
        F: Fn(&[Value]) -> Result<Results, InvocationError> + Send + Sync + 'static,
    {
        Self {
            params: params.into_iter().collect(),
            returns: returns.into_iter().collect(),
            body: Box::new(body),
        }
    }
}

impl Callable for FnCallable {
    fn param_types(&self) -> &[TypeDesc] {
        &self.params
    }

    fn return_types(&self) -> &[TypeDesc] {
        &self.returns
    }

    fn invoke(&self, args: &[Value]) -> Result<Results, InvocationError> {
        if args.len() != self.params.len() {
            return Err(InvocationError::Arity {
                expected: self.params.len(),
                found: args.len(),
            });
        }
        (self.body)(args)
    }
}

impl std::fmt::Debug for FnCallable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnCallable")
            .field("params", &self.params)
            .field("returns", &self.returns)
            .finish()
    }
}

fn arg<T: 'static>(args: &[Value], index: usize) -> Result<&T, InvocationError> {
    let value = args.get(index).ok_or(InvocationError::Arity {
        expected: index + 1,
        found: args.len(),
    })?;
    value.downcast_ref::<T>().ok_or(InvocationError::Argument {
        index,
        expected: std::any::type_name::<T>(),
        found: value.type_name(),
    })
}

fn single<T>(value: T) -> Results
where
    T: Send + Sync + 'static,
{
    smallvec![Value::new(value)]
}

fn split<T, E>(result: Result<T, E>) -> Results
where
    T: Send + Sync + 'static,
    E: Into<anyhow::Error>,
{
    match result {
        Ok(value) => smallvec![Value::new(value), Value::nil()],
        Err(error) => smallvec![Value::nil(), Value::error(error)],
    }
}

/// A computation of nothing, re-run on every read.
pub fn pure<T, F>(f: F) -> FnCallable
where
    T: Send + Sync + 'static,
    F: Fn() -> T + Send + Sync + 'static,
{
    FnCallable::new([] as [TypeDesc; 0], [TypeDesc::of::<T>()], move |_| Ok(single(f())))
}

pub fn try_pure<T, E, F>(f: F) -> FnCallable
where
    T: Send + Sync + 'static,
    E: Into<anyhow::Error>,
    F: Fn() -> Result<T, E> + Send + Sync + 'static,
{
    FnCallable::new(
        [] as [TypeDesc; 0],
        [TypeDesc::of::<T>(), TypeDesc::error()],
        move |_| Ok(split(f())),
    )
}

/// A computation of its own previous value. The first run receives
/// `T::default()`.
pub fn impure<T, F>(f: F) -> FnCallable
where
    T: Default + Send + Sync + 'static,
    F: Fn(&T) -> T + Send + Sync + 'static,
{
    FnCallable::new(
        [TypeDesc::with_zero::<T>()],
        [TypeDesc::of::<T>()],
        move |args| Ok(single(f(arg::<T>(args, 0)?))),
    )
}

pub fn try_impure<T, E, F>(f: F) -> FnCallable
where
    T: Default + Send + Sync + 'static,
    E: Into<anyhow::Error>,
    F: Fn(&T) -> Result<T, E> + Send + Sync + 'static,
{
    FnCallable::new(
        [TypeDesc::with_zero::<T>()],
        [TypeDesc::of::<T>(), TypeDesc::error()],
        move |args| Ok(split(f(arg::<T>(args, 0)?))),
    )
}

/// A reducer of its previous value and a submitted action.
pub fn action<T, F>(f: F) -> FnCallable
where
    T: Default + Send + Sync + 'static,
    F: Fn(&T, &Action) -> T + Send + Sync + 'static,
{
    FnCallable::new(
        [TypeDesc::with_zero::<T>(), TypeDesc::action()],
        [TypeDesc::of::<T>()],
        move |args| Ok(single(f(arg::<T>(args, 0)?, arg::<Action>(args, 1)?))),
    )
}

pub fn try_action<T, E, F>(f: F) -> FnCallable
where
    T: Default + Send + Sync + 'static,
    E: Into<anyhow::Error>,
    F: Fn(&T, &Action) -> Result<T, E> + Send + Sync + 'static,
{
    FnCallable::new(
        [TypeDesc::with_zero::<T>(), TypeDesc::action()],
        [TypeDesc::of::<T>(), TypeDesc::error()],
        move |args| Ok(split(f(arg::<T>(args, 0)?, arg::<Action>(args, 1)?))),
    )
}

/// A merge of the previous value and the dependency state.
pub fn merge<T, F>(f: F) -> FnCallable
where
    T: Default + Send + Sync + 'static,
    F: Fn(&T, &State) -> T + Send + Sync + 'static,
{
    FnCallable::new(
        [TypeDesc::with_zero::<T>(), TypeDesc::state()],
        [TypeDesc::of::<T>()],
        move |args| Ok(single(f(arg::<T>(args, 0)?, arg::<State>(args, 1)?))),
    )
}

pub fn try_merge<T, E, F>(f: F) -> FnCallable
where
    T: Default + Send + Sync + 'static,
    E: Into<anyhow::Error>,
    F: Fn(&T, &State) -> Result<T, E> + Send + Sync + 'static,
{
    FnCallable::new(
        [TypeDesc::with_zero::<T>(), TypeDesc::state()],
        [TypeDesc::of::<T>(), TypeDesc::error()],
        move |args| Ok(split(f(arg::<T>(args, 0)?, arg::<State>(args, 1)?))),
    )
}

/// A merge driven by an action.
pub fn controlled_merge<T, F>(f: F) -> FnCallable
where
    T: Default + Send + Sync + 'static,
    F: Fn(&Action, &T, &State) -> T + Send + Sync + 'static,
{
    FnCallable::new(
        [TypeDesc::action(), TypeDesc::with_zero::<T>(), TypeDesc::state()],
        [TypeDesc::of::<T>()],
        move |args| {
            Ok(single(f(
                arg::<Action>(args, 0)?,
                arg::<T>(args, 1)?,
                arg::<State>(args, 2)?,
            )))
        },
    )
}

pub fn try_controlled_merge<T, E, F>(f: F) -> FnCallable
where
    T: Default + Send + Sync + 'static,
    E: Into<anyhow::Error>,
    F: Fn(&Action, &T, &State) -> Result<T, E> + Send + Sync + 'static,
{
    FnCallable::new(
        [TypeDesc::action(), TypeDesc::with_zero::<T>(), TypeDesc::state()],
        [TypeDesc::of::<T>(), TypeDesc::error()],
        move |args| {
            Ok(split(f(
                arg::<Action>(args, 0)?,
                arg::<T>(args, 1)?,
                arg::<State>(args, 2)?,
            )))
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pure_adapter_signature_and_call() {
        let callable = pure(|| 7_u32);
        assert!(callable.param_types().is_empty());
        assert_eq!(callable.return_types(), &[TypeDesc::of::<u32>()]);

        let results = callable.invoke(&[]).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].downcast_ref::<u32>(), Some(&7));
    }

    #[test]
    fn fallible_adapter_uses_error_channel() {
        let callable = try_impure(|prev: &i32| {
            if *prev < 0 {
                Err(anyhow::anyhow!("negative"))
            } else {
                Ok(prev + 1)
            }
        });
        assert_eq!(callable.return_types().len(), 2);
        assert!(callable.return_types()[1].is_error());

        let ok = callable.invoke(&[Value::new(1_i32)]).unwrap();
        assert_eq!(ok[0].downcast_ref::<i32>(), Some(&2));
        assert!(ok[1].is_nil());

        let failed = callable.invoke(&[Value::new(-1_i32)]).unwrap();
        assert!(failed[0].is_nil());
        assert!(failed[1].is_error());
    }

    #[test]
    fn wrong_argument_type_is_reported() {
        let callable = impure(|prev: &i32| prev + 1);
        let err = callable.invoke(&[Value::new("text")]).unwrap_err();
        assert!(matches!(err, InvocationError::Argument { index: 0, .. }));

        let err = callable.invoke(&[]).unwrap_err();
        assert!(matches!(err, InvocationError::Arity { expected: 1, found: 0 }));
    }

    #[test]
    fn controlled_merge_takes_action_first() {
        let callable = controlled_merge(|action: &Action, prev: &i64, state: &State| {
            prev + action.value_as::<i64>().copied().unwrap_or(0) + state.len() as i64
        });
        assert_eq!(callable.param_types()[0], TypeDesc::action());
        assert_eq!(callable.param_types()[2], TypeDesc::state());

        let results = callable
            .invoke(&[
                Value::new(Action::new("bump", 5_i64)),
                Value::new(1_i64),
                Value::new(State::default()),
            ])
            .unwrap();
        assert_eq!(results[0].downcast_ref::<i64>(), Some(&6));
    }
}
