//! Shape Validation
//!
//! Decides whether a callable's parameter and return types are acceptable
//! for a computation kind. The validator only looks at [`TypeDesc`] lists,
//! so it can be exercised with synthetic signatures.
//!
//! # Rules
//!
//! Return rules apply to every kind and are checked first:
//!
//! - there must be one or two returns
//! - a single return must be a value, not an error
//! - with two returns, the second is the error channel
//!
//! Then, per kind:
//!
//! | Kind            | Parameters                          |
//! |-----------------|-------------------------------------|
//! | Pure            | none                                |
//! | Impure          | previous value                      |
//! | Action          | previous value, `Action`            |
//! | Derived         | previous value, merge values...     |
//! | ControlledMerge | `Action`, previous value, merge...  |
//!
//! Wherever a previous value is taken, its parameter must accept the first
//! return type, since each result is fed back as the next previous value.
//! It must also have a zero value (or be dynamic): the first run of a
//! computation receives that zero value.

use crate::error::ShapeViolation;
use crate::func::TypeDesc;
use crate::graph::Kind;

/// Validate a signature for `kind`.
pub fn validate(kind: Kind, params: &[TypeDesc], returns: &[TypeDesc]) -> Result<(), ShapeViolation> {
    validate_returns(returns)?;
    let value = &returns[0];

    match kind {
        Kind::Pure => expect_arguments(kind, params, 0),
        Kind::Impure => {
            expect_arguments(kind, params, 1)?;
            expect_feedback(&params[0], value)
        }
        Kind::Action => {
            expect_arguments(kind, params, 2)?;
            if !params[1].accepts(&TypeDesc::action()) {
                return Err(ShapeViolation::MustAcceptAction);
            }
            expect_feedback(&params[0], value)
        }
        Kind::Derived => match params.len() {
            0 => Err(ShapeViolation::MustAcceptLastValue),
            1 => Err(ShapeViolation::MergingRequiresMultipleValues),
            _ => expect_feedback(&params[0], value),
        },
        Kind::ControlledMerge => match params.len() {
            0 => Err(ShapeViolation::MustAcceptLastValue),
            1 => Err(ShapeViolation::MergingRequiresMultipleValues),
            n => {
                if !params[0].accepts(&TypeDesc::action()) {
                    return Err(ShapeViolation::MustAcceptAction);
                }
                if n == 2 {
                    return Err(ShapeViolation::MustAcceptLastValueAndMergeValues);
                }
                expect_feedback(&params[1], value)
            }
        },
    }
}

fn validate_returns(returns: &[TypeDesc]) -> Result<(), ShapeViolation> {
    match returns {
        [] => Err(ShapeViolation::MustReturnValue),
        [value] if value.is_error() => Err(ShapeViolation::MustReturnValue),
        [_] => Ok(()),
        [_, error] if TypeDesc::error().accepts(error) => Ok(()),
        [_, _] => Err(ShapeViolation::SecondReturnMustBeError),
        more => Err(ShapeViolation::TooManyReturns { found: more.len() }),
    }
}

fn expect_arguments(kind: Kind, params: &[TypeDesc], expected: usize) -> Result<(), ShapeViolation> {
    if params.len() == expected {
        Ok(())
    } else {
        Err(ShapeViolation::UnexpectedArguments {
            kind,
            expected,
            found: params.len(),
        })
    }
}

fn expect_feedback(previous: &TypeDesc, value: &TypeDesc) -> Result<(), ShapeViolation> {
    if !previous.accepts(value) {
        return Err(ShapeViolation::ReturnMustMatchArgument);
    }
    if !previous.has_zero() {
        return Err(ShapeViolation::PreviousValueNeedsZero {
            found: previous.name(),
        });
    }
    Ok(())
}
