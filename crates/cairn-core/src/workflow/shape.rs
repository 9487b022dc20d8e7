//! Callable shape resolution.
//!
//! A callable is accepted when it takes zero or one record argument and
//! returns nothing, `(record)`, `(error)` or `(record, error)`.

use cairn_types::error::ShapeError;
use cairn_types::record::{CallableDescriptor, RecordType, TypeRef};

/// Resolved input/output contract of a callable.
#[derive(Debug, Clone, PartialEq)]
pub struct CallableShape {
    pub input: Option<RecordType>,
    pub output: Option<RecordType>,
    pub returns_error: bool,
}

/// Resolve the shape of `descriptor` for the step named `step`.
pub fn resolve_callable_shape(
    step: &str,
    descriptor: &CallableDescriptor,
) -> Result<CallableShape, ShapeError> {
    let bad_function = || ShapeError::BadFunction {
        step: step.to_string(),
        type_name: descriptor.type_name(),
    };

    let input = match descriptor.arguments.as_slice() {
        [] => None,
        [argument] => Some(expect_record(step, argument, "argument")?),
        _ => return Err(bad_function()),
    };

    let (output, returns_error) = match descriptor.results.as_slice() {
        [] => (None, false),
        [TypeRef::Error] => (None, true),
        [result] => (Some(expect_record(step, result, "result")?), false),
        [result, TypeRef::Error] => (Some(expect_record(step, result, "result")?), true),
        _ => return Err(bad_function()),
    };

    Ok(CallableShape {
        input,
        output,
        returns_error,
    })
}

fn expect_record(step: &str, reference: &TypeRef, role: &str) -> Result<RecordType, ShapeError> {
    reference
        .as_record()
        .cloned()
        .ok_or_else(|| ShapeError::not_struct(reference.name(), format!("step '{step}' {role}")))
}
