//! Method resolution and invocation by name.
//!
//! Resolution tries the name exactly as given, then its PascalCase form, then
//! its camelCase form. All arguments are decoded before the method runs, so a
//! bad argument never leaves the controller half-updated.

use std::any::Any;
use std::collections::BTreeMap;

use bridge_types::{CallResult, naming};
use serde_json::Value;
use tracing::debug;

use crate::decode::WireKind;
use crate::error::DispatchError;
use crate::method::{InvokeError, Method};
use crate::registry::TypeInfo;

/// Find a method by name, falling back through the case conventions
pub fn resolve<'a>(table: &'a BTreeMap<String, Method>, name: &str) -> Option<&'a Method> {
    table
        .get(name)
        .or_else(|| table.get(&naming::to_pascal(name)))
        .or_else(|| table.get(&naming::to_camel(name)))
}

/// Resolve, decode and invoke a method on `instance`
///
/// `internal` selects the framework-internal table instead of the
/// user-visible one.
pub fn call_method(
    type_info: &TypeInfo,
    instance: &mut dyn Any,
    method_name: &str,
    args: &[Value],
    internal: bool,
) -> Result<CallResult, DispatchError> {
    if method_name.trim().is_empty() {
        return Err(DispatchError::InvalidArgument(
            "method name must not be blank".to_string(),
        ));
    }

    let table = if internal {
        type_info.internal_methods()
    } else {
        type_info.methods()
    };

    let method = resolve(table, method_name).ok_or_else(|| DispatchError::MethodNotFound {
        method: method_name.to_string(),
        controller: type_info.name().to_string(),
    })?;

    if args.len() != method.arity() {
        return Err(DispatchError::ParameterCountMismatch {
            method: method.name().to_string(),
            controller: type_info.name().to_string(),
            expected: method.arity(),
            actual: args.len(),
        });
    }

    let decoded = method
        .parameter_types()
        .iter()
        .zip(args)
        .enumerate()
        .map(|(index, (parameter, arg))| {
            parameter
                .decode(arg)
                .map_err(|_| DispatchError::ParameterMismatch {
                    index,
                    expected: parameter.type_name().to_string(),
                    actual: WireKind::of(arg),
                    method: method.name().to_string(),
                    controller: type_info.name().to_string(),
                })
        })
        .collect::<Result<Vec<_>, _>>()?;

    debug!("Invoking {}.{}", type_info.name(), method.name());

    method.invoke(instance, decoded).map_err(|e| match e {
        InvokeError::ReturnEncoding(source) => DispatchError::ReturnEncoding {
            method: method.name().to_string(),
            source,
        },
        other => DispatchError::Invocation {
            method: method.name().to_string(),
            message: other.to_string(),
        },
    })
}
