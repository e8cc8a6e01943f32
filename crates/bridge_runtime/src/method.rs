//! Typed invocation thunks.
//!
//! A [`Method`] pairs the declared parameter types of a controller method
//! with a type-erased invoker. The invoker is built from an ordinary Rust
//! closure through [`IntoMethod`], so registering `|this: &mut Counter, by: i32|
//! this.add(by)` is enough to get decoding, invocation and return encoding.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use bridge_types::{CallResult, MethodKind};
use serde::Serialize;
use serde_json::Value;

use crate::decode::{DecodeError, FromWire};

/// Decoded argument as handed to an invoker
pub type BoxedArg = Box<dyn Any + Send>;

/// Type-erased call into a controller instance
pub type Invoker =
    Arc<dyn Fn(&mut dyn Any, Vec<BoxedArg>) -> Result<CallResult, InvokeError> + Send + Sync>;

/// Failure inside an invoker after arguments were decoded
#[derive(Debug, thiserror::Error)]
pub enum InvokeError {
    #[error("Instance is not a {expected}")]
    WrongInstance { expected: &'static str },

    #[error("Argument {index} is missing")]
    MissingArgument { index: usize },

    #[error("Argument {index} does not have the declared type")]
    WrongArgument { index: usize },

    #[error("Return value could not be serialized: {0}")]
    ReturnEncoding(#[from] serde_json::Error),
}

// ─────────────────────────────────────────────────────────────────────────────
// Parameter Types
// ─────────────────────────────────────────────────────────────────────────────

/// Declared type of one method parameter, with its decoder
#[derive(Clone)]
pub struct ParameterType {
    type_name: String,
    decode: fn(&Value) -> Result<BoxedArg, DecodeError>,
}

impl ParameterType {
    pub fn of<T: FromWire>() -> Self {
        Self {
            type_name: T::type_name(),
            decode: decode_boxed::<T>,
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Decode a wire value into this parameter's native type
    pub fn decode(&self, value: &Value) -> Result<BoxedArg, DecodeError> {
        (self.decode)(value)
    }
}

impl fmt::Debug for ParameterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.type_name)
    }
}

fn decode_boxed<T: FromWire>(value: &Value) -> Result<BoxedArg, DecodeError> {
    T::from_wire(value).map(|v| Box::new(v) as BoxedArg)
}

// ─────────────────────────────────────────────────────────────────────────────
// Method
// ─────────────────────────────────────────────────────────────────────────────

/// A resolved, callable controller method
#[derive(Clone)]
pub struct Method {
    name: String,
    parameter_types: Vec<ParameterType>,
    kind: MethodKind,
    invoker: Invoker,
}

impl Method {
    pub fn new(
        name: impl Into<String>,
        parameter_types: Vec<ParameterType>,
        kind: MethodKind,
        invoker: Invoker,
    ) -> Self {
        Self {
            name: name.into(),
            parameter_types,
            kind,
            invoker,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parameter_types(&self) -> &[ParameterType] {
        &self.parameter_types
    }

    pub fn kind(&self) -> MethodKind {
        self.kind
    }

    /// Number of declared parameters
    pub fn arity(&self) -> usize {
        self.parameter_types.len()
    }

    /// Call the method with already-decoded arguments
    pub fn invoke(&self, instance: &mut dyn Any, args: Vec<BoxedArg>) -> Result<CallResult, InvokeError> {
        (self.invoker)(instance, args)
    }
}

impl fmt::Debug for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Method")
            .field("name", &self.name)
            .field("parameter_types", &self.parameter_types)
            .field("kind", &self.kind)
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// IntoMethod
// ─────────────────────────────────────────────────────────────────────────────

/// Conversion from a closure `Fn(&mut C, A0, .., An) -> R` into a [`Method`]
///
/// Implemented for up to eight arguments. A `()` return makes the method an
/// `Action`; any other `Serialize` return makes it a `Function`.
pub trait IntoMethod<C, Args>: Send + Sync + 'static {
    fn into_method(self, name: String) -> Method;
}

fn return_kind<R: 'static>() -> MethodKind {
    if TypeId::of::<R>() == TypeId::of::<()>() {
        MethodKind::Action
    } else {
        MethodKind::Function
    }
}

fn encode_return<R: Serialize>(kind: MethodKind, result: &R) -> Result<CallResult, InvokeError> {
    match kind {
        MethodKind::Action => Ok(CallResult::Undefined),
        MethodKind::Function => Ok(CallResult::Value(serde_json::to_value(result)?)),
    }
}

fn take_arg<T: 'static>(
    args: &mut std::vec::IntoIter<BoxedArg>,
    index: usize,
) -> Result<T, InvokeError> {
    let boxed = args.next().ok_or(InvokeError::MissingArgument { index })?;
    boxed
        .downcast::<T>()
        .map(|value| *value)
        .map_err(|_| InvokeError::WrongArgument { index })
}

macro_rules! impl_into_method {
    ($($arg:ident => $index:tt),*) => {
        impl<C, F, R, $($arg,)*> IntoMethod<C, ($($arg,)*)> for F
        where
            C: Any,
            F: Fn(&mut C, $($arg),*) -> R + Send + Sync + 'static,
            R: Serialize + 'static,
            $($arg: FromWire,)*
        {
            #[allow(non_snake_case, unused_mut, unused_variables)]
            fn into_method(self, name: String) -> Method {
                let parameter_types = vec![$(ParameterType::of::<$arg>()),*];
                let kind = return_kind::<R>();
                let invoker: Invoker = Arc::new(move |instance: &mut dyn Any, args: Vec<BoxedArg>| {
                    let this = instance.downcast_mut::<C>().ok_or(InvokeError::WrongInstance {
                        expected: std::any::type_name::<C>(),
                    })?;
                    let mut args = args.into_iter();
                    $(let $arg: $arg = take_arg(&mut args, $index)?;)*
                    let result = (self)(this, $($arg),*);
                    encode_return(kind, &result)
                });
                Method::new(name, parameter_types, kind, invoker)
            }
        }
    };
}

impl_into_method!();
impl_into_method!(A0 => 0);
impl_into_method!(A0 => 0, A1 => 1);
impl_into_method!(A0 => 0, A1 => 1, A2 => 2);
impl_into_method!(A0 => 0, A1 => 1, A2 => 2, A3 => 3);
impl_into_method!(A0 => 0, A1 => 1, A2 => 2, A3 => 3, A4 => 4);
impl_into_method!(A0 => 0, A1 => 1, A2 => 2, A3 => 3, A4 => 4, A5 => 5);
impl_into_method!(A0 => 0, A1 => 1, A2 => 2, A3 => 3, A4 => 4, A5 => 5, A6 => 6);
impl_into_method!(A0 => 0, A1 => 1, A2 => 2, A3 => 3, A4 => 4, A5 => 5, A6 => 6, A7 => 7);
