//! Wire value decoding for method arguments.
//!
//! Every supported parameter type has an explicit [`FromWire`] implementation
//! that either produces the native value or reports what it expected and what
//! kind of JSON value it actually got. Nothing here panics on bad input.

use std::collections::HashMap;
use std::fmt;

use serde::de::DeserializeOwned;
use serde_json::Value;

// ─────────────────────────────────────────────────────────────────────────────
// Wire Kind
// ─────────────────────────────────────────────────────────────────────────────

/// Shape of a JSON value as reported in decode errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WireKind {
    Null,
    Boolean,
    Integer,
    Float,
    String,
    Array,
    Object,
}

impl WireKind {
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Null => WireKind::Null,
            Value::Bool(_) => WireKind::Boolean,
            Value::Number(n) if n.is_f64() => WireKind::Float,
            Value::Number(_) => WireKind::Integer,
            Value::String(_) => WireKind::String,
            Value::Array(_) => WireKind::Array,
            Value::Object(_) => WireKind::Object,
        }
    }
}

impl fmt::Display for WireKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WireKind::Null => "null",
            WireKind::Boolean => "boolean",
            WireKind::Integer => "integer",
            WireKind::Float => "float",
            WireKind::String => "string",
            WireKind::Array => "array",
            WireKind::Object => "object",
        };
        f.write_str(name)
    }
}

/// A wire value did not fit the requested type
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("expected {expected}, got {actual}")]
pub struct DecodeError {
    pub expected: String,
    pub actual: WireKind,
}

impl DecodeError {
    fn new<T: FromWire>(value: &Value) -> Self {
        Self {
            expected: T::type_name(),
            actual: WireKind::of(value),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// FromWire
// ─────────────────────────────────────────────────────────────────────────────

/// A type that method arguments can be decoded into
pub trait FromWire: Sized + Send + 'static {
    /// Name reported as the expected type in mismatch errors
    fn type_name() -> String;

    fn from_wire(value: &Value) -> Result<Self, DecodeError>;
}

impl FromWire for bool {
    fn type_name() -> String {
        "bool".to_string()
    }

    fn from_wire(value: &Value) -> Result<Self, DecodeError> {
        value.as_bool().ok_or_else(|| DecodeError::new::<Self>(value))
    }
}

macro_rules! impl_from_wire_int {
    ($($ty:ty),* $(,)?) => {
        $(
            impl FromWire for $ty {
                fn type_name() -> String {
                    stringify!($ty).to_string()
                }

                fn from_wire(value: &Value) -> Result<Self, DecodeError> {
                    let mismatch = || DecodeError::new::<Self>(value);
                    let Value::Number(n) = value else {
                        return Err(mismatch());
                    };
                    if let Some(i) = n.as_i64() {
                        <$ty>::try_from(i).map_err(|_| mismatch())
                    } else if let Some(u) = n.as_u64() {
                        <$ty>::try_from(u).map_err(|_| mismatch())
                    } else {
                        // Floats are accepted only when they hold a whole number
                        let f = n.as_f64().ok_or_else(mismatch)?;
                        if !f.is_finite() || f.fract() != 0.0 {
                            return Err(mismatch());
                        }
                        <$ty>::try_from(f as i128).map_err(|_| mismatch())
                    }
                }
            }
        )*
    };
}

impl_from_wire_int!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

impl FromWire for f64 {
    fn type_name() -> String {
        "f64".to_string()
    }

    fn from_wire(value: &Value) -> Result<Self, DecodeError> {
        value.as_f64().ok_or_else(|| DecodeError::new::<Self>(value))
    }
}

impl FromWire for f32 {
    fn type_name() -> String {
        "f32".to_string()
    }

    fn from_wire(value: &Value) -> Result<Self, DecodeError> {
        let f = value.as_f64().ok_or_else(|| DecodeError::new::<Self>(value))?;
        if f.abs() > f32::MAX as f64 {
            return Err(DecodeError::new::<Self>(value));
        }
        Ok(f as f32)
    }
}

impl FromWire for String {
    fn type_name() -> String {
        "String".to_string()
    }

    fn from_wire(value: &Value) -> Result<Self, DecodeError> {
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| DecodeError::new::<Self>(value))
    }
}

impl FromWire for char {
    fn type_name() -> String {
        "char".to_string()
    }

    fn from_wire(value: &Value) -> Result<Self, DecodeError> {
        let s = value.as_str().ok_or_else(|| DecodeError::new::<Self>(value))?;
        let mut chars = s.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Ok(c),
            _ => Err(DecodeError::new::<Self>(value)),
        }
    }
}

impl FromWire for Value {
    fn type_name() -> String {
        "Value".to_string()
    }

    fn from_wire(value: &Value) -> Result<Self, DecodeError> {
        Ok(value.clone())
    }
}

impl<T: FromWire> FromWire for Option<T> {
    fn type_name() -> String {
        format!("Option<{}>", T::type_name())
    }

    fn from_wire(value: &Value) -> Result<Self, DecodeError> {
        match value {
            Value::Null => Ok(None),
            other => T::from_wire(other).map(Some),
        }
    }
}

impl<T: FromWire> FromWire for Vec<T> {
    fn type_name() -> String {
        format!("Vec<{}>", T::type_name())
    }

    fn from_wire(value: &Value) -> Result<Self, DecodeError> {
        let items = value
            .as_array()
            .ok_or_else(|| DecodeError::new::<Self>(value))?;
        items
            .iter()
            .map(|item| T::from_wire(item).map_err(|_| DecodeError::new::<Self>(value)))
            .collect()
    }
}

impl<T: FromWire> FromWire for HashMap<String, T> {
    fn type_name() -> String {
        format!("HashMap<String, {}>", T::type_name())
    }

    fn from_wire(value: &Value) -> Result<Self, DecodeError> {
        let object = value
            .as_object()
            .ok_or_else(|| DecodeError::new::<Self>(value))?;
        object
            .iter()
            .map(|(key, item)| {
                T::from_wire(item)
                    .map(|v| (key.clone(), v))
                    .map_err(|_| DecodeError::new::<Self>(value))
            })
            .collect()
    }
}

/// Decode an argument through serde instead of a dedicated [`FromWire`] impl
///
/// Use this for user structs: `fn add(&mut self, item: Json<TodoItem>)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Json<T>(pub T);

impl<T> Json<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T: DeserializeOwned + Send + 'static> FromWire for Json<T> {
    fn type_name() -> String {
        short_type_name::<T>()
    }

    fn from_wire(value: &Value) -> Result<Self, DecodeError> {
        serde_json::from_value(value.clone())
            .map(Json)
            .map_err(|_| DecodeError::new::<Self>(value))
    }
}

/// `std::any::type_name` with module paths stripped
/// (`alloc::vec::Vec<my_app::Item>` -> `Vec<Item>`).
pub fn short_type_name<T: ?Sized>() -> String {
    let full = std::any::type_name::<T>();
    let mut out = String::with_capacity(full.len());
    let mut segment = String::new();

    for ch in full.chars() {
        match ch {
            ':' => segment.clear(),
            c if c.is_alphanumeric() || c == '_' => segment.push(c),
            c => {
                out.push_str(&segment);
                segment.clear();
                out.push(c);
            }
        }
    }
    out.push_str(&segment);
    out
}
