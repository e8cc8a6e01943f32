//! Registered properties and their type-erased accessors.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use bridge_types::collection::{self, PatchError};
use bridge_types::{Access, CollectionAction};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::warn;

use crate::decode::short_type_name;

/// Types a property can hold
pub trait PropertyType: Serialize + DeserializeOwned + Any + Send {}

impl<T: Serialize + DeserializeOwned + Any + Send> PropertyType for T {}

/// Value handed to a host-side property write
pub enum PropertyValue {
    /// Clear the property; only accepted when the declared type takes null
    Null,
    /// A native value; accepted only when its type is exactly the declared type
    Native(Box<dyn Any + Send>),
}

impl PropertyValue {
    pub fn native<T: Any + Send>(value: T) -> Self {
        PropertyValue::Native(Box::new(value))
    }
}

impl fmt::Debug for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Null => write!(f, "Null"),
            PropertyValue::Native(_) => write!(f, "Native(..)"),
        }
    }
}

type Getter = Arc<dyn Fn(&dyn Any) -> Option<Value> + Send + Sync>;
type Setter = Arc<dyn Fn(&mut dyn Any, Box<dyn Any + Send>) -> bool + Send + Sync>;
type Patcher = Arc<dyn Fn(&mut dyn Any, &[CollectionAction]) -> Result<(), PatchError> + Send + Sync>;
type Decoder = fn(&Value) -> Option<Box<dyn Any + Send>>;

// ─────────────────────────────────────────────────────────────────────────────
// Property Meta
// ─────────────────────────────────────────────────────────────────────────────

/// One bindable property of a controller type
#[derive(Clone)]
pub struct PropertyMeta {
    name: String,
    access: Access,
    type_name: String,
    nullable: bool,
    getter: Option<Getter>,
    setter: Option<Setter>,
    decode: Decoder,
    patcher: Option<Patcher>,
}

impl PropertyMeta {
    pub(crate) fn scalar<C, T>(
        name: String,
        get: Option<impl Fn(&C) -> T + Send + Sync + 'static>,
        set: Option<impl Fn(&mut C, T) + Send + Sync + 'static>,
    ) -> Self
    where
        C: Any,
        T: PropertyType,
    {
        let mut access = Access::NONE;
        let getter = get.map(|get| {
            access |= Access::READ;
            erase_getter::<C, T>(get)
        });
        let setter = set.map(|set| {
            access |= Access::WRITE;
            erase_setter::<C, T>(set)
        });

        Self {
            name,
            access,
            type_name: short_type_name::<T>(),
            nullable: accepts_null::<T>(),
            getter,
            setter,
            decode: decode_property::<T>,
            patcher: None,
        }
    }

    pub(crate) fn collection<C, T>(
        name: String,
        get: impl Fn(&C) -> &Vec<T> + Send + Sync + 'static,
        get_mut: impl Fn(&mut C) -> &mut Vec<T> + Send + Sync + 'static,
    ) -> Self
    where
        C: Any,
        T: PropertyType,
    {
        let get_mut = Arc::new(get_mut);

        let replace = {
            let get_mut = get_mut.clone();
            move |this: &mut C, items: Vec<T>| *get_mut(this) = items
        };

        let patcher: Patcher = Arc::new(move |instance: &mut dyn Any, actions: &[CollectionAction]| {
            let Some(this) = instance.downcast_mut::<C>() else {
                return Err(PatchError::WrongInstance(short_type_name::<C>()));
            };
            collection::apply(get_mut(this), actions, |value| {
                serde_json::from_value::<T>(value.clone())
            })
        });

        Self {
            name,
            access: Access::READ_WRITE,
            type_name: short_type_name::<Vec<T>>(),
            nullable: false,
            getter: Some(Arc::new(move |instance: &dyn Any| {
                let this = instance.downcast_ref::<C>()?;
                to_json::<C, _>(get(this))
            })),
            setter: Some(erase_setter::<C, Vec<T>>(replace)),
            decode: decode_property::<Vec<T>>,
            patcher: Some(patcher),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn access(&self) -> Access {
        self.access
    }

    /// Declared type, with module paths stripped
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Whether the declared type accepts null
    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    /// Whether element-level collection actions can be applied
    pub fn is_collection(&self) -> bool {
        self.patcher.is_some()
    }

    /// Serialize the current value; `None` for write-only properties
    pub fn read(&self, instance: &dyn Any) -> Option<Value> {
        self.getter.as_ref().and_then(|get| get(instance))
    }

    /// Host-side write with exact type matching
    pub fn write_native(&self, instance: &mut dyn Any, value: PropertyValue) -> bool {
        let Some(set) = &self.setter else {
            return false;
        };
        match value {
            PropertyValue::Null if self.nullable => match (self.decode)(&Value::Null) {
                Some(null) => set(instance, null),
                None => false,
            },
            PropertyValue::Null => false,
            PropertyValue::Native(value) => set(instance, value),
        }
    }

    /// Write a value received over the wire, decoding it into the declared type
    pub fn write_wire(&self, instance: &mut dyn Any, value: &Value) -> bool {
        let Some(set) = &self.setter else {
            return false;
        };
        match (self.decode)(value) {
            Some(decoded) => set(instance, decoded),
            None => false,
        }
    }

    /// Apply collection actions in order; `None` when this is not a collection
    pub fn apply_actions(
        &self,
        instance: &mut dyn Any,
        actions: &[CollectionAction],
    ) -> Option<Result<(), PatchError>> {
        self.patcher.as_ref().map(|patch| patch(instance, actions))
    }
}

impl fmt::Debug for PropertyMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyMeta")
            .field("name", &self.name)
            .field("access", &self.access)
            .field("type_name", &self.type_name)
            .field("nullable", &self.nullable)
            .field("collection", &self.is_collection())
            .finish()
    }
}

fn erase_getter<C, T>(get: impl Fn(&C) -> T + Send + Sync + 'static) -> Getter
where
    C: Any,
    T: Serialize,
{
    Arc::new(move |instance: &dyn Any| {
        let this = instance.downcast_ref::<C>()?;
        to_json::<C, _>(&get(this))
    })
}

fn to_json<C, T: Serialize + ?Sized>(value: &T) -> Option<Value> {
    match serde_json::to_value(value) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("Property value of {} could not be serialized: {}", short_type_name::<C>(), e);
            None
        }
    }
}

fn erase_setter<C, T>(set: impl Fn(&mut C, T) + Send + Sync + 'static) -> Setter
where
    C: Any,
    T: Any,
{
    Arc::new(move |instance: &mut dyn Any, value: Box<dyn Any + Send>| {
        let Some(this) = instance.downcast_mut::<C>() else {
            return false;
        };
        match value.downcast::<T>() {
            Ok(value) => {
                set(this, *value);
                true
            }
            Err(_) => false,
        }
    })
}

fn decode_property<T: PropertyType>(value: &Value) -> Option<Box<dyn Any + Send>> {
    serde_json::from_value::<T>(value.clone())
        .ok()
        .map(|v| Box::new(v) as Box<dyn Any + Send>)
}

/// Probe whether `T` deserializes from JSON null (`Option<_>`, `Value`, `()`)
fn accepts_null<T: DeserializeOwned>() -> bool {
    serde_json::from_value::<T>(Value::Null).is_ok()
}
