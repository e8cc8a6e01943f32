//! Wire shapes exchanged between the host and the UI runtime.
//!
//! Everything here serializes to the JSON layout the UI script expects, and
//! the TypeScript definitions are generated from the same structs.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use ts_rs::TS;

use crate::naming;

/// Process-unique controller identifier
pub type ControllerId = u64;

// ─────────────────────────────────────────────────────────────────────────────
// Enumerations
// ─────────────────────────────────────────────────────────────────────────────

/// Bitwise read/write access of a property across the boundary
///
/// Serialized as its numeric value (`Read = 1`, `Write = 2`, both = 3).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[serde(transparent)]
#[ts(export)]
pub struct Access(u8);

impl Access {
    pub const NONE: Access = Access(0);
    pub const READ: Access = Access(1);
    pub const WRITE: Access = Access(2);
    pub const READ_WRITE: Access = Access(3);

    /// Build from raw bits, dropping unknown flags
    pub fn from_bits(bits: u8) -> Self {
        Access(bits & Self::READ_WRITE.0)
    }

    /// Raw bit value
    pub fn bits(self) -> u8 {
        self.0
    }

    /// Whether every flag in `other` is set in `self`
    pub fn contains(self, other: Access) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_readable(self) -> bool {
        self.contains(Access::READ)
    }

    pub fn is_writable(self) -> bool {
        self.contains(Access::WRITE)
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for Access {
    type Output = Access;

    fn bitor(self, rhs: Access) -> Access {
        Access(self.0 | rhs.0)
    }
}

impl BitOrAssign for Access {
    fn bitor_assign(&mut self, rhs: Access) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Access::READ => write!(f, "Read"),
            Access::WRITE => write!(f, "Write"),
            Access::READ_WRITE => write!(f, "Read | Write"),
            _ => write!(f, "None"),
        }
    }
}

/// Whether a method produces a value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum MethodKind {
    /// No return value; callers receive `undefined`
    Action,
    /// Returns a value to serialize back to the caller
    Function,
}

/// Case style used to translate member names crossing the boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "kebab-case")]
#[ts(export)]
pub enum NamingConvention {
    /// Names are sent exactly as declared
    Normal,
    /// Names are converted to camelCase
    #[default]
    CamelCase,
}

impl NamingConvention {
    /// Translate a declared member name into this convention
    pub fn apply(self, name: &str) -> String {
        match self {
            NamingConvention::Normal => name.to_string(),
            NamingConvention::CamelCase => naming::to_camel(name),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Controller Description
// ─────────────────────────────────────────────────────────────────────────────

/// A callable method as seen by the UI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct MethodDescription {
    pub name: String,
}

/// A bindable property as seen by the UI
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PropertyDescription {
    pub name: String,
    /// Current value; absent for write-only properties
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub value: Option<Value>,
    pub access: Access,
}

/// Snapshot of a controller handed to the UI when it binds to it
///
/// Generated on demand, never cached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ControllerDescription {
    #[ts(type = "number")]
    pub id: ControllerId,
    pub name: String,
    #[serde(default)]
    pub methods: Vec<MethodDescription>,
    #[serde(default)]
    pub properties: Vec<PropertyDescription>,
}

impl ControllerDescription {
    /// Find a property description by its wire name
    pub fn property(&self, name: &str) -> Option<&PropertyDescription> {
        self.properties.iter().find(|p| p.name == name)
    }

    /// Check whether a method is listed under its wire name
    pub fn has_method(&self, name: &str) -> bool {
        self.methods.iter().any(|m| m.name == name)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Collection Actions
// ─────────────────────────────────────────────────────────────────────────────

/// Kind of element-level mutation on an observable collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum CollectionActionKind {
    Add,
    Remove,
    Replace,
    Move,
}

impl fmt::Display for CollectionActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollectionActionKind::Add => write!(f, "Add"),
            CollectionActionKind::Remove => write!(f, "Remove"),
            CollectionActionKind::Replace => write!(f, "Replace"),
            CollectionActionKind::Move => write!(f, "Move"),
        }
    }
}

/// One element-level mutation; indices are relative to the collection as it
/// stands after all preceding actions in the same list were applied
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CollectionAction {
    pub action: CollectionActionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub new_items: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub new_starting_index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub old_starting_index: Option<usize>,
}

impl CollectionAction {
    /// Insert `items` starting at `index`
    pub fn add(items: Vec<Value>, index: usize) -> Self {
        Self {
            action: CollectionActionKind::Add,
            new_items: Some(items),
            new_starting_index: Some(index),
            old_starting_index: None,
        }
    }

    /// Remove the single element at `index`
    pub fn remove(index: usize) -> Self {
        Self {
            action: CollectionActionKind::Remove,
            new_items: None,
            new_starting_index: None,
            old_starting_index: Some(index),
        }
    }

    /// Overwrite elements starting at `index`
    pub fn replace(items: Vec<Value>, index: usize) -> Self {
        Self {
            action: CollectionActionKind::Replace,
            new_items: Some(items),
            new_starting_index: Some(index),
            old_starting_index: None,
        }
    }

    /// Move the element at `from` so it ends up at `to`
    pub fn moved(from: usize, to: usize) -> Self {
        Self {
            action: CollectionActionKind::Move,
            new_items: None,
            new_starting_index: Some(to),
            old_starting_index: Some(from),
        }
    }
}

/// Ordered actions for one observable collection property
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CollectionChanges {
    #[serde(default)]
    pub actions: Vec<CollectionAction>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Controller Change
// ─────────────────────────────────────────────────────────────────────────────

/// Everything that changed on one controller since the last sync
///
/// A batch holds at most one of these per controller, and empty changes are
/// never sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ControllerChange {
    #[ts(type = "number")]
    pub id: ControllerId,
    #[serde(default)]
    pub properties: BTreeMap<String, Value>,
    #[serde(default)]
    pub observable_collections: BTreeMap<String, CollectionChanges>,
}

impl ControllerChange {
    /// Create an empty change for a controller
    pub fn new(id: ControllerId) -> Self {
        Self {
            id,
            properties: BTreeMap::new(),
            observable_collections: BTreeMap::new(),
        }
    }

    /// Whether there is nothing to send
    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
            && self
                .observable_collections
                .values()
                .all(|c| c.actions.is_empty())
    }

    /// Record a full value replace
    ///
    /// Queued collection actions for the same name are dropped: the new value
    /// supersedes them.
    pub fn set_property(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        self.observable_collections.remove(&name);
        self.properties.insert(name, value);
    }

    /// Whether a full value replace is queued for `name`
    pub fn has_property(&self, name: &str) -> bool {
        self.properties.contains_key(name)
    }

    /// Drop queued collection actions for `name`
    pub fn remove_collection(&mut self, name: &str) {
        self.observable_collections.remove(name);
    }

    /// Append collection actions for `name`, preserving order
    pub fn add_collection_actions<I>(&mut self, name: impl Into<String>, actions: I)
    where
        I: IntoIterator<Item = CollectionAction>,
    {
        let mut actions = actions.into_iter().peekable();
        if actions.peek().is_none() {
            return;
        }
        self.observable_collections
            .entry(name.into())
            .or_default()
            .actions
            .extend(actions);
    }

    /// Collection actions queued for `name`
    pub fn collection_actions(&self, name: &str) -> &[CollectionAction] {
        self.observable_collections
            .get(name)
            .map(|c| c.actions.as_slice())
            .unwrap_or(&[])
    }
}

/// Encode a change batch for transport
pub fn encode_batch(batch: &[ControllerChange]) -> Result<String, serde_json::Error> {
    serde_json::to_string(batch)
}

/// Decode a change batch received from the other side
pub fn decode_batch(json: &str) -> Result<Vec<ControllerChange>, serde_json::Error> {
    serde_json::from_str(json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_access_flags() {
        let access = Access::READ | Access::WRITE;
        assert_eq!(access, Access::READ_WRITE);
        assert!(access.contains(Access::READ));
        assert!(Access::WRITE.is_writable());
        assert!(!Access::WRITE.is_readable());
        assert!(Access::NONE.is_empty());
        assert_eq!(Access::from_bits(0xff), Access::READ_WRITE);
        assert_eq!(serde_json::to_value(Access::READ_WRITE).unwrap(), json!(3));
    }

    #[test]
    fn test_naming_convention_apply() {
        assert_eq!(NamingConvention::Normal.apply("Items"), "Items");
        assert_eq!(NamingConvention::CamelCase.apply("Items"), "items");
        let parsed: NamingConvention = serde_json::from_value(json!("camel-case")).unwrap();
        assert_eq!(parsed, NamingConvention::CamelCase);
    }

    #[test]
    fn test_collection_action_wire_shape() {
        let add = serde_json::to_value(CollectionAction::add(vec![json!("x")], 2)).unwrap();
        assert_eq!(add, json!({"action": "Add", "newItems": ["x"], "newStartingIndex": 2}));

        let remove = serde_json::to_value(CollectionAction::remove(1)).unwrap();
        assert_eq!(remove, json!({"action": "Remove", "oldStartingIndex": 1}));

        let parsed: CollectionAction = serde_json::from_value(
            json!({"action": "Move", "oldStartingIndex": 0, "newStartingIndex": 2}),
        )
        .unwrap();
        assert_eq!(parsed, CollectionAction::moved(0, 2));
    }

    #[test]
    fn test_controller_change_replace_supersedes_collection() {
        let mut change = ControllerChange::new(7);
        change.add_collection_actions("items", vec![CollectionAction::remove(0)]);
        assert_eq!(change.collection_actions("items").len(), 1);

        change.set_property("items", json!([1, 2]));
        assert!(change.collection_actions("items").is_empty());
        assert!(change.has_property("items"));
    }

    #[test]
    fn test_controller_change_empty() {
        let mut change = ControllerChange::new(1);
        assert!(change.is_empty());

        change.add_collection_actions("items", Vec::new());
        assert!(change.is_empty());
        assert!(change.observable_collections.is_empty());

        change.set_property("name", json!("a"));
        assert!(!change.is_empty());
    }

    #[test]
    fn test_batch_wire_shape() {
        let mut change = ControllerChange::new(3);
        change.set_property("title", json!("hello"));
        change.add_collection_actions("items", vec![CollectionAction::add(vec![json!(1)], 0)]);

        let json = encode_batch(&[change.clone()]).unwrap();
        let value: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(
            value,
            json!([{
                "id": 3,
                "properties": {"title": "hello"},
                "observableCollections": {
                    "items": {"actions": [{"action": "Add", "newItems": [1], "newStartingIndex": 0}]}
                }
            }])
        );

        let decoded = decode_batch(&json).unwrap();
        assert_eq!(decoded, vec![change]);
    }

    #[test]
    fn test_description_omits_value_for_write_only() {
        let description = ControllerDescription {
            id: 1,
            name: "Settings".to_string(),
            methods: vec![MethodDescription { name: "save".to_string() }],
            properties: vec![PropertyDescription {
                name: "password".to_string(),
                value: None,
                access: Access::WRITE,
            }],
        };

        let value = serde_json::to_value(&description).unwrap();
        assert_eq!(value["properties"][0], json!({"name": "password", "access": 2}));
        assert!(description.has_method("save"));
        assert!(description.property("password").is_some());
    }
}
