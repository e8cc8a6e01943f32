//! Local mirror of a controller's properties.
//!
//! Each slot holds a JSON value and the revision of its last assignment.
//! Assigning a slot always takes a fresh revision; mutating an array in place
//! through [`Scope::collection_mut`] does not. The tracker relies on this to
//! tell a replaced collection from an edited one.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

#[derive(Debug, Clone)]
struct Slot {
    value: Value,
    revision: u64,
}

/// Named JSON slots with assignment revisions
#[derive(Debug, Clone, Default)]
pub struct Scope {
    slots: BTreeMap<String, Slot>,
    next_revision: u64,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    fn stamp(&mut self) -> u64 {
        self.next_revision += 1;
        self.next_revision
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.slots.get(name).map(|slot| &slot.value)
    }

    /// Revision of the last assignment to `name`
    pub fn revision(&self, name: &str) -> Option<u64> {
        self.slots.get(name).map(|slot| slot.revision)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.slots.contains_key(name)
    }

    /// Assign a value, replacing whatever the slot held
    pub fn set(&mut self, name: impl Into<String>, value: Value) -> u64 {
        let revision = self.stamp();
        self.slots.insert(name.into(), Slot { value, revision });
        revision
    }

    /// Edit an array slot in place; `None` when the slot is not an array
    pub fn collection_mut(&mut self, name: &str) -> Option<&mut Vec<Value>> {
        match self.slots.get_mut(name) {
            Some(Slot {
                value: Value::Array(items),
                ..
            }) => Some(items),
            _ => None,
        }
    }

    /// The array in `name`, assigning an empty one first if needed
    pub fn ensure_collection(&mut self, name: &str) -> &mut Vec<Value> {
        if !matches!(self.get(name), Some(Value::Array(_))) {
            self.set(name, Value::Array(Vec::new()));
        }
        match self.slots.get_mut(name) {
            Some(Slot {
                value: Value::Array(items),
                ..
            }) => items,
            _ => unreachable!("slot was just assigned an array"),
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.slots.remove(name).map(|slot| slot.value)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.slots.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Plain JSON object of every slot
    pub fn to_object(&self) -> Value {
        let map: Map<String, Value> = self
            .slots
            .iter()
            .map(|(name, slot)| (name.clone(), slot.value.clone()))
            .collect();
        Value::Object(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_assignment_takes_new_revision() {
        let mut scope = Scope::new();
        let first = scope.set("title", json!("a"));
        let second = scope.set("title", json!("a"));
        assert!(second > first);
        assert_eq!(scope.revision("title"), Some(second));
    }

    #[test]
    fn test_in_place_edit_keeps_revision() {
        let mut scope = Scope::new();
        let revision = scope.set("items", json!([1]));
        scope.collection_mut("items").unwrap().push(json!(2));

        assert_eq!(scope.get("items"), Some(&json!([1, 2])));
        assert_eq!(scope.revision("items"), Some(revision));

        scope.set("title", json!("x"));
        assert!(scope.collection_mut("title").is_none());
    }

    #[test]
    fn test_ensure_collection() {
        let mut scope = Scope::new();
        scope.ensure_collection("items").push(json!("a"));
        let revision = scope.revision("items");
        scope.ensure_collection("items").push(json!("b"));

        assert_eq!(scope.get("items"), Some(&json!(["a", "b"])));
        assert_eq!(scope.revision("items"), revision);

        scope.set("items", json!(null));
        assert!(scope.ensure_collection("items").is_empty());
        assert_eq!(scope.to_object(), json!({"items": []}));
    }
}
