//! Local change detection for one controller mirror.
//!
//! The tracker remembers the last value (and assignment revision) of every
//! watched property and a shallow copy of every watched collection. Each
//! [`ChangeTracker::check`] compares the scope against those records, queues
//! what changed, and then refreshes the records. Values written by the remote
//! apply step refresh the records directly, so they are never seen as local
//! edits.

use std::collections::BTreeMap;

use bridge_types::{ControllerChange, ControllerId, collection};
use serde_json::Value;
use tracing::debug;

use crate::scope::Scope;

#[derive(Debug, Clone)]
struct PropertyWatch {
    value: Value,
    revision: u64,
}

/// Change detection state for one controller mirror
#[derive(Debug)]
pub struct ChangeTracker {
    id: ControllerId,
    properties: BTreeMap<String, PropertyWatch>,
    collections: BTreeMap<String, Vec<Value>>,
    pending: ControllerChange,
}

impl ChangeTracker {
    pub fn new(id: ControllerId) -> Self {
        Self {
            id,
            properties: BTreeMap::new(),
            collections: BTreeMap::new(),
            pending: ControllerChange::new(id),
        }
    }

    pub fn id(&self) -> ControllerId {
        self.id
    }

    /// Start watching `name` at its current value
    pub fn watch(&mut self, scope: &Scope, name: &str) {
        let value = scope.get(name).cloned().unwrap_or(Value::Null);
        let revision = scope.revision(name).unwrap_or(0);
        self.record_property(name, value, revision);
    }

    /// Stop watching `name` entirely
    pub fn unwatch(&mut self, name: &str) {
        self.properties.remove(name);
        self.collections.remove(name);
        self.pending.properties.remove(name);
        self.pending.remove_collection(name);
    }

    pub fn is_watching(&self, name: &str) -> bool {
        self.properties.contains_key(name)
    }

    pub fn is_watching_collection(&self, name: &str) -> bool {
        self.collections.contains_key(name)
    }

    /// Record a value that is already known to the host
    ///
    /// Used after a remote property write; the next check treats it as
    /// unchanged.
    pub fn record_property(&mut self, name: &str, value: Value, revision: u64) {
        match &value {
            Value::Array(items) => {
                self.collections.insert(name.to_string(), items.clone());
            }
            _ => {
                self.collections.remove(name);
            }
        }
        self.properties
            .insert(name.to_string(), PropertyWatch { value, revision });
    }

    /// Record a collection state that is already known to the host
    pub fn record_collection(&mut self, name: &str, items: &[Value]) {
        self.collections.insert(name.to_string(), items.to_vec());
        if let Some(watch) = self.properties.get_mut(name) {
            watch.value = Value::Array(items.to_vec());
        }
    }

    /// Compare the scope against the last-known records and queue changes
    ///
    /// Properties are checked first. A replaced value queues a full
    /// property change and restarts collection watching as needed. Collections
    /// are checked second; an edited collection queues element actions unless
    /// a full replace for it is already queued.
    pub fn check(&mut self, scope: &Scope) {
        for (name, watch) in self.properties.iter_mut() {
            let (Some(value), Some(revision)) = (scope.get(name), scope.revision(name)) else {
                continue;
            };
            if revision == watch.revision {
                continue;
            }
            watch.revision = revision;
            if *value == watch.value {
                continue;
            }

            debug!("Controller {}: property '{}' replaced", self.id, name);
            watch.value = value.clone();
            self.pending.set_property(name.clone(), value.clone());
            match value {
                Value::Array(items) => {
                    self.collections.insert(name.clone(), items.clone());
                }
                _ => {
                    self.collections.remove(name);
                }
            }
        }

        for (name, last) in self.collections.iter_mut() {
            let Some(Value::Array(current)) = scope.get(name) else {
                continue;
            };
            if current == last {
                continue;
            }
            if !self.pending.has_property(name) {
                let actions = collection::diff(last, current);
                debug!(
                    "Controller {}: collection '{}' changed ({} actions)",
                    self.id,
                    name,
                    actions.len()
                );
                self.pending.add_collection_actions(name.clone(), actions);
            }
            last.clone_from(current);
            if let Some(watch) = self.properties.get_mut(name) {
                watch.value = Value::Array(current.clone());
            }
        }
    }

    /// Whether changes are queued
    pub fn has_changes(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Drain queued changes; `None` when there is nothing to send
    pub fn take_changes(&mut self) -> Option<ControllerChange> {
        if self.pending.is_empty() {
            return None;
        }
        Some(std::mem::replace(
            &mut self.pending,
            ControllerChange::new(self.id),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_types::CollectionAction;
    use serde_json::json;

    fn tracked(values: &[(&str, Value)]) -> (Scope, ChangeTracker) {
        let mut scope = Scope::new();
        let mut tracker = ChangeTracker::new(1);
        for (name, value) in values {
            scope.set(*name, value.clone());
            tracker.watch(&scope, name);
        }
        (scope, tracker)
    }

    #[test]
    fn test_scalar_change_is_queued_once() {
        let (mut scope, mut tracker) = tracked(&[("title", json!("a"))]);

        scope.set("title", json!("b"));
        tracker.check(&scope);
        let change = tracker.take_changes().unwrap();
        assert_eq!(change.properties["title"], json!("b"));

        tracker.check(&scope);
        assert!(tracker.take_changes().is_none());
    }

    #[test]
    fn test_identical_writes_queue_nothing() {
        let (mut scope, mut tracker) = tracked(&[("title", json!("a"))]);

        scope.set("title", json!("a"));
        tracker.check(&scope);
        scope.set("title", json!("a"));
        tracker.check(&scope);
        assert!(tracker.take_changes().is_none());
    }

    #[test]
    fn test_identical_array_writes_queue_nothing() {
        let (mut scope, mut tracker) = tracked(&[("items", json!([1, 2]))]);
        assert!(tracker.is_watching_collection("items"));

        scope.set("items", json!([1, 2]));
        tracker.check(&scope);
        scope.set("items", json!([1, 2]));
        tracker.check(&scope);
        assert!(tracker.take_changes().is_none());

        // Still watched: a later in-place edit is a collection diff
        scope.collection_mut("items").unwrap().push(json!(3));
        tracker.check(&scope);
        let change = tracker.take_changes().unwrap();
        assert!(change.properties.is_empty());
        assert_eq!(
            change.collection_actions("items"),
            &[CollectionAction::add(vec![json!(3)], 2)]
        );
    }

    #[test]
    fn test_collection_edit_queues_actions() {
        let (mut scope, mut tracker) = tracked(&[("items", json!(["a", "b", "c", "d"]))]);
        assert!(tracker.is_watching_collection("items"));

        scope
            .collection_mut("items")
            .unwrap()
            .insert(2, json!("X"));
        tracker.check(&scope);

        let change = tracker.take_changes().unwrap();
        assert!(change.properties.is_empty());
        assert_eq!(
            change.collection_actions("items"),
            &[CollectionAction::add(vec![json!("X")], 2)]
        );
    }

    #[test]
    fn test_replace_supersedes_collection_actions() {
        let (mut scope, mut tracker) = tracked(&[("items", json!([1, 2]))]);

        scope.collection_mut("items").unwrap().push(json!(3));
        tracker.check(&scope);
        scope.set("items", json!([9]));
        tracker.check(&scope);

        let change = tracker.take_changes().unwrap();
        assert_eq!(change.properties["items"], json!([9]));
        assert!(change.collection_actions("items").is_empty());
    }

    #[test]
    fn test_collection_replaced_by_scalar_stops_watching() {
        let (mut scope, mut tracker) = tracked(&[("items", json!([1]))]);

        scope.set("items", json!("none"));
        tracker.check(&scope);
        assert!(!tracker.is_watching_collection("items"));

        scope.set("items", json!([]));
        tracker.check(&scope);
        assert!(tracker.is_watching_collection("items"));

        let change = tracker.take_changes().unwrap();
        assert_eq!(change.properties["items"], json!([]));
    }

    #[test]
    fn test_recorded_values_are_not_echoed() {
        let (mut scope, mut tracker) = tracked(&[("title", json!("a")), ("items", json!([]))]);

        let revision = scope.set("title", json!("from host"));
        tracker.record_property("title", json!("from host"), revision);

        scope.ensure_collection("items").push(json!(1));
        tracker.record_collection("items", &[json!(1)]);

        tracker.check(&scope);
        assert!(!tracker.has_changes());
    }

    #[test]
    fn test_unwatched_slots_are_ignored() {
        let (mut scope, mut tracker) = tracked(&[("title", json!("a"))]);
        scope.set("local", json!(1));
        tracker.check(&scope);
        assert!(tracker.take_changes().is_none());

        tracker.unwatch("title");
        scope.set("title", json!("b"));
        tracker.check(&scope);
        assert!(tracker.take_changes().is_none());
    }
}
