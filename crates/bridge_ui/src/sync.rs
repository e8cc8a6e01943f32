//! Applying host-originated change batches to a mirror.

use bridge_types::{ControllerChange, collection, naming};
use tracing::{debug, warn};

use crate::scope::Scope;
use crate::tracker::ChangeTracker;

/// Map a name sent by the host onto the mirror's slot name
///
/// Slots are named after the description, so the exact name wins; otherwise
/// the camelCase form is used.
pub fn resolve_name(scope: &Scope, name: &str) -> String {
    if scope.contains(name) {
        name.to_string()
    } else {
        naming::to_camel(name)
    }
}

/// Apply one controller's changes to its scope
///
/// Scalar properties are written first, then collection actions are replayed
/// in order. Every applied value is recorded in the tracker so the next check
/// does not send it back. A collection whose actions fail to apply keeps the
/// state reached before the failing action.
pub fn apply_change(scope: &mut Scope, tracker: &mut ChangeTracker, change: &ControllerChange) {
    for (name, value) in &change.properties {
        let name = resolve_name(scope, name);
        let revision = scope.set(name.as_str(), value.clone());
        tracker.record_property(&name, value.clone(), revision);
        debug!("Controller {}: applied property '{}'", change.id, name);
    }

    for (name, changes) in &change.observable_collections {
        let name = resolve_name(scope, name);
        let created = !matches!(scope.get(&name), Some(serde_json::Value::Array(_)));
        let items = scope.ensure_collection(&name);

        if let Err(e) = collection::apply_values(items, &changes.actions) {
            warn!(
                "Controller {}: collection '{}' patch stopped: {}",
                change.id, name, e
            );
        }

        let items = items.clone();
        if created || !tracker.is_watching(&name) {
            let revision = scope.revision(&name).unwrap_or(0);
            tracker.record_property(&name, serde_json::Value::Array(items), revision);
        } else {
            tracker.record_collection(&name, &items);
        }
    }
}
