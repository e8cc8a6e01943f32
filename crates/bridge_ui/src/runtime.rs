//! The UI-side runtime: controller mirrors bound to a host link.
//!
//! `UiRuntime` is single-threaded by construction (`&mut self` everywhere).
//! The worker in [`crate::spawn`] owns one and drives it from its command
//! loop, running [`UiRuntime::digest`] after every mutating command.

use std::collections::BTreeMap;
use std::sync::Arc;

use bridge_types::{
    CallResult, ControllerChange, ControllerDescription, ControllerId, HostBoundary,
};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::UiError;
use crate::scope::Scope;
use crate::sync;
use crate::tracker::ChangeTracker;

/// Internal round-trip call sent right after a controller is bound
pub const WARM_UP: &str = "warmUp";

/// Options for a UI runtime
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UiOptions {
    /// Call the host's internal warm-up method after creating a controller
    pub warm_up: bool,
}

impl Default for UiOptions {
    fn default() -> Self {
        Self { warm_up: true }
    }
}

/// UI-side copy of one host controller
#[derive(Debug)]
pub struct ControllerMirror {
    id: ControllerId,
    name: String,
    methods: Vec<String>,
    scope: Scope,
    tracker: ChangeTracker,
}

impl ControllerMirror {
    fn from_description(description: ControllerDescription) -> Self {
        let mut scope = Scope::new();
        let mut tracker = ChangeTracker::new(description.id);

        for property in &description.properties {
            scope.set(property.name.as_str(), property.value.clone().unwrap_or(Value::Null));
            tracker.watch(&scope, &property.name);
        }

        Self {
            id: description.id,
            name: description.name,
            methods: description.methods.into_iter().map(|m| m.name).collect(),
            scope,
            tracker,
        }
    }

    pub fn id(&self) -> ControllerId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn methods(&self) -> &[String] {
        &self.methods
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }
}

/// Controller mirrors and the link they sync through
pub struct UiRuntime<L: HostBoundary + ?Sized = dyn HostBoundary> {
    link: Arc<L>,
    options: UiOptions,
    mirrors: BTreeMap<ControllerId, ControllerMirror>,
}

impl<L: HostBoundary + ?Sized> UiRuntime<L> {
    pub fn new(link: Arc<L>, options: UiOptions) -> Self {
        Self {
            link,
            options,
            mirrors: BTreeMap::new(),
        }
    }

    pub fn mirror(&self, id: ControllerId) -> Option<&ControllerMirror> {
        self.mirrors.get(&id)
    }

    pub fn ids(&self) -> impl Iterator<Item = ControllerId> + '_ {
        self.mirrors.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.mirrors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mirrors.is_empty()
    }

    /// Ask the host for a controller and start mirroring it
    pub fn create_controller(&mut self, name: &str) -> Result<ControllerId, UiError> {
        let description = self.link.create_controller(name)?;
        let id = description.id;
        info!("Bound controller {} ({})", id, description.name);

        if self.options.warm_up {
            match self
                .link
                .call_internal_method(id, WARM_UP, vec![Value::String(WARM_UP.to_string())])
            {
                Ok(_) => debug!("Controller {} warmed up", id),
                Err(e) => warn!("Warm-up of controller {} failed: {}", id, e),
            }
        }

        self.mirrors
            .insert(id, ControllerMirror::from_description(description));
        Ok(id)
    }

    /// Stop mirroring a controller and tell the host to drop it
    pub fn destroy_controller(&mut self, id: ControllerId) -> bool {
        let removed = self.mirrors.remove(&id).is_some();
        if removed {
            self.link.destroy_controller(id);
            info!("Released controller {}", id);
        }
        removed
    }

    /// Invoke a host method
    ///
    /// Pending local edits are flushed first so the host acts on the state the
    /// UI shows.
    pub fn call_method(
        &mut self,
        id: ControllerId,
        name: &str,
        args: Vec<Value>,
    ) -> Result<CallResult, UiError> {
        if !self.mirrors.contains_key(&id) {
            return Err(UiError::ControllerNotFound(id));
        }
        self.digest();
        Ok(self.link.call_method(id, name, args)?)
    }

    /// Edit a mirror's scope locally; picked up by the next digest
    pub fn update<R>(
        &mut self,
        id: ControllerId,
        f: impl FnOnce(&mut Scope) -> R,
    ) -> Result<R, UiError> {
        let mirror = self
            .mirrors
            .get_mut(&id)
            .ok_or(UiError::ControllerNotFound(id))?;
        Ok(f(&mut mirror.scope))
    }

    /// Apply a host-originated batch in arrival order
    pub fn apply_changes(&mut self, batch: &[ControllerChange]) {
        for change in batch {
            match self.mirrors.get_mut(&change.id) {
                Some(mirror) => sync::apply_change(&mut mirror.scope, &mut mirror.tracker, change),
                None => warn!("Changes for unknown controller {} dropped", change.id),
            }
        }
    }

    /// Detect local edits on every mirror and send them as one batch
    ///
    /// Returns how many controller changes were sent.
    pub fn digest(&mut self) -> usize {
        let batch: Vec<ControllerChange> = self
            .mirrors
            .values_mut()
            .filter_map(|mirror| {
                mirror.tracker.check(&mirror.scope);
                mirror.tracker.take_changes()
            })
            .collect();

        if batch.is_empty() {
            return 0;
        }
        let sent = batch.len();
        debug!("Sending {} controller changes", sent);
        self.link.sync_controller_changes(batch);
        sent
    }
}
