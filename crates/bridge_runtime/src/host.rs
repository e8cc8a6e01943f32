//! Live controllers and the host-side façade the UI talks to.
//!
//! [`ControllerHost`] owns every controller instance, allocates ids, routes
//! boundary calls to the dispatcher and accessor, and keeps the outbound queue
//! of host-originated changes waiting to be pushed to the UI.

use std::any::Any;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use bridge_types::{
    CallResult, CollectionAction, ControllerChange, ControllerDescription, ControllerId,
    HostBoundary, MethodDescription, NamingConvention, RemoteError, collection, naming,
};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use crate::accessor;
use crate::dispatcher;
use crate::error::HostError;
use crate::property::PropertyValue;
use crate::registry::{ControllerType, TypeInfo, TypeRegistry};

// ─────────────────────────────────────────────────────────────────────────────
// Controller
// ─────────────────────────────────────────────────────────────────────────────

/// One live controller instance
///
/// The instance mutex serializes method dispatch and property access.
pub struct Controller {
    id: ControllerId,
    type_info: Arc<TypeInfo>,
    instance: Mutex<Box<dyn Any + Send>>,
}

impl Controller {
    pub fn id(&self) -> ControllerId {
        self.id
    }

    /// Controller type name
    pub fn name(&self) -> &'static str {
        self.type_info.name()
    }

    pub fn type_info(&self) -> &Arc<TypeInfo> {
        &self.type_info
    }

    /// Run `f` with exclusive access to the instance
    pub fn with_instance<R>(&self, f: impl FnOnce(&mut dyn Any) -> R) -> R {
        let mut instance = self.instance.lock();
        f(instance.as_mut())
    }

    /// Snapshot for the UI; built fresh on every call
    pub fn describe(&self, naming: NamingConvention) -> ControllerDescription {
        let instance = self.instance.lock();
        ControllerDescription {
            id: self.id,
            name: self.name().to_string(),
            methods: self
                .type_info
                .methods()
                .keys()
                .map(|name| MethodDescription {
                    name: naming.apply(name),
                })
                .collect(),
            properties: accessor::get_properties(&self.type_info, instance.as_ref(), None, naming),
        }
    }

    /// Readable values keyed by declared name
    fn snapshot(&self, instance: &dyn Any) -> BTreeMap<String, Value> {
        self.type_info
            .properties()
            .iter()
            .filter_map(|p| p.read(instance).map(|value| (p.name().to_string(), value)))
            .collect()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Controller Host
// ─────────────────────────────────────────────────────────────────────────────

type Factory = Arc<dyn Fn(&TypeRegistry) -> (Arc<TypeInfo>, Box<dyn Any + Send>) + Send + Sync>;

/// Host-side owner of every controller bound to the UI
pub struct ControllerHost {
    registry: Arc<TypeRegistry>,
    naming: NamingConvention,
    factories: DashMap<String, Factory>,
    controllers: DashMap<ControllerId, Arc<Controller>>,
    next_id: AtomicU64,
    outbound: Mutex<Vec<ControllerChange>>,
    outbound_ready: Notify,
}

impl ControllerHost {
    /// Create a host backed by the process-wide type registry
    pub fn new(naming: NamingConvention) -> Self {
        Self::with_registry(naming, TypeRegistry::global())
    }

    pub fn with_registry(naming: NamingConvention, registry: Arc<TypeRegistry>) -> Self {
        Self {
            registry,
            naming,
            factories: DashMap::new(),
            controllers: DashMap::new(),
            next_id: AtomicU64::new(1),
            outbound: Mutex::new(Vec::new()),
            outbound_ready: Notify::new(),
        }
    }

    pub fn naming(&self) -> NamingConvention {
        self.naming
    }

    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    /// Make `C` creatable by name from the UI
    pub fn register<C: ControllerType>(&self, factory: impl Fn() -> C + Send + Sync + 'static) {
        let name = C::controller_name();
        let factory: Factory = Arc::new(move |registry: &TypeRegistry| {
            let instance: Box<dyn Any + Send> = Box::new(factory());
            (registry.ensure_registered::<C>(), instance)
        });
        if self.factories.insert(name.to_string(), factory).is_some() {
            warn!("Controller type '{}' registered twice; the last factory wins", name);
        }
        debug!("Controller type '{}' is now creatable", name);
    }

    /// Register a controller type built with `Default`
    pub fn register_default<C: ControllerType + Default>(&self) {
        self.register(C::default);
    }

    /// Names of every creatable controller type
    pub fn controller_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    fn allocate(&self, type_info: Arc<TypeInfo>, instance: Box<dyn Any + Send>) -> Arc<Controller> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let controller = Arc::new(Controller {
            id,
            type_info,
            instance: Mutex::new(instance),
        });
        self.controllers.insert(id, controller.clone());
        info!("Controller {} ({}) created", id, controller.name());
        controller
    }

    /// Adopt an instance the host created itself
    pub fn insert<C: ControllerType>(&self, instance: C) -> Arc<Controller> {
        let type_info = self.registry.ensure_registered::<C>();
        self.allocate(type_info, Box::new(instance))
    }

    pub fn controller(&self, id: ControllerId) -> Result<Arc<Controller>, HostError> {
        self.controllers
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or(HostError::ControllerNotFound(id))
    }

    /// Number of live controllers
    pub fn len(&self) -> usize {
        self.controllers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.controllers.is_empty()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Boundary operations
    // ─────────────────────────────────────────────────────────────────────

    /// Instantiate a registered controller type and describe it
    pub fn create_controller(&self, name: &str) -> Result<ControllerDescription, HostError> {
        let factory = self
            .factories
            .get(name)
            .or_else(|| self.factories.get(&naming::to_pascal(name)))
            .map(|entry| entry.value().clone())
            .ok_or_else(|| HostError::UnknownController(name.to_string()))?;

        let (type_info, instance) = factory(&self.registry);
        let controller = self.allocate(type_info, instance);
        Ok(controller.describe(self.naming))
    }

    /// Invoke a user-visible method
    ///
    /// Property changes the method makes are queued for the UI.
    pub fn call_method(
        &self,
        id: ControllerId,
        name: &str,
        args: &[Value],
    ) -> Result<CallResult, HostError> {
        let controller = self.controller(id)?;
        let (result, before, after) = controller.with_instance(|instance| {
            let before = controller.snapshot(instance);
            let result =
                dispatcher::call_method(controller.type_info(), instance, name, args, false)?;
            let after = controller.snapshot(instance);
            Ok::<_, HostError>((result, before, after))
        })?;

        self.queue_differences(id, controller.type_info(), &before, &after);
        Ok(result)
    }

    /// Invoke a framework-internal method
    pub fn call_internal_method(
        &self,
        id: ControllerId,
        name: &str,
        args: &[Value],
    ) -> Result<CallResult, HostError> {
        let controller = self.controller(id)?;
        let result = controller.with_instance(|instance| {
            dispatcher::call_method(controller.type_info(), instance, name, args, true)
        })?;
        Ok(result)
    }

    /// Invoke a framework-internal method on the blocking pool
    pub async fn call_internal_method_async(
        self: &Arc<Self>,
        id: ControllerId,
        name: String,
        args: Vec<Value>,
    ) -> Result<CallResult, HostError> {
        let host = self.clone();
        tokio::task::spawn_blocking(move || host.call_internal_method(id, &name, &args))
            .await
            .map_err(|e| HostError::TaskFailed(e.to_string()))?
    }

    /// Drop a controller the UI no longer uses
    pub fn destroy_controller(&self, id: ControllerId) -> bool {
        let removed = self.controllers.remove(&id).is_some();
        if removed {
            self.outbound.lock().retain(|change| change.id != id);
            info!("Controller {} destroyed", id);
        } else {
            debug!("Destroy of unknown controller {} ignored", id);
        }
        removed
    }

    /// Apply a batch of UI-originated changes
    ///
    /// Per controller, scalar properties go first and collections second.
    /// Failures are logged per entry; the rest of the batch still applies.
    /// Applied values are not echoed back through the outbound queue.
    pub fn sync_controller_changes(&self, batch: &[ControllerChange]) {
        for change in batch {
            let controller = match self.controller(change.id) {
                Ok(controller) => controller,
                Err(e) => {
                    warn!("Sync skipped: {}", e);
                    continue;
                }
            };
            let type_info = controller.type_info().clone();

            controller.with_instance(|instance| {
                for (name, value) in &change.properties {
                    if !accessor::write_wire(&type_info, instance, name, value, self.naming) {
                        warn!(
                            "Sync of {}.{} rejected: no writable property accepts {}",
                            type_info.name(),
                            name,
                            value
                        );
                    }
                }

                for (name, changes) in &change.observable_collections {
                    match accessor::apply_collection(
                        &type_info,
                        instance,
                        name,
                        &changes.actions,
                        self.naming,
                    ) {
                        Ok(true) => {}
                        Ok(false) => {
                            warn!("Sync of {}.{} skipped: not a collection", type_info.name(), name)
                        }
                        Err(e) => warn!("Sync of {}.{} stopped: {}", type_info.name(), name, e),
                    }
                }
            });
            debug!("Applied UI changes to controller {}", change.id);
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Host operations
    // ─────────────────────────────────────────────────────────────────────

    /// Describe a live controller
    pub fn get_description(&self, id: ControllerId) -> Result<ControllerDescription, HostError> {
        Ok(self.controller(id)?.describe(self.naming))
    }

    /// Host-side property write with exact type matching
    ///
    /// A successful write that changes a readable value is queued for the UI.
    pub fn try_set_property(
        &self,
        id: ControllerId,
        name: &str,
        value: PropertyValue,
    ) -> Result<bool, HostError> {
        let controller = self.controller(id)?;
        let type_info = controller.type_info().clone();

        let (written, change) = controller.with_instance(|instance| {
            let property = accessor::find_property(&type_info, name, self.naming);
            let before = property.and_then(|p| p.read(instance));
            let written = accessor::try_set_property(&type_info, instance, name, value, self.naming)?;
            let change = match property {
                Some(p) if written => {
                    let after = p.read(instance);
                    (after != before)
                        .then_some(after)
                        .flatten()
                        .map(|value| (p.name().to_string(), value))
                }
                _ => None,
            };
            Ok::<_, HostError>((written, change))
        })?;

        if let Some((name, value)) = change {
            self.queue_property(id, &name, value);
        }
        Ok(written)
    }

    /// Mutate a controller directly and queue whatever changed
    ///
    /// Every readable property is compared before and after `f`. Changed
    /// collections are queued as element actions, other changes as values.
    pub fn mutate<C, R>(&self, id: ControllerId, f: impl FnOnce(&mut C) -> R) -> Result<R, HostError>
    where
        C: ControllerType,
    {
        let controller = self.controller(id)?;

        let (result, before, after) = controller.with_instance(|instance| {
            let before = controller.snapshot(instance);
            let this = instance
                .downcast_mut::<C>()
                .ok_or(HostError::WrongType {
                    id,
                    expected: C::controller_name(),
                })?;
            let result = f(this);
            let after = controller.snapshot(instance);
            Ok::<_, HostError>((result, before, after))
        })?;

        self.queue_differences(id, controller.type_info(), &before, &after);
        Ok(result)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Outbound queue
    // ─────────────────────────────────────────────────────────────────────

    /// Queue every readable property that differs between two snapshots
    fn queue_differences(
        &self,
        id: ControllerId,
        type_info: &TypeInfo,
        before: &BTreeMap<String, Value>,
        after: &BTreeMap<String, Value>,
    ) {
        for property in type_info.properties() {
            let name = property.name();
            let (Some(old), Some(new)) = (before.get(name), after.get(name)) else {
                continue;
            };
            if old == new {
                continue;
            }
            match (property.is_collection(), old, new) {
                (true, Value::Array(old_items), Value::Array(new_items)) => {
                    let actions = collection::diff(old_items, new_items);
                    self.queue_collection(id, name, actions, new.clone());
                }
                _ => self.queue_property(id, name, new.clone()),
            }
        }
    }

    fn with_outbound_change(&self, id: ControllerId, f: impl FnOnce(&mut ControllerChange)) {
        {
            let mut outbound = self.outbound.lock();
            let index = match outbound.iter().position(|c| c.id == id) {
                Some(index) => index,
                None => {
                    outbound.push(ControllerChange::new(id));
                    outbound.len() - 1
                }
            };
            f(&mut outbound[index]);
            if outbound[index].is_empty() {
                outbound.remove(index);
            }
        }
        self.outbound_ready.notify_one();
    }

    fn queue_property(&self, id: ControllerId, name: &str, value: Value) {
        let wire_name = self.naming.apply(name);
        self.with_outbound_change(id, |change| change.set_property(wire_name, value));
    }

    fn queue_collection(
        &self,
        id: ControllerId,
        name: &str,
        actions: Vec<CollectionAction>,
        current: Value,
    ) {
        let wire_name = self.naming.apply(name);
        self.with_outbound_change(id, |change| {
            // A queued full replace absorbs later element changes
            if change.has_property(&wire_name) {
                change.set_property(wire_name, current);
            } else {
                change.add_collection_actions(wire_name, actions);
            }
        });
    }

    /// Drain host-originated changes; empty when there is nothing to send
    pub fn take_changes(&self) -> Vec<ControllerChange> {
        std::mem::take(&mut *self.outbound.lock())
    }

    /// Wait until host-originated changes are queued
    pub async fn changes_ready(&self) {
        loop {
            let notified = self.outbound_ready.notified();
            if !self.outbound.lock().is_empty() {
                return;
            }
            notified.await;
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// HostBoundary
// ─────────────────────────────────────────────────────────────────────────────

impl HostBoundary for ControllerHost {
    fn create_controller(&self, name: &str) -> Result<ControllerDescription, RemoteError> {
        ControllerHost::create_controller(self, name).map_err(RemoteError::from)
    }

    fn call_method(
        &self,
        id: ControllerId,
        name: &str,
        args: Vec<Value>,
    ) -> Result<CallResult, RemoteError> {
        ControllerHost::call_method(self, id, name, &args).map_err(RemoteError::from)
    }

    fn call_internal_method(
        &self,
        id: ControllerId,
        name: &str,
        args: Vec<Value>,
    ) -> Result<CallResult, RemoteError> {
        ControllerHost::call_internal_method(self, id, name, &args).map_err(RemoteError::from)
    }

    fn destroy_controller(&self, id: ControllerId) {
        ControllerHost::destroy_controller(self, id);
    }

    fn sync_controller_changes(&self, batch: Vec<ControllerChange>) {
        ControllerHost::sync_controller_changes(self, &batch);
    }
}
