//! Controller type registration and the per-type metadata cache.
//!
//! A controller type describes its callable surface once, through
//! [`ControllerType::register`]. The resulting [`TypeInfo`] is built the first
//! time the type is needed and shared by every instance afterwards.

use std::any::{Any, TypeId};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use bridge_types::naming;
use dashmap::DashMap;
use tracing::{debug, warn};

use crate::internal::internal_methods;
use crate::method::{IntoMethod, Method};
use crate::property::{PropertyMeta, PropertyType};

// ─────────────────────────────────────────────────────────────────────────────
// Controller Type
// ─────────────────────────────────────────────────────────────────────────────

/// A host type that can be bound to the UI
///
/// Usually implemented with the `#[controller]` attribute rather than by hand.
pub trait ControllerType: Any + Send + Sized {
    /// Name the UI uses to create the controller
    fn controller_name() -> &'static str;

    /// Declare methods and properties
    fn register(builder: &mut TypeBuilder<Self>);
}

/// Reason a declared member is left off the callable surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Exclusion {
    /// Takes a parameter by shared reference
    ByRef,
    /// Takes a parameter by mutable reference (an output parameter)
    Out,
    /// Has type parameters or `impl Trait` arguments
    Generic,
    /// Is an `async fn`
    Async,
    /// Consumes `self`
    Consuming,
    /// Returns a borrow of the instance
    BorrowedReturn,
    /// Shares its name with another method
    Overloaded,
}

impl fmt::Display for Exclusion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Exclusion::ByRef => write!(f, "has a by-reference parameter"),
            Exclusion::Out => write!(f, "has an output parameter"),
            Exclusion::Generic => write!(f, "is generic"),
            Exclusion::Async => write!(f, "is async"),
            Exclusion::Consuming => write!(f, "consumes the controller"),
            Exclusion::BorrowedReturn => write!(f, "returns a borrow"),
            Exclusion::Overloaded => write!(f, "is overloaded"),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Type Builder
// ─────────────────────────────────────────────────────────────────────────────

enum Candidate {
    Method(Method),
    Excluded { name: String, reason: Exclusion },
}

impl Candidate {
    fn name(&self) -> &str {
        match self {
            Candidate::Method(method) => method.name(),
            Candidate::Excluded { name, .. } => name,
        }
    }
}

/// Collects the members of one controller type during registration
pub struct TypeBuilder<C> {
    candidates: Vec<Candidate>,
    denied: HashSet<String>,
    properties: Vec<PropertyMeta>,
    _controller: PhantomData<fn() -> C>,
}

impl<C: Any + Send> TypeBuilder<C> {
    fn new() -> Self {
        Self {
            candidates: Vec::new(),
            denied: HashSet::new(),
            properties: Vec::new(),
            _controller: PhantomData,
        }
    }

    /// Register a callable method
    pub fn method<Args, M>(&mut self, name: impl Into<String>, method: M) -> &mut Self
    where
        M: IntoMethod<C, Args>,
    {
        self.candidates
            .push(Candidate::Method(method.into_method(name.into())));
        self
    }

    /// Record a declared method whose shape cannot be called over the wire
    pub fn exclude(&mut self, name: impl Into<String>, reason: Exclusion) -> &mut Self {
        self.candidates.push(Candidate::Excluded {
            name: name.into(),
            reason,
        });
        self
    }

    /// Keep a member off the surface regardless of how it was registered
    pub fn deny(&mut self, name: impl Into<String>) -> &mut Self {
        self.denied.insert(name.into());
        self
    }

    /// Register a read-write property
    pub fn property<T, G, S>(&mut self, name: impl Into<String>, get: G, set: S) -> &mut Self
    where
        T: PropertyType,
        G: Fn(&C) -> T + Send + Sync + 'static,
        S: Fn(&mut C, T) + Send + Sync + 'static,
    {
        self.properties
            .push(PropertyMeta::scalar::<C, T>(name.into(), Some(get), Some(set)));
        self
    }

    /// Register a read-only property
    pub fn read_property<T, G>(&mut self, name: impl Into<String>, get: G) -> &mut Self
    where
        T: PropertyType,
        G: Fn(&C) -> T + Send + Sync + 'static,
    {
        self.properties.push(PropertyMeta::scalar::<C, T>(
            name.into(),
            Some(get),
            None::<fn(&mut C, T)>,
        ));
        self
    }

    /// Register a write-only property
    pub fn write_property<T, S>(&mut self, name: impl Into<String>, set: S) -> &mut Self
    where
        T: PropertyType,
        S: Fn(&mut C, T) + Send + Sync + 'static,
    {
        self.properties.push(PropertyMeta::scalar::<C, T>(
            name.into(),
            None::<fn(&C) -> T>,
            Some(set),
        ));
        self
    }

    /// Register an observable collection
    pub fn collection<T, G, M>(&mut self, name: impl Into<String>, get: G, get_mut: M) -> &mut Self
    where
        T: PropertyType,
        G: Fn(&C) -> &Vec<T> + Send + Sync + 'static,
        M: Fn(&mut C) -> &mut Vec<T> + Send + Sync + 'static,
    {
        self.properties
            .push(PropertyMeta::collection::<C, T>(name.into(), get, get_mut));
        self
    }

    fn is_denied(&self, name: &str) -> bool {
        self.denied.contains(name) || self.denied.contains(&naming::to_pascal(name))
    }

    fn build(self, controller_name: &'static str) -> TypeInfo {
        let mut warnings = Vec::new();
        let mut warn_member = |message: String| {
            warn!("{}: {}", controller_name, message);
            warnings.push(message);
        };

        // Count every declared name first so a collision drops all candidates.
        // Names are folded the way dispatch resolves them.
        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for candidate in &self.candidates {
            *counts.entry(naming::to_pascal(candidate.name())).or_default() += 1;
        }

        let mut methods = BTreeMap::new();
        for candidate in self.candidates.iter() {
            let name = candidate.name();
            if self.is_denied(name) {
                debug!("{}: method '{}' denied", controller_name, name);
                continue;
            }
            if counts.get(&naming::to_pascal(name)).copied().unwrap_or(0) > 1 {
                warn_member(format!("Method '{}' {}; excluded", name, Exclusion::Overloaded));
                continue;
            }
            match candidate {
                Candidate::Method(method) => {
                    methods.insert(name.to_string(), method.clone());
                }
                Candidate::Excluded { reason, .. } => {
                    warn_member(format!("Method '{}' {}; excluded", name, reason));
                }
            }
        }

        let mut properties: Vec<PropertyMeta> = Vec::new();
        for property in self.properties {
            let name = property.name();
            if self.denied.contains(name) || self.denied.contains(&naming::to_pascal(name)) {
                debug!("{}: property '{}' denied", controller_name, name);
                continue;
            }
            if naming::to_pascal(name) == "Id" {
                warn_member(format!("Property '{}' collides with the controller id; excluded", name));
                continue;
            }
            if properties.iter().any(|p| p.name() == name) {
                warn_member(format!("Property '{}' is declared twice; keeping the first", name));
                continue;
            }
            properties.push(property);
        }

        TypeInfo {
            name: controller_name,
            type_id: TypeId::of::<C>(),
            methods,
            internal_methods: internal_methods(),
            properties,
            warnings,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Type Info
// ─────────────────────────────────────────────────────────────────────────────

/// Cached callable surface of one controller type
#[derive(Debug)]
pub struct TypeInfo {
    name: &'static str,
    type_id: TypeId,
    methods: BTreeMap<String, Method>,
    internal_methods: BTreeMap<String, Method>,
    properties: Vec<PropertyMeta>,
    warnings: Vec<String>,
}

impl TypeInfo {
    /// Build the type info for `C` without caching it
    pub fn build<C: ControllerType>() -> Self {
        let mut builder = TypeBuilder::<C>::new();
        C::register(&mut builder);
        builder.build(C::controller_name())
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// User-visible methods keyed by declared name
    pub fn methods(&self) -> &BTreeMap<String, Method> {
        &self.methods
    }

    /// Framework-internal methods keyed by name
    pub fn internal_methods(&self) -> &BTreeMap<String, Method> {
        &self.internal_methods
    }

    pub fn properties(&self) -> &[PropertyMeta] {
        &self.properties
    }

    /// Find a property by declared name
    pub fn property(&self, name: &str) -> Option<&PropertyMeta> {
        self.properties.iter().find(|p| p.name() == name)
    }

    /// Members excluded during registration, one message each
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Type Registry
// ─────────────────────────────────────────────────────────────────────────────

/// Process-wide cache of [`TypeInfo`] keyed by type identity
///
/// Concurrent first use of a type blocks all but one caller until the build
/// finishes; every caller then observes the same `Arc<TypeInfo>`.
pub struct TypeRegistry {
    entries: DashMap<TypeId, Arc<OnceLock<Arc<TypeInfo>>>>,
    builds: AtomicUsize,
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeRegistry {
    /// Create an isolated registry
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            builds: AtomicUsize::new(0),
        }
    }

    /// The registry shared by the whole process
    pub fn global() -> Arc<TypeRegistry> {
        static GLOBAL: OnceLock<Arc<TypeRegistry>> = OnceLock::new();
        GLOBAL.get_or_init(|| Arc::new(TypeRegistry::new())).clone()
    }

    /// Get the type info for `C`, building it on first use
    pub fn ensure_registered<C: ControllerType>(&self) -> Arc<TypeInfo> {
        // The map entry is released before building so other types never wait
        let cell = self
            .entries
            .entry(TypeId::of::<C>())
            .or_insert_with(|| Arc::new(OnceLock::new()))
            .value()
            .clone();

        cell.get_or_init(|| {
            self.builds.fetch_add(1, Ordering::SeqCst);
            let info = TypeInfo::build::<C>();
            debug!(
                "Registered controller type {} ({} methods, {} properties)",
                info.name(),
                info.methods().len(),
                info.properties().len()
            );
            Arc::new(info)
        })
        .clone()
    }

    /// Cached type info, if the type was registered
    pub fn get(&self, type_id: TypeId) -> Option<Arc<TypeInfo>> {
        self.entries
            .get(&type_id)
            .and_then(|cell| cell.value().get().cloned())
    }

    /// Number of type infos built so far
    pub fn build_count(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[derive(Default)]
    struct Greeter {
        name: String,
        id: u64,
    }

    impl ControllerType for Greeter {
        fn controller_name() -> &'static str {
            "Greeter"
        }

        fn register(builder: &mut TypeBuilder<Self>) {
            builder
                .method("GetName", |this: &mut Self| this.name.clone())
                .method("Foo", |_: &mut Self| {})
                .method("Foo", |_: &mut Self, _: i32| {})
                .method("Hidden", |_: &mut Self| {})
                .exclude("Swap", Exclusion::Out)
                .deny("Hidden")
                .property("Name", |this: &Self| this.name.clone(), |this: &mut Self, v| this.name = v)
                .read_property("Id", |this: &Self| this.id)
                .read_property("Name", |this: &Self| this.name.len());
        }
    }

    #[test]
    fn test_overloads_are_fully_excluded() {
        let info = TypeInfo::build::<Greeter>();
        assert!(info.methods().contains_key("GetName"));
        assert!(!info.methods().contains_key("Foo"));

        let overload_warnings = info
            .warnings()
            .iter()
            .filter(|w| w.contains("'Foo'"))
            .count();
        assert_eq!(overload_warnings, 2);
    }

    struct Shouter;

    impl ControllerType for Shouter {
        fn controller_name() -> &'static str {
            "Shouter"
        }

        fn register(builder: &mut TypeBuilder<Self>) {
            builder
                .method("getName", |_: &mut Self| "lower".to_string())
                .method("GetName", |_: &mut Self| "upper".to_string())
                .method("shout", |_: &mut Self| {});
        }
    }

    #[test]
    fn test_case_variants_count_as_overloads() {
        let info = TypeInfo::build::<Shouter>();
        assert!(!info.methods().contains_key("getName"));
        assert!(!info.methods().contains_key("GetName"));
        assert!(info.methods().contains_key("shout"));

        let overload_warnings = info
            .warnings()
            .iter()
            .filter(|w| w.contains("etName'"))
            .count();
        assert_eq!(overload_warnings, 2);
    }

    #[test]
    fn test_shape_exclusions_and_denials() {
        let info = TypeInfo::build::<Greeter>();
        assert!(!info.methods().contains_key("Swap"));
        assert!(info.warnings().iter().any(|w| w.contains("output parameter")));

        // Denied members are dropped silently
        assert!(!info.methods().contains_key("Hidden"));
        assert!(!info.warnings().iter().any(|w| w.contains("Hidden")));
    }

    #[test]
    fn test_id_and_duplicate_properties() {
        let info = TypeInfo::build::<Greeter>();
        assert!(info.property("Id").is_none());
        assert_eq!(info.properties().len(), 1);
        assert_eq!(info.property("Name").unwrap().type_name(), "String");
    }

    #[test]
    fn test_internal_table_is_separate() {
        let info = TypeInfo::build::<Greeter>();
        assert!(info.internal_methods().contains_key("WarmUp"));
        assert!(!info.methods().contains_key("WarmUp"));
    }

    #[test]
    fn test_registration_is_cached() {
        let registry = TypeRegistry::new();
        let first = registry.ensure_registered::<Greeter>();
        let second = registry.ensure_registered::<Greeter>();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.build_count(), 1);
        assert_eq!(
            first.methods().keys().collect::<Vec<_>>(),
            second.methods().keys().collect::<Vec<_>>()
        );
        assert!(registry.get(TypeId::of::<Greeter>()).is_some());
    }

    #[test]
    fn test_concurrent_first_use_builds_once() {
        let registry = Arc::new(TypeRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = registry.clone();
                thread::spawn(move || registry.ensure_registered::<Greeter>())
            })
            .collect();

        let infos: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(registry.build_count(), 1);
        assert!(infos.iter().all(|info| Arc::ptr_eq(info, &infos[0])));
    }
}
