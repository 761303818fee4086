//! # The Container: host for a registration plan
//!
//! Stores a frozen [`RegistrationPlan`] and instantiates services from it,
//! honoring each descriptor's lifetime.
//!
//! # Architecture
//! ```text
//! MetadataIndex ──autowire──> ContainerBuilder ──build()──> Container
//!                                                             │
//!                                                       create_scope()
//!                                                             │
//!                                                             ▼
//!                                                       ScopedContainer
//! ```
//!
//! # Examples
//! ```rust
//! use rabt_container::prelude::*;
//! use std::sync::Arc;
//!
//! trait Logger: Send + Sync {
//!     fn log(&self, msg: &str);
//! }
//!
//! struct ConsoleLogger;
//! impl Logger for ConsoleLogger {
//!     fn log(&self, msg: &str) { println!("{msg}"); }
//! }
//!
//! let index = MetadataIndex::builder()
//!     .component(
//!         Component::new(|_| Ok(ConsoleLogger))
//!             .implements::<dyn Logger>(|it| it as Arc<dyn Logger>)
//!             .service::<dyn Logger>(LifetimeKind::Singleton),
//!     )
//!     .build();
//!
//! let container = Container::builder()
//!     .autowire(index)
//!     .build()
//!     .expect("Failed to build container");
//!
//! let logger: Arc<dyn Logger> = container.resolve().expect("Failed to resolve");
//! logger.log("ready");
//! ```

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use rabt_wiring::autowiring::{Autowiring, AutowiringSettings};
use rabt_wiring::descriptor::{Instance, RegistrationDescriptor, RegistrationPlan, Resolver};
use rabt_wiring::error::{CircularDependencyError, NotRegisteredError, RabtError, Result};
use rabt_wiring::key::{ServiceKey, TypeRef};
use rabt_wiring::lifetime::Lifetime;
use rabt_wiring::metadata::MetadataIndex;
use tracing::{debug, info, instrument, trace, warn};

use crate::registry::{Registry, SlotId};
use crate::scope::ScopeCache;

// ============================================================
// ContainerBuilder
// ============================================================

/// Builds a [`Container`] from seeded descriptors and autowired indexes.
///
/// Seeded descriptors go in first, then each index is autowired over
/// them in the order given.
///
/// # Examples
/// ```rust,ignore
/// let container = Container::builder()
///     .seed(RegistrationDescriptor::instance::<dyn Clock>(Arc::new(FixedClock)))
///     .autowire(MetadataIndex::discover())
///     .build()?;
/// ```
pub struct ContainerBuilder {
    plan: RegistrationPlan,
    indexes: Vec<MetadataIndex>,
    settings: AutowiringSettings,
}

impl ContainerBuilder {
    fn new() -> Self {
        Self {
            plan: RegistrationPlan::new(),
            indexes: Vec::new(),
            settings: AutowiringSettings::default(),
        }
    }

    /// Settings for every autowired index.
    pub fn settings(mut self, settings: AutowiringSettings) -> Self {
        self.settings = settings;
        self
    }

    // ── Seeding ──

    /// Adds a descriptor unconditionally.
    pub fn seed(mut self, descriptor: RegistrationDescriptor) -> Self {
        self.plan.add(descriptor);
        self
    }

    /// Adds a descriptor unless its service is registered with the same lifetime.
    pub fn try_seed(mut self, descriptor: RegistrationDescriptor) -> Self {
        self.plan.try_add(descriptor);
        self
    }

    /// Adds a descriptor unless the same implementation already serves its service.
    pub fn seed_enumerable(mut self, descriptor: RegistrationDescriptor) -> Self {
        self.plan.try_add_enumerable(descriptor);
        self
    }

    /// Adds a keyed descriptor.
    pub fn seed_keyed(mut self, key: impl Into<ServiceKey>, descriptor: RegistrationDescriptor) -> Self {
        self.plan.add_keyed(key, descriptor);
        self
    }

    // ── Autowiring ──

    /// Queues an index for autowiring.
    pub fn autowire(mut self, index: MetadataIndex) -> Self {
        self.indexes.push(index);
        self
    }

    // ── Build ──

    /// Runs autowiring and freezes the plan into a [`Container`].
    ///
    /// # Errors
    /// Any composition error from autowiring, or
    /// [`RabtError::DuplicateKey`] for colliding keyed entries.
    #[instrument(skip(self), name = "container_build")]
    pub fn build(self) -> Result<Container> {
        let ContainerBuilder {
            mut plan,
            indexes,
            settings,
        } = self;

        for index in &indexes {
            let autowiring = Autowiring::new(index).with_settings(settings.clone());
            autowiring.register(&mut plan)?;
            autowiring.register_keyed(&mut plan)?;
        }

        Container::build(plan)
    }
}

// ═══════════════════════════════════════════
// Container
// ═══════════════════════════════════════════

/// Immutable, thread-safe host for a registration plan.
///
/// The container is also the root scope: scoped services resolved from it
/// directly are cached for its whole life.
pub struct Container {
    registry: Arc<Registry>,
    root: ScopeCache,
}

impl Container {
    /// Create a new builder.
    pub fn builder() -> ContainerBuilder {
        ContainerBuilder::new()
    }

    /// Freezes `plan` into a container.
    ///
    /// # Errors
    /// [`RabtError::DuplicateKey`] when keyed entries collide.
    #[instrument(skip_all, fields(descriptors = plan.len(), keyed = plan.keyed().len()))]
    pub fn build(plan: RegistrationPlan) -> Result<Container> {
        debug!(plan = %plan, "Registration plan");
        let registry = Registry::from_plan(plan)?;

        info!(slots = registry.len(), "Container built successfully ✓");
        Ok(Container {
            registry: Arc::new(registry),
            root: ScopeCache::new(),
        })
    }

    /// Create a scoped child container.
    pub fn create_scope(&self) -> ScopedContainer<'_> {
        let cache = ScopeCache::new();
        debug!(scope = cache.id(), "Creating new scope");
        ScopedContainer { parent: self, cache }
    }

    /// Number of resolvable slots, counting each generic closing and keyed entry.
    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    fn resolution<'a>(&'a self, scope: &'a ScopeCache) -> Resolution<'a> {
        Resolution {
            registry: &self.registry,
            scope,
            stack: Mutex::new(Vec::new()),
        }
    }
}

impl Resolver for Container {
    fn resolve_instance(&self, service: &TypeRef) -> Result<Instance> {
        self.resolution(&self.root).resolve_instance(service)
    }

    fn resolve_all_instances(&self, service: &TypeRef) -> Result<Vec<Instance>> {
        self.resolution(&self.root).resolve_all_instances(service)
    }

    fn resolve_keyed_instance(&self, service: &TypeRef, key: &ServiceKey) -> Result<Instance> {
        self.resolution(&self.root).resolve_keyed_instance(service, key)
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("slots", &self.registry.len())
            .field("root_scoped", &self.root.len())
            .finish()
    }
}

// ═══════════════════════════════════════════
// ScopedContainer
// ═══════════════════════════════════════════

/// A scoped child container.
///
/// Scoped services are cached per `ScopedContainer`; singletons are shared
/// with the parent and every sibling scope.
pub struct ScopedContainer<'a> {
    parent: &'a Container,
    cache: ScopeCache,
}

impl ScopedContainer<'_> {
    #[inline]
    pub fn id(&self) -> u64 {
        self.cache.id()
    }
}

impl Resolver for ScopedContainer<'_> {
    fn resolve_instance(&self, service: &TypeRef) -> Result<Instance> {
        self.parent.resolution(&self.cache).resolve_instance(service)
    }

    fn resolve_all_instances(&self, service: &TypeRef) -> Result<Vec<Instance>> {
        self.parent.resolution(&self.cache).resolve_all_instances(service)
    }

    fn resolve_keyed_instance(&self, service: &TypeRef, key: &ServiceKey) -> Result<Instance> {
        self.parent.resolution(&self.cache).resolve_keyed_instance(service, key)
    }
}

impl fmt::Debug for ScopedContainer<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopedContainer")
            .field("id", &self.cache.id())
            .field("scoped", &self.cache.len())
            .finish()
    }
}

// ═══════════════════════════════════════════
// Resolution (internal bridge)
// ═══════════════════════════════════════════

/// One top-level resolve call and everything it pulls in.
///
/// Passed to producers as their [`Resolver`]; the stack holds the slots
/// under construction.
struct Resolution<'a> {
    registry: &'a Registry,
    scope: &'a ScopeCache,
    stack: Mutex<Vec<(SlotId, TypeRef)>>,
}

impl Resolution<'_> {
    fn produce(&self, id: SlotId) -> Result<Instance> {
        let slot = self.registry.slot(id);
        if let Some(instance) = slot.singleton.get() {
            return Ok(instance.clone());
        }

        self.enter(id, slot.service)?;
        trace!(service = %slot.service, lifetime = %slot.lifetime, scope = self.scope.id(), "Constructing");
        let result = match slot.lifetime {
            Lifetime::Transient => (slot.producer)(self),
            Lifetime::Scoped => self.scope.get_or_try_insert(id, || (slot.producer)(self)),
            Lifetime::Singleton => slot.singleton.get_or_try_init(|| (slot.producer)(self)).cloned(),
        };
        self.stack.lock().pop();
        result
    }

    fn enter(&self, id: SlotId, service: TypeRef) -> Result<()> {
        let mut stack = self.stack.lock();
        if let Some(start) = stack.iter().position(|(entered, _)| *entered == id) {
            let chain: Vec<TypeRef> = stack[start..]
                .iter()
                .map(|(_, service)| *service)
                .chain(std::iter::once(service))
                .collect();
            warn!(service = %service, depth = stack.len(), "Circular dependency detected");
            return Err(RabtError::CircularDependency(CircularDependencyError { chain }));
        }
        stack.push((id, service));
        Ok(())
    }

    fn not_registered(&self, service: &TypeRef, key: Option<&ServiceKey>) -> RabtError {
        RabtError::NotRegistered(NotRegisteredError {
            requested: *service,
            key: key.cloned(),
            suggestions: self.registry.suggestions(service),
        })
    }
}

impl Resolver for Resolution<'_> {
    fn resolve_instance(&self, service: &TypeRef) -> Result<Instance> {
        trace!(service = %service, "Resolving");
        let id = self
            .registry
            .resolve_slot(service)
            .ok_or_else(|| self.not_registered(service, None))?;
        self.produce(id)
    }

    fn resolve_all_instances(&self, service: &TypeRef) -> Result<Vec<Instance>> {
        trace!(service = %service, "Resolving all");
        self.registry
            .all_slots(service)
            .into_iter()
            .map(|id| self.produce(id))
            .collect()
    }

    fn resolve_keyed_instance(&self, service: &TypeRef, key: &ServiceKey) -> Result<Instance> {
        trace!(service = %service, key = %key, "Resolving keyed");
        let id = self
            .registry
            .keyed_slot(service, key)
            .ok_or_else(|| self.not_registered(service, Some(key)))?;
        self.produce(id)
    }
}

// ═══════════════════════════════════════════
// Prelude
// ═══════════════════════════════════════════

pub mod prelude {
    pub use super::{Container, ContainerBuilder, ScopedContainer};
    pub use rabt_wiring::autowiring::{Autowiring, AutowiringSettings};
    pub use rabt_wiring::descriptor::{RegistrationDescriptor, RegistrationPlan, Resolver, ResolverApi};
    pub use rabt_wiring::error::{RabtError, Result};
    pub use rabt_wiring::key::{GenericTemplate, ServiceKey, TypeRef};
    pub use rabt_wiring::lifetime::{Lifetime, LifetimeKind};
    pub use rabt_wiring::metadata::{Component, MetadataIndex, OpenComponent};
}

// ═══════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    use rabt_wiring::descriptor::ResolverApi;

    trait Counter: Send + Sync {
        fn value(&self) -> u32;
    }

    struct Numbered(u32);
    impl Counter for Numbered {
        fn value(&self) -> u32 {
            self.0
        }
    }

    fn counting(lifetime: Lifetime) -> (RegistrationDescriptor, Arc<AtomicU32>) {
        let calls = Arc::new(AtomicU32::new(0));
        let descriptor = RegistrationDescriptor::implemented_by::<dyn Counter, Numbered>(lifetime, {
            let calls = calls.clone();
            move |_| Ok(Arc::new(Numbered(calls.fetch_add(1, Ordering::SeqCst))) as Arc<dyn Counter>)
        });
        (descriptor, calls)
    }

    fn container_with(descriptor: RegistrationDescriptor) -> Container {
        let mut plan = RegistrationPlan::new();
        plan.add(descriptor);
        Container::build(plan).unwrap()
    }

    #[test]
    fn transient_creates_new_each_time() {
        let (descriptor, calls) = counting(Lifetime::Transient);
        let container = container_with(descriptor);

        let a = container.resolve::<dyn Counter>().unwrap();
        let b = container.resolve::<dyn Counter>().unwrap();

        assert_eq!(a.value(), 0);
        assert_eq!(b.value(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn singleton_factory_called_once_across_scopes() {
        let (descriptor, calls) = counting(Lifetime::Singleton);
        let container = container_with(descriptor);

        let root = container.resolve::<dyn Counter>().unwrap();
        let scope = container.create_scope();
        let scoped = scope.resolve::<dyn Counter>().unwrap();

        assert!(Arc::ptr_eq(&root, &scoped));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn scoped_is_cached_per_scope() {
        let (descriptor, calls) = counting(Lifetime::Scoped);
        let container = container_with(descriptor);

        let first = container.create_scope();
        let second = container.create_scope();

        let a1 = first.resolve::<dyn Counter>().unwrap();
        let a2 = first.resolve::<dyn Counter>().unwrap();
        let b = second.resolve::<dyn Counter>().unwrap();

        assert!(Arc::ptr_eq(&a1, &a2));
        assert!(!Arc::ptr_eq(&a1, &b));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_ne!(first.id(), second.id());
    }

    #[test]
    fn root_container_is_its_own_scope() {
        let (descriptor, _) = counting(Lifetime::Scoped);
        let container = container_with(descriptor);

        let a = container.resolve::<dyn Counter>().unwrap();
        let b = container.resolve::<dyn Counter>().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn resolve_with_dependency() {
        struct Greeting(String);

        let mut plan = RegistrationPlan::new();
        plan.add(RegistrationDescriptor::instance(Arc::new(String::from("postgres://localhost"))))
            .add(RegistrationDescriptor::factory::<Greeting>(Lifetime::Transient, |r| {
                let url: Arc<String> = r.resolve()?;
                Ok(Arc::new(Greeting(format!("connected to {url}"))))
            }));
        let container = Container::build(plan).unwrap();

        let greeting = container.resolve::<Greeting>().unwrap();
        assert_eq!(greeting.0, "connected to postgres://localhost");
    }

    #[test]
    fn resolve_all_in_plan_order() {
        let mut plan = RegistrationPlan::new();
        plan.add(RegistrationDescriptor::factory::<dyn Counter>(Lifetime::Transient, |_| {
            Ok(Arc::new(Numbered(1)) as Arc<dyn Counter>)
        }))
        .add(RegistrationDescriptor::factory::<dyn Counter>(Lifetime::Transient, |_| {
            Ok(Arc::new(Numbered(2)) as Arc<dyn Counter>)
        }));
        let container = Container::build(plan).unwrap();

        let values: Vec<u32> = container
            .resolve_all::<dyn Counter>()
            .unwrap()
            .iter()
            .map(|c| c.value())
            .collect();
        assert_eq!(values, vec![1, 2]);
        assert_eq!(container.resolve::<dyn Counter>().unwrap().value(), 2);
        assert!(container.resolve_all::<String>().unwrap().is_empty());
    }

    #[test]
    fn resolve_not_registered() {
        let container = Container::build(RegistrationPlan::new()).unwrap();

        match container.resolve::<i32>().unwrap_err() {
            RabtError::NotRegistered(e) => {
                assert!(e.requested.type_name().contains("i32"));
                assert!(e.key.is_none());
            }
            other => panic!("Expected NotRegistered, got: {other:?}"),
        }
    }

    #[test]
    fn keyed_lookup() {
        let mut plan = RegistrationPlan::new();
        plan.add_keyed(
            "one",
            RegistrationDescriptor::instance::<dyn Counter>(Arc::new(Numbered(1))),
        )
        .add_keyed(
            2i64,
            RegistrationDescriptor::instance::<dyn Counter>(Arc::new(Numbered(2))),
        );
        let container = Container::build(plan).unwrap();

        assert_eq!(container.resolve_keyed::<dyn Counter>("one").unwrap().value(), 1);
        assert_eq!(container.resolve_keyed::<dyn Counter>(2i64).unwrap().value(), 2);
        assert!(matches!(
            container.resolve_keyed::<dyn Counter>("three"),
            Err(RabtError::NotRegistered(NotRegisteredError { key: Some(_), .. }))
        ));
        assert!(container.resolve::<dyn Counter>().is_err());
    }

    #[test]
    fn circular_dependency_is_reported() {
        #[derive(Debug)]
        struct Ping;
        struct Pong;

        let mut plan = RegistrationPlan::new();
        plan.add(RegistrationDescriptor::factory::<Ping>(Lifetime::Singleton, |r| {
            let _: Arc<Pong> = r.resolve()?;
            Ok(Arc::new(Ping))
        }))
        .add(RegistrationDescriptor::factory::<Pong>(Lifetime::Transient, |r| {
            let _: Arc<Ping> = r.resolve()?;
            Ok(Arc::new(Pong))
        }));
        let container = Container::build(plan).unwrap();

        match container.resolve::<Ping>().unwrap_err() {
            RabtError::CircularDependency(e) => {
                let names: Vec<String> = e.chain.iter().map(TypeRef::short_name).collect();
                assert_eq!(names, vec!["Ping", "Pong", "Ping"]);
            }
            other => panic!("Expected CircularDependency, got: {other:?}"),
        }
    }

    #[test]
    fn builder_seeds_before_autowiring() {
        use rabt_wiring::lifetime::LifetimeKind;
        use rabt_wiring::metadata::Component;

        let index = MetadataIndex::builder()
            .component(
                Component::new(|_| Ok(Numbered(9)))
                    .implements::<dyn Counter>(|it| it as Arc<dyn Counter>)
                    .service::<dyn Counter>(LifetimeKind::TryAddSingleton),
            )
            .build();

        let container = Container::builder()
            .seed(RegistrationDescriptor::instance::<dyn Counter>(Arc::new(Numbered(1))))
            .autowire(index)
            .build()
            .unwrap();

        assert_eq!(container.resolve_all::<dyn Counter>().unwrap().len(), 1);
        assert_eq!(container.resolve::<dyn Counter>().unwrap().value(), 1);
    }

    #[test]
    fn debug_display() {
        let (descriptor, _) = counting(Lifetime::Singleton);
        let container = container_with(descriptor);

        let debug = format!("{container:?}");
        assert!(debug.contains("Container"));
        assert!(debug.contains("slots: 1"));
        assert!(format!("{:?}", container.create_scope()).contains("ScopedContainer"));
    }
}
