//! Registration descriptors: the plan handed to a host container.
//!
//! A [`RegistrationDescriptor`] binds a service type to something that
//! produces it: an implementation type with its activator, a factory, a
//! fixed instance, or an open generic implementation with its closings.
//! The ordered list lives in a [`RegistrationPlan`].

use std::any::{Any, type_name};
use std::fmt;
use std::sync::Arc;

use rabt_support::rendering::{PlanRow, render_plan};

use crate::dedup::{Admission, LifetimeDeduper};
use crate::error::{RabtError, Result};
use crate::key::{ServiceKey, TypeRef};
use crate::lifetime::{AdmissionPolicy, Lifetime};

/// A type-erased resolved instance.
///
/// An instance produced for service `S` holds an `Arc<S>`, so shared
/// lifetimes hand out clones of one allocation.
pub type Instance = Arc<dyn Any + Send + Sync>;

/// Produces one instance given a resolver.
///
/// `Arc` because descriptors are cloned into decorator chains and shared
/// with the container across threads.
pub type FactoryFn = Arc<dyn Fn(&dyn Resolver) -> Result<Instance> + Send + Sync>;

/// Resolves services while an instance is being constructed.
///
/// This is what activators and factories receive. Host containers
/// implement it; decorator chains wrap it.
pub trait Resolver: Send + Sync {
    /// Resolves one instance of `service`.
    fn resolve_instance(&self, service: &TypeRef) -> Result<Instance>;

    /// Resolves every registered instance of `service`, in plan order.
    fn resolve_all_instances(&self, service: &TypeRef) -> Result<Vec<Instance>>;

    /// Resolves the instance registered for `service` under `key`.
    fn resolve_keyed_instance(&self, service: &TypeRef, key: &ServiceKey) -> Result<Instance>;
}

/// Typed resolution on top of any [`Resolver`].
///
/// ```rust,ignore
/// let clock: Arc<dyn Clock> = resolver.resolve()?;
/// let handlers: Vec<Arc<dyn Handler>> = resolver.resolve_all()?;
/// ```
pub trait ResolverApi {
    fn resolve<S: ?Sized + Send + Sync + 'static>(&self) -> Result<Arc<S>>;

    fn resolve_all<S: ?Sized + Send + Sync + 'static>(&self) -> Result<Vec<Arc<S>>>;

    fn resolve_keyed<S: ?Sized + Send + Sync + 'static>(&self, key: impl Into<ServiceKey>) -> Result<Arc<S>>;
}

impl<R: Resolver + ?Sized> ResolverApi for R {
    fn resolve<S: ?Sized + Send + Sync + 'static>(&self) -> Result<Arc<S>> {
        let service = TypeRef::of::<S>();
        let instance = self.resolve_instance(&service)?;
        downcast::<S>(&service, &instance)
    }

    fn resolve_all<S: ?Sized + Send + Sync + 'static>(&self) -> Result<Vec<Arc<S>>> {
        let service = TypeRef::of::<S>();
        self.resolve_all_instances(&service)?
            .iter()
            .map(|instance| downcast::<S>(&service, instance))
            .collect()
    }

    fn resolve_keyed<S: ?Sized + Send + Sync + 'static>(&self, key: impl Into<ServiceKey>) -> Result<Arc<S>> {
        let service = TypeRef::of::<S>();
        let instance = self.resolve_keyed_instance(&service, &key.into())?;
        downcast::<S>(&service, &instance)
    }
}

/// Wraps a shared value as an [`Instance`] of service `S`.
#[inline]
pub fn instance_of<S: ?Sized + Send + Sync + 'static>(value: Arc<S>) -> Instance {
    Arc::new(value)
}

/// Recovers the `Arc<S>` held by an [`Instance`].
///
/// # Errors
/// [`RabtError::ConstructionFailed`] when the instance holds another type.
pub fn downcast<S: ?Sized + Send + Sync + 'static>(service: &TypeRef, instance: &Instance) -> Result<Arc<S>> {
    instance
        .downcast_ref::<Arc<S>>()
        .cloned()
        .ok_or_else(|| RabtError::construction(*service, format!("Type mismatch: expected Arc<{}>", type_name::<S>())))
}

/// One closed form of an open generic registration.
#[derive(Clone)]
pub struct GenericClosing {
    /// Closed service, e.g. `dyn Repository<Customer>`
    pub service: TypeRef,
    /// Closed implementation, e.g. `SqlRepository<Customer>`
    pub implementation: TypeRef,
    /// Produces the instance in the shape of `service`
    pub activate: FactoryFn,
}

impl fmt::Debug for GenericClosing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenericClosing")
            .field("service", &self.service)
            .field("implementation", &self.implementation)
            .finish()
    }
}

/// What a descriptor resolves to.
#[derive(Clone)]
pub enum Implementation {
    /// An implementation type built by its activator.
    Type { implementation: TypeRef, activate: FactoryFn },
    /// A factory; `produces` names the resulting type when known.
    Factory { produces: Option<TypeRef>, factory: FactoryFn },
    /// A pre-built instance.
    Instance { implementation: TypeRef, instance: Instance },
    /// An open generic implementation, closed on demand by the host.
    OpenGeneric { implementation: TypeRef, closings: Vec<GenericClosing> },
}

impl Implementation {
    /// The implementation type, used for enumerable deduplication.
    pub fn implementation_type(&self) -> Option<&TypeRef> {
        match self {
            Implementation::Type { implementation, .. }
            | Implementation::Instance { implementation, .. }
            | Implementation::OpenGeneric { implementation, .. } => Some(implementation),
            Implementation::Factory { produces, .. } => produces.as_ref(),
        }
    }

    /// Normalizes a closed implementation into a single producer.
    ///
    /// Returns `None` for open generics, which have one producer per closing.
    pub fn producer(&self) -> Option<FactoryFn> {
        match self {
            Implementation::Type { activate, .. } => Some(activate.clone()),
            Implementation::Factory { factory, .. } => Some(factory.clone()),
            Implementation::Instance { instance, .. } => {
                let instance = instance.clone();
                Some(Arc::new(move |_: &dyn Resolver| Ok(instance.clone())))
            }
            Implementation::OpenGeneric { .. } => None,
        }
    }

    fn describe(&self) -> String {
        match self {
            Implementation::Type { implementation, .. } => implementation.short_name(),
            Implementation::Factory { produces: Some(ty), .. } => format!("{ty} (factory)"),
            Implementation::Factory { produces: None, .. } => "(factory)".to_string(),
            Implementation::Instance { implementation, .. } => format!("{implementation} (instance)"),
            Implementation::OpenGeneric { implementation, closings } => {
                format!("{implementation} ({} closings)", closings.len())
            }
        }
    }
}

impl fmt::Debug for Implementation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

/// A resolved registration: service type, producer and lifetime.
#[derive(Clone)]
pub struct RegistrationDescriptor {
    pub service: TypeRef,
    pub implementation: Implementation,
    pub lifetime: Lifetime,
}

impl RegistrationDescriptor {
    pub fn new(service: TypeRef, implementation: Implementation, lifetime: Lifetime) -> Self {
        Self { service, implementation, lifetime }
    }

    /// Describes service `S` implemented by type `I`.
    ///
    /// ```
    /// use std::sync::Arc;
    /// use rabt_wiring::descriptor::RegistrationDescriptor;
    /// use rabt_wiring::lifetime::Lifetime;
    ///
    /// trait Clock: Send + Sync {}
    /// struct SystemClock;
    /// impl Clock for SystemClock {}
    ///
    /// let descriptor = RegistrationDescriptor::implemented_by::<dyn Clock, SystemClock>(
    ///     Lifetime::Singleton,
    ///     |_| Ok(Arc::new(SystemClock) as Arc<dyn Clock>),
    /// );
    /// assert!(descriptor.implementation_type().unwrap().type_name().ends_with("SystemClock"));
    /// ```
    pub fn implemented_by<S, I>(
        lifetime: Lifetime,
        activate: impl Fn(&dyn Resolver) -> Result<Arc<S>> + Send + Sync + 'static,
    ) -> Self
    where
        S: ?Sized + Send + Sync + 'static,
        I: 'static,
    {
        Self::new(
            TypeRef::of::<S>(),
            Implementation::Type {
                implementation: TypeRef::of::<I>(),
                activate: Arc::new(move |resolver: &dyn Resolver| Ok(instance_of(activate(resolver)?))),
            },
            lifetime,
        )
    }

    /// Describes service `S` produced by a factory.
    pub fn factory<S: ?Sized + Send + Sync + 'static>(
        lifetime: Lifetime,
        factory: impl Fn(&dyn Resolver) -> Result<Arc<S>> + Send + Sync + 'static,
    ) -> Self {
        Self::new(
            TypeRef::of::<S>(),
            Implementation::Factory {
                produces: None,
                factory: Arc::new(move |resolver: &dyn Resolver| Ok(instance_of(factory(resolver)?))),
            },
            lifetime,
        )
    }

    /// Describes a pre-built singleton instance of `S`.
    pub fn instance<S: ?Sized + Send + Sync + 'static>(value: Arc<S>) -> Self {
        Self::new(
            TypeRef::of::<S>(),
            Implementation::Instance {
                implementation: TypeRef::of::<S>(),
                instance: instance_of(value),
            },
            Lifetime::Singleton,
        )
    }

    #[inline]
    pub fn implementation_type(&self) -> Option<&TypeRef> {
        self.implementation.implementation_type()
    }

    #[inline]
    pub fn is_open_generic(&self) -> bool {
        matches!(self.implementation, Implementation::OpenGeneric { .. })
    }

    fn row(&self, key: Option<&ServiceKey>) -> PlanRow {
        PlanRow {
            service: self.service.short_name(),
            implementation: self.implementation.describe(),
            lifetime: self.lifetime.to_string(),
            key: key.map(ToString::to_string),
        }
    }
}

impl fmt::Debug for RegistrationDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistrationDescriptor")
            .field("service", &self.service)
            .field("implementation", &self.implementation)
            .field("lifetime", &self.lifetime)
            .finish()
    }
}

/// A registration reachable only through `(service, key)`.
#[derive(Clone)]
pub struct KeyedRegistrationDescriptor {
    pub key: ServiceKey,
    pub descriptor: RegistrationDescriptor,
}

impl KeyedRegistrationDescriptor {
    #[inline]
    pub fn service(&self) -> &TypeRef {
        &self.descriptor.service
    }
}

impl fmt::Debug for KeyedRegistrationDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyedRegistrationDescriptor")
            .field("key", &self.key)
            .field("descriptor", &self.descriptor)
            .finish()
    }
}

/// The ordered registration plan.
///
/// Order matters: host containers resolve the last descriptor of a
/// service, and decorator composition replaces descriptors in place.
/// A plan can be pre-seeded before autowiring runs over it.
#[derive(Clone, Default)]
pub struct RegistrationPlan {
    descriptors: Vec<RegistrationDescriptor>,
    keyed: Vec<KeyedRegistrationDescriptor>,
}

impl RegistrationPlan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a descriptor unconditionally.
    pub fn add(&mut self, descriptor: RegistrationDescriptor) -> &mut Self {
        self.admit(descriptor, AdmissionPolicy::Add);
        self
    }

    /// Appends unless the service is already registered with the same lifetime.
    pub fn try_add(&mut self, descriptor: RegistrationDescriptor) -> bool {
        self.admit(descriptor, AdmissionPolicy::TryAdd)
    }

    /// Appends unless the same service/implementation pair is registered.
    pub fn try_add_enumerable(&mut self, descriptor: RegistrationDescriptor) -> bool {
        self.admit(descriptor, AdmissionPolicy::Enumerable)
    }

    /// Runs `descriptor` through the [`LifetimeDeduper`]; returns whether it was appended.
    pub fn admit(&mut self, descriptor: RegistrationDescriptor, policy: AdmissionPolicy) -> bool {
        match LifetimeDeduper::admit(&descriptor, policy, &self.descriptors) {
            Admission::Append => {
                self.descriptors.push(descriptor);
                true
            }
            Admission::Discard(_) => false,
        }
    }

    /// Ordered descriptors.
    pub fn descriptors(&self) -> &[RegistrationDescriptor] {
        &self.descriptors
    }

    /// Keyed descriptors.
    pub fn keyed(&self) -> &[KeyedRegistrationDescriptor] {
        &self.keyed
    }

    /// Descriptors registered for `service`, in order.
    pub fn descriptors_for<'a>(
        &'a self,
        service: &'a TypeRef,
    ) -> impl Iterator<Item = &'a RegistrationDescriptor> + 'a {
        self.descriptors.iter().filter(move |d| d.service == *service)
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty() && self.keyed.is_empty()
    }

    /// Consumes the plan, freezing it for a host container.
    pub fn into_parts(self) -> (Vec<RegistrationDescriptor>, Vec<KeyedRegistrationDescriptor>) {
        (self.descriptors, self.keyed)
    }

    /// Adds a keyed descriptor; uniqueness is checked when keyed bindings
    /// are registered and again by the host container.
    pub fn add_keyed(&mut self, key: impl Into<ServiceKey>, descriptor: RegistrationDescriptor) -> &mut Self {
        self.keyed.push(KeyedRegistrationDescriptor {
            key: key.into(),
            descriptor,
        });
        self
    }

    pub(crate) fn replace_descriptors(&mut self, descriptors: Vec<RegistrationDescriptor>) {
        self.descriptors = descriptors;
    }

    pub(crate) fn extend_keyed(&mut self, keyed: Vec<KeyedRegistrationDescriptor>) {
        self.keyed.extend(keyed);
    }
}

impl fmt::Debug for RegistrationPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistrationPlan")
            .field("descriptors", &self.descriptors.len())
            .field("keyed", &self.keyed.len())
            .finish()
    }
}

impl fmt::Display for RegistrationPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rows: Vec<PlanRow> = self
            .descriptors
            .iter()
            .map(|d| d.row(None))
            .chain(self.keyed.iter().map(|k| k.descriptor.row(Some(&k.key))))
            .collect();
        f.write_str(&render_plan(&rows))
    }
}
