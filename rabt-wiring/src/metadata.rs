//! Per-type registration metadata and the index built from it.
//!
//! Rust has no runtime reflection, so the facts a scanner would read from
//! annotations are declared explicitly: how to activate a type, which
//! service types it structurally satisfies (with the upcast proving it),
//! and its tagged [`Binding`]s.
//!
//! # Examples
//! ```
//! use std::sync::Arc;
//! use rabt_wiring::lifetime::LifetimeKind;
//! use rabt_wiring::metadata::{Component, MetadataIndex};
//!
//! trait Operation: Send + Sync {
//!     fn perform(&self, a: i32, b: i32) -> i32;
//! }
//!
//! struct Addition;
//! impl Operation for Addition {
//!     fn perform(&self, a: i32, b: i32) -> i32 { a + b }
//! }
//!
//! let index = MetadataIndex::builder()
//!     .component(
//!         Component::new(|_| Ok(Addition))
//!             .implements::<dyn Operation>(|it| it as Arc<dyn Operation>)
//!             .service::<dyn Operation>(LifetimeKind::Singleton),
//!     )
//!     .build();
//!
//! assert_eq!(index.len(), 1);
//! ```

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use tracing::debug;

use crate::descriptor::{FactoryFn, GenericClosing, Instance, Resolver, downcast, instance_of};
use crate::discovery::ComponentProvider;
use crate::error::Result;
use crate::key::{GenericTemplate, ServiceKey, TypeRef};
use crate::lifetime::LifetimeKind;

/// Converts an implementation instance into a service-shaped instance.
pub type CastFn = Arc<dyn Fn(Instance) -> Result<Instance> + Send + Sync>;

/// Proof that an implementation satisfies a service type.
#[derive(Clone)]
pub struct Conformance {
    pub service: TypeRef,
    cast: CastFn,
}

impl Conformance {
    /// Activator composed with this conformance's upcast.
    fn wrap(&self, activate: &FactoryFn) -> FactoryFn {
        let activate = activate.clone();
        let cast = self.cast.clone();
        Arc::new(move |resolver: &dyn Resolver| cast(activate(resolver)?))
    }
}

impl fmt::Debug for Conformance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Conformance({})", self.service)
    }
}

/// Registers the component under a service type (or itself).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceBinding {
    /// `None` registers the implementation as its own service.
    pub service: Option<TypeRef>,
    pub lifetime: LifetimeKind,
}

/// Wraps an existing registration of `service`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecoratorBinding {
    pub service: TypeRef,
    /// Lower orders form outer layers.
    pub order: i32,
}

/// Registers the component under `(service, key)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyedBinding {
    pub service: Option<TypeRef>,
    pub key: ServiceKey,
    pub lifetime: LifetimeKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingKind {
    Service,
    Decorator,
    Keyed,
}

/// A registration-relevant fact declared on a component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Binding {
    Service(ServiceBinding),
    Decorator(DecoratorBinding),
    Keyed(KeyedBinding),
}

impl Binding {
    pub fn kind(&self) -> BindingKind {
        match self {
            Binding::Service(_) => BindingKind::Service,
            Binding::Decorator(_) => BindingKind::Decorator,
            Binding::Keyed(_) => BindingKind::Keyed,
        }
    }
}

/// A concrete implementation type: activator plus conformances.
#[derive(Clone)]
pub struct ClosedComponent {
    implementation: TypeRef,
    activate: FactoryFn,
    conformances: Vec<Conformance>,
}

impl ClosedComponent {
    #[inline]
    pub fn implementation(&self) -> &TypeRef {
        &self.implementation
    }

    /// Produces an instance shaped as `service`, if this type satisfies it.
    pub fn producer_for(&self, service: &TypeRef) -> Option<FactoryFn> {
        if *service == self.implementation {
            return Some(self.activate.clone());
        }
        self.conformances
            .iter()
            .find(|c| c.service == *service)
            .map(|c| c.wrap(&self.activate))
    }

    /// `service` as this type recorded it, carrying its generic template.
    fn recorded(&self, service: TypeRef) -> TypeRef {
        if service == self.implementation {
            return self.implementation;
        }
        self.conformances
            .iter()
            .find(|c| c.service == service)
            .map_or(service, |c| c.service)
    }

    /// Closings of generic `definition` this type provides.
    fn closings_of(&self, definition: &TypeRef) -> Vec<GenericClosing> {
        let own = (self.implementation.definition().as_ref() == Some(definition)).then(|| GenericClosing {
            service: self.implementation,
            implementation: self.implementation,
            activate: self.activate.clone(),
        });

        own.into_iter()
            .chain(
                self.conformances
                    .iter()
                    .filter(|c| c.service.definition().as_ref() == Some(definition))
                    .map(|c| GenericClosing {
                        service: c.service,
                        implementation: self.implementation,
                        activate: c.wrap(&self.activate),
                    }),
            )
            .collect()
    }
}

impl fmt::Debug for ClosedComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClosedComponent")
            .field("implementation", &self.implementation)
            .field("conformances", &self.conformances)
            .finish()
    }
}

#[derive(Debug, Clone)]
enum Shape {
    Closed(ClosedComponent),
    Open {
        /// Generic interface definitions the template implements
        interfaces: Vec<TypeRef>,
        /// One closed component per type argument in use
        closings: Vec<ClosedComponent>,
    },
}

/// Everything the planner knows about one discovered type.
///
/// Immutable once built.
#[derive(Debug, Clone)]
pub struct ComponentMetadata {
    implementation: TypeRef,
    shape: Shape,
    bindings: Vec<Binding>,
}

impl ComponentMetadata {
    #[inline]
    pub fn implementation(&self) -> &TypeRef {
        &self.implementation
    }

    #[inline]
    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    pub fn service_bindings(&self) -> impl Iterator<Item = &ServiceBinding> {
        self.bindings.iter().filter_map(|b| match b {
            Binding::Service(binding) => Some(binding),
            _ => None,
        })
    }

    pub fn decorator_bindings(&self) -> impl Iterator<Item = &DecoratorBinding> {
        self.bindings.iter().filter_map(|b| match b {
            Binding::Decorator(binding) => Some(binding),
            _ => None,
        })
    }

    pub fn keyed_bindings(&self) -> impl Iterator<Item = &KeyedBinding> {
        self.bindings.iter().filter_map(|b| match b {
            Binding::Keyed(binding) => Some(binding),
            _ => None,
        })
    }

    /// Service types this implementation structurally satisfies.
    pub fn interfaces(&self) -> Vec<TypeRef> {
        match &self.shape {
            Shape::Closed(closed) => closed.conformances.iter().map(|c| c.service).collect(),
            Shape::Open { interfaces, .. } => interfaces.clone(),
        }
    }

    /// Producer for a closed service, `None` if this type cannot provide it.
    pub fn producer_for(&self, service: &TypeRef) -> Option<FactoryFn> {
        match &self.shape {
            Shape::Closed(closed) => closed.producer_for(service),
            Shape::Open { .. } => None,
        }
    }

    /// Closings of the open generic `definition` this component provides.
    pub fn closings_for(&self, definition: &TypeRef) -> Vec<GenericClosing> {
        match &self.shape {
            Shape::Closed(closed) => closed.closings_of(definition),
            Shape::Open { closings, .. } => {
                closings.iter().flat_map(|closing| closing.closings_of(definition)).collect()
            }
        }
    }
}

/// Typed builder for a concrete component.
///
/// `I` is the implementation type; its activator receives a [`Resolver`]
/// for constructor dependencies.
pub struct Component<I> {
    closed: ClosedComponent,
    bindings: Vec<Binding>,
    _marker: PhantomData<fn() -> I>,
}

impl<I: Send + Sync + 'static> Component<I> {
    pub fn new(activate: impl Fn(&dyn Resolver) -> Result<I> + Send + Sync + 'static) -> Self {
        Self {
            closed: ClosedComponent {
                implementation: TypeRef::of::<I>(),
                activate: Arc::new(move |resolver: &dyn Resolver| Ok(instance_of(Arc::new(activate(resolver)?)))),
                conformances: Vec::new(),
            },
            bindings: Vec::new(),
            _marker: PhantomData,
        }
    }

    /// Records that `I` is a closing of the generic `template`.
    pub fn closes(mut self, template: GenericTemplate) -> Self {
        self.closed.implementation = TypeRef::closing::<I>(template);
        self
    }

    /// Declares that `I` satisfies service `S`.
    pub fn implements<S: ?Sized + Send + Sync + 'static>(
        self,
        upcast: impl Fn(Arc<I>) -> Arc<S> + Send + Sync + 'static,
    ) -> Self {
        self.conforms(TypeRef::of::<S>(), upcast)
    }

    /// Declares that `I` satisfies `S`, a closing of generic interface `template`.
    pub fn implements_generic<S: ?Sized + Send + Sync + 'static>(
        self,
        template: GenericTemplate,
        upcast: impl Fn(Arc<I>) -> Arc<S> + Send + Sync + 'static,
    ) -> Self {
        self.conforms(TypeRef::closing::<S>(template), upcast)
    }

    fn conforms<S: ?Sized + Send + Sync + 'static>(
        mut self,
        service: TypeRef,
        upcast: impl Fn(Arc<I>) -> Arc<S> + Send + Sync + 'static,
    ) -> Self {
        let implementation = self.closed.implementation;
        let cast: CastFn = Arc::new(move |instance: Instance| {
            let typed = downcast::<I>(&implementation, &instance)?;
            Ok(instance_of(upcast(typed)))
        });
        self.closed.conformances.push(Conformance { service, cast });
        self
    }

    /// Registers `I` under service `S`.
    pub fn service<S: ?Sized + 'static>(self, lifetime: LifetimeKind) -> Self {
        self.bind(Binding::Service(ServiceBinding {
            service: Some(TypeRef::of::<S>()),
            lifetime,
        }))
    }

    /// Registers `I` as its own service.
    pub fn self_service(self, lifetime: LifetimeKind) -> Self {
        self.bind(Binding::Service(ServiceBinding { service: None, lifetime }))
    }

    /// Registers `I` under an explicit service type, e.g. a generic interface.
    pub fn service_as(self, service: TypeRef, lifetime: LifetimeKind) -> Self {
        self.bind(Binding::Service(ServiceBinding {
            service: Some(service),
            lifetime,
        }))
    }

    /// Declares `I` as a decorator of service `S`.
    pub fn decorates<S: ?Sized + 'static>(self, order: i32) -> Self {
        self.bind(Binding::Decorator(DecoratorBinding {
            service: TypeRef::of::<S>(),
            order,
        }))
    }

    /// Registers `I` under service `S` and `key`.
    pub fn keyed<S: ?Sized + 'static>(self, key: impl Into<ServiceKey>, lifetime: LifetimeKind) -> Self {
        self.bind(Binding::Keyed(KeyedBinding {
            service: Some(TypeRef::of::<S>()),
            key: key.into(),
            lifetime,
        }))
    }

    /// Registers `I` as its own service under `key`.
    pub fn keyed_self(self, key: impl Into<ServiceKey>, lifetime: LifetimeKind) -> Self {
        self.bind(Binding::Keyed(KeyedBinding {
            service: None,
            key: key.into(),
            lifetime,
        }))
    }

    /// Adds a raw binding.
    pub fn bind(mut self, binding: Binding) -> Self {
        self.bindings.push(binding);
        self
    }
}

impl<I> From<Component<I>> for ComponentMetadata {
    fn from(component: Component<I>) -> Self {
        let closed = component.closed;
        // `service::<dyn Validator<Customer>>()` names a closing of a generic
        // interface; the template comes from the matching conformance.
        let bindings = component
            .bindings
            .into_iter()
            .map(|binding| match binding {
                Binding::Service(ServiceBinding {
                    service: Some(service),
                    lifetime,
                }) => Binding::Service(ServiceBinding {
                    service: Some(closed.recorded(service)),
                    lifetime,
                }),
                other => other,
            })
            .collect();

        ComponentMetadata {
            implementation: closed.implementation,
            shape: Shape::Closed(closed),
            bindings,
        }
    }
}

/// Builder for an open generic component such as `SqlRepository<_>`.
///
/// Every type argument the application resolves must be supplied as a
/// closing, because Rust monomorphizes generics at compile time.
pub struct OpenComponent {
    template: GenericTemplate,
    interfaces: Vec<TypeRef>,
    closings: Vec<ClosedComponent>,
    bindings: Vec<Binding>,
}

impl OpenComponent {
    pub fn new(template: GenericTemplate) -> Self {
        Self {
            template,
            interfaces: Vec::new(),
            closings: Vec::new(),
            bindings: Vec::new(),
        }
    }

    /// Declares that the template implements generic interface `interface`.
    pub fn implements(mut self, interface: GenericTemplate) -> Self {
        self.interfaces.push(TypeRef::open(interface));
        self
    }

    /// Adds the closed component for one type argument.
    pub fn closing<I: Send + Sync + 'static>(mut self, component: Component<I>) -> Self {
        self.closings.push(component.closes(self.template).closed);
        self
    }

    /// Registers the template under `service`; `None` registers it as itself.
    pub fn service(mut self, service: Option<TypeRef>, lifetime: LifetimeKind) -> Self {
        self.bindings.push(Binding::Service(ServiceBinding { service, lifetime }));
        self
    }
}

impl From<OpenComponent> for ComponentMetadata {
    fn from(component: OpenComponent) -> Self {
        ComponentMetadata {
            implementation: TypeRef::open(component.template),
            shape: Shape::Open {
                interfaces: component.interfaces,
                closings: component.closings,
            },
            bindings: component.bindings,
        }
    }
}

/// Structural queries the generic resolver needs.
pub trait TypeCatalog {
    /// Is the generic definition of `service` tagged generic-bindable?
    fn is_generic_bindable(&self, service: &TypeRef) -> bool;

    /// Does `implementation` satisfy `service` (identity included)?
    fn implements(&self, implementation: &TypeRef, service: &TypeRef) -> bool;

    /// Every service type `implementation` satisfies.
    fn interfaces_of(&self, implementation: &TypeRef) -> Vec<TypeRef>;
}

/// All discovered components in discovery order.
///
/// Built once per scan and never mutated afterwards.
#[derive(Debug, Clone, Default)]
pub struct MetadataIndex {
    components: Vec<ComponentMetadata>,
    by_implementation: HashMap<TypeRef, usize>,
    generic_bindable: HashSet<GenericTemplate>,
}

impl MetadataIndex {
    pub fn builder() -> MetadataIndexBuilder {
        MetadataIndexBuilder::default()
    }

    #[inline]
    pub fn components(&self) -> &[ComponentMetadata] {
        &self.components
    }

    pub fn component(&self, implementation: &TypeRef) -> Option<&ComponentMetadata> {
        self.by_implementation.get(implementation).map(|&i| &self.components[i])
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Appends another scan's components after this one's.
    pub fn merge(self, other: MetadataIndex) -> MetadataIndex {
        let mut builder = MetadataIndexBuilder {
            components: self.components,
            generic_bindable: self.generic_bindable,
        };
        builder.components.extend(other.components);
        builder.generic_bindable.extend(other.generic_bindable);
        builder.build()
    }
}

impl TypeCatalog for MetadataIndex {
    fn is_generic_bindable(&self, service: &TypeRef) -> bool {
        service
            .template()
            .is_some_and(|template| self.generic_bindable.contains(&template))
    }

    fn implements(&self, implementation: &TypeRef, service: &TypeRef) -> bool {
        implementation == service || self.interfaces_of(implementation).contains(service)
    }

    fn interfaces_of(&self, implementation: &TypeRef) -> Vec<TypeRef> {
        self.component(implementation)
            .map(ComponentMetadata::interfaces)
            .unwrap_or_default()
    }
}

/// Collects components and generic-bindable markers.
#[derive(Default)]
pub struct MetadataIndexBuilder {
    components: Vec<ComponentMetadata>,
    generic_bindable: HashSet<GenericTemplate>,
}

impl MetadataIndexBuilder {
    pub fn component(mut self, component: impl Into<ComponentMetadata>) -> Self {
        self.push(component);
        self
    }

    /// Tags a generic interface as eligible for open-generic binding.
    pub fn generic_bindable(mut self, template: GenericTemplate) -> Self {
        self.mark_generic_bindable(template);
        self
    }

    /// Lets a [`ComponentProvider`] declare its components.
    pub fn add_provider(mut self, provider: &dyn ComponentProvider) -> Self {
        debug!(provider = provider.name(), "Describing components");
        provider.describe(&mut self);
        self
    }

    /// In-place form of [`component`](Self::component), for providers.
    pub fn push(&mut self, component: impl Into<ComponentMetadata>) -> &mut Self {
        self.components.push(component.into());
        self
    }

    /// In-place form of [`generic_bindable`](Self::generic_bindable).
    pub fn mark_generic_bindable(&mut self, template: GenericTemplate) -> &mut Self {
        self.generic_bindable.insert(template);
        self
    }

    pub fn build(self) -> MetadataIndex {
        let mut by_implementation = HashMap::new();
        for (position, component) in self.components.iter().enumerate() {
            by_implementation.entry(component.implementation).or_insert(position);
        }

        MetadataIndex {
            components: self.components,
            by_implementation,
            generic_bindable: self.generic_bindable,
        }
    }
}
