//! Decorator chains.
//!
//! Every decorator binding of one service type is folded around the
//! service's existing registration. The base registration is normalized to
//! a producer, then each decorator wraps the producer before it:
//!
//! ```text
//! orders 0, 1 around Base  =>  D0(D1(Base))
//! ```
//!
//! A decorator's activator asks its [`Resolver`] for the decorated service
//! like any other dependency. While the activator runs, that resolver is a
//! [`DecoratingResolver`] answering the decorated service with the inner
//! producer, so a decorator never resolves itself.

use std::collections::HashMap;
use std::sync::Arc;

use rabt_support::rendering::render_decorator_chain;
use tracing::{debug, info, instrument};

use crate::descriptor::{FactoryFn, Implementation, Instance, RegistrationDescriptor, Resolver};
use crate::error::{BindingMismatchError, RabtError, Result, UndeclaredDecorationTargetError};
use crate::key::{ServiceKey, TypeRef};
use crate::metadata::MetadataIndex;

/// Resolver handed to a decorator while it is constructed.
pub struct DecoratingResolver<'a> {
    ambient: &'a dyn Resolver,
    service: TypeRef,
    inner: &'a FactoryFn,
}

impl<'a> DecoratingResolver<'a> {
    pub fn new(ambient: &'a dyn Resolver, service: TypeRef, inner: &'a FactoryFn) -> Self {
        Self { ambient, service, inner }
    }
}

impl Resolver for DecoratingResolver<'_> {
    fn resolve_instance(&self, service: &TypeRef) -> Result<Instance> {
        if *service == self.service {
            return (self.inner)(self.ambient);
        }
        self.ambient.resolve_instance(service)
    }

    fn resolve_all_instances(&self, service: &TypeRef) -> Result<Vec<Instance>> {
        self.ambient.resolve_all_instances(service)
    }

    fn resolve_keyed_instance(&self, service: &TypeRef, key: &ServiceKey) -> Result<Instance> {
        self.ambient.resolve_keyed_instance(service, key)
    }
}

/// One decorator in a chain.
#[derive(Clone)]
struct Layer {
    decorator: TypeRef,
    order: i32,
    producer: FactoryFn,
}

/// Decorators of one service, sorted outermost first.
struct DecoratorChain {
    service: TypeRef,
    layers: Vec<Layer>,
}

impl DecoratorChain {
    fn decorators(&self) -> Vec<TypeRef> {
        self.layers.iter().map(|layer| layer.decorator).collect()
    }

    /// Folds the layers around `base`, innermost first.
    fn wrap(&self, base: FactoryFn) -> FactoryFn {
        self.layers.iter().rev().fold(base, |inner, layer| {
            let service = self.service;
            let producer = layer.producer.clone();
            let wrapped: FactoryFn = Arc::new(move |ambient: &dyn Resolver| {
                let resolver = DecoratingResolver::new(ambient, service, &inner);
                producer(&resolver)
            });
            wrapped
        })
    }
}

/// Replaces decorated registrations with composed factory registrations.
pub struct DecoratorComposer<'a> {
    index: &'a MetadataIndex,
}

impl<'a> DecoratorComposer<'a> {
    pub fn new(index: &'a MetadataIndex) -> Self {
        Self { index }
    }

    /// Returns `descriptors` with every decorated service replaced in place.
    ///
    /// The composed descriptor keeps the position and lifetime of the
    /// registration it replaces. The first non-open-generic descriptor of
    /// the service is the one decorated.
    ///
    /// # Errors
    /// - [`RabtError::UndeclaredDecorationTarget`] when the service has no registration
    /// - [`RabtError::BindingMismatch`] when a decorator does not implement the service
    #[instrument(skip_all, fields(descriptors = descriptors.len()))]
    pub fn compose(&self, descriptors: &[RegistrationDescriptor]) -> Result<Vec<RegistrationDescriptor>> {
        let chains = self.chains()?;
        let mut composed = descriptors.to_vec();

        for chain in &chains {
            let position = descriptors
                .iter()
                .position(|d| d.service == chain.service && !d.is_open_generic())
                .ok_or_else(|| {
                    RabtError::UndeclaredDecorationTarget(UndeclaredDecorationTargetError {
                        service: chain.service,
                        decorators: chain.decorators(),
                    })
                })?;

            let original = &descriptors[position];
            let base = original.implementation.producer().ok_or_else(|| {
                RabtError::UndeclaredDecorationTarget(UndeclaredDecorationTargetError {
                    service: chain.service,
                    decorators: chain.decorators(),
                })
            })?;

            let names: Vec<String> = chain.layers.iter().map(|layer| layer.decorator.short_name()).collect();
            let base_name = original
                .implementation
                .implementation_type()
                .map_or_else(|| "(factory)".to_string(), TypeRef::short_name);
            debug!(
                service = %chain.service,
                position,
                lifetime = %original.lifetime,
                chain = %render_decorator_chain(&names, &base_name),
                "Composed decorator chain"
            );

            composed[position] = RegistrationDescriptor::new(
                chain.service,
                Implementation::Factory {
                    produces: chain.layers.first().map(|layer| layer.decorator),
                    factory: chain.wrap(base),
                },
                original.lifetime,
            );
        }

        info!(services = chains.len(), "Applied decorators");
        Ok(composed)
    }

    /// Groups decorator bindings by service in first-seen order.
    fn chains(&self) -> Result<Vec<DecoratorChain>> {
        let mut chains: Vec<DecoratorChain> = Vec::new();
        let mut by_service: HashMap<TypeRef, usize> = HashMap::new();

        for component in self.index.components() {
            for binding in component.decorator_bindings() {
                let producer = component.producer_for(&binding.service).ok_or_else(|| {
                    RabtError::BindingMismatch(BindingMismatchError {
                        implementation: *component.implementation(),
                        service: binding.service,
                        detail: Some("A decorator must implement the service it decorates".to_string()),
                    })
                })?;

                let slot = *by_service.entry(binding.service).or_insert_with(|| {
                    chains.push(DecoratorChain {
                        service: binding.service,
                        layers: Vec::new(),
                    });
                    chains.len() - 1
                });
                chains[slot].layers.push(Layer {
                    decorator: *component.implementation(),
                    order: binding.order,
                    producer,
                });
            }
        }

        for chain in &mut chains {
            // stable: equal orders keep discovery order
            chain.layers.sort_by_key(|layer| layer.order);
        }
        Ok(chains)
    }
}
