//! Slot table built from a frozen registration plan.
//!
//! Every resolvable producer gets a [`Slot`]: one per closed descriptor,
//! one per closing of an open generic descriptor, one per keyed
//! descriptor. Lookups return slot ids in plan order.

use std::collections::HashMap;
use std::fmt;

use once_cell::sync::OnceCell;
use rabt_support::rendering::suggest_similar;
use rabt_wiring::descriptor::{FactoryFn, Implementation, Instance, RegistrationDescriptor, RegistrationPlan};
use rabt_wiring::error::Result;
use rabt_wiring::key::{ServiceKey, TypeRef};
use rabt_wiring::keyed::ensure_unique_keys;
use rabt_wiring::lifetime::Lifetime;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct SlotId(pub(crate) usize);

/// One producer plus its singleton cell.
pub(crate) struct Slot {
    pub service: TypeRef,
    pub implementation: Option<TypeRef>,
    pub lifetime: Lifetime,
    pub producer: FactoryFn,
    /// Filled on first resolution of a singleton slot.
    pub singleton: OnceCell<Instance>,
}

impl fmt::Debug for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Slot")
            .field("service", &self.service)
            .field("implementation", &self.implementation)
            .field("lifetime", &self.lifetime)
            .field("initialized", &self.singleton.get().is_some())
            .finish()
    }
}

/// Immutable lookup tables over the slots of one container.
#[derive(Debug, Default)]
pub(crate) struct Registry {
    slots: Vec<Slot>,
    direct: HashMap<TypeRef, Vec<SlotId>>,
    closings: HashMap<TypeRef, Vec<SlotId>>,
    keyed: HashMap<(TypeRef, ServiceKey), SlotId>,
}

impl Registry {
    /// Consumes `plan`.
    ///
    /// # Errors
    /// [`RabtError::DuplicateKey`](rabt_wiring::error::RabtError::DuplicateKey)
    /// when the plan's keyed entries collide.
    pub fn from_plan(plan: RegistrationPlan) -> Result<Self> {
        let (descriptors, keyed) = plan.into_parts();
        ensure_unique_keys(&keyed)?;

        let mut registry = Registry::default();

        for descriptor in descriptors {
            let RegistrationDescriptor {
                service,
                implementation,
                lifetime,
            } = descriptor;

            match implementation {
                Implementation::OpenGeneric { implementation, closings } => {
                    debug!(service = %service, implementation = %implementation, closings = closings.len(), "Registered open generic");
                    for closing in closings {
                        let id = registry.push(closing.service, Some(closing.implementation), lifetime, closing.activate);
                        registry.closings.entry(closing.service).or_default().push(id);
                    }
                }
                closed => {
                    let Some(producer) = closed.producer() else {
                        continue;
                    };
                    let id = registry.push(service, closed.implementation_type().copied(), lifetime, producer);
                    registry.direct.entry(service).or_default().push(id);
                }
            }
        }

        for entry in keyed {
            let service = entry.descriptor.service;
            let Some(producer) = entry.descriptor.implementation.producer() else {
                warn!(service = %service, key = %entry.key, "Keyed open generic registration ignored");
                continue;
            };
            let implementation = entry.descriptor.implementation_type().copied();
            let id = registry.push(service, implementation, entry.descriptor.lifetime, producer);
            registry.keyed.insert((service, entry.key), id);
        }

        Ok(registry)
    }

    fn push(
        &mut self,
        service: TypeRef,
        implementation: Option<TypeRef>,
        lifetime: Lifetime,
        producer: FactoryFn,
    ) -> SlotId {
        let id = SlotId(self.slots.len());
        self.slots.push(Slot {
            service,
            implementation,
            lifetime,
            producer,
            singleton: OnceCell::new(),
        });
        id
    }

    #[inline]
    pub fn slot(&self, id: SlotId) -> &Slot {
        &self.slots[id.0]
    }

    /// The slot resolving a single `service`: the last direct registration,
    /// else the last open generic closing.
    pub fn resolve_slot(&self, service: &TypeRef) -> Option<SlotId> {
        self.direct
            .get(service)
            .and_then(|ids| ids.last())
            .or_else(|| self.closings.get(service).and_then(|ids| ids.last()))
            .copied()
    }

    /// Every slot of `service`: direct registrations first, then closings.
    pub fn all_slots(&self, service: &TypeRef) -> Vec<SlotId> {
        let direct = self.direct.get(service).into_iter().flatten();
        let closings = self.closings.get(service).into_iter().flatten();
        direct.chain(closings).copied().collect()
    }

    pub fn keyed_slot(&self, service: &TypeRef, key: &ServiceKey) -> Option<SlotId> {
        self.keyed.get(&(*service, key.clone())).copied()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Registered service names close to `requested`.
    pub fn suggestions(&self, requested: &TypeRef) -> Vec<String> {
        let mut names: Vec<String> = self.slots.iter().map(|slot| slot.service.short_name()).collect();
        names.sort();
        names.dedup();

        let available: Vec<&str> = names.iter().map(String::as_str).collect();
        suggest_similar(&requested.short_name(), &available, 3)
    }
}
