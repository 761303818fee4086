//! Registration planning for Rabt.
//!
//! Turns declared component metadata into an ordered plan of service
//! registrations: lifetimes, `TryAdd`/enumerable deduplication, open
//! generic bindings, keyed registrations and decorator chains.

pub mod autowiring;
pub mod decorator;
pub mod dedup;
pub mod descriptor;
pub mod discovery;
pub mod error;
pub mod generic;
pub mod key;
pub mod keyed;
pub mod lifetime;
pub mod metadata;
pub mod planner;

pub use autowiring::{Autowiring, AutowiringSettings};
pub use descriptor::{
    FactoryFn, Implementation, Instance, KeyedRegistrationDescriptor, RegistrationDescriptor, RegistrationPlan,
    Resolver, ResolverApi,
};
pub use discovery::{ComponentProvider, ComponentRegistration};
pub use error::{RabtError, Result};
pub use key::{GenericTemplate, ServiceKey, TypeRef};
pub use lifetime::{Lifetime, LifetimeKind};
pub use metadata::{Component, MetadataIndex, MetadataIndexBuilder, OpenComponent};

#[doc(hidden)]
pub use inventory;
