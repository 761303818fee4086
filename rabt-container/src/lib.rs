//! Host container for Rabt registration plans.

pub mod container;
mod registry;
mod scope;

pub use container::{Container, ContainerBuilder, ScopedContainer, prelude};
