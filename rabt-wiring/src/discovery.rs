//! Discovery feeds: where component metadata comes from.
//!
//! Two feeds are supported:
//! - [`ComponentProvider`]: a module of related component declarations,
//!   added explicitly to a [`MetadataIndexBuilder`].
//! - Compile-time registration through `inventory`: every
//!   [`ComponentRegistration`] submitted anywhere in the binary is picked
//!   up by [`MetadataIndex::discover`].
//!
//! # Examples
//! ```rust,ignore
//! fn describe_orders(index: &mut MetadataIndexBuilder) {
//!     index.push(
//!         Component::new(|_| Ok(OrderService))
//!             .implements::<dyn Orders>(|it| it as Arc<dyn Orders>)
//!             .service::<dyn Orders>(LifetimeKind::Scoped),
//!     );
//! }
//!
//! inventory::submit! {
//!     ComponentRegistration::new("orders::OrderService", describe_orders)
//! }
//!
//! let index = MetadataIndex::discover();
//! ```

use tracing::{debug, info};

use crate::metadata::{MetadataIndex, MetadataIndexBuilder};

/// A module that declares related components.
///
/// Split declarations by domain instead of one giant block:
///
/// ```rust,ignore
/// let index = MetadataIndex::builder()
///     .add_provider(&OrdersProvider)
///     .add_provider(&BillingProvider)
///     .build();
/// ```
pub trait ComponentProvider: Send + Sync {
    /// Declares components into the index builder.
    ///
    /// Called once per scan; declaration order is discovery order.
    fn describe(&self, index: &mut MetadataIndexBuilder);

    /// Human-readable name for logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// A component declaration submitted through `inventory`.
pub struct ComponentRegistration {
    name: &'static str,
    describe: fn(&mut MetadataIndexBuilder),
}

impl ComponentRegistration {
    /// `name` orders discovery, so keep it unique and stable (a module path works well).
    pub const fn new(name: &'static str, describe: fn(&mut MetadataIndexBuilder)) -> Self {
        Self { name, describe }
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

inventory::collect!(ComponentRegistration);

impl MetadataIndex {
    /// Builds an index from every submitted [`ComponentRegistration`].
    ///
    /// Link order is not stable, so registrations run sorted by name.
    pub fn discover() -> MetadataIndex {
        MetadataIndex::discover_into(MetadataIndex::builder())
    }

    /// Like [`discover`](Self::discover), appending to an existing builder.
    pub fn discover_into(mut builder: MetadataIndexBuilder) -> MetadataIndex {
        let mut registrations: Vec<&ComponentRegistration> = inventory::iter::<ComponentRegistration>
            .into_iter()
            .collect();
        registrations.sort_by_key(|registration| registration.name);

        for registration in &registrations {
            debug!(registration = registration.name, "Describing registered components");
            (registration.describe)(&mut builder);
        }

        let index = builder.build();
        info!(
            registrations = registrations.len(),
            components = index.len(),
            "Discovered components"
        );
        index
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::lifetime::LifetimeKind;
    use crate::metadata::Component;

    trait Greeter: Send + Sync {}
    struct English;
    struct French;
    impl Greeter for English {}
    impl Greeter for French {}

    struct GreetingProvider;

    impl ComponentProvider for GreetingProvider {
        fn describe(&self, index: &mut MetadataIndexBuilder) {
            index
                .push(
                    Component::new(|_| Ok(English))
                        .implements::<dyn Greeter>(|it| it as Arc<dyn Greeter>)
                        .service::<dyn Greeter>(LifetimeKind::EnumerableTransient),
                )
                .push(
                    Component::new(|_| Ok(French))
                        .implements::<dyn Greeter>(|it| it as Arc<dyn Greeter>)
                        .service::<dyn Greeter>(LifetimeKind::EnumerableTransient),
                );
        }
    }

    fn describe_french_only(index: &mut MetadataIndexBuilder) {
        index.push(Component::new(|_| Ok(French)).self_service(LifetimeKind::Singleton));
    }

    fn describe_english_only(index: &mut MetadataIndexBuilder) {
        index.push(Component::new(|_| Ok(English)).self_service(LifetimeKind::Singleton));
    }

    inventory::submit! {
        ComponentRegistration::new("discovery::tests::b_french", describe_french_only)
    }

    inventory::submit! {
        ComponentRegistration::new("discovery::tests::a_english", describe_english_only)
    }

    #[test]
    fn provider_declares_in_order() {
        let index = MetadataIndex::builder().add_provider(&GreetingProvider).build();
        assert_eq!(index.len(), 2);
        assert!(index.components()[0].implementation().type_name().ends_with("English"));
        assert!(index.components()[1].implementation().type_name().ends_with("French"));
    }

    #[test]
    fn provider_has_name() {
        assert!(GreetingProvider.name().contains("GreetingProvider"));
    }

    #[test]
    fn inventory_discovery_is_sorted_by_name() {
        let index = MetadataIndex::discover();
        let names: Vec<String> = index
            .components()
            .iter()
            .map(|c| c.implementation().short_name())
            .collect();

        let english = names.iter().position(|n| n == "English").unwrap();
        let french = names.iter().position(|n| n == "French").unwrap();
        assert!(english < french);
    }
}
