//! Keyed registrations.

use std::collections::HashMap;

use tracing::{debug, info, instrument};

use crate::descriptor::{Implementation, KeyedRegistrationDescriptor, RegistrationDescriptor};
use crate::error::{BindingMismatchError, DuplicateKeyError, RabtError, Result};
use crate::key::{ServiceKey, TypeRef};
use crate::metadata::MetadataIndex;

/// Maps [`KeyedBinding`](crate::metadata::KeyedBinding)s to keyed descriptors.
pub struct KeyedRegistrar<'a> {
    index: &'a MetadataIndex,
}

impl<'a> KeyedRegistrar<'a> {
    pub fn new(index: &'a MetadataIndex) -> Self {
        Self { index }
    }

    /// One descriptor per keyed binding, in discovery order.
    ///
    /// # Errors
    /// - [`RabtError::UnsupportedLifetime`] for `TryAdd*`/`Enumerable*` tags
    /// - [`RabtError::BindingMismatch`] when the implementation does not satisfy the service
    /// - [`RabtError::DuplicateKey`] when two bindings share service and key
    #[instrument(skip_all, fields(components = self.index.len()))]
    pub fn resolve_keyed(&self) -> Result<Vec<KeyedRegistrationDescriptor>> {
        let mut keyed = Vec::new();

        for component in self.index.components() {
            let implementation = *component.implementation();
            for binding in component.keyed_bindings() {
                let lifetime = binding.lifetime.plain("keyed registration")?;
                let service = binding.service.unwrap_or(implementation);
                let activate = component.producer_for(&service).ok_or_else(|| {
                    RabtError::BindingMismatch(BindingMismatchError {
                        implementation,
                        service,
                        detail: Some(format!("Keyed binding {}", binding.key)),
                    })
                })?;

                debug!(service = %service, key = %binding.key, implementation = %implementation, %lifetime, "Keyed registration");
                keyed.push(KeyedRegistrationDescriptor {
                    key: binding.key.clone(),
                    descriptor: RegistrationDescriptor::new(
                        service,
                        Implementation::Type { implementation, activate },
                        lifetime,
                    ),
                });
            }
        }

        ensure_unique_keys(&keyed)?;
        info!(keyed = keyed.len(), "Resolved keyed registrations");
        Ok(keyed)
    }
}

/// Fails on the first `(service, key)` pair claimed twice.
pub fn ensure_unique_keys<'a>(keyed: impl IntoIterator<Item = &'a KeyedRegistrationDescriptor>) -> Result<()> {
    let mut claimed: HashMap<(TypeRef, &ServiceKey), TypeRef> = HashMap::new();

    for entry in keyed {
        let service = *entry.service();
        let claimant = entry.descriptor.implementation_type().copied().unwrap_or(service);
        if let Some(first) = claimed.insert((service, &entry.key), claimant) {
            return Err(RabtError::DuplicateKey(DuplicateKeyError {
                service,
                key: entry.key.clone(),
                first,
                second: claimant,
            }));
        }
    }
    Ok(())
}
