//! Service/implementation pairing, including open generics.
//!
//! Given an implementation and the service type a binding declares, the
//! resolver decides which `(service, implementation)` pairs to register:
//!
//! | declared service                 | implementation | pairs                                       |
//! |----------------------------------|----------------|---------------------------------------------|
//! | none                             | any            | `(impl, impl)`                              |
//! | generic-bindable                 | open generic   | `(service definition, impl definition)`     |
//! | generic-bindable                 | closed         | `(iface definition, impl)` per tagged iface |
//! | anything else                    | closed         | `(service, impl)` if impl satisfies service |
//!
//! Open generics pair only through a generic-bindable service; any other
//! open declaration, or an open implementation bound to anything but
//! itself, is a mismatch.

use tracing::{trace, warn};

use crate::error::{BindingMismatchError, RabtError, Result};
use crate::key::TypeRef;
use crate::metadata::TypeCatalog;

/// A service type paired with the implementation registered for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServicePair {
    pub service: TypeRef,
    pub implementation: TypeRef,
}

impl ServicePair {
    fn new(service: TypeRef, implementation: TypeRef) -> Self {
        Self { service, implementation }
    }
}

/// Pairs implementations with service types using a [`TypeCatalog`].
pub struct GenericInterfaceResolver<'a, C: TypeCatalog + ?Sized> {
    catalog: &'a C,
    allow_empty_generic_bindings: bool,
}

impl<'a, C: TypeCatalog + ?Sized> GenericInterfaceResolver<'a, C> {
    pub fn new(catalog: &'a C) -> Self {
        Self {
            catalog,
            allow_empty_generic_bindings: false,
        }
    }

    /// Tolerate closed implementations that implement no tagged generic interface.
    pub fn allow_empty_generic_bindings(mut self, allow: bool) -> Self {
        self.allow_empty_generic_bindings = allow;
        self
    }

    /// Resolves the pairs to register for one service binding.
    ///
    /// # Errors
    /// [`RabtError::BindingMismatch`] when `implementation` does not satisfy
    /// `declared`, when an open generic is bound through a service that is
    /// not generic-bindable, or when a generic-bindable declaration matches
    /// no interface.
    pub fn resolve(&self, implementation: &TypeRef, declared: Option<&TypeRef>) -> Result<Vec<ServicePair>> {
        let Some(declared) = declared else {
            return Ok(vec![ServicePair::new(*implementation, *implementation)]);
        };

        if self.catalog.is_generic_bindable(declared) {
            if implementation.is_open_generic() {
                return self.open_pair(implementation, declared);
            }
            return self.closed_pairs(implementation, declared);
        }

        if (declared.is_open_generic() || implementation.is_open_generic()) && implementation != declared {
            let definition = declared.definition().unwrap_or(*declared);
            return Err(mismatch(
                implementation,
                declared,
                Some(format!("{definition} is not generic-bindable")),
            ));
        }

        if self.catalog.implements(implementation, declared) {
            trace!(service = %declared, implementation = %implementation, "Direct binding");
            return Ok(vec![ServicePair::new(*declared, *implementation)]);
        }

        Err(mismatch(implementation, declared, None))
    }

    fn open_pair(&self, implementation: &TypeRef, declared: &TypeRef) -> Result<Vec<ServicePair>> {
        let (Some(service), Some(definition)) = (declared.definition(), implementation.definition()) else {
            return Err(mismatch(implementation, declared, None));
        };

        if let (Some(service_template), Some(impl_template)) = (service.template(), definition.template()) {
            if service_template.arity() != impl_template.arity() {
                return Err(mismatch(
                    implementation,
                    declared,
                    Some(format!(
                        "Generic arity differs: {service_template} vs {impl_template}"
                    )),
                ));
            }
        }

        trace!(service = %service, implementation = %definition, "Open generic binding");
        Ok(vec![ServicePair::new(service, definition)])
    }

    fn closed_pairs(&self, implementation: &TypeRef, declared: &TypeRef) -> Result<Vec<ServicePair>> {
        let mut pairs: Vec<ServicePair> = Vec::new();
        for interface in self.catalog.interfaces_of(implementation) {
            let Some(definition) = interface.definition() else {
                continue;
            };
            if !self.catalog.is_generic_bindable(&definition) {
                continue;
            }
            let pair = ServicePair::new(definition, *implementation);
            if !pairs.contains(&pair) {
                trace!(service = %definition, implementation = %implementation, "Closed generic binding");
                pairs.push(pair);
            }
        }

        if pairs.is_empty() {
            if self.allow_empty_generic_bindings {
                warn!(
                    service = %declared,
                    implementation = %implementation,
                    "No generic-bindable interface implemented; binding skipped"
                );
            } else {
                return Err(mismatch(
                    implementation,
                    declared,
                    Some("No implemented interface has a generic-bindable definition".to_string()),
                ));
            }
        }
        Ok(pairs)
    }
}

fn mismatch(implementation: &TypeRef, service: &TypeRef, detail: Option<String>) -> RabtError {
    RabtError::BindingMismatch(BindingMismatchError {
        implementation: *implementation,
        service: *service,
        detail,
    })
}
