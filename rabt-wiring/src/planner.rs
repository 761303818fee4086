//! Turns service bindings into an ordered registration plan.

use tracing::{debug, info, instrument};

use crate::descriptor::{Implementation, RegistrationDescriptor, RegistrationPlan};
use crate::error::{BindingMismatchError, RabtError, Result};
use crate::generic::{GenericInterfaceResolver, ServicePair};
use crate::metadata::{ComponentMetadata, MetadataIndex};

/// Plans every [`ServiceBinding`](crate::metadata::ServiceBinding) of an index.
///
/// Components are visited in discovery order and bindings in declaration
/// order, so `TryAdd` first-wins behaviour is reproducible.
pub struct RegistrationPlanner<'a> {
    index: &'a MetadataIndex,
    allow_empty_generic_bindings: bool,
}

impl<'a> RegistrationPlanner<'a> {
    pub fn new(index: &'a MetadataIndex) -> Self {
        Self {
            index,
            allow_empty_generic_bindings: false,
        }
    }

    pub fn allow_empty_generic_bindings(mut self, allow: bool) -> Self {
        self.allow_empty_generic_bindings = allow;
        self
    }

    /// Plans into a fresh [`RegistrationPlan`].
    pub fn plan(&self) -> Result<RegistrationPlan> {
        let mut plan = RegistrationPlan::new();
        self.plan_into(&mut plan)?;
        Ok(plan)
    }

    /// Plans into `plan`, admitting against whatever it already holds.
    ///
    /// # Errors
    /// [`RabtError::BindingMismatch`] on the first misconfigured binding;
    /// `plan` may then hold part of the pass and should be discarded.
    #[instrument(skip_all, fields(components = self.index.len(), seeded = plan.len()))]
    pub fn plan_into(&self, plan: &mut RegistrationPlan) -> Result<()> {
        let resolver = GenericInterfaceResolver::new(self.index)
            .allow_empty_generic_bindings(self.allow_empty_generic_bindings);

        let mut admitted = 0usize;
        let mut discarded = 0usize;

        for component in self.index.components() {
            for binding in component.service_bindings() {
                let pairs = resolver.resolve(component.implementation(), binding.service.as_ref())?;
                for pair in pairs {
                    let descriptor = RegistrationDescriptor::new(
                        pair.service,
                        implementation_for(component, &pair)?,
                        binding.lifetime.lifetime(),
                    );
                    if plan.admit(descriptor, binding.lifetime.policy()) {
                        admitted += 1;
                    } else {
                        discarded += 1;
                    }
                }
            }
        }

        info!(admitted, discarded, total = plan.len(), "Planned service registrations");
        Ok(())
    }
}

fn implementation_for(component: &ComponentMetadata, pair: &ServicePair) -> Result<Implementation> {
    if pair.implementation.is_open_generic() || pair.service.is_open_generic() {
        let closings = component.closings_for(&pair.service);
        debug!(
            service = %pair.service,
            implementation = %pair.implementation,
            closings = closings.len(),
            "Collected generic closings"
        );
        return Ok(Implementation::OpenGeneric {
            implementation: pair.implementation,
            closings,
        });
    }

    let activate = component.producer_for(&pair.service).ok_or_else(|| {
        RabtError::BindingMismatch(BindingMismatchError {
            implementation: pair.implementation,
            service: pair.service,
            detail: Some("No upcast is declared for this service".to_string()),
        })
    })?;

    Ok(Implementation::Type {
        implementation: pair.implementation,
        activate,
    })
}
