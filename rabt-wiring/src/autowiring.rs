//! The composition pass: plan, decorate, then resolve keyed bindings.
//!
//! # Examples
//! ```
//! use std::sync::Arc;
//! use rabt_wiring::autowiring::Autowiring;
//! use rabt_wiring::lifetime::LifetimeKind;
//! use rabt_wiring::metadata::{Component, MetadataIndex};
//!
//! trait Clock: Send + Sync {}
//! struct SystemClock;
//! impl Clock for SystemClock {}
//!
//! let index = MetadataIndex::builder()
//!     .component(
//!         Component::new(|_| Ok(SystemClock))
//!             .implements::<dyn Clock>(|it| it as Arc<dyn Clock>)
//!             .service::<dyn Clock>(LifetimeKind::Singleton),
//!     )
//!     .build();
//!
//! let plan = Autowiring::new(&index).build_plan().unwrap();
//! assert_eq!(plan.len(), 1);
//! ```

use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::decorator::DecoratorComposer;
use crate::descriptor::RegistrationPlan;
use crate::error::Result;
use crate::keyed::{KeyedRegistrar, ensure_unique_keys};
use crate::metadata::MetadataIndex;
use crate::planner::RegistrationPlanner;

/// Switches for the composition pass.
///
/// Missing fields take their defaults, so partial configuration works:
///
/// ```
/// use rabt_wiring::autowiring::AutowiringSettings;
///
/// let settings: AutowiringSettings = serde_json::from_str(r#"{ "decorators": false }"#).unwrap();
/// assert!(!settings.decorators);
/// assert!(settings.keyed_services);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutowiringSettings {
    /// Compose decorator chains after planning.
    pub decorators: bool,
    /// Resolve keyed bindings.
    pub keyed_services: bool,
    /// Skip (with a warning) closed implementations that declare a
    /// generic-bindable service but implement no tagged interface.
    pub allow_empty_generic_bindings: bool,
}

impl Default for AutowiringSettings {
    fn default() -> Self {
        Self {
            decorators: true,
            keyed_services: true,
            allow_empty_generic_bindings: false,
        }
    }
}

/// Runs the composition pass over one [`MetadataIndex`].
pub struct Autowiring<'a> {
    index: &'a MetadataIndex,
    settings: AutowiringSettings,
}

impl<'a> Autowiring<'a> {
    pub fn new(index: &'a MetadataIndex) -> Self {
        Self {
            index,
            settings: AutowiringSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: AutowiringSettings) -> Self {
        self.settings = settings;
        self
    }

    #[inline]
    pub fn settings(&self) -> &AutowiringSettings {
        &self.settings
    }

    /// Plans service bindings into `plan`, then composes decorators.
    ///
    /// `plan` may be pre-seeded; seeded descriptors take part in
    /// deduplication and can be decorated. On error `plan` is left as it was.
    #[instrument(skip_all, fields(components = self.index.len()))]
    pub fn register(&self, plan: &mut RegistrationPlan) -> Result<()> {
        let mut working = plan.clone();

        RegistrationPlanner::new(self.index)
            .allow_empty_generic_bindings(self.settings.allow_empty_generic_bindings)
            .plan_into(&mut working)?;

        if self.settings.decorators {
            let composed = DecoratorComposer::new(self.index).compose(working.descriptors())?;
            working.replace_descriptors(composed);
        }

        *plan = working;
        Ok(())
    }

    /// Appends keyed descriptors to `plan`.
    ///
    /// # Errors
    /// [`RabtError::DuplicateKey`](crate::error::RabtError::DuplicateKey) also
    /// covers collisions with keyed entries already in `plan`.
    #[instrument(skip_all, fields(components = self.index.len()))]
    pub fn register_keyed(&self, plan: &mut RegistrationPlan) -> Result<()> {
        if !self.settings.keyed_services {
            return Ok(());
        }

        let keyed = KeyedRegistrar::new(self.index).resolve_keyed()?;
        ensure_unique_keys(plan.keyed().iter().chain(keyed.iter()))?;
        plan.extend_keyed(keyed);
        Ok(())
    }

    /// Runs the whole pass into a fresh plan.
    pub fn build_plan(&self) -> Result<RegistrationPlan> {
        let mut plan = RegistrationPlan::new();
        self.register(&mut plan)?;
        self.register_keyed(&mut plan)?;
        info!(
            descriptors = plan.len(),
            keyed = plan.keyed().len(),
            "Registration plan ready"
        );
        Ok(plan)
    }
}
