//! Error types for registration planning and resolution.
//!
//! Composition errors ([`RabtError::BindingMismatch`],
//! [`RabtError::UnsupportedLifetime`], [`RabtError::UndeclaredDecorationTarget`],
//! [`RabtError::DuplicateKey`]) are structural: they surface while the plan
//! is built and abort the whole pass. The remaining variants come from a
//! host container resolving a finished plan.

use std::fmt;

use rabt_support::rendering::render_path;

use crate::key::{ServiceKey, TypeRef};

/// Main error type for all Rabt operations.
#[derive(Debug, thiserror::Error)]
pub enum RabtError {
    /// Implementation does not satisfy its declared service type.
    #[error("{}", .0)]
    BindingMismatch(BindingMismatchError),

    /// A lifetime tag that the current operation cannot handle.
    #[error("{}", .0)]
    UnsupportedLifetime(UnsupportedLifetimeError),

    /// A decorator targets a service type that was never registered.
    #[error("{}", .0)]
    UndeclaredDecorationTarget(UndeclaredDecorationTargetError),

    /// Two keyed bindings share service type and key.
    #[error("{}", .0)]
    DuplicateKey(DuplicateKeyError),

    /// Requested service has no registration.
    #[error("{}", .0)]
    NotRegistered(NotRegisteredError),

    /// Resolution re-entered a service that is still being constructed.
    #[error("{}", .0)]
    CircularDependency(CircularDependencyError),

    /// Factory failed or produced an instance of the wrong shape.
    #[error("Failed to construct {service}: {source}")]
    ConstructionFailed {
        service: TypeRef,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl RabtError {
    /// Builds a [`RabtError::ConstructionFailed`] from a message.
    pub fn construction(service: TypeRef, message: impl Into<String>) -> Self {
        RabtError::ConstructionFailed {
            service,
            source: message.into().into(),
        }
    }
}

/// Error when an implementation does not satisfy its declared service.
#[derive(Debug)]
pub struct BindingMismatchError {
    pub implementation: TypeRef,
    pub service: TypeRef,
    /// Why the binding was rejected, when more specific than "not implemented".
    pub detail: Option<String>,
}

impl fmt::Display for BindingMismatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Type {} does not implement {}",
            self.implementation.type_name(),
            self.service.type_name()
        )?;
        if let Some(ref detail) = self.detail {
            write!(f, "\n  {detail}")?;
        }
        write!(
            f,
            "\n  Hint: declare the conformance with .implements::<{}>(...) on the component",
            self.service.short_name()
        )
    }
}

/// Error when a lifetime tag reaches an operation that cannot handle it.
#[derive(Debug)]
pub struct UnsupportedLifetimeError {
    pub tag: String,
    /// Where the tag was rejected.
    pub context: &'static str,
}

impl fmt::Display for UnsupportedLifetimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Unsupported lifetime {:?} in {}", self.tag, self.context)
    }
}

/// Error when a decorator targets an unregistered service.
#[derive(Debug)]
pub struct UndeclaredDecorationTargetError {
    pub service: TypeRef,
    pub decorators: Vec<TypeRef>,
}

impl fmt::Display for UndeclaredDecorationTargetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Service type {} is not registered", self.service.type_name())?;
        let names: Vec<String> = self.decorators.iter().map(TypeRef::short_name).collect();
        write!(f, "\n  Decorated by: {}", names.join(", "))?;
        write!(f, "\n  Hint: a service must be registered before it can be decorated")
    }
}

/// Error when two keyed bindings collide.
#[derive(Debug)]
pub struct DuplicateKeyError {
    pub service: TypeRef,
    pub key: ServiceKey,
    pub first: TypeRef,
    pub second: TypeRef,
}

impl fmt::Display for DuplicateKeyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Duplicate key {} for {}: claimed by {} and {}",
            self.key, self.service, self.first, self.second
        )
    }
}

/// Error when a service was not registered.
#[derive(Debug)]
pub struct NotRegisteredError {
    pub requested: TypeRef,
    pub key: Option<ServiceKey>,
    /// Registered services with similar names
    pub suggestions: Vec<String>,
}

impl fmt::Display for NotRegisteredError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Service not registered: {}", self.requested.type_name())?;
        if let Some(ref key) = self.key {
            write!(f, " (key={key})")?;
        }

        if !self.suggestions.is_empty() {
            write!(f, "\n  Did you mean one of:")?;
            for suggestion in &self.suggestions {
                write!(f, "\n    - {suggestion}")?;
            }
        }
        Ok(())
    }
}

/// Error when resolution loops back on itself.
///
/// Shows the chain of services so the cycle is visible.
#[derive(Debug)]
pub struct CircularDependencyError {
    /// Example: `[A, B, A]`
    pub chain: Vec<TypeRef>,
}

impl fmt::Display for CircularDependencyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self.chain.iter().map(TypeRef::short_name).collect();
        write!(f, "Circular dependency detected:\n  {}", render_path(&names))
    }
}

/// Convenient Result type for Rabt operations.
pub type Result<T> = std::result::Result<T, RabtError>;

#[cfg(test)]
mod tests {
    use super::*;

    trait Operation {}
    struct Operation0;
    struct LoggingDecorator;

    #[test]
    fn binding_mismatch_names_both_types() {
        let err = RabtError::BindingMismatch(BindingMismatchError {
            implementation: TypeRef::of::<Operation0>(),
            service: TypeRef::of::<dyn Operation>(),
            detail: None,
        });

        let msg = err.to_string();
        assert!(msg.contains("Operation0"));
        assert!(msg.contains("does not implement"));
        assert!(msg.contains("dyn"));
    }

    #[test]
    fn undeclared_target_lists_decorators() {
        let err = RabtError::UndeclaredDecorationTarget(UndeclaredDecorationTargetError {
            service: TypeRef::of::<dyn Operation>(),
            decorators: vec![TypeRef::of::<LoggingDecorator>()],
        });

        let msg = err.to_string();
        assert!(msg.contains("not registered"));
        assert!(msg.contains("LoggingDecorator"));
    }

    #[test]
    fn circular_dependency_renders_arrows() {
        let err = RabtError::CircularDependency(CircularDependencyError {
            chain: vec![TypeRef::of::<String>(), TypeRef::of::<i32>(), TypeRef::of::<String>()],
        });

        let msg = err.to_string();
        assert!(msg.contains("Circular"));
        assert!(msg.contains("String → i32 → String"));
    }

    #[test]
    fn not_registered_mentions_key() {
        let err = RabtError::NotRegistered(NotRegisteredError {
            requested: TypeRef::of::<String>(),
            key: Some(ServiceKey::from("eu")),
            suggestions: vec!["alloc::string::Strin".into()],
        });

        let msg = err.to_string();
        assert!(msg.contains("key=\"eu\""));
        assert!(msg.contains("Did you mean"));
    }
}
