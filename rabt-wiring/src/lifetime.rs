//! Service lifetimes and registration modes.
//!
//! A [`Lifetime`] decides how long a resolved instance lives:
//! - [`Lifetime::Singleton`]: one instance for the whole container
//! - [`Lifetime::Scoped`]: one instance per scope (e.g. a request)
//! - [`Lifetime::Transient`]: a new instance on every resolve
//!
//! A [`LifetimeKind`] is what a component declares: a lifetime plus the
//! [`AdmissionPolicy`] used when its descriptor joins the plan.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{RabtError, UnsupportedLifetimeError};

/// Caching policy of a resolved instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Lifetime {
    /// Created on first resolve, shared until the container is dropped.
    Singleton,
    /// Created on first resolve within a scope, dropped with the scope.
    Scoped,
    /// Never cached.
    Transient,
}

impl fmt::Display for Lifetime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lifetime::Singleton => write!(f, "Singleton"),
            Lifetime::Scoped => write!(f, "Scoped"),
            Lifetime::Transient => write!(f, "Transient"),
        }
    }
}

/// How a candidate descriptor is admitted into the plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdmissionPolicy {
    /// Always appended.
    Add,
    /// Appended only if no descriptor with the same service and lifetime exists.
    TryAdd,
    /// Appended unless the same service/implementation pair already exists.
    Enumerable,
}

/// Lifetime declared by a service binding.
///
/// Parses from its tag name, so bindings can come from configuration:
/// ```
/// use rabt_wiring::lifetime::{AdmissionPolicy, Lifetime, LifetimeKind};
///
/// let kind: LifetimeKind = "TryAddScoped".parse().unwrap();
/// assert_eq!(kind.lifetime(), Lifetime::Scoped);
/// assert_eq!(kind.policy(), AdmissionPolicy::TryAdd);
///
/// assert!("Forever".parse::<LifetimeKind>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "&'static str")]
pub enum LifetimeKind {
    Transient,
    Scoped,
    Singleton,
    TryAddTransient,
    TryAddScoped,
    TryAddSingleton,
    EnumerableTransient,
    EnumerableScoped,
    EnumerableSingleton,
}

impl LifetimeKind {
    pub const ALL: [LifetimeKind; 9] = [
        LifetimeKind::Transient,
        LifetimeKind::Scoped,
        LifetimeKind::Singleton,
        LifetimeKind::TryAddTransient,
        LifetimeKind::TryAddScoped,
        LifetimeKind::TryAddSingleton,
        LifetimeKind::EnumerableTransient,
        LifetimeKind::EnumerableScoped,
        LifetimeKind::EnumerableSingleton,
    ];

    /// The caching lifetime of the resulting descriptor.
    pub fn lifetime(&self) -> Lifetime {
        match self {
            LifetimeKind::Transient | LifetimeKind::TryAddTransient | LifetimeKind::EnumerableTransient => {
                Lifetime::Transient
            }
            LifetimeKind::Scoped | LifetimeKind::TryAddScoped | LifetimeKind::EnumerableScoped => Lifetime::Scoped,
            LifetimeKind::Singleton | LifetimeKind::TryAddSingleton | LifetimeKind::EnumerableSingleton => {
                Lifetime::Singleton
            }
        }
    }

    pub fn policy(&self) -> AdmissionPolicy {
        match self {
            LifetimeKind::Transient | LifetimeKind::Scoped | LifetimeKind::Singleton => AdmissionPolicy::Add,
            LifetimeKind::TryAddTransient | LifetimeKind::TryAddScoped | LifetimeKind::TryAddSingleton => {
                AdmissionPolicy::TryAdd
            }
            LifetimeKind::EnumerableTransient | LifetimeKind::EnumerableScoped | LifetimeKind::EnumerableSingleton => {
                AdmissionPolicy::Enumerable
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LifetimeKind::Transient => "Transient",
            LifetimeKind::Scoped => "Scoped",
            LifetimeKind::Singleton => "Singleton",
            LifetimeKind::TryAddTransient => "TryAddTransient",
            LifetimeKind::TryAddScoped => "TryAddScoped",
            LifetimeKind::TryAddSingleton => "TryAddSingleton",
            LifetimeKind::EnumerableTransient => "EnumerableTransient",
            LifetimeKind::EnumerableScoped => "EnumerableScoped",
            LifetimeKind::EnumerableSingleton => "EnumerableSingleton",
        }
    }

    /// Narrows this kind to a plain lifetime, as keyed registrations require.
    ///
    /// # Errors
    /// [`RabtError::UnsupportedLifetime`] for `TryAdd*` and `Enumerable*` kinds.
    pub fn plain(&self, context: &'static str) -> Result<Lifetime, RabtError> {
        match self.policy() {
            AdmissionPolicy::Add => Ok(self.lifetime()),
            AdmissionPolicy::TryAdd | AdmissionPolicy::Enumerable => {
                Err(RabtError::UnsupportedLifetime(UnsupportedLifetimeError {
                    tag: self.as_str().to_string(),
                    context,
                }))
            }
        }
    }
}

impl FromStr for LifetimeKind {
    type Err = RabtError;

    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        LifetimeKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == tag)
            .ok_or_else(|| {
                RabtError::UnsupportedLifetime(UnsupportedLifetimeError {
                    tag: tag.to_string(),
                    context: "lifetime tag",
                })
            })
    }
}

impl TryFrom<String> for LifetimeKind {
    type Error = RabtError;

    fn try_from(tag: String) -> Result<Self, Self::Error> {
        tag.parse()
    }
}

impl From<LifetimeKind> for &'static str {
    fn from(kind: LifetimeKind) -> Self {
        kind.as_str()
    }
}

impl fmt::Display for LifetimeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
