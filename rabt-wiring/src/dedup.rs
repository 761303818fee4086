//! Per-lifetime admission rules for candidate descriptors.
//!
//! - `Add` (any lifetime): always appended, duplicates allowed.
//! - `TryAdd`: appended only if no descriptor shares service type and lifetime.
//! - `Enumerable`: appended unless the same service/implementation pair exists;
//!   distinct implementations of one service coexist.

use tracing::{debug, trace};

use crate::descriptor::RegistrationDescriptor;
use crate::key::TypeRef;
use crate::lifetime::{AdmissionPolicy, Lifetime};

/// Why a candidate was discarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscardReason {
    /// A descriptor with the same service and lifetime already exists.
    ServiceRegistered { service: TypeRef, lifetime: Lifetime },
    /// The same implementation is already registered for the service.
    ImplementationRegistered { service: TypeRef, implementation: TypeRef },
}

/// What the plan should do with a candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    Append,
    Discard(DiscardReason),
}

/// Applies [`AdmissionPolicy`] against the descriptors admitted so far.
pub struct LifetimeDeduper;

impl LifetimeDeduper {
    /// Decides whether `candidate` joins `existing`.
    pub fn admit(
        candidate: &RegistrationDescriptor,
        policy: AdmissionPolicy,
        existing: &[RegistrationDescriptor],
    ) -> Admission {
        let admission = match policy {
            AdmissionPolicy::Add => Admission::Append,
            AdmissionPolicy::TryAdd => {
                let taken = existing
                    .iter()
                    .any(|d| d.service == candidate.service && d.lifetime == candidate.lifetime);
                if taken {
                    Admission::Discard(DiscardReason::ServiceRegistered {
                        service: candidate.service,
                        lifetime: candidate.lifetime,
                    })
                } else {
                    Admission::Append
                }
            }
            AdmissionPolicy::Enumerable => match candidate.implementation_type() {
                Some(implementation) if Self::has_pair(existing, &candidate.service, implementation) => {
                    Admission::Discard(DiscardReason::ImplementationRegistered {
                        service: candidate.service,
                        implementation: *implementation,
                    })
                }
                _ => Admission::Append,
            },
        };

        match &admission {
            Admission::Append => trace!(
                service = %candidate.service,
                lifetime = %candidate.lifetime,
                ?policy,
                "Admitted descriptor"
            ),
            Admission::Discard(reason) => debug!(
                service = %candidate.service,
                ?policy,
                ?reason,
                "Discarded duplicate descriptor"
            ),
        }
        admission
    }

    fn has_pair(existing: &[RegistrationDescriptor], service: &TypeRef, implementation: &TypeRef) -> bool {
        existing
            .iter()
            .any(|d| d.service == *service && d.implementation_type() == Some(implementation))
    }
}
