//! Per-scope instance caches.
//!
//! Lifetimes decide where a resolved instance is kept:
//! - `Singleton`: in the slot itself, shared by every scope of a container
//! - `Scoped`: in the [`ScopeCache`] of the scope that resolved it
//! - `Transient`: nowhere
//!
//! The root [`Container`](crate::container::Container) owns a cache of its
//! own, so scoped services resolved outside any child scope live as long
//! as the container.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use rabt_wiring::descriptor::Instance;
use rabt_wiring::error::Result;

use crate::registry::SlotId;

static NEXT_SCOPE_ID: AtomicU64 = AtomicU64::new(0);

/// Scoped instances of one scope, keyed by slot.
#[derive(Debug)]
pub(crate) struct ScopeCache {
    id: u64,
    instances: DashMap<SlotId, Instance>,
}

impl ScopeCache {
    pub fn new() -> Self {
        Self {
            id: NEXT_SCOPE_ID.fetch_add(1, Ordering::Relaxed),
            instances: DashMap::new(),
        }
    }

    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Returns the cached instance of `slot`, creating it with `init` if absent.
    ///
    /// `init` runs without holding a shard lock, since it may resolve other
    /// scoped services. If two threads race, the first stored instance wins.
    pub fn get_or_try_insert(&self, slot: SlotId, init: impl FnOnce() -> Result<Instance>) -> Result<Instance> {
        if let Some(existing) = self.instances.get(&slot) {
            return Ok(existing.clone());
        }

        let created = init()?;
        Ok(self.instances.entry(slot).or_insert(created).clone())
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use rabt_wiring::descriptor::instance_of;
    use rabt_wiring::error::RabtError;
    use rabt_wiring::key::TypeRef;

    fn slot(n: usize) -> SlotId {
        SlotId(n)
    }

    #[test]
    fn scope_ids_are_unique() {
        assert_ne!(ScopeCache::new().id(), ScopeCache::new().id());
    }

    #[test]
    fn init_runs_once_per_slot() {
        let cache = ScopeCache::new();
        let mut calls = 0;

        let a = cache
            .get_or_try_insert(slot(0), || {
                calls += 1;
                Ok(instance_of(Arc::new(1u8)))
            })
            .unwrap();
        let b = cache.get_or_try_insert(slot(0), || panic!("cached")).unwrap();

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(calls, 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn failed_init_caches_nothing() {
        let cache = ScopeCache::new();
        let result = cache.get_or_try_insert(slot(1), || Err(RabtError::construction(TypeRef::of::<u8>(), "boom")));

        assert!(result.is_err());
        assert_eq!(cache.len(), 0);
    }
}
