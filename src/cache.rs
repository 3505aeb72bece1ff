//! Identity cache: one canonical local instance per remote URI.
//!
//! Entries hold `Weak` references, so the cache never keeps an entity
//! alive. Once every handle to a cached entity is dropped its entry is
//! dead: lookups miss and the next dereference of that URI builds a fresh
//! canonical instance.
//!
//! Eviction through [`IdentityCache::remove`] compares the stored entry with
//! the requesting instance by pointer identity. A stale unbind that arrives
//! after a `clear()` and a rebind therefore cannot evict the new binding.
//!
//! Lock order: the cache mutex is taken before an entity's binding slot.
//! [`IdentityCache::bind`] and [`IdentityCache::unbind`] change the slot with
//! the mutex held, so a slot change and its cache change are one step.

use std::sync::{Arc, Weak};

use hashbrown::HashMap;
use parking_lot::Mutex;
use tracing::trace;

use crate::model::Entity;
use crate::resource::{Resource, ResourceUri};
use crate::Result;

/// Per-kind map from resource URI to the canonical entity instance.
pub struct IdentityCache<E: Entity> {
    state: Mutex<CacheState<E>>,
    /// Dead entries are swept after this many insertions; 0 disables sweeping.
    prune_every: usize,
}

struct CacheState<E: Entity> {
    entries: HashMap<ResourceUri, Weak<E::Inner>>,
    puts_since_prune: usize,
}

impl<E: Entity> IdentityCache<E> {
    pub fn new(prune_every: usize) -> Self {
        Self {
            state: Mutex::new(CacheState {
                entries: HashMap::new(),
                puts_since_prune: 0,
            }),
            prune_every,
        }
    }

    /// The canonical instance for `uri`, if one is alive.
    pub fn get(&self, uri: &ResourceUri) -> Option<E> {
        let state = self.state.lock();
        let hit = state
            .entries
            .get(uri)
            .and_then(Weak::upgrade)
            .map(E::from_handle);
        trace!("{} cache {} for <{}>", E::KIND, if hit.is_some() { "hit" } else { "miss" }, uri);
        hit
    }

    /// Register `entity` as canonical for `uri`, replacing any previous entry.
    ///
    /// Returns the displaced instance when a *different* live instance was
    /// canonical before.
    pub fn put(&self, uri: ResourceUri, entity: &E) -> Option<E> {
        self.insert(&mut self.state.lock(), uri, entity)
    }

    /// Fill the binding slot of `entity` and register it as canonical, as
    /// one step. Nothing is registered if the slot refuses the resource.
    pub(crate) fn bind(&self, resource: Resource, entity: &E) -> Result<Option<E>> {
        let mut state = self.state.lock();
        let uri = resource.uri.clone();
        entity.binding().attach(resource)?;
        Ok(self.insert(&mut state, uri, entity))
    }

    /// Clear the binding slot of `entity` and evict its entry if it is the
    /// canonical one, as one step. Returns the old URI and whether the
    /// entry was evicted, or `None` if the entity was unbound.
    pub(crate) fn unbind(&self, entity: &E) -> Option<(ResourceUri, bool)> {
        let mut state = self.state.lock();
        let resource = entity.binding().detach()?;
        let evicted = Self::evict(&mut state, &resource.uri, entity);
        Some((resource.uri, evicted))
    }

    fn insert(&self, state: &mut CacheState<E>, uri: ResourceUri, entity: &E) -> Option<E> {
        let previous = state
            .entries
            .insert(uri, Arc::downgrade(entity.handle()))
            .and_then(|weak| weak.upgrade())
            .map(E::from_handle)
            .filter(|previous| !previous.same(entity));

        state.puts_since_prune += 1;
        if self.prune_every > 0 && state.puts_since_prune >= self.prune_every {
            let swept = Self::sweep(state);
            trace!("{} cache swept {} dead entries", E::KIND, swept);
        }
        previous
    }

    /// Evict the entry for `uri` only if it refers to `entity` itself.
    pub fn remove(&self, uri: &ResourceUri, entity: &E) -> bool {
        Self::evict(&mut self.state.lock(), uri, entity)
    }

    fn evict(state: &mut CacheState<E>, uri: &ResourceUri, entity: &E) -> bool {
        let owned = state
            .entries
            .get(uri)
            .is_some_and(|weak| std::ptr::eq(weak.as_ptr(), Arc::as_ptr(entity.handle())));
        if owned {
            state.entries.remove(uri);
        }
        owned
    }

    /// Drop every entry. Cached entities are not notified and stay bound.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.entries.clear();
        state.puts_since_prune = 0;
    }

    /// Sweep entries whose instance has been dropped. Returns how many went.
    pub fn prune(&self) -> usize {
        Self::sweep(&mut self.state.lock())
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.state
            .lock()
            .entries
            .values()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn sweep(state: &mut CacheState<E>) -> usize {
        let before = state.entries.len();
        state.entries.retain(|_, weak| weak.strong_count() > 0);
        state.puts_since_prune = 0;
        before - state.entries.len()
    }
}

impl<E: Entity> Default for IdentityCache<E> {
    fn default() -> Self {
        Self::new(crate::registry::DEFAULT_PRUNE_EVERY)
    }
}

impl<E: Entity> std::fmt::Debug for IdentityCache<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityCache")
            .field("kind", &E::KIND)
            .field("entries", &self.state.lock().entries.len())
            .field("prune_every", &self.prune_every)
            .finish()
    }
}
