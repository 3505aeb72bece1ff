//! Entity: the behaviour shared by nodes and relationships.
//!
//! An entity is a shared handle (`Arc` inside). Cloning a `Node` yields
//! another handle to the *same* node; [`Entity::same`] tests that identity.
//! Each entity carries a [`Binding`] slot which, once filled, records the
//! remote resource the entity stands for.

use std::hash::{Hash, Hasher};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::cache::IdentityCache;
use crate::registry::EntityRegistry;
use crate::resource::{Metadata, Resource, ResourceUpdate, ResourceUri};
use crate::{Error, Result};

/// Entity kinds. Each kind has its own identity cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Node,
    Relationship,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityKind::Node => f.write_str("node"),
            EntityKind::Relationship => f.write_str("relationship"),
        }
    }
}

// ============================================================================
// Binding slot
// ============================================================================

/// The remote resource an entity is bound to, if any.
///
/// The URI of a filled slot never changes: the slot has to be cleared
/// before it can be filled with a different URI.
#[derive(Debug, Default)]
pub struct Binding {
    resource: RwLock<Option<Resource>>,
}

impl Binding {
    pub(crate) fn resource(&self) -> Option<Resource> {
        self.resource.read().clone()
    }

    pub(crate) fn uri(&self) -> Option<ResourceUri> {
        self.resource.read().as_ref().map(|r| r.uri.clone())
    }

    pub(crate) fn is_bound(&self) -> bool {
        self.resource.read().is_some()
    }

    /// Fill the slot. Re-attaching the same URI refreshes the metadata.
    pub(crate) fn attach(&self, resource: Resource) -> Result<()> {
        let mut slot = self.resource.write();
        if let Some(current) = slot.as_ref() {
            if current.uri != resource.uri {
                return Err(Error::Binding {
                    current: current.uri.to_string(),
                    requested: resource.uri.to_string(),
                });
            }
        }
        *slot = Some(resource);
        Ok(())
    }

    /// Fail early if the slot holds a URI other than `uri`.
    pub(crate) fn check_compatible(&self, uri: &ResourceUri) -> Result<()> {
        match self.resource.read().as_ref() {
            Some(current) if current.uri != *uri => Err(Error::Binding {
                current: current.uri.to_string(),
                requested: uri.to_string(),
            }),
            _ => Ok(()),
        }
    }

    pub(crate) fn detach(&self) -> Option<Resource> {
        self.resource.write().take()
    }
}

// ============================================================================
// Entity trait
// ============================================================================

mod private {
    pub trait Sealed {}
}

pub(crate) use private::Sealed;

/// A local object standing for a remote node or relationship.
///
/// Sealed: implemented by [`Node`](super::Node) and
/// [`Relationship`](super::Relationship) only.
pub trait Entity: Clone + Send + Sync + Sealed + 'static {
    /// Shared state behind the handle.
    type Inner: Send + Sync;

    const KIND: EntityKind;

    #[doc(hidden)]
    fn handle(&self) -> &Arc<Self::Inner>;

    #[doc(hidden)]
    fn from_handle(handle: Arc<Self::Inner>) -> Self;

    #[doc(hidden)]
    fn binding(&self) -> &Binding;

    #[doc(hidden)]
    fn cache_in(registry: &EntityRegistry) -> &IdentityCache<Self>;

    /// Overwrite local state from a REST payload.
    #[doc(hidden)]
    fn refresh(&self, metadata: &Metadata);

    /// Local state in the form a push sends it.
    #[doc(hidden)]
    fn update(&self) -> ResourceUpdate;

    /// Whether `self` and `other` are handles to the same instance.
    fn same(&self, other: &Self) -> bool {
        Arc::ptr_eq(self.handle(), other.handle())
    }

    fn is_bound(&self) -> bool {
        self.binding().is_bound()
    }

    fn resource(&self) -> Option<Resource> {
        self.binding().resource()
    }

    fn uri(&self) -> Option<ResourceUri> {
        self.binding().uri()
    }

    /// Server-assigned id, taken from the bound URI.
    fn id(&self) -> Option<u64> {
        self.uri().and_then(|uri| uri.id())
    }
}

/// Entity equality: by URI when both are bound, by identity when both are
/// unbound, never across the two states.
pub(crate) fn entity_eq<E: Entity>(a: &E, b: &E) -> bool {
    if a.same(b) {
        return true;
    }
    match (a.uri(), b.uri()) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}

pub(crate) fn entity_hash<E: Entity, H: Hasher>(entity: &E, state: &mut H) {
    match entity.uri() {
        Some(uri) => {
            true.hash(state);
            uri.hash(state);
        }
        None => {
            false.hash(state);
            (Arc::as_ptr(entity.handle()) as usize).hash(state);
        }
    }
}
