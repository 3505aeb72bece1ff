//! Relationship (edge) in the property graph.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use parking_lot::RwLock;

use super::entity::{entity_eq, entity_hash, Binding, Entity, EntityKind, Sealed};
use super::{property_map, Node, PropertyMap, Value};
use crate::cache::IdentityCache;
use crate::registry::EntityRegistry;
use crate::resource::{Metadata, ResourceUpdate};

/// A relationship (directed edge) in the property graph.
///
/// The endpoints and type are fixed at construction. Endpoints are node
/// handles with their own binding lifecycle: binding or unbinding a
/// relationship never touches its nodes.
#[derive(Clone)]
pub struct Relationship {
    inner: Arc<RelationshipInner>,
}

#[doc(hidden)]
pub struct RelationshipInner {
    binding: Binding,
    start: Node,
    end: Node,
    rel_type: String,
    properties: RwLock<PropertyMap>,
}

impl Relationship {
    pub fn new(start: &Node, rel_type: impl Into<String>, end: &Node) -> Self {
        Self {
            inner: Arc::new(RelationshipInner {
                binding: Binding::default(),
                start: start.clone(),
                end: end.clone(),
                rel_type: rel_type.into(),
                properties: RwLock::new(PropertyMap::new()),
            }),
        }
    }

    pub fn with_property(self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    pub fn start(&self) -> &Node {
        &self.inner.start
    }

    pub fn end(&self) -> &Node {
        &self.inner.end
    }

    pub fn rel_type(&self) -> &str {
        &self.inner.rel_type
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.inner.properties.read().get(key).cloned()
    }

    /// Setting `Value::Null` removes the property, as on the server.
    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        match value.into() {
            Value::Null => { self.inner.properties.write().remove(&key); }
            value => { self.inner.properties.write().insert(key, value); }
        }
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        self.inner.properties.write().remove(key)
    }

    pub fn properties(&self) -> PropertyMap {
        self.inner.properties.read().clone()
    }

    pub(crate) fn replace_properties(&self, properties: PropertyMap) {
        *self.inner.properties.write() = properties;
    }
}

impl Sealed for Relationship {}

impl Entity for Relationship {
    type Inner = RelationshipInner;

    const KIND: EntityKind = EntityKind::Relationship;

    fn handle(&self) -> &Arc<RelationshipInner> {
        &self.inner
    }

    fn from_handle(handle: Arc<RelationshipInner>) -> Self {
        Self { inner: handle }
    }

    fn binding(&self) -> &Binding {
        &self.inner.binding
    }

    fn cache_in(registry: &EntityRegistry) -> &IdentityCache<Self> {
        registry.relationships()
    }

    /// Endpoints and type are fixed; only `data` is taken.
    fn refresh(&self, metadata: &Metadata) {
        self.replace_properties(
            metadata.get("data").map(property_map::from_json).unwrap_or_default(),
        );
    }

    fn update(&self) -> ResourceUpdate {
        ResourceUpdate {
            properties: property_map::to_json(self.properties()),
            labels: None,
        }
    }
}

impl PartialEq for Relationship {
    fn eq(&self, other: &Self) -> bool {
        entity_eq(self, other)
    }
}

impl Eq for Relationship {}

impl Hash for Relationship {
    fn hash<H: Hasher>(&self, state: &mut H) {
        entity_hash(self, state)
    }
}

impl fmt::Debug for Relationship {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Relationship")
            .field("uri", &self.uri().map(String::from))
            .field("start", &self.inner.start.uri().map(String::from))
            .field("type", &self.inner.rel_type)
            .field("end", &self.inner.end.uri().map(String::from))
            .field("properties", &*self.inner.properties.read())
            .finish()
    }
}
