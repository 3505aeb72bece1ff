//! Node in the property graph.

use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use parking_lot::RwLock;

use super::entity::{entity_eq, entity_hash, Binding, Entity, EntityKind, Sealed};
use super::{property_map, PropertyMap, Value};
use crate::cache::IdentityCache;
use crate::registry::EntityRegistry;
use crate::resource::{Metadata, ResourceUpdate};

/// A node in the property graph.
///
/// `Node` is a handle: clones share labels, properties and binding.
#[derive(Clone)]
pub struct Node {
    inner: Arc<NodeInner>,
}

#[doc(hidden)]
#[derive(Default)]
pub struct NodeInner {
    binding: Binding,
    labels: RwLock<BTreeSet<String>>,
    properties: RwLock<PropertyMap>,
}

impl Node {
    /// A new, unbound node with no labels and no properties.
    pub fn new() -> Self {
        Self { inner: Arc::new(NodeInner::default()) }
    }

    pub fn with_label(self, label: impl Into<String>) -> Self {
        self.add_label(label);
        self
    }

    pub fn with_labels(self, labels: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.inner.labels.write().extend(labels.into_iter().map(Into::into));
        self
    }

    pub fn with_property(self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    pub fn labels(&self) -> BTreeSet<String> {
        self.inner.labels.read().clone()
    }

    pub fn has_label(&self, label: &str) -> bool {
        self.inner.labels.read().contains(label)
    }

    /// Returns `false` if the label was already present.
    pub fn add_label(&self, label: impl Into<String>) -> bool {
        self.inner.labels.write().insert(label.into())
    }

    pub fn remove_label(&self, label: &str) -> bool {
        self.inner.labels.write().remove(label)
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

    pub(crate) fn replace_labels(&self, labels: BTreeSet<String>) {
        *self.inner.labels.write() = labels;
    }
}

/// Labels listed under `metadata.labels`, if the payload carries them.
fn labels_of(metadata: &Metadata) -> Option<BTreeSet<String>> {
    let labels = metadata.get("metadata")?.get("labels")?.as_array()?;
    Some(labels.iter().filter_map(|l| l.as_str().map(str::to_owned)).collect())
}

impl Default for Node {
    fn default() -> Self {
        Self::new()
    }
}

impl Sealed for Node {}

impl Entity for Node {
    type Inner = NodeInner;

    const KIND: EntityKind = EntityKind::Node;

    fn handle(&self) -> &Arc<NodeInner> {
        &self.inner
    }

    fn from_handle(handle: Arc<NodeInner>) -> Self {
        Self { inner: handle }
    }

    fn binding(&self) -> &Binding {
        &self.inner.binding
    }

    fn cache_in(registry: &EntityRegistry) -> &IdentityCache<Self> {
        registry.nodes()
    }

    /// Properties come from `data`; labels only when the payload lists them.
    fn refresh(&self, metadata: &Metadata) {
        self.replace_properties(
            metadata.get("data").map(property_map::from_json).unwrap_or_default(),
        );
        if let Some(labels) = labels_of(metadata) {
            self.replace_labels(labels);
        }
    }

    fn update(&self) -> ResourceUpdate {
        ResourceUpdate {
            properties: property_map::to_json(self.properties()),
            labels: Some(self.labels()),
        }
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        entity_eq(self, other)
    }
}

impl Eq for Node {}

impl Hash for Node {
    fn hash<H: Hasher>(&self, state: &mut H) {
        entity_hash(self, state)
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("uri", &self.uri().map(String::from))
            .field("labels", &*self.inner.labels.read())
            .field("properties", &*self.inner.properties.read())
            .finish()
    }
}
