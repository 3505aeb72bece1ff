//! # Entity Registry
//!
//! Binds local entities to remote resources and owns the identity caches
//! that make every URI dereference to a single canonical instance.
//!
//! A registry is an ordinary value: build one per connection, per test, or
//! use [`EntityRegistry::global`] for the process-wide instance.
//!
//! ## Lifecycle of a binding
//!
//! | Operation | Entity slot | Identity cache |
//! |-----------|-------------|----------------|
//! | `bind` | filled (error if bound elsewhere) | entry overwritten with this instance |
//! | `bind_remote` | as `bind`, metadata fetched first | as `bind` |
//! | `unbind` | cleared (no-op if empty) | entry removed if it is this instance |
//! | `pull` | metadata refreshed, properties/labels overwritten | as `bind` |
//! | `push` | untouched | untouched |
//! | `clear` | untouched | all entries dropped |
//!
//! The slot change of `bind` and `unbind` and the matching cache change
//! happen under the per-kind cache lock.

use std::sync::OnceLock;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::cache::IdentityCache;
use crate::model::{Entity, Node, NodePointer, Relationship};
use crate::resource::{
    IntoResourceUri, Metadata, Resource, ResourceFetcher, ResourceUri, ResourceWriter,
    ServiceRoot,
};
use crate::{Error, Result};

/// Default number of cache insertions between sweeps of dead entries.
pub const DEFAULT_PRUNE_EVERY: usize = 64;

// ============================================================================
// Configuration
// ============================================================================

/// Registry configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// REST data endpoint that node pointers resolve against.
    pub service_root: ServiceRoot,
    /// Cache insertions between sweeps of dead entries; 0 disables sweeping.
    pub prune_every: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            service_root: ServiceRoot::default(),
            prune_every: DEFAULT_PRUNE_EVERY,
        }
    }
}

impl RegistryConfig {
    /// Load from `NEO4J_REST_URI` and `NEO4J_CACHE_PRUNE_EVERY`, falling back
    /// to the defaults for unset variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(uri) = lookup("NEO4J_REST_URI") {
            config.service_root = ServiceRoot::parse(&uri)
                .map_err(|e| Error::Config(format!("NEO4J_REST_URI: {e}")))?;
        }
        if let Some(every) = lookup("NEO4J_CACHE_PRUNE_EVERY") {
            config.prune_every = every.trim().parse().map_err(|e| {
                Error::Config(format!("NEO4J_CACHE_PRUNE_EVERY '{every}': {e}"))
            })?;
        }
        Ok(config)
    }
}

// ============================================================================
// EntityRegistry
// ============================================================================

/// Identity caches for nodes and relationships plus the binding operations
/// that keep them in step with entity state.
#[derive(Debug)]
pub struct EntityRegistry {
    config: RegistryConfig,
    nodes: IdentityCache<Node>,
    relationships: IdentityCache<Relationship>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            nodes: IdentityCache::new(config.prune_every),
            relationships: IdentityCache::new(config.prune_every),
            config,
        }
    }

    /// The process-wide registry, configured from the environment on first use.
    pub fn global() -> &'static EntityRegistry {
        static GLOBAL: OnceLock<EntityRegistry> = OnceLock::new();
        GLOBAL.get_or_init(|| {
            let config = RegistryConfig::from_env().unwrap_or_else(|e| {
                warn!("Ignoring invalid registry environment: {}", e);
                RegistryConfig::default()
            });
            EntityRegistry::with_config(config)
        })
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    pub fn service_root(&self) -> &ServiceRoot {
        &self.config.service_root
    }

    pub fn nodes(&self) -> &IdentityCache<Node> {
        &self.nodes
    }

    pub fn relationships(&self) -> &IdentityCache<Relationship> {
        &self.relationships
    }

    // ========================================================================
    // Binding
    // ========================================================================

    /// Bind `entity` to `uri` with the given metadata and make it the
    /// canonical instance for that URI.
    ///
    /// Fails with [`Error::Binding`] if the entity is bound to another URI.
    /// Binding again to the same URI refreshes the metadata.
    pub fn bind<E: Entity>(&self, entity: &E, uri: impl IntoResourceUri, metadata: Metadata) -> Result<()> {
        let uri = uri.into_resource_uri()?;
        let displaced = E::cache_in(self).bind(Resource::new(uri.clone(), metadata), entity)?;

        if let Some(displaced) = displaced {
            warn!(
                "{} <{}> rebound to a new local instance; previous instance (bound: {}) is no longer canonical",
                E::KIND,
                uri,
                displaced.is_bound()
            );
        }
        debug!("Bound {} to <{}>", E::KIND, uri);
        Ok(())
    }

    /// Fetch metadata for `uri` through `fetcher`, then [`bind`](Self::bind).
    ///
    /// Fetch failures are returned as produced by the fetcher and leave the
    /// entity untouched.
    pub async fn bind_remote<E, F>(&self, entity: &E, uri: impl IntoResourceUri, fetcher: &F) -> Result<()>
    where
        E: Entity,
        F: ResourceFetcher + ?Sized,
    {
        let uri = uri.into_resource_uri()?;
        entity.binding().check_compatible(&uri)?;
        let metadata = fetcher.fetch(&uri).await?;
        self.bind(entity, uri, metadata)
    }

    /// Clear the binding of `entity`. Returns whether it was bound.
    ///
    /// The cache entry for its URI is evicted only if it still refers to
    /// this instance. A relationship's endpoints are not affected.
    pub fn unbind<E: Entity>(&self, entity: &E) -> bool {
        let Some((uri, evicted)) = E::cache_in(self).unbind(entity) else {
            return false;
        };
        debug!("Unbound {} from <{}> (evicted: {})", E::KIND, uri, evicted);
        true
    }

    // ========================================================================
    // Pull / push
    // ========================================================================

    /// Refetch the resource `entity` is bound to and overwrite its local
    /// properties (and a node's labels) with the server's.
    ///
    /// Fails with [`Error::Unbound`] before fetching if the entity is not
    /// bound. Fetch failures leave the entity untouched.
    pub async fn pull<E, F>(&self, entity: &E, fetcher: &F) -> Result<()>
    where
        E: Entity,
        F: ResourceFetcher + ?Sized,
    {
        let uri = entity.uri().ok_or(Error::Unbound(E::KIND))?;
        let metadata = fetcher.fetch(&uri).await?;
        entity.refresh(&metadata);
        self.bind(entity, uri, metadata)
    }

    /// Write the local properties (and a node's labels) of `entity` to the
    /// resource it is bound to.
    ///
    /// Fails with [`Error::Unbound`] before writing if the entity is not
    /// bound. Writer failures are returned unchanged.
    pub async fn push<E, W>(&self, entity: &E, writer: &W) -> Result<()>
    where
        E: Entity,
        W: ResourceWriter + ?Sized,
    {
        let uri = entity.uri().ok_or(Error::Unbound(E::KIND))?;
        writer.store(&uri, &entity.update()).await?;
        debug!("Pushed {} to <{}>", E::KIND, uri);
        Ok(())
    }

    /// The live canonical instance for `uri`, if any.
    pub fn get<E: Entity>(&self, uri: &ResourceUri) -> Option<E> {
        E::cache_in(self).get(uri)
    }

    /// The live canonical node a pointer resolves to under the service root.
    pub fn node_at(&self, pointer: &NodePointer) -> Option<Node> {
        self.nodes.get(&pointer.resolve(&self.config.service_root))
    }

    /// Drop every cache entry. Entities keep their bindings.
    pub fn clear(&self) {
        self.nodes.clear();
        self.relationships.clear();
        debug!("Cleared identity caches");
    }

    // ========================================================================
    // Hydration
    // ========================================================================

    /// Materialize a node from its REST payload.
    ///
    /// Returns the canonical instance for the payload's `self` URI, creating
    /// one if none is alive, and overwrites its properties (`data`) and, when
    /// present, its labels (`metadata.labels`).
    pub fn hydrate_node(&self, metadata: Metadata) -> Result<Node> {
        let uri = ResourceUri::parse(required_str(&metadata, "self")?)?;
        let node = self.nodes.get(&uri).unwrap_or_default();
        node.refresh(&metadata);
        self.bind(&node, uri, metadata)?;
        Ok(node)
    }

    /// Materialize a relationship from its REST payload.
    ///
    /// Endpoints resolve through the node cache; endpoints with no live
    /// canonical instance become new nodes bound with empty metadata.
    pub fn hydrate_relationship(&self, metadata: Metadata) -> Result<Relationship> {
        let uri = ResourceUri::parse(required_str(&metadata, "self")?)?;

        if let Some(rel) = self.relationships.get(&uri) {
            rel.refresh(&metadata);
            self.bind(&rel, uri, metadata)?;
            return Ok(rel);
        }

        let start = self.endpoint(required_str(&metadata, "start")?)?;
        let end = self.endpoint(required_str(&metadata, "end")?)?;
        let rel = Relationship::new(&start, required_str(&metadata, "type")?, &end);
        rel.refresh(&metadata);
        self.bind(&rel, uri, metadata)?;
        Ok(rel)
    }

    fn endpoint(&self, uri: &str) -> Result<Node> {
        let uri = ResourceUri::parse(uri)?;
        if let Some(node) = self.nodes.get(&uri) {
            return Ok(node);
        }
        let node = Node::new();
        self.bind(&node, uri, Metadata::new())?;
        Ok(node)
    }
}

impl Default for EntityRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn required_str<'a>(metadata: &'a Metadata, key: &str) -> Result<&'a str> {
    metadata
        .get(key)
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| Error::Metadata(format!("missing string field '{key}'")))
}
