//! # neo4j-remote — Local Entities for Remote Graph Resources
//!
//! Maps the nodes and relationships exposed by a Neo4j REST endpoint onto
//! local shared-handle objects, and keeps those objects reconciled.
//!
//! ## Design Principles
//!
//! 1. **Entities are handles**: `Node` and `Relationship` clone as handles;
//!    "the same entity" means the same instance, not equal fields
//! 2. **One canonical instance per URI**: `EntityRegistry` owns a weak
//!    identity cache per entity kind
//! 3. **Explicit reconciliation**: `coalesce` merges references or fails,
//!    it never guesses
//! 4. **Transport is a collaborator**: metadata arrives through the
//!    `ResourceFetcher` trait and leaves through `ResourceWriter`
//!
//! ## Quick Start
//!
//! ```rust
//! use neo4j_remote::{EntityRegistry, Node, Metadata, coalesce, Reference};
//!
//! # fn example() -> neo4j_remote::Result<()> {
//! let registry = EntityRegistry::new();
//!
//! let alice = Node::new().with_label("Person").with_property("name", "Alice");
//! registry.bind(&alice, "http://localhost:7474/db/data/node/1", Metadata::new())?;
//!
//! // A second local object for the same remote node
//! let also_alice = Node::new();
//! registry.bind(&also_alice, "http://localhost:7474/db/data/node/1", Metadata::new())?;
//!
//! let merged = coalesce(Reference::from(&alice), Reference::from(&also_alice))?;
//! assert!(merged.same(&Reference::from(&alice)));
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod model;
pub mod resource;
pub mod cache;
pub mod registry;
pub mod coalesce;

// ============================================================================
// Re-exports: Model
// ============================================================================

pub use model::{
    Entity, EntityKind, Node, NodePointer, Path, PropertyMap, Relationship, Value,
};

// ============================================================================
// Re-exports: Resources, caching and binding
// ============================================================================

pub use resource::{
    IntoResourceUri, Metadata, MemoryResources, Resource, ResourceFetcher, ResourceUpdate,
    ResourceUri, ResourceWriter, ServiceRoot, parse_metadata,
};
pub use cache::IdentityCache;
pub use registry::{EntityRegistry, RegistryConfig};
pub use coalesce::{coalesce, Reference};

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Binding error: entity is bound to <{current}>, cannot bind to <{requested}>")]
    Binding { current: String, requested: String },

    #[error("Join error: {0}")]
    Join(String),

    #[error("Type error: expected {expected}, got {got}")]
    TypeError { expected: String, got: String },

    #[error("Invalid URI <{uri}>: {reason}")]
    InvalidUri { uri: String, reason: String },

    #[error("Metadata error: {0}")]
    Metadata(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unbound {0}: no remote resource to address")]
    Unbound(model::EntityKind),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
