//! # Remote Resources
//!
//! A remote entity lives at a URI under a REST data endpoint. The
//! [`ResourceFetcher`] and [`ResourceWriter`] traits are the contract
//! between this crate and whatever transport actually talks to the server.
//!
//! ## Implementations
//!
//! | Fetcher / writer | Module | Description |
//! |------------------|--------|-------------|
//! | `MemoryResources` | `memory` | In-memory URI → metadata map for testing/offline use |

pub mod memory;

use std::collections::BTreeSet;
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{Error, Result};

pub use memory::MemoryResources;

/// Free-form metadata describing a remote resource, as returned by the server.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

// ============================================================================
// ResourceUri
// ============================================================================

/// Absolute URI of a remote resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ResourceUri(String);

impl ResourceUri {
    pub fn parse(uri: &str) -> Result<Self> {
        let parsed = Url::parse(uri).map_err(|e| Error::InvalidUri {
            uri: uri.to_string(),
            reason: e.to_string(),
        })?;
        if parsed.cannot_be_a_base() {
            return Err(Error::InvalidUri {
                uri: uri.to_string(),
                reason: "not a hierarchical URI".into(),
            });
        }
        // Keep the caller's spelling; `Url` would normalise e.g. default ports.
        Ok(Self(uri.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The server-assigned numeric id: the last path segment, if numeric.
    pub fn id(&self) -> Option<u64> {
        self.0
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .and_then(|seg| seg.parse().ok())
    }
}

impl fmt::Display for ResourceUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ResourceUri {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ResourceUri {
    type Error = Error;

    fn try_from(uri: String) -> Result<Self> {
        Self::parse(&uri)
    }
}

impl From<ResourceUri> for String {
    fn from(uri: ResourceUri) -> Self {
        uri.0
    }
}

/// Anything that can name a remote resource.
pub trait IntoResourceUri {
    fn into_resource_uri(self) -> Result<ResourceUri>;
}

impl IntoResourceUri for ResourceUri {
    fn into_resource_uri(self) -> Result<ResourceUri> { Ok(self) }
}

impl IntoResourceUri for &ResourceUri {
    fn into_resource_uri(self) -> Result<ResourceUri> { Ok(self.clone()) }
}

impl IntoResourceUri for &str {
    fn into_resource_uri(self) -> Result<ResourceUri> { ResourceUri::parse(self) }
}

impl IntoResourceUri for String {
    fn into_resource_uri(self) -> Result<ResourceUri> { ResourceUri::parse(&self) }
}

impl IntoResourceUri for &String {
    fn into_resource_uri(self) -> Result<ResourceUri> { ResourceUri::parse(self) }
}

// ============================================================================
// Resource
// ============================================================================

/// The binding record held by a bound entity: where it lives, and what the
/// server last said about it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub uri: ResourceUri,
    pub metadata: Metadata,
}

impl Resource {
    pub fn new(uri: ResourceUri, metadata: Metadata) -> Self {
        Self { uri, metadata }
    }

    pub fn id(&self) -> Option<u64> {
        self.uri.id()
    }
}

/// Parse a REST response body into metadata. The body must be a JSON object.
pub fn parse_metadata(body: &str) -> Result<Metadata> {
    match serde_json::from_str::<serde_json::Value>(body)? {
        serde_json::Value::Object(map) => Ok(map),
        other => Err(Error::Metadata(format!("expected a JSON object, got {other}"))),
    }
}

// ============================================================================
// ServiceRoot
// ============================================================================

/// Base URI of a REST data endpoint, e.g. `http://localhost:7474/db/data/`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ServiceRoot(Url);

impl ServiceRoot {
    pub fn parse(uri: &str) -> Result<Self> {
        let mut url = Url::parse(uri).map_err(|e| Error::InvalidUri {
            uri: uri.to_string(),
            reason: e.to_string(),
        })?;
        if url.cannot_be_a_base() {
            return Err(Error::InvalidUri {
                uri: uri.to_string(),
                reason: "service root must be a hierarchical URI".into(),
            });
        }
        // Entity URIs are built by appending path segments
        if url.query().is_some() || url.fragment().is_some() {
            return Err(Error::InvalidUri {
                uri: uri.to_string(),
                reason: "service root cannot carry a query or fragment".into(),
            });
        }
        // Url::join replaces the last segment unless the path ends in '/'
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        Ok(Self(url))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn node_uri(&self, id: u64) -> ResourceUri {
        self.entity_uri("node", id)
    }

    pub fn relationship_uri(&self, id: u64) -> ResourceUri {
        self.entity_uri("relationship", id)
    }

    /// Whether `uri` names a resource under this root.
    pub fn contains(&self, uri: &ResourceUri) -> bool {
        uri.as_str().starts_with(self.as_str())
    }

    fn entity_uri(&self, collection: &str, id: u64) -> ResourceUri {
        ResourceUri(format!("{}{collection}/{id}", self.0))
    }
}

impl Default for ServiceRoot {
    fn default() -> Self {
        Self(Url::parse("http://localhost:7474/db/data/").expect("static URI is valid"))
    }
}

impl fmt::Display for ServiceRoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_str())
    }
}

impl TryFrom<String> for ServiceRoot {
    type Error = Error;

    fn try_from(uri: String) -> Result<Self> {
        Self::parse(&uri)
    }
}

impl From<ServiceRoot> for String {
    fn from(root: ServiceRoot) -> Self {
        root.0.into()
    }
}

// ============================================================================
// ResourceFetcher
// ============================================================================

/// Fetches resource metadata from the server.
///
/// Errors are returned to the binding caller exactly as produced here.
#[async_trait]
pub trait ResourceFetcher: Send + Sync {
    async fn fetch(&self, uri: &ResourceUri) -> Result<Metadata>;
}

// ============================================================================
// ResourceWriter
// ============================================================================

/// Local entity state sent back to the server by a push.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceUpdate {
    /// Full property set; replaces the stored `data`.
    pub properties: serde_json::Map<String, serde_json::Value>,
    /// Full label set for nodes; `None` for relationships.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<BTreeSet<String>>,
}

/// Writes entity state to the server.
///
/// Errors are returned to the pushing caller exactly as produced here.
#[async_trait]
pub trait ResourceWriter: Send + Sync {
    async fn store(&self, uri: &ResourceUri, update: &ResourceUpdate) -> Result<()>;
}
