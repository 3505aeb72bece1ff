//! In-memory resource fetcher.
//!
//! Holds a URI → metadata map behind a `RwLock`. Serves as the reference
//! `ResourceFetcher` and `ResourceWriter` for tests and for code that works
//! from already downloaded payloads.
//!
//! ## Limitations
//!
//! - **No server semantics**: metadata is returned exactly as inserted;
//!   a store only rewrites `data` and `metadata.labels`.
//! - **Failures are injected**: `fail_with()` makes every fetch and store
//!   return a transport error until `heal()` is called.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;

use super::{Metadata, ResourceFetcher, ResourceUpdate, ResourceUri, ResourceWriter, ServiceRoot};
use crate::{Error, Result};

/// In-memory map of remote resources.
#[derive(Clone, Default)]
pub struct MemoryResources {
    inner: Arc<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    resources: RwLock<HashMap<ResourceUri, Metadata>>,
    failure: RwLock<Option<String>>,
    fetches: AtomicU64,
}

impl MemoryResources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, uri: ResourceUri, metadata: Metadata) {
        self.inner.resources.write().insert(uri, metadata);
    }

    pub fn remove(&self, uri: &ResourceUri) -> Option<Metadata> {
        self.inner.resources.write().remove(uri)
    }

    /// Register a node payload in the REST layout (`self`, `data`,
    /// `metadata.labels`) and return its URI.
    pub fn insert_node(
        &self,
        root: &ServiceRoot,
        id: u64,
        labels: &[&str],
        data: serde_json::Value,
    ) -> ResourceUri {
        let uri = root.node_uri(id);
        let mut metadata = Metadata::new();
        metadata.insert("self".into(), uri.as_str().into());
        metadata.insert("data".into(), data);
        metadata.insert(
            "metadata".into(),
            serde_json::json!({ "id": id, "labels": labels }),
        );
        self.insert(uri.clone(), metadata);
        uri
    }

    /// Register a relationship payload in the REST layout (`self`, `start`,
    /// `end`, `type`, `data`) and return its URI.
    pub fn insert_relationship(
        &self,
        root: &ServiceRoot,
        id: u64,
        start: &ResourceUri,
        rel_type: &str,
        end: &ResourceUri,
        data: serde_json::Value,
    ) -> ResourceUri {
        let uri = root.relationship_uri(id);
        let mut metadata = Metadata::new();
        metadata.insert("self".into(), uri.as_str().into());
        metadata.insert("start".into(), start.as_str().into());
        metadata.insert("end".into(), end.as_str().into());
        metadata.insert("type".into(), rel_type.into());
        metadata.insert("data".into(), data);
        metadata.insert("metadata".into(), serde_json::json!({ "id": id, "type": rel_type }));
        self.insert(uri.clone(), metadata);
        uri
    }

    pub fn fail_with(&self, message: impl Into<String>) {
        *self.inner.failure.write() = Some(message.into());
    }

    pub fn heal(&self) {
        *self.inner.failure.write() = None;
    }

    /// Number of `fetch` calls served so far, failed ones included.
    pub fn fetch_count(&self) -> u64 {
        self.inner.fetches.load(Ordering::Relaxed)
    }

    fn check_failure(&self) -> Result<()> {
        match self.inner.failure.read().as_ref() {
            Some(message) => Err(Error::Transport(message.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ResourceFetcher for MemoryResources {
    async fn fetch(&self, uri: &ResourceUri) -> Result<Metadata> {
        self.inner.fetches.fetch_add(1, Ordering::Relaxed);
        self.check_failure()?;
        self.inner
            .resources
            .read()
            .get(uri)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("Resource <{uri}>")))
    }
}

#[async_trait]
impl ResourceWriter for MemoryResources {
    async fn store(&self, uri: &ResourceUri, update: &ResourceUpdate) -> Result<()> {
        self.check_failure()?;
        let mut resources = self.inner.resources.write();
        let metadata = resources
            .get_mut(uri)
            .ok_or_else(|| Error::NotFound(format!("Resource <{uri}>")))?;

        metadata.insert("data".into(), update.properties.clone().into());
        if let Some(labels) = &update.labels {
            let entry = metadata
                .entry("metadata")
                .or_insert_with(|| serde_json::Value::Object(Metadata::new()));
            if !entry.is_object() {
                *entry = serde_json::Value::Object(Metadata::new());
            }
            if let serde_json::Value::Object(inner) = entry {
                inner.insert("labels".into(), labels.iter().cloned().collect());
            }
        }
        Ok(())
    }
}
