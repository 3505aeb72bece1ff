//! NodePointer: a placeholder for a node known only by its address.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{Entity, Node};
use crate::resource::{ResourceUri, ServiceRoot};

/// Stand-in for a remote node that has not been materialized locally,
/// e.g. one created earlier in the same batch.
///
/// Never bound to a resource. Two pointers are equal iff their addresses are.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodePointer {
    address: u64,
}

impl NodePointer {
    pub fn new(address: u64) -> Self {
        Self { address }
    }

    pub fn address(&self) -> u64 {
        self.address
    }

    /// URI of the node this pointer will denote under `root`.
    pub fn resolve(&self, root: &ServiceRoot) -> ResourceUri {
        root.node_uri(self.address)
    }

    /// Pointer to the remote node behind a bound node.
    pub fn from_node(node: &Node) -> Option<Self> {
        node.id().map(Self::new)
    }
}

impl fmt::Display for NodePointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}}}", self.address)
    }
}
