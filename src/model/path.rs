//! Path — a sequence of alternating nodes and relationships.

use super::{Entity, Node, Relationship};
use crate::coalesce::{coalesce, Reference};
use crate::registry::EntityRegistry;
use crate::{Error, Result};

/// A path in the graph: node -[rel]-> node -[rel]-> node ...
#[derive(Debug, Clone)]
pub struct Path {
    /// Nodes along the path. Always has one more element than `relationships`.
    nodes: Vec<Node>,
    /// Relationships connecting consecutive nodes.
    relationships: Vec<Relationship>,
}

impl Path {
    pub fn new(start: Node) -> Self {
        Self { nodes: vec![start], relationships: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.relationships.len()
    }

    pub fn is_empty(&self) -> bool {
        self.relationships.is_empty()
    }

    pub fn start(&self) -> &Node {
        self.nodes.first().expect("Path always has at least one node")
    }

    pub fn end(&self) -> &Node {
        self.nodes.last().expect("Path always has at least one node")
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn relationships(&self) -> &[Relationship] {
        &self.relationships
    }

    /// Extend the path with a new unbound relationship from the current end
    /// to `node`.
    pub fn append(&mut self, rel_type: impl Into<String>, node: Node) -> &Relationship {
        let rel = Relationship::new(self.end(), rel_type, &node);
        self.relationships.push(rel);
        self.nodes.push(node);
        self.relationships.last().expect("just pushed")
    }

    /// Builder form of [`append`](Self::append).
    pub fn then(mut self, rel_type: impl Into<String>, node: Node) -> Self {
        self.append(rel_type, node);
        self
    }

    /// Concatenate two paths. The end of `self` and the start of `other`
    /// must coalesce; the surviving node is `self`'s end.
    pub fn join(mut self, other: Path) -> Result<Path> {
        let joint = coalesce(
            Reference::Node(self.end().clone()),
            Reference::Node(other.start().clone()),
        )?;
        let Reference::Node(joint) = joint else {
            return Err(Error::Join("path boundary did not resolve to a node".into()));
        };

        self.nodes.pop();
        self.nodes.push(joint);
        self.nodes.extend(other.nodes.into_iter().skip(1));
        self.relationships.extend(other.relationships);
        Ok(self)
    }

    /// True when every node and relationship on the path is bound.
    pub fn is_bound(&self) -> bool {
        self.nodes.iter().all(|n| n.is_bound()) && self.relationships.iter().all(|r| r.is_bound())
    }

    /// Unbind every entity on the path. Returns how many were bound.
    pub fn unbind_all(&self, registry: &EntityRegistry) -> usize {
        let rels = self.relationships.iter().filter(|r| registry.unbind(*r)).count();
        let nodes = self.nodes.iter().filter(|n| registry.unbind(*n)).count();
        rels + nodes
    }
}
