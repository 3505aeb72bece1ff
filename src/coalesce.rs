//! Coalescing: reconcile two references that may denote the same entity.
//!
//! Used when merging graph fragments that refer to one remote node or
//! relationship through different local objects, or through a
//! [`NodePointer`] before the node exists locally.
//!
//! Decision table, first match wins:
//!
//! | a | b | result |
//! |---|---|--------|
//! | `Other` | any | `TypeError` |
//! | any | `Other` | `TypeError` |
//! | `Absent` | `Absent` | `Absent` |
//! | `Absent` | x | x |
//! | x | `Absent` | x |
//! | x | x (same instance) | x |
//! | entity | entity of same kind, both bound, equal URIs | a |
//! | pointer | pointer, equal addresses | a |
//! | anything else | | `JoinError` |

use std::fmt;

use crate::model::{Entity, Node, NodePointer, Relationship, Value};
use crate::{Error, Result};

/// A coalescible reference.
#[derive(Clone)]
pub enum Reference {
    /// Nothing known yet.
    Absent,
    Node(Node),
    Relationship(Relationship),
    Pointer(NodePointer),
    /// A value of a kind that cannot denote an entity; carries the type name.
    Other(&'static str),
}

impl Reference {
    pub fn type_name(&self) -> &'static str {
        match self {
            Reference::Absent => "Absent",
            Reference::Node(_) => "Node",
            Reference::Relationship(_) => "Relationship",
            Reference::Pointer(_) => "NodePointer",
            Reference::Other(name) => *name,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Reference::Absent)
    }

    /// Identity: the same entity instance, the same pointer, or both absent.
    pub fn same(&self, other: &Reference) -> bool {
        match (self, other) {
            (Reference::Absent, Reference::Absent) => true,
            (Reference::Node(a), Reference::Node(b)) => a.same(b),
            (Reference::Relationship(a), Reference::Relationship(b)) => a.same(b),
            (Reference::Pointer(a), Reference::Pointer(b)) => a == b,
            _ => false,
        }
    }

    pub fn as_node(&self) -> Option<&Node> {
        match self {
            Reference::Node(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_relationship(&self) -> Option<&Relationship> {
        match self {
            Reference::Relationship(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_pointer(&self) -> Option<NodePointer> {
        match self {
            Reference::Pointer(p) => Some(*p),
            _ => None,
        }
    }
}

/// Value-level equality, following entity equality rules.
impl PartialEq for Reference {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Reference::Absent, Reference::Absent) => true,
            (Reference::Node(a), Reference::Node(b)) => a == b,
            (Reference::Relationship(a), Reference::Relationship(b)) => a == b,
            (Reference::Pointer(a), Reference::Pointer(b)) => a == b,
            (Reference::Other(a), Reference::Other(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Debug for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reference::Absent => write!(f, "Absent"),
            Reference::Node(n) => fmt::Debug::fmt(n, f),
            Reference::Relationship(r) => fmt::Debug::fmt(r, f),
            Reference::Pointer(p) => write!(f, "NodePointer({})", p.address()),
            Reference::Other(name) => write!(f, "Other({name})"),
        }
    }
}

// ============================================================================
// Conversions (From impls)
// ============================================================================

impl From<Node> for Reference { fn from(v: Node) -> Self { Reference::Node(v) } }
impl From<&Node> for Reference { fn from(v: &Node) -> Self { Reference::Node(v.clone()) } }
impl From<Relationship> for Reference { fn from(v: Relationship) -> Self { Reference::Relationship(v) } }
impl From<&Relationship> for Reference { fn from(v: &Relationship) -> Self { Reference::Relationship(v.clone()) } }
impl From<NodePointer> for Reference { fn from(v: NodePointer) -> Self { Reference::Pointer(v) } }

/// Property values never denote entities.
impl From<Value> for Reference {
    fn from(v: Value) -> Self { Reference::Other(v.type_name()) }
}

impl<T: Into<Reference>> From<Option<T>> for Reference {
    fn from(v: Option<T>) -> Self { v.map(Into::into).unwrap_or(Reference::Absent) }
}

// ============================================================================
// coalesce
// ============================================================================

/// Reduce two references to the one they jointly denote.
///
/// Fails with [`Error::TypeError`] if either side is [`Reference::Other`] and
/// with [`Error::Join`] if both are present but cannot be proven to denote
/// the same entity.
pub fn coalesce(a: Reference, b: Reference) -> Result<Reference> {
    if let Reference::Other(got) = a {
        return Err(unsupported(got));
    }
    if let Reference::Other(got) = b {
        return Err(unsupported(got));
    }

    match (a, b) {
        (Reference::Absent, b) => Ok(b),
        (a, Reference::Absent) => Ok(a),
        (a, b) if a.same(&b) => Ok(a),
        (Reference::Node(a), Reference::Node(b)) => {
            join_entities(&a, &b)?;
            Ok(Reference::Node(a))
        }
        (Reference::Relationship(a), Reference::Relationship(b)) => {
            join_entities(&a, &b)?;
            Ok(Reference::Relationship(a))
        }
        (Reference::Pointer(a), Reference::Pointer(b)) => Err(Error::Join(format!(
            "node pointers {} and {} address different nodes",
            a.address(),
            b.address()
        ))),
        (a, b) => Err(Error::Join(format!(
            "cannot join {} with {}",
            a.type_name(),
            b.type_name()
        ))),
    }
}

/// Two distinct entity instances join only when bound to the same URI.
fn join_entities<E: Entity>(a: &E, b: &E) -> Result<()> {
    match (a.uri(), b.uri()) {
        (Some(x), Some(y)) if x == y => Ok(()),
        (Some(x), Some(y)) => Err(Error::Join(format!(
            "{} <{x}> and {} <{y}> are different remote entities",
            E::KIND,
            E::KIND
        ))),
        _ => Err(Error::Join(format!(
            "cannot join distinct {} instances unless both are bound",
            E::KIND
        ))),
    }
}

fn unsupported(got: &str) -> Error {
    Error::TypeError {
        expected: "Node, Relationship, NodePointer or Absent".into(),
        got: got.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::EntityRegistry;
    use crate::resource::Metadata;

    #[test]
    fn test_absent_and_absent() {
        assert!(coalesce(Reference::Absent, Reference::Absent).unwrap().is_absent());
    }

    #[test]
    fn test_absent_passes_node_through() {
        let alice = Node::new();
        let left = coalesce(Reference::Absent, Reference::from(&alice)).unwrap();
        let right = coalesce(Reference::from(&alice), Reference::Absent).unwrap();
        assert!(left.as_node().unwrap().same(&alice));
        assert!(right.as_node().unwrap().same(&alice));
    }

    #[test]
    fn test_same_node() {
        let alice = Node::new();
        let merged = coalesce(Reference::from(&alice), Reference::from(&alice)).unwrap();
        assert!(merged.as_node().unwrap().same(&alice));
    }

    #[test]
    fn test_similar_bound_nodes_prefer_first() {
        let registry = EntityRegistry::new();
        let uri = registry.service_root().node_uri(1);
        let alice = Node::new().with_property("name", "Alice");
        registry.bind(&alice, &uri, Metadata::new()).unwrap();
        registry.clear();
        let alice_2 = Node::new().with_property("name", "Alice");
        registry.bind(&alice_2, &uri, Metadata::new()).unwrap();

        let merged = coalesce(Reference::from(&alice), Reference::from(&alice_2)).unwrap();
        assert!(merged.as_node().unwrap().same(&alice));
        assert_eq!(merged, Reference::from(&alice_2));
    }

    #[test]
    fn test_different_unbound_nodes() {
        let alice = Node::new().with_property("name", "Alice");
        let bob = Node::new().with_property("name", "Bob");
        let err = coalesce(Reference::from(&alice), Reference::from(&bob)).unwrap_err();
        assert!(matches!(err, Error::Join(_)));
    }

    #[test]
    fn test_bound_and_unbound_node() {
        let registry = EntityRegistry::new();
        let alice = Node::new();
        registry.bind(&alice, registry.service_root().node_uri(1), Metadata::new()).unwrap();
        let err = coalesce(Reference::from(&alice), Reference::from(Node::new())).unwrap_err();
        assert!(matches!(err, Error::Join(_)));
    }

    #[test]
    fn test_differently_bound_nodes() {
        let registry = EntityRegistry::new();
        let (a, b) = (Node::new(), Node::new());
        registry.bind(&a, registry.service_root().node_uri(1), Metadata::new()).unwrap();
        registry.bind(&b, registry.service_root().node_uri(2), Metadata::new()).unwrap();
        assert!(matches!(coalesce(a.into(), b.into()), Err(Error::Join(_))));
    }

    #[test]
    fn test_pointers() {
        let p1 = NodePointer::new(1);
        assert!(coalesce(Reference::Absent, p1.into()).unwrap().same(&p1.into()));
        assert!(coalesce(p1.into(), Reference::Absent).unwrap().same(&p1.into()));
        assert_eq!(coalesce(p1.into(), p1.into()).unwrap().as_pointer(), Some(p1));
        assert_eq!(
            coalesce(p1.into(), NodePointer::new(p1.address()).into()).unwrap(),
            Reference::Pointer(p1)
        );
        assert!(matches!(coalesce(p1.into(), NodePointer::new(2).into()), Err(Error::Join(_))));
    }

    #[test]
    fn test_node_and_pointer() {
        let registry = EntityRegistry::new();
        let alice = Node::new();
        registry.bind(&alice, registry.service_root().node_uri(2), Metadata::new()).unwrap();

        // Same address is still a kind mismatch
        let p2 = NodePointer::new(2);
        assert!(matches!(coalesce(Reference::from(&alice), p2.into()), Err(Error::Join(_))));
        assert!(matches!(coalesce(p2.into(), Reference::from(&alice)), Err(Error::Join(_))));
    }

    #[test]
    fn test_node_and_relationship() {
        let (a, b) = (Node::new(), Node::new());
        let ab = Relationship::new(&a, "KNOWS", &b);
        assert!(matches!(coalesce(a.into(), ab.into()), Err(Error::Join(_))));
    }

    #[test]
    fn test_relationships() {
        let registry = EntityRegistry::new();
        let uri = registry.service_root().relationship_uri(1);
        let (a, b) = (Node::new(), Node::new());
        let r1 = Relationship::new(&a, "KNOWS", &b);
        let r2 = Relationship::new(&a, "KNOWS", &b);
        assert!(matches!(coalesce((&r1).into(), (&r2).into()), Err(Error::Join(_))));

        registry.bind(&r1, &uri, Metadata::new()).unwrap();
        registry.bind(&r2, &uri, Metadata::new()).unwrap();
        let merged = coalesce((&r1).into(), (&r2).into()).unwrap();
        assert!(merged.as_relationship().unwrap().same(&r1));
    }

    #[test]
    fn test_other_types() {
        let foo = Reference::from(Value::from("foo"));
        let err = coalesce(foo.clone(), foo.clone()).unwrap_err();
        assert!(matches!(err, Error::TypeError { ref got, .. } if got == "STRING"));

        assert!(matches!(
            coalesce(Reference::from(Node::new()), foo.clone()),
            Err(Error::TypeError { .. })
        ));
        assert!(matches!(coalesce(Reference::Absent, foo), Err(Error::TypeError { .. })));
    }

    #[test]
    fn test_from_option() {
        assert!(Reference::from(None::<Node>).is_absent());
        assert_eq!(Reference::from(Some(NodePointer::new(3))).as_pointer(), Some(NodePointer::new(3)));
    }
}
