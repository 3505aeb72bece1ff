//! End-to-end tests for canonical instances.
//!
//! Dereferencing the same URI must keep yielding the same local object for
//! as long as that object is alive, across hydration, pointers and threads.

use std::sync::{Arc, Barrier};
use std::thread;

use neo4j_remote::{
    Entity, EntityRegistry, Error, MemoryResources, Metadata, Node, NodePointer, RegistryConfig,
    Relationship, ResourceFetcher, ServiceRoot, Value,
};
use serde_json::json;

// ============================================================================
// Helper: a registry plus a fetcher holding a tiny social graph
// ============================================================================

fn setup() -> (EntityRegistry, MemoryResources) {
    let registry = EntityRegistry::new();
    let root = registry.service_root().clone();
    let resources = MemoryResources::new();

    let alice = resources.insert_node(&root, 1, &["Person"], json!({"name": "Alice"}));
    let bob = resources.insert_node(&root, 2, &["Person"], json!({"name": "Bob"}));
    resources.insert_relationship(&root, 1, &alice, "KNOWS", &bob, json!({"since": 1999}));

    (registry, resources)
}

// ============================================================================
// 1. Rebinding after a cache clear
// ============================================================================

#[test]
fn test_lookup_after_clear_returns_new_binding() {
    let registry = EntityRegistry::new();
    let uri = registry.service_root().node_uri(1);

    let e1 = Node::new();
    registry.bind(&e1, &uri, Metadata::new()).unwrap();
    registry.clear();
    let e2 = Node::new();
    registry.bind(&e2, &uri, Metadata::new()).unwrap();

    let found = registry.get::<Node>(&uri).unwrap();
    assert!(found.same(&e2));
    assert!(!found.same(&e1));
}

#[test]
fn test_last_bind_wins_without_clear() {
    let registry = EntityRegistry::new();
    let uri = registry.service_root().node_uri(1);
    let e1 = Node::new();
    let e2 = Node::new();
    registry.bind(&e1, &uri, Metadata::new()).unwrap();
    registry.bind(&e2, &uri, Metadata::new()).unwrap();

    assert!(registry.get::<Node>(&uri).unwrap().same(&e2));
    // Both stay bound and compare equal by URI
    assert_eq!(e1, e2);
}

// ============================================================================
// 2. Hydration through the cache
// ============================================================================

#[tokio::test]
async fn test_repeated_dereference_returns_same_instance() {
    let (registry, resources) = setup();
    let uri = registry.service_root().node_uri(1);

    let first = registry.hydrate_node(resources.fetch(&uri).await.unwrap()).unwrap();
    let second = registry.hydrate_node(resources.fetch(&uri).await.unwrap()).unwrap();

    assert!(first.same(&second));
    assert_eq!(first.get("name"), Some(Value::from("Alice")));
    assert!(first.has_label("Person"));
}

#[tokio::test]
async fn test_dropped_instance_is_refetched_fresh() {
    let (registry, resources) = setup();
    let uri = registry.service_root().node_uri(1);

    let first = registry.hydrate_node(resources.fetch(&uri).await.unwrap()).unwrap();
    first.set("name", "Changed locally");
    drop(first);

    let again = registry.hydrate_node(resources.fetch(&uri).await.unwrap()).unwrap();
    assert_eq!(again.get("name"), Some(Value::from("Alice")));
    assert_eq!(registry.nodes().len(), 1);
}

#[tokio::test]
async fn test_relationship_hydration_shares_nodes() {
    let (registry, resources) = setup();
    let root = registry.service_root().clone();

    let alice = registry.hydrate_node(resources.fetch(&root.node_uri(1)).await.unwrap()).unwrap();
    let rel = registry
        .hydrate_relationship(resources.fetch(&root.relationship_uri(1)).await.unwrap())
        .unwrap();
    let bob = registry.hydrate_node(resources.fetch(&root.node_uri(2)).await.unwrap()).unwrap();

    assert!(rel.start().same(&alice));
    assert!(rel.end().same(&bob));
    assert_eq!(rel.get("since"), Some(Value::Int(1999)));
    // Hydrating bob refreshed the placeholder created for the relationship end
    assert_eq!(rel.end().get("name"), Some(Value::from("Bob")));
}

#[tokio::test]
async fn test_pushed_properties_survive_cache_clear() {
    let (registry, resources) = setup();
    let uri = registry.service_root().node_uri(1);

    let alice = registry.hydrate_node(resources.fetch(&uri).await.unwrap()).unwrap();
    alice.set("age", 33);
    registry.push(&alice, &resources).await.unwrap();

    registry.clear();
    let reloaded = registry.hydrate_node(resources.fetch(&uri).await.unwrap()).unwrap();
    assert!(!reloaded.same(&alice));
    assert_eq!(reloaded.get("age"), Some(Value::Int(33)));
}

// ============================================================================
// 3. Pull and push
// ============================================================================

#[tokio::test]
async fn test_can_pull_node() {
    let (registry, resources) = setup();
    let uri = registry.service_root().node_uri(1);
    let local = Node::new();
    assert!(local.labels().is_empty());

    registry.bind(&local, &uri, Metadata::new()).unwrap();
    registry.pull(&local, &resources).await.unwrap();

    assert!(local.has_label("Person"));
    assert_eq!(local.get("name"), Some(Value::from("Alice")));
}

#[tokio::test]
async fn test_can_pull_relationship() {
    let (registry, resources) = setup();
    let local = Relationship::new(&Node::new(), "KNOWS", &Node::new());
    assert!(local.properties().is_empty());

    registry
        .bind(&local, registry.service_root().relationship_uri(1), Metadata::new())
        .unwrap();
    registry.pull(&local, &resources).await.unwrap();

    assert_eq!(local.get("since"), Some(Value::Int(1999)));
}

#[tokio::test]
async fn test_can_push_node() {
    let (registry, resources) = setup();
    let root = registry.service_root().clone();
    let empty = resources.insert_node(&root, 3, &[], json!({}));

    let local = Node::new().with_label("Person").with_property("name", "Carol");
    registry.bind(&local, &empty, Metadata::new()).unwrap();
    registry.push(&local, &resources).await.unwrap();

    let remote = Node::new();
    registry.bind(&remote, &empty, Metadata::new()).unwrap();
    registry.pull(&remote, &resources).await.unwrap();

    assert!(!remote.same(&local));
    assert_eq!(remote.labels(), local.labels());
    assert_eq!(remote.properties(), local.properties());
}

#[tokio::test]
async fn test_can_push_relationship() {
    let (registry, resources) = setup();
    let uri = registry.service_root().relationship_uri(1);
    let knows = registry.hydrate_relationship(resources.fetch(&uri).await.unwrap()).unwrap();

    knows.set("since", 2001);
    registry.push(&knows, &resources).await.unwrap();

    let stored = resources.fetch(&uri).await.unwrap();
    assert_eq!(stored["data"]["since"], 2001);
}

#[tokio::test]
async fn test_push_to_missing_resource_fails() {
    let (registry, resources) = setup();
    let node = Node::new().with_property("name", "Ghost");
    registry.bind(&node, registry.service_root().node_uri(404), Metadata::new()).unwrap();

    assert!(matches!(registry.push(&node, &resources).await, Err(Error::NotFound(_))));
}

// ============================================================================
// 4. Pointers resolve through the service root
// ============================================================================

#[test]
fn test_pointer_resolves_to_canonical_node() {
    let config = RegistryConfig {
        service_root: ServiceRoot::parse("http://db.example:7474/db/data/").unwrap(),
        ..RegistryConfig::default()
    };
    let registry = EntityRegistry::with_config(config);
    let node = Node::new();
    registry
        .bind(&node, "http://db.example:7474/db/data/node/9", Metadata::new())
        .unwrap();

    let pointer = NodePointer::from_node(&node).unwrap();
    assert_eq!(pointer, NodePointer::new(9));
    assert!(registry.node_at(&pointer).unwrap().same(&node));
}

// ============================================================================
// 5. Concurrent binding
// ============================================================================

#[test]
fn test_concurrent_bind_and_unbind() {
    let registry = Arc::new(EntityRegistry::new());
    let handles: Vec<_> = (0..8u64)
        .map(|t| {
            let registry = Arc::clone(&registry);
            thread::spawn(move || {
                let mut kept = Vec::new();
                for i in 0..100u64 {
                    let node = Node::new();
                    let uri = registry.service_root().node_uri(t * 1000 + i);
                    registry.bind(&node, uri, Metadata::new()).unwrap();
                    if i % 2 == 0 {
                        assert!(registry.unbind(&node));
                    } else {
                        kept.push(node);
                    }
                }
                kept
            })
        })
        .collect();

    let kept: Vec<Node> = handles.into_iter().flat_map(|h| h.join().unwrap()).collect();
    assert_eq!(kept.len(), 400);
    assert_eq!(registry.nodes().len(), 400);
    for node in &kept {
        assert!(registry.get::<Node>(&node.uri().unwrap()).unwrap().same(node));
    }
}

#[test]
fn test_racing_bind_and_unbind_never_leave_unbound_canonical() {
    const ROUNDS: u64 = 2_000;

    let registry = Arc::new(EntityRegistry::new());
    let nodes: Arc<Vec<Node>> = Arc::new((0..ROUNDS).map(|_| Node::new()).collect());
    let barrier = Arc::new(Barrier::new(2));

    let binder = {
        let (registry, nodes, barrier) =
            (Arc::clone(&registry), Arc::clone(&nodes), Arc::clone(&barrier));
        thread::spawn(move || {
            for (i, node) in nodes.iter().enumerate() {
                let uri = registry.service_root().node_uri(i as u64);
                barrier.wait();
                registry.bind(node, uri, Metadata::new()).unwrap();
            }
        })
    };

    for node in nodes.iter() {
        barrier.wait();
        registry.unbind(node);
    }
    binder.join().unwrap();

    for i in 0..ROUNDS {
        let uri = registry.service_root().node_uri(i);
        if let Some(canonical) = registry.get::<Node>(&uri) {
            assert!(canonical.is_bound(), "unbound canonical instance at <{uri}>");
        }
    }
}

#[test]
fn test_global_registry_is_shared() {
    let a = EntityRegistry::global();
    let b = EntityRegistry::global();
    assert!(std::ptr::eq(a, b));
}
