use std::sync::Arc;

use lens_core::graph::{
    EdgeQuery, GraphStore, InsertOutcome, MemoryStore, NodeQuery, SurrealStore,
};
use lens_core::{Edge, ErrorCode, Node, NodeKind};

async fn memory_store() -> Arc<dyn GraphStore> {
    let store = Arc::new(MemoryStore::new());
    store.connect().await.unwrap();
    store
}

async fn surreal_store() -> Arc<dyn GraphStore> {
    let store = Arc::new(SurrealStore::in_memory());
    store.connect().await.unwrap();
    store
}

async fn seed(store: &dyn GraphStore) {
    let nodes = [
        Node::new("mod-app", NodeKind::Module, "app").with_file("src/app.py"),
        Node::new("class-a", NodeKind::Class, "UserService")
            .with_file("src/app.py")
            .with_language("python")
            .with_span(10, 80)
            .with_parent("mod-app"),
        Node::new("method-c", NodeKind::Method, "get_user")
            .with_file("src/app.py")
            .with_language("python")
            .with_parent("class-a")
            .with_route("/users/{id}"),
        Node::new("class-b", NodeKind::Class, "BaseService").with_file("lib/base.py"),
    ];
    for node in nodes {
        assert_eq!(store.add_node(node).await.unwrap(), InsertOutcome::Inserted);
    }

    let edges = [
        Edge::new("e1", "inherits", "class-a", "class-b"),
        Edge::new("e2", "calls", "method-c", "class-b")
            .with_confidence(0.8)
            .with_evidence("static"),
        Edge::new("e3", "calls", "method-c", "method-c").with_confidence(0.4),
    ];
    for edge in edges {
        assert_eq!(store.add_edge(edge).await.unwrap(), InsertOutcome::Inserted);
    }
}

async fn run_contract(store: Arc<dyn GraphStore>) {
    seed(store.as_ref()).await;

    // Round-trip
    let node = store.get_node("class-a").await.unwrap();
    assert_eq!(node.kind, NodeKind::Class);
    assert_eq!(node.name, "UserService");
    assert_eq!(node.language, "python");
    assert_eq!(node.span.start(), 10);
    assert_eq!(node.span.end(), 80);
    assert_eq!(node.parent.as_deref(), Some("mod-app"));
    assert_eq!(node.route, None);

    let err = store.get_node("missing").await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::NotFound);
    assert!(!store.has_node("missing").await.unwrap());
    assert!(store.has_node("method-c").await.unwrap());

    // Duplicates and dangling edges are refused, not fatal
    let dup = Node::new("class-a", NodeKind::Interface, "Other");
    assert_eq!(store.add_node(dup).await.unwrap(), InsertOutcome::DuplicateId);
    assert_eq!(store.get_node("class-a").await.unwrap().name, "UserService");

    let dangling = Edge::new("e9", "calls", "class-a", "nowhere");
    assert_eq!(
        store.add_edge(dangling).await.unwrap(),
        InsertOutcome::MissingEndpoint
    );
    let dup_edge = Edge::new("e1", "calls", "class-b", "class-a");
    assert_eq!(store.add_edge(dup_edge).await.unwrap(), InsertOutcome::DuplicateId);

    // Node queries keep insertion order
    let classes = store
        .get_nodes_by_query(&NodeQuery::new().kind(NodeKind::Class))
        .await
        .unwrap();
    let ids: Vec<_> = classes.iter().map(|n| n.node_id.as_str()).collect();
    assert_eq!(ids, ["class-a", "class-b"]);

    let in_src = store
        .get_nodes_by_query(&NodeQuery::new().file_prefix("src/"))
        .await
        .unwrap();
    assert_eq!(in_src.len(), 3);

    let by_route = store
        .get_nodes_by_query(&NodeQuery::new().route("/users/{id}"))
        .await
        .unwrap();
    assert_eq!(by_route.len(), 1);
    assert_eq!(by_route[0].node_id, "method-c");

    let by_pattern = store
        .get_nodes_by_query(&NodeQuery::new().name_pattern("Service$"))
        .await
        .unwrap();
    assert_eq!(by_pattern.len(), 2);

    let bad = store
        .get_nodes_by_query(&NodeQuery::new().name_pattern("("))
        .await
        .unwrap_err();
    assert_eq!(bad.code(), ErrorCode::ConfigError);

    // Edge queries
    let inherits = store
        .get_edges_by_query(&EdgeQuery::new().kind("inherits"))
        .await
        .unwrap();
    assert_eq!(inherits.len(), 1);
    assert_eq!(inherits[0].confidence, 1.0);
    assert!(inherits[0].evidence.is_empty());

    let touching = store
        .get_edges_by_query(&EdgeQuery::new().touching("method-c"))
        .await
        .unwrap();
    let ids: Vec<_> = touching.iter().map(|e| e.edge_id.as_str()).collect();
    assert_eq!(ids, ["e2", "e3"]);

    let confident = store
        .get_edges_by_query(&EdgeQuery::new().src("method-c").min_confidence(0.5))
        .await
        .unwrap();
    assert_eq!(confident.len(), 1);
    assert_eq!(confident[0].evidence, ["static"]);

    // Induced subgraph ignores unknown ids
    let sub = store
        .get_subgraph(&[
            "method-c".to_string(),
            "class-b".to_string(),
            "ghost".to_string(),
        ])
        .await
        .unwrap();
    assert_eq!(sub.nodes.len(), 2);
    let ids: Vec<_> = sub.edges.iter().map(|e| e.edge_id.as_str()).collect();
    assert_eq!(ids, ["e2", "e3"]);

    // Stats
    let stats = store.stats().await.unwrap();
    assert_eq!(stats.node_count, 4);
    assert_eq!(stats.edge_count, 3);
    assert_eq!(stats.nodes_by_kind.get("class"), Some(&2));
    assert_eq!(stats.edges_by_kind.get("calls"), Some(&2));

    // Referential integrity
    for edge in store.get_edges_by_query(&EdgeQuery::default()).await.unwrap() {
        assert!(store.has_node(&edge.src).await.unwrap());
        assert!(store.has_node(&edge.dst).await.unwrap());
    }

    store.clear().await.unwrap();
    let stats = store.stats().await.unwrap();
    assert_eq!((stats.node_count, stats.edge_count), (0, 0));

    store.close().await.unwrap();
    store.close().await.unwrap();
}

#[tokio::test]
async fn test_memory_store_contract() {
    run_contract(memory_store().await).await;
}

#[tokio::test]
async fn test_surreal_store_contract() {
    run_contract(surreal_store().await).await;
}

#[tokio::test]
async fn test_surreal_store_requires_connect() {
    let store = SurrealStore::in_memory();
    let err = store
        .add_node(Node::new("a", NodeKind::Function, "a"))
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::ConnectionError);
    store.close().await.unwrap();
}

#[tokio::test]
async fn test_surreal_store_closed_backend_is_connection_error() {
    let store = surreal_store().await;
    store
        .add_node(Node::new("a", NodeKind::Function, "a"))
        .await
        .unwrap();
    store.close().await.unwrap();
    let err = store.get_node("a").await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::ConnectionError);
    let err = store.stats().await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::ConnectionError);
}

#[tokio::test]
async fn test_open_store_embedded_by_default() {
    let store = lens_core::open_store(&Default::default());
    assert_eq!(store.backend(), "memory");
    store.connect().await.unwrap();
    store
        .add_node(Node::new("a", NodeKind::Function, "a"))
        .await
        .unwrap();
    assert_eq!(store.stats().await.unwrap().node_count, 1);
}
