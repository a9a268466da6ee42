use std::sync::Arc;

use lens_core::graph::{GraphStore, MemoryStore};
use lens_core::query::PathStep;
use lens_core::{Direction, Edge, ErrorCode, Node, NodeKind, QueryEngine};

async fn scenario() -> (Arc<MemoryStore>, QueryEngine) {
    let store = Arc::new(MemoryStore::new());
    store
        .add_node(Node::new("class-a", NodeKind::Class, "A").with_file("src/a.ts"))
        .await
        .unwrap();
    store
        .add_node(Node::new("class-b", NodeKind::Class, "B").with_file("src/b.ts"))
        .await
        .unwrap();
    store
        .add_node(
            Node::new("method-c", NodeKind::Method, "c")
                .with_file("src/a.ts")
                .with_parent("class-a")
                .with_route("/api/c"),
        )
        .await
        .unwrap();
    store
        .add_edge(Edge::new("e1", "inherits", "class-a", "class-b"))
        .await
        .unwrap();
    store
        .add_edge(Edge::new("e2", "calls", "method-c", "class-b").with_confidence(0.8))
        .await
        .unwrap();

    let engine = QueryEngine::new(store.clone());
    (store, engine)
}

fn ids(nodes: &[Node]) -> Vec<&str> {
    nodes.iter().map(|n| n.node_id.as_str()).collect()
}

#[tokio::test]
async fn test_call_graph_and_orphans() {
    let (store, engine) = scenario().await;

    let call_graph = engine.get_call_graph(None, None).await.unwrap();
    assert_eq!(ids(&call_graph.nodes), ["method-c", "class-b"]);
    assert_eq!(call_graph.edges.len(), 1);
    assert_eq!(call_graph.edges[0].edge_id, "e2");

    assert!(engine.find_orphan_nodes().await.unwrap().is_empty());

    store
        .add_node(Node::new("field-d", NodeKind::Field, "d"))
        .await
        .unwrap();
    let orphans = engine.find_orphan_nodes().await.unwrap();
    assert_eq!(ids(&orphans), ["field-d"]);
}

#[tokio::test]
async fn test_callers_and_callees() {
    let (_store, engine) = scenario().await;

    let callers = engine.get_callers("class-b").await.unwrap();
    assert_eq!(ids(&callers), ["method-c"]);

    let callees = engine.get_callees("method-c").await.unwrap();
    assert_eq!(ids(&callees), ["class-b"]);

    // Inheritance is not a call
    assert!(engine.get_callees("class-a").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_path_directed_and_undirected() {
    let (_store, engine) = scenario().await;

    assert!(engine
        .get_path("class-a", "method-c", Direction::Directed)
        .await
        .unwrap()
        .is_none());

    let path = engine
        .get_path("class-a", "method-c", Direction::Undirected)
        .await
        .unwrap()
        .unwrap();
    let steps: Vec<_> = path.iter().map(PathStep::id).collect();
    assert_eq!(steps, ["class-a", "e1", "class-b", "e2", "method-c"]);

    let trivial = engine
        .get_path("class-b", "class-b", Direction::Directed)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(trivial.len(), 1);

    let err = engine
        .get_path("class-a", "nope", Direction::Directed)
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::NotFound);
}

#[tokio::test]
async fn test_component_and_connected_nodes() {
    let (store, engine) = scenario().await;
    store
        .add_node(Node::new("field-d", NodeKind::Field, "d"))
        .await
        .unwrap();

    let component = engine.get_connected_component("method-c").await.unwrap();
    assert_eq!(ids(&component), ["class-a", "class-b", "method-c"]);

    let alone = engine.get_connected_component("field-d").await.unwrap();
    assert_eq!(ids(&alone), ["field-d"]);

    let near = engine.find_connected_nodes("class-a", Some(1)).await.unwrap();
    let reached: Vec<_> = near.iter().map(|(n, d)| (n.node_id.as_str(), *d)).collect();
    assert_eq!(reached, [("class-a", 0), ("class-b", 1)]);

    let all = engine.find_connected_nodes("class-a", None).await.unwrap();
    assert_eq!(all.len(), 3);
    assert_eq!(all[2].1, 2);
}

#[tokio::test]
async fn test_attribute_lookups() {
    let (_store, engine) = scenario().await;

    assert_eq!(ids(&engine.find_by_route("/api/c").await.unwrap()), ["method-c"]);
    assert_eq!(
        ids(&engine.find_by_file("src/a.ts").await.unwrap()),
        ["class-a", "method-c"]
    );
    assert_eq!(
        ids(&engine.find_by_kind(NodeKind::Class).await.unwrap()),
        ["class-a", "class-b"]
    );
    assert!(engine.find_by_route("/missing").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_rooted_call_graph_respects_depth() {
    let store = Arc::new(MemoryStore::new());
    for id in ["a", "b", "c", "d"] {
        store
            .add_node(Node::new(id, NodeKind::Function, id))
            .await
            .unwrap();
    }
    store.add_edge(Edge::new("ab", "calls", "a", "b")).await.unwrap();
    store.add_edge(Edge::new("bc", "invokes", "b", "c")).await.unwrap();
    store.add_edge(Edge::new("cd", "calls", "c", "d")).await.unwrap();
    let engine = QueryEngine::new(store);

    let roots = vec!["a".to_string()];
    let shallow = engine
        .get_call_graph(Some(roots.as_slice()), Some(1))
        .await
        .unwrap();
    assert_eq!(ids(&shallow.nodes), ["a", "b"]);
    assert_eq!(shallow.edges.len(), 1);

    let deep = engine
        .get_call_graph(Some(roots.as_slice()), None)
        .await
        .unwrap();
    assert_eq!(ids(&deep.nodes), ["a", "b", "c", "d"]);
    assert_eq!(deep.edges.len(), 3);
}
