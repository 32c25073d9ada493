//! Deep change propagation across references, embeddings and collections.
//! Every node that can reach a change hears about it exactly once.

use relgraph::{Attrs, Event, EventKind, NodeKey};
use relgraph_test::{assert_fired, EventLog, TestGraph};
use serde_json::json;

fn watch_deep(graph: &mut TestGraph, nodes: &[NodeKey]) -> EventLog {
    let log = EventLog::new();
    for node in nodes {
        log.watch(graph, *node, EventKind::DeepChange);
        log.watch(graph, *node, EventKind::DeepChangePropagated);
    }
    log
}

#[test]
fn reference_cycle_delivers_once_per_node() {
    let mut graph = TestGraph::new();
    let b = graph.create_model("B", Attrs::one("id", 1)).unwrap();
    let c = graph
        .create_model("C", Attrs::one("id", 2).with("oneB", b))
        .unwrap();
    graph.set_attr(b, "oneC", c).unwrap();
    let log = watch_deep(&mut graph, &[b, c]);

    graph.set_attr(c, "title", "x").unwrap();

    assert_fired!(log, "deepchange", c, 1);
    assert_fired!(log, "deepchange", b, 1);
    assert_fired!(log, "deepchange_propagated", c, 1);
    assert_fired!(log, "deepchange_propagated", b, 1);
}

#[test]
fn every_path_to_a_node_counts_once() {
    let mut graph = TestGraph::new();
    let a = graph.create_model("A", Attrs::one("id", 1)).unwrap();
    let b = graph
        .create_model("B", Attrs::one("id", 1).with("oneA", a).with("manyAs", vec![a]))
        .unwrap();
    let many = graph.related(b, "manyAs").unwrap();
    let c = graph
        .create_model("C", Attrs::one("id", 1).with("oneB", b))
        .unwrap();
    let log = watch_deep(&mut graph, &[a, b, many, c]);

    graph.set_attr(a, "name", "x").unwrap();

    for node in [a, b, many, c] {
        assert_fired!(log, "deepchange", node, 1);
        assert_fired!(log, "deepchange_propagated", node, 1);
    }
}

#[test]
fn every_delivery_names_the_origin_and_the_changed_node() {
    let mut graph = TestGraph::new();
    let b = graph.create_model("B", Attrs::one("id", 1)).unwrap();
    let c = graph
        .create_model("C", Attrs::one("id", 2).with("oneB", b))
        .unwrap();
    let log = watch_deep(&mut graph, &[b, c]);

    graph.set_attr(b, "title", "x").unwrap();

    let events = log.events();
    let names: Vec<(&str, NodeKey)> = events.iter().map(|event| (event.name(), event.node())).collect();
    assert_eq!(
        names,
        vec![
            ("deepchange", b),
            ("deepchange", c),
            ("deepchange_propagated", b),
            ("deepchange_propagated", c),
        ]
    );
    let origins: Vec<_> = events
        .iter()
        .map(|event| match event {
            Event::DeepChange { changed, origin, .. } | Event::DeepChangePropagated { changed, origin, .. } => {
                assert_eq!(*changed, b);
                *origin
            }
            other => panic!("unexpected {:?}", other),
        })
        .collect();
    assert!(origins.windows(2).all(|pair| pair[0] == pair[1]));
}

#[test]
fn each_set_is_a_new_origin() {
    let mut graph = TestGraph::new();
    let b = graph.create_model("B", Attrs::one("id", 1)).unwrap();
    let c = graph
        .create_model("C", Attrs::one("id", 2).with("oneB", b))
        .unwrap();
    let log = watch_deep(&mut graph, &[c]);

    graph.set_attr(b, "title", "x").unwrap();
    graph.set_attr(b, "title", "y").unwrap();
    // no change, no delivery
    graph.set_attr(b, "title", "y").unwrap();

    assert_fired!(log, "deepchange", c, 2);
}

#[test]
fn silent_sets_do_not_propagate() {
    let mut graph = TestGraph::new();
    let b = graph.create_model("B", Attrs::one("id", 1)).unwrap();
    let c = graph
        .create_model("C", Attrs::one("id", 2).with("oneB", b))
        .unwrap();
    let log = watch_deep(&mut graph, &[b, c]);

    graph
        .set(b, Attrs::one("title", "x"), &relgraph::SetOptions::new().silent())
        .unwrap();

    assert!(log.events().is_empty());
}

#[test]
fn collection_operations_propagate_once_each() {
    let mut graph = TestGraph::new();
    let b = graph.create_model("B", Attrs::one("id", 1)).unwrap();
    let many = graph.related(b, "manyAs").unwrap();
    let log = watch_deep(&mut graph, &[b, many]);

    let added = graph
        .add(many, vec![json!({ "id": 1 }).into(), json!({ "id": 2 }).into()])
        .unwrap();
    assert_fired!(log, "deepchange", many, 1);
    assert_fired!(log, "deepchange", b, 1);

    log.clear();
    graph.remove(many, &added).unwrap();
    assert_fired!(log, "deepchange", many, 1);
    assert_fired!(log, "deepchange", b, 1);

    log.clear();
    graph.reset(many, vec![json!({ "id": 3 }).into()]).unwrap();
    assert_fired!(log, "deepchange", many, 1);
    assert_fired!(log, "deepchange", b, 1);
}

#[test]
fn item_changes_climb_through_the_collection() {
    let mut graph = TestGraph::new();
    let b = graph.create_model("B", Attrs::one("id", 1)).unwrap();
    let many = graph.related(b, "manyAs").unwrap();
    let item = graph.push(many, json!({ "id": 4 })).unwrap();
    let log = watch_deep(&mut graph, &[item, many, b]);

    graph.set_attr(item, "name", "x").unwrap();

    assert_eq!(
        log.names_for(b),
        vec!["deepchange", "deepchange_propagated"]
    );
    assert_fired!(log, "deepchange", item, 1);
    assert_fired!(log, "deepchange", many, 1);
}

#[test]
fn removed_items_stop_propagating() {
    let mut graph = TestGraph::new();
    let b = graph.create_model("B", Attrs::one("id", 1)).unwrap();
    let many = graph.related(b, "manyAs").unwrap();
    let item = graph.push(many, json!({ "id": 4 })).unwrap();
    graph.remove(many, &[item]).unwrap();
    let log = watch_deep(&mut graph, &[many, b]);

    graph.set_attr(item, "name", "x").unwrap();

    assert!(log.events().is_empty());
}

#[test]
fn replaced_references_stop_propagating() {
    let mut graph = TestGraph::new();
    let first = graph.create_model("A", Attrs::one("id", 1)).unwrap();
    let second = graph.create_model("A", Attrs::one("id", 2)).unwrap();
    let b = graph.create_model("B", Attrs::one("oneA", first)).unwrap();
    graph.set_attr(b, "oneA", second).unwrap();
    let log = watch_deep(&mut graph, &[b]);

    graph.set_attr(first, "name", "x").unwrap();
    assert_fired!(log, "deepchange", b, 0);

    graph.set_attr(second, "name", "x").unwrap();
    assert_fired!(log, "deepchange", b, 1);
}

#[test]
fn embedded_changes_reach_the_parent() {
    let mut graph = TestGraph::new();
    let a = graph
        .create_model_from_json(
            "A",
            json!({ "id": 1, "embeddedModel": { "text": "x" } }),
            &relgraph::SetOptions::new(),
        )
        .unwrap();
    let embedded = graph.related(a, "embeddedModel").unwrap();
    let log = watch_deep(&mut graph, &[embedded, a]);

    graph.set_attr(embedded, "text", "y").unwrap();

    assert_fired!(log, "deepchange", embedded, 1);
    assert_fired!(log, "deepchange", a, 1);
}

#[test]
fn one_set_touching_several_relations_is_one_origin() {
    let mut graph = TestGraph::new();
    let b = graph.create_model("B", Attrs::one("id", 1)).unwrap();
    let c = graph
        .create_model("C", Attrs::one("id", 2).with("oneB", b))
        .unwrap();
    let log = watch_deep(&mut graph, &[b, c]);

    // the nested A is created and the collection filled inside one set
    let attrs = Attrs::from_json(json!({
        "title": "x",
        "oneA": { "id": 9 },
        "manyAs": [{ "id": 10 }, { "id": 11 }]
    }))
    .unwrap();
    graph.set(b, attrs, &relgraph::SetOptions::new()).unwrap();

    assert_fired!(log, "deepchange", b, 1);
    assert_fired!(log, "deepchange", c, 1);
}

#[test]
fn listeners_may_set_during_the_climb() {
    let mut graph = TestGraph::new();
    let b = graph.create_model("B", Attrs::one("id", 1)).unwrap();
    let c = graph
        .create_model("C", Attrs::one("id", 2).with("oneB", b))
        .unwrap();
    graph.once(c, EventKind::DeepChange, |graph, event| {
        graph.set_attr(event.node(), "seen", true).unwrap();
    });
    let log = watch_deep(&mut graph, &[b, c]);

    graph.set_attr(b, "title", "x").unwrap();

    // the listener's own change climbs after the first one settled
    assert_eq!(
        log.names_for(c),
        vec![
            "deepchange",
            "deepchange_propagated",
            "deepchange",
            "deepchange_propagated"
        ]
    );
    assert_fired!(log, "deepchange", b, 1);
}
