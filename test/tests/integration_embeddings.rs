//! Embedding lifecycle: ownership, URL derivation, re-parenting, destroy
//! cascade and the wire shape of nested objects.

use relgraph::{
    Attrs, EventKind, Method, ModelType, Ownership, RelError, SaveOptions, Schema, SetOptions,
    Slot, UrlError,
};
use relgraph_test::{assert_attr, assert_fired, EventLog, TestGraph};
use serde_json::{json, Value};

fn a_with_embedded(graph: &mut TestGraph, id: i64) -> (relgraph::NodeKey, relgraph::NodeKey) {
    let a = graph
        .create_model_from_json(
            "A",
            json!({ "id": id, "embeddedModel": { "text": "x" } }),
            &SetOptions::new(),
        )
        .unwrap();
    let embedded = graph.related(a, "embeddedModel").unwrap();
    (a, embedded)
}

#[test]
fn embedded_model_is_owned_and_addressed_through_its_parent() {
    let mut graph = TestGraph::new();
    let (a, embedded) = a_with_embedded(&mut graph, 1);

    assert_eq!(
        graph.parent(embedded),
        Some(&Ownership {
            owner: a,
            key: "embeddedModel".to_string()
        })
    );
    assert_eq!(graph.url(embedded).unwrap(), "/a/1/embeddedModel");
}

#[test]
fn json_updates_the_embedded_instance_in_place() {
    let mut graph = TestGraph::new();
    let (a, embedded) = a_with_embedded(&mut graph, 1);

    let attrs = Attrs::from_json(json!({ "embeddedModel": { "text": "y" } })).unwrap();
    graph.set(a, attrs, &SetOptions::new()).unwrap();

    assert_eq!(graph.related(a, "embeddedModel"), Some(embedded));
    assert_attr!(graph, embedded, "text", "y");
    assert!(!graph.has_changed(a, "embeddedModel"));
}

#[test]
fn embedding_elsewhere_moves_the_child() {
    let mut graph = TestGraph::new();
    let (first, embedded) = a_with_embedded(&mut graph, 1);
    let second = graph.create_model("A", Attrs::one("id", 2)).unwrap();
    let log = EventLog::new();
    log.watch(&mut graph, embedded, EventKind::Embedded);

    graph.set_attr(second, "embeddedModel", embedded).unwrap();

    assert_eq!(graph.related(first, "embeddedModel"), None);
    assert_eq!(graph.parent(embedded).map(|ownership| ownership.owner), Some(second));
    assert_eq!(graph.url(embedded).unwrap(), "/a/2/embeddedModel");
    assert_fired!(log, "embedded", embedded, 1);

    // changes of the child no longer reach the old parent
    let deep = EventLog::new();
    deep.watch(&mut graph, first, EventKind::DeepChange);
    deep.watch(&mut graph, second, EventKind::DeepChange);
    graph.set_attr(embedded, "text", "moved").unwrap();
    assert_fired!(deep, "deepchange", first, 0);
    assert_fired!(deep, "deepchange", second, 1);
}

#[test]
fn set_parent_detects_the_key() {
    let mut graph = TestGraph::new();
    let (a, embedded) = a_with_embedded(&mut graph, 1);
    let log = EventLog::new();
    log.watch(&mut graph, embedded, EventKind::Embedded);

    graph.set_parent(embedded, a, None).unwrap();

    assert_eq!(graph.parent(embedded).map(|ownership| ownership.key.as_str()), Some("embeddedModel"));
    assert_fired!(log, "embedded", embedded, 1);
}

#[test]
fn set_parent_installs_the_child() {
    let mut graph = TestGraph::new();
    let (first, embedded) = a_with_embedded(&mut graph, 1);
    let second = graph.create_model("A", Attrs::one("id", 2)).unwrap();

    graph.set_parent(embedded, second, Some("embeddedModel")).unwrap();

    assert_eq!(graph.related(second, "embeddedModel"), Some(embedded));
    assert_eq!(graph.related(first, "embeddedModel"), None);
}

#[test]
fn unsetting_detaches_the_child() {
    let mut graph = TestGraph::new();
    let (a, embedded) = a_with_embedded(&mut graph, 1);

    graph.unset(a, "embeddedModel").unwrap();

    assert_eq!(graph.slot(a, "embeddedModel"), None);
    assert_eq!(graph.parent(embedded), None);
    assert_eq!(
        graph.url(embedded),
        Err(RelError::Url(UrlError::NoBase {
            type_name: "EmbeddedModel".to_string()
        }))
    );
}

#[test]
fn destroying_the_child_empties_the_slot() {
    let mut graph = TestGraph::new();
    let (a, embedded) = a_with_embedded(&mut graph, 1);
    let log = EventLog::new();
    log.watch(&mut graph, a, EventKind::Change);

    graph.destroy(embedded).unwrap();

    assert!(!graph.contains(embedded));
    assert_eq!(graph.slot(a, "embeddedModel"), None);
    assert_fired!(log, "change", a, 1);
    // a new child was never persisted
    assert!(graph.transport.sent().iter().all(|request| request.method != Method::Delete));
}

#[test]
fn destroying_the_parent_orphans_the_child() {
    let mut graph = TestGraph::new();
    let (a, embedded) = a_with_embedded(&mut graph, 1);

    graph.destroy(a).unwrap();

    assert!(graph.contains(embedded));
    assert_eq!(graph.parent(embedded), None);
    assert_eq!(graph.transport.sent_count(Method::Delete, "/a/1"), 1);
}

#[test]
fn embedded_models_are_saved_with_update() {
    let mut graph = TestGraph::new();
    let (_, embedded) = a_with_embedded(&mut graph, 1);

    let request = graph.save(embedded, &SaveOptions::new()).unwrap();

    let sent = graph.transport.request(request).unwrap();
    assert_eq!(sent.method, Method::Update);
    assert_eq!(sent.url, "/a/1/embeddedModel");
    assert_eq!(sent.body, Some(json!({ "text": "x" })));

    let forced = graph
        .save(embedded, &SaveOptions::new().method(Method::Patch))
        .unwrap();
    assert_eq!(graph.transport.request(forced).unwrap().method, Method::Patch);
}

#[test]
fn embeddings_are_nested_only_when_inlined() {
    let mut graph = TestGraph::new();
    let a = graph
        .create_model_from_json(
            "A",
            json!({
                "id": 1,
                "embeddedModel": { "text": "x" },
                "embeddedCollection": [{ "n": 1 }, { "n": 2 }]
            }),
            &SetOptions::new(),
        )
        .unwrap();

    assert_eq!(graph.to_json(a, &[]).unwrap(), json!({ "id": 1 }));
    assert_eq!(
        graph.to_json(a, &["embeddedModel", "embeddedCollection"]).unwrap(),
        json!({
            "id": 1,
            "embeddedModel": { "text": "x" },
            "embeddedCollection": [{ "n": 1 }, { "n": 2 }]
        })
    );

    graph.set_attr(a, "embeddedModel", Value::Null).unwrap();
    assert_eq!(graph.slot(a, "embeddedModel"), Some(Slot::Null));
    assert_eq!(
        graph.to_json(a, &["embeddedModel"]).unwrap(),
        json!({ "id": 1, "embeddedModel": null })
    );
}

#[test]
fn dotted_inline_paths_and_declared_inlining() {
    let schema = Schema::builder()
        .model(ModelType::new("Author").reference("avatar", "Image"))
        .model(ModelType::new("Image"))
        .model(
            ModelType::new("Book")
                .url_root("/books")
                .embedding("author", "Author")
                .inline_json(["author"]),
        )
        .build()
        .unwrap();
    let mut graph = TestGraph::with_schema(schema);
    let book = graph
        .create_model_from_json(
            "Book",
            json!({ "author": { "name": "ann", "avatar": { "url": "a.png" } } }),
            &SetOptions::new(),
        )
        .unwrap();

    assert_eq!(
        graph.to_json(book, &[]).unwrap(),
        json!({ "author": { "name": "ann" } })
    );
    assert_eq!(
        graph.to_json(book, &["author.avatar"]).unwrap(),
        json!({ "author": { "name": "ann", "avatar": { "url": "a.png" } } })
    );
}

#[test]
fn embedded_collection_items_are_addressed_below_the_collection() {
    let mut graph = TestGraph::new();
    let a = graph
        .create_model_from_json(
            "A",
            json!({ "id": 3, "embeddedCollection": [{ "id": 8 }] }),
            &SetOptions::new(),
        )
        .unwrap();
    let collection = graph.related(a, "embeddedCollection").unwrap();
    let item = graph.items(collection).unwrap()[0];

    assert_eq!(graph.url(collection).unwrap(), "/a/3/embeddedCollection");
    assert_eq!(graph.url(item).unwrap(), "/a/3/embeddedCollection/8");

    let attrs = Attrs::from_json(json!({ "embeddedCollection": [{ "id": 8, "n": 1 }, { "id": 9 }] })).unwrap();
    graph.set(a, attrs, &SetOptions::new()).unwrap();

    assert_eq!(graph.related(a, "embeddedCollection"), Some(collection));
    assert_eq!(graph.items(collection).unwrap().len(), 2);
    assert_attr!(graph, item, "n", 1);
}
