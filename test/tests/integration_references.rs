//! Reference resolution: derived id attributes, side-loading, stubs and
//! the identity hook.

use relgraph::{AttrValue, Attrs, EntityId, Method, ModelType, Schema, SetOptions};
use relgraph_test::{assert_attr, assert_no_attr, IdentityMap, TestGraph};
use serde_json::json;

#[test]
fn derived_id_follows_a_late_id_assignment() {
    let mut graph = TestGraph::new();
    let c = graph.create_model("C", Attrs::new()).unwrap();
    let b = graph.create_model("B", Attrs::one("oneC", c)).unwrap();

    assert_eq!(graph.related(b, "oneC"), Some(c));
    assert_no_attr!(graph, b, "oneCId");

    graph.set_attr(c, "id", 5).unwrap();

    assert_attr!(graph, b, "oneCId", 5);
}

#[test]
fn derived_id_is_written_immediately_for_persisted_targets() {
    let mut graph = TestGraph::new();
    let c = graph.create_model("C", Attrs::one("id", 7)).unwrap();
    let b = graph.create_model("B", Attrs::one("oneC", c)).unwrap();

    assert_attr!(graph, b, "oneCId", 7);

    graph.set_attr(c, "id", 8).unwrap();
    assert_attr!(graph, b, "oneCId", 8);
}

#[test]
fn bare_id_creates_a_stub_and_queues_it() {
    let mut graph = TestGraph::new();
    let b = graph
        .create_model("B", Attrs::one("id", 1).with("oneAId", 5))
        .unwrap();
    let a = graph.related(b, "oneA").unwrap();

    assert_eq!(graph.id(a), Some(&EntityId::from(5)));
    assert!(graph.is_syncing(a));
    assert_eq!(graph.fetch_queue(b).unwrap(), &[a]);
    assert_eq!(graph.pending_urls(), vec!["/a/5".to_string()]);

    graph.respond("/a/5", json!({ "id": 5, "name": "loaded" }));

    assert_attr!(graph, a, "name", "loaded");
    assert!(graph.is_synced(a));
    assert!(graph.fetch_queue(b).unwrap().is_empty());
}

#[test]
fn changing_the_id_replaces_the_related_object() {
    let mut graph = TestGraph::new();
    let b = graph.create_model("B", Attrs::one("oneAId", 5)).unwrap();
    let first = graph.related(b, "oneA").unwrap();

    graph.set_attr(b, "oneAId", 6).unwrap();
    let second = graph.related(b, "oneA").unwrap();

    assert_ne!(first, second);
    assert_eq!(graph.id(second), Some(&EntityId::from(6)));
    assert_eq!(graph.previous(b, "oneA"), Some(AttrValue::Node(first)));

    // same id again keeps the instance
    graph.set_attr(b, "oneAId", 6).unwrap();
    assert_eq!(graph.related(b, "oneA"), Some(second));
}

#[test]
fn nested_json_wins_over_the_bare_id() {
    let mut graph = TestGraph::new();
    let b = graph
        .create_model_from_json(
            "B",
            json!({ "id": 1, "oneAId": 5, "oneA": { "id": 6, "name": "side" } }),
            &SetOptions::new(),
        )
        .unwrap();
    let a = graph.related(b, "oneA").unwrap();

    assert_eq!(graph.id(a), Some(&EntityId::from(6)));
    assert_attr!(graph, b, "oneAId", 6);
    assert_attr!(graph, a, "name", "side");
    assert!(graph.is_synced(a));
    assert!(graph.pending_urls().is_empty());
}

#[test]
fn side_loaded_json_merges_into_a_new_related_object() {
    let mut graph = TestGraph::new();
    let a = graph.create_model("A", Attrs::one("name", "draft")).unwrap();
    let b = graph.create_model("B", Attrs::one("oneA", a)).unwrap();

    let attrs = Attrs::from_json(json!({ "oneA": { "id": 9, "state": "saved" } })).unwrap();
    graph.set(b, attrs, &SetOptions::new()).unwrap();

    assert_eq!(graph.related(b, "oneA"), Some(a));
    assert_eq!(graph.id(a), Some(&EntityId::from(9)));
    assert_attr!(graph, a, "name", "draft");
    assert_attr!(graph, b, "oneAId", 9);

    // a persisted object under another id is replaced, not merged into
    let attrs = Attrs::from_json(json!({ "oneA": { "id": 10 } })).unwrap();
    graph.set(b, attrs, &SetOptions::new()).unwrap();

    let replaced = graph.related(b, "oneA").unwrap();
    assert_ne!(replaced, a);
    assert_attr!(graph, b, "oneAId", 10);
    assert_eq!(graph.id(a), Some(&EntityId::from(9)));
}

#[test]
fn to_many_ids_follow_membership_and_item_ids() {
    let mut graph = TestGraph::new();
    let b = graph
        .create_model_from_json(
            "B",
            json!({ "manyAs": [{ "id": 1 }, { "id": 2 }] }),
            &SetOptions::new(),
        )
        .unwrap();
    let many = graph.related(b, "manyAs").unwrap();
    assert_attr!(graph, b, "manyAIds", [1, 2]);

    let extra = graph.create_model("A", Attrs::new()).unwrap();
    graph.add(many, vec![extra.into()]).unwrap();
    assert_attr!(graph, b, "manyAIds", [1, 2]);

    graph.set_attr(extra, "id", 3).unwrap();
    assert_attr!(graph, b, "manyAIds", [1, 2, 3]);

    let first = graph.items(many).unwrap()[0];
    graph.remove(many, &[first]).unwrap();
    assert_attr!(graph, b, "manyAIds", [2, 3]);
}

#[test]
fn to_many_ids_resolve_existing_items_in_place() {
    let mut graph = TestGraph::new();
    let b = graph
        .create_model_from_json("B", json!({ "manyAs": [{ "id": 1, "n": 1 }] }), &SetOptions::new())
        .unwrap();
    let many = graph.related(b, "manyAs").unwrap();
    let item = graph.items(many).unwrap()[0];

    let attrs = Attrs::from_json(json!({ "manyAs": [{ "id": 1, "n": 2 }, { "id": 4 }] })).unwrap();
    graph.set(b, attrs, &SetOptions::new()).unwrap();

    assert_eq!(graph.related(b, "manyAs"), Some(many));
    assert_eq!(graph.items(many).unwrap()[0], item);
    assert_attr!(graph, item, "n", 2);
    assert_attr!(graph, b, "manyAIds", [1, 4]);

    graph.set_attr(b, "manyAIds", json!([4])).unwrap();
    assert_eq!(graph.items(many).unwrap().len(), 1);
    assert_attr!(graph, b, "manyAIds", [4]);
}

#[test]
fn id_references_round_trip_through_json() {
    let mut graph = TestGraph::new();
    let payload = json!({ "id": 1, "oneAId": 5, "manyAIds": [6, 7], "oneCId": 8 });
    let b = graph
        .create_model_from_json("B", payload.clone(), &SetOptions::new())
        .unwrap();

    assert_eq!(graph.to_json(b, &[]).unwrap(), payload);
    assert_eq!(
        graph.to_json(b, &["oneA"]).unwrap(),
        json!({ "id": 1, "oneAId": 5, "manyAIds": [6, 7], "oneCId": 8, "oneA": { "id": 5 } })
    );
    assert_eq!(graph.transport.sent_count(Method::Read, "/a/6"), 1);
    assert_eq!(graph.transport.sent_count(Method::Read, "/c/8"), 1);
}

#[test]
fn custom_id_attribute_naming() {
    let schema = Schema::builder()
        .model(ModelType::new("User").url_root("/users"))
        .model(
            ModelType::new("Post")
                .reference("author", "User")
                .reference("editor", "User")
                .reference_attribute_name(|key| match key {
                    "author" => key.to_string(),
                    _ => format!("{}Ref", key),
                }),
        )
        .build()
        .unwrap();
    let mut graph = TestGraph::with_schema(schema);

    let post = graph
        .create_model_from_json("Post", json!({ "author": 4, "editorRef": 5 }), &SetOptions::new())
        .unwrap();

    let author = graph.related(post, "author").unwrap();
    let editor = graph.related(post, "editor").unwrap();
    assert_eq!(graph.id(author), Some(&EntityId::from(4)));
    assert_eq!(graph.id(editor), Some(&EntityId::from(5)));
    assert_eq!(
        graph.to_json(post, &[]).unwrap(),
        json!({ "author": 4, "editorRef": 5 })
    );
}

#[test]
fn relation_defaults_yield_to_an_explicit_id() {
    let schema = Schema::builder()
        .model(ModelType::new("Pet").url_root("/pets"))
        .model(
            ModelType::new("Owner")
                .reference("pet", "Pet")
                .defaults(json!({ "pet": { "name": "default" } })),
        )
        .build()
        .unwrap();
    let mut graph = TestGraph::with_schema(schema);

    let with_default = graph.create_model("Owner", Attrs::new()).unwrap();
    let pet = graph.related(with_default, "pet").unwrap();
    assert_attr!(graph, pet, "name", "default");

    let with_id = graph.create_model("Owner", Attrs::one("petId", 3)).unwrap();
    let pet = graph.related(with_id, "pet").unwrap();
    assert_eq!(graph.id(pet), Some(&EntityId::from(3)));
    assert_no_attr!(graph, pet, "name");
}

#[test]
fn identity_hook_shares_instances() {
    let mut graph = TestGraph::new();
    graph.set_instance_resolver(IdentityMap::new());

    let first = graph.create_model("B", Attrs::one("oneAId", 5)).unwrap();
    let second = graph
        .create_model_from_json("B", json!({ "oneA": { "id": 5, "name": "x" } }), &SetOptions::new())
        .unwrap();

    let a = graph.related(first, "oneA").unwrap();
    assert_eq!(graph.related(second, "oneA"), Some(a));
    assert_attr!(graph, a, "name", "x");
}
