use log::trace;
use serde_json::Value;

use crate::{
    entity::{AttrValue, Attrs, CollectionNode, EntityId, Node, Ownership},
    events::{Event, EventKind, Handler},
    graph::{CollectionSetOptions, Graph, RelError, SetOptions},
    schema::CollectionTypeId,
    types::{NodeKey, OriginId},
};

use super::set::Placement;

impl Graph {
    /// Creates a free-standing collection holding `items`. Items are added
    /// silently.
    pub fn create_collection(&mut self, type_name: &str, items: Vec<AttrValue>) -> Result<NodeKey, RelError> {
        let collection_type = self.schema.collection_type_id(type_name)?;
        self.batch(|graph| {
            let collection = graph.instantiate_collection(collection_type, None);
            graph.set_items_with(
                collection,
                items,
                CollectionSetOptions::add(),
                &SetOptions::new().silent(),
            )?;
            Ok(collection)
        })
    }

    /// Adds items, merging JSON into members that share an id.
    pub fn add(&mut self, collection: NodeKey, items: Vec<AttrValue>) -> Result<Vec<NodeKey>, RelError> {
        self.set_items(collection, items, CollectionSetOptions::add())
    }

    pub fn push(&mut self, collection: NodeKey, item: impl Into<AttrValue>) -> Result<NodeKey, RelError> {
        let added = self.add(collection, vec![item.into()])?;
        added
            .into_iter()
            .next()
            .ok_or(RelError::NodeNotFound { node: collection })
    }

    /// Smart update of membership. Returns the resolved members in input
    /// order.
    pub fn set_items(
        &mut self,
        collection: NodeKey,
        items: Vec<AttrValue>,
        options: CollectionSetOptions,
    ) -> Result<Vec<NodeKey>, RelError> {
        self.set_items_with(collection, items, options, &SetOptions::new())
    }

    pub fn remove(&mut self, collection: NodeKey, items: &[NodeKey]) -> Result<(), RelError> {
        self.batch(|graph| {
            let kept: Vec<NodeKey> = graph
                .collection(collection)?
                .items
                .iter()
                .copied()
                .filter(|item| !items.contains(item))
                .collect();
            graph.apply_membership(
                collection,
                kept,
                CollectionSetOptions {
                    add: false,
                    remove: true,
                    merge: false,
                },
                &SetOptions::new(),
            )
        })
    }

    /// Replaces every member at once. Fires a single `Reset` instead of
    /// per-item events.
    pub fn reset(&mut self, collection: NodeKey, items: Vec<AttrValue>) -> Result<(), RelError> {
        self.reset_with(collection, items, &SetOptions::new())
    }

    pub(crate) fn reset_with(
        &mut self,
        collection: NodeKey,
        items: Vec<AttrValue>,
        options: &SetOptions,
    ) -> Result<(), RelError> {
        self.batch(|graph| {
            let previous = std::mem::take(&mut graph.collection_mut(collection)?.items);
            for item in previous {
                graph.detach_member(collection, item);
            }

            let mut members = Vec::with_capacity(items.len());
            for value in items {
                let member = graph.resolve_item(collection, value, true, options)?;
                if !members.contains(&member) {
                    members.push(member);
                }
            }
            for member in &members {
                graph.attach_member(collection, *member)?;
            }
            graph.collection_mut(collection)?.items = members;

            if !options.silent {
                graph.emit(Event::Reset { node: collection });
                let origin = graph.origin_for(options);
                graph.queue_deep_change(collection, origin);
            }
            Ok(())
        })
    }

    pub(crate) fn set_items_with(
        &mut self,
        collection: NodeKey,
        items: Vec<AttrValue>,
        collection_options: CollectionSetOptions,
        options: &SetOptions,
    ) -> Result<Vec<NodeKey>, RelError> {
        self.batch(|graph| {
            graph.collection(collection)?;
            let mut members = Vec::with_capacity(items.len());
            for value in items {
                let member = graph.resolve_item(collection, value, collection_options.merge, options)?;
                if options.loaded {
                    graph.model_mut(member)?.is_synced = true;
                }
                if !members.contains(&member) {
                    members.push(member);
                }
            }
            graph.apply_membership(collection, members.clone(), collection_options, options)?;
            Ok(members)
        })
    }

    /// Live member for one input value: an existing member with the same id,
    /// an instance from the identity hook, or a new model.
    fn resolve_item(
        &mut self,
        collection: NodeKey,
        value: AttrValue,
        merge: bool,
        options: &SetOptions,
    ) -> Result<NodeKey, RelError> {
        let collection_type = self.collection(collection)?.collection_type;
        let item_type = self.schema.collection_item(collection_type);
        let placement = Placement {
            collection: Some(collection),
            parent: None,
        };

        let json = match value {
            AttrValue::Node(node) => {
                self.model(node)?;
                return Ok(node);
            }
            AttrValue::Json(Value::Object(map)) => Value::Object(map),
            AttrValue::Json(scalar) => {
                let id = EntityId::from_json(&scalar).ok_or_else(|| RelError::MalformedInput {
                    key: self.schema.collection_name(collection_type).to_string(),
                })?;
                if let Some(existing) = self.get_by_id(collection, &id) {
                    return Ok(existing);
                }
                if let Some(existing) = self.resolve_instance(item_type, &id) {
                    return Ok(existing);
                }
                let id_attribute = self.id_attribute(item_type).to_string();
                return self.instantiate(item_type, Attrs::one(id_attribute, id.to_json()), options, placement);
            }
            AttrValue::List(_) => {
                return Err(RelError::MalformedInput {
                    key: self.schema.collection_name(collection_type).to_string(),
                })
            }
        };

        let json = if options.parse {
            self.parse_payload(item_type, json)
        } else {
            json
        };
        let incoming = json
            .get(self.id_attribute(item_type))
            .and_then(EntityId::from_json);
        let existing = match &incoming {
            Some(id) => match self.get_by_id(collection, id) {
                Some(node) => Some(node),
                None => self.resolve_instance(item_type, id),
            },
            None => None,
        };

        let attrs = self.attrs_from_json(item_type, json, false)?;
        match existing {
            Some(node) => {
                if merge {
                    let mut nested = options.clone();
                    nested.origin = None;
                    self.set(node, attrs, &nested)?;
                }
                Ok(node)
            }
            None => self.instantiate(item_type, attrs, options, placement),
        }
    }

    /// Moves `collection` to exactly `members` as far as `options` allow,
    /// firing `Add` / `Remove` and one deep change for the whole operation.
    pub(crate) fn apply_membership(
        &mut self,
        collection: NodeKey,
        members: Vec<NodeKey>,
        collection_options: CollectionSetOptions,
        options: &SetOptions,
    ) -> Result<(), RelError> {
        let current = self.collection(collection)?.items.clone();

        let removed: Vec<NodeKey> = if collection_options.remove {
            current.iter().copied().filter(|item| !members.contains(item)).collect()
        } else {
            Vec::new()
        };
        let added: Vec<NodeKey> = if collection_options.add {
            members.iter().copied().filter(|item| !current.contains(item)).collect()
        } else {
            Vec::new()
        };
        let items: Vec<NodeKey> = match (collection_options.add, collection_options.remove) {
            (true, true) => members,
            (true, false) => current.iter().chain(added.iter()).copied().collect(),
            (false, _) => current
                .iter()
                .copied()
                .filter(|item| !removed.contains(item))
                .collect(),
        };
        let reordered = added.is_empty() && removed.is_empty() && items != current;

        for item in &removed {
            self.detach_member(collection, *item);
        }
        for item in &added {
            self.attach_member(collection, *item)?;
        }
        self.collection_mut(collection)?.items = items;
        trace!(
            "Graph: {:?} +{} -{} item(s)",
            collection,
            added.len(),
            removed.len()
        );

        if options.silent || (added.is_empty() && removed.is_empty() && !reordered) {
            return Ok(());
        }
        for item in removed {
            self.emit(Event::Remove {
                node: collection,
                item,
            });
        }
        for item in added {
            self.emit(Event::Add {
                node: collection,
                item,
            });
        }
        let origin = self.origin_for(options);
        self.queue_deep_change(collection, origin);
        Ok(())
    }

    fn attach_member(&mut self, collection: NodeKey, item: NodeKey) -> Result<(), RelError> {
        let model = self.model_mut(item)?;
        if model.collection.is_none() {
            model.collection = Some(collection);
        }
        let model_type = model.model_type;
        let id_attribute = self.id_attribute(model_type).to_string();

        self.subscriptions.subscribe(
            item,
            EventKind::DeepChange,
            Handler::Propagate {
                to: collection,
                key: None,
            },
            false,
        );
        self.subscriptions.subscribe(
            item,
            EventKind::Destroy,
            Handler::RemoveOnDestroy { collection },
            false,
        );
        self.subscriptions.subscribe(
            item,
            EventKind::ChangeAttr(id_attribute),
            Handler::ForwardIdChange { collection },
            false,
        );
        Ok(())
    }

    fn detach_member(&mut self, collection: NodeKey, item: NodeKey) {
        self.subscriptions
            .release(item, |handler| handler.member_of(collection));
        if let Ok(model) = self.model_mut(item) {
            if model.collection == Some(collection) {
                model.collection = None;
            }
        }
    }

    pub(crate) fn instantiate_collection(
        &mut self,
        collection_type: CollectionTypeId,
        parent: Option<Ownership>,
    ) -> NodeKey {
        let mut collection = CollectionNode::new(collection_type);
        collection.parent = parent;
        self.insert_node(Node::Collection(collection))
    }

    fn origin_for(&mut self, options: &SetOptions) -> OriginId {
        match options.origin {
            Some(origin) => origin,
            None => self.origins.generate(),
        }
    }
}
