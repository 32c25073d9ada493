use serde_json::Value;

use crate::{
    entity::{AttrValue, Attrs, EntityId, Node, Slot},
    events::{Event, EventKind, Handler},
    graph::{set::record_change, slot_value, CollectionSetOptions, Graph, RelError, SetOptions},
    schema::{CollectionTypeId, ModelTypeId, Relation, RelationTarget},
    types::NodeKey,
};

use super::set::Placement;

impl Graph {
    /// Resolves `value` into the slot of reference `relation` on `holder` and
    /// keeps the derived id attribute in step.
    pub(crate) fn set_reference(
        &mut self,
        holder: NodeKey,
        relation: &Relation,
        value: Option<AttrValue>,
        options: &SetOptions,
        changes: &mut Vec<String>,
    ) -> Result<(), RelError> {
        let key = relation.key.as_str();
        let id_ref = relation.id_ref.as_deref().unwrap_or(key);

        let (current_slot, current_id) = {
            let model = self.model(holder)?;
            (model.related.get(key).copied(), model.attributes.get(id_ref).cloned())
        };

        self.model_mut(holder)?.resolving.insert(key.to_string());
        let resolved = self.resolve_reference(holder, relation, value, options);
        if let Ok(model) = self.model_mut(holder) {
            model.resolving.remove(key);
        }
        resolved?;

        let model = self.model_mut(holder)?;
        let new_slot = model.related.get(key).copied();
        let new_id = model.attributes.get(id_ref).cloned();

        let id_changed = new_id != current_id;
        let slot_changed = new_slot != current_slot;
        if id_changed && id_ref != key {
            changes.push(id_ref.to_string());
            record_change(model, id_ref, new_id.map(AttrValue::Json));
        }
        if slot_changed || (id_changed && id_ref == key) {
            changes.push(key.to_string());
            record_change(model, key, new_slot.map(slot_value));
        }
        if slot_changed {
            self.listen_to_related(holder, relation, current_slot, new_slot)?;
        }
        Ok(())
    }

    fn resolve_reference(
        &mut self,
        holder: NodeKey,
        relation: &Relation,
        value: Option<AttrValue>,
        options: &SetOptions,
    ) -> Result<(), RelError> {
        let key = relation.key.as_str();
        let id_ref = relation.id_ref.as_deref().unwrap_or(key);

        let value = match value {
            None => {
                let model = self.model_mut(holder)?;
                model.related.remove(key);
                model.attributes.remove(id_ref);
                return Ok(());
            }
            Some(value) if value.is_null() => {
                let model = self.model_mut(holder)?;
                model.related.insert(key.to_string(), Slot::Null);
                model.attributes.insert(id_ref.to_string(), Value::Null);
                return Ok(());
            }
            Some(value) => value,
        };

        let target = match relation.target {
            RelationTarget::ToOne(model_type) => {
                self.resolve_to_one(holder, relation, model_type, value, options)?
            }
            RelationTarget::ToMany(collection_type) => {
                self.resolve_to_many(holder, relation, collection_type, value, options)?
            }
        };
        self.model_mut(holder)?
            .related
            .insert(key.to_string(), Slot::Node(target));
        self.ensure_id_reference(holder, relation)
    }

    fn resolve_to_one(
        &mut self,
        holder: NodeKey,
        relation: &Relation,
        model_type: ModelTypeId,
        value: AttrValue,
        options: &SetOptions,
    ) -> Result<NodeKey, RelError> {
        let current = self
            .model(holder)?
            .related
            .get(&relation.key)
            .and_then(Slot::node);

        match value {
            AttrValue::Node(node) => {
                self.model(node)?;
                Ok(node)
            }
            AttrValue::Json(Value::Object(map)) => {
                let json = Value::Object(map);
                let json = if options.parse {
                    self.parse_payload(model_type, json)
                } else {
                    json
                };
                let incoming = json
                    .get(self.id_attribute(model_type))
                    .and_then(EntityId::from_json);

                // merge into the current object unless it is persisted under another id
                let mergeable = current.filter(|current| match (self.id(*current), &incoming) {
                    (None, _) | (Some(_), None) => true,
                    (Some(current_id), Some(incoming)) => current_id == incoming,
                });
                let target = match (mergeable, &incoming) {
                    (Some(node), _) => Some(node),
                    (None, Some(id)) => self.resolve_instance(model_type, id),
                    (None, None) => None,
                };

                let attrs = self.attrs_from_json(model_type, json, false)?;
                let node = match target {
                    Some(node) => {
                        self.set(node, attrs, options)?;
                        node
                    }
                    None => self.instantiate(model_type, attrs, options, Placement::default())?,
                };
                self.mark_side_loaded(holder, node)?;
                Ok(node)
            }
            AttrValue::Json(scalar) => {
                let id = EntityId::from_json(&scalar).ok_or_else(|| RelError::MalformedInput {
                    key: relation.key.clone(),
                })?;
                if let Some(current) = current {
                    if self.id(current) == Some(&id) {
                        return Ok(current);
                    }
                }
                self.resolve_by_id(holder, relation, model_type, id, options)
            }
            AttrValue::List(_) => Err(RelError::MalformedInput {
                key: relation.key.clone(),
            }),
        }
    }

    fn resolve_to_many(
        &mut self,
        holder: NodeKey,
        relation: &Relation,
        collection_type: CollectionTypeId,
        value: AttrValue,
        options: &SetOptions,
    ) -> Result<NodeKey, RelError> {
        let values = match value {
            AttrValue::Node(node) => {
                self.collection(node)?;
                return Ok(node);
            }
            AttrValue::List(values) => values,
            AttrValue::Json(Value::Array(values)) => values.into_iter().map(AttrValue::Json).collect(),
            AttrValue::Json(_) => {
                return Err(RelError::MalformedInput {
                    key: relation.key.clone(),
                })
            }
        };

        let collection = match self.model(holder)?.related.get(&relation.key).and_then(Slot::node) {
            Some(collection) if self.is_collection(collection) => collection,
            _ => self.instantiate_collection(collection_type, None),
        };
        let item_type = self.schema.collection_item(collection_type);

        let mut members = Vec::with_capacity(values.len());
        for value in values {
            let member = match value {
                AttrValue::Node(node) => {
                    self.model(node)?;
                    node
                }
                AttrValue::Json(Value::Object(map)) => {
                    let json = Value::Object(map);
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
                    let node = match existing {
                        Some(node) => {
                            self.set(node, attrs, options)?;
                            node
                        }
                        None => self.instantiate(item_type, attrs, options, Placement::default())?,
                    };
                    self.mark_side_loaded(holder, node)?;
                    node
                }
                AttrValue::Json(scalar) => {
                    let id = EntityId::from_json(&scalar).ok_or_else(|| RelError::MalformedInput {
                        key: relation.key.clone(),
                    })?;
                    match self.get_by_id(collection, &id) {
                        Some(existing) => existing,
                        None => self.resolve_by_id(holder, relation, item_type, id, options)?,
                    }
                }
                AttrValue::List(_) => {
                    return Err(RelError::MalformedInput {
                        key: relation.key.clone(),
                    })
                }
            };
            if !members.contains(&member) {
                members.push(member);
            }
        }

        self.apply_membership(
            collection,
            members,
            CollectionSetOptions::replace_without_merge(),
            options,
        )?;
        Ok(collection)
    }

    /// Live instance for a bare id: from the identity hook, else a stub that
    /// carries only the id and is queued for fetching when allowed.
    fn resolve_by_id(
        &mut self,
        holder: NodeKey,
        relation: &Relation,
        model_type: ModelTypeId,
        id: EntityId,
        options: &SetOptions,
    ) -> Result<NodeKey, RelError> {
        let node = match self.resolve_instance(model_type, &id) {
            Some(node) => node,
            None => {
                let id_attribute = self.id_attribute(model_type).to_string();
                let attrs = Attrs::one(id_attribute, id.to_json());
                self.instantiate(model_type, attrs, options, Placement::default())?
            }
        };
        self.maybe_enqueue(holder, &relation.key, node);
        Ok(node)
    }

    pub(crate) fn resolve_instance(&mut self, model_type: ModelTypeId, id: &EntityId) -> Option<NodeKey> {
        let node = self.resolver.resolve(model_type, id)?;
        match self.nodes.get(&node) {
            Some(Node::Model(model)) if model.model_type == model_type => Some(node),
            _ => None,
        }
    }

    /// Side-loaded data counts as loaded.
    fn mark_side_loaded(&mut self, holder: NodeKey, node: NodeKey) -> Result<(), RelError> {
        self.model_mut(node)?.is_synced = true;
        self.model_mut(holder)?.dequeue(node);
        Ok(())
    }

    /// Writes the id attribute of reference `relation` from its current slot.
    /// A new to-one target leaves the attribute absent and gets a one-shot
    /// back-fill on its id change.
    pub(crate) fn ensure_id_reference(&mut self, holder: NodeKey, relation: &Relation) -> Result<(), RelError> {
        let key = relation.key.as_str();
        let id_ref = relation.id_ref.as_deref().unwrap_or(key);
        let Some(target) = self.model(holder)?.related.get(key).and_then(Slot::node) else {
            return Ok(());
        };

        match relation.target {
            RelationTarget::ToOne(model_type) => match self.model(target)?.id.clone() {
                Some(id) => {
                    self.model_mut(holder)?
                        .attributes
                        .insert(id_ref.to_string(), id.to_json());
                }
                None => {
                    self.model_mut(holder)?.attributes.remove(id_ref);
                    self.subscriptions.release(target, |handler| {
                        matches!(handler, Handler::BackfillIdRef { holder: h, key: k } if *h == holder && k == key)
                    });
                    let id_attribute = self.id_attribute(model_type).to_string();
                    self.subscriptions.subscribe(
                        target,
                        EventKind::ChangeAttr(id_attribute),
                        Handler::BackfillIdRef {
                            holder,
                            key: key.to_string(),
                        },
                        true,
                    );
                }
            },
            RelationTarget::ToMany(_) => {
                let ids: Vec<Value> = self
                    .collection(target)?
                    .items
                    .iter()
                    .filter_map(|item| self.id(*item).map(EntityId::to_json))
                    .collect();
                self.model_mut(holder)?
                    .attributes
                    .insert(id_ref.to_string(), Value::Array(ids));
            }
        }
        Ok(())
    }

    /// Re-derives the id attribute after the related object changed on its
    /// own, firing change events when the value moved.
    pub(crate) fn update_id_ref(&mut self, holder: NodeKey, relation: &Relation) -> Result<(), RelError> {
        let id_ref = relation.id_ref.as_deref().unwrap_or(relation.key.as_str());
        let before = self.model(holder)?.attributes.get(id_ref).cloned();
        self.ensure_id_reference(holder, relation)?;
        let after = self.model(holder)?.attributes.get(id_ref).cloned();
        if before != after {
            self.emit(Event::ChangeAttr {
                node: holder,
                key: id_ref.to_string(),
            });
            self.emit(Event::Change { node: holder });
        }
        Ok(())
    }

    /// Moves the graph's subscriptions for `relation` on `holder` from the
    /// old slot content to the new one.
    pub(crate) fn listen_to_related(
        &mut self,
        holder: NodeKey,
        relation: &Relation,
        old: Option<Slot>,
        new: Option<Slot>,
    ) -> Result<(), RelError> {
        let key = relation.key.as_str();
        if let Some(old) = old.and_then(|slot| slot.node()) {
            self.subscriptions
                .release(old, |handler| handler.bound_to(holder, key));
        }
        let Some(new) = new.and_then(|slot| slot.node()) else {
            return Ok(());
        };

        self.subscriptions.subscribe(
            new,
            EventKind::DeepChange,
            Handler::Propagate {
                to: holder,
                key: Some(key.to_string()),
            },
            false,
        );
        let (is_model, id_attribute) = match self.node(new)? {
            Node::Model(model) => (true, self.id_attribute(model.model_type).to_string()),
            Node::Collection(collection) => {
                let item_type = self.schema.collection_item(collection.collection_type);
                (false, self.id_attribute(item_type).to_string())
            }
        };
        let mut kinds = vec![EventKind::ChangeAttr(id_attribute)];
        if is_model {
            self.subscriptions.subscribe(
                new,
                EventKind::Destroy,
                Handler::UnsetOnDestroy {
                    holder,
                    key: key.to_string(),
                },
                false,
            );
        } else {
            kinds.extend([EventKind::Add, EventKind::Remove, EventKind::Reset]);
        }
        if relation.is_reference() {
            for kind in kinds {
                self.subscriptions.subscribe(
                    new,
                    kind,
                    Handler::SyncIdRef {
                        holder,
                        key: key.to_string(),
                    },
                    false,
                );
            }
        }
        Ok(())
    }
}
