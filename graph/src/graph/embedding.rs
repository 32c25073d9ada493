use std::rc::Rc;

use serde_json::Value;

use crate::{
    entity::{AttrValue, Attrs, Node, Ownership, Slot},
    events::Event,
    graph::{set::record_change, slot_value, CollectionSetOptions, Graph, RelError, SetOptions},
    schema::{ConfigurationError, Relation, RelationTarget},
    types::NodeKey,
};

use super::set::Placement;

impl Graph {
    /// Embeds `child` under `parent`. Without a key, the parent's embedding
    /// slots are searched for one already holding `child`.
    pub fn set_parent(&mut self, child: NodeKey, parent: NodeKey, key: Option<&str>) -> Result<(), RelError> {
        self.batch(|graph| {
            let schema = Rc::clone(&graph.schema);
            let parent_model = graph.model(parent)?;
            let def = schema.model(parent_model.model_type);

            let key = match key {
                Some(key) => key.to_string(),
                None => def
                    .index
                    .embeddings()
                    .find(|relation| parent_model.related.get(&relation.key) == Some(&Slot::Node(child)))
                    .map(|relation| relation.key.clone())
                    .ok_or(ConfigurationError::ParentKeyNotDetected)?,
            };
            if !def.index.relation(&key).map_or(false, Relation::is_embedding) {
                return Err(ConfigurationError::NotAnEmbedding {
                    owner: def.decl.name.clone(),
                    key,
                }
                .into());
            }

            let holds = parent_model.related.get(&key) == Some(&Slot::Node(child));
            if holds {
                let origin = graph.origins.generate();
                graph.adopt(child, parent, &key, &SetOptions::new().nested(origin))
            } else {
                graph
                    .set(parent, Attrs::one(key, child), &SetOptions::new())
                    .map(|_| ())
            }
        })
    }

    pub(crate) fn set_embedding(
        &mut self,
        holder: NodeKey,
        relation: &Relation,
        value: Option<AttrValue>,
        options: &SetOptions,
        changes: &mut Vec<String>,
    ) -> Result<(), RelError> {
        let key = relation.key.as_str();
        let current = self.model(holder)?.related.get(key).copied();

        match value {
            None => {
                self.model_mut(holder)?.related.remove(key);
            }
            Some(AttrValue::Json(Value::Null)) => {
                self.model_mut(holder)?
                    .related
                    .insert(key.to_string(), Slot::Null);
            }
            Some(AttrValue::Node(child)) => {
                if current != Some(Slot::Node(child)) {
                    self.check_target_kind(child, relation.target)?;
                    self.model_mut(holder)?
                        .related
                        .insert(key.to_string(), Slot::Node(child));
                }
            }
            Some(value) => match current.and_then(|slot| slot.node()) {
                Some(existing) => self.update_embedded(existing, relation, value, options)?,
                None => {
                    let child = self.instantiate_target(
                        relation,
                        value,
                        options,
                        Placement::embedded(holder, key),
                    )?;
                    self.model_mut(holder)?
                        .related
                        .insert(key.to_string(), Slot::Node(child));
                }
            },
        }

        let new_slot = self.model(holder)?.related.get(key).copied();
        record_change(self.model_mut(holder)?, key, new_slot.map(slot_value));
        if new_slot == current {
            return Ok(());
        }
        changes.push(key.to_string());

        if let Some(old) = current.and_then(|slot| slot.node()) {
            let ownership = Ownership {
                owner: holder,
                key: key.to_string(),
            };
            if let Ok(node) = self.node_mut(old) {
                if node.parent() == Some(&ownership) {
                    *node.parent_mut() = None;
                }
            }
        }
        self.listen_to_related(holder, relation, current, new_slot)?;
        if let Some(child) = new_slot.and_then(|slot| slot.node()) {
            self.adopt(child, holder, key, options)?;
        }
        Ok(())
    }

    /// The one place an embedding's back-link is written. Empties the slot of
    /// a previous parent that still holds `child`.
    pub(crate) fn adopt(
        &mut self,
        child: NodeKey,
        owner: NodeKey,
        key: &str,
        options: &SetOptions,
    ) -> Result<(), RelError> {
        let ownership = Ownership {
            owner,
            key: key.to_string(),
        };
        let previous = self.node(child)?.parent().cloned();
        if let Some(previous) = previous.filter(|previous| *previous != ownership) {
            let still_held = self
                .model(previous.owner)
                .map_or(false, |model| model.related.get(&previous.key) == Some(&Slot::Node(child)));
            if still_held {
                let mut unset = options.clone();
                unset.unset = true;
                self.set(previous.owner, Attrs::one(previous.key, child), &unset)?;
            }
        }
        *self.node_mut(child)?.parent_mut() = Some(ownership);
        if !options.silent {
            self.emit(Event::Embedded {
                node: child,
                parent: owner,
                key: key.to_string(),
            });
        }
        Ok(())
    }

    fn update_embedded(
        &mut self,
        existing: NodeKey,
        relation: &Relation,
        value: AttrValue,
        options: &SetOptions,
    ) -> Result<(), RelError> {
        match self.node(existing)? {
            Node::Model(model) => {
                let model_type = model.model_type;
                let json = match value {
                    AttrValue::Json(json @ Value::Object(_)) => json,
                    _ => {
                        return Err(RelError::MalformedInput {
                            key: relation.key.clone(),
                        })
                    }
                };
                let attrs = self.attrs_from_json(model_type, json, options.parse)?;
                self.set(existing, attrs, options)?;
            }
            Node::Collection(_) => {
                let values = list_values(relation, value)?;
                if options.reset {
                    self.reset_with(existing, values, options)?;
                } else {
                    self.set_items_with(existing, values, CollectionSetOptions::replace(), options)?;
                }
            }
        }
        Ok(())
    }

    pub(crate) fn instantiate_target(
        &mut self,
        relation: &Relation,
        value: AttrValue,
        options: &SetOptions,
        placement: Placement,
    ) -> Result<NodeKey, RelError> {
        match relation.target {
            RelationTarget::ToOne(model_type) => {
                let json = match value {
                    AttrValue::Json(json @ Value::Object(_)) => json,
                    _ => {
                        return Err(RelError::MalformedInput {
                            key: relation.key.clone(),
                        })
                    }
                };
                let attrs = self.attrs_from_json(model_type, json, options.parse)?;
                self.instantiate(model_type, attrs, options, placement)
            }
            RelationTarget::ToMany(collection_type) => {
                let values = list_values(relation, value)?;
                let collection = self.instantiate_collection(collection_type, placement.parent);
                let mut silent = options.clone();
                silent.silent = true;
                self.set_items_with(collection, values, CollectionSetOptions::add(), &silent)?;
                Ok(collection)
            }
        }
    }

    /// Creates an empty instance for an absent embedding and installs it.
    pub(crate) fn create_embedded(
        &mut self,
        holder: NodeKey,
        relation: &Relation,
        options: &SetOptions,
    ) -> Result<NodeKey, RelError> {
        let placement = Placement::embedded(holder, &relation.key);
        let child = match relation.target {
            RelationTarget::ToOne(model_type) => {
                self.instantiate(model_type, Attrs::new(), options, placement)?
            }
            RelationTarget::ToMany(collection_type) => {
                self.instantiate_collection(collection_type, placement.parent)
            }
        };
        self.set(holder, Attrs::one(relation.key.clone(), child), options)?;
        Ok(child)
    }

    fn check_target_kind(&self, node: NodeKey, target: RelationTarget) -> Result<(), RelError> {
        match target {
            RelationTarget::ToOne(_) => self.model(node).map(|_| ()),
            RelationTarget::ToMany(_) => self.collection(node).map(|_| ()),
        }
    }
}

fn list_values(relation: &Relation, value: AttrValue) -> Result<Vec<AttrValue>, RelError> {
    match value {
        AttrValue::List(values) => Ok(values),
        AttrValue::Json(Value::Array(values)) => Ok(values.into_iter().map(AttrValue::Json).collect()),
        _ => Err(RelError::MalformedInput {
            key: relation.key.clone(),
        }),
    }
}
