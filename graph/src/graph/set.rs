use std::{collections::HashSet, rc::Rc};

use serde_json::Value;

use crate::{
    entity::{AttrValue, Attrs, EntityId, ModelNode, Node, Ownership},
    events::Event,
    graph::{slot_value, Graph, RelError, SetOptions},
    schema::{KeyClass, ModelDef, ModelTypeId},
    types::NodeKey,
};

/// Where a freshly instantiated model sits before its first `set`.
#[derive(Clone, Debug, Default)]
pub(crate) struct Placement {
    pub collection: Option<NodeKey>,
    pub parent: Option<Ownership>,
}

impl Placement {
    pub fn embedded(owner: NodeKey, key: &str) -> Self {
        Self {
            collection: None,
            parent: Some(Ownership {
                owner,
                key: key.to_string(),
            }),
        }
    }
}

impl Graph {
    pub fn create_model(&mut self, type_name: &str, attrs: Attrs) -> Result<NodeKey, RelError> {
        self.create_model_with(type_name, attrs, &SetOptions::new())
    }

    pub fn create_model_with(
        &mut self,
        type_name: &str,
        attrs: Attrs,
        options: &SetOptions,
    ) -> Result<NodeKey, RelError> {
        let model_type = self.schema.model_type_id(type_name)?;
        self.batch(|graph| graph.instantiate(model_type, attrs, options, Placement::default()))
    }

    /// Creates a model from a raw payload, running the type's parse hook
    /// first when `options.parse` is set.
    pub fn create_model_from_json(
        &mut self,
        type_name: &str,
        json: Value,
        options: &SetOptions,
    ) -> Result<NodeKey, RelError> {
        let model_type = self.schema.model_type_id(type_name)?;
        let attrs = self.attrs_from_json(model_type, json, options.parse)?;
        self.batch(|graph| graph.instantiate(model_type, attrs, options, Placement::default()))
    }

    /// Applies `attrs` to a model. Returns `Ok(false)` when validation
    /// rejected the call, in which case nothing changed.
    pub fn set(&mut self, node: NodeKey, attrs: Attrs, options: &SetOptions) -> Result<bool, RelError> {
        self.batch(|graph| graph.apply_set(node, attrs, options))
    }

    pub fn set_attr(
        &mut self,
        node: NodeKey,
        key: &str,
        value: impl Into<AttrValue>,
    ) -> Result<bool, RelError> {
        self.set(node, Attrs::one(key, value), &SetOptions::new())
    }

    pub fn unset(&mut self, node: NodeKey, key: &str) -> Result<bool, RelError> {
        self.set(node, Attrs::one(key, AttrValue::null()), &SetOptions::new().unset())
    }

    pub(crate) fn instantiate(
        &mut self,
        model_type: ModelTypeId,
        attrs: Attrs,
        options: &SetOptions,
        placement: Placement,
    ) -> Result<NodeKey, RelError> {
        let mut model = ModelNode::new(model_type);
        model.collection = placement.collection;
        model.parent = placement.parent;
        let node = self.insert_node(Node::Model(model));

        let schema = Rc::clone(&self.schema);
        let def = schema.model(model_type);
        let mut attrs = attrs;
        for (key, default) in &def.decl.defaults {
            if attrs.contains_key(key) {
                continue;
            }
            let id_ref_given = def
                .index
                .relation(key)
                .and_then(|relation| relation.id_ref.as_ref())
                .map_or(false, |id_ref| attrs.contains_key(id_ref));
            if id_ref_given {
                continue;
            }
            attrs.insert(key.clone(), AttrValue::Json(default.clone()));
        }

        let mut initial = options.clone();
        initial.unset = false;
        initial.clear = false;
        if let Err(error) = self.set(node, attrs, &initial) {
            self.forget(node);
            return Err(error);
        }

        // creation is not a change of the new node
        self.deep_changes.retain(|(queued, _)| *queued != node);
        let model = self.model_mut(node)?;
        model.changed.clear();
        if let Some(id) = model.id.clone() {
            self.resolver.register(model_type, &id, node);
            self.auto_fetch_embeddings(node, true)?;
        }
        Ok(node)
    }

    pub(crate) fn attrs_from_json(
        &self,
        model_type: ModelTypeId,
        json: Value,
        parse: bool,
    ) -> Result<Attrs, RelError> {
        let json = if parse {
            self.parse_payload(model_type, json)
        } else {
            json
        };
        Attrs::from_json(json).ok_or_else(|| RelError::NotAnObject {
            type_name: self.schema.model_name(model_type).to_string(),
        })
    }

    pub(crate) fn parse_payload(&self, model_type: ModelTypeId, payload: Value) -> Value {
        match &self.schema.model(model_type).decl.parse {
            Some(parse) => parse(payload),
            None => payload,
        }
    }

    fn apply_set(&mut self, node: NodeKey, attrs: Attrs, options: &SetOptions) -> Result<bool, RelError> {
        let schema = Rc::clone(&self.schema);
        let def = schema.model(self.model(node)?.model_type);

        let origin = match options.origin {
            Some(origin) => origin,
            None => self.origins.generate(),
        };
        let nested = options.nested(origin);

        if options.validate && !options.unset {
            if let Some(validate) = &def.decl.validate {
                let mut candidate = self.model(node)?.attributes.clone();
                for (key, value) in attrs.iter() {
                    if let AttrValue::Json(json) = value {
                        candidate.insert(key.clone(), json.clone());
                    }
                }
                if let Err(message) = validate(&candidate) {
                    self.model_mut(node)?.validation_error = Some(message.clone());
                    self.emit(Event::Invalid { node, message });
                    return Ok(false);
                }
            }
            self.model_mut(node)?.validation_error = None;
        }

        let changing = {
            let model = self.model_mut(node)?;
            let changing = model.changing;
            model.changing = true;
            if !changing {
                model.previous_attributes = model.attributes.clone();
                model.previous_related = model.related.clone();
                model.changed.clear();
            }
            changing
        };

        let changes = match self.apply_attrs(node, def, attrs, options, &nested) {
            Ok(changes) => changes,
            Err(error) => {
                if let Ok(model) = self.model_mut(node) {
                    model.changing = changing;
                }
                return Err(error);
            }
        };

        if !options.silent {
            if !changes.is_empty() {
                self.model_mut(node)?.pending = true;
            }
            for key in changes {
                self.emit(Event::ChangeAttr { node, key });
            }
        }
        if changing {
            return Ok(true);
        }
        if !options.silent {
            while self.model(node).map_or(false, |model| model.pending) {
                self.model_mut(node)?.pending = false;
                self.emit(Event::Change { node });
            }
        }

        // a change listener may have destroyed the node
        let Ok(model) = self.model_mut(node) else {
            return Ok(true);
        };
        model.pending = false;
        model.changing = false;
        if !options.silent && !model.changed.is_empty() {
            self.queue_deep_change(node, origin);
        }
        self.drain_fetch_queue(node);
        Ok(true)
    }

    /// Routes every key to the plain, reference or embedding path and
    /// returns the keys whose value changed.
    fn apply_attrs(
        &mut self,
        node: NodeKey,
        def: &ModelDef,
        attrs: Attrs,
        options: &SetOptions,
        nested: &SetOptions,
    ) -> Result<Vec<String>, RelError> {
        let mut attrs = attrs;
        let mut unset_keys: Vec<String> = Vec::new();
        if options.unset {
            unset_keys = attrs.keys().cloned().collect();
            attrs = Attrs::new();
        }
        if options.clear {
            self.clear_omitted(node, def, &mut attrs, &mut unset_keys)?;
        }

        let id_attribute = def.decl.id_attribute.as_str();
        if unset_keys.iter().any(|key| key == id_attribute) {
            self.model_mut(node)?.id = None;
        } else if let Some(value) = attrs.get(id_attribute) {
            let id = match value {
                AttrValue::Json(json) => EntityId::from_json(json),
                _ => {
                    return Err(RelError::NotARelation {
                        key: id_attribute.to_string(),
                    })
                }
            };
            self.model_mut(node)?.id = id;
        }

        // nested JSON under a relation key beats that relation's id key
        let side_loaded: HashSet<String> = attrs
            .iter()
            .filter(|(_, value)| !value.is_null())
            .filter_map(|(key, _)| match def.index.classify(key) {
                KeyClass::Reference(relation) => Some(relation.key.clone()),
                _ => None,
            })
            .collect();

        let mut changes = Vec::new();
        for key in unset_keys {
            self.route(node, def, &key, None, nested, &mut changes)?;
        }
        for (key, value) in attrs {
            if let KeyClass::IdReference(relation) = def.index.classify(&key) {
                if side_loaded.contains(&relation.key) {
                    continue;
                }
            }
            self.route(node, def, &key, Some(value), nested, &mut changes)?;
        }
        Ok(changes)
    }

    fn route(
        &mut self,
        node: NodeKey,
        def: &ModelDef,
        key: &str,
        value: Option<AttrValue>,
        options: &SetOptions,
        changes: &mut Vec<String>,
    ) -> Result<(), RelError> {
        match def.index.classify(key) {
            KeyClass::Embedding(relation) => self.set_embedding(node, relation, value, options, changes),
            KeyClass::Reference(relation) | KeyClass::IdReference(relation) => {
                self.set_reference(node, relation, value, options, changes)
            }
            KeyClass::Plain => self.set_plain(node, key, value, changes),
        }
    }

    fn set_plain(
        &mut self,
        node: NodeKey,
        key: &str,
        value: Option<AttrValue>,
        changes: &mut Vec<String>,
    ) -> Result<(), RelError> {
        let value = match value {
            None => None,
            Some(AttrValue::Json(json)) => Some(json),
            Some(_) => {
                return Err(RelError::NotARelation {
                    key: key.to_string(),
                })
            }
        };
        let model = self.model_mut(node)?;
        if model.attributes.get(key) != value.as_ref() {
            changes.push(key.to_string());
        }
        record_change(model, key, value.clone().map(AttrValue::Json));
        match value {
            Some(json) => {
                model.attributes.insert(key.to_string(), json);
            }
            None => {
                model.attributes.remove(key);
            }
        }
        Ok(())
    }

    /// Fills `attrs` and `unset_keys` for a `clear` set: every key the model
    /// holds that `attrs` does not mention is restored to its default, or
    /// unset when it has none. Relations count as one key together with
    /// their id key.
    fn clear_omitted(
        &self,
        node: NodeKey,
        def: &ModelDef,
        attrs: &mut Attrs,
        unset_keys: &mut Vec<String>,
    ) -> Result<(), RelError> {
        let model = self.model(node)?;
        let defaults = &def.decl.defaults;

        let mut mentioned: HashSet<String> = HashSet::new();
        for key in attrs.keys().chain(unset_keys.iter()) {
            mentioned.insert(key.clone());
            if let Some(relation) = def.index.canonical(key) {
                mentioned.insert(relation.key.clone());
                if let Some(id_ref) = &relation.id_ref {
                    mentioned.insert(id_ref.clone());
                }
            }
        }

        let held: Vec<String> = model
            .attributes
            .keys()
            .chain(model.related.keys())
            .cloned()
            .collect();
        let mut handled: HashSet<String> = HashSet::new();
        for key in held {
            if mentioned.contains(&key) {
                continue;
            }
            match def.index.canonical(&key) {
                Some(relation) => {
                    if !handled.insert(relation.key.clone()) {
                        continue;
                    }
                    let default = defaults
                        .get(&relation.key)
                        .map(|value| (relation.key.clone(), value))
                        .or_else(|| {
                            let id_ref = relation.id_ref.as_ref()?;
                            defaults.get(id_ref).map(|value| (id_ref.clone(), value))
                        });
                    match default {
                        Some((default_key, value)) => attrs.insert(default_key, value.clone()),
                        None => unset_keys.push(relation.key.clone()),
                    }
                }
                None => match defaults.get(&key) {
                    Some(value) => attrs.insert(key, value.clone()),
                    None => unset_keys.push(key),
                },
            }
        }
        Ok(())
    }
}

/// Updates the per-cycle `changed` map for `key` against the snapshot taken
/// when the cycle started.
pub(crate) fn record_change(model: &mut ModelNode, key: &str, value: Option<AttrValue>) {
    let previous = match model.previous_related.get(key) {
        Some(slot) => Some(slot_value(*slot)),
        None => model.previous_attributes.get(key).cloned().map(AttrValue::Json),
    };
    if previous == value {
        model.changed.remove(key);
    } else {
        model
            .changed
            .insert(key.to_string(), value.unwrap_or_else(AttrValue::null));
    }
}
