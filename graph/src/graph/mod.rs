//! The [`Graph`] arena and its operations, split by concern:
//! attribute routing in `set`, references, embeddings, URL derivation,
//! deep change propagation, fetch coordination, collections and JSON.

mod collection;
mod destroy;
mod dispatch;
mod embedding;
pub(crate) mod error;
mod fetch;
mod options;
mod propagation;
mod reference;
mod serialize;
mod set;
mod url;

use std::{
    collections::{BTreeMap, HashMap, VecDeque},
    rc::Rc,
};

use serde_json::{Map, Value};

use crate::{
    config::{AutoFetch, GraphConfig},
    entity::{AttrValue, CollectionNode, EntityId, ModelNode, Node, Ownership, Slot},
    events::{Event, EventKind, Handler, Subscriptions},
    identity::{InstanceResolver, NewInstances},
    key_generator::KeyGenerator,
    schema::{ModelTypeId, Relation, Schema},
    transport::Transport,
    types::{NodeKey, OriginId, RequestId, SubscriptionId},
};

pub use error::{RelError, UrlError};
pub use options::{CollectionSetOptions, SaveOptions, SetOptions};

use fetch::InFlight;

/// Arena owning every model and collection node, the subscription table and
/// the bookkeeping of in-flight syncs.
pub struct Graph {
    schema: Rc<Schema>,
    config: GraphConfig,
    nodes: HashMap<NodeKey, Node>,
    node_keys: KeyGenerator<NodeKey>,
    origins: KeyGenerator<OriginId>,
    requests: KeyGenerator<RequestId>,
    subscriptions: Subscriptions,
    in_flight: HashMap<RequestId, InFlight>,
    active: HashMap<NodeKey, RequestId>,
    deep_changes: VecDeque<(NodeKey, OriginId)>,
    depth: usize,
    transport: Box<dyn Transport>,
    resolver: Box<dyn InstanceResolver>,
}

impl Graph {
    pub fn new<T: Transport + 'static>(schema: Schema, transport: T) -> Self {
        Self::with_config(schema, GraphConfig::default(), transport)
    }

    pub fn with_config<T: Transport + 'static>(
        schema: Schema,
        config: GraphConfig,
        transport: T,
    ) -> Self {
        Self {
            schema: Rc::new(schema),
            config,
            nodes: HashMap::new(),
            node_keys: KeyGenerator::new(),
            origins: KeyGenerator::new(),
            requests: KeyGenerator::new(),
            subscriptions: Subscriptions::new(),
            in_flight: HashMap::new(),
            active: HashMap::new(),
            deep_changes: VecDeque::new(),
            depth: 0,
            transport: Box::new(transport),
            resolver: Box::new(NewInstances),
        }
    }

    /// Installs an identity hook consulted whenever a model is needed for a
    /// known id.
    pub fn set_instance_resolver<R: InstanceResolver + 'static>(&mut self, resolver: R) {
        self.resolver = Box::new(resolver);
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    // Subscriptions

    pub fn on<F>(&mut self, node: NodeKey, kind: EventKind, listener: F) -> SubscriptionId
    where
        F: Fn(&mut Graph, &Event) + 'static,
    {
        self.subscriptions
            .subscribe(node, kind, Handler::Listener(Rc::new(listener)), false)
    }

    pub fn once<F>(&mut self, node: NodeKey, kind: EventKind, listener: F) -> SubscriptionId
    where
        F: Fn(&mut Graph, &Event) + 'static,
    {
        self.subscriptions
            .subscribe(node, kind, Handler::Listener(Rc::new(listener)), true)
    }

    pub fn off(&mut self, subscription: SubscriptionId) -> bool {
        self.subscriptions.unsubscribe(subscription)
    }

    // Reads

    pub fn contains(&self, node: NodeKey) -> bool {
        self.nodes.contains_key(&node)
    }

    pub fn is_model(&self, node: NodeKey) -> bool {
        matches!(self.nodes.get(&node), Some(Node::Model(_)))
    }

    pub fn is_collection(&self, node: NodeKey) -> bool {
        matches!(self.nodes.get(&node), Some(Node::Collection(_)))
    }

    pub fn type_name(&self, node: NodeKey) -> Result<&str, RelError> {
        Ok(match self.node(node)? {
            Node::Model(model) => self.schema.model_name(model.model_type),
            Node::Collection(collection) => self.schema.collection_name(collection.collection_type),
        })
    }

    pub fn model_type(&self, node: NodeKey) -> Result<ModelTypeId, RelError> {
        Ok(self.model(node)?.model_type)
    }

    /// Id of a persisted model. `None` for new models and unknown nodes.
    pub fn id(&self, node: NodeKey) -> Option<&EntityId> {
        self.model(node).ok()?.id.as_ref()
    }

    pub fn is_new(&self, node: NodeKey) -> Result<bool, RelError> {
        Ok(self.model(node)?.is_new())
    }

    /// Plain attribute, including derived id references.
    pub fn get(&self, node: NodeKey, key: &str) -> Option<&Value> {
        self.model(node).ok()?.attributes.get(key)
    }

    /// Live node held under a relation key.
    pub fn related(&self, node: NodeKey, key: &str) -> Option<NodeKey> {
        self.slot(node, key)?.node()
    }

    pub fn slot(&self, node: NodeKey, key: &str) -> Option<Slot> {
        self.model(node).ok()?.related.get(key).copied()
    }

    pub fn has(&self, node: NodeKey, key: &str) -> bool {
        match self.model(node) {
            Ok(model) => {
                model.related.get(key).and_then(Slot::node).is_some()
                    || model.attributes.get(key).map_or(false, |value| !value.is_null())
            }
            Err(_) => false,
        }
    }

    pub fn attributes(&self, node: NodeKey) -> Result<&Map<String, Value>, RelError> {
        Ok(&self.model(node)?.attributes)
    }

    /// Keys changed by the last settled `set`, with their new values.
    pub fn changed(&self, node: NodeKey) -> Result<&BTreeMap<String, AttrValue>, RelError> {
        Ok(&self.model(node)?.changed)
    }

    pub fn has_changed(&self, node: NodeKey, key: &str) -> bool {
        self.model(node)
            .map(|model| model.changed.contains_key(key))
            .unwrap_or(false)
    }

    /// Value of `key` before the last settled `set`.
    pub fn previous(&self, node: NodeKey, key: &str) -> Option<AttrValue> {
        let model = self.model(node).ok()?;
        if let Some(slot) = model.previous_related.get(key) {
            return Some(slot_value(*slot));
        }
        model.previous_attributes.get(key).cloned().map(AttrValue::Json)
    }

    pub fn parent(&self, node: NodeKey) -> Option<&Ownership> {
        self.nodes.get(&node)?.parent()
    }

    /// Collection a model was first added to.
    pub fn collection_of(&self, node: NodeKey) -> Option<NodeKey> {
        self.model(node).ok()?.collection
    }

    pub fn is_syncing(&self, node: NodeKey) -> bool {
        self.nodes.get(&node).map_or(false, Node::is_syncing)
    }

    pub fn is_synced(&self, node: NodeKey) -> bool {
        self.nodes.get(&node).map_or(false, Node::is_synced)
    }

    /// Related nodes `node` is still waiting on, itself included while its
    /// own sync is outstanding.
    pub fn fetch_queue(&self, node: NodeKey) -> Result<&[NodeKey], RelError> {
        Ok(&self.model(node)?.fetch_queue)
    }

    pub fn validation_error(&self, node: NodeKey) -> Option<&str> {
        self.model(node).ok()?.validation_error.as_deref()
    }

    pub fn items(&self, collection: NodeKey) -> Result<&[NodeKey], RelError> {
        Ok(&self.collection(collection)?.items)
    }

    pub fn get_by_id(&self, collection: NodeKey, id: &EntityId) -> Option<NodeKey> {
        self.collection(collection)
            .ok()?
            .items
            .iter()
            .copied()
            .find(|item| self.id(*item) == Some(id))
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    // Node access

    pub(crate) fn node(&self, node: NodeKey) -> Result<&Node, RelError> {
        self.nodes.get(&node).ok_or(RelError::NodeNotFound { node })
    }

    pub(crate) fn node_mut(&mut self, node: NodeKey) -> Result<&mut Node, RelError> {
        self.nodes.get_mut(&node).ok_or(RelError::NodeNotFound { node })
    }

    pub(crate) fn model(&self, node: NodeKey) -> Result<&ModelNode, RelError> {
        match self.node(node)? {
            Node::Model(model) => Ok(model),
            other => Err(RelError::WrongNodeKind {
                node,
                expected: "model",
                found: other.kind_name(),
            }),
        }
    }

    pub(crate) fn model_mut(&mut self, node: NodeKey) -> Result<&mut ModelNode, RelError> {
        match self.node_mut(node)? {
            Node::Model(model) => Ok(model),
            other => Err(RelError::WrongNodeKind {
                node,
                expected: "model",
                found: other.kind_name(),
            }),
        }
    }

    pub(crate) fn collection(&self, node: NodeKey) -> Result<&CollectionNode, RelError> {
        match self.node(node)? {
            Node::Collection(collection) => Ok(collection),
            other => Err(RelError::WrongNodeKind {
                node,
                expected: "collection",
                found: other.kind_name(),
            }),
        }
    }

    pub(crate) fn collection_mut(&mut self, node: NodeKey) -> Result<&mut CollectionNode, RelError> {
        match self.node_mut(node)? {
            Node::Collection(collection) => Ok(collection),
            other => Err(RelError::WrongNodeKind {
                node,
                expected: "collection",
                found: other.kind_name(),
            }),
        }
    }

    /// Relation declared under `key` by the type of `holder`.
    pub(crate) fn relation(&self, holder: NodeKey, key: &str) -> Result<Relation, RelError> {
        let model_type = self.model(holder)?.model_type;
        let def = self.schema.model(model_type);
        def.index.relation(key).cloned().ok_or_else(|| {
            RelError::Configuration(crate::schema::ConfigurationError::UnknownRelation {
                owner: def.decl.name.clone(),
                key: key.to_string(),
            })
        })
    }

    pub(crate) fn auto_fetch_policy(&self, model_type: ModelTypeId) -> &AutoFetch {
        self.schema
            .model(model_type)
            .decl
            .auto_fetch
            .as_ref()
            .unwrap_or(&self.config.auto_fetch)
    }

    pub(crate) fn id_attribute(&self, model_type: ModelTypeId) -> &str {
        &self.schema.model(model_type).decl.id_attribute
    }

    pub(crate) fn insert_node(&mut self, node: Node) -> NodeKey {
        let key = self.node_keys.generate();
        self.nodes.insert(key, node);
        key
    }
}

pub(crate) fn slot_value(slot: Slot) -> AttrValue {
    match slot {
        Slot::Node(node) => AttrValue::Node(node),
        Slot::Null => AttrValue::null(),
    }
}
