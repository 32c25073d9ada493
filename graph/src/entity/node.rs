use std::collections::{BTreeMap, HashSet};

use serde_json::{Map, Value};

use crate::{
    entity::{attrs::AttrValue, entity_id::EntityId},
    schema::{CollectionTypeId, ModelTypeId},
    types::NodeKey,
};

/// Content of a relation slot. `Null` marks a relation that was explicitly
/// cleared, as opposed to one that was never set.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Slot {
    Node(NodeKey),
    Null,
}

impl Slot {
    pub fn node(&self) -> Option<NodeKey> {
        match self {
            Slot::Node(node) => Some(*node),
            Slot::Null => None,
        }
    }
}

/// Back-link from an embedded node to the node that holds it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ownership {
    pub owner: NodeKey,
    pub key: String,
}

pub(crate) struct ModelNode {
    pub model_type: ModelTypeId,
    pub id: Option<EntityId>,
    pub attributes: Map<String, Value>,
    pub related: BTreeMap<String, Slot>,
    pub changed: BTreeMap<String, AttrValue>,
    pub previous_attributes: Map<String, Value>,
    pub previous_related: BTreeMap<String, Slot>,
    pub parent: Option<Ownership>,
    pub collection: Option<NodeKey>,
    pub url: Option<String>,
    pub is_syncing: bool,
    pub is_synced: bool,
    pub changing: bool,
    pub pending: bool,
    pub fetch_queue: Vec<NodeKey>,
    /// Relation keys whose slot is being resolved by an enclosing `set`.
    pub resolving: HashSet<String>,
    pub validation_error: Option<String>,
}

impl ModelNode {
    pub fn new(model_type: ModelTypeId) -> Self {
        Self {
            model_type,
            id: None,
            attributes: Map::new(),
            related: BTreeMap::new(),
            changed: BTreeMap::new(),
            previous_attributes: Map::new(),
            previous_related: BTreeMap::new(),
            parent: None,
            collection: None,
            url: None,
            is_syncing: false,
            is_synced: false,
            changing: false,
            pending: false,
            fetch_queue: Vec::new(),
            resolving: HashSet::new(),
            validation_error: None,
        }
    }

    pub fn is_new(&self) -> bool {
        self.id.is_none()
    }

    /// Queues `node` for fetching. Returns false when it was already queued.
    pub fn enqueue(&mut self, node: NodeKey) -> bool {
        if self.fetch_queue.contains(&node) {
            return false;
        }
        self.fetch_queue.push(node);
        true
    }

    /// Drops `node` from the queue. Returns true when the queue held it.
    pub fn dequeue(&mut self, node: NodeKey) -> bool {
        let before = self.fetch_queue.len();
        self.fetch_queue.retain(|queued| *queued != node);
        before != self.fetch_queue.len()
    }
}

pub(crate) struct CollectionNode {
    pub collection_type: CollectionTypeId,
    pub items: Vec<NodeKey>,
    pub parent: Option<Ownership>,
    pub url: Option<String>,
    pub is_syncing: bool,
    pub is_synced: bool,
}

impl CollectionNode {
    pub fn new(collection_type: CollectionTypeId) -> Self {
        Self {
            collection_type,
            items: Vec::new(),
            parent: None,
            url: None,
            is_syncing: false,
            is_synced: false,
        }
    }
}

pub(crate) enum Node {
    Model(ModelNode),
    Collection(CollectionNode),
}

impl Node {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Node::Model(_) => "model",
            Node::Collection(_) => "collection",
        }
    }

    pub fn parent(&self) -> Option<&Ownership> {
        match self {
            Node::Model(model) => model.parent.as_ref(),
            Node::Collection(collection) => collection.parent.as_ref(),
        }
    }

    pub fn parent_mut(&mut self) -> &mut Option<Ownership> {
        match self {
            Node::Model(model) => &mut model.parent,
            Node::Collection(collection) => &mut collection.parent,
        }
    }

    pub fn is_syncing(&self) -> bool {
        match self {
            Node::Model(model) => model.is_syncing,
            Node::Collection(collection) => collection.is_syncing,
        }
    }

    pub fn is_synced(&self) -> bool {
        match self {
            Node::Model(model) => model.is_synced,
            Node::Collection(collection) => collection.is_synced,
        }
    }

    pub fn set_sync_flags(&mut self, syncing: bool, synced: bool) {
        match self {
            Node::Model(model) => {
                model.is_syncing = syncing;
                model.is_synced = synced;
            }
            Node::Collection(collection) => {
                collection.is_syncing = syncing;
                collection.is_synced = synced;
            }
        }
    }
}
