use std::collections::{btree_map, BTreeMap};

use serde_json::{Map, Value};

use crate::types::NodeKey;

/// One incoming value for [`Graph::set`](crate::Graph::set).
///
/// Plain attributes only ever take `Json`. Relation keys additionally accept a
/// live node, or for to-many references a list mixing nodes, JSON objects and
/// ids.
#[derive(Clone, Debug, PartialEq)]
pub enum AttrValue {
    Json(Value),
    Node(NodeKey),
    List(Vec<AttrValue>),
}

impl AttrValue {
    pub fn null() -> Self {
        AttrValue::Json(Value::Null)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, AttrValue::Json(Value::Null))
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            AttrValue::Json(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_node(&self) -> Option<NodeKey> {
        match self {
            AttrValue::Node(node) => Some(*node),
            _ => None,
        }
    }
}

impl From<Value> for AttrValue {
    fn from(value: Value) -> Self {
        AttrValue::Json(value)
    }
}

impl From<NodeKey> for AttrValue {
    fn from(node: NodeKey) -> Self {
        AttrValue::Node(node)
    }
}

impl From<Vec<NodeKey>> for AttrValue {
    fn from(nodes: Vec<NodeKey>) -> Self {
        AttrValue::List(nodes.into_iter().map(AttrValue::Node).collect())
    }
}

impl From<Vec<AttrValue>> for AttrValue {
    fn from(values: Vec<AttrValue>) -> Self {
        AttrValue::List(values)
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        AttrValue::Json(Value::from(value))
    }
}

impl From<i64> for AttrValue {
    fn from(value: i64) -> Self {
        AttrValue::Json(Value::from(value))
    }
}

impl From<i32> for AttrValue {
    fn from(value: i32) -> Self {
        AttrValue::Json(Value::from(value))
    }
}

impl From<bool> for AttrValue {
    fn from(value: bool) -> Self {
        AttrValue::Json(Value::from(value))
    }
}

/// Keyed input of a `set` call.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Attrs {
    entries: BTreeMap<String, AttrValue>,
}

impl Attrs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Single-entry attrs.
    pub fn one(key: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        Self::new().with(key, value)
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Attrs from a JSON object. Anything else is rejected.
    pub fn from_json(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self::from(map)),
            _ => None,
        }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<AttrValue>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&AttrValue> {
        self.entries.get(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<AttrValue> {
        self.entries.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, AttrValue> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl From<Map<String, Value>> for Attrs {
    fn from(map: Map<String, Value>) -> Self {
        Self {
            entries: map
                .into_iter()
                .map(|(key, value)| (key, AttrValue::Json(value)))
                .collect(),
        }
    }
}

impl FromIterator<(String, AttrValue)> for Attrs {
    fn from_iter<T: IntoIterator<Item = (String, AttrValue)>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Attrs {
    type Item = (String, AttrValue);
    type IntoIter = btree_map::IntoIter<String, AttrValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}
