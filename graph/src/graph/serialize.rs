use std::collections::BTreeMap;

use serde_json::Value;

use crate::{
    entity::{Node, Slot},
    graph::{Graph, RelError},
    types::NodeKey,
};

impl Graph {
    /// Wire shape of `node`. References appear through their id attributes;
    /// related nodes are nested only under the keys named by the type's
    /// inline list or by `inline`, which may hold dotted paths.
    pub fn to_json(&self, node: NodeKey, inline: &[&str]) -> Result<Value, RelError> {
        let paths: Vec<Vec<&str>> = inline.iter().map(|path| path.split('.').collect()).collect();
        let mut visiting = Vec::new();
        self.serialize(node, &paths, &mut visiting)
    }

    fn serialize(&self, node: NodeKey, inline: &[Vec<&str>], visiting: &mut Vec<NodeKey>) -> Result<Value, RelError> {
        visiting.push(node);
        let json = match self.node(node)? {
            Node::Model(model) => {
                let decl = &self.schema.model(model.model_type).decl;
                let declared: Vec<Vec<&str>> = decl
                    .inline_json
                    .iter()
                    .map(|path| path.split('.').collect())
                    .collect();

                let mut nested: BTreeMap<&str, Vec<Vec<&str>>> = BTreeMap::new();
                for path in inline.iter().chain(declared.iter()) {
                    if let Some((head, rest)) = path.split_first() {
                        let tails = nested.entry(*head).or_default();
                        if !rest.is_empty() {
                            tails.push(rest.to_vec());
                        }
                    }
                }

                let mut json = model.attributes.clone();
                for (key, tails) in nested {
                    match model.related.get(key) {
                        Some(Slot::Null) => {
                            json.insert(key.to_string(), Value::Null);
                        }
                        Some(Slot::Node(child)) if !visiting.contains(child) => {
                            let value = self.serialize(*child, &tails, visiting)?;
                            json.insert(key.to_string(), value);
                        }
                        _ => {}
                    }
                }
                Value::Object(json)
            }
            Node::Collection(collection) => {
                let mut items = Vec::with_capacity(collection.items.len());
                for item in &collection.items {
                    if !visiting.contains(item) {
                        items.push(self.serialize(*item, inline, visiting)?);
                    }
                }
                Value::Array(items)
            }
        };
        visiting.pop();
        Ok(json)
    }
}
