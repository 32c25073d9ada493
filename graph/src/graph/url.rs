use crate::{
    entity::{Node, Ownership},
    graph::{Graph, RelError, UrlError},
    types::NodeKey,
};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

impl Graph {
    /// URL of a node: its explicit URL, else the type's base (or the
    /// containing collection's URL) plus the id, else the parent's URL plus
    /// the key the node is embedded under.
    pub fn url(&self, node: NodeKey) -> Result<String, RelError> {
        match self.node(node)? {
            Node::Model(model) => {
                if let Some(url) = &model.url {
                    return Ok(url.clone());
                }
                let def = self.schema.model(model.model_type);
                let base = match (&def.decl.url_root, model.collection) {
                    (Some(root), _) => Some(root.clone()),
                    (None, Some(collection)) if self.contains(collection) => Some(self.url(collection)?),
                    _ => None,
                };
                if let Some(base) = base {
                    return Ok(match &model.id {
                        None => base,
                        Some(id) => join(&base, &self.encode_id(&id.to_string())),
                    });
                }
                match &model.parent {
                    Some(ownership) => self.embedded_url(ownership),
                    None => Err(UrlError::NoBase {
                        type_name: def.decl.name.clone(),
                    }
                    .into()),
                }
            }
            Node::Collection(collection) => {
                if let Some(url) = &collection.url {
                    return Ok(url.clone());
                }
                let decl = &self.schema.collection(collection.collection_type).decl;
                if let Some(url) = &decl.url {
                    return Ok(url.clone());
                }
                match &collection.parent {
                    Some(ownership) => self.embedded_url(ownership),
                    None => Err(UrlError::NoBase {
                        type_name: decl.name.clone(),
                    }
                    .into()),
                }
            }
        }
    }

    /// Overrides the derived URL of one node.
    pub fn set_url(&mut self, node: NodeKey, url: Option<String>) -> Result<(), RelError> {
        match self.node_mut(node)? {
            Node::Model(model) => model.url = url,
            Node::Collection(collection) => collection.url = url,
        }
        Ok(())
    }

    fn embedded_url(&self, ownership: &Ownership) -> Result<String, RelError> {
        if let Node::Model(owner) = self.node(ownership.owner)? {
            if owner.is_new() && owner.parent.is_none() {
                return Err(UrlError::ParentNotPersisted {
                    key: ownership.key.clone(),
                }
                .into());
            }
        }
        Ok(join(&self.url(ownership.owner)?, &ownership.key))
    }

    fn encode_id(&self, id: &str) -> String {
        if self.config.encode_ids {
            encode_uri_component(id)
        } else {
            id.to_string()
        }
    }
}

fn join(base: &str, suffix: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        suffix.trim_start_matches('/')
    )
}

/// Everything except `A-Z a-z 0-9 - _ . ! ~ * ' ( )`.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

pub(crate) fn encode_uri_component(input: &str) -> String {
    utf8_percent_encode(input, COMPONENT).to_string()
}
