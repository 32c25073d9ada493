use thiserror::Error;

use crate::{
    schema::ConfigurationError,
    types::{NodeKey, RequestId},
};

/// A URL could not be derived for a node.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UrlError {
    /// The embedding chain ends in a parent that has no id yet
    #[error("Cannot build a URL for embedding '{key}': the parent is not persisted and has no parent of its own")]
    ParentNotPersisted { key: String },

    /// No explicit URL, no base URL and no parent
    #[error("Cannot build a URL for {type_name}: no url, url root, collection or parent")]
    NoBase { type_name: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RelError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Url(#[from] UrlError),

    /// A relation was given a value of the wrong shape
    #[error("Got an unexpected value to set reference '{key}'")]
    MalformedInput { key: String },

    /// A plain attribute was given a node
    #[error("Attribute '{key}' is not a relation and only accepts JSON")]
    NotARelation { key: String },

    #[error("Node {node:?} not found in graph")]
    NodeNotFound { node: NodeKey },

    #[error("Expected a {expected} node for {node:?}, found a {found}")]
    WrongNodeKind {
        node: NodeKey,
        expected: &'static str,
        found: &'static str,
    },

    #[error("Attributes for '{type_name}' must be a JSON object")]
    NotAnObject { type_name: String },

    #[error("Sync request {request:?} is not in flight")]
    UnknownRequest { request: RequestId },
}
