use thiserror::Error;

/// Structural errors in type and relation declarations. These are fatal and
/// surface at the call that hit them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    /// A relation descriptor named something that is neither a model nor a collection type
    #[error("Relation '{key}' on '{owner}' targets '{target}', which is not a registered model or collection type")]
    UnresolvedRelationTarget {
        owner: String,
        key: String,
        target: String,
    },

    /// A collection type declared an item type that is not a model type
    #[error("Collection type '{collection}' holds '{item}', which is not a registered model type")]
    InvalidCollectionItem { collection: String, item: String },

    /// Two types were registered under the same name
    #[error("Type '{name}' is registered more than once")]
    DuplicateType { name: String },

    /// A key was declared both as a reference and as an embedding
    #[error("Key '{key}' on '{owner}' is declared as both a reference and an embedding")]
    AmbiguousRelation { owner: String, key: String },

    /// Lookup of a type that was never registered
    #[error("Type '{name}' is not registered")]
    UnknownType { name: String },

    /// A relation key that the model type does not declare
    #[error("Invalid relationship key '{key}' on '{owner}'")]
    UnknownRelation { owner: String, key: String },

    /// Re-parenting without a key, and the parent does not hold the child under any embedding key
    #[error("A key for the embedding in the parent must be specified as it could not be detected automatically")]
    ParentKeyNotDetected,

    /// Re-parenting under a key that is not an embedding of the parent's type
    #[error("'{key}' is not an embedding of '{owner}'")]
    NotAnEmbedding { owner: String, key: String },
}
