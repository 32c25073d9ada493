//! # relgraph
//! An in-memory object graph of models and collections with typed relations.
//!
//! Model types declare *references* (stored as ids, resolved into live
//! related nodes and fetched on demand) and *embeddings* (owned nested
//! objects with exactly one parent). The [`Graph`] keeps id attributes and
//! related nodes consistent, delivers one deep change per mutation to every
//! node that can reach the mutated one, and coordinates loading so that each
//! node has at most one request in flight and `DeepSync` fires once a whole
//! subgraph has loaded.
//!
//! ```
//! use relgraph::{Attrs, Graph, LoopbackTransport, ModelType, Schema};
//!
//! let schema = Schema::builder()
//!     .model(ModelType::new("User").url_root("/users"))
//!     .model(ModelType::new("Post").url_root("/posts").reference("author", "User"))
//!     .build()
//!     .unwrap();
//! let transport = LoopbackTransport::new();
//! let mut graph = Graph::new(schema, transport.clone());
//!
//! let post = graph.create_model("Post", Attrs::one("authorId", 7)).unwrap();
//! let author = graph.related(post, "author").unwrap();
//! assert_eq!(graph.url(author).unwrap(), "/users/7");
//! assert_eq!(transport.pending_len(), 1);
//! ```

#![deny(trivial_numeric_casts, unstable_features, unused_import_braces)]

mod config;
mod entity;
mod events;
mod graph;
mod identity;
mod key_generator;
mod schema;
mod transport;
mod types;

pub use config::{AutoFetch, GraphConfig};
pub use entity::{AttrValue, Attrs, EntityId, Ownership, Slot};
pub use events::{Event, EventKind, Listener};
pub use graph::{CollectionSetOptions, Graph, RelError, SaveOptions, SetOptions, UrlError};
pub use identity::{InstanceResolver, NewInstances};
pub use key_generator::KeyGenerator;
pub use schema::{
    CollectionType, CollectionTypeId, ConfigurationError, ModelType, ModelTypeId, Relation,
    RelationKind, RelationTarget, Schema, SchemaBuilder, TypeDescriptor,
};
pub use transport::{LoopbackTransport, Method, SyncFailure, SyncRequest, Transport};
pub use types::{GraphKey, NodeKey, OriginId, RequestId, SubscriptionId};
