use crate::{entity::EntityId, schema::ModelTypeId, types::NodeKey};

/// Hook consulted before a model is instantiated for a known id.
///
/// Resolvers let several holders share one live instance per `(type, id)`.
/// The graph never evicts on its own; a resolver returning a key that is no
/// longer in the graph is ignored.
pub trait InstanceResolver {
    fn resolve(&mut self, model_type: ModelTypeId, id: &EntityId) -> Option<NodeKey>;

    /// Called after the graph instantiated a model that has an id.
    fn register(&mut self, _model_type: ModelTypeId, _id: &EntityId, _node: NodeKey) {}

    /// Called when a model is destroyed.
    fn forget(&mut self, _node: NodeKey) {}
}

/// Always constructs a new instance.
#[derive(Clone, Copy, Debug, Default)]
pub struct NewInstances;

impl InstanceResolver for NewInstances {
    fn resolve(&mut self, _model_type: ModelTypeId, _id: &EntityId) -> Option<NodeKey> {
        None
    }
}
