use crate::{
    transport::SyncFailure,
    types::{NodeKey, OriginId},
};

#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// Aggregate change of a model, fired once per settled `set`.
    Change { node: NodeKey },
    /// One attribute or relation key changed.
    ChangeAttr { node: NodeKey, key: String },
    /// Something changed in the subgraph reachable from `node`.
    DeepChange {
        node: NodeKey,
        changed: NodeKey,
        origin: OriginId,
    },
    /// Every node reached by a deep change has been notified.
    DeepChangePropagated {
        node: NodeKey,
        changed: NodeKey,
        origin: OriginId,
    },
    Sync { node: NodeKey },
    /// `node` and everything it was waiting on have finished loading.
    DeepSync { node: NodeKey },
    Error {
        node: NodeKey,
        failed: NodeKey,
        failure: SyncFailure,
    },
    Invalid { node: NodeKey, message: String },
    Destroy { node: NodeKey },
    Add { node: NodeKey, item: NodeKey },
    Remove { node: NodeKey, item: NodeKey },
    Reset { node: NodeKey },
    Embedded {
        node: NodeKey,
        parent: NodeKey,
        key: String,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    Change,
    ChangeAttr(String),
    DeepChange,
    DeepChangePropagated,
    Sync,
    DeepSync,
    Error,
    Invalid,
    Destroy,
    Add,
    Remove,
    Reset,
    Embedded,
}

impl EventKind {
    pub fn change_of(key: impl Into<String>) -> Self {
        EventKind::ChangeAttr(key.into())
    }
}

impl Event {
    /// Node the event is fired on.
    pub fn node(&self) -> NodeKey {
        match self {
            Event::Change { node }
            | Event::ChangeAttr { node, .. }
            | Event::DeepChange { node, .. }
            | Event::DeepChangePropagated { node, .. }
            | Event::Sync { node }
            | Event::DeepSync { node }
            | Event::Error { node, .. }
            | Event::Invalid { node, .. }
            | Event::Destroy { node }
            | Event::Add { node, .. }
            | Event::Remove { node, .. }
            | Event::Reset { node }
            | Event::Embedded { node, .. } => *node,
        }
    }

    pub fn kind(&self) -> EventKind {
        match self {
            Event::Change { .. } => EventKind::Change,
            Event::ChangeAttr { key, .. } => EventKind::ChangeAttr(key.clone()),
            Event::DeepChange { .. } => EventKind::DeepChange,
            Event::DeepChangePropagated { .. } => EventKind::DeepChangePropagated,
            Event::Sync { .. } => EventKind::Sync,
            Event::DeepSync { .. } => EventKind::DeepSync,
            Event::Error { .. } => EventKind::Error,
            Event::Invalid { .. } => EventKind::Invalid,
            Event::Destroy { .. } => EventKind::Destroy,
            Event::Add { .. } => EventKind::Add,
            Event::Remove { .. } => EventKind::Remove,
            Event::Reset { .. } => EventKind::Reset,
            Event::Embedded { .. } => EventKind::Embedded,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Event::Change { .. } => "change",
            Event::ChangeAttr { .. } => "change:attr",
            Event::DeepChange { .. } => "deepchange",
            Event::DeepChangePropagated { .. } => "deepchange_propagated",
            Event::Sync { .. } => "sync",
            Event::DeepSync { .. } => "deepsync",
            Event::Error { .. } => "error",
            Event::Invalid { .. } => "invalid",
            Event::Destroy { .. } => "destroy",
            Event::Add { .. } => "add",
            Event::Remove { .. } => "remove",
            Event::Reset { .. } => "reset",
            Event::Embedded { .. } => "embedded",
        }
    }
}
