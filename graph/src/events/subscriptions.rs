use std::{cell::Cell, collections::HashMap, rc::Rc};

use crate::{
    events::{Event, EventKind},
    graph::Graph,
    key_generator::KeyGenerator,
    types::{NodeKey, SubscriptionId},
};

pub type Listener = Rc<dyn Fn(&mut Graph, &Event)>;

/// What runs when a subscribed event fires. Everything except `Listener` is
/// bookkeeping the graph installs on relation slots and collection
/// membership.
#[derive(Clone)]
pub(crate) enum Handler {
    Listener(Listener),
    /// Deep changes of the source climb to `to`. `key` is the relation key on
    /// `to`, or `None` for collection membership.
    Propagate { to: NodeKey, key: Option<String> },
    /// Recompute `holder`'s id reference for `key`.
    SyncIdRef { holder: NodeKey, key: String },
    /// One-shot variant of `SyncIdRef` installed while the target is new.
    BackfillIdRef { holder: NodeKey, key: String },
    UnsetOnDestroy { holder: NodeKey, key: String },
    ForwardIdChange { collection: NodeKey },
    RemoveOnDestroy { collection: NodeKey },
    Barrier {
        collection: NodeKey,
        remaining: Rc<Cell<usize>>,
    },
}

impl Handler {
    /// Installed for relation `key` of `holder`.
    pub fn bound_to(&self, holder: NodeKey, relation_key: &str) -> bool {
        match self {
            Handler::Propagate { to, key: Some(key) } => *to == holder && key == relation_key,
            Handler::SyncIdRef { holder: h, key }
            | Handler::BackfillIdRef { holder: h, key }
            | Handler::UnsetOnDestroy { holder: h, key } => *h == holder && key == relation_key,
            _ => false,
        }
    }

    /// Installed for membership in `collection`.
    pub fn member_of(&self, collection: NodeKey) -> bool {
        match self {
            Handler::Propagate { to, key: None } => *to == collection,
            Handler::ForwardIdChange { collection: c } | Handler::RemoveOnDestroy { collection: c } => {
                *c == collection
            }
            _ => false,
        }
    }

    /// Installed on some source on behalf of `node`.
    pub fn serves(&self, node: NodeKey) -> bool {
        match self {
            Handler::Listener(_) => false,
            Handler::Propagate { to, .. } => *to == node,
            Handler::SyncIdRef { holder, .. }
            | Handler::BackfillIdRef { holder, .. }
            | Handler::UnsetOnDestroy { holder, .. } => *holder == node,
            Handler::ForwardIdChange { collection }
            | Handler::RemoveOnDestroy { collection }
            | Handler::Barrier { collection, .. } => *collection == node,
        }
    }
}

#[derive(Clone)]
pub(crate) struct Subscription {
    pub id: SubscriptionId,
    pub handler: Handler,
    pub once: bool,
}

/// Subscriptions keyed by `(source node, event kind)`.
pub(crate) struct Subscriptions {
    table: HashMap<(NodeKey, EventKind), Vec<Subscription>>,
    locations: HashMap<SubscriptionId, (NodeKey, EventKind)>,
    ids: KeyGenerator<SubscriptionId>,
}

impl Subscriptions {
    pub fn new() -> Self {
        Self {
            table: HashMap::new(),
            locations: HashMap::new(),
            ids: KeyGenerator::new(),
        }
    }

    pub fn subscribe(
        &mut self,
        node: NodeKey,
        kind: EventKind,
        handler: Handler,
        once: bool,
    ) -> SubscriptionId {
        let id = self.ids.generate();
        self.locations.insert(id, (node, kind.clone()));
        self.table.entry((node, kind)).or_default().push(Subscription {
            id,
            handler,
            once,
        });
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let Some(location) = self.locations.remove(&id) else {
            return false;
        };
        if let Some(subscriptions) = self.table.get_mut(&location) {
            subscriptions.retain(|subscription| subscription.id != id);
            if subscriptions.is_empty() {
                self.table.remove(&location);
            }
        }
        true
    }

    pub fn is_live(&self, id: SubscriptionId) -> bool {
        self.locations.contains_key(&id)
    }

    /// Subscriptions to run for one firing. One-shot entries are removed
    /// from the table before any of them runs.
    pub fn take_for_dispatch(&mut self, node: NodeKey, kind: &EventKind) -> Vec<Subscription> {
        let location = (node, kind.clone());
        let Some(subscriptions) = self.table.get_mut(&location) else {
            return Vec::new();
        };
        let snapshot = subscriptions.clone();
        subscriptions.retain(|subscription| !subscription.once);
        if subscriptions.is_empty() {
            self.table.remove(&location);
        }
        for subscription in &snapshot {
            if subscription.once {
                self.locations.remove(&subscription.id);
            }
        }
        snapshot
    }

    /// Removes every subscription on `node` whose handler matches.
    pub fn release<F>(&mut self, node: NodeKey, predicate: F)
    where
        F: Fn(&Handler) -> bool,
    {
        let locations = &mut self.locations;
        self.table.retain(|(source, _), subscriptions| {
            if *source != node {
                return true;
            }
            subscriptions.retain(|subscription| {
                let matched = predicate(&subscription.handler);
                if matched {
                    locations.remove(&subscription.id);
                }
                !matched
            });
            !subscriptions.is_empty()
        });
    }

    /// Removes the collection barriers waiting on `node`'s deep sync.
    pub fn take_barriers(&mut self, node: NodeKey) -> Vec<(NodeKey, Rc<Cell<usize>>)> {
        let mut barriers = Vec::new();
        let location = (node, EventKind::DeepSync);
        let Some(subscriptions) = self.table.get_mut(&location) else {
            return barriers;
        };
        let locations = &mut self.locations;
        subscriptions.retain(|subscription| match &subscription.handler {
            Handler::Barrier {
                collection,
                remaining,
            } => {
                barriers.push((*collection, Rc::clone(remaining)));
                locations.remove(&subscription.id);
                false
            }
            _ => true,
        });
        if subscriptions.is_empty() {
            self.table.remove(&location);
        }
        barriers
    }

    /// Nodes a deep change on `node` climbs to.
    pub fn propagation_targets(&self, node: NodeKey) -> Vec<NodeKey> {
        let mut targets = Vec::new();
        if let Some(subscriptions) = self.table.get(&(node, EventKind::DeepChange)) {
            for subscription in subscriptions {
                if let Handler::Propagate { to, .. } = subscription.handler {
                    if !targets.contains(&to) {
                        targets.push(to);
                    }
                }
            }
        }
        targets
    }

    /// Forgets `node` entirely: everything subscribed on it and everything
    /// the graph installed elsewhere on its behalf.
    pub fn drop_node(&mut self, node: NodeKey) {
        let locations = &mut self.locations;
        self.table.retain(|(source, _), subscriptions| {
            subscriptions.retain(|subscription| {
                let dropped = *source == node || subscription.handler.serves(node);
                if dropped {
                    locations.remove(&subscription.id);
                }
                !dropped
            });
            !subscriptions.is_empty()
        });
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.locations.len()
    }
}
