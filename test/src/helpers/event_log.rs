use std::{cell::RefCell, rc::Rc};

use relgraph::{Event, EventKind, Graph, NodeKey, SubscriptionId};

/// Records events from any number of subscriptions in firing order.
#[derive(Clone, Default)]
pub struct EventLog {
    events: Rc<RefCell<Vec<Event>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn watch(&self, graph: &mut Graph, node: NodeKey, kind: EventKind) -> SubscriptionId {
        let events = Rc::clone(&self.events);
        graph.on(node, kind, move |_, event| {
            events.borrow_mut().push(event.clone());
        })
    }

    pub fn watch_once(&self, graph: &mut Graph, node: NodeKey, kind: EventKind) -> SubscriptionId {
        let events = Rc::clone(&self.events);
        graph.once(node, kind, move |_, event| {
            events.borrow_mut().push(event.clone());
        })
    }

    /// Watches every kind that is not keyed by attribute.
    pub fn watch_all(&self, graph: &mut Graph, node: NodeKey) {
        for kind in [
            EventKind::Change,
            EventKind::DeepChange,
            EventKind::DeepChangePropagated,
            EventKind::Sync,
            EventKind::DeepSync,
            EventKind::Error,
            EventKind::Invalid,
            EventKind::Destroy,
            EventKind::Add,
            EventKind::Remove,
            EventKind::Reset,
            EventKind::Embedded,
        ] {
            self.watch(graph, node, kind);
        }
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.borrow().clone()
    }

    /// Names of the events fired on `node`, in order.
    pub fn names_for(&self, node: NodeKey) -> Vec<&'static str> {
        self.events
            .borrow()
            .iter()
            .filter(|event| event.node() == node)
            .map(Event::name)
            .collect()
    }

    pub fn count(&self, name: &str, node: NodeKey) -> usize {
        self.events
            .borrow()
            .iter()
            .filter(|event| event.node() == node && event.name() == name)
            .count()
    }

    pub fn clear(&self) {
        self.events.borrow_mut().clear();
    }
}
