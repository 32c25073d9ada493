use log::debug;

use crate::{
    entity::{Node, Slot},
    events::Event,
    graph::{Graph, RelError},
    types::NodeKey,
};

impl Graph {
    /// Removes `node` from the graph. Holders drop their slots and
    /// collections drop the item. Persisted models are deleted remotely.
    pub fn destroy(&mut self, node: NodeKey) -> Result<(), RelError> {
        self.batch(|graph| {
            let persisted = match graph.node(node)? {
                Node::Model(model) => !model.is_new(),
                Node::Collection(_) => false,
            };
            if persisted {
                graph.send_delete(node)?;
            }
            graph.emit(Event::Destroy { node });
            graph.forget(node);
            Ok(())
        })
    }

    /// Drops `node` and every trace of it. The only events fired are deep
    /// syncs of collections whose last awaited item was `node`.
    pub(crate) fn forget(&mut self, node: NodeKey) {
        let barriers = self.subscriptions.take_barriers(node);
        self.subscriptions.drop_node(node);
        self.active.remove(&node);
        for flight in self.in_flight.values_mut() {
            flight.waiters.retain(|waiter| *waiter != node);
        }
        self.deep_changes.retain(|(queued, _)| *queued != node);

        let Some(removed) = self.nodes.remove(&node) else {
            return;
        };
        for entry in self.nodes.values_mut() {
            if entry.parent().map_or(false, |ownership| ownership.owner == node) {
                *entry.parent_mut() = None;
            }
            match entry {
                Node::Model(model) => {
                    model.fetch_queue.retain(|queued| *queued != node);
                    model.related.retain(|_, slot| *slot != Slot::Node(node));
                    if model.collection == Some(node) {
                        model.collection = None;
                    }
                }
                Node::Collection(collection) => collection.items.retain(|item| *item != node),
            }
        }
        if let Node::Model(_) = removed {
            self.resolver.forget(node);
        }
        debug!("Graph: forgot {:?}", node);

        for (collection, remaining) in barriers {
            self.step_barrier(collection, &remaining);
        }
    }
}
