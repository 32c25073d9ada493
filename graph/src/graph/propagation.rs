use std::collections::{HashSet, VecDeque};

use log::trace;

use crate::{
    events::Event,
    graph::Graph,
    types::{NodeKey, OriginId},
};

impl Graph {
    /// Runs `f` as one unit of work. Deep changes queued inside are
    /// delivered when the outermost unit finishes.
    pub(crate) fn batch<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        if self.depth == 0 {
            self.flush_deep_changes();
        }
        result
    }

    pub(crate) fn queue_deep_change(&mut self, node: NodeKey, origin: OriginId) {
        if self.deep_changes.contains(&(node, origin)) {
            return;
        }
        self.deep_changes.push_back((node, origin));
    }

    fn flush_deep_changes(&mut self) {
        // listeners that mutate the graph queue behind the current climb
        self.depth += 1;
        let mut delivered: HashSet<(NodeKey, OriginId)> = HashSet::new();
        while let Some((node, origin)) = self.deep_changes.pop_front() {
            self.propagate_deep_change(node, origin, &mut delivered);
        }
        self.depth -= 1;
    }

    /// Breadth-first climb from `start` along propagation subscriptions.
    /// `delivered` spans the whole flush, so a node hears about an origin
    /// once even when the origin was queued from several nodes.
    fn propagate_deep_change(
        &mut self,
        start: NodeKey,
        origin: OriginId,
        delivered: &mut HashSet<(NodeKey, OriginId)>,
    ) {
        let mut reached = Vec::new();
        let mut frontier = VecDeque::from([start]);

        while let Some(node) = frontier.pop_front() {
            if !self.contains(node) || !delivered.insert((node, origin)) {
                continue;
            }
            reached.push(node);
            self.emit(Event::DeepChange {
                node,
                changed: start,
                origin,
            });
            frontier.extend(self.subscriptions.propagation_targets(node));
        }

        trace!(
            "Graph: {:?} from {:?} reached {} node(s)",
            origin,
            start,
            reached.len()
        );
        for node in reached {
            if self.contains(node) {
                self.emit(Event::DeepChangePropagated {
                    node,
                    changed: start,
                    origin,
                });
            }
        }
    }
}
