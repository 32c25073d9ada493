use std::{cell::Cell, rc::Rc};

use log::warn;

use crate::{
    entity::{Attrs, Slot},
    events::{Event, Handler},
    graph::{Graph, RelError, SetOptions},
    types::NodeKey,
};

impl Graph {
    /// Fires `event` on its node. Subscriptions removed by an earlier
    /// handler of the same firing are skipped.
    pub(crate) fn emit(&mut self, event: Event) {
        let subscriptions = self
            .subscriptions
            .take_for_dispatch(event.node(), &event.kind());
        for subscription in subscriptions {
            if !subscription.once && !self.subscriptions.is_live(subscription.id) {
                continue;
            }
            if let Err(error) = self.run_handler(&subscription.handler, &event) {
                warn!(
                    "Graph: handler for '{}' on {:?} failed: {}",
                    event.name(),
                    event.node(),
                    error
                );
            }
        }
    }

    fn run_handler(&mut self, handler: &Handler, event: &Event) -> Result<(), RelError> {
        match handler {
            Handler::Listener(listener) => {
                let listener = Rc::clone(listener);
                listener(self, event);
            }
            // deep changes climb in `propagate_deep_change`
            Handler::Propagate { .. } => {}
            Handler::SyncIdRef { holder, key } | Handler::BackfillIdRef { holder, key } => {
                self.sync_id_ref(*holder, key, event.node())?;
            }
            Handler::UnsetOnDestroy { holder, key } => {
                let destroyed = event.node();
                let holds = self
                    .model(*holder)
                    .map(|model| model.related.get(key.as_str()) == Some(&Slot::Node(destroyed)))
                    .unwrap_or(false);
                if holds {
                    self.set(*holder, Attrs::one(key.clone(), destroyed), &SetOptions::new().unset())?;
                }
            }
            Handler::ForwardIdChange { collection } => {
                if let Event::ChangeAttr { key, .. } = event {
                    if self.contains(*collection) {
                        self.emit(Event::ChangeAttr {
                            node: *collection,
                            key: key.clone(),
                        });
                    }
                }
            }
            Handler::RemoveOnDestroy { collection } => {
                if self.contains(*collection) {
                    self.remove(*collection, &[event.node()])?;
                }
            }
            Handler::Barrier {
                collection,
                remaining,
            } => self.step_barrier(*collection, remaining),
        }
        Ok(())
    }

    /// Counts one awaited item as settled. The collection deep-syncs when
    /// the last one settles.
    pub(crate) fn step_barrier(&mut self, collection: NodeKey, remaining: &Cell<usize>) {
        let left = remaining.get().saturating_sub(1);
        remaining.set(left);
        if left == 0 && self.contains(collection) {
            self.emit(Event::DeepSync { node: collection });
        }
    }

    /// Keeps `holder`'s id reference for `key` in step with `source`, unless
    /// an enclosing `set` on `holder` is resolving that key right now.
    fn sync_id_ref(&mut self, holder: NodeKey, key: &str, source: NodeKey) -> Result<(), RelError> {
        let Ok(model) = self.model(holder) else {
            return Ok(());
        };
        if model.resolving.contains(key) || model.related.get(key) != Some(&Slot::Node(source)) {
            return Ok(());
        }
        let relation = self.relation(holder, key)?;
        self.update_id_ref(holder, &relation)
    }
}
