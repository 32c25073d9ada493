use std::{cell::Cell, rc::Rc};

use log::{debug, trace, warn};
use serde_json::Value;

use crate::{
    entity::{AttrValue, Node, Slot},
    events::{Event, EventKind, Handler},
    graph::{CollectionSetOptions, Graph, RelError, SaveOptions, SetOptions},
    schema::{ConfigurationError, Relation},
    transport::{Method, SyncFailure, SyncRequest},
    types::{NodeKey, RequestId},
};

/// A request handed to the transport and not yet completed.
pub(crate) struct InFlight {
    pub node: NodeKey,
    pub method: Method,
    /// Owners whose fetch queue holds `node` and who are told about the
    /// outcome.
    pub waiters: Vec<NodeKey>,
}

impl Graph {
    /// Loads `node` from its URL. A read already in flight for the node is
    /// reused. Fetching a model also fetches its embeddings.
    pub fn fetch(&mut self, node: NodeKey) -> Result<RequestId, RelError> {
        self.batch(|graph| {
            if let Some(request) = graph.active.get(&node).copied() {
                let reading = graph
                    .in_flight
                    .get(&request)
                    .map_or(false, |flight| flight.method == Method::Read);
                if reading {
                    return Ok(request);
                }
            }
            let request = graph.begin_sync(node, Method::Read, None, None, false)?;
            if graph.is_model(node) {
                graph.auto_fetch_embeddings(node, false)?;
            }
            Ok(request)
        })
    }

    /// Fetches the given relations of `node`, or every embedding that is
    /// absent plus every held node that is neither synced nor syncing.
    /// Absent embeddings are created before they are fetched.
    pub fn fetch_related(&mut self, node: NodeKey, keys: Option<&[&str]>) -> Result<(), RelError> {
        self.batch(|graph| {
            let schema = Rc::clone(&graph.schema);
            let def = schema.model(graph.model(node)?.model_type);

            let relations: Vec<&Relation> = match keys {
                Some(keys) => keys
                    .iter()
                    .map(|key| {
                        def.index
                            .relation(key)
                            .ok_or_else(|| ConfigurationError::UnknownRelation {
                                owner: def.decl.name.clone(),
                                key: key.to_string(),
                            })
                    })
                    .collect::<Result<_, _>>()?,
                None => {
                    let model = graph.model(node)?;
                    def.index
                        .relations()
                        .filter(|relation| match model.related.get(&relation.key) {
                            None => relation.is_embedding(),
                            Some(Slot::Null) => false,
                            Some(Slot::Node(held)) => !graph.is_synced(*held) && !graph.is_syncing(*held),
                        })
                        .collect()
                }
            };

            for relation in relations {
                let child = match graph.model(node)?.related.get(&relation.key).copied() {
                    None if relation.is_embedding() => {
                        graph.create_embedded(node, relation, &SetOptions::new())?
                    }
                    None | Some(Slot::Null) => continue,
                    Some(Slot::Node(child)) => child,
                };
                graph.enqueue_related(node, &relation.key, child);
            }
            graph.drain_fetch_queue(node);
            Ok(())
        })
    }

    /// Writes a model to its URL. New models are created, everything else is
    /// updated, unless `options` forces a method.
    pub fn save(&mut self, node: NodeKey, options: &SaveOptions) -> Result<RequestId, RelError> {
        let model = self.model(node)?;
        let method = match options.force_method {
            Some(method) => method,
            None if model.parent.is_none() && model.is_new() => Method::Create,
            None => Method::Update,
        };
        let inline: Vec<&str> = options.inline_json.iter().map(String::as_str).collect();
        let body = self.to_json(node, &inline)?;
        self.begin_sync(node, method, Some(body), None, false)
    }

    /// Hands the outcome of a request back to the graph. Payloads are parsed
    /// and applied before any completion event fires.
    pub fn complete_sync(
        &mut self,
        request: RequestId,
        outcome: Result<Value, SyncFailure>,
    ) -> Result<(), RelError> {
        self.batch(|graph| {
            let flight = graph
                .in_flight
                .remove(&request)
                .ok_or(RelError::UnknownRequest { request })?;
            if graph.active.get(&flight.node) == Some(&request) {
                graph.active.remove(&flight.node);
            }
            if flight.method == Method::Delete {
                return Ok(());
            }
            if !graph.contains(flight.node) {
                warn!(
                    "Graph: dropping {} completion for destroyed {:?}",
                    flight.method, flight.node
                );
                return Ok(());
            }
            match outcome {
                Ok(payload) => graph.sync_succeeded(flight, payload),
                Err(failure) => {
                    graph.sync_failed(flight, failure);
                    Ok(())
                }
            }
        })
    }

    pub(crate) fn begin_sync(
        &mut self,
        node: NodeKey,
        method: Method,
        body: Option<Value>,
        waiter: Option<NodeKey>,
        auto: bool,
    ) -> Result<RequestId, RelError> {
        let url = self.url(node)?;
        let request = self.requests.generate();
        match self.node_mut(node)? {
            Node::Model(model) => {
                model.is_syncing = true;
                // resolved by this request's own completion
                model.enqueue(node);
            }
            Node::Collection(collection) => collection.is_syncing = true,
        }
        self.in_flight.insert(
            request,
            InFlight {
                node,
                method,
                waiters: waiter.into_iter().collect(),
            },
        );
        self.active.insert(node, request);
        debug!("Graph: {} {} for {:?} ({:?})", method, url, node, request);
        self.transport.send(SyncRequest {
            id: request,
            node,
            method,
            url,
            body,
            auto,
        });
        Ok(request)
    }

    /// Issues a delete nobody waits on.
    pub(crate) fn send_delete(&mut self, node: NodeKey) -> Result<(), RelError> {
        let url = self.url(node)?;
        let request = self.requests.generate();
        self.in_flight.insert(
            request,
            InFlight {
                node,
                method: Method::Delete,
                waiters: Vec::new(),
            },
        );
        debug!("Graph: {} {} for {:?} ({:?})", Method::Delete, url, node, request);
        self.transport.send(SyncRequest {
            id: request,
            node,
            method: Method::Delete,
            url,
            body: None,
            auto: false,
        });
        Ok(())
    }

    /// Starts or joins a fetch for every node in `owner`'s queue. At most one
    /// request is in flight per node; later owners wait on it.
    pub(crate) fn drain_fetch_queue(&mut self, owner: NodeKey) {
        let queue = match self.model(owner) {
            Ok(model) => model.fetch_queue.clone(),
            Err(_) => return,
        };
        for node in queue {
            if node == owner {
                continue;
            }
            if !self.contains(node) {
                if let Ok(model) = self.model_mut(owner) {
                    model.dequeue(node);
                }
                continue;
            }
            if let Some(request) = self.active.get(&node).copied() {
                if let Some(flight) = self.in_flight.get_mut(&request) {
                    if !flight.waiters.contains(&owner) {
                        flight.waiters.push(owner);
                    }
                }
                continue;
            }
            if self.is_synced(node) {
                self.related_fetch_succeeded(owner, node);
                continue;
            }
            if let Err(error) = self.begin_sync(node, Method::Read, None, Some(owner), true) {
                warn!("Graph: cannot fetch {:?} for {:?}: {}", node, owner, error);
                if let Ok(model) = self.model_mut(owner) {
                    model.dequeue(node);
                }
            }
        }
    }

    /// Queues `node` for `owner` when the owner's auto-fetch policy allows
    /// `key` and the node still needs loading.
    pub(crate) fn maybe_enqueue(&mut self, owner: NodeKey, key: &str, node: NodeKey) {
        let allowed = match self.model(owner) {
            Ok(model) => self.auto_fetch_policy(model.model_type).allows(key),
            Err(_) => false,
        };
        if allowed && !self.is_synced(node) {
            self.enqueue_related(owner, key, node);
        }
    }

    fn enqueue_related(&mut self, owner: NodeKey, key: &str, node: NodeKey) {
        if let Err(error) = self.url(node) {
            warn!("Graph: not fetching '{}' of {:?}: {}", key, owner, error);
            return;
        }
        if let Ok(model) = self.model_mut(owner) {
            if model.enqueue(node) {
                trace!("Graph: {:?} waits on {:?} ('{}')", owner, node, key);
            }
        }
    }

    /// Creates absent embeddings allowed by the auto-fetch policy and queues
    /// them. With `only_absent`, embeddings already present are left alone.
    pub(crate) fn auto_fetch_embeddings(&mut self, node: NodeKey, only_absent: bool) -> Result<(), RelError> {
        let model_type = self.model(node)?.model_type;
        let schema = Rc::clone(&self.schema);
        let policy = self.auto_fetch_policy(model_type).clone();

        for relation in schema.model(model_type).index.embeddings() {
            if !policy.allows(&relation.key) {
                continue;
            }
            let child = match self.model(node)?.related.get(&relation.key).copied() {
                None => self.create_embedded(node, relation, &SetOptions::new().silent())?,
                Some(Slot::Null) => continue,
                Some(Slot::Node(_)) if only_absent => continue,
                Some(Slot::Node(child)) => child,
            };
            self.enqueue_related(node, &relation.key, child);
        }
        self.drain_fetch_queue(node);
        Ok(())
    }

    fn sync_succeeded(&mut self, flight: InFlight, payload: Value) -> Result<(), RelError> {
        let node = flight.node;
        let still_syncing = self.active.contains_key(&node);

        match self.node(node)? {
            Node::Model(model) => {
                let model_type = model.model_type;
                if let Node::Model(model) = self.node_mut(node)? {
                    model.is_syncing = still_syncing;
                    model.is_synced = true;
                }
                if !payload.is_null() {
                    let attrs = self.attrs_from_json(model_type, payload, true)?;
                    self.set(node, attrs, &SetOptions::new().parse())?;
                }
                if let Some(id) = self.id(node).cloned() {
                    self.resolver.register(model_type, &id, node);
                }
                for waiter in flight.waiters {
                    self.related_fetch_succeeded(waiter, node);
                }
                self.emit(Event::Sync { node });
                self.related_fetch_succeeded(node, node);
            }
            Node::Collection(collection) => {
                let values: Vec<AttrValue> = match payload {
                    Value::Array(values) => values.into_iter().map(AttrValue::Json).collect(),
                    Value::Null => Vec::new(),
                    _ => {
                        return Err(RelError::MalformedInput {
                            key: self.schema.collection_name(collection.collection_type).to_string(),
                        })
                    }
                };
                self.set_items_with(
                    node,
                    values,
                    CollectionSetOptions::replace(),
                    &SetOptions::new().parse().loaded(),
                )?;
                self.node_mut(node)?.set_sync_flags(still_syncing, true);
                for waiter in flight.waiters {
                    self.related_fetch_succeeded(waiter, node);
                }
                self.emit(Event::Sync { node });
                self.collection_barrier(node)?;
            }
        }
        Ok(())
    }

    fn sync_failed(&mut self, flight: InFlight, failure: SyncFailure) {
        let node = flight.node;
        let still_syncing = self.active.contains_key(&node);
        if let Ok(entry) = self.node_mut(node) {
            let synced = entry.is_synced();
            entry.set_sync_flags(still_syncing, synced);
        }
        warn!("Graph: {} of {:?} failed: {}", flight.method, node, failure);

        for waiter in flight.waiters {
            self.related_fetch_failed(waiter, node, &failure);
        }
        self.emit(Event::Error {
            node,
            failed: node,
            failure,
        });
        if let Ok(model) = self.model_mut(node) {
            model.dequeue(node);
        }
    }

    fn related_fetch_succeeded(&mut self, owner: NodeKey, fetched: NodeKey) {
        let Ok(model) = self.model_mut(owner) else {
            return;
        };
        if model.dequeue(fetched) && model.fetch_queue.is_empty() {
            self.emit(Event::DeepSync { node: owner });
        }
    }

    fn related_fetch_failed(&mut self, owner: NodeKey, failed: NodeKey, failure: &SyncFailure) {
        let Ok(model) = self.model_mut(owner) else {
            return;
        };
        let settled = model.dequeue(failed) && model.fetch_queue.is_empty();
        self.emit(Event::Error {
            node: owner,
            failed,
            failure: failure.clone(),
        });
        if settled {
            self.emit(Event::DeepSync { node: owner });
        }
    }

    /// `DeepSync` of a loaded collection waits for every item that is still
    /// loading itself or its relations.
    fn collection_barrier(&mut self, collection: NodeKey) -> Result<(), RelError> {
        let pending: Vec<NodeKey> = self
            .collection(collection)?
            .items
            .iter()
            .copied()
            .filter(|item| match self.nodes.get(item) {
                Some(Node::Model(model)) => model.is_syncing || !model.fetch_queue.is_empty(),
                _ => false,
            })
            .collect();

        if pending.is_empty() {
            self.emit(Event::DeepSync { node: collection });
            return Ok(());
        }
        trace!("Graph: {:?} waits on {} item(s)", collection, pending.len());
        let remaining = Rc::new(Cell::new(pending.len()));
        for item in pending {
            self.subscriptions.subscribe(
                item,
                EventKind::DeepSync,
                Handler::Barrier {
                    collection,
                    remaining: Rc::clone(&remaining),
                },
                true,
            );
        }
        Ok(())
    }
}
