use std::ops::{Deref, DerefMut};

use log::debug;
use relgraph::{Graph, LoopbackTransport, RequestId, Schema, SyncFailure};
use serde_json::Value;

use super::fixtures::fixture_schema;

pub fn init_logger() {
    env_logger::builder()
        .filter_level(log::LevelFilter::Debug)
        .is_test(true)
        .try_init()
        .ok();
}

/// A [`Graph`] wired to a [`LoopbackTransport`] the test answers by hand.
pub struct TestGraph {
    graph: Graph,
    pub transport: LoopbackTransport,
}

impl TestGraph {
    pub fn new() -> Self {
        Self::with_schema(fixture_schema())
    }

    pub fn with_schema(schema: Schema) -> Self {
        let transport = LoopbackTransport::new();
        Self {
            graph: Graph::new(schema, transport.clone()),
            transport,
        }
    }

    /// Completes the pending request for `url` with `payload`.
    pub fn respond(&mut self, url: &str, payload: Value) -> RequestId {
        let request = self
            .transport
            .take_for(url)
            .unwrap_or_else(|| panic!("no pending request for {}", url));
        debug!("TestGraph: responding to {} {}", request.method, url);
        self.graph
            .complete_sync(request.id, Ok(payload))
            .expect("request is in flight");
        request.id
    }

    /// Fails the pending request for `url` with `status`.
    pub fn fail(&mut self, url: &str, status: u16) -> RequestId {
        let request = self
            .transport
            .take_for(url)
            .unwrap_or_else(|| panic!("no pending request for {}", url));
        self.graph
            .complete_sync(request.id, Err(SyncFailure::new(status)))
            .expect("request is in flight");
        request.id
    }

    pub fn pending_urls(&self) -> Vec<String> {
        self.transport
            .pending()
            .into_iter()
            .map(|request| request.url)
            .collect()
    }
}

impl Default for TestGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl Deref for TestGraph {
    type Target = Graph;

    fn deref(&self) -> &Graph {
        &self.graph
    }
}

impl DerefMut for TestGraph {
    fn deref_mut(&mut self) -> &mut Graph {
        &mut self.graph
    }
}
