//! Seam between the graph and whatever performs I/O.
//!
//! The graph hands out [`SyncRequest`]s through [`Transport::send`] and
//! expects each outcome back through
//! [`Graph::complete_sync`](crate::Graph::complete_sync), in any order.

mod loopback;

use std::fmt;

use serde_json::Value;
use thiserror::Error;

use crate::types::{NodeKey, RequestId};

pub use loopback::LoopbackTransport;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Method {
    Read,
    Create,
    Update,
    Patch,
    Delete,
}

impl Method {
    pub fn http_verb(&self) -> &'static str {
        match self {
            Method::Read => "GET",
            Method::Create => "POST",
            Method::Update => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.http_verb())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SyncRequest {
    pub id: RequestId,
    pub node: NodeKey,
    pub method: Method,
    pub url: String,
    pub body: Option<Value>,
    /// Issued by the graph on behalf of an owner rather than by a caller.
    pub auto: bool,
}

/// Failed sync reported by the transport. Never returned as an error; the
/// graph turns it into [`Event::Error`](crate::Event::Error) on the node and
/// on every owner waiting for it.
#[derive(Clone, Debug, PartialEq, Error)]
#[error("sync failed with status {status}")]
pub struct SyncFailure {
    pub status: u16,
    pub body: Value,
}

impl SyncFailure {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            body: Value::Null,
        }
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = body;
        self
    }
}

pub trait Transport {
    fn send(&mut self, request: SyncRequest);
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send(&mut self, request: SyncRequest) {
        (**self).send(request)
    }
}
