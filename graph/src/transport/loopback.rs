use std::{cell::RefCell, collections::VecDeque, rc::Rc};

use crate::{
    transport::{Method, SyncRequest, Transport},
    types::RequestId,
};

/// Records requests instead of performing them. Clones share the same log,
/// so a caller can keep a handle after giving one to the graph.
#[derive(Clone, Default)]
pub struct LoopbackTransport {
    outbox: Rc<RefCell<VecDeque<SyncRequest>>>,
    sent: Rc<RefCell<Vec<SyncRequest>>>,
}

impl LoopbackTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Oldest request not yet taken.
    pub fn take(&self) -> Option<SyncRequest> {
        self.outbox.borrow_mut().pop_front()
    }

    /// Takes the pending request addressed to `url`, if any.
    pub fn take_for(&self, url: &str) -> Option<SyncRequest> {
        let mut outbox = self.outbox.borrow_mut();
        let position = outbox.iter().position(|request| request.url == url)?;
        outbox.remove(position)
    }

    pub fn pending(&self) -> Vec<SyncRequest> {
        self.outbox.borrow().iter().cloned().collect()
    }

    pub fn pending_len(&self) -> usize {
        self.outbox.borrow().len()
    }

    /// Every request ever sent, in order.
    pub fn sent(&self) -> Vec<SyncRequest> {
        self.sent.borrow().clone()
    }

    pub fn sent_count(&self, method: Method, url: &str) -> usize {
        self.sent
            .borrow()
            .iter()
            .filter(|request| request.method == method && request.url == url)
            .count()
    }

    pub fn request(&self, id: RequestId) -> Option<SyncRequest> {
        self.sent.borrow().iter().find(|request| request.id == id).cloned()
    }
}

impl Transport for LoopbackTransport {
    fn send(&mut self, request: SyncRequest) {
        self.sent.borrow_mut().push(request.clone());
        self.outbox.borrow_mut().push_back(request);
    }
}
