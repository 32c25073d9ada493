use std::marker::PhantomData;

use crate::types::GraphKey;

/// Monotonic key source. Keys are never recycled.
pub struct KeyGenerator<K: GraphKey> {
    next: u64,
    phantom: PhantomData<K>,
}

impl<K: GraphKey> KeyGenerator<K> {
    pub fn new() -> Self {
        Self {
            next: 1,
            phantom: PhantomData,
        }
    }

    pub fn generate(&mut self) -> K {
        let key = K::from_u64(self.next);
        self.next = self.next.wrapping_add(1);
        key
    }
}

impl<K: GraphKey> Default for KeyGenerator<K> {
    fn default() -> Self {
        Self::new()
    }
}
