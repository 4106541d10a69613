//! Bounded FIFO set of recently admitted message ids.

use std::collections::{HashSet, VecDeque};

use crate::message::MessageId;

/// Default number of ids remembered.
pub const DEFAULT_CACHE_CAPACITY: usize = 200;

/// Bounded set of message ids with first-in-first-out eviction.
///
/// Membership is O(1). Once full, inserting a new id evicts the oldest one.
#[derive(Debug, Clone)]
pub struct IdentityCache {
    order: VecDeque<MessageId>,
    members: HashSet<MessageId>,
    capacity: usize,
}

impl IdentityCache {
    /// Create an empty cache. A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            order: VecDeque::with_capacity(capacity),
            members: HashSet::with_capacity(capacity),
            capacity,
        }
    }

    /// Whether `id` is remembered.
    pub fn contains(&self, id: &MessageId) -> bool {
        self.members.contains(id)
    }

    /// Remember `id`, returning the id evicted to make room, if any.
    ///
    /// Inserting an id that is already present is a no-op.
    pub fn insert(&mut self, id: MessageId) -> Option<MessageId> {
        if !self.members.insert(id.clone()) {
            return None;
        }
        self.order.push_back(id);

        if self.order.len() > self.capacity {
            let evicted = self.order.pop_front()?;
            self.members.remove(&evicted);
            return Some(evicted);
        }
        None
    }

    /// Forget everything.
    pub fn clear(&mut self) {
        self.order.clear();
        self.members.clear();
    }

    /// Number of ids remembered.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether nothing is remembered.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Maximum number of ids remembered.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Remembered ids, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &MessageId> {
        self.order.iter()
    }
}

impl Default for IdentityCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: usize) -> MessageId {
        MessageId::new(format!("m{n}"))
    }

    #[test]
    fn evicts_oldest_when_full() {
        let mut cache = IdentityCache::new(3);
        for n in 0..3 {
            assert_eq!(cache.insert(id(n)), None);
        }

        assert_eq!(cache.insert(id(3)), Some(id(0)));
        assert!(!cache.contains(&id(0)));
        assert!(cache.contains(&id(3)));
        assert_eq!(cache.len(), 3);
        assert_eq!(cache.iter().cloned().collect::<Vec<_>>(), vec![id(1), id(2), id(3)]);
    }

    #[test]
    fn reinsert_does_not_refresh_position() {
        let mut cache = IdentityCache::new(2);
        cache.insert(id(0));
        cache.insert(id(1));
        assert_eq!(cache.insert(id(0)), None);

        assert_eq!(cache.insert(id(2)), Some(id(0)));
    }

    #[test]
    fn zero_capacity_holds_one() {
        let mut cache = IdentityCache::new(0);
        assert_eq!(cache.capacity(), 1);
        cache.insert(id(0));
        assert_eq!(cache.insert(id(1)), Some(id(0)));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn clear_forgets_everything() {
        let mut cache = IdentityCache::default();
        cache.insert(id(0));
        cache.clear();

        assert!(cache.is_empty());
        assert!(!cache.contains(&id(0)));
        assert_eq!(cache.capacity(), DEFAULT_CACHE_CAPACITY);
    }
}
