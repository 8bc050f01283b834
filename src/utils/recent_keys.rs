/// Bounded set of recently seen idempotency keys, oldest evicted first
use std::collections::{HashSet, VecDeque};

pub struct RecentKeys {
    capacity: usize,
    keys: HashSet<String>,
    order: VecDeque<String>,
}

impl RecentKeys {
    pub fn with_capacity(capacity: usize) -> Self {
        RecentKeys {
            capacity: capacity.max(1),
            keys: HashSet::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
        }
    }

    /// False when `key` was already seen
    pub fn insert(&mut self, key: &str) -> bool {
        if self.keys.contains(key) {
            return false;
        }
        if self.order.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.keys.remove(&oldest);
            }
        }
        self.keys.insert(key.to_string());
        self.order.push_back(key.to_string());
        true
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_rejected() {
        let mut keys = RecentKeys::with_capacity(4);
        assert!(keys.insert("a"));
        assert!(!keys.insert("a"));
        assert_eq!(keys.len(), 1);
    }

    #[test]
    fn test_oldest_evicted_at_capacity() {
        let mut keys = RecentKeys::with_capacity(2);
        assert!(keys.insert("a"));
        assert!(keys.insert("b"));
        assert!(keys.insert("c"));
        assert_eq!(keys.len(), 2);

        // "a" fell out, so it reads as new again
        assert!(keys.insert("a"));
        assert!(!keys.insert("c"));
    }
}
