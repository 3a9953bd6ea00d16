use std::collections::HashMap;

/// Unbounded map from state hash to a small handle.
///
/// Suited to state spaces that never need eviction; lifetime is managed by
/// clearing the cache when the owning objects go away.
#[derive(Clone, Debug, Default)]
pub struct StateCache<V: Copy = u16> {
    map: HashMap<u64, V>,
}

impl<V: Copy> StateCache<V> {
    pub fn new() -> Self {
        Self {
            map: HashMap::new(),
        }
    }

    /// Inserts `value`, replacing any entry already stored for `key`.
    pub fn add(&mut self, key: u64, value: V) {
        self.map.insert(key, value);
    }

    pub fn find(&self, key: u64) -> Option<V> {
        self.map.get(&key).copied()
    }

    pub fn invalidate(&mut self, key: u64) -> bool {
        self.map.remove(&key).is_some()
    }

    pub fn invalidate_all(&mut self) {
        self.map.clear();
    }

    pub fn count(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
