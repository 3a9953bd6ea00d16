use std::collections::HashMap;
use std::fmt;

use stateconfig::StateConfig;

use super::Release;

const NONE: u16 = u16::MAX;

/// Slot index of an entry in a [`StateCacheLru`].
///
/// Handles are reused after invalidation, so a handle kept across an
/// invalidation may name a different entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct LruHandle(u16);

impl LruHandle {
    pub const fn index(self) -> u16 {
        self.0
    }
}

struct Entry<T> {
    key: u64,
    value: T,
    parent: u16,
    prev: u16,
    next: u16,
}

/// Bounded map from state hash to backend object, evicting the least
/// recently touched entry when full.
///
/// Entries live in a fixed slot arena; recency is a doubly linked list of
/// slot indices with the most recently touched entry at the head.
pub struct StateCacheLru<T: Release> {
    index: HashMap<u64, u16>,
    slots: Vec<Option<Entry<T>>>,
    free: Vec<u16>,
    head: u16,
    tail: u16,
}

impl<T: Release> StateCacheLru<T> {
    /// A zero `capacity` is raised to one.
    pub fn with_capacity(capacity: u16) -> Self {
        let capacity = capacity.max(1);
        let mut slots = Vec::with_capacity(usize::from(capacity));
        slots.resize_with(usize::from(capacity), || None);
        Self {
            index: HashMap::with_capacity(usize::from(capacity)),
            slots,
            free: (0..capacity).rev().collect(),
            head: NONE,
            tail: NONE,
        }
    }

    /// Sized by `caches.pipeline_capacity`.
    pub fn from_config(config: &StateConfig) -> Self {
        Self::with_capacity(config.caches.pipeline_capacity)
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn count(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Inserts `value` as the most recently touched entry.
    ///
    /// Evicts the least recently touched entry first when every slot is in
    /// use. An existing entry for `key` is invalidated and replaced.
    pub fn add(&mut self, key: u64, value: T, parent: u16) -> LruHandle {
        self.invalidate(key);

        let handle = match self.free.pop() {
            Some(handle) => handle,
            None => {
                let victim = self.tail;
                if let Some(entry) = self.slot(victim) {
                    tracing::trace!(key = entry.key, parent = entry.parent, "evicting state");
                }
                self.remove(victim);
                self.free.pop().unwrap_or(victim)
            }
        };

        self.slots[usize::from(handle)] = Some(Entry {
            key,
            value,
            parent,
            prev: NONE,
            next: NONE,
        });
        self.push_front(handle);
        self.index.insert(key, handle);
        LruHandle(handle)
    }

    /// Looks up `key`, marking it most recently touched on a hit.
    pub fn find(&mut self, key: u64) -> Option<&mut T> {
        let handle = self.find_handle(key)?;
        self.get_mut(handle)
    }

    pub fn find_handle(&mut self, key: u64) -> Option<LruHandle> {
        let handle = *self.index.get(&key)?;
        self.touch(handle);
        Some(LruHandle(handle))
    }

    /// Runs `f` on the entry for `key` in place, touching it.
    pub fn mutate<R>(&mut self, key: u64, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        self.find(key).map(f)
    }

    pub fn contains(&self, key: u64) -> bool {
        self.index.contains_key(&key)
    }

    pub fn get(&self, handle: LruHandle) -> Option<&T> {
        self.slot(handle.0).map(|entry| &entry.value)
    }

    pub fn get_mut(&mut self, handle: LruHandle) -> Option<&mut T> {
        self.slots
            .get_mut(usize::from(handle.0))
            .and_then(Option::as_mut)
            .map(|entry| &mut entry.value)
    }

    pub fn parent(&self, handle: LruHandle) -> Option<u16> {
        self.slot(handle.0).map(|entry| entry.parent)
    }

    /// Key of the entry the next eviction would remove.
    pub fn least_recent(&self) -> Option<u64> {
        self.slot(self.tail).map(|entry| entry.key)
    }

    /// Entries from most to least recently touched.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            cache: self,
            cursor: self.head,
        }
    }

    pub fn invalidate(&mut self, key: u64) -> bool {
        match self.index.get(&key).copied() {
            Some(handle) => {
                self.remove(handle);
                true
            }
            None => false,
        }
    }

    pub fn invalidate_handle(&mut self, handle: LruHandle) -> bool {
        if self.slot(handle.0).is_none() {
            return false;
        }
        self.remove(handle.0);
        true
    }

    /// Drops every entry created on behalf of `parent`, returning how many.
    pub fn invalidate_with_parent(&mut self, parent: u16) -> usize {
        let mut removed = 0;
        let mut cursor = self.head;
        while let Some(entry) = self.slot(cursor) {
            let next = entry.next;
            if entry.parent == parent {
                self.remove(cursor);
                removed += 1;
            }
            cursor = next;
        }
        if removed > 0 {
            tracing::debug!(parent, removed, "invalidated dependent state");
        }
        removed
    }

    pub fn invalidate_all(&mut self) {
        let released = self.index.len();
        for slot in &mut self.slots {
            if let Some(entry) = slot.take() {
                entry.value.release();
            }
        }
        self.index.clear();
        self.free = (0..self.slots.len() as u16).rev().collect();
        self.head = NONE;
        self.tail = NONE;
        if released > 0 {
            tracing::debug!(released, "cleared state cache");
        }
    }

    fn slot(&self, handle: u16) -> Option<&Entry<T>> {
        self.slots.get(usize::from(handle)).and_then(Option::as_ref)
    }

    fn links_mut(&mut self, handle: u16) -> Option<(&mut u16, &mut u16)> {
        self.slots
            .get_mut(usize::from(handle))
            .and_then(Option::as_mut)
            .map(|entry| (&mut entry.prev, &mut entry.next))
    }

    fn unlink(&mut self, handle: u16) {
        let (prev, next) = match self.slot(handle) {
            Some(entry) => (entry.prev, entry.next),
            None => return,
        };
        match self.links_mut(prev) {
            Some((_, prev_next)) => *prev_next = next,
            None => self.head = next,
        }
        match self.links_mut(next) {
            Some((next_prev, _)) => *next_prev = prev,
            None => self.tail = prev,
        }
        if let Some((entry_prev, entry_next)) = self.links_mut(handle) {
            *entry_prev = NONE;
            *entry_next = NONE;
        }
    }

    fn push_front(&mut self, handle: u16) {
        let old_head = self.head;
        if let Some((prev, next)) = self.links_mut(handle) {
            *prev = NONE;
            *next = old_head;
        }
        match self.links_mut(old_head) {
            Some((head_prev, _)) => *head_prev = handle,
            None => self.tail = handle,
        }
        self.head = handle;
    }

    fn touch(&mut self, handle: u16) {
        if self.head != handle {
            self.unlink(handle);
            self.push_front(handle);
        }
    }

    fn remove(&mut self, handle: u16) {
        self.unlink(handle);
        if let Some(entry) = self.slots.get_mut(usize::from(handle)).and_then(Option::take) {
            self.index.remove(&entry.key);
            self.free.push(handle);
            entry.value.release();
        }
    }
}

impl<T: Release + fmt::Debug> fmt::Debug for StateCacheLru<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateCacheLru")
            .field("capacity", &self.capacity())
            .field("count", &self.count())
            .field("entries", &self.iter())
            .finish()
    }
}

pub struct Iter<'a, T: Release> {
    cache: &'a StateCacheLru<T>,
    cursor: u16,
}

/// Lists the remaining entries without advancing the iterator.
impl<T: Release + fmt::Debug> fmt::Debug for Iter<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rest = Iter {
            cache: self.cache,
            cursor: self.cursor,
        };
        f.debug_map()
            .entries(rest.map(|(key, value, _)| (key, value)))
            .finish()
    }
}

impl<'a, T: Release> Iterator for Iter<'a, T> {
    type Item = (u64, &'a T, u16);

    fn next(&mut self) -> Option<Self::Item> {
        let entry = self.cache.slot(self.cursor)?;
        self.cursor = entry.next;
        Some((entry.key, &entry.value, entry.parent))
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    #[derive(Debug, PartialEq)]
    struct Pipeline {
        id: u32,
        released: Rc<RefCell<Vec<u32>>>,
    }

    impl Release for Pipeline {
        fn release(self) {
            self.released.borrow_mut().push(self.id);
        }
    }

    struct Harness {
        cache: StateCacheLru<Pipeline>,
        released: Rc<RefCell<Vec<u32>>>,
    }

    impl Harness {
        fn new(capacity: u16) -> Self {
            Self {
                cache: StateCacheLru::with_capacity(capacity),
                released: Rc::default(),
            }
        }

        fn add(&mut self, key: u64, parent: u16) -> LruHandle {
            let value = Pipeline {
                id: key as u32,
                released: Rc::clone(&self.released),
            };
            self.cache.add(key, value, parent)
        }

        fn keys(&self) -> Vec<u64> {
            self.cache.iter().map(|(key, _, _)| key).collect()
        }

        fn released(&self) -> Vec<u32> {
            self.released.borrow().clone()
        }
    }

    #[test]
    fn find_protects_entry_from_eviction() {
        let mut h = Harness::new(2);
        h.add(1, 0);
        h.add(2, 0);
        assert!(h.cache.find(1).is_some());
        h.add(3, 0);

        assert!(h.cache.contains(1));
        assert!(!h.cache.contains(2));
        assert!(h.cache.contains(3));
        assert_eq!(h.cache.count(), 2);
        assert_eq!(h.released(), vec![2]);
    }

    #[test]
    fn recency_list_orders_most_recent_first() {
        let mut h = Harness::new(4);
        for key in 1..=4 {
            h.add(key, 0);
        }
        assert_eq!(h.keys(), vec![4, 3, 2, 1]);
        h.cache.find(2);
        h.cache.find(1);
        assert_eq!(h.keys(), vec![1, 2, 4, 3]);
        assert_eq!(h.cache.least_recent(), Some(3));
    }

    #[test]
    fn invalidate_with_parent_keeps_unrelated_order() {
        let mut h = Harness::new(8);
        h.add(10, 1);
        h.add(11, 2);
        h.add(12, 1);
        h.add(13, 3);
        h.add(14, 1);

        assert_eq!(h.cache.invalidate_with_parent(1), 3);
        assert_eq!(h.keys(), vec![13, 11]);
        assert_eq!(h.cache.count(), 2);
        let mut released = h.released();
        released.sort_unstable();
        assert_eq!(released, vec![10, 12, 14]);
        assert_eq!(h.cache.invalidate_with_parent(1), 0);
    }

    #[test]
    fn invalidate_by_key_and_handle_release_values() {
        let mut h = Harness::new(4);
        h.add(1, 0);
        let second = h.add(2, 0);
        assert!(h.cache.invalidate(1));
        assert!(!h.cache.invalidate(1));
        assert!(h.cache.invalidate_handle(second));
        assert!(!h.cache.invalidate_handle(second));
        assert!(h.cache.is_empty());
        assert_eq!(h.released(), vec![1, 2]);
    }

    #[test]
    fn invalidate_all_releases_everything_and_resets() {
        let mut h = Harness::new(3);
        for key in 1..=3 {
            h.add(key, 0);
        }
        h.cache.invalidate_all();
        assert_eq!(h.cache.count(), 0);
        assert_eq!(h.released().len(), 3);
        assert!(h.cache.iter().next().is_none());

        for key in 4..=6 {
            h.add(key, 0);
        }
        assert_eq!(h.cache.count(), 3);
        assert_eq!(h.released().len(), 3);
    }

    #[test]
    fn re_adding_a_key_replaces_the_old_entry() {
        let mut h = Harness::new(2);
        h.add(7, 0);
        h.add(7, 5);
        assert_eq!(h.cache.count(), 1);
        assert_eq!(h.released(), vec![7]);
        let handle = h.cache.find_handle(7).unwrap();
        assert_eq!(h.cache.parent(handle), Some(5));
    }

    #[test]
    fn mutate_updates_in_place() {
        let mut h = Harness::new(2);
        let handle = h.add(1, 0);
        let updated = h.cache.mutate(1, |p| {
            p.id = 42;
            p.id
        });
        assert_eq!(updated, Some(42));
        assert_eq!(h.cache.get(handle).map(|p| p.id), Some(42));
        assert_eq!(h.cache.mutate(9, |p| p.id), None);
    }

    #[test]
    fn count_tracks_live_keys_through_churn() {
        let mut h = Harness::new(3);
        let mut live: Vec<u64> = Vec::new();
        for key in 0..20u64 {
            if key % 4 == 3 {
                if let Some(victim) = live.first().copied() {
                    h.cache.invalidate(victim);
                    live.retain(|k| *k != victim);
                }
                continue;
            }
            if live.len() == 3 {
                let oldest = h.cache.least_recent().unwrap();
                live.retain(|k| *k != oldest);
            }
            h.add(key, 0);
            live.push(key);
            assert_eq!(h.cache.count(), live.len());
            for k in &live {
                assert!(h.cache.contains(*k));
            }
        }
    }

    #[test]
    fn zero_capacity_is_clamped_to_one() {
        let mut h = Harness::new(0);
        assert_eq!(h.cache.capacity(), 1);
        h.add(1, 0);
        h.add(2, 0);
        assert_eq!(h.keys(), vec![2]);
    }

    #[test]
    fn capacity_comes_from_config() {
        let mut config = StateConfig::default();
        config.caches.pipeline_capacity = 3;
        let cache: StateCacheLru<u32> = StateCacheLru::from_config(&config);
        assert_eq!(cache.capacity(), 3);
    }

    #[test]
    fn debug_lists_entries_most_recent_first() {
        let mut cache: StateCacheLru<u32> = StateCacheLru::with_capacity(4);
        cache.add(0x10, 7, 0);
        cache.add(0x20, 9, 0);

        let rendered = format!("{cache:?}");
        assert_eq!(
            rendered,
            "StateCacheLru { capacity: 4, count: 2, entries: {32: 9, 16: 7} }"
        );

        let mut iter = cache.iter();
        iter.next();
        assert_eq!(format!("{iter:?}"), "{16: 7}");
    }
}
