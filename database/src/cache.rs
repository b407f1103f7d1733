use indexmap::IndexMap;
use parking_lot::RwLock;
use rand::Rng;
use std::{collections::hash_map::RandomState, hash::BuildHasher, sync::Arc};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum CachePolicy {
    /// No caching at all
    Empty,
    /// Keep at most this many entries, evicting a random one on overflow
    Count(usize),
}

impl CachePolicy {
    fn max_size(self) -> usize {
        match self {
            CachePolicy::Empty => 0,
            CachePolicy::Count(size) => size,
        }
    }
}

#[derive(Clone)]
pub struct Cache<TKey, TData, S = RandomState>
where
    TKey: Clone + std::hash::Hash + Eq + Send + Sync,
    TData: Clone + Send + Sync,
{
    // We use IndexMap and not HashMap because it makes it cheaper to remove a random element when the cache is full.
    map: Arc<RwLock<IndexMap<TKey, TData, S>>>,
    max_size: usize,
}

impl<TKey, TData, S> Cache<TKey, TData, S>
where
    TKey: Clone + std::hash::Hash + Eq + Send + Sync,
    TData: Clone + Send + Sync,
    S: BuildHasher + Default,
{
    pub fn new(policy: CachePolicy) -> Self {
        let max_size = policy.max_size();
        // Use `size + 1` for not triggering a realloc if new element exactly overflows capacity
        Self { map: Arc::new(RwLock::new(IndexMap::with_capacity_and_hasher(max_size + 1, S::default()))), max_size }
    }

    pub fn get(&self, key: &TKey) -> Option<TData> {
        self.map.read().get(key).cloned()
    }

    pub fn contains_key(&self, key: &TKey) -> bool {
        self.map.read().contains_key(key)
    }

    fn insert_impl(&self, map: &mut IndexMap<TKey, TData, S>, key: TKey, data: TData) {
        if map.len() == self.max_size && !map.contains_key(&key) {
            map.swap_remove_index(rand::thread_rng().gen_range(0..self.max_size));
        }
        map.insert(key, data);
    }

    pub fn insert(&self, key: TKey, data: TData) {
        if self.max_size == 0 {
            return;
        }
        let mut write_guard = self.map.write();
        self.insert_impl(&mut write_guard, key, data);
    }

    pub fn insert_many(&self, iter: &mut impl Iterator<Item = (TKey, TData)>) {
        if self.max_size == 0 {
            return;
        }
        let mut write_guard = self.map.write();
        for (key, data) in iter {
            self.insert_impl(&mut write_guard, key, data);
        }
    }

    pub fn remove(&self, key: &TKey) -> Option<TData> {
        if self.max_size == 0 {
            return None;
        }
        self.map.write().swap_remove(key)
    }

    pub fn remove_all(&self) {
        if self.max_size == 0 {
            return;
        }
        self.map.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_policy_bounds_size() {
        let cache = Cache::<u64, u64>::new(CachePolicy::Count(4));
        cache.insert_many(&mut (0..10).map(|i| (i, i * 2)));
        assert_eq!(cache.map.read().len(), 4);
        cache.insert(100, 1);
        assert_eq!(cache.get(&100), Some(1));
        cache.insert(100, 2);
        assert_eq!(cache.get(&100), Some(2));
        assert_eq!(cache.map.read().len(), 4);
        assert_eq!(cache.remove(&100), Some(2));
        cache.remove_all();
        assert!(!cache.contains_key(&0));
    }

    #[test]
    fn test_empty_policy() {
        let cache = Cache::<u64, u64>::new(CachePolicy::Empty);
        cache.insert(1, 1);
        assert!(cache.get(&1).is_none());
    }
}
