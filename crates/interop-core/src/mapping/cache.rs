//! Bounded LRU response cache with optional TTL, shared by the embedding and
//! LLM clients (spec.md §5: "bounded size (LRU, capacity 100-1000 entries)
//! and TTL (5 min for query results, indefinite for embeddings)").

use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use lru::LruCache;

struct Entry<V> {
    value: V,
    inserted_at: Instant,
}

pub struct TtlCache<K: Hash + Eq, V: Clone> {
    inner: Mutex<LruCache<K, Entry<V>>>,
    ttl: Option<Duration>,
}

impl<K: Hash + Eq, V: Clone> TtlCache<K, V> {
    pub fn new(capacity: usize, ttl: Option<Duration>) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::new(1).expect("1 is nonzero"));
        Self { inner: Mutex::new(LruCache::new(capacity)), ttl }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        let mut cache = self.inner.lock().expect("cache lock poisoned");
        let entry = cache.get(key)?;
        if let Some(ttl) = self.ttl {
            if entry.inserted_at.elapsed() > ttl {
                cache.pop(key);
                return None;
            }
        }
        Some(entry.value.clone())
    }

    pub fn put(&self, key: K, value: V) {
        let mut cache = self.inner.lock().expect("cache lock poisoned");
        cache.put(key, Entry { value, inserted_at: Instant::now() });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caches_and_returns_values() {
        let cache: TtlCache<String, i32> = TtlCache::new(10, None);
        cache.put("a".to_string(), 1);
        assert_eq!(cache.get(&"a".to_string()), Some(1));
        assert_eq!(cache.get(&"missing".to_string()), None);
    }

    #[test]
    fn expires_entries_past_ttl() {
        let cache: TtlCache<String, i32> = TtlCache::new(10, Some(Duration::from_millis(1)));
        cache.put("a".to_string(), 1);
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(cache.get(&"a".to_string()), None);
    }

    #[test]
    fn evicts_least_recently_used_past_capacity() {
        let cache: TtlCache<i32, i32> = TtlCache::new(2, None);
        cache.put(1, 1);
        cache.put(2, 2);
        cache.put(3, 3);
        assert_eq!(cache.get(&1), None);
        assert_eq!(cache.get(&2), Some(2));
        assert_eq!(cache.get(&3), Some(3));
    }
}
