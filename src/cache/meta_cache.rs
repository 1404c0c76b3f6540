//! Process-wide metadata cache (spec §4.4).
//!
//! A single mutex around a `HashMap`, as spec §5 explicitly licenses
//! ("a single mutex around map operations is sufficient"). Bounded by
//! entry count with insertion-ordered eviction on overflow, per-entry TTL.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::cache::clock::Clock;
use crate::models::ResourceMeta;

struct CacheEntry {
    meta: ResourceMeta,
    expires_at_millis: u64,
    inserted_seq: u64,
}

pub struct MetaCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    capacity: usize,
    ttl_millis: u64,
    clock: Arc<dyn Clock>,
    next_seq: std::sync::atomic::AtomicU64,
}

impl MetaCache {
    pub fn new(capacity: usize, ttl_secs: u64, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            capacity,
            ttl_millis: ttl_secs * 1000,
            clock,
            next_seq: std::sync::atomic::AtomicU64::new(0),
        }
    }

    /// Direct cache lookup, no backend fallback. `None` on miss or expiry.
    pub fn get(&self, path: &str) -> Option<ResourceMeta> {
        let now = self.clock.now_millis();
        let mut guard = self.entries.lock().unwrap();
        match guard.get(path) {
            Some(entry) if entry.expires_at_millis > now => Some(entry.meta.clone()),
            Some(_) => {
                guard.remove(path);
                None
            }
            None => None,
        }
    }

    /// Inserts every entry from a freshly parsed listing, canonicalizing
    /// is the caller's job (paths must already be canonical). Evicts the
    /// oldest-inserted entries if capacity would be exceeded (spec §4.4:
    /// "LRU/insertion eviction on overflow").
    pub fn set_bulk(&self, mapping: HashMap<String, ResourceMeta>) {
        let now = self.clock.now_millis();
        let mut guard = self.entries.lock().unwrap();
        for (path, meta) in mapping {
            let seq = self.next_seq.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            guard.insert(
                path,
                CacheEntry {
                    meta,
                    expires_at_millis: now + self.ttl_millis,
                    inserted_seq: seq,
                },
            );
        }
        self.evict_overflow(&mut guard);
    }

    fn evict_overflow(&self, guard: &mut HashMap<String, CacheEntry>) {
        if guard.len() <= self.capacity {
            return;
        }
        let overflow = guard.len() - self.capacity;
        let mut keys_by_age: Vec<(String, u64)> = guard
            .iter()
            .map(|(k, v)| (k.clone(), v.inserted_seq))
            .collect();
        keys_by_age.sort_by_key(|(_, seq)| *seq);
        for (key, _) in keys_by_age.into_iter().take(overflow) {
            guard.remove(&key);
        }
    }

    /// Invalidates `path` exactly if it names a file, or every key with
    /// `path` as a string prefix if it names a directory (spec §4.4).
    pub fn invalidate(&self, path: &str) {
        let mut guard = self.entries.lock().unwrap();
        if !path.ends_with('/') {
            guard.remove(path);
            return;
        }
        guard.retain(|key, _| !key.starts_with(path));
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::clock::FakeClock;

    fn file_meta() -> ResourceMeta {
        ResourceMeta {
            is_collection: false,
            content_length: 10,
            content_type: None,
            display_name: "f".into(),
            etag: None,
            creation_date: None,
            last_modified: None,
            split_info: None,
        }
    }

    #[test]
    fn ttl_expiry_is_driven_by_injected_clock() {
        let clock = Arc::new(FakeClock::default());
        let cache = MetaCache::new(100, 1, clock.clone());
        cache.set_bulk(HashMap::from([("/x".to_string(), file_meta())]));
        assert!(cache.get("/x").is_some());
        clock.advance(1200);
        assert!(cache.get("/x").is_none());
    }

    #[test]
    fn directory_invalidation_is_prefix_based() {
        let clock = Arc::new(FakeClock::default());
        let cache = MetaCache::new(100, 60, clock);
        cache.set_bulk(HashMap::from([
            ("/a/".to_string(), {
                let mut m = file_meta();
                m.is_collection = true;
                m
            }),
            ("/a/x".to_string(), file_meta()),
            ("/a/b/y".to_string(), file_meta()),
            ("/other".to_string(), file_meta()),
        ]));
        cache.invalidate("/a/");
        assert!(cache.get("/a/").is_none());
        assert!(cache.get("/a/x").is_none());
        assert!(cache.get("/a/b/y").is_none());
        assert!(cache.get("/other").is_some());
    }

    #[test]
    fn file_invalidation_is_exact() {
        let clock = Arc::new(FakeClock::default());
        let cache = MetaCache::new(100, 60, clock);
        cache.set_bulk(HashMap::from([
            ("/a/x".to_string(), file_meta()),
            ("/a/xy".to_string(), file_meta()),
        ]));
        cache.invalidate("/a/x");
        assert!(cache.get("/a/x").is_none());
        assert!(cache.get("/a/xy").is_some());
    }

    #[test]
    fn overflow_evicts_oldest_first() {
        let clock = Arc::new(FakeClock::default());
        let cache = MetaCache::new(2, 60, clock);
        cache.set_bulk(HashMap::from([("/1".to_string(), file_meta())]));
        cache.set_bulk(HashMap::from([("/2".to_string(), file_meta())]));
        cache.set_bulk(HashMap::from([("/3".to_string(), file_meta())]));
        assert_eq!(cache.len(), 2);
        assert!(cache.get("/1").is_none());
        assert!(cache.get("/3").is_some());
    }
}
