use std::{collections::HashMap, hash::Hash};

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    stored_at_ms: u64,
}

/// Values tagged with the monotonic time they were stored. Freshness is
/// judged per lookup so callers with different TTLs can share one cache.
#[derive(Debug, Clone)]
pub struct TtlCache<K, V> {
    entries: HashMap<K, CacheEntry<V>>,
}

impl<K, V> Default for TtlCache<K, V> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<K: Eq + Hash, V: Clone> TtlCache<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// A zero TTL never hits.
    pub fn get(&self, key: &K, ttl_ms: u64, now_ms: u64) -> Option<V> {
        let entry = self.entries.get(key)?;
        let age = now_ms.saturating_sub(entry.stored_at_ms);
        (age < ttl_ms).then(|| entry.value.clone())
    }

    pub fn insert(&mut self, key: K, value: V, now_ms: u64) {
        self.entries.insert(
            key,
            CacheEntry {
                value,
                stored_at_ms: now_ms,
            },
        );
    }

    pub fn remove_where<F>(&mut self, mut matches: F)
    where
        F: FnMut(&K) -> bool,
    {
        self.entries.retain(|key, _| !matches(key));
    }

    pub fn purge_older_than(&mut self, max_age_ms: u64, now_ms: u64) {
        self.entries
            .retain(|_, entry| now_ms.saturating_sub(entry.stored_at_ms) < max_age_ms);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// True when one path is the other or contains it.
pub fn paths_overlap(a: &str, b: &str) -> bool {
    let a = a.trim_matches('/');
    let b = b.trim_matches('/');
    if a.is_empty() || b.is_empty() || a == b {
        return true;
    }
    is_descendant(a, b) || is_descendant(b, a)
}

fn is_descendant(path: &str, ancestor: &str) -> bool {
    path.strip_prefix(ancestor)
        .is_some_and(|rest| rest.starts_with('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_expire_after_ttl() {
        let mut cache = TtlCache::new();
        cache.insert("current_status".to_string(), 21, 1_000);

        assert_eq!(cache.get(&"current_status".to_string(), 5_000, 5_999), Some(21));
        assert_eq!(cache.get(&"current_status".to_string(), 5_000, 6_000), None);
        assert_eq!(cache.get(&"current_status".to_string(), 0, 1_000), None);
    }

    #[test]
    fn remove_where_drops_matching_keys() {
        let mut cache = TtlCache::new();
        cache.insert("controls".to_string(), 1, 0);
        cache.insert("controls/light_override".to_string(), 2, 0);
        cache.insert("current_status".to_string(), 3, 0);

        cache.remove_where(|key| paths_overlap(key, "controls/light_override"));

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&"current_status".to_string(), 10, 0), Some(3));
    }

    #[test]
    fn purge_keeps_recent_entries() {
        let mut cache = TtlCache::new();
        cache.insert(1_u8, "old", 0);
        cache.insert(2_u8, "new", 9_000);

        cache.purge_older_than(5_000, 10_000);

        assert_eq!(cache.len(), 1);
        assert!(!cache.is_empty());
    }

    #[test]
    fn overlap_covers_ancestors_and_descendants() {
        assert!(paths_overlap("controls", "controls/light_override"));
        assert!(paths_overlap("controls/light_override", "controls"));
        assert!(paths_overlap("", "data_logs"));
        assert!(!paths_overlap("controls/light", "controls/light_override"));
        assert!(!paths_overlap("current_status", "controls"));
    }
}
