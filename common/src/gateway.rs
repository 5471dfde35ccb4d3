use std::{
    sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError},
    time::{Duration, Instant},
};

use serde_json::Value;

use crate::{
    cache::{paths_overlap, TtlCache},
    store::{OrderedEntries, Store, StoreError},
};

/// Source of monotonic milliseconds.
pub type Clock = Arc<dyn Fn() -> u64 + Send + Sync>;

/// Cached entries older than this are swept on write.
const MAX_CACHE_AGE_MS: u64 = 10 * 60_000;

/// Handle to the store shared by every view.
///
/// Reads come in two capabilities: `read_cached` may answer from a TTL
/// cache, `read_fresh` always goes to the store. Values that must reflect
/// the latest write (override flags) are read fresh only.
pub struct Gateway<S> {
    store: S,
    values: Mutex<TtlCache<String, Option<Value>>>,
    ordered: Mutex<TtlCache<(String, usize), OrderedEntries>>,
    clock: Clock,
}

impl<S: Store> Gateway<S> {
    pub fn new(store: S) -> Self {
        Self::with_clock(store, Arc::new(monotonic_ms))
    }

    pub fn with_clock(store: S, clock: Clock) -> Self {
        Self {
            store,
            values: Mutex::new(TtlCache::new()),
            ordered: Mutex::new(TtlCache::new()),
            clock,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub async fn read_fresh(&self, path: &str) -> Result<Option<Value>, StoreError> {
        self.store.read(path).await
    }

    pub async fn read_cached(
        &self,
        path: &str,
        ttl: Duration,
    ) -> Result<Option<Value>, StoreError> {
        let key = path.to_string();
        let hit = lock(&self.values).get(&key, duration_ms(ttl), (self.clock)());
        if let Some(value) = hit {
            return Ok(value);
        }

        let value = self.store.read(path).await?;
        lock(&self.values).insert(key, value.clone(), (self.clock)());
        Ok(value)
    }

    pub async fn read_ordered_fresh(
        &self,
        path: &str,
        limit: usize,
    ) -> Result<OrderedEntries, StoreError> {
        self.store.read_ordered(path, limit).await
    }

    pub async fn read_ordered_cached(
        &self,
        path: &str,
        limit: usize,
        ttl: Duration,
    ) -> Result<OrderedEntries, StoreError> {
        let key = (path.to_string(), limit);
        let hit = lock(&self.ordered).get(&key, duration_ms(ttl), (self.clock)());
        if let Some(entries) = hit {
            return Ok(entries);
        }

        let entries = self.store.read_ordered(path, limit).await?;
        lock(&self.ordered).insert(key, entries.clone(), (self.clock)());
        Ok(entries)
    }

    /// Writes through and drops every cached read the write could affect.
    pub async fn write(&self, path: &str, value: Value) -> Result<(), StoreError> {
        self.store.write(path, value).await?;

        let now_ms = (self.clock)();
        {
            let mut values = lock(&self.values);
            values.remove_where(|key| paths_overlap(key, path));
            values.purge_older_than(MAX_CACHE_AGE_MS, now_ms);
        }
        {
            let mut ordered = lock(&self.ordered);
            ordered.remove_where(|(key, _)| paths_overlap(key, path));
            ordered.purge_older_than(MAX_CACHE_AGE_MS, now_ms);
        }
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn duration_ms(duration: Duration) -> u64 {
    duration.as_millis().try_into().unwrap_or(u64::MAX)
}

pub fn monotonic_ms() -> u64 {
    static START: OnceLock<Instant> = OnceLock::new();
    START
        .get_or_init(Instant::now)
        .elapsed()
        .as_millis()
        .try_into()
        .unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU64, Ordering};

    use serde_json::json;

    use super::*;
    use crate::store::MemoryStore;

    fn manual_clock() -> (Arc<AtomicU64>, Clock) {
        let now = Arc::new(AtomicU64::new(0));
        let reader = Arc::clone(&now);
        (now, Arc::new(move || reader.load(Ordering::Relaxed)))
    }

    fn seeded() -> MemoryStore {
        MemoryStore::with_root(json!({
            "current_status": { "temp": 22.0, "humidity": 41 },
            "controls": { "light_override": false }
        }))
    }

    #[tokio::test]
    async fn cached_reads_hit_store_once_within_ttl() {
        let (now, clock) = manual_clock();
        let gateway = Gateway::with_clock(seeded(), clock);
        let ttl = Duration::from_secs(5);

        gateway.read_cached("current_status", ttl).await.unwrap();
        now.store(4_999, Ordering::Relaxed);
        gateway.read_cached("current_status", ttl).await.unwrap();
        assert_eq!(gateway.store().read_count(), 1);

        now.store(5_000, Ordering::Relaxed);
        gateway.read_cached("current_status", ttl).await.unwrap();
        assert_eq!(gateway.store().read_count(), 2);
    }

    #[tokio::test]
    async fn fresh_reads_always_reach_store() {
        let (_, clock) = manual_clock();
        let gateway = Gateway::with_clock(seeded(), clock);

        for _ in 0..3 {
            gateway.read_fresh("controls/light_override").await.unwrap();
        }

        assert_eq!(gateway.store().read_count(), 3);
    }

    #[tokio::test]
    async fn fresh_read_sees_write_while_cached_value_is_stale() {
        let (_, clock) = manual_clock();
        let gateway = Gateway::with_clock(seeded(), clock);
        let ttl = Duration::from_secs(60);

        let cached = gateway.read_cached("controls", ttl).await.unwrap();
        assert_eq!(cached, Some(json!({ "light_override": false })));

        gateway.store().set("controls/light_override", json!(true)).unwrap();

        assert_eq!(
            gateway.read_cached("controls", ttl).await.unwrap(),
            Some(json!({ "light_override": false }))
        );
        assert_eq!(
            gateway.read_fresh("controls/light_override").await.unwrap(),
            Some(json!(true))
        );
    }

    #[tokio::test]
    async fn write_invalidates_overlapping_cache_entries() {
        let (_, clock) = manual_clock();
        let gateway = Gateway::with_clock(seeded(), clock);
        let ttl = Duration::from_secs(60);

        gateway.read_cached("controls", ttl).await.unwrap();
        gateway.read_cached("current_status", ttl).await.unwrap();

        gateway
            .write("controls/light_override", json!(true))
            .await
            .unwrap();

        assert_eq!(
            gateway.read_cached("controls", ttl).await.unwrap(),
            Some(json!({ "light_override": true }))
        );
        gateway.read_cached("current_status", ttl).await.unwrap();
        assert_eq!(gateway.store().read_count(), 3);
    }

    #[tokio::test]
    async fn ordered_cache_is_keyed_by_limit() {
        let (_, clock) = manual_clock();
        let store = MemoryStore::new();
        for i in 1..=5 {
            store.set(&format!("data_logs/k{i}"), json!(i)).unwrap();
        }
        let gateway = Gateway::with_clock(store, clock);
        let ttl = Duration::from_secs(60);

        let three = gateway.read_ordered_cached("data_logs", 3, ttl).await.unwrap();
        let two = gateway.read_ordered_cached("data_logs", 2, ttl).await.unwrap();
        let three_again = gateway.read_ordered_cached("data_logs", 3, ttl).await.unwrap();

        assert_eq!(three.len(), 3);
        assert_eq!(two.len(), 2);
        assert_eq!(three, three_again);
        assert_eq!(gateway.store().read_count(), 2);
    }

    #[tokio::test]
    async fn failed_reads_are_not_cached() {
        let (_, clock) = manual_clock();
        let gateway = Gateway::with_clock(seeded(), clock);
        let ttl = Duration::from_secs(60);

        gateway.store().set_offline(true);
        assert!(gateway.read_cached("current_status", ttl).await.is_err());

        gateway.store().set_offline(false);
        assert!(gateway
            .read_cached("current_status", ttl)
            .await
            .unwrap()
            .is_some());
    }
}
