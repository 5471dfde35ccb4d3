use std::{
    cmp::Ordering,
    future::Future,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering as AtomicOrdering},
        Mutex, PoisonError,
    },
};

use serde_json::{Map, Value};
use thiserror::Error;

/// Entries of one collection in ascending key order.
pub type OrderedEntries = Vec<(String, Value)>;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("store answered with status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("unreadable store response: {0}")]
    Decode(String),
    #[error("invalid store path '{0}'")]
    InvalidPath(String),
}

/// Hierarchical key-value store addressed by slash-separated paths.
///
/// A missing path is not an error: `read` yields `Ok(None)` and
/// `read_ordered` an empty list.
pub trait Store: Send + Sync {
    fn read(&self, path: &str) -> impl Future<Output = Result<Option<Value>, StoreError>> + Send;

    /// The `limit` entries with the largest keys under `path`, ascending.
    ///
    /// Which entries are the largest is decided by the backend. For keys of
    /// one fixed length (push IDs) every backend agrees with [`compare_keys`];
    /// for variable-length string keys a remote backend may select a
    /// different set, which is then returned in [`compare_keys`] order.
    fn read_ordered(
        &self,
        path: &str,
        limit: usize,
    ) -> impl Future<Output = Result<OrderedEntries, StoreError>> + Send;

    /// Unconditional set; last writer wins. Writing `null` removes the path.
    fn write(&self, path: &str, value: Value)
        -> impl Future<Output = Result<(), StoreError>> + Send;
}

/// Splits a path into segments, rejecting characters the store forbids.
/// The empty path addresses the root.
pub fn path_segments(path: &str) -> Result<Vec<&str>, StoreError> {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    let segments: Vec<&str> = trimmed.split('/').collect();
    let invalid = segments.iter().any(|segment| {
        segment.is_empty()
            || segment
                .chars()
                .any(|c| matches!(c, '.' | '#' | '$' | '[' | ']') || c.is_control())
    });
    if invalid {
        return Err(StoreError::InvalidPath(path.to_string()));
    }

    Ok(segments)
}

/// Integer keys first (numerically), then shorter keys, then lexicographic.
///
/// Equal-length push IDs keep their chronological lexicographic order, and
/// suffix-numbered keys such as `k9` < `k10` order naturally.
pub fn compare_keys(a: &str, b: &str) -> Ordering {
    match (integer_key(a), integer_key(b)) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.len().cmp(&b.len()).then_with(|| a.cmp(b)),
    }
}

fn integer_key(key: &str) -> Option<i32> {
    let parsed = key.parse::<i32>().ok()?;
    (parsed.to_string() == key).then_some(parsed)
}

/// Orders entries by key and keeps the last `limit`.
pub fn last_entries<I>(entries: I, limit: usize) -> OrderedEntries
where
    I: IntoIterator<Item = (String, Value)>,
{
    let mut entries: OrderedEntries = entries
        .into_iter()
        .filter(|(_, value)| !value.is_null())
        .collect();
    entries.sort_by(|(a, _), (b, _)| compare_keys(a, b));

    let skip = entries.len().saturating_sub(limit);
    entries.drain(..skip);
    entries
}

/// Children of a collection value. Arrays appear when every key is a small
/// integer; their indices become keys.
pub fn collection_entries(value: Value) -> Vec<(String, Value)> {
    match value {
        Value::Object(map) => map.into_iter().collect(),
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(index, item)| (index.to_string(), item))
            .collect(),
        _ => Vec::new(),
    }
}

/// In-process store with the same contract as the remote one.
#[derive(Debug, Default)]
pub struct MemoryStore {
    root: Mutex<Value>,
    offline: AtomicBool,
    reads: AtomicUsize,
    writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_root(root: Value) -> Self {
        Self {
            root: Mutex::new(root),
            ..Self::default()
        }
    }

    /// While offline every operation fails with a transport error.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, AtomicOrdering::Relaxed);
    }

    /// Reads that reached the store, ordered reads included.
    pub fn read_count(&self) -> usize {
        self.reads.load(AtomicOrdering::Relaxed)
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(AtomicOrdering::Relaxed)
    }

    pub fn get(&self, path: &str) -> Result<Option<Value>, StoreError> {
        let segments = path_segments(path)?;
        let root = self.root.lock().unwrap_or_else(PoisonError::into_inner);

        let mut node = &*root;
        for segment in segments {
            node = match node {
                Value::Object(map) => match map.get(segment) {
                    Some(child) => child,
                    None => return Ok(None),
                },
                Value::Array(items) => match segment.parse::<usize>().ok().and_then(|i| items.get(i)) {
                    Some(child) => child,
                    None => return Ok(None),
                },
                _ => return Ok(None),
            };
        }

        Ok((!node.is_null()).then(|| node.clone()))
    }

    pub fn set(&self, path: &str, value: Value) -> Result<(), StoreError> {
        let segments = path_segments(path)?;
        let mut root = self.root.lock().unwrap_or_else(PoisonError::into_inner);

        let Some((last, parents)) = segments.split_last() else {
            *root = value;
            return Ok(());
        };

        let mut node = &mut *root;
        for segment in parents {
            node = ensure_object(node)
                .entry(segment.to_string())
                .or_insert(Value::Null);
        }

        let parent = ensure_object(node);
        if value.is_null() {
            parent.remove(*last);
        } else {
            parent.insert(last.to_string(), value);
        }
        Ok(())
    }

    fn check_online(&self) -> Result<(), StoreError> {
        if self.offline.load(AtomicOrdering::Relaxed) {
            return Err(StoreError::Transport("store is offline".to_string()));
        }
        Ok(())
    }
}

fn ensure_object(node: &mut Value) -> &mut Map<String, Value> {
    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    match node {
        Value::Object(map) => map,
        _ => unreachable!("node was just replaced with an object"),
    }
}

impl Store for MemoryStore {
    async fn read(&self, path: &str) -> Result<Option<Value>, StoreError> {
        self.check_online()?;
        self.reads.fetch_add(1, AtomicOrdering::Relaxed);
        self.get(path)
    }

    async fn read_ordered(&self, path: &str, limit: usize) -> Result<OrderedEntries, StoreError> {
        self.check_online()?;
        self.reads.fetch_add(1, AtomicOrdering::Relaxed);
        let collection = self.get(path)?.unwrap_or(Value::Null);
        Ok(last_entries(collection_entries(collection), limit))
    }

    async fn write(&self, path: &str, value: Value) -> Result<(), StoreError> {
        self.check_online()?;
        self.writes.fetch_add(1, AtomicOrdering::Relaxed);
        self.set(path, value)
    }
}
