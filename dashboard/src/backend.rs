use chrono::Utc;
use climate_common::{MemoryStore, OrderedEntries, Store, StoreError};
use serde_json::{json, Map, Value};

use crate::firebase::FirebaseStore;

/// The store the running dashboard talks to.
pub enum Backend {
    Firebase(FirebaseStore),
    /// Seeded in-process store for running without credentials.
    Demo(MemoryStore),
}

impl Store for Backend {
    async fn read(&self, path: &str) -> Result<Option<Value>, StoreError> {
        match self {
            Self::Firebase(store) => store.read(path).await,
            Self::Demo(store) => store.read(path).await,
        }
    }

    async fn read_ordered(&self, path: &str, limit: usize) -> Result<OrderedEntries, StoreError> {
        match self {
            Self::Firebase(store) => store.read_ordered(path, limit).await,
            Self::Demo(store) => store.read_ordered(path, limit).await,
        }
    }

    async fn write(&self, path: &str, value: Value) -> Result<(), StoreError> {
        match self {
            Self::Firebase(store) => store.write(path, value).await,
            Self::Demo(store) => store.write(path, value).await,
        }
    }
}

/// A store shaped like the device's: a minute of readings per log entry.
pub fn demo_store(entries: usize) -> MemoryStore {
    let now = Utc::now().timestamp();
    let mut logs = Map::new();

    for i in 0..entries {
        let step = i as i64;
        let timestamp = now - (entries as i64 - step) * 60;
        let wave = (step % 12) as f64;
        logs.insert(
            format!("log{:05}", i + 1),
            json!({
                "timestamp": timestamp,
                "sensor_logs": {
                    "temp": 24.0 + wave * 0.25,
                    "humidity": 55.0 - wave * 0.5,
                    "light_lvl": 200 + (step % 7) * 40,
                    "motion_state": step % 5 == 0
                },
                "actuator_logs": {
                    "relay_state": step % 4 == 0,
                    "light_state": step % 3 == 0
                }
            }),
        );
    }

    MemoryStore::with_root(json!({
        "data_logs": logs,
        "current_status": { "temp": 25.5, "humidity": 52 },
        "controls": { "light_override": false, "relay_override": false }
    }))
}
