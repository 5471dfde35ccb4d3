pub mod cache;
pub mod config;
pub mod control;
pub mod credentials;
pub mod gateway;
pub mod history;
pub mod paths;
pub mod store;
pub mod types;

pub use config::{
    ControlConfig, DashboardConfig, DisplayConfig, HistoryConfig, RefreshPolicy, ServerConfig,
};
pub use credentials::{CredentialError, ServiceAccount};
pub use gateway::Gateway;
pub use history::TimeDisplay;
pub use paths::*;
pub use store::{MemoryStore, OrderedEntries, Store, StoreError};
pub use types::{Device, FlatRow, LogRecord, Notice, NoticeLevel, StatusSnapshot};
