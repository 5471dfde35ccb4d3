use std::time::Duration;

use chrono::format::{Item, StrftimeItems};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

pub const DEFAULT_HISTORY_LIMIT: usize = 15;
pub const MAX_HISTORY_LIMIT: usize = 500;
pub const DEFAULT_TIMEZONE: &str = "UTC";
pub const DEFAULT_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// How the history view stays fresh.
///
/// With `live` off the view is rendered on demand and ordered reads go
/// through the gateway cache with `interval_ms` as TTL. With `live` on a
/// background loop re-fetches every `interval_ms` and views serve the last
/// published frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshPolicy {
    pub interval_ms: u64,
    pub live: bool,
}

impl RefreshPolicy {
    pub fn on_demand(ttl_ms: u64) -> Self {
        Self {
            interval_ms: ttl_ms,
            live: false,
        }
    }

    pub fn live(interval_ms: u64) -> Self {
        Self {
            interval_ms,
            live: true,
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// TTL for cached history reads; `None` means always read fresh.
    pub fn cache_ttl(&self) -> Option<Duration> {
        (!self.live).then(|| self.interval())
    }
}

impl Default for RefreshPolicy {
    fn default() -> Self {
        Self::on_demand(60_000)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub limit: usize,
    pub refresh: RefreshPolicy,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            limit: DEFAULT_HISTORY_LIMIT,
            refresh: RefreshPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    pub status_ttl_ms: u64,
    pub write_settle_ms: u64,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            status_ttl_ms: 5_000,
            write_settle_ms: 500,
        }
    }
}

impl ControlConfig {
    pub fn status_ttl(&self) -> Duration {
        Duration::from_millis(self.status_ttl_ms)
    }

    pub fn write_settle(&self) -> Duration {
        Duration::from_millis(self.write_settle_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub timezone: String,
    pub time_format: String,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            timezone: DEFAULT_TIMEZONE.to_string(),
            time_format: DEFAULT_TIME_FORMAT.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub http_port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { http_port: 8080 }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub database_url: Option<String>,
    pub history: HistoryConfig,
    pub control: ControlConfig,
    pub display: DisplayConfig,
    pub server: ServerConfig,
}

impl DashboardConfig {
    pub fn sanitize(&mut self) {
        self.history.limit = self.history.limit.clamp(1, MAX_HISTORY_LIMIT);
        self.history.refresh.interval_ms = self.history.refresh.interval_ms.max(1_000);

        self.control.status_ttl_ms = self.control.status_ttl_ms.min(60_000);
        self.control.write_settle_ms = self.control.write_settle_ms.min(5_000);

        if self.display.timezone.parse::<Tz>().is_err() {
            self.display.timezone = DEFAULT_TIMEZONE.to_string();
        }
        if !is_valid_time_format(&self.display.time_format) {
            self.display.time_format = DEFAULT_TIME_FORMAT.to_string();
        }

        if let Some(url) = &self.database_url {
            let trimmed = url.trim().trim_end_matches('/');
            self.database_url = (!trimmed.is_empty()).then(|| trimmed.to_string());
        }
    }

    /// Explicit URL, or the default realtime-database host for the project.
    pub fn database_url_for(&self, project_id: &str) -> String {
        self.database_url
            .clone()
            .unwrap_or_else(|| format!("https://{project_id}-default-rtdb.firebaseio.com"))
    }
}

pub fn is_valid_time_format(format: &str) -> bool {
    !format.trim().is_empty()
        && !StrftimeItems::new(format).any(|item| matches!(item, Item::Error))
}
