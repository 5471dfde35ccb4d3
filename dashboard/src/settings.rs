use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use anyhow::Context;
use climate_common::{DashboardConfig, RefreshPolicy};

const DEFAULT_CONFIG_PATH: &str = "./dashboard.json";
const DEFAULT_LIVE_INTERVAL_MS: u64 = 5_000;

pub fn config_path() -> PathBuf {
    std::env::var("DASHBOARD_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// A missing file means defaults; an unreadable one is an error.
pub async fn load_config(path: &Path) -> anyhow::Result<DashboardConfig> {
    match tokio::fs::read(path).await {
        Ok(raw) => serde_json::from_slice::<DashboardConfig>(&raw)
            .with_context(|| format!("failed to parse {}", path.display())),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(DashboardConfig::default()),
        Err(err) => Err(err).with_context(|| format!("failed to read {}", path.display())),
    }
}

pub fn apply_env_overrides<F>(config: &mut DashboardConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(port) = lookup("DASHBOARD_HTTP_PORT").and_then(|value| value.parse::<u16>().ok())
    {
        config.server.http_port = port;
    }
    if let Some(url) = lookup("FIREBASE_DATABASE_URL") {
        config.database_url = Some(url);
    }
    if let Some(timezone) = lookup("DASHBOARD_TIMEZONE") {
        config.display.timezone = timezone;
    }

    let interval_ms = lookup("DASHBOARD_REFRESH_SECS")
        .and_then(|value| value.parse::<u64>().ok())
        .map(|secs| secs.saturating_mul(1_000));
    match lookup("DASHBOARD_LIVE").map(|value| is_truthy(&value)) {
        Some(true) => {
            config.history.refresh =
                RefreshPolicy::live(interval_ms.unwrap_or(DEFAULT_LIVE_INTERVAL_MS));
        }
        Some(false) => {
            config.history.refresh = RefreshPolicy::on_demand(
                interval_ms.unwrap_or(RefreshPolicy::default().interval_ms),
            );
        }
        None => {
            if let Some(interval_ms) = interval_ms {
                config.history.refresh.interval_ms = interval_ms;
            }
        }
    }
}

pub fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
