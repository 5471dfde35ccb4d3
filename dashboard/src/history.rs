use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use climate_common::{
    history::{chart_rows, table_rows, COLUMNS, EMPTY_HISTORY_MESSAGE},
    FlatRow, Gateway, HistoryConfig, Notice, Store, TimeDisplay, PATH_DATA_LOGS,
};
use serde::Serialize;
use tokio::{sync::RwLock, task::JoinHandle};
use tracing::{debug, warn};

#[derive(Debug, Clone, Serialize)]
pub struct HistoryPage {
    pub title: String,
    /// Strictly increasing per rendered frame; the page suffixes widget ids
    /// with it so a redraw never collides with the previous frame.
    pub frame: u64,
    pub columns: &'static [&'static str],
    /// Oldest first.
    pub chart: Vec<FlatRow>,
    /// Newest first.
    pub table: Vec<FlatRow>,
    #[serde(rename = "emptyMessage")]
    pub empty_message: Option<&'static str>,
    pub notices: Vec<Notice>,
}

impl HistoryPage {
    fn new(limit: usize, frame: u64, chart: Vec<FlatRow>, notices: Vec<Notice>) -> Self {
        let table = table_rows(&chart);
        let empty_message = (chart.is_empty() && notices.is_empty()).then_some(EMPTY_HISTORY_MESSAGE);
        Self {
            title: format!("Data History & Visualization (Latest {limit})"),
            frame,
            columns: &COLUMNS,
            chart,
            table,
            empty_message,
            notices,
        }
    }
}

pub struct HistoryView<S> {
    gateway: Arc<Gateway<S>>,
    config: HistoryConfig,
    display: TimeDisplay,
    frames: AtomicU64,
    latest: RwLock<Option<HistoryPage>>,
}

impl<S: Store + 'static> HistoryView<S> {
    pub fn new(gateway: Arc<Gateway<S>>, config: HistoryConfig, display: TimeDisplay) -> Self {
        Self {
            gateway,
            config,
            display,
            frames: AtomicU64::new(0),
            latest: RwLock::new(None),
        }
    }

    /// In live mode serves the last frame published by the refresh loop,
    /// otherwise fetches through the TTL cache.
    pub async fn render(&self) -> HistoryPage {
        if self.config.refresh.live {
            if let Some(page) = self.latest.read().await.clone() {
                return page;
            }
        }
        self.refresh().await
    }

    pub async fn refresh(&self) -> HistoryPage {
        let limit = self.config.limit;
        let result = match self.config.refresh.cache_ttl() {
            Some(ttl) => {
                self.gateway
                    .read_ordered_cached(PATH_DATA_LOGS, limit, ttl)
                    .await
            }
            None => self.gateway.read_ordered_fresh(PATH_DATA_LOGS, limit).await,
        };

        let frame = self.frames.fetch_add(1, Ordering::Relaxed) + 1;
        let page = match result {
            Ok(entries) => {
                let chart = chart_rows(&entries, &self.display);
                debug!(
                    "history frame {frame}: {} of {} records renderable",
                    chart.len(),
                    entries.len()
                );
                HistoryPage::new(limit, frame, chart, Vec::new())
            }
            Err(err) => {
                warn!("history read failed: {err}");
                HistoryPage::new(
                    limit,
                    frame,
                    Vec::new(),
                    vec![Notice::error(format!(
                        "Error reading data from Firebase: {err}"
                    ))],
                )
            }
        };

        if self.config.refresh.live {
            *self.latest.write().await = Some(page.clone());
        }
        page
    }

    /// Starts the fixed-interval refresh loop when the policy is live.
    pub fn spawn_refresh_loop(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        if !self.config.refresh.live {
            return None;
        }

        let view = Arc::clone(self);
        Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(view.config.refresh.interval());
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                view.refresh().await;
            }
        }))
    }
}
