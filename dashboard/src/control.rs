use std::sync::Arc;

use climate_common::{
    control::{override_flag, plan_toggle, PendingWrite},
    override_path, ControlConfig, Device, Gateway, Notice, StatusSnapshot, Store, StoreError,
    PATH_CURRENT_STATUS,
};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

#[derive(Debug, Clone, Serialize)]
pub struct ToggleView {
    pub device: Device,
    pub section: &'static str,
    pub label: &'static str,
    pub help: &'static str,
    pub value: bool,
}

impl ToggleView {
    fn new(device: Device, value: bool) -> Self {
        Self {
            device,
            section: device.section_title(),
            label: device.toggle_label(),
            help: device.toggle_help(),
            value,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ControlPage {
    pub title: &'static str,
    pub status: StatusSnapshot,
    pub toggles: Vec<ToggleView>,
    pub notices: Vec<Notice>,
}

pub struct ControlView<S> {
    gateway: Arc<Gateway<S>>,
    config: ControlConfig,
}

impl<S: Store> ControlView<S> {
    pub fn new(gateway: Arc<Gateway<S>>, config: ControlConfig) -> Self {
        Self { gateway, config }
    }

    pub async fn render(&self) -> ControlPage {
        self.render_with(Vec::new()).await
    }

    /// Override flags bypass the cache so a toggle never bounces back to a
    /// value read before the latest write.
    pub async fn read_flag(&self, device: Device) -> Result<bool, StoreError> {
        let value = self.gateway.read_fresh(&override_path(device)).await?;
        Ok(override_flag(value.as_ref()))
    }

    /// Writes `requested` when it differs from the stored flag, waits for the
    /// write to settle and re-renders from the store. When the stored flag
    /// cannot be read the requested state is written anyway.
    pub async fn toggle(&self, device: Device, requested: bool) -> ControlPage {
        let planned = match self.read_flag(device).await {
            Ok(current) => plan_toggle(device, current, requested),
            Err(err) => {
                warn!(
                    "{} override read failed before toggle, writing {requested} unconditionally: {err}",
                    device.as_str()
                );
                Some(PendingWrite::new(device, requested))
            }
        };

        let mut notices = Vec::new();
        if let Some(write) = planned {
            match self
                .gateway
                .write(&write.path, Value::Bool(write.value))
                .await
            {
                Ok(()) => {
                    info!("{} = {}", write.path, write.value);
                    notices.push(Notice::success(write.confirmation()));
                }
                Err(err) => {
                    warn!("failed to write {}: {err}", write.path);
                    notices.push(Notice::error(format!("Failed to send command: {err}")));
                }
            }

            let settle = self.config.write_settle();
            if !settle.is_zero() {
                tokio::time::sleep(settle).await;
            }
        }

        self.render_with(notices).await
    }

    async fn render_with(&self, mut notices: Vec<Notice>) -> ControlPage {
        let status = match self
            .gateway
            .read_cached(PATH_CURRENT_STATUS, self.config.status_ttl())
            .await
        {
            Ok(value) => StatusSnapshot::from_value(value.as_ref()),
            Err(err) => {
                warn!("current status read failed: {err}");
                notices.push(Notice::warning(format!(
                    "Could not read current status: {err}"
                )));
                StatusSnapshot::default()
            }
        };

        let mut toggles = Vec::with_capacity(Device::ALL.len());
        for device in Device::ALL {
            let value = match self.read_flag(device).await {
                Ok(value) => value,
                Err(err) => {
                    warn!("{} override read failed: {err}", device.as_str());
                    notices.push(Notice::warning(format!(
                        "Could not read {} override: {err}",
                        device.as_str()
                    )));
                    false
                }
            };
            toggles.push(ToggleView::new(device, value));
        }

        ControlPage {
            title: "Device Control Interface",
            status,
            toggles,
            notices,
        }
    }
}

#[cfg(test)]
mod tests {
    use climate_common::{MemoryStore, NoticeLevel};
    use serde_json::json;

    use super::*;

    fn view(store: MemoryStore) -> ControlView<MemoryStore> {
        ControlView::new(
            Arc::new(Gateway::new(store)),
            ControlConfig {
                status_ttl_ms: 60_000,
                write_settle_ms: 0,
            },
        )
    }

    fn seeded() -> MemoryStore {
        MemoryStore::with_root(json!({
            "current_status": { "temp": 26.1, "humidity": 58 },
            "controls": { "light_override": false, "relay_override": true }
        }))
    }

    fn toggle_value(page: &ControlPage, device: Device) -> bool {
        page.toggles
            .iter()
            .find(|toggle| toggle.device == device)
            .map(|toggle| toggle.value)
            .unwrap()
    }

    #[tokio::test]
    async fn renders_status_and_flags() {
        let page = view(seeded()).render().await;

        assert_eq!(page.status.temp, "26.1");
        assert_eq!(page.status.humidity, "58");
        assert!(!toggle_value(&page, Device::Light));
        assert!(toggle_value(&page, Device::Relay));
        assert!(page.notices.is_empty());
    }

    #[tokio::test]
    async fn toggle_writes_and_fresh_read_sees_it() {
        let view = view(seeded());
        view.render().await;

        let page = view.toggle(Device::Light, true).await;

        assert!(toggle_value(&page, Device::Light));
        assert!(view.read_flag(Device::Light).await.unwrap());
        assert_eq!(
            view.gateway.store().get("controls/light_override").unwrap(),
            Some(json!(true))
        );
        assert_eq!(page.notices, vec![Notice::success("Light override set to true")]);
    }

    #[tokio::test]
    async fn flags_are_never_served_from_cache() {
        let view = view(seeded());
        view.render().await;

        view.gateway
            .store()
            .set("controls/relay_override", json!(false))
            .unwrap();
        view.gateway
            .store()
            .set("current_status/temp", json!(30.0))
            .unwrap();

        let page = view.render().await;
        assert!(!toggle_value(&page, Device::Relay));
        assert_eq!(page.status.temp, "26.1");
    }

    #[tokio::test]
    async fn unchanged_toggle_does_not_write() {
        let view = view(seeded());

        let page = view.toggle(Device::Relay, true).await;

        assert_eq!(view.gateway.store().write_count(), 0);
        assert!(toggle_value(&page, Device::Relay));
        assert!(page.notices.is_empty());
    }

    /// Serves every read as a transport failure but accepts writes.
    struct WriteOnly(MemoryStore);

    impl Store for WriteOnly {
        async fn read(&self, _path: &str) -> Result<Option<Value>, StoreError> {
            Err(StoreError::Transport("read timed out".to_string()))
        }

        async fn read_ordered(
            &self,
            _path: &str,
            _limit: usize,
        ) -> Result<climate_common::OrderedEntries, StoreError> {
            Err(StoreError::Transport("read timed out".to_string()))
        }

        async fn write(&self, path: &str, value: Value) -> Result<(), StoreError> {
            self.0.write(path, value).await
        }
    }

    #[tokio::test]
    async fn unreadable_flag_still_sends_the_command() {
        let view = ControlView::new(
            Arc::new(Gateway::new(WriteOnly(seeded()))),
            ControlConfig {
                status_ttl_ms: 60_000,
                write_settle_ms: 0,
            },
        );

        let page = view.toggle(Device::Relay, false).await;

        let store = &view.gateway.store().0;
        assert_eq!(store.write_count(), 1);
        assert_eq!(
            store.get("controls/relay_override").unwrap(),
            Some(json!(false))
        );
        assert!(page
            .notices
            .contains(&Notice::success("Relay override set to false")));
    }

    #[tokio::test]
    async fn offline_store_degrades_to_defaults() {
        let store = seeded();
        store.set_offline(true);
        let view = view(store);

        let page = view.toggle(Device::Light, true).await;

        assert_eq!(page.status, StatusSnapshot::default());
        assert!(!toggle_value(&page, Device::Light));
        assert!(page
            .notices
            .iter()
            .any(|notice| notice.level == NoticeLevel::Error
                && notice.message.starts_with("Failed to send command")));
        assert!(page
            .notices
            .iter()
            .any(|notice| notice.level == NoticeLevel::Warning));
    }
}
