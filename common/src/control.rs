use serde_json::Value;

use crate::{paths::override_path, types::Device};

/// Only a stored boolean `true` turns an override on; anything else is off.
pub fn override_flag(value: Option<&Value>) -> bool {
    matches!(value, Some(Value::Bool(true)))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingWrite {
    pub device: Device,
    pub path: String,
    pub value: bool,
}

impl PendingWrite {
    pub fn new(device: Device, value: bool) -> Self {
        Self {
            device,
            path: override_path(device),
            value,
        }
    }

    pub fn confirmation(&self) -> String {
        format!(
            "{} override set to {}",
            self.device.display_name(),
            self.value
        )
    }
}

/// A write is needed only when the requested state differs from the store.
pub fn plan_toggle(device: Device, current: bool, requested: bool) -> Option<PendingWrite> {
    (current != requested).then(|| PendingWrite::new(device, requested))
}
