use crate::types::Device;

pub const PATH_DATA_LOGS: &str = "data_logs";
pub const PATH_CURRENT_STATUS: &str = "current_status";
pub const PATH_CONTROLS: &str = "controls";

pub fn override_path(device: Device) -> String {
    format!("{PATH_CONTROLS}/{}_override", device.as_str())
}
