use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    Light,
    Relay,
}

impl Device {
    pub const ALL: [Device; 2] = [Device::Light, Device::Relay];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Relay => "relay",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "light" => Some(Self::Light),
            "relay" => Some(Self::Relay),
            _ => None,
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Self::Light => "Light",
            Self::Relay => "Relay",
        }
    }

    pub fn section_title(self) -> &'static str {
        match self {
            Self::Light => "Light Control",
            Self::Relay => "Relay Control",
        }
    }

    pub fn toggle_label(self) -> &'static str {
        match self {
            Self::Light => "Light Override (Manual Control)",
            Self::Relay => "Relay Override (Pump/Fan)",
        }
    }

    pub fn toggle_help(self) -> &'static str {
        match self {
            Self::Light => "Turn ON to set LED to 255. Turn OFF to set LED to 0.",
            Self::Relay => "Turn ON to activate the relay. Turn OFF to deactivate.",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// Message shown alongside a rendered view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn new(level: NoticeLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Info, message)
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Success, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Warning, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Error, message)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SensorLogs {
    pub temp: Option<f64>,
    pub humidity: Option<f64>,
    pub light_lvl: Option<f64>,
    pub motion_state: Option<bool>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ActuatorLogs {
    pub relay_state: Option<bool>,
    pub light_state: Option<bool>,
}

/// One entry under `data_logs`, after timestamp normalization.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LogRecord {
    /// Seconds since the Unix epoch; 0 when the stored value was unusable.
    pub timestamp: i64,
    pub sensor: SensorLogs,
    pub actuator: ActuatorLogs,
}

impl LogRecord {
    /// Returns `None` unless both `sensor_logs` and `actuator_logs` are objects.
    pub fn from_value(value: &Value) -> Option<Self> {
        let record = value.as_object()?;
        let sensor = record.get("sensor_logs")?.as_object()?;
        let actuator = record.get("actuator_logs")?.as_object()?;

        Some(Self {
            timestamp: normalize_timestamp(record.get("timestamp")),
            sensor: SensorLogs {
                temp: number_field(sensor.get("temp")),
                humidity: number_field(sensor.get("humidity")),
                light_lvl: number_field(sensor.get("light_lvl")),
                motion_state: flag_field(sensor.get("motion_state")),
            },
            actuator: ActuatorLogs {
                relay_state: flag_field(actuator.get("relay_state")),
                light_state: flag_field(actuator.get("light_state")),
            },
        })
    }
}

/// Integers pass through, floats truncate, decimal strings parse. Anything
/// else becomes epoch 0.
pub fn normalize_timestamp(value: Option<&Value>) -> i64 {
    match value {
        Some(Value::Number(number)) => number
            .as_i64()
            .or_else(|| number.as_f64().filter(|v| v.is_finite()).map(|v| v as i64))
            .unwrap_or(0),
        Some(Value::String(text)) => text.trim().parse::<i64>().unwrap_or(0),
        _ => 0,
    }
}

fn number_field(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn flag_field(value: Option<&Value>) -> Option<bool> {
    match value? {
        Value::Bool(flag) => Some(*flag),
        Value::Number(number) => number.as_f64().map(|v| v != 0.0),
        Value::String(text) => match text.trim().to_ascii_lowercase().as_str() {
            "true" | "on" | "1" | "high" => Some(true),
            "false" | "off" | "0" | "low" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Derived table/chart row. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlatRow {
    pub key: String,
    #[serde(rename = "timestampSecs")]
    pub timestamp_secs: i64,
    pub time: String,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    #[serde(rename = "lightLevel")]
    pub light_level: Option<f64>,
    #[serde(rename = "motionDetected")]
    pub motion_detected: Option<bool>,
    #[serde(rename = "relayState")]
    pub relay_state: Option<bool>,
    #[serde(rename = "lightState")]
    pub light_state: Option<bool>,
}

pub const NOT_AVAILABLE: &str = "N/A";

/// `current_status` as displayed; values are rendered verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusSnapshot {
    pub temp: String,
    pub humidity: String,
}

impl Default for StatusSnapshot {
    fn default() -> Self {
        Self {
            temp: NOT_AVAILABLE.to_string(),
            humidity: NOT_AVAILABLE.to_string(),
        }
    }
}

impl StatusSnapshot {
    pub fn from_value(value: Option<&Value>) -> Self {
        let Some(status) = value.and_then(Value::as_object) else {
            return Self::default();
        };

        Self {
            temp: display_value(status.get("temp")),
            humidity: display_value(status.get("humidity")),
        }
    }
}

fn display_value(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => NOT_AVAILABLE.to_string(),
        Some(Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn string_timestamp_is_parsed() {
        assert_eq!(normalize_timestamp(Some(&json!("1700000000"))), 1_700_000_000);
        assert_eq!(normalize_timestamp(Some(&json!(" 42 "))), 42);
    }

    #[test]
    fn unusable_timestamp_defaults_to_epoch() {
        assert_eq!(normalize_timestamp(Some(&json!("yesterday"))), 0);
        assert_eq!(normalize_timestamp(Some(&json!(true))), 0);
        assert_eq!(normalize_timestamp(None), 0);
        assert_eq!(normalize_timestamp(Some(&json!(12.9))), 12);
    }

    #[test]
    fn record_requires_both_groups() {
        let missing_actuator = json!({
            "timestamp": 1,
            "sensor_logs": { "temp": 21.0 }
        });
        let null_sensor = json!({
            "timestamp": 1,
            "sensor_logs": null,
            "actuator_logs": {}
        });

        assert!(LogRecord::from_value(&missing_actuator).is_none());
        assert!(LogRecord::from_value(&null_sensor).is_none());
        assert!(LogRecord::from_value(&json!("garbage")).is_none());
    }

    #[test]
    fn record_fields_are_read_leniently() {
        let record = LogRecord::from_value(&json!({
            "timestamp": "1700000000",
            "sensor_logs": { "temp": "23.5", "humidity": 40, "motion_state": 1 },
            "actuator_logs": { "relay_state": "OFF", "light_state": true }
        }))
        .unwrap();

        assert_eq!(record.timestamp, 1_700_000_000);
        assert_eq!(record.sensor.temp, Some(23.5));
        assert_eq!(record.sensor.humidity, Some(40.0));
        assert_eq!(record.sensor.light_lvl, None);
        assert_eq!(record.sensor.motion_state, Some(true));
        assert_eq!(record.actuator.relay_state, Some(false));
        assert_eq!(record.actuator.light_state, Some(true));
    }

    #[test]
    fn status_falls_back_to_not_available() {
        let status = StatusSnapshot::from_value(Some(&json!({ "temp": 24.5 })));
        assert_eq!(status.temp, "24.5");
        assert_eq!(status.humidity, NOT_AVAILABLE);

        assert_eq!(StatusSnapshot::from_value(None), StatusSnapshot::default());
    }

    #[test]
    fn device_names_round_trip() {
        for device in Device::ALL {
            assert_eq!(Device::parse(device.as_str()), Some(device));
        }
        assert_eq!(Device::parse("Relay"), Some(Device::Relay));
        assert_eq!(Device::parse("fan"), None);
    }
}
