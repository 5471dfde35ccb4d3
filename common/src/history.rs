use chrono::DateTime;
use chrono_tz::Tz;

use crate::{
    config::{is_valid_time_format, DisplayConfig, DEFAULT_TIME_FORMAT},
    store::OrderedEntries,
    types::{FlatRow, LogRecord},
};

pub const COLUMNS: [&str; 9] = [
    "Key",
    "Timestamp (s)",
    "Time",
    "Temperature (°C)",
    "Humidity (%)",
    "Light Level (Lux)",
    "Motion Detected",
    "Relay State",
    "Light State",
];

pub const EMPTY_HISTORY_MESSAGE: &str =
    "No data available in the 'data_logs' path. Ensure your NodeMCU is pushing data.";

/// Renders epoch seconds in the configured zone.
#[derive(Debug, Clone)]
pub struct TimeDisplay {
    timezone: Tz,
    format: String,
}

impl Default for TimeDisplay {
    fn default() -> Self {
        Self {
            timezone: Tz::UTC,
            format: DEFAULT_TIME_FORMAT.to_string(),
        }
    }
}

impl TimeDisplay {
    pub fn new(config: &DisplayConfig) -> Self {
        Self {
            timezone: config.timezone.parse().unwrap_or(Tz::UTC),
            format: if is_valid_time_format(&config.time_format) {
                config.time_format.clone()
            } else {
                DEFAULT_TIME_FORMAT.to_string()
            },
        }
    }

    pub fn render(&self, epoch_secs: i64) -> String {
        let utc = DateTime::from_timestamp(epoch_secs, 0).unwrap_or_default();
        utc.with_timezone(&self.timezone)
            .format(&self.format)
            .to_string()
    }
}

pub fn flatten(key: &str, record: &LogRecord, display: &TimeDisplay) -> FlatRow {
    FlatRow {
        key: key.to_string(),
        timestamp_secs: record.timestamp,
        time: display.render(record.timestamp),
        temperature: record.sensor.temp,
        humidity: record.sensor.humidity,
        light_level: record.sensor.light_lvl,
        motion_detected: record.sensor.motion_state,
        relay_state: record.actuator.relay_state,
        light_state: record.actuator.light_state,
    }
}

/// Valid records as rows, oldest first. Records missing a sensor or
/// actuator group are skipped; ties on timestamp keep key order.
pub fn chart_rows(entries: &OrderedEntries, display: &TimeDisplay) -> Vec<FlatRow> {
    let mut rows: Vec<FlatRow> = entries
        .iter()
        .filter_map(|(key, value)| {
            LogRecord::from_value(value).map(|record| flatten(key, &record, display))
        })
        .collect();
    rows.sort_by_key(|row| row.timestamp_secs);
    rows
}

/// Newest first: the exact reverse of the chart order.
pub fn table_rows(chart: &[FlatRow]) -> Vec<FlatRow> {
    chart.iter().rev().cloned().collect()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};

    use super::*;

    fn record(timestamp: Value, temp: f64) -> Value {
        json!({
            "timestamp": timestamp,
            "sensor_logs": { "temp": temp, "humidity": 40, "light_lvl": 300, "motion_state": false },
            "actuator_logs": { "relay_state": false, "light_state": true }
        })
    }

    fn entries(items: &[(&str, Value)]) -> OrderedEntries {
        items
            .iter()
            .map(|(key, value)| (key.to_string(), value.clone()))
            .collect()
    }

    #[test]
    fn drops_records_missing_a_group() {
        let raw = entries(&[
            ("a", record(json!(100), 20.0)),
            ("b", json!({ "timestamp": 200, "sensor_logs": { "temp": 1 } })),
            ("c", json!({ "timestamp": 300, "actuator_logs": {} })),
            ("d", record(json!(400), 21.0)),
        ]);

        let rows = chart_rows(&raw, &TimeDisplay::default());

        assert!(rows.len() <= raw.len());
        assert_eq!(
            rows.iter().map(|row| row.key.as_str()).collect::<Vec<_>>(),
            vec!["a", "d"]
        );
    }

    #[test]
    fn string_timestamp_keeps_the_row() {
        let raw = entries(&[("k1", record(json!("1700000000"), 22.5))]);

        let rows = chart_rows(&raw, &TimeDisplay::default());

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].timestamp_secs, 1_700_000_000);
        assert_eq!(rows[0].time, "2023-11-14 22:13:20");
        assert_eq!(rows[0].temperature, Some(22.5));
    }

    #[test]
    fn unparsable_timestamp_becomes_epoch() {
        let raw = entries(&[("k1", record(json!("soon"), 22.5))]);

        let rows = chart_rows(&raw, &TimeDisplay::default());

        assert_eq!(rows[0].timestamp_secs, 0);
        assert_eq!(rows[0].time, "1970-01-01 00:00:00");
    }

    #[test]
    fn chart_is_ascending_and_table_is_its_reverse() {
        let raw = entries(&[
            ("k1", record(json!(300), 1.0)),
            ("k2", record(json!(100), 2.0)),
            ("k3", record(json!(200), 3.0)),
            ("k4", record(json!(200), 4.0)),
        ]);

        let chart = chart_rows(&raw, &TimeDisplay::default());
        let table = table_rows(&chart);

        assert_eq!(
            chart.iter().map(|row| row.key.as_str()).collect::<Vec<_>>(),
            vec!["k2", "k3", "k4", "k1"]
        );
        let mut reversed = table.clone();
        reversed.reverse();
        assert_eq!(reversed, chart);
    }

    #[test]
    fn display_uses_configured_timezone() {
        let display = TimeDisplay::new(&DisplayConfig {
            timezone: "Asia/Manila".to_string(),
            time_format: "%H:%M".to_string(),
        });

        assert_eq!(display.render(0), "08:00");
    }
}
