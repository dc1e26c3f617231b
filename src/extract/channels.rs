use chrono_tz::Tz;
use serde_json::Value;

use super::{message_date, Cell, Extractor, Row};
use crate::api::RawMessage;

/// One row per numeric reading of the payload, whatever the firmware sends.
///
/// Columns: `device`, `label`, `kind` (the message `type`), `date`,
/// `channel`, `value`.
///
/// The `channel` column is the slash separated path of the reading inside
/// `data`, e.g. `sensor/thermometer/temperature` or `battery/voltage1`.
/// Strings, booleans and nulls are skipped.
#[derive(Debug, Clone)]
pub struct ChannelExtractor {
    pub timezone: Tz,
}

impl Default for ChannelExtractor {
    fn default() -> Self {
        ChannelExtractor {
            timezone: chrono_tz::UTC,
        }
    }
}

fn collect_readings(prefix: &str, value: &Value, out: &mut Vec<(String, f64)>) {
    let join = |key: &str| {
        if prefix.is_empty() {
            key.to_string()
        } else {
            format!("{}/{}", prefix, key)
        }
    };

    match value {
        Value::Number(number) => {
            if let Some(number) = number.as_f64() {
                out.push((prefix.to_string(), number));
            }
        }
        Value::Object(map) => {
            for (key, value) in map {
                collect_readings(&join(key), value, out);
            }
        }
        Value::Array(items) => {
            for (index, value) in items.iter().enumerate() {
                collect_readings(&join(&index.to_string()), value, out);
            }
        }
        Value::String(_) | Value::Bool(_) | Value::Null => {}
    }
}

impl Extractor for ChannelExtractor {
    fn extract(&self, message: &RawMessage) -> Vec<Row> {
        let Some(payload) = message.payload() else {
            return Vec::new();
        };

        let mut readings = Vec::new();
        for (key, value) in payload {
            collect_readings(key, value, &mut readings);
        }

        let date = message_date(message, self.timezone);
        readings
            .into_iter()
            .map(|(channel, value)| {
                Row::new()
                    .with("device", message.device_id())
                    .with("label", message.label())
                    .with("kind", message.kind())
                    .with("date", date.clone())
                    .with("channel", channel)
                    .with("value", Cell::Number(value))
            })
            .collect()
    }
}
