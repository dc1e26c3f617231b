use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};

/// A single entry of `/v1/devices`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Device {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub group_id: Option<String>,
    /// Device scoped token, messages are fetched with it when present
    #[serde(default)]
    pub api_token: Option<String>,
}

impl std::fmt::Display for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.name.as_deref() {
            Some(name) => write!(f, "{} ({})", self.id, name),
            None => f.write_str(&self.id),
        }
    }
}

/// A single entry of `/v1/messages`.
///
/// The API schema differs between device firmwares, so the message is kept
/// as raw json and every accessor returns `None` instead of failing.
///
/// ```json
/// {
///     "id": "...",
///     "device_id": "...",
///     "label": "chester-clime",
///     "type": "data",
///     "created_at": "2023-01-01T12:00:00.000000+00:00",
///     "data": { "battery": { "voltage1": 3.61, "voltage2": 3.58 } }
/// }
/// ```
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct RawMessage(Value);

impl RawMessage {
    pub fn new(value: Value) -> RawMessage {
        RawMessage(value)
    }

    fn object(&self) -> Option<&Map<String, Value>> {
        self.0.as_object()
    }

    fn str_field(&self, key: &str) -> Option<&str> {
        self.object()?.get(key)?.as_str()
    }

    pub fn id(&self) -> Option<&str> {
        self.str_field("id")
    }

    pub fn device_id(&self) -> Option<&str> {
        self.str_field("device_id")
    }

    pub fn label(&self) -> Option<&str> {
        self.str_field("label")
    }

    /// `type`
    pub fn kind(&self) -> Option<&str> {
        self.str_field("type")
    }

    /// `created_at`, timestamps without an offset are taken as UTC.
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        let text = self.str_field("created_at")?;
        if let Ok(datetime) = DateTime::parse_from_rfc3339(text) {
            return Some(datetime.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
            .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f"))
            .ok()
            .map(|naive| naive.and_utc())
    }

    /// `data`
    pub fn payload(&self) -> Option<&Map<String, Value>> {
        self.object()?.get("data")?.as_object()
    }

    /// Lookup inside the payload, `path` is slash separated (`battery/voltage1`).
    pub fn value(&self, path: &str) -> Option<&Value> {
        let data = self.object()?.get("data")?;
        let pointer = format!("/{}", path.trim_start_matches('/'));
        data.pointer(&pointer)
    }

    pub fn number(&self, path: &str) -> Option<f64> {
        self.value(path)?.as_f64()
    }
}
