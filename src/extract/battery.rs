use chrono_tz::Tz;

use super::{message_date, round, Extractor, Row};
use crate::api::RawMessage;

/// Ohmic value of the load resistor, in `Ω`
pub const LOAD_RESISTOR: f64 = 39.0;

/// Battery test rig: two voltages measured before and after a load resistor,
/// plus two temperature probes.
///
/// | column  | source                                  |
/// |---------|-----------------------------------------|
/// | `label` | `label`                                 |
/// | `date`  | `created_at`                            |
/// | `t1`    | `data.sensor.thermometer.temperature`   |
/// | `t2`    | `data.sensor.hygrometer.temperature`    |
/// | `v1`    | `data.battery.voltage1`                 |
/// | `v2`    | `data.battery.voltage2`                 |
/// | `r`     | `load_resistor * (v1 - v2) / v2`        |
///
/// Messages without a battery section or with a missing (or zero) voltage
/// produce no row.
#[derive(Debug, Clone)]
pub struct BatteryExtractor {
    pub timezone: Tz,
    pub load_resistor: f64,
}

impl Default for BatteryExtractor {
    fn default() -> Self {
        BatteryExtractor {
            timezone: chrono_tz::UTC,
            load_resistor: LOAD_RESISTOR,
        }
    }
}

impl Extractor for BatteryExtractor {
    fn extract(&self, message: &RawMessage) -> Vec<Row> {
        if message.value("battery").is_none() {
            return Vec::new();
        }

        let nonzero = |v: f64| v != 0.0;
        let (Some(v1), Some(v2)) = (
            message.number("battery/voltage1").filter(|&v| nonzero(v)),
            message.number("battery/voltage2").filter(|&v| nonzero(v)),
        ) else {
            log::debug!(
                "message {} has an incomplete battery section",
                message.id().unwrap_or("?")
            );
            return Vec::new();
        };

        let t1 = message.number("sensor/thermometer/temperature");
        let t2 = message.number("sensor/hygrometer/temperature");

        let row = Row::new()
            .with("label", message.label())
            .with("date", message_date(message, self.timezone))
            .with("t1", t1.map(|t| round(t, 1)))
            .with("t2", t2.map(|t| round(t, 1)))
            .with("v1", round(v1, 2))
            .with("v2", round(v2, 2))
            .with("r", round(self.load_resistor * (v1 - v2) / v2, 2));

        vec![row]
    }
}
