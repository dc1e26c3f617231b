//! Turns raw messages into spreadsheet rows.
//!
//! Which fields end up in the sheet depends on the device firmware, so the
//! mapping is an [`Extractor`]. Add another implementation (or pass a closure)
//! to export a different set of columns.

use chrono_tz::Tz;

use crate::api::RawMessage;

mod row;
pub use row::{Cell, Row};

mod battery;
pub use battery::{BatteryExtractor, LOAD_RESISTOR};

mod channels;
pub use channels::ChannelExtractor;

/// Maps one message onto zero or more rows.
///
/// Implementations must not fail: a missing or malformed field becomes a
/// blank cell or no row at all.
pub trait Extractor {
    fn extract(&self, message: &RawMessage) -> Vec<Row>;
}

impl<F> Extractor for F
where
    F: Fn(&RawMessage) -> Vec<Row>,
{
    fn extract(&self, message: &RawMessage) -> Vec<Row> {
        self(message)
    }
}

/// `created_at` in `tz`, blank when missing or unparsable.
pub(crate) fn message_date(message: &RawMessage, tz: Tz) -> Cell {
    message
        .created_at()
        .map(|datetime| datetime.with_timezone(&tz))
        .into()
}

pub(crate) fn round(value: f64, digits: i32) -> f64 {
    let factor = 10f64.powi(digits);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use super::{message_date, round, Cell, Extractor, Row};
    use crate::api::RawMessage;

    #[test]
    fn rounding() {
        assert_eq!(round(3.14159, 2), 3.14);
        assert_eq!(round(21.25, 1), 21.3);
        assert_eq!(round(-0.006, 2), -0.01);
    }

    #[test]
    fn date_in_timezone() {
        let msg = RawMessage::new(json!({ "created_at": "2023-01-01T12:00:00+00:00" }));
        let expected = chrono_tz::Europe::Prague
            .with_ymd_and_hms(2023, 1, 1, 13, 0, 0)
            .unwrap();
        assert_eq!(
            message_date(&msg, chrono_tz::Europe::Prague),
            Cell::Timestamp(expected)
        );
        assert!(message_date(&RawMessage::new(json!({})), chrono_tz::UTC).is_blank());
    }

    #[test]
    fn closures_are_extractors() {
        let labels = |msg: &RawMessage| match msg.label() {
            Some(label) => vec![Row::new().with("label", label)],
            None => vec![],
        };

        assert_eq!(labels.extract(&RawMessage::new(json!({ "label": "x" }))).len(), 1);
        assert!(labels.extract(&RawMessage::new(json!({}))).is_empty());
    }
}
