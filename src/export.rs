//! The export pipeline: devices, their messages, rows, workbook.

use std::path::Path;

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use thiserror::Error;

use crate::api::{Client, Device, DevicePages, FetchError, MessagePages, RawMessage};
use crate::extract::{Extractor, Row};
use crate::pager;
use crate::sheet::{self, Sheet, WriteError};

/// Sheet name when everything goes into a single sheet.
pub const DEFAULT_SHEET: &str = "measurements";

#[derive(Debug, Error)]
pub enum ExportError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Write(#[from] WriteError),
}

/// `since` is inclusive, `until` exclusive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeRange {
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl TimeRange {
    pub fn is_unbounded(&self) -> bool {
        self.since.is_none() && self.until.is_none()
    }

    /// Without a timestamp a message only passes an unbounded range.
    pub fn contains(&self, datetime: Option<DateTime<Utc>>) -> bool {
        let Some(datetime) = datetime else {
            return self.is_unbounded();
        };
        self.since.map_or(true, |since| datetime >= since)
            && self.until.map_or(true, |until| datetime < until)
    }
}

#[derive(Debug, Error)]
#[error("`{input}` is neither an RFC 3339 timestamp nor a YYYY-MM-DD date")]
pub struct DateBoundError {
    input: String,
}

/// Parse a command line time bound, a bare date means midnight in `tz`.
pub fn parse_bound(input: &str, tz: Tz) -> Result<DateTime<Utc>, DateBoundError> {
    let err = || DateBoundError {
        input: input.to_string(),
    };

    if let Ok(datetime) = DateTime::parse_from_rfc3339(input) {
        return Ok(datetime.with_timezone(&Utc));
    }

    let date = NaiveDate::parse_from_str(input, "%Y-%m-%d").map_err(|_| err())?;
    let midnight = date.and_hms_opt(0, 0, 0).ok_or_else(err)?;
    // midnight may fall into a DST gap, take the first local time that exists
    (0..=96)
        .map(|step| midnight + Duration::minutes(15 * step))
        .find_map(|local| tz.from_local_datetime(&local).earliest())
        .map(|datetime| datetime.with_timezone(&Utc))
        .ok_or_else(err)
}

/// Parameters of one export run.
#[derive(Clone)]
pub struct FetchRequest {
    pub group_id: String,
    pub token: String,
    pub range: TimeRange,
}

impl std::fmt::Debug for FetchRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchRequest")
            .field("group_id", &self.group_id)
            .field("token", &"***")
            .field("range", &self.range)
            .finish()
    }
}

/// How rows are spread over sheets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Layout {
    /// Everything in [`DEFAULT_SHEET`]
    #[default]
    Single,
    /// One sheet per device, named after the device id
    PerDevice,
}

/// Fetch every device of the group and all of their messages.
///
/// Devices are fetched with the group token, their messages with the device
/// token if the API handed one out.
pub async fn fetch_messages(
    client: &Client,
    request: &FetchRequest,
) -> Result<Vec<(Device, Vec<RawMessage>)>, FetchError> {
    let devices = pager::fetch_all(&DevicePages {
        client,
        group_id: &request.group_id,
        token: &request.token,
    })
    .await?;
    log::info!("found {} devices in group {}", devices.len(), request.group_id);

    let mut result = Vec::with_capacity(devices.len());
    for device in devices {
        log::info!("fetching messages for device {}", device);
        let messages = pager::fetch_all(&MessagePages {
            client,
            group_id: device.group_id.as_deref().unwrap_or(&request.group_id),
            device_id: &device.id,
            token: device.api_token.as_deref().unwrap_or(&request.token),
        })
        .await?;
        log::debug!("device {}: {} messages", device.id, messages.len());
        result.push((device, messages));
    }

    Ok(result)
}

/// Rows of all messages inside `range`, in message order.
pub fn extract_rows(
    messages: &[RawMessage],
    range: &TimeRange,
    extractor: &dyn Extractor,
) -> Vec<Row> {
    messages
        .iter()
        .filter(|message| range.contains(message.created_at()))
        .flat_map(|message| extractor.extract(message))
        .collect()
}

/// Arrange extracted rows into sheets according to `layout`.
pub fn build_sheets(
    fetched: &[(Device, Vec<RawMessage>)],
    range: &TimeRange,
    extractor: &dyn Extractor,
    layout: Layout,
) -> Vec<Sheet> {
    let per_device = fetched.iter().map(|(device, messages)| {
        let rows = extract_rows(messages, range, extractor);
        log::info!(
            "device {}: {} of {} messages produced {} rows",
            device.id,
            messages.iter().filter(|m| range.contains(m.created_at())).count(),
            messages.len(),
            rows.len(),
        );
        (device, rows)
    });

    match layout {
        Layout::Single => {
            let rows = per_device.flat_map(|(_, rows)| rows).collect();
            vec![Sheet::new(DEFAULT_SHEET, rows)]
        }
        Layout::PerDevice => per_device
            .map(|(device, rows)| Sheet::new(&device.id, rows))
            .collect(),
    }
}

/// Run the whole export and return the number of rows written.
///
/// Nothing is written unless every page of every device was fetched.
pub async fn run(
    client: &Client,
    request: &FetchRequest,
    extractor: &dyn Extractor,
    layout: Layout,
    output: &Path,
) -> Result<usize, ExportError> {
    let fetched = fetch_messages(client, request).await?;
    let sheets = build_sheets(&fetched, &request.range, extractor, layout);
    log::info!("writing {}", output.display());
    Ok(sheet::write(&sheets, output)?)
}
