use chrono::{DateTime, SecondsFormat};
use chrono_tz::Tz;
use indexmap::IndexMap;

/// A single spreadsheet cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Number(f64),
    Text(String),
    Timestamp(DateTime<Tz>),
    Blank,
}

impl Cell {
    pub fn is_blank(&self) -> bool {
        matches!(self, Cell::Blank)
    }

    /// `2023-01-01T13:00:00+01:00`
    pub fn format_timestamp(datetime: &DateTime<Tz>) -> String {
        datetime.to_rfc3339_opts(SecondsFormat::Secs, true)
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Cell::Number(value)
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::Text(value.to_string())
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Cell::Text(value)
    }
}

impl From<DateTime<Tz>> for Cell {
    fn from(value: DateTime<Tz>) -> Self {
        Cell::Timestamp(value)
    }
}

impl<T: Into<Cell>> From<Option<T>> for Cell {
    fn from(value: Option<T>) -> Self {
        value.map_or(Cell::Blank, Into::into)
    }
}

/// Column name to cell, keeps the order columns were added in.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row(IndexMap<String, Cell>);

impl Row {
    pub fn new() -> Row {
        Row::default()
    }

    /// Builder style [`Row::insert`].
    pub fn with(mut self, column: &str, cell: impl Into<Cell>) -> Row {
        self.insert(column, cell);
        self
    }

    /// Setting a column twice keeps its original position.
    pub fn insert(&mut self, column: &str, cell: impl Into<Cell>) {
        self.0.insert(column.to_string(), cell.into());
    }

    pub fn get(&self, column: &str) -> Option<&Cell> {
        self.0.get(column)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<Cell>> FromIterator<(K, V)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Row(iter
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect())
    }
}
