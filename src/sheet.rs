//! Writes rows into an XLSX workbook.

use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};

use indexmap::IndexSet;
use rust_xlsxwriter::{Format, Workbook, XlsxError};
use tempfile::NamedTempFile;
use thiserror::Error;

use crate::extract::{Cell, Row};

/// Excel allows 31, keep one spare for a suffix.
pub const SHEET_NAME_MAX: usize = 30;

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("couldn't write {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("couldn't build workbook")]
    Xlsx(#[from] XlsxError),
    #[error("sheet `{sheet}` has too many {what} for xlsx")]
    Limit { sheet: String, what: &'static str },
}

/// A named worksheet and its rows.
#[derive(Debug, Clone, PartialEq)]
pub struct Sheet {
    pub name: String,
    pub rows: Vec<Row>,
}

impl Sheet {
    pub fn new(name: &str, rows: Vec<Row>) -> Sheet {
        Sheet {
            name: sheet_name(name),
            rows,
        }
    }

    /// Every column of every row, in the order they were first seen.
    pub fn header(&self) -> Vec<&str> {
        self.rows
            .iter()
            .flat_map(Row::columns)
            .collect::<IndexSet<_>>()
            .into_iter()
            .collect()
    }
}

/// Replace characters Excel refuses in sheet names and cut to [`SHEET_NAME_MAX`].
pub fn sheet_name(name: &str) -> String {
    let name = name
        .chars()
        .map(|c| match c {
            '[' | ']' | ':' | '*' | '?' | '/' | '\\' => '_',
            c => c,
        })
        .take(SHEET_NAME_MAX)
        .collect::<String>();
    let name = name.trim_matches('\'');

    if name.is_empty() {
        "sheet".to_string()
    } else {
        name.to_string()
    }
}

/// Excel compares sheet names case insensitive.
fn unique_names(sheets: &[Sheet]) -> Vec<String> {
    let mut taken = HashSet::new();
    sheets
        .iter()
        .map(|sheet| {
            let mut name = sheet.name.clone();
            let mut n = 1;
            while !taken.insert(name.to_lowercase()) {
                n += 1;
                let suffix = format!("~{}", n);
                let base = sheet
                    .name
                    .chars()
                    .take(SHEET_NAME_MAX - suffix.len())
                    .collect::<String>();
                name = format!("{}{}", base, suffix);
            }
            name
        })
        .collect()
}

fn build_workbook(sheets: &[Sheet]) -> Result<Workbook, WriteError> {
    let mut workbook = Workbook::new();
    let bold = Format::new().set_bold();

    for (sheet, name) in sheets.iter().zip(unique_names(sheets)) {
        let limit = |what| WriteError::Limit {
            sheet: name.clone(),
            what,
        };

        let worksheet = workbook.add_worksheet();
        worksheet.set_name(&name)?;

        let header = sheet.header();
        for (col, column) in header.iter().enumerate() {
            let col = u16::try_from(col).map_err(|_| limit("columns"))?;
            worksheet.write_string_with_format(0, col, *column, &bold)?;
        }

        for (index, row) in sheet.rows.iter().enumerate() {
            let index = u32::try_from(index + 1).map_err(|_| limit("rows"))?;
            for (col, column) in header.iter().enumerate() {
                let col = u16::try_from(col).map_err(|_| limit("columns"))?;
                match row.get(column) {
                    Some(Cell::Number(value)) => {
                        worksheet.write_number(index, col, *value)?;
                    }
                    Some(Cell::Text(text)) => {
                        worksheet.write_string(index, col, text.as_str())?;
                    }
                    Some(Cell::Timestamp(datetime)) => {
                        worksheet.write_string(index, col, Cell::format_timestamp(datetime))?;
                    }
                    Some(Cell::Blank) | None => {}
                }
            }
        }

        if !header.is_empty() {
            worksheet.set_freeze_panes(1, 0)?;
        }
        worksheet.autofit();
    }

    Ok(workbook)
}

/// Write `sheets` to `path` and return the number of data rows.
///
/// The workbook is built in memory and moved into place only once complete,
/// so on error an existing file at `path` stays as it was.
pub fn write(sheets: &[Sheet], path: &Path) -> Result<usize, WriteError> {
    let mut workbook = build_workbook(sheets)?;
    let buffer = workbook.save_to_buffer()?;

    let io = |source| WriteError::Io {
        path: path.to_path_buf(),
        source,
    };

    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let mut file = NamedTempFile::new_in(dir).map_err(io)?;
    file.write_all(&buffer).map_err(io)?;
    file.as_file().sync_all().map_err(io)?;
    file.persist(path).map_err(|err| io(err.error))?;

    let rows = sheets.iter().map(|sheet| sheet.rows.len()).sum();
    log::debug!("wrote {} bytes to {}", buffer.len(), path.display());
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use calamine::{open_workbook, Data, Reader, Xlsx};
    use chrono::TimeZone;

    use super::{sheet_name, unique_names, write, Sheet, WriteError};
    use crate::extract::Row;

    fn read(path: &Path, sheet: &str) -> Vec<Vec<Data>> {
        let mut workbook: Xlsx<_> = open_workbook(path).unwrap();
        workbook
            .worksheet_range(sheet)
            .unwrap()
            .rows()
            .map(|row| row.to_vec())
            .collect()
    }

    fn text(s: &str) -> Data {
        Data::String(s.to_string())
    }

    #[test]
    fn header_is_union_in_first_seen_order() {
        let sheet = Sheet::new(
            "s",
            vec![
                Row::new().with("a", 1.0).with("b", 2.0),
                Row::new().with("a", 3.0),
                Row::new().with("c", 4.0).with("b", 5.0),
            ],
        );
        assert_eq!(sheet.header(), ["a", "b", "c"]);
    }

    #[test]
    fn missing_column_is_empty_cell() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.xlsx");
        let sheet = Sheet::new(
            "measurements",
            vec![
                Row::new().with("a", 1.0).with("b", 2.0),
                Row::new().with("a", 3.0),
            ],
        );

        let written = write(&[sheet], &path).unwrap();

        assert_eq!(written, 2);
        assert_eq!(
            read(&path, "measurements"),
            [
                vec![text("a"), text("b")],
                vec![Data::Float(1.0), Data::Float(2.0)],
                vec![Data::Float(3.0), Data::Empty],
            ]
        );
    }

    #[test]
    fn round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("round-trip.xlsx");
        let date = chrono_tz::Europe::Prague
            .with_ymd_and_hms(2023, 3, 1, 8, 30, 0)
            .unwrap();
        let rows = (0..25)
            .map(|i| {
                Row::new()
                    .with("label", format!("dev-{}", i))
                    .with("date", date)
                    .with("v1", 3.0 + f64::from(i) / 100.0)
                    .with("t1", if i % 2 == 0 { Some(20.5) } else { None })
            })
            .collect::<Vec<_>>();

        write(&[Sheet::new("measurements", rows)], &path).unwrap();
        let cells = read(&path, "measurements");

        assert_eq!(cells.len(), 26);
        assert_eq!(cells[0], [text("label"), text("date"), text("v1"), text("t1")]);
        for (i, row) in cells[1..].iter().enumerate() {
            assert_eq!(row[0], text(&format!("dev-{}", i)));
            assert_eq!(row[1], text("2023-03-01T08:30:00+01:00"));
            assert_eq!(row[2], Data::Float(3.0 + i as f64 / 100.0));
            let t1 = if i % 2 == 0 { Data::Float(20.5) } else { Data::Empty };
            assert_eq!(row[3], t1);
        }
    }

    #[test]
    fn one_sheet_per_entry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sheets.xlsx");
        let sheets = [
            Sheet::new("first", vec![Row::new().with("x", 1.0)]),
            Sheet::new("second", vec![Row::new().with("y", "z")]),
        ];

        assert_eq!(write(&sheets, &path).unwrap(), 2);

        let workbook: Xlsx<_> = open_workbook(&path).unwrap();
        assert_eq!(workbook.sheet_names(), ["first", "second"]);
        assert_eq!(read(&path, "second")[1], [text("z")]);
    }

    #[test]
    fn missing_directory_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("out.xlsx");

        let err = write(&[Sheet::new("s", vec![Row::new().with("a", 1.0)])], &path).unwrap_err();

        assert!(matches!(err, WriteError::Io { .. }));
        assert!(!path.exists());
    }

    #[test]
    fn sheet_names() {
        assert_eq!(sheet_name("a/b:c"), "a_b_c");
        assert_eq!(sheet_name(&"x".repeat(40)), "x".repeat(30));
        assert_eq!(sheet_name("''"), "sheet");

        let sheets = [
            Sheet::new(&"d".repeat(35), vec![]),
            Sheet::new(&"D".repeat(31), vec![]),
            Sheet::new("other", vec![]),
        ];
        assert_eq!(
            unique_names(&sheets),
            ["d".repeat(30), format!("{}~2", "D".repeat(28)), "other".to_string()]
        );
    }
}
