//! Loads uploaded sales files (delimited text or spreadsheets) into untyped rows.
//!
//! No schema is assumed here; column presence and value types are checked later
//! by [`crate::schema::normalize`].

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use calamine::{Data, Reader, open_workbook_auto};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use tracing::debug;

use crate::error::InputError;

/// A single untyped cell.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Empty,
    Text(String),
    Number(f64),
    DateTime(NaiveDateTime),
    /// Time-of-day cell with no date, as OpenDocument stores durations.
    Time(NaiveTime),
}

impl RawValue {
    pub fn is_empty(&self) -> bool {
        match self {
            RawValue::Empty => true,
            RawValue::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Renders the cell as text. Whole numbers print without a fractional part
    /// so a spreadsheet order id `1042.0` reads as `1042`.
    pub fn as_text(&self) -> String {
        match self {
            RawValue::Empty => String::new(),
            RawValue::Text(s) => s.trim().to_string(),
            RawValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => format!("{}", *n as i64),
            RawValue::Number(n) => n.to_string(),
            RawValue::DateTime(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
            RawValue::Time(t) => t.format("%H:%M:%S").to_string(),
        }
    }
}

impl From<&str> for RawValue {
    fn from(s: &str) -> Self {
        if s.trim().is_empty() {
            RawValue::Empty
        } else {
            RawValue::Text(s.to_string())
        }
    }
}

/// Mapping from column name to cell value.
pub type RawRow = HashMap<String, RawValue>;

/// Header row plus data rows, in file order.
#[derive(Debug, Clone, Default)]
pub struct RawTable {
    pub columns: Vec<String>,
    pub rows: Vec<RawRow>,
}

impl RawTable {
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }
}

/// Loads a table from `path`, choosing the reader by file extension.
///
/// `sheet` selects a worksheet for spreadsheet inputs; the first sheet is used
/// when it is `None`. It is ignored for CSV files.
///
/// # Errors
///
/// Returns [`InputError::UnsupportedExtension`] for anything that is not CSV
/// or a spreadsheet format calamine understands.
#[tracing::instrument(skip(path), fields(path = %path.display()))]
pub fn load_table(path: &Path, sheet: Option<&str>) -> Result<RawTable, InputError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    let table = match ext.as_str() {
        "csv" => parse_csv(File::open(path)?)?,
        "xlsx" | "xlsm" | "xls" | "xlsb" | "ods" => read_workbook(path, sheet)?,
        _ => return Err(InputError::UnsupportedExtension(ext)),
    };

    debug!(
        columns = table.columns.len(),
        rows = table.rows.len(),
        "Loaded raw table"
    );
    Ok(table)
}

/// Parses comma-delimited text with a header row. Every field is kept as text;
/// empty fields become [`RawValue::Empty`].
pub fn parse_csv<R: Read>(reader: R) -> Result<RawTable, InputError> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let columns: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();
    let mut rows = Vec::new();

    for result in rdr.records() {
        let record = result?;
        let row: RawRow = columns
            .iter()
            .cloned()
            .zip(record.iter().map(RawValue::from))
            .collect();
        rows.push(row);
    }

    Ok(RawTable { columns, rows })
}

/// Reads one worksheet; its first row is taken as the header.
fn read_workbook(path: &Path, sheet: Option<&str>) -> Result<RawTable, InputError> {
    let mut workbook = open_workbook_auto(path)?;
    let sheet_names = workbook.sheet_names().to_owned();

    let sheet_name = match sheet {
        Some(name) if sheet_names.iter().any(|s| s == name) => name.to_string(),
        Some(name) => return Err(InputError::MissingSheet(name.to_string())),
        None => sheet_names
            .first()
            .cloned()
            .ok_or_else(|| InputError::MissingSheet("<first>".to_string()))?,
    };

    let range = workbook.worksheet_range(&sheet_name)?;
    let mut lines = range.rows();

    let columns: Vec<String> = match lines.next() {
        Some(header) => header.iter().map(|c| c.to_string().trim().to_string()).collect(),
        None => return Ok(RawTable::default()),
    };

    let rows = lines
        .map(|cells| {
            columns
                .iter()
                .cloned()
                .zip(cells.iter().map(cell_value))
                .collect::<RawRow>()
        })
        .collect();

    Ok(RawTable { columns, rows })
}

fn cell_value(cell: &Data) -> RawValue {
    match cell {
        Data::Empty => RawValue::Empty,
        Data::String(s) => RawValue::from(s.as_str()),
        Data::Float(f) => RawValue::Number(*f),
        Data::Int(i) => RawValue::Number(*i as f64),
        Data::DateTime(dt) => dt
            .as_datetime()
            .map(RawValue::DateTime)
            .unwrap_or_else(|| RawValue::Number(dt.as_f64())),
        Data::DateTimeIso(s) => iso_datetime(s)
            .map(RawValue::DateTime)
            .unwrap_or_else(|| RawValue::from(s.as_str())),
        Data::DurationIso(s) => iso_duration(s)
            .map(RawValue::Time)
            .unwrap_or_else(|| RawValue::from(s.as_str())),
        other => RawValue::Text(other.to_string()),
    }
}

/// `2024-03-01T14:30:00` or a bare `2024-03-01`.
fn iso_datetime(s: &str) -> Option<NaiveDateTime> {
    s.parse::<NaiveDateTime>()
        .ok()
        .or_else(|| s.parse::<NaiveDate>().ok().map(|d| d.and_time(NaiveTime::MIN)))
}

/// `PT14H30M00S` as a time of day. Durations of a day or more are rejected.
fn iso_duration(s: &str) -> Option<NaiveTime> {
    let mut rest = s.strip_prefix("PT")?;
    let mut seconds = 0.0;

    for (unit, scale) in [('H', 3600.0), ('M', 60.0), ('S', 1.0)] {
        if let Some((number, tail)) = rest.split_once(unit) {
            seconds += number.parse::<f64>().ok()? * scale;
            rest = tail;
        }
    }
    if !rest.is_empty() || !(0.0..86_400.0).contains(&seconds) {
        return None;
    }

    let whole = seconds.floor();
    let nanos = ((seconds - whole) * 1e9).floor() as u32;
    NaiveTime::from_num_seconds_from_midnight_opt(whole as u32, nanos)
}
