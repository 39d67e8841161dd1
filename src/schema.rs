//! Schema normalization: raw rows into typed [`Record`]s.
//!
//! Normalization is all-or-nothing. A missing required column or a single
//! malformed `time_only` value rejects the whole dataset.

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Weekday};
use tracing::{debug, info};

use crate::error::SchemaError;
use crate::parser::{RawRow, RawTable, RawValue};

/// The only accepted `time_only` layout. No fallbacks are tried.
pub const TIME_FORMAT: &str = "%H:%M:%S";

static EMPTY: RawValue = RawValue::Empty;

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

/// Input columns the normalizer knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    DateTime,
    DateOnly,
    TimeOnly,
    OrderId,
    Total,
    Quantity,
    City,
    Branch,
    ProductName,
    ProductCategory,
}

impl Column {
    pub fn name(self) -> &'static str {
        self.aliases()[0]
    }

    /// Header spellings accepted for this column; the first is canonical.
    fn aliases(self) -> &'static [&'static str] {
        match self {
            Column::DateTime => &["date_time"],
            Column::DateOnly => &["date_only"],
            Column::TimeOnly => &["time_only"],
            Column::OrderId => &["order_id"],
            Column::Total => &["total"],
            Column::Quantity => &["quantity"],
            Column::City => &["city"],
            Column::Branch => &["branch"],
            Column::ProductName => &["product_name", "product name"],
            Column::ProductCategory => &["product_category"],
        }
    }

    /// Finds the header actually used for this column in `table`.
    fn resolve(self, table: &RawTable) -> Option<&str> {
        self.aliases()
            .iter()
            .find(|alias| table.has_column(alias))
            .copied()
    }
}

/// Columns that must always be present. One of `date_time`/`date_only` is
/// additionally required.
pub const REQUIRED_COLUMNS: [Column; 8] = [
    Column::TimeOnly,
    Column::OrderId,
    Column::Total,
    Column::Quantity,
    Column::City,
    Column::Branch,
    Column::ProductName,
    Column::ProductCategory,
];

/// One transaction line. An order may span several records.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub order_id: String,
    pub date_time: NaiveDateTime,
    pub date_only: NaiveDate,
    pub time_only: NaiveTime,
    pub city: String,
    pub branch: String,
    pub product_name: String,
    pub product_category: String,
    /// `None` when the cell was blank; contributes nothing to sums or means.
    pub quantity: Option<f64>,
    pub total: Option<f64>,
    pub hour: u32,
    pub weekday: Weekday,
}

impl Record {
    pub fn day_name(&self) -> &'static str {
        day_name(self.weekday)
    }
}

/// Full English weekday name, Monday first.
pub fn day_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

/// Normalized records for one session. Immutable once built; filtering
/// produces a new dataset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    records: Vec<Record>,
}

impl Dataset {
    pub fn new(records: Vec<Record>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Distinct cities in order of first appearance.
    pub fn cities(&self) -> Vec<String> {
        let mut seen = Vec::new();
        for r in &self.records {
            if !seen.contains(&r.city) {
                seen.push(r.city.clone());
            }
        }
        seen
    }

    /// Keeps the records matching `keep`, preserving order.
    pub fn filtered(&self, keep: impl Fn(&Record) -> bool) -> Dataset {
        Dataset {
            records: self.records.iter().filter(|r| keep(r)).cloned().collect(),
        }
    }
}

struct ColumnMap<'a> {
    date_time: Option<&'a str>,
    date_only: Option<&'a str>,
    time_only: &'a str,
    order_id: &'a str,
    total: &'a str,
    quantity: &'a str,
    city: &'a str,
    branch: &'a str,
    product_name: &'a str,
    product_category: &'a str,
}

impl<'a> ColumnMap<'a> {
    fn resolve(table: &'a RawTable) -> Result<Self, SchemaError> {
        let require = |c: Column| {
            c.resolve(table)
                .ok_or_else(|| SchemaError::MissingColumn(c.name().to_string()))
        };

        for column in REQUIRED_COLUMNS {
            require(column)?;
        }

        let date_time = Column::DateTime.resolve(table);
        let date_only = Column::DateOnly.resolve(table);
        if date_time.is_none() && date_only.is_none() {
            return Err(SchemaError::MissingColumn("date_time|date_only".to_string()));
        }

        Ok(Self {
            date_time,
            date_only,
            time_only: require(Column::TimeOnly)?,
            order_id: require(Column::OrderId)?,
            total: require(Column::Total)?,
            quantity: require(Column::Quantity)?,
            city: require(Column::City)?,
            branch: require(Column::Branch)?,
            product_name: require(Column::ProductName)?,
            product_category: require(Column::ProductCategory)?,
        })
    }
}

/// Converts a raw table into a [`Dataset`].
///
/// Derives `hour` from `time_only` and the weekday from `date_only`. When
/// `date_only` is absent it is taken from `date_time`; when `date_time` is
/// absent it is composed from `date_only` and `time_only`.
///
/// # Errors
///
/// Returns [`SchemaError`] on the first missing column or unparseable value.
/// No partial dataset is produced.
#[tracing::instrument(skip(table), fields(rows = table.rows.len()))]
pub fn normalize(table: &RawTable) -> Result<Dataset, SchemaError> {
    let columns = ColumnMap::resolve(table)?;

    let records = table
        .rows
        .iter()
        .enumerate()
        .map(|(i, row)| normalize_row(i + 1, row, &columns))
        .collect::<Result<Vec<_>, _>>()?;

    info!(records = records.len(), "Dataset normalized");
    Ok(Dataset::new(records))
}

fn normalize_row(row_no: usize, row: &RawRow, cols: &ColumnMap<'_>) -> Result<Record, SchemaError> {
    let cell = |name: &str| row.get(name).unwrap_or(&EMPTY);

    let time_value = cell(cols.time_only);
    let time_only = parse_time(time_value).ok_or_else(|| SchemaError::InvalidTime {
        row: row_no,
        value: time_value.as_text(),
    })?;

    let date_time = match cols.date_time {
        Some(name) => Some(parse_datetime(cell(name)).ok_or_else(|| {
            invalid_date(row_no, name, cell(name))
        })?),
        None => None,
    };

    let date_only = match (cols.date_only, date_time) {
        (Some(name), _) => {
            parse_date(cell(name)).ok_or_else(|| invalid_date(row_no, name, cell(name)))?
        }
        (None, Some(dt)) => dt.date(),
        (None, None) => {
            return Err(SchemaError::MissingColumn("date_time|date_only".to_string()));
        }
    };

    let date_time = date_time.unwrap_or_else(|| date_only.and_time(time_only));

    Ok(Record {
        order_id: cell(cols.order_id).as_text(),
        date_time,
        date_only,
        time_only,
        city: cell(cols.city).as_text(),
        branch: cell(cols.branch).as_text(),
        product_name: cell(cols.product_name).as_text(),
        product_category: cell(cols.product_category).as_text(),
        quantity: parse_number(row_no, cols.quantity, cell(cols.quantity))?,
        total: parse_number(row_no, cols.total, cell(cols.total))?,
        hour: time_only.hour(),
        weekday: date_only.weekday(),
    })
}

fn invalid_date(row: usize, column: &str, value: &RawValue) -> SchemaError {
    SchemaError::InvalidDate {
        row,
        column: column.to_string(),
        value: value.as_text(),
    }
}

/// Strict `HH:MM:SS` parse. Spreadsheet time cells carry their own type and
/// are taken as-is.
fn parse_time(value: &RawValue) -> Option<NaiveTime> {
    match value {
        RawValue::Text(s) => NaiveTime::parse_from_str(s.trim(), TIME_FORMAT).ok(),
        RawValue::DateTime(dt) => Some(dt.time()),
        RawValue::Time(t) => Some(*t),
        _ => None,
    }
}

fn parse_date(value: &RawValue) -> Option<NaiveDate> {
    match value {
        RawValue::DateTime(dt) => Some(dt.date()),
        RawValue::Text(s) => {
            let s = s.trim();
            DATE_FORMATS
                .iter()
                .find_map(|f| NaiveDate::parse_from_str(s, f).ok())
                .or_else(|| parse_datetime_text(s).map(|dt| dt.date()))
        }
        _ => None,
    }
}

fn parse_datetime(value: &RawValue) -> Option<NaiveDateTime> {
    match value {
        RawValue::DateTime(dt) => Some(*dt),
        RawValue::Text(s) => {
            let s = s.trim();
            parse_datetime_text(s).or_else(|| {
                DATE_FORMATS
                    .iter()
                    .find_map(|f| NaiveDate::parse_from_str(s, f).ok())
                    .map(|d| d.and_time(NaiveTime::MIN))
            })
        }
        _ => None,
    }
}

fn parse_datetime_text(s: &str) -> Option<NaiveDateTime> {
    DATETIME_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(s, f).ok())
}

/// Blank cells are missing values. Anything else must be a finite number.
fn parse_number(row: usize, column: &str, value: &RawValue) -> Result<Option<f64>, SchemaError> {
    if value.is_empty() {
        return Ok(None);
    }

    let parsed = match value {
        RawValue::Number(n) => Some(*n),
        RawValue::Text(s) => s.trim().replace(',', "").parse::<f64>().ok(),
        _ => None,
    }
    .filter(|n| n.is_finite());

    parsed.map(Some).ok_or_else(|| {
        debug!(row, column, "Numeric coercion failed");
        SchemaError::InvalidNumber {
            row,
            column: column.to_string(),
            value: value.as_text(),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_csv;

    const HEADER: &str =
        "order_id,date_only,time_only,city,branch,product_name,product_category,quantity,total";

    #[test]
    fn test_normalize_derives_hour_and_day() {
        let table = table(&["1,2024-01-01,14:30:00,Cairo,Downtown,Tea,Drinks,2,50"]);
        let dataset = normalize(&table).unwrap();

        let r = &dataset.records()[0];
        assert_eq!(r.hour, 14);
        assert_eq!(r.weekday, Weekday::Mon);
        assert_eq!(r.day_name(), "Monday");
        assert_eq!(r.date_only, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(
            r.date_time,
            NaiveDate::from_ymd_opt(2024, 1, 1)
                .unwrap()
                .and_hms_opt(14, 30, 0)
                .unwrap()
        );
        assert_eq!(r.total, Some(50.0));
        assert_eq!(r.quantity, Some(2.0));
    }

    #[test]
    fn test_normalize_rejects_missing_category() {
        let data = "order_id,date_only,time_only,city,branch,product_name,quantity,total\n\
                    1,2024-01-01,14:30:00,Cairo,Downtown,Tea,2,50\n";
        let table = parse_csv(data.as_bytes()).unwrap();

        assert_eq!(
            normalize(&table),
            Err(SchemaError::MissingColumn("product_category".to_string()))
        );
    }

    #[test]
    fn test_normalize_rejects_wrong_time_separator() {
        let table = table(&[
            "1,2024-01-01,14:30:00,Cairo,Downtown,Tea,Drinks,2,50",
            "2,2024-01-01,14-30-00,Cairo,Downtown,Tea,Drinks,2,50",
        ]);

        assert_eq!(
            normalize(&table),
            Err(SchemaError::InvalidTime {
                row: 2,
                value: "14-30-00".to_string()
            })
        );
    }

    #[test]
    fn test_normalize_requires_some_date_column() {
        let data = "order_id,time_only,city,branch,product_name,product_category,quantity,total\n";
        let table = parse_csv(data.as_bytes()).unwrap();

        assert!(matches!(
            normalize(&table),
            Err(SchemaError::MissingColumn(_))
        ));
    }

    #[test]
    fn test_normalize_derives_date_from_date_time() {
        let data = "order_id,date_time,time_only,city,branch,product name,product_category,quantity,total\n\
                    9,2024-03-02 08:15:00,08:15:00,Giza,West,Cake,Bakery,1,-5\n";
        let table = parse_csv(data.as_bytes()).unwrap();
        let dataset = normalize(&table).unwrap();

        let r = &dataset.records()[0];
        assert_eq!(r.date_only, NaiveDate::from_ymd_opt(2024, 3, 2).unwrap());
        assert_eq!(r.product_name, "Cake");
        assert_eq!(r.total, Some(-5.0));
        assert_eq!(r.day_name(), "Saturday");
    }

    #[test]
    fn test_normalize_rejects_non_numeric_total() {
        let table = table(&["1,2024-01-01,14:30:00,Cairo,Downtown,Tea,Drinks,2,abc"]);

        assert!(matches!(
            normalize(&table),
            Err(SchemaError::InvalidNumber { row: 1, .. })
        ));
    }

    #[test]
    fn test_normalize_blank_quantity_is_missing() {
        let table = table(&[
            "1,2024-01-01,14:30:00,Cairo,Downtown,Tea,Drinks,2,50",
            "2,2024-01-01,15:00:00,Cairo,Downtown,Cake,Bakery,,",
        ]);
        let dataset = normalize(&table).unwrap();

        let r = &dataset.records()[1];
        assert_eq!(r.quantity, None);
        assert_eq!(r.total, None);
        assert_eq!(r.product_name, "Cake");
        assert_eq!(dataset.len(), 2);
    }

    #[test]
    fn test_normalize_rejects_non_finite_numbers() {
        for bad in ["NaN", "inf", "-infinity"] {
            let line = format!("1,2024-01-01,14:30:00,Cairo,Downtown,Tea,Drinks,1,{bad}");
            let table = table(&[line.as_str()]);

            assert_eq!(
                normalize(&table),
                Err(SchemaError::InvalidNumber {
                    row: 1,
                    column: "total".to_string(),
                    value: bad.to_string(),
                })
            );
        }
    }

    #[test]
    fn test_normalize_accepts_ods_time_cells() {
        let mut table = table(&[]);
        let row: RawRow = [
            ("order_id", RawValue::Text("7".into())),
            ("date_only", RawValue::Text("2024-03-01".into())),
            ("time_only", RawValue::Time(NaiveTime::from_hms_opt(14, 30, 0).unwrap())),
            ("city", RawValue::Text("Cairo".into())),
            ("branch", RawValue::Text("Downtown".into())),
            ("product_name", RawValue::Text("Tea".into())),
            ("product_category", RawValue::Text("Drinks".into())),
            ("quantity", RawValue::Number(1.0)),
            ("total", RawValue::Number(9.0)),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
        table.rows.push(row);

        let dataset = normalize(&table).unwrap();
        assert_eq!(dataset.records()[0].hour, 14);
    }

    #[test]
    fn test_normalize_accepts_spreadsheet_cells() {
        let mut table = table(&[]);
        let dt = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(9, 5, 0)
            .unwrap();
        let row: RawRow = [
            ("order_id", RawValue::Number(1042.0)),
            ("date_only", RawValue::DateTime(dt)),
            ("time_only", RawValue::DateTime(dt)),
            ("city", RawValue::Text("Cairo".into())),
            ("branch", RawValue::Text("Downtown".into())),
            ("product_name", RawValue::Text("Tea".into())),
            ("product_category", RawValue::Text("Drinks".into())),
            ("quantity", RawValue::Number(3.0)),
            ("total", RawValue::Number(12.5)),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
        table.rows.push(row);

        let dataset = normalize(&table).unwrap();
        let r = &dataset.records()[0];
        assert_eq!(r.order_id, "1042");
        assert_eq!(r.hour, 9);
        assert_eq!(r.total, Some(12.5));
    }

    #[test]
    fn test_cities_keeps_first_appearance_order() {
        let table = table(&[
            "1,2024-01-01,10:00:00,Giza,A,Tea,Drinks,1,1",
            "2,2024-01-01,10:00:00,Cairo,B,Tea,Drinks,1,1",
            "3,2024-01-01,10:00:00,Giza,A,Tea,Drinks,1,1",
        ]);
        let dataset = normalize(&table).unwrap();

        assert_eq!(dataset.cities(), vec!["Giza", "Cairo"]);
    }

    // Helper functions for tests
    fn table(lines: &[&str]) -> RawTable {
        let mut data = format!("{HEADER}\n");
        for line in lines {
            data.push_str(line);
            data.push('\n');
        }
        parse_csv(data.as_bytes()).unwrap()
    }
}
