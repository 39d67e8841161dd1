//! Data types shared by the aggregation engine and the derived metrics.

use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, Weekday};
use serde::{Serialize, Serializer};

use crate::error::AggregationError;
use crate::schema::{Record, day_name};

/// Fields a grouping may be keyed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupField {
    DateOnly,
    Hour,
    DayName,
    City,
    Branch,
    ProductName,
    ProductCategory,
}

impl GroupField {
    pub const ALL: [GroupField; 7] = [
        GroupField::DateOnly,
        GroupField::Hour,
        GroupField::DayName,
        GroupField::City,
        GroupField::Branch,
        GroupField::ProductName,
        GroupField::ProductCategory,
    ];

    pub fn name(self) -> &'static str {
        match self {
            GroupField::DateOnly => "date_only",
            GroupField::Hour => "hour",
            GroupField::DayName => "day_name",
            GroupField::City => "city",
            GroupField::Branch => "branch",
            GroupField::ProductName => "product_name",
            GroupField::ProductCategory => "product_category",
        }
    }

    /// Extracts this field's value from a record.
    pub fn value(self, r: &Record) -> KeyValue {
        match self {
            GroupField::DateOnly => KeyValue::Date(r.date_only),
            GroupField::Hour => KeyValue::Hour(r.hour),
            GroupField::DayName => KeyValue::Day(r.weekday.num_days_from_monday()),
            GroupField::City => KeyValue::Text(r.city.clone()),
            GroupField::Branch => KeyValue::Text(r.branch.clone()),
            GroupField::ProductName => KeyValue::Text(r.product_name.clone()),
            GroupField::ProductCategory => KeyValue::Text(r.product_category.clone()),
        }
    }
}

impl fmt::Display for GroupField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for GroupField {
    type Err = AggregationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(' ', "_");
        match normalized.as_str() {
            "date_only" | "date" => Ok(GroupField::DateOnly),
            "hour" => Ok(GroupField::Hour),
            "day_name" | "day" => Ok(GroupField::DayName),
            "city" => Ok(GroupField::City),
            "branch" => Ok(GroupField::Branch),
            "product_name" | "product" => Ok(GroupField::ProductName),
            "product_category" | "category" => Ok(GroupField::ProductCategory),
            _ => Err(AggregationError::UnknownField(s.to_string())),
        }
    }
}

const WEEK: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

/// One component of a group key.
///
/// Days are stored as their offset from Monday so keys order Monday first.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum KeyValue {
    Date(NaiveDate),
    Hour(u32),
    Day(u32),
    Text(String),
}

impl KeyValue {
    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            KeyValue::Date(d) => Some(*d),
            _ => None,
        }
    }
}

impl fmt::Display for KeyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            KeyValue::Hour(h) => write!(f, "{h}"),
            KeyValue::Day(d) => {
                let day = WEEK.get(*d as usize).copied().unwrap_or(Weekday::Mon);
                f.write_str(day_name(day))
            }
            KeyValue::Text(s) => f.write_str(s),
        }
    }
}

impl Serialize for KeyValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            KeyValue::Hour(h) => serializer.serialize_u32(*h),
            other => serializer.collect_str(other),
        }
    }
}

/// A reduction applied within a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Measure {
    /// `sum(total)`
    SumTotal,
    /// `sum(quantity)`
    SumQuantity,
    /// `count(order_id)`: lines with a non-empty order id.
    OrderCount,
    /// `count(distinct order_id)`
    DistinctOrders,
    /// `mean(total)`
    MeanTotal,
}

impl Measure {
    pub fn name(self) -> &'static str {
        match self {
            Measure::SumTotal => "total",
            Measure::SumQuantity => "quantity",
            Measure::OrderCount => "orders",
            Measure::DistinctOrders => "unique_orders",
            Measure::MeanTotal => "mean_total",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateRow {
    pub key: Vec<KeyValue>,
    pub values: Vec<f64>,
}

impl AggregateRow {
    /// Key components joined for display, e.g. `Cairo / Downtown`.
    pub fn label(&self) -> String {
        self.key
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" / ")
    }
}

/// Output of one grouping: key columns, measure columns, one row per group.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateTable {
    pub keys: Vec<GroupField>,
    pub measures: Vec<Measure>,
    pub rows: Vec<AggregateRow>,
}

impl AggregateTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn measure_index(&self, measure: Measure) -> Option<usize> {
        self.measures.iter().position(|m| *m == measure)
    }

    /// Value of `measure` in `row`, or `None` if the table lacks that measure.
    pub fn value(&self, row: &AggregateRow, measure: Measure) -> Option<f64> {
        self.measure_index(measure).and_then(|i| row.values.get(i).copied())
    }

    pub fn column(&self, measure: Measure) -> Vec<f64> {
        match self.measure_index(measure) {
            Some(i) => self.rows.iter().map(|r| r.values[i]).collect(),
            None => Vec::new(),
        }
    }

    pub fn total(&self, measure: Measure) -> f64 {
        self.column(measure).iter().sum()
    }

    /// Finds the row whose key equals `key`.
    pub fn get(&self, key: &[KeyValue]) -> Option<&AggregateRow> {
        self.rows.iter().find(|r| r.key == key)
    }

    /// Copy of this table with `rows` replaced.
    pub(crate) fn with_rows(&self, rows: Vec<AggregateRow>) -> AggregateTable {
        AggregateTable {
            keys: self.keys.clone(),
            measures: self.measures.clone(),
            rows,
        }
    }
}

/// A cell in a presentation table.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Key(KeyValue),
    Number(f64),
    Flag(bool),
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Key(k) => write!(f, "{k}"),
            Cell::Number(n) => write!(f, "{n:.2}"),
            Cell::Flag(b) => write!(f, "{b}"),
        }
    }
}

/// Ordered columns with one row per group, ready for a renderer or CSV export.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

/// Anything the presentation layer can render as a [`Table`].
pub trait ToTable {
    fn to_table(&self) -> Table;
}

impl ToTable for AggregateTable {
    fn to_table(&self) -> Table {
        let columns = self
            .keys
            .iter()
            .map(|k| k.name().to_string())
            .chain(self.measures.iter().map(|m| m.name().to_string()))
            .collect();

        let rows = self
            .rows
            .iter()
            .map(|r| {
                r.key
                    .iter()
                    .cloned()
                    .map(Cell::Key)
                    .chain(r.values.iter().copied().map(Cell::Number))
                    .collect()
            })
            .collect();

        Table { columns, rows }
    }
}
