//! Error taxonomy for loading, normalizing and aggregating sales data.

use serde::Serialize;
use thiserror::Error;

use crate::analyzers::types::{GroupField, Measure};

/// Raised by the normalizer. Normalization is all-or-nothing: any of these
/// aborts the whole dataset.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    #[error("required column '{0}' is missing")]
    MissingColumn(String),

    #[error("row {row}: time_only '{value}' does not match HH:MM:SS")]
    InvalidTime { row: usize, value: String },

    #[error("row {row}: column '{column}' has unparseable date '{value}'")]
    InvalidDate {
        row: usize,
        column: String,
        value: String,
    },

    #[error("row {row}: column '{column}' has non-numeric value '{value}'")]
    InvalidNumber {
        row: usize,
        column: String,
        value: String,
    },
}

/// Raised when a grouping cannot be computed. Only the affected view fails.
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationError {
    #[error("unknown grouping key '{0}'")]
    UnknownField(String),

    #[error("a grouping needs at least one key")]
    EmptyKey,

    #[error("table has no '{}' measure", .0.name())]
    MissingMeasure(Measure),

    #[error("cannot join tables keyed on {left:?} and {right:?}")]
    KeyMismatch {
        left: Vec<GroupField>,
        right: Vec<GroupField>,
    },
}

/// Failures reading an uploaded file before any normalization happens.
#[derive(Error, Debug)]
pub enum InputError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("spreadsheet error: {0}")]
    Spreadsheet(#[from] calamine::Error),

    #[error("unsupported file type '{0}' (expected csv, xlsx, xls, xlsb or ods)")]
    UnsupportedExtension(String),

    #[error("workbook has no sheet named '{0}'")]
    MissingSheet(String),
}

#[derive(Error, Debug)]
pub enum DashboardError {
    #[error(transparent)]
    Input(#[from] InputError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Aggregation(#[from] AggregationError),
}

pub type Result<T> = std::result::Result<T, DashboardError>;
