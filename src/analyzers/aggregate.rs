use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::analyzers::types::{AggregateRow, AggregateTable, GroupField, KeyValue, Measure};
use crate::error::AggregationError;
use crate::schema::Dataset;

/// Running reductions for one group.
#[derive(Default)]
struct Accumulator<'a> {
    priced_lines: usize,
    total: f64,
    quantity: f64,
    order_lines: usize,
    orders: BTreeSet<&'a str>,
}

impl Accumulator<'_> {
    fn finish(&self, measure: Measure) -> f64 {
        match measure {
            Measure::SumTotal => self.total,
            Measure::SumQuantity => self.quantity,
            Measure::OrderCount => self.order_lines as f64,
            Measure::DistinctOrders => self.orders.len() as f64,
            Measure::MeanTotal if self.priced_lines == 0 => 0.0,
            Measure::MeanTotal => self.total / self.priced_lines as f64,
        }
    }
}

/// Groups `dataset` by `keys` and reduces each group with `measures`.
///
/// Emits one row per distinct key combination present in the data, ordered
/// by key. Identical input always yields identical output.
///
/// # Errors
///
/// Returns [`AggregationError::EmptyKey`] when `keys` is empty.
pub fn group_by(
    dataset: &Dataset,
    keys: &[GroupField],
    measures: &[Measure],
) -> Result<AggregateTable, AggregationError> {
    if keys.is_empty() {
        return Err(AggregationError::EmptyKey);
    }

    let mut groups: BTreeMap<Vec<KeyValue>, Accumulator<'_>> = BTreeMap::new();

    for record in dataset.records() {
        let key: Vec<KeyValue> = keys.iter().map(|k| k.value(record)).collect();
        let acc = groups.entry(key).or_default();

        // blank cells are skipped, like a NaN-aware sum
        if let Some(total) = record.total {
            acc.priced_lines += 1;
            acc.total += total;
        }
        if let Some(quantity) = record.quantity {
            acc.quantity += quantity;
        }

        // empty ids are missing values, not an order
        if !record.order_id.is_empty() {
            acc.order_lines += 1;
            acc.orders.insert(record.order_id.as_str());
        }
    }

    let rows: Vec<AggregateRow> = groups
        .into_iter()
        .map(|(key, acc)| AggregateRow {
            key,
            values: measures.iter().map(|m| acc.finish(*m)).collect(),
        })
        .collect();

    debug!(
        keys = ?keys,
        groups = rows.len(),
        records = dataset.len(),
        "Grouping computed"
    );

    Ok(AggregateTable {
        keys: keys.to_vec(),
        measures: measures.to_vec(),
        rows,
    })
}

/// Like [`group_by`], with keys given by name as a presentation layer would.
///
/// # Errors
///
/// Returns [`AggregationError::UnknownField`] for a name outside the
/// enumerated grouping keys.
pub fn group_by_names(
    dataset: &Dataset,
    keys: &[&str],
    measures: &[Measure],
) -> Result<AggregateTable, AggregationError> {
    let fields = keys
        .iter()
        .map(|k| k.parse::<GroupField>())
        .collect::<Result<Vec<_>, _>>()?;
    group_by(dataset, &fields, measures)
}

/// Revenue and distinct orders per day.
pub fn daily_summary(dataset: &Dataset) -> Result<AggregateTable, AggregationError> {
    group_by(
        dataset,
        &[GroupField::DateOnly],
        &[Measure::DistinctOrders, Measure::SumTotal],
    )
}

/// Revenue, units and order lines per product.
pub fn product_performance(dataset: &Dataset) -> Result<AggregateTable, AggregationError> {
    group_by(
        dataset,
        &[GroupField::ProductName],
        &[Measure::SumTotal, Measure::SumQuantity, Measure::OrderCount],
    )
}

pub fn product_revenue(dataset: &Dataset) -> Result<AggregateTable, AggregationError> {
    group_by(dataset, &[GroupField::ProductName], &[Measure::SumTotal])
}

pub fn product_quantity(dataset: &Dataset) -> Result<AggregateTable, AggregationError> {
    group_by(dataset, &[GroupField::ProductName], &[Measure::SumQuantity])
}

pub fn city_revenue(dataset: &Dataset) -> Result<AggregateTable, AggregationError> {
    group_by(dataset, &[GroupField::City], &[Measure::SumTotal])
}

/// Revenue per branch, keyed by city first since branch names repeat across cities.
pub fn branch_revenue(dataset: &Dataset) -> Result<AggregateTable, AggregationError> {
    group_by(
        dataset,
        &[GroupField::City, GroupField::Branch],
        &[Measure::SumTotal],
    )
}

pub fn branch_only_revenue(dataset: &Dataset) -> Result<AggregateTable, AggregationError> {
    group_by(dataset, &[GroupField::Branch], &[Measure::SumTotal])
}

pub fn daily_city_revenue(dataset: &Dataset) -> Result<AggregateTable, AggregationError> {
    group_by(
        dataset,
        &[GroupField::DateOnly, GroupField::City],
        &[Measure::SumTotal],
    )
}

pub fn hourly_revenue(dataset: &Dataset) -> Result<AggregateTable, AggregationError> {
    group_by(dataset, &[GroupField::Hour], &[Measure::SumTotal])
}

pub fn hourly_city_revenue(dataset: &Dataset) -> Result<AggregateTable, AggregationError> {
    group_by(
        dataset,
        &[GroupField::Hour, GroupField::City],
        &[Measure::SumTotal],
    )
}

pub fn hourly_date_revenue(dataset: &Dataset) -> Result<AggregateTable, AggregationError> {
    group_by(
        dataset,
        &[GroupField::Hour, GroupField::DateOnly],
        &[Measure::SumTotal],
    )
}

pub fn day_hour_revenue(dataset: &Dataset) -> Result<AggregateTable, AggregationError> {
    group_by(
        dataset,
        &[GroupField::DayName, GroupField::Hour],
        &[Measure::SumTotal],
    )
}

pub fn category_revenue(dataset: &Dataset) -> Result<AggregateTable, AggregationError> {
    group_by(dataset, &[GroupField::ProductCategory], &[Measure::SumTotal])
}
