//! Derived metrics computed from aggregate tables: rankings, cumulative
//! share curves, peaks, revenue-per-order yield and joins.
//!
//! Every function here is pure; recomputing over the same table gives the
//! same result.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::warn;

use crate::analyzers::types::{
    AggregateRow, AggregateTable, Cell, GroupField, KeyValue, Measure, Table, ToTable,
};
use crate::analyzers::utility::median;
use crate::error::AggregationError;

/// Size of top and bottom rankings.
pub const RANKING_SIZE: usize = 10;

/// A total this small relative to the summed magnitudes counts as zero.
const ZERO_TOTAL_TOLERANCE: f64 = 1e-9;

fn measure_index(table: &AggregateTable, measure: Measure) -> Result<usize, AggregationError> {
    table
        .measure_index(measure)
        .ok_or(AggregationError::MissingMeasure(measure))
}

/// Sorts rows descending by `measure`. The sort is stable, so ties keep
/// their input order.
pub fn rank_descending(
    table: &AggregateTable,
    measure: Measure,
) -> Result<AggregateTable, AggregationError> {
    let i = measure_index(table, measure)?;
    let mut rows = table.rows.clone();
    rows.sort_by(|a, b| b.values[i].total_cmp(&a.values[i]));
    Ok(table.with_rows(rows))
}

/// The `n` highest rows by `measure`, highest first.
pub fn top_n(
    table: &AggregateTable,
    measure: Measure,
    n: usize,
) -> Result<AggregateTable, AggregationError> {
    let mut ranked = rank_descending(table, measure)?;
    ranked.rows.truncate(n);
    Ok(ranked)
}

/// The `n` lowest rows by `measure`, still in descending order (the tail of
/// the ranking).
pub fn bottom_n(
    table: &AggregateTable,
    measure: Measure,
    n: usize,
) -> Result<AggregateTable, AggregationError> {
    let mut ranked = rank_descending(table, measure)?;
    let skip = ranked.rows.len().saturating_sub(n);
    ranked.rows.drain(..skip);
    Ok(ranked)
}

/// How cumulative shares are expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ShareScale {
    /// Shares in `[0, 1]`.
    #[default]
    Fraction,
    /// Shares in `[0, 100]`.
    Percent,
}

impl ShareScale {
    fn factor(self) -> f64 {
        match self {
            ShareScale::Fraction => 1.0,
            ShareScale::Percent => 100.0,
        }
    }

    fn column_name(self) -> &'static str {
        match self {
            ShareScale::Fraction => "cumulative_share",
            ShareScale::Percent => "cumulative_pct",
        }
    }
}

/// A full ranking with the running share of the measure appended.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CumulativeDistribution {
    pub ranking: AggregateTable,
    pub measure: Measure,
    pub scale: ShareScale,
    pub shares: Vec<f64>,
}

impl CumulativeDistribution {
    /// Number of leading rows needed to reach `threshold` (in this
    /// distribution's scale), e.g. how many products make 80% of revenue.
    pub fn rows_to_reach(&self, threshold: f64) -> Option<usize> {
        self.shares.iter().position(|s| *s >= threshold).map(|i| i + 1)
    }
}

/// Ranks `table` descending by `measure` and appends, per row, the running
/// sum of the measure divided by its total.
///
/// The last share is exactly 1 (or 100) whenever the total is non-zero. A
/// zero total, or one that is only rounding residue of values cancelling
/// out, yields a share of 0 for every row. Shares are non-decreasing as
/// long as the measure is non-negative.
pub fn cumulative_share(
    table: &AggregateTable,
    measure: Measure,
    scale: ShareScale,
) -> Result<CumulativeDistribution, AggregationError> {
    let ranking = rank_descending(table, measure)?;
    let i = measure_index(&ranking, measure)?;

    // summed in ranking order so the final running sum equals it bit-for-bit
    let total: f64 = ranking.rows.iter().map(|r| r.values[i]).sum();
    let magnitude: f64 = ranking.rows.iter().map(|r| r.values[i].abs()).sum();

    let shares = if total.abs() <= magnitude * ZERO_TOTAL_TOLERANCE {
        vec![0.0; ranking.rows.len()]
    } else {
        let mut running = 0.0;
        ranking
            .rows
            .iter()
            .map(|r| {
                running += r.values[i];
                running / total * scale.factor()
            })
            .collect()
    };

    Ok(CumulativeDistribution {
        ranking,
        measure,
        scale,
        shares,
    })
}

impl ToTable for CumulativeDistribution {
    fn to_table(&self) -> Table {
        let mut table = self.ranking.to_table();
        table.columns.push(self.scale.column_name().to_string());
        for (row, share) in table.rows.iter_mut().zip(&self.shares) {
            row.push(Cell::Number(*share));
        }
        table
    }
}

/// The row with the largest `measure`; the first one wins on ties.
/// `None` for an empty table.
pub fn peak(
    table: &AggregateTable,
    measure: Measure,
) -> Result<Option<&AggregateRow>, AggregationError> {
    let i = measure_index(table, measure)?;
    let mut best: Option<&AggregateRow> = None;

    for row in &table.rows {
        match best {
            Some(b) if row.values[i] <= b.values[i] => {}
            _ => best = Some(row),
        }
    }

    Ok(best)
}

/// Revenue-per-order for one day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyYield {
    pub date: NaiveDate,
    pub unique_orders: u64,
    pub total: f64,
    /// `None` when the day has no identifiable order.
    pub revenue_per_order: Option<f64>,
    pub low_yield: bool,
}

/// Per-day revenue-per-order with days below the median flagged.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YieldReport {
    pub days: Vec<DailyYield>,
    pub median: Option<f64>,
}

impl YieldReport {
    pub fn low_yield_dates(&self) -> Vec<NaiveDate> {
        self.days
            .iter()
            .filter(|d| d.low_yield)
            .map(|d| d.date)
            .collect()
    }
}

impl ToTable for YieldReport {
    fn to_table(&self) -> Table {
        let columns = ["date_only", "unique_orders", "total", "revenue_per_order", "low_yield"]
            .iter()
            .map(|c| c.to_string())
            .collect();

        let rows = self
            .days
            .iter()
            .map(|d| {
                vec![
                    Cell::Key(KeyValue::Date(d.date)),
                    Cell::Number(d.unique_orders as f64),
                    Cell::Number(d.total),
                    Cell::Number(d.revenue_per_order.unwrap_or(f64::NAN)),
                    Cell::Flag(d.low_yield),
                ]
            })
            .collect();

        Table { columns, rows }
    }
}

/// Computes `total / distinct orders` per day of a daily summary and flags
/// days strictly below the median ratio as low-yield.
///
/// # Errors
///
/// The table must be keyed on `date_only` alone and carry both
/// [`Measure::SumTotal`] and [`Measure::DistinctOrders`].
pub fn revenue_per_order(daily: &AggregateTable) -> Result<YieldReport, AggregationError> {
    if daily.keys != [GroupField::DateOnly] {
        return Err(AggregationError::KeyMismatch {
            left: daily.keys.clone(),
            right: vec![GroupField::DateOnly],
        });
    }
    let total_i = measure_index(daily, Measure::SumTotal)?;
    let orders_i = measure_index(daily, Measure::DistinctOrders)?;

    let mut days: Vec<DailyYield> = daily
        .rows
        .iter()
        .filter_map(|row| {
            let date = row.key.first()?.as_date()?;
            let total = row.values[total_i];
            let orders = row.values[orders_i];
            Some(DailyYield {
                date,
                unique_orders: orders as u64,
                total,
                revenue_per_order: (orders > 0.0).then(|| total / orders),
                low_yield: false,
            })
        })
        .collect();

    let ratios: Vec<f64> = days.iter().filter_map(|d| d.revenue_per_order).collect();
    let median = median(&ratios);

    if let Some(m) = median {
        for day in &mut days {
            day.low_yield = day.revenue_per_order.is_some_and(|r| r < m);
        }
    }

    let low = days.iter().filter(|d| d.low_yield).count();
    if low > 0 {
        warn!(
            low_yield_days = low,
            median = median.unwrap_or_default(),
            "Several days had high orders but low revenue per order"
        );
    }

    Ok(YieldReport { days, median })
}

/// Inner join of two tables keyed on the same fields. Rows keep the left
/// table's order; measures are the left's followed by the right's. Keys
/// missing from either side are dropped.
///
/// # Errors
///
/// Returns [`AggregationError::KeyMismatch`] if the key fields differ.
pub fn inner_join(
    left: &AggregateTable,
    right: &AggregateTable,
) -> Result<AggregateTable, AggregationError> {
    if left.keys != right.keys {
        return Err(AggregationError::KeyMismatch {
            left: left.keys.clone(),
            right: right.keys.clone(),
        });
    }

    let lookup: HashMap<&[KeyValue], &AggregateRow> = right
        .rows
        .iter()
        .map(|r| (r.key.as_slice(), r))
        .collect();

    let rows = left
        .rows
        .iter()
        .filter_map(|l| {
            lookup.get(l.key.as_slice()).map(|r| AggregateRow {
                key: l.key.clone(),
                values: l.values.iter().chain(&r.values).copied().collect(),
            })
        })
        .collect();

    Ok(AggregateTable {
        keys: left.keys.clone(),
        measures: left.measures.iter().chain(&right.measures).copied().collect(),
        rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzers::aggregate::{
        daily_summary, hourly_revenue, product_quantity, product_revenue,
    };
    use crate::analyzers::test_support::{mixed_dataset, two_day_dataset};

    #[test]
    fn test_top_and_bottom_are_disjoint_over_twenty_keys() {
        let table = revenue_table(&(1..=25).map(|v| v as f64).collect::<Vec<_>>());

        let top = top_n(&table, Measure::SumTotal, RANKING_SIZE).unwrap();
        let bottom = bottom_n(&table, Measure::SumTotal, RANKING_SIZE).unwrap();

        assert_eq!(top.len(), 10);
        assert_eq!(bottom.len(), 10);
        assert_eq!(top.rows[0].values, vec![25.0]);
        assert_eq!(bottom.rows[9].values, vec![1.0]);

        let mut keys: Vec<_> = top.rows.iter().chain(&bottom.rows).map(|r| &r.key).collect();
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), 20);
    }

    #[test]
    fn test_ranking_breaks_ties_by_input_order() {
        let table = revenue_table(&[5.0, 7.0, 5.0, 5.0]);
        let ranked = rank_descending(&table, Measure::SumTotal).unwrap();

        let labels: Vec<String> = ranked.rows.iter().map(|r| r.label()).collect();
        assert_eq!(labels, vec!["p01", "p00", "p02", "p03"]);
        assert_eq!(ranked, rank_descending(&table, Measure::SumTotal).unwrap());
    }

    #[test]
    fn test_bottom_n_with_fewer_rows_than_n() {
        let table = revenue_table(&[3.0, 1.0]);
        let bottom = bottom_n(&table, Measure::SumTotal, RANKING_SIZE).unwrap();
        assert_eq!(bottom.len(), 2);
    }

    #[test]
    fn test_ranking_requires_measure() {
        let table = revenue_table(&[1.0]);
        let err = top_n(&table, Measure::SumQuantity, 3).unwrap_err();
        assert_eq!(err, AggregationError::MissingMeasure(Measure::SumQuantity));
    }

    #[test]
    fn test_cumulative_share_is_monotonic_and_ends_at_one() {
        let table = revenue_table(&[10.0, 50.0, 25.0, 15.0]);
        let dist = cumulative_share(&table, Measure::SumTotal, ShareScale::Fraction).unwrap();

        assert_eq!(dist.shares, vec![0.5, 0.75, 0.9, 1.0]);
        assert!(dist.shares.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(dist.ranking.rows[0].values, vec![50.0]);
        assert_eq!(dist.rows_to_reach(0.8), Some(3));
    }

    #[test]
    fn test_cumulative_share_percent_scale() {
        let table = revenue_table(&[1.0, 3.0]);
        let dist = cumulative_share(&table, Measure::SumTotal, ShareScale::Percent).unwrap();

        assert_eq!(dist.shares, vec![75.0, 100.0]);
        assert_eq!(dist.to_table().columns.last().unwrap(), "cumulative_pct");
    }

    #[test]
    fn test_cumulative_share_zero_total_is_all_zero() {
        let table = revenue_table(&[0.0, 0.0, 0.0]);
        let dist = cumulative_share(&table, Measure::SumTotal, ShareScale::Fraction).unwrap();
        assert_eq!(dist.shares, vec![0.0, 0.0, 0.0]);

        let offsetting = revenue_table(&[5.0, -5.0]);
        let dist = cumulative_share(&offsetting, Measure::SumTotal, ShareScale::Percent).unwrap();
        assert_eq!(dist.shares, vec![0.0, 0.0]);
    }

    #[test]
    fn test_cumulative_share_rounding_residue_counts_as_zero() {
        let table = revenue_table(&[0.1, 0.2, -0.3]);
        let dist = cumulative_share(&table, Measure::SumTotal, ShareScale::Fraction).unwrap();

        assert_eq!(dist.shares, vec![0.0, 0.0, 0.0]);
        assert_eq!(dist.rows_to_reach(0.8), None);
    }

    #[test]
    fn test_cumulative_share_last_element_is_exact() {
        let table = revenue_table(&[0.1, 0.2, 0.3, 0.7, 1.9]);
        let dist = cumulative_share(&table, Measure::SumTotal, ShareScale::Fraction).unwrap();
        assert_eq!(*dist.shares.last().unwrap(), 1.0);
    }

    #[test]
    fn test_peak_prefers_first_on_ties() {
        let table = revenue_table(&[3.0, 9.0, 9.0, 1.0]);
        let row = peak(&table, Measure::SumTotal).unwrap().unwrap();
        assert_eq!(row.label(), "p01");

        let empty = revenue_table(&[]);
        assert_eq!(peak(&empty, Measure::SumTotal).unwrap(), None);
    }

    #[test]
    fn test_peak_hour_of_mixed_sales() {
        let hourly = hourly_revenue(&mixed_dataset()).unwrap();
        let row = peak(&hourly, Measure::SumTotal).unwrap().unwrap();

        assert_eq!(row.key, vec![KeyValue::Hour(18)]);
        assert_eq!(row.values, vec![95.0]);
    }

    #[test]
    fn test_revenue_per_order_flags_days_below_median() {
        let daily = daily_summary(&two_day_dataset()).unwrap();
        let report = revenue_per_order(&daily).unwrap();

        let ratios: Vec<_> = report.days.iter().map(|d| d.revenue_per_order).collect();
        assert_eq!(ratios, vec![Some(80.0), Some(20.0)]);
        assert_eq!(report.median, Some(50.0));
        assert_eq!(
            report.low_yield_dates(),
            vec![NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()]
        );
    }

    #[test]
    fn test_revenue_per_order_requires_daily_keys() {
        let err = revenue_per_order(&revenue_table(&[1.0])).unwrap_err();
        assert!(matches!(err, AggregationError::KeyMismatch { .. }));
    }

    #[test]
    fn test_inner_join_merges_revenue_and_quantity() {
        let dataset = mixed_dataset();
        let revenue = product_revenue(&dataset).unwrap();
        let quantity = product_quantity(&dataset).unwrap();

        let joined = inner_join(&revenue, &quantity).unwrap();
        assert_eq!(joined.measures, vec![Measure::SumTotal, Measure::SumQuantity]);
        let coffee = joined.get(&[KeyValue::Text("Coffee".into())]).unwrap();
        assert_eq!(coffee.values, vec![60.0, 3.0]);
    }

    #[test]
    fn test_inner_join_drops_unmatched_keys() {
        let left = revenue_table(&[1.0, 2.0, 3.0]);
        let mut right = revenue_table(&[4.0, 5.0]);
        right.rows[0].key = vec![KeyValue::Text("elsewhere".into())];

        let joined = inner_join(&left, &right).unwrap();
        assert_eq!(joined.len(), 1);
        assert_eq!(joined.rows[0].values, vec![2.0, 5.0]);
    }

    #[test]
    fn test_inner_join_rejects_different_keys() {
        let left = revenue_table(&[1.0]);
        let right = hourly_revenue(&mixed_dataset()).unwrap();
        assert!(inner_join(&left, &right).is_err());
    }

    // Helper functions for tests
    fn revenue_table(values: &[f64]) -> AggregateTable {
        AggregateTable {
            keys: vec![GroupField::ProductName],
            measures: vec![Measure::SumTotal],
            rows: values
                .iter()
                .enumerate()
                .map(|(i, v)| AggregateRow {
                    key: vec![KeyValue::Text(format!("p{i:02}"))],
                    values: vec![*v],
                })
                .collect(),
        }
    }
}
