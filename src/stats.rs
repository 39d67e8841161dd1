use serde::Serialize;

use crate::analyzers::aggregate::{
    branch_revenue, category_revenue, city_revenue, daily_summary, hourly_revenue,
    product_revenue,
};
use crate::analyzers::metrics::{
    RANKING_SIZE, ShareScale, bottom_n, cumulative_share, peak, revenue_per_order, top_n,
};
use crate::analyzers::types::{AggregateTable, GroupField, KeyValue, Measure};
use crate::analyzers::utility::{mean, pct};
use crate::error::AggregationError;
use crate::schema::Dataset;

/// Headline figures shown above each dashboard tab.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct SalesStats {
    pub records: usize,

    // trends
    pub total_revenue: f64,
    pub total_unique_orders: u64,
    pub low_yield_days: usize,

    // products
    pub product_count: usize,
    pub avg_revenue_per_product: f64,
    pub top_products_revenue: f64,
    pub bottom_products_revenue: f64,
    pub top_products_share_pct: f64,
    /// Fewest products that together make 80% of revenue.
    pub products_for_80_pct: Option<usize>,

    // locations
    pub city_count: usize,
    pub branch_count: usize,
    pub top_city: Option<String>,
    pub top_city_revenue: f64,

    // time of day
    pub peak_hour: Option<u32>,
    pub peak_hour_revenue: f64,

    // categories
    pub category_count: usize,
    pub top_category: Option<String>,
    pub top_category_revenue: f64,
}

impl SalesStats {
    pub fn from_dataset(dataset: &Dataset) -> Result<Self, AggregationError> {
        let mut s = SalesStats {
            records: dataset.len(),
            ..Default::default()
        };

        let daily = daily_summary(dataset)?;
        s.total_revenue = daily.total(Measure::SumTotal);
        // summed per day, so an order spanning two days counts twice
        s.total_unique_orders = daily.total(Measure::DistinctOrders) as u64;
        s.low_yield_days = revenue_per_order(&daily)?.low_yield_dates().len();

        let products = product_revenue(dataset)?;
        s.product_count = products.len();
        s.avg_revenue_per_product = mean(&products.column(Measure::SumTotal));
        s.top_products_revenue = top_n(&products, Measure::SumTotal, RANKING_SIZE)?
            .total(Measure::SumTotal);
        s.bottom_products_revenue = bottom_n(&products, Measure::SumTotal, RANKING_SIZE)?
            .total(Measure::SumTotal);
        s.top_products_share_pct = pct(s.top_products_revenue, s.total_revenue);
        s.products_for_80_pct = cumulative_share(&products, Measure::SumTotal, ShareScale::Fraction)?
            .rows_to_reach(0.8);

        let cities = city_revenue(dataset)?;
        s.city_count = cities.len();
        (s.top_city, s.top_city_revenue) = leader(&cities)?;

        let branches = branch_revenue(dataset)?;
        s.branch_count = distinct_keys(&branches, GroupField::Branch);

        let hourly = hourly_revenue(dataset)?;
        if let Some(row) = peak(&hourly, Measure::SumTotal)? {
            if let Some(KeyValue::Hour(h)) = row.key.first() {
                s.peak_hour = Some(*h);
            }
            s.peak_hour_revenue = row.values[0];
        }

        let categories = category_revenue(dataset)?;
        s.category_count = categories.len();
        (s.top_category, s.top_category_revenue) = leader(&categories)?;

        Ok(s)
    }

    /// Average revenue per unique order across the whole dataset.
    pub fn revenue_per_order(&self) -> f64 {
        if self.total_unique_orders == 0 {
            0.0
        } else {
            self.total_revenue / self.total_unique_orders as f64
        }
    }
}

/// Label and revenue of the highest-revenue row of a single-key table.
fn leader(table: &AggregateTable) -> Result<(Option<String>, f64), AggregationError> {
    Ok(match peak(table, Measure::SumTotal)? {
        Some(row) => (Some(row.label()), row.values[0]),
        None => (None, 0.0),
    })
}

fn distinct_keys(table: &AggregateTable, field: GroupField) -> usize {
    let Some(i) = table.keys.iter().position(|k| *k == field) else {
        return 0;
    };
    let mut values: Vec<&KeyValue> = table.rows.iter().map(|r| &r.key[i]).collect();
    values.sort();
    values.dedup();
    values.len()
}
