use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use tracing::{error, info};

use crate::analyzers::aggregate::{
    branch_only_revenue, branch_revenue, category_revenue, city_revenue, daily_city_revenue,
    daily_summary, day_hour_revenue, hourly_city_revenue, hourly_date_revenue, hourly_revenue,
    product_performance, product_quantity, product_revenue,
};
use crate::analyzers::metrics::{
    CumulativeDistribution, RANKING_SIZE, ShareScale, YieldReport, bottom_n, cumulative_share,
    inner_join, revenue_per_order, top_n,
};
use crate::analyzers::types::{AggregateTable, Measure, Table, ToTable};
use crate::error::AggregationError;
use crate::schema::Dataset;
use crate::session::CityFilter;
use crate::stats::SalesStats;

/// Every view the dashboard renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewName {
    DailySummary,
    DailyYield,
    ProductPerformance,
    TopProducts,
    BottomProducts,
    ProductRevenueQuantity,
    CityRevenue,
    BranchRevenue,
    BranchOnlyRevenue,
    CityRevenueOverTime,
    HourlyRevenue,
    HourlyCityRevenue,
    HourlyDateRevenue,
    DayHourRevenue,
    CategoryRevenue,
    CumulativeProductShare,
}

impl ViewName {
    pub fn name(self) -> &'static str {
        match self {
            ViewName::DailySummary => "daily_summary",
            ViewName::DailyYield => "daily_yield",
            ViewName::ProductPerformance => "product_performance",
            ViewName::TopProducts => "top_products",
            ViewName::BottomProducts => "bottom_products",
            ViewName::ProductRevenueQuantity => "product_revenue_quantity",
            ViewName::CityRevenue => "city_revenue",
            ViewName::BranchRevenue => "branch_revenue",
            ViewName::BranchOnlyRevenue => "branch_only_revenue",
            ViewName::CityRevenueOverTime => "city_revenue_over_time",
            ViewName::HourlyRevenue => "hourly_revenue",
            ViewName::HourlyCityRevenue => "hourly_city_revenue",
            ViewName::HourlyDateRevenue => "hourly_date_revenue",
            ViewName::DayHourRevenue => "day_hour_revenue",
            ViewName::CategoryRevenue => "category_revenue",
            ViewName::CumulativeProductShare => "cumulative_product_share",
        }
    }
}

impl fmt::Display for ViewName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The result behind one view.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum View {
    Table(AggregateTable),
    Cumulative(CumulativeDistribution),
    Yield(YieldReport),
}

impl ToTable for View {
    fn to_table(&self) -> Table {
        match self {
            View::Table(t) => t.to_table(),
            View::Cumulative(c) => c.to_table(),
            View::Yield(y) => y.to_table(),
        }
    }
}

pub type ViewOutcome = Result<View, AggregationError>;

/// Output of one pipeline pass. A failed view does not affect the others.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardReport {
    pub records: usize,
    pub filter: CityFilter,
    pub stats: Result<SalesStats, AggregationError>,
    pub views: BTreeMap<ViewName, ViewOutcome>,
}

impl DashboardReport {
    pub fn view(&self, name: ViewName) -> Option<&ViewOutcome> {
        self.views.get(&name)
    }

    pub fn failed_views(&self) -> Vec<ViewName> {
        self.views
            .iter()
            .filter(|(_, v)| v.is_err())
            .map(|(k, _)| *k)
            .collect()
    }
}

/// Runs one full pass: filter by city, then compute every view and the
/// headline stats from the filtered rows.
#[tracing::instrument(skip(dataset, filter), fields(records = dataset.len(), cities = ?filter))]
pub fn compute(dataset: &Dataset, filter: &CityFilter, scale: ShareScale) -> DashboardReport {
    let filtered = filter.apply(dataset);
    info!(kept = filtered.len(), "City filter applied");

    let table = |t: Result<AggregateTable, AggregationError>| t.map(View::Table);
    let products = product_revenue(&filtered);

    let outcomes: Vec<(ViewName, ViewOutcome)> = vec![
        (ViewName::DailySummary, table(daily_summary(&filtered))),
        (
            ViewName::DailyYield,
            daily_summary(&filtered)
                .and_then(|d| revenue_per_order(&d))
                .map(View::Yield),
        ),
        (ViewName::ProductPerformance, table(product_performance(&filtered))),
        (
            ViewName::TopProducts,
            table(
                products
                    .as_ref()
                    .map_err(Clone::clone)
                    .and_then(|p| top_n(p, Measure::SumTotal, RANKING_SIZE)),
            ),
        ),
        (
            ViewName::BottomProducts,
            table(
                products
                    .as_ref()
                    .map_err(Clone::clone)
                    .and_then(|p| bottom_n(p, Measure::SumTotal, RANKING_SIZE)),
            ),
        ),
        (
            ViewName::ProductRevenueQuantity,
            table(products.as_ref().map_err(Clone::clone).and_then(|p| {
                inner_join(p, &product_quantity(&filtered)?)
            })),
        ),
        (ViewName::CityRevenue, table(city_revenue(&filtered))),
        (ViewName::BranchRevenue, table(branch_revenue(&filtered))),
        (ViewName::BranchOnlyRevenue, table(branch_only_revenue(&filtered))),
        (ViewName::CityRevenueOverTime, table(daily_city_revenue(&filtered))),
        (ViewName::HourlyRevenue, table(hourly_revenue(&filtered))),
        (ViewName::HourlyCityRevenue, table(hourly_city_revenue(&filtered))),
        (ViewName::HourlyDateRevenue, table(hourly_date_revenue(&filtered))),
        (ViewName::DayHourRevenue, table(day_hour_revenue(&filtered))),
        (ViewName::CategoryRevenue, table(category_revenue(&filtered))),
        (
            ViewName::CumulativeProductShare,
            products
                .as_ref()
                .map_err(Clone::clone)
                .and_then(|p| cumulative_share(p, Measure::SumTotal, scale))
                .map(View::Cumulative),
        ),
    ];

    let mut views = BTreeMap::new();
    for (name, outcome) in outcomes {
        if let Err(e) = &outcome {
            error!(view = %name, error = %e, "View computation failed");
        }
        views.insert(name, outcome);
    }

    let stats = SalesStats::from_dataset(&filtered);
    if let Err(e) = &stats {
        error!(error = %e, "Headline stats failed");
    }

    DashboardReport {
        records: filtered.len(),
        filter: filter.clone(),
        stats,
        views,
    }
}
