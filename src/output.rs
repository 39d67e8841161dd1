//! Output formatting and export for dashboard results.
//!
//! Supports pretty-printing, JSON serialization, and the daily-summary CSV
//! download.

use anyhow::Result;
use chrono::NaiveDate;
use csv::WriterBuilder;
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use tracing::{debug, info, warn};

use crate::analyzers::analyzer::DashboardReport;
use crate::analyzers::metrics::YieldReport;
use crate::analyzers::types::{Table, ToTable};

/// One line of the daily-summary export.
#[derive(Debug, Serialize)]
struct DailySummaryRow {
    date: NaiveDate,
    unique_orders: u64,
    total: f64,
    revenue_per_order: Option<f64>,
}

/// Logs a report using Rust's debug pretty-print format.
pub fn print_pretty(report: &DashboardReport) {
    debug!("{:#?}", report);
}

/// Logs a report as pretty-printed JSON.
pub fn print_json(report: &DashboardReport) -> Result<()> {
    info!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}

/// Logs each view as a plain text table, one event per line.
pub fn print_tables(report: &DashboardReport) {
    if let Ok(stats) = &report.stats {
        info!(
            total_revenue = stats.total_revenue,
            unique_orders = stats.total_unique_orders,
            revenue_per_order = stats.revenue_per_order(),
            products_for_80_pct = ?stats.products_for_80_pct,
            products = stats.product_count,
            cities = stats.city_count,
            branches = stats.branch_count,
            peak_hour = ?stats.peak_hour,
            top_city = ?stats.top_city,
            top_category = ?stats.top_category,
            "Headline stats"
        );
    }

    for (name, outcome) in &report.views {
        match outcome {
            Ok(view) => {
                info!(view = %name, "{}", render_table(&view.to_table()));
            }
            Err(e) => warn!(view = %name, error = %e, "View unavailable"),
        }
    }
}

/// Renders a table as aligned plain text.
pub fn render_table(table: &Table) -> String {
    let cells: Vec<Vec<String>> = table
        .rows
        .iter()
        .map(|r| r.iter().map(ToString::to_string).collect())
        .collect();

    let widths: Vec<usize> = table
        .columns
        .iter()
        .enumerate()
        .map(|(i, c)| {
            cells
                .iter()
                .filter_map(|r| r.get(i))
                .map(String::len)
                .chain(std::iter::once(c.len()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let line = |values: Vec<&str>| {
        values
            .iter()
            .zip(&widths)
            .map(|(v, w)| format!("{v:<width$}", width = *w))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut out = vec![line(table.columns.iter().map(String::as_str).collect())];
    out.extend(cells.iter().map(|r| line(r.iter().map(String::as_str).collect())));
    out.join("\n")
}

/// Serializes the daily summary (date, unique orders, total, revenue per
/// order) as CSV into `writer`.
pub fn write_daily_summary<W: Write>(writer: W, report: &YieldReport) -> Result<()> {
    let mut writer = WriterBuilder::new().has_headers(true).from_writer(writer);

    for day in &report.days {
        writer.serialize(DailySummaryRow {
            date: day.date,
            unique_orders: day.unique_orders,
            total: day.total,
            revenue_per_order: day.revenue_per_order,
        })?;
    }
    writer.flush()?;

    Ok(())
}

/// Daily summary CSV as bytes, ready to hand to a download button.
pub fn daily_summary_csv(report: &YieldReport) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    write_daily_summary(&mut buf, report)?;
    Ok(buf)
}

/// Writes the daily summary CSV to `path`, replacing any existing file.
pub fn export_daily_summary(path: &str, report: &YieldReport) -> Result<()> {
    debug!(path, days = report.days.len(), "Writing daily summary CSV");
    let file = File::create(path)?;
    write_daily_summary(file, report)?;
    info!(path, "Daily summary exported");
    Ok(())
}
