//! Sales aggregation and derived metrics.
//!
//! This module groups normalized records into aggregate tables, derives
//! rankings, cumulative share curves, peaks and revenue-per-order yield from
//! them, and runs the whole set of dashboard views in one pass.

pub mod aggregate;
pub mod analyzer;
pub mod metrics;
pub mod types;
pub mod utility;

#[cfg(test)]
pub(crate) mod test_support;
