//! Session-scoped state: the uploaded dataset and the active filters.

use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::analyzers::analyzer::{DashboardReport, compute};
use crate::analyzers::metrics::ShareScale;
use crate::error::Result;
use crate::parser::load_table;
use crate::schema::{Dataset, normalize};

/// Set-membership filter on `city`. An empty selection keeps every row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CityFilter {
    cities: BTreeSet<String>,
}

impl CityFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn new<I, S>(cities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            cities: cities.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.cities.is_empty()
    }

    pub fn matches(&self, city: &str) -> bool {
        self.cities.is_empty() || self.cities.contains(city)
    }

    /// Rows of `dataset` whose city is selected.
    pub fn apply(&self, dataset: &Dataset) -> Dataset {
        if self.is_empty() {
            return dataset.clone();
        }
        dataset.filtered(|r| self.matches(&r.city))
    }
}

/// Everything one user session works against. Owned exclusively by the
/// caller; each recomputation reads it without mutating the dataset.
#[derive(Debug, Clone, Default)]
pub struct Session {
    dataset: Dataset,
    filter: CityFilter,
    scale: ShareScale,
}

impl Session {
    pub fn new(dataset: Dataset) -> Self {
        Self {
            dataset,
            ..Default::default()
        }
    }

    /// Reads and normalizes an uploaded file.
    pub fn load(path: &Path, sheet: Option<&str>) -> Result<Self> {
        let table = load_table(path, sheet)?;
        let dataset = normalize(&table)?;
        info!(path = %path.display(), records = dataset.len(), "Session dataset loaded");
        Ok(Self::new(dataset))
    }

    pub fn with_filter(mut self, filter: CityFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_scale(mut self, scale: ShareScale) -> Self {
        self.scale = scale;
        self
    }

    pub fn set_filter(&mut self, filter: CityFilter) {
        self.filter = filter;
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn filter(&self) -> &CityFilter {
        &self.filter
    }

    pub fn scale(&self) -> ShareScale {
        self.scale
    }

    /// Options for the city filter, in first-appearance order.
    pub fn available_cities(&self) -> Vec<String> {
        self.dataset.cities()
    }

    /// Runs the full pipeline for the current filter.
    pub fn compute(&self) -> DashboardReport {
        compute(&self.dataset, &self.filter, self.scale)
    }
}
