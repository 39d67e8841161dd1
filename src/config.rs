use anyhow::{Context, Result};
use serde::Deserialize;

use crate::analyzers::metrics::ShareScale;
use crate::session::CityFilter;

/// Dashboard settings.
///
/// Stored as a plain JSON object on disk; every key is optional:
/// ```json
/// {
///   "sheet": "Sales",
///   "percent_scale": true,
///   "export_path": "daily_summary.csv",
///   "cities": ["Cairo", "Giza"]
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub sheet: Option<String>,
    pub percent_scale: bool,
    pub export_path: String,
    pub cities: Vec<String>,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            sheet: None,
            percent_scale: true,
            export_path: "daily_summary.csv".to_string(),
            cities: Vec::new(),
        }
    }
}

impl DashboardConfig {
    /// Loads the config from a JSON file at `path`.
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config '{path}'"))?;
        Self::from_json(&content).with_context(|| format!("parsing config '{path}'"))
    }

    pub fn from_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Applies `SALES_EXPORT_PATH` and `SALES_PERCENT_SCALE` from the environment.
    pub fn with_env(self) -> Self {
        self.with_overrides(
            std::env::var("SALES_EXPORT_PATH").ok(),
            std::env::var("SALES_PERCENT_SCALE").ok(),
        )
    }

    fn with_overrides(mut self, export_path: Option<String>, percent_scale: Option<String>) -> Self {
        if let Some(path) = export_path.filter(|p| !p.is_empty()) {
            self.export_path = path;
        }
        if let Some(flag) = percent_scale {
            match flag.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => self.percent_scale = true,
                "0" | "false" | "no" => self.percent_scale = false,
                _ => tracing::warn!(value = %flag, "Ignoring unrecognised SALES_PERCENT_SCALE"),
            }
        }
        self
    }

    pub fn scale(&self) -> ShareScale {
        if self.percent_scale {
            ShareScale::Percent
        } else {
            ShareScale::Fraction
        }
    }

    pub fn city_filter(&self) -> CityFilter {
        CityFilter::new(self.cities.iter().cloned())
    }
}
