//! Run configuration.
//!
//! Resolution order: built-in defaults, then an optional TOML file, then CLI
//! flags (applied by the binary). Relative paths resolve against `base_dir`.
//!
//! ```toml
//! base_dir = "."
//!
//! [screening]
//! samples = "data/samples.csv"
//! criteria = "data/criteria.xlsx"
//! output = "output/hardness_screening.xlsx"
//! strict_criteria = false
//!
//! [screening.rename]
//! sys_loc_code = "location_id"
//!
//! [pfas]
//! sources = ["data/pfas_export_1.csv", "data/pfas_export_2.csv"]
//! lookup = "data/pfas_short_names.xlsx"
//! start_date = "2021-01-01"
//! palette = ["#1f77b4", "#ff7f0e"]
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::Deserialize;

use crate::error::ScreenError;

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub base_dir: PathBuf,
    pub screening: ScreeningConfig,
    pub pfas: PfasConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("."),
            screening: ScreeningConfig::default(),
            pfas: PfasConfig::default(),
        }
    }
}

impl Config {
    /// Load from a TOML file, or defaults when `path` is `None`.
    pub fn load(path: Option<&Path>) -> Result<Self, ScreenError> {
        match path {
            Some(p) => Self::from_toml(&fs::read_to_string(p)?),
            None => Ok(Self::default()),
        }
    }

    pub fn from_toml(text: &str) -> Result<Self, ScreenError> {
        Ok(toml::from_str(text)?)
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ScreeningConfig {
    pub samples: PathBuf,
    pub criteria: PathBuf,
    pub criteria_sheet: Option<String>,
    pub output: PathBuf,
    /// Fail on criteria rows whose class label is not recognized.
    pub strict_criteria: bool,
    /// Column renames keyed by the snake-cased input header.
    pub rename: BTreeMap<String, String>,
}

impl Default for ScreeningConfig {
    fn default() -> Self {
        Self {
            samples: PathBuf::from("data/samples.csv"),
            criteria: PathBuf::from("data/criteria.xlsx"),
            criteria_sheet: None,
            output: PathBuf::from("output/hardness_screening.xlsx"),
            strict_criteria: false,
            rename: BTreeMap::new(),
        }
    }
}

/// Default chart palette, assigned to short names in sorted order.
pub const DEFAULT_PALETTE: [&str; 12] = [
    "#1f77b4", "#ff7f0e", "#2ca02c", "#d62728", "#9467bd", "#8c564b", "#e377c2", "#7f7f7f",
    "#bcbd22", "#17becf", "#393b79", "#637939",
];

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct PfasConfig {
    /// Sample exports unioned before plotting.
    pub sources: Vec<PathBuf>,
    /// `parameter_name` to `short_name` lookup (xlsx or csv).
    pub lookup: PathBuf,
    pub lookup_sheet: Option<String>,
    pub output: PathBuf,
    /// Allowed `sample_purpose` values; empty keeps all.
    pub purposes: Vec<String>,
    /// Allowed `analytic_method` values; empty keeps all.
    pub methods: Vec<String>,
    /// Allowed `location_id` values; empty keeps all.
    pub locations: Vec<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub palette: Vec<String>,
    pub title: String,
    pub panel_width_px: u32,
    pub panel_height_px: u32,
    pub rename: BTreeMap<String, String>,
}

impl Default for PfasConfig {
    fn default() -> Self {
        Self {
            sources: vec![
                PathBuf::from("data/pfas_export_1.csv"),
                PathBuf::from("data/pfas_export_2.csv"),
            ],
            lookup: PathBuf::from("data/pfas_short_names.xlsx"),
            lookup_sheet: None,
            output: PathBuf::from("output/pfas_chart.svg"),
            purposes: Vec::new(),
            methods: Vec::new(),
            locations: Vec::new(),
            start_date: None,
            end_date: None,
            palette: DEFAULT_PALETTE.iter().map(|c| c.to_string()).collect(),
            title: "Detected PFAS".to_string(),
            panel_width_px: 480,
            panel_height_px: 360,
            rename: BTreeMap::new(),
        }
    }
}
