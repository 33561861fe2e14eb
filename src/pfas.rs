//! PFAS chart pipeline: filter detected results from several sample exports,
//! union them, attach short chemical names and total per sample type,
//! location and chemical.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::NaiveDate;
use polars::prelude::*;
use tracing::{debug, info};

use crate::config::{Config, PfasConfig};
use crate::error::ScreenError;
use crate::loader;
use crate::model::clean_samples;
use crate::schema::{codes, pfas, sample};
use crate::visualization::{self, ChartConfig};

/// Row filters applied to every export before the union.
#[derive(Debug, Clone, Default)]
pub struct PfasFilter {
    pub purposes: Vec<String>,
    pub methods: Vec<String>,
    pub locations: Vec<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl From<&PfasConfig> for PfasFilter {
    fn from(cfg: &PfasConfig) -> Self {
        Self {
            purposes: cfg.purposes.clone(),
            methods: cfg.methods.clone(),
            locations: cfg.locations.clone(),
            start_date: cfg.start_date,
            end_date: cfg.end_date,
        }
    }
}

fn any_of(column: &str, values: &[String]) -> Option<Expr> {
    if values.is_empty() {
        return None;
    }
    Some(
        values
            .iter()
            .fold(lit(false), |acc, v| acc.or(col(column).eq(lit(v.as_str())))),
    )
}

impl PfasFilter {
    /// Detected rows passing every configured filter. An empty value list
    /// does not restrict its column.
    pub fn predicate(&self) -> Expr {
        let mut expr = col(sample::DETECTED).eq(lit(codes::DETECTED_YES));
        for extra in [
            any_of(pfas::SAMPLE_PURPOSE, &self.purposes),
            any_of(pfas::ANALYTIC_METHOD, &self.methods),
            any_of(sample::LOCATION_ID, &self.locations),
        ]
        .into_iter()
        .flatten()
        {
            expr = expr.and(extra);
        }
        if let Some(start) = self.start_date {
            expr = expr.and(col(sample::SAMPLE_DATE).gt_eq(lit(start)));
        }
        if let Some(end) = self.end_date {
            expr = expr.and(col(sample::SAMPLE_DATE).lt_eq(lit(end)));
        }
        expr
    }
}

/// Load and clean one PFAS sample export.
pub fn load_export(
    path: &Path,
    rename: &BTreeMap<String, String>,
) -> Result<DataFrame, ScreenError> {
    let raw = loader::read_csv_as_strings(path)?;
    let df = clean_samples(raw, rename, &pfas::REQUIRED)?;
    debug!(path = %path.display(), rows = df.height(), "pfas export loaded");
    Ok(df)
}

/// Load the `parameter_name` to `short_name` lookup.
pub fn load_lookup(path: &Path, sheet: Option<&str>) -> Result<DataFrame, ScreenError> {
    let raw = loader::read_table_as_strings(path, sheet)?;
    let df = loader::normalize_column_names(raw, &BTreeMap::new())?;
    loader::require_columns(&df, &pfas::LOOKUP_REQUIRED)?;
    let df = df.select(pfas::LOOKUP_REQUIRED)?;
    loader::strip_columns(df, &pfas::LOOKUP_REQUIRED)
}

/// Filter, union, join the lookup and total per
/// (sample_type, location_id, short_name).
pub fn chart_table(
    exports: &[DataFrame],
    lookup: &DataFrame,
    filter: &PfasFilter,
) -> Result<DataFrame, ScreenError> {
    if exports.is_empty() {
        return Err(ScreenError::InvalidData("no PFAS exports given".into()));
    }

    let columns: Vec<Expr> = [
        sample::LOCATION_ID,
        sample::SAMPLE_DATE,
        sample::SAMPLE_TYPE,
        sample::PARAMETER_NAME,
        sample::REPORT_RESULT,
    ]
    .iter()
    .map(|&c| col(c))
    .collect();

    let filtered: Vec<LazyFrame> = exports
        .iter()
        .map(|df| {
            df.clone()
                .lazy()
                .filter(filter.predicate())
                .select(columns.clone())
        })
        .collect();

    let table = concat(filtered, UnionArgs::default())?
        .join(
            lookup.clone().lazy(),
            [col(sample::PARAMETER_NAME)],
            [col(sample::PARAMETER_NAME)],
            JoinArgs::new(JoinType::Inner),
        )
        .group_by([
            col(sample::SAMPLE_TYPE),
            col(sample::LOCATION_ID),
            col(pfas::SHORT_NAME),
        ])
        .agg([col(sample::REPORT_RESULT).sum().alias(pfas::TOTAL_RESULT)])
        .collect()?;

    Ok(table)
}

/// Run the whole chart job from configuration and write the SVG.
pub fn run(config: &Config) -> Result<(), ScreenError> {
    let cfg = &config.pfas;
    let exports = cfg
        .sources
        .iter()
        .map(|p| load_export(&config.base_dir.join(p), &cfg.rename))
        .collect::<Result<Vec<_>, _>>()?;
    let lookup = load_lookup(&config.base_dir.join(&cfg.lookup), cfg.lookup_sheet.as_deref())?;

    let table = chart_table(&exports, &lookup, &PfasFilter::from(cfg))?;
    let svg = visualization::generate_stacked_bar_svg(&table, &ChartConfig::from(cfg))?;

    let path = config.base_dir.join(&cfg.output);
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(&path, svg)?;
    info!(path = %path.display(), groups = table.height(), "pfas chart written");
    Ok(())
}
