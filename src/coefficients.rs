//! Criteria coefficient table loading.
//!
//! The source table carries one row per metal and criteria class. It is split
//! into an acute and a chronic lookup table keyed by metal name, with
//! class-prefixed coefficient columns so both can be joined onto one sample
//! row.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use polars::prelude::*;
use tracing::{debug, warn};

use crate::criteria::CriteriaClass;
use crate::error::ScreenError;
use crate::loader;
use crate::schema::criteria;

/// Options for loading the coefficient table.
#[derive(Debug, Clone, Default)]
pub struct CriteriaOptions {
    /// Worksheet name; first sheet when `None`.
    pub sheet: Option<String>,
    /// Reject rows whose class label matches neither criteria class instead
    /// of dropping them.
    pub strict: bool,
}

/// Acute and chronic coefficient lookup tables.
#[derive(Debug, Clone)]
pub struct CriteriaTables {
    /// `metal, acute_m, acute_b, acute_conversion_factor`
    pub acute: DataFrame,
    /// `metal, chronic_m, chronic_b, chronic_conversion_factor`
    pub chronic: DataFrame,
    /// Labels of rows that matched neither class, in first-seen order.
    pub unmatched_labels: Vec<String>,
}

impl CriteriaTables {
    pub fn table(&self, class: CriteriaClass) -> &DataFrame {
        match class {
            CriteriaClass::Acute => &self.acute,
            CriteriaClass::Chronic => &self.chronic,
        }
    }
}

/// Output column names for one class: (m, b, conversion factor).
pub fn coefficient_columns(class: CriteriaClass) -> [&'static str; 3] {
    match class {
        CriteriaClass::Acute => [
            criteria::ACUTE_M,
            criteria::ACUTE_B,
            criteria::ACUTE_CONVERSION_FACTOR,
        ],
        CriteriaClass::Chronic => [
            criteria::CHRONIC_M,
            criteria::CHRONIC_B,
            criteria::CHRONIC_CONVERSION_FACTOR,
        ],
    }
}

/// Read the coefficient table from an xlsx/xls/ods or csv file.
pub fn load_criteria(path: &Path, options: &CriteriaOptions) -> Result<CriteriaTables, ScreenError> {
    let raw = loader::read_table_as_strings(path, options.sheet.as_deref())?;
    let raw = loader::normalize_column_names(raw, &BTreeMap::new())?;
    split_criteria(raw, options)
}

/// Clean an all-string coefficient table and split it by class label.
pub fn split_criteria(raw: DataFrame, options: &CriteriaOptions) -> Result<CriteriaTables, ScreenError> {
    loader::require_columns(&raw, &criteria::REQUIRED)?;

    let df = loader::strip_columns(raw, &[criteria::CRITERIA, criteria::METAL])?;
    let df = loader::parse_float_columns(
        df,
        &[criteria::M, criteria::B, criteria::CONVERSION_FACTOR],
    )?;

    let unmatched_labels = unmatched_labels(&df)?;
    if !unmatched_labels.is_empty() {
        if options.strict {
            return Err(ScreenError::Validation(format!(
                "criteria rows with unrecognized class labels: {}",
                unmatched_labels.join(", ")
            )));
        }
        debug!(labels = ?unmatched_labels, "dropping criteria rows with unrecognized class");
    }

    let acute = class_table(&df, CriteriaClass::Acute)?;
    let chronic = class_table(&df, CriteriaClass::Chronic)?;
    debug!(acute = acute.height(), chronic = chronic.height(), "criteria tables built");

    Ok(CriteriaTables {
        acute,
        chronic,
        unmatched_labels,
    })
}

fn unmatched_labels(df: &DataFrame) -> Result<Vec<String>, ScreenError> {
    let labels = df.column(criteria::CRITERIA)?.str()?;
    let mut seen = BTreeSet::new();
    let mut out = Vec::new();
    for label in labels.into_iter() {
        let label = label.unwrap_or("");
        if CriteriaClass::from_label(label).is_none() && seen.insert(label.to_string()) {
            out.push(label.to_string());
        }
    }
    Ok(out)
}

fn class_table(df: &DataFrame, class: CriteriaClass) -> Result<DataFrame, ScreenError> {
    let [m, b, cf] = coefficient_columns(class);
    let table = df
        .clone()
        .lazy()
        .filter(col(criteria::CRITERIA).eq(lit(class.label())))
        .select([
            col(criteria::METAL),
            col(criteria::M).alias(m),
            col(criteria::B).alias(b),
            col(criteria::CONVERSION_FACTOR).alias(cf),
        ])
        .collect()?;

    let duplicates = duplicate_metals(&table)?;
    if !duplicates.is_empty() {
        warn!(class = class.label(), metals = ?duplicates, "duplicate criteria rows");
        return Err(ScreenError::Validation(format!(
            "{} criteria table has more than one row for: {}",
            class.label(),
            duplicates.join(", ")
        )));
    }
    Ok(table)
}

fn duplicate_metals(table: &DataFrame) -> Result<Vec<String>, ScreenError> {
    let metals = table.column(criteria::METAL)?.str()?;
    let mut seen = BTreeSet::new();
    let mut dups = BTreeSet::new();
    for metal in metals.into_iter().flatten() {
        if !seen.insert(metal) {
            dups.insert(metal.to_string());
        }
    }
    Ok(dups.into_iter().collect())
}
