use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use polars::prelude::*;
use tracing::info;

use crate::coefficients::{self, CriteriaOptions, CriteriaTables};
use crate::error::ScreenError;
use crate::loader;
use crate::schema::sample;
use crate::screening;
use crate::spreadsheet;

/// Worksheet name used for the screening output.
pub const OUTPUT_SHEET: &str = "screening";

/// Holds the loaded inputs of one screening run.
///
/// Relative file names are resolved against `base_path`.
pub struct ScreeningModel {
    base_path: PathBuf,
    rename: BTreeMap<String, String>,
    samples: Option<DataFrame>,
    criteria: Option<CriteriaTables>,
}

impl ScreeningModel {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            rename: BTreeMap::new(),
            samples: None,
            criteria: None,
        }
    }

    /// Extra column renames applied after snake-casing sample headers.
    pub fn with_rename(mut self, rename: BTreeMap<String, String>) -> Self {
        self.rename = rename;
        self
    }

    fn resolve(&self, filename: &Path) -> PathBuf {
        self.base_path.join(filename)
    }

    // ── Data loading ────────────────────────────────────────────────────────

    /// Load the sample CSV.
    ///
    /// Required columns (after normalization): location_id, sample_date,
    /// sample_type, field_sample_id, parameter_name, field_preparation_code,
    /// detected, report_result, report_units.
    /// sample_date is parsed as %m/%d/%Y, report_result as Float64; all other
    /// columns are preserved as strings.
    pub fn load_samples(&mut self, filename: impl AsRef<Path>) -> Result<DataFrame, ScreenError> {
        let path = self.resolve(filename.as_ref());
        let raw = loader::read_csv_as_strings(&path)?;
        let df = clean_samples(raw, &self.rename, &sample::REQUIRED)?;
        info!(path = %path.display(), rows = df.height(), "samples loaded");

        self.samples = Some(df.clone());
        Ok(df)
    }

    /// Load the criteria coefficient table (xlsx/xls/ods or csv).
    pub fn load_criteria(
        &mut self,
        filename: impl AsRef<Path>,
        options: &CriteriaOptions,
    ) -> Result<&CriteriaTables, ScreenError> {
        let path = self.resolve(filename.as_ref());
        let tables = coefficients::load_criteria(&path, options)?;
        info!(
            path = %path.display(),
            acute = tables.acute.height(),
            chronic = tables.chronic.height(),
            dropped_labels = tables.unmatched_labels.len(),
            "criteria loaded"
        );
        Ok(self.criteria.insert(tables))
    }

    pub fn samples(&self) -> Result<&DataFrame, ScreenError> {
        self.samples
            .as_ref()
            .ok_or_else(|| ScreenError::NotLoaded("samples".into()))
    }

    pub fn criteria(&self) -> Result<&CriteriaTables, ScreenError> {
        self.criteria
            .as_ref()
            .ok_or_else(|| ScreenError::NotLoaded("criteria".into()))
    }

    // ── Pipeline stages ─────────────────────────────────────────────────────

    pub fn hardness(&self) -> Result<DataFrame, ScreenError> {
        screening::extract_hardness(self.samples()?)
    }

    /// Eligible samples joined with hardness and coefficients, before
    /// evaluation.
    pub fn screening_set(&self) -> Result<DataFrame, ScreenError> {
        let samples = self.samples()?;
        let hardness = screening::extract_hardness(samples)?;
        screening::select_screening_set(samples, &hardness, self.criteria()?)
    }

    /// Full screening result table.
    pub fn screen(&self) -> Result<DataFrame, ScreenError> {
        screening::screen(self.samples()?, self.criteria()?)
    }

    /// Screen and write the result, replacing any existing file.
    pub fn screen_to_file(&self, filename: impl AsRef<Path>) -> Result<DataFrame, ScreenError> {
        let result = self.screen()?;
        let path = self.resolve(filename.as_ref());
        spreadsheet::write_dataframe(&result, &path, OUTPUT_SHEET)?;
        info!(path = %path.display(), rows = result.height(), "screening written");
        Ok(result)
    }
}

/// Normalize headers, check required columns, parse `sample_date` and
/// `report_result`.
pub fn clean_samples(
    raw: DataFrame,
    rename: &BTreeMap<String, String>,
    required: &[&str],
) -> Result<DataFrame, ScreenError> {
    let df = loader::normalize_column_names(raw, rename)?;
    loader::require_columns(&df, required)?;
    let df = loader::parse_date_column(df, sample::SAMPLE_DATE, sample::DATE_FORMAT)?;
    loader::parse_float_columns(df, &[sample::REPORT_RESULT])
}
