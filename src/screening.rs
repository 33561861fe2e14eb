//! Hardness criteria screening: hardness extraction, screening-set selection
//! with left joins, and per-row criteria evaluation.

use polars::prelude::*;
use tracing::{info, warn};

use crate::coefficients::{coefficient_columns, CriteriaTables};
use crate::criteria::{
    clamp_hardness, criteria_value, is_exceedance, Coefficients, CriteriaClass, Metal,
    HARDNESS_DEPENDENT_METALS,
};
use crate::error::ScreenError;
use crate::schema::{codes, criteria, hardness, sample, screening};

/// Counts reported after a screening run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScreeningSummary {
    pub rows: usize,
    pub rows_with_hardness: usize,
    pub acute_exceedances: usize,
    pub chronic_exceedances: usize,
    pub exceedances: usize,
}

/// Left join that keeps left-row order.
fn left_join_args() -> JoinArgs {
    JoinArgs {
        maintain_order: MaintainOrderJoin::Left,
        ..JoinArgs::new(JoinType::Left)
    }
}

fn key_exprs() -> Vec<Expr> {
    sample::JOIN_KEY.iter().map(|&c| col(c)).collect()
}

/// Filtered, detected hardness measurements keyed by location, date and
/// sample type.
///
/// Duplicate keys are kept; they fan out in the downstream join.
pub fn extract_hardness(samples: &DataFrame) -> Result<DataFrame, ScreenError> {
    let df = samples
        .clone()
        .lazy()
        .filter(
            col(sample::PARAMETER_NAME)
                .eq(lit(codes::HARDNESS_PARAMETER))
                .and(col(sample::FIELD_PREPARATION_CODE).eq(lit(codes::FILTERED)))
                .and(col(sample::DETECTED).eq(lit(codes::DETECTED_YES))),
        )
        .select([
            col(sample::LOCATION_ID),
            col(sample::SAMPLE_DATE),
            col(sample::SAMPLE_TYPE),
            col(sample::FIELD_SAMPLE_ID).alias(hardness::FIELD_SAMPLE_ID),
            col(sample::REPORT_RESULT).alias(hardness::HARDNESS),
            col(sample::REPORT_UNITS).alias(hardness::UNITS),
        ])
        .collect()?;
    Ok(df)
}

/// Number of (location, date, sample type) keys with more than one hardness row.
pub fn hardness_duplicate_keys(hardness_df: &DataFrame) -> Result<usize, ScreenError> {
    let counts = hardness_df
        .clone()
        .lazy()
        .group_by(key_exprs())
        .agg([len().alias("_match_count")])
        .filter(col("_match_count").gt(lit(1)))
        .collect()?;
    Ok(counts.height())
}

/// Row predicate for samples screened against hardness-dependent criteria.
///
/// - the eight hardness-dependent metals, filtered fraction
/// - Aluminum, unfiltered, sample type WS
/// - Aluminum, ultrafiltered, sample type WT
pub fn screening_predicate() -> Expr {
    let parameter = || col(sample::PARAMETER_NAME);
    let prep = || col(sample::FIELD_PREPARATION_CODE);
    let sample_type = || col(sample::SAMPLE_TYPE);

    let dissolved_metal = HARDNESS_DEPENDENT_METALS
        .iter()
        .fold(lit(false), |acc, metal| {
            acc.or(parameter().eq(lit(metal.name())))
        })
        .and(prep().eq(lit(codes::FILTERED)));

    let aluminum = || parameter().eq(lit(Metal::Aluminum.name()));
    let aluminum_total = aluminum()
        .and(prep().eq(lit(codes::UNFILTERED)))
        .and(sample_type().eq(lit(codes::SURFACE_WATER_WS)));
    let aluminum_ultrafiltered = aluminum()
        .and(prep().eq(lit(codes::ULTRAFILTERED)))
        .and(sample_type().eq(lit(codes::SURFACE_WATER_WT)));

    dissolved_metal.or(aluminum_total).or(aluminum_ultrafiltered)
}

/// Select eligible samples and attach hardness plus acute and chronic
/// coefficients. Every join is a left join; unmatched right-side fields are
/// null.
pub fn select_screening_set(
    samples: &DataFrame,
    hardness_df: &DataFrame,
    tables: &CriteriaTables,
) -> Result<DataFrame, ScreenError> {
    let mut lazy = samples
        .clone()
        .lazy()
        .filter(screening_predicate())
        .join(
            hardness_df.clone().lazy(),
            key_exprs(),
            key_exprs(),
            left_join_args(),
        );

    for class in CriteriaClass::ALL {
        lazy = lazy.join(
            tables.table(class).clone().lazy(),
            [col(sample::PARAMETER_NAME)],
            [col(criteria::METAL)],
            left_join_args(),
        );
    }

    Ok(lazy.collect()?)
}

fn f64_values(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>, ScreenError> {
    Ok(df.column(name)?.f64()?.into_iter().collect())
}

fn coefficient_values(
    df: &DataFrame,
    class: CriteriaClass,
) -> Result<Vec<Coefficients>, ScreenError> {
    let [m, b, cf] = coefficient_columns(class);
    let m = f64_values(df, m)?;
    let b = f64_values(df, b)?;
    let cf = f64_values(df, cf)?;
    Ok(m
        .into_iter()
        .zip(b)
        .zip(cf)
        .map(|((m, b), conversion_factor)| Coefficients {
            m,
            b,
            conversion_factor,
        })
        .collect())
}

/// Clamp hardness, evaluate both criteria and append exceedance flags.
///
/// `hardness` is overwritten with its clamped value; `acute_criteria`,
/// `chronic_criteria` (Float64) and `acute_exceedance`,
/// `chronic_exceedance`, `exceeds` (Int32, 0/1) are appended.
pub fn evaluate_criteria(mut df: DataFrame) -> Result<DataFrame, ScreenError> {
    let n = df.height();

    let parameters: Vec<Option<String>> = df
        .column(sample::PARAMETER_NAME)?
        .str()?
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect();
    let detected: Vec<bool> = df
        .column(sample::DETECTED)?
        .str()?
        .into_iter()
        .map(|v| v == Some(codes::DETECTED_YES))
        .collect();
    let results = f64_values(&df, sample::REPORT_RESULT)?;
    let raw_hardness = f64_values(&df, hardness::HARDNESS)?;
    let acute_coeffs = coefficient_values(&df, CriteriaClass::Acute)?;
    let chronic_coeffs = coefficient_values(&df, CriteriaClass::Chronic)?;

    let mut clamped = Vec::with_capacity(n);
    let mut acute = Vec::with_capacity(n);
    let mut chronic = Vec::with_capacity(n);
    let mut acute_flags = Vec::with_capacity(n);
    let mut chronic_flags = Vec::with_capacity(n);
    let mut any_flags = Vec::with_capacity(n);

    for i in 0..n {
        let parameter = parameters[i].as_deref().unwrap_or("");
        let h = clamp_hardness(parameter, raw_hardness[i]);

        let acute_value = criteria_value(parameter, CriteriaClass::Acute, h, &acute_coeffs[i]);
        let chronic_value =
            criteria_value(parameter, CriteriaClass::Chronic, h, &chronic_coeffs[i]);

        let acute_hit = is_exceedance(results[i], acute_value, detected[i]);
        let chronic_hit = is_exceedance(results[i], chronic_value, detected[i]);

        clamped.push(h);
        acute.push(acute_value);
        chronic.push(chronic_value);
        acute_flags.push(acute_hit as i32);
        chronic_flags.push(chronic_hit as i32);
        any_flags.push((acute_hit || chronic_hit) as i32);
    }

    df.with_column(Series::new(hardness::HARDNESS.into(), clamped))?;
    df.with_column(Series::new(screening::ACUTE_CRITERIA.into(), acute))?;
    df.with_column(Series::new(screening::CHRONIC_CRITERIA.into(), chronic))?;
    df.with_column(Series::new(screening::ACUTE_EXCEEDANCE.into(), acute_flags))?;
    df.with_column(Series::new(screening::CHRONIC_EXCEEDANCE.into(), chronic_flags))?;
    df.with_column(Series::new(screening::EXCEEDS.into(), any_flags))?;
    Ok(df)
}

/// Summarize an evaluated screening table.
pub fn summarize(df: &DataFrame) -> Result<ScreeningSummary, ScreenError> {
    let flag_count = |name: &str| -> Result<usize, ScreenError> {
        Ok(df
            .column(name)?
            .i32()?
            .into_iter()
            .filter(|v| *v == Some(1))
            .count())
    };

    Ok(ScreeningSummary {
        rows: df.height(),
        rows_with_hardness: df.height() - df.column(hardness::HARDNESS)?.null_count(),
        acute_exceedances: flag_count(screening::ACUTE_EXCEEDANCE)?,
        chronic_exceedances: flag_count(screening::CHRONIC_EXCEEDANCE)?,
        exceedances: flag_count(screening::EXCEEDS)?,
    })
}

/// Run extraction, selection and evaluation over cleaned samples.
pub fn screen(samples: &DataFrame, tables: &CriteriaTables) -> Result<DataFrame, ScreenError> {
    let hardness_df = extract_hardness(samples)?;
    let duplicates = hardness_duplicate_keys(&hardness_df)?;
    if duplicates > 0 {
        warn!(
            keys = duplicates,
            "hardness has duplicate location/date/type keys; matching samples fan out"
        );
    }

    let selected = select_screening_set(samples, &hardness_df, tables)?;
    let result = evaluate_criteria(selected)?;

    let summary = summarize(&result)?;
    info!(
        rows = summary.rows,
        with_hardness = summary.rows_with_hardness,
        acute = summary.acute_exceedances,
        chronic = summary.chronic_exceedances,
        exceeds = summary.exceedances,
        "screening complete"
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::criteria as cc;

    fn joined_row(
        parameter: &str,
        detected: &str,
        result: Option<f64>,
        hardness_value: Option<f64>,
        coeffs: (Option<f64>, Option<f64>, Option<f64>),
    ) -> DataFrame {
        DataFrame::new(vec![
            Column::new(sample::PARAMETER_NAME.into(), &[parameter]),
            Column::new(sample::DETECTED.into(), &[detected]),
            Column::new(sample::REPORT_RESULT.into(), &[result]),
            Column::new(hardness::HARDNESS.into(), &[hardness_value]),
            Column::new(cc::ACUTE_M.into(), &[coeffs.0]),
            Column::new(cc::ACUTE_B.into(), &[coeffs.1]),
            Column::new(cc::ACUTE_CONVERSION_FACTOR.into(), &[coeffs.2]),
            Column::new(cc::CHRONIC_M.into(), &[coeffs.0]),
            Column::new(cc::CHRONIC_B.into(), &[coeffs.1]),
            Column::new(cc::CHRONIC_CONVERSION_FACTOR.into(), &[coeffs.2]),
        ])
        .unwrap()
    }

    fn flags(df: &DataFrame) -> (i32, i32, i32) {
        let get = |c: &str| df.column(c).unwrap().i32().unwrap().get(0).unwrap();
        (
            get(screening::ACUTE_EXCEEDANCE),
            get(screening::CHRONIC_EXCEEDANCE),
            get(screening::EXCEEDS),
        )
    }

    const ZINC: (Option<f64>, Option<f64>, Option<f64>) = (Some(0.8473), Some(0.884), Some(0.978));

    #[test]
    fn clamps_hardness_in_place() {
        let df = evaluate_criteria(joined_row("Zinc", "Y", Some(1.0), Some(500.0), ZINC)).unwrap();
        let h = df.column(hardness::HARDNESS).unwrap().f64().unwrap().get(0);
        assert_eq!(h, Some(400.0));

        let acute = df
            .column(screening::ACUTE_CRITERIA)
            .unwrap()
            .f64()
            .unwrap()
            .get(0)
            .unwrap();
        let expected = (0.8473 * 400f64.ln() + 0.884).exp() * 0.978;
        assert!((acute - expected).abs() < 1e-12);
    }

    #[test]
    fn detected_result_above_criteria_exceeds() {
        let df = evaluate_criteria(joined_row("Zinc", "Y", Some(500.0), Some(100.0), ZINC)).unwrap();
        assert_eq!(flags(&df), (1, 1, 1));
    }

    #[test]
    fn non_detect_never_exceeds() {
        let df = evaluate_criteria(joined_row("Zinc", "N", Some(500.0), Some(100.0), ZINC)).unwrap();
        assert_eq!(flags(&df), (0, 0, 0));
    }

    #[test]
    fn missing_hardness_yields_null_criteria_and_no_flags() {
        let df = evaluate_criteria(joined_row("Zinc", "Y", Some(500.0), None, ZINC)).unwrap();
        assert_eq!(df.column(screening::ACUTE_CRITERIA).unwrap().null_count(), 1);
        assert_eq!(df.column(screening::CHRONIC_CRITERIA).unwrap().null_count(), 1);
        assert_eq!(flags(&df), (0, 0, 0));
    }

    #[test]
    fn missing_result_never_exceeds() {
        let df = evaluate_criteria(joined_row("Zinc", "Y", None, Some(100.0), ZINC)).unwrap();
        assert_eq!(flags(&df), (0, 0, 0));
    }

    #[test]
    fn summary_counts_flags_and_hardness() {
        let rows = [
            joined_row("Zinc", "Y", Some(500.0), Some(100.0), ZINC),
            joined_row("Zinc", "N", Some(500.0), Some(100.0), ZINC),
            joined_row("Zinc", "Y", Some(500.0), None, ZINC),
        ];
        let mut df = rows[0].clone();
        for row in &rows[1..] {
            df.vstack_mut(row).unwrap();
        }
        let summary = summarize(&evaluate_criteria(df).unwrap()).unwrap();
        assert_eq!(
            summary,
            ScreeningSummary {
                rows: 3,
                rows_with_hardness: 2,
                acute_exceedances: 1,
                chronic_exceedances: 1,
                exceedances: 1,
            }
        );
    }

    #[test]
    fn predicate_selects_three_disjoint_cases() {
        let df = DataFrame::new(vec![
            Column::new(
                sample::PARAMETER_NAME.into(),
                &["Copper", "Copper", "Aluminum", "Aluminum", "Aluminum", "Aluminum", "Iron"],
            ),
            Column::new(
                sample::FIELD_PREPARATION_CODE.into(),
                &["F", "UF", "UF", "UF", "F10u", "F10u", "F"],
            ),
            Column::new(
                sample::SAMPLE_TYPE.into(),
                &["WS", "WS", "WS", "WT", "WT", "WS", "WS"],
            ),
        ])
        .unwrap();

        let selected = df.lazy().filter(screening_predicate()).collect().unwrap();
        let picked: Vec<(&str, &str, &str)> = {
            let p = selected.column(sample::PARAMETER_NAME).unwrap().str().unwrap();
            let f = selected
                .column(sample::FIELD_PREPARATION_CODE)
                .unwrap()
                .str()
                .unwrap();
            let t = selected.column(sample::SAMPLE_TYPE).unwrap().str().unwrap();
            (0..selected.height())
                .map(|i| (p.get(i).unwrap(), f.get(i).unwrap(), t.get(i).unwrap()))
                .collect()
        };
        assert_eq!(
            picked,
            vec![
                ("Copper", "F", "WS"),
                ("Aluminum", "UF", "WS"),
                ("Aluminum", "F10u", "WT"),
            ]
        );
    }
}
