//! End-to-end tests for the hardness screening pipeline.
//!
//! Tests cover:
//! - Selection, joins and clamping on a small realistic dataset
//! - Left-join misses producing null criteria
//! - Hardness key duplicates fanning out
//! - Writing and re-reading the output workbook
//! - Strict criteria mode

use std::fs;
use std::path::Path;

use aqua_screenkit::schema::{hardness, sample, screening};
use aqua_screenkit::spreadsheet::read_sheet_as_strings;
use aqua_screenkit::{CriteriaOptions, ScreenError, ScreeningModel};
use polars::prelude::*;
use rust_xlsxwriter::Workbook;
use tempfile::TempDir;

const HEADER: &str = "Location ID,Sample Date,Sample Type,Field Sample ID,Parameter Name,Field Preparation Code,Detected,Report Result,Report Units";

const ROWS: &[&str] = &[
    "MW-1,03/01/2023,WS,H1,Hardness,F,Y,100,mg/L",
    "MW-1,03/01/2023,WS,S1,Zinc,F,Y,500,ug/L",
    "MW-1,03/01/2023,WS,S2,Copper,UF,Y,5,ug/L",
    "MW-1,03/01/2023,WS,S3,Aluminum,UF,Y,50,ug/L",
    "MW-2,03/02/2023,WS,S4,Zinc,F,Y,10,ug/L",
    "MW-3,03/03/2023,WT,H2,Hardness,F,Y,500,mg/L",
    "MW-3,03/03/2023,WT,S5,Zinc,F,N,900,ug/L",
    "MW-3,03/03/2023,WT,S6,Aluminum,F10u,Y,1000,ug/L",
    "MW-4,03/04/2023,WS,H3,Hardness,UF,Y,80,mg/L",
    "MW-4,03/04/2023,WS,S7,Lead,F,Y,ND,ug/L",
    "MW-2,03/02/2023,WS,H4,Hardness,F,N,150,mg/L",
];

/// (metal, class label, m, b, conversion factor); `None` leaves the cell blank.
type CriteriaRow = (&'static str, &'static str, f64, f64, Option<f64>);

const CRITERIA: &[CriteriaRow] = &[
    ("Zinc", "Acute aquatic life", 0.8473, 0.884, Some(0.978)),
    ("Zinc", "Chronic aquatic life", 0.8473, 0.884, Some(0.986)),
    ("Aluminum", "Acute aquatic life", 1.3695, 1.8308, Some(1.0)),
    ("Aluminum", "Chronic aquatic life", 1.3695, 0.9161, Some(1.0)),
    ("Lead", "Acute aquatic life", 1.273, -1.46, None),
    ("Lead", "Chronic aquatic life", 1.273, -4.705, None),
    ("Copper", "Human health", 1.0, 1.0, Some(1.0)),
];

fn write_samples(dir: &Path, extra: &[&str]) {
    let mut text = String::from(HEADER);
    text.push('\n');
    for row in ROWS.iter().chain(extra.iter()) {
        text.push_str(row);
        text.push('\n');
    }
    fs::write(dir.join("samples.csv"), text).unwrap();
}

fn write_criteria(dir: &Path, rows: &[CriteriaRow]) {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    for (c, name) in ["Metal", "Criteria", "m", "b", "Conversion Factor"]
        .iter()
        .enumerate()
    {
        sheet.write_string(0, c as u16, *name).unwrap();
    }
    for (i, (metal, class, m, b, cf)) in rows.iter().enumerate() {
        let r = (i + 1) as u32;
        sheet.write_string(r, 0, *metal).unwrap();
        sheet.write_string(r, 1, *class).unwrap();
        sheet.write_number(r, 2, *m).unwrap();
        sheet.write_number(r, 3, *b).unwrap();
        if let Some(cf) = cf {
            sheet.write_number(r, 4, *cf).unwrap();
        }
    }
    workbook.save(dir.join("criteria.xlsx")).unwrap();
}

fn setup(extra_rows: &[&str]) -> (TempDir, ScreeningModel) {
    let dir = tempfile::tempdir().unwrap();
    write_samples(dir.path(), extra_rows);
    write_criteria(dir.path(), CRITERIA);

    let mut model = ScreeningModel::new(dir.path());
    model.load_samples("samples.csv").unwrap();
    model
        .load_criteria("criteria.xlsx", &CriteriaOptions::default())
        .unwrap();
    (dir, model)
}

fn strings(df: &DataFrame, name: &str) -> Vec<Option<String>> {
    df.column(name)
        .unwrap()
        .str()
        .unwrap()
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect()
}

fn floats(df: &DataFrame, name: &str) -> Vec<Option<f64>> {
    df.column(name).unwrap().f64().unwrap().into_iter().collect()
}

fn flags(df: &DataFrame, name: &str) -> Vec<i32> {
    df.column(name)
        .unwrap()
        .i32()
        .unwrap()
        .into_iter()
        .map(|v| v.unwrap())
        .collect()
}

fn ids(df: &DataFrame) -> Vec<String> {
    strings(df, sample::FIELD_SAMPLE_ID)
        .into_iter()
        .map(|v| v.unwrap())
        .collect()
}

mod selection_tests {
    use super::*;

    #[test]
    fn selects_eligible_rows_in_input_order() {
        let (_dir, model) = setup(&[]);
        let result = model.screen().unwrap();
        assert_eq!(ids(&result), vec!["S1", "S3", "S4", "S5", "S6", "S7"]);
    }

    #[test]
    fn hardness_extraction_keeps_filtered_detected_only() {
        let (_dir, model) = setup(&[]);
        let hardness_df = model.hardness().unwrap();
        assert_eq!(
            strings(&hardness_df, hardness::FIELD_SAMPLE_ID),
            vec![Some("H1".to_string()), Some("H2".to_string())]
        );
        assert_eq!(
            hardness_df.get_column_names_str(),
            vec![
                "location_id",
                "sample_date",
                "sample_type",
                "hardness_field_sample_id",
                "hardness",
                "hardness_units"
            ]
        );
    }

    #[test]
    fn non_detected_hardness_is_not_joined() {
        let (_dir, model) = setup(&[]);
        let result = model.screen().unwrap();
        // H4 shares S4's key but was not detected
        assert_eq!(ids(&result)[2], "S4");
        assert_eq!(floats(&result, hardness::HARDNESS)[2], None);
        assert_eq!(floats(&result, screening::ACUTE_CRITERIA)[2], None);
    }

    #[test]
    fn screening_set_carries_coefficients_before_evaluation() {
        let (_dir, model) = setup(&[]);
        let set = model.screening_set().unwrap();
        assert_eq!(set.height(), 6);
        let acute_m = floats(&set, "acute_m");
        assert_eq!(acute_m[0], Some(0.8473));
        // Lead has coefficients but no hardness
        assert_eq!(acute_m[5], Some(1.273));
        assert!(set.column(screening::EXCEEDS).is_err());
    }
}

mod calculation_tests {
    use super::*;

    #[test]
    fn zinc_row_matches_hand_computation() {
        let (_dir, model) = setup(&[]);
        let result = model.screen().unwrap();

        let acute = floats(&result, screening::ACUTE_CRITERIA)[0].unwrap();
        let expected = (0.8473 * 100f64.ln() + 0.884).exp() * 0.978;
        assert!((acute - expected).abs() < 1e-9, "{acute} vs {expected}");

        assert_eq!(flags(&result, screening::ACUTE_EXCEEDANCE)[0], 1);
        assert_eq!(flags(&result, screening::CHRONIC_EXCEEDANCE)[0], 1);
        assert_eq!(flags(&result, screening::EXCEEDS)[0], 1);
    }

    #[test]
    fn hardness_is_clamped_per_metal() {
        let (_dir, model) = setup(&[]);
        let result = model.screen().unwrap();
        let h = floats(&result, hardness::HARDNESS);
        // S1 Zinc at 100, S5 Zinc at 500 -> 400, S6 Aluminum at 500 -> 220
        assert_eq!(h[0], Some(100.0));
        assert_eq!(h[3], Some(400.0));
        assert_eq!(h[4], Some(220.0));
    }

    #[test]
    fn left_join_miss_gives_null_criteria_and_no_flags() {
        let (_dir, model) = setup(&[]);
        let result = model.screen().unwrap();
        // S4: no hardness for MW-2 on that date
        assert_eq!(floats(&result, hardness::HARDNESS)[2], None);
        assert_eq!(floats(&result, screening::ACUTE_CRITERIA)[2], None);
        assert_eq!(floats(&result, screening::CHRONIC_CRITERIA)[2], None);
        assert_eq!(flags(&result, screening::EXCEEDS)[2], 0);
    }

    #[test]
    fn non_detect_is_never_flagged() {
        let (_dir, model) = setup(&[]);
        let result = model.screen().unwrap();
        // S5 has result 900 well above criteria but detected = N
        assert_eq!(flags(&result, screening::ACUTE_EXCEEDANCE)[3], 0);
        assert_eq!(flags(&result, screening::CHRONIC_EXCEEDANCE)[3], 0);
    }

    #[test]
    fn exceeds_is_or_of_flags() {
        let (_dir, model) = setup(&[]);
        let result = model.screen().unwrap();
        let acute = flags(&result, screening::ACUTE_EXCEEDANCE);
        let chronic = flags(&result, screening::CHRONIC_EXCEEDANCE);
        let any = flags(&result, screening::EXCEEDS);
        for i in 0..result.height() {
            assert!(acute[i] == 0 || acute[i] == 1);
            assert!(chronic[i] == 0 || chronic[i] == 1);
            assert_eq!(any[i], (acute[i] == 1 || chronic[i] == 1) as i32);
        }
    }
}

mod cardinality_tests {
    use super::*;

    #[test]
    fn duplicate_hardness_key_fans_out() {
        let (_dir, model) = setup(&["MW-1,03/01/2023,WS,H1b,Hardness,F,Y,120,mg/L"]);
        let result = model.screen().unwrap();
        // S1 and S3 share the duplicated key
        assert_eq!(result.height(), 8);
        let s1_rows = ids(&result).iter().filter(|id| *id == "S1").count();
        assert_eq!(s1_rows, 2);
    }
}

mod output_tests {
    use super::*;

    #[test]
    fn written_output_reads_back_with_same_rows_and_columns() {
        let (dir, model) = setup(&[]);
        let result = model.screen_to_file("out/screening.xlsx").unwrap();

        let path = dir.path().join("out/screening.xlsx");
        let back = read_sheet_as_strings(&path, Some("screening")).unwrap();
        assert_eq!(back.height(), result.height());
        assert_eq!(back.get_column_names_str(), result.get_column_names_str());
        for derived in screening::DERIVED {
            assert!(back.column(derived).is_ok(), "missing {derived}");
        }
    }
}

mod error_tests {
    use super::*;

    #[test]
    fn missing_sample_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let mut model = ScreeningModel::new(dir.path());
        assert!(model.load_samples("missing.csv").is_err());
    }

    #[test]
    fn missing_required_column_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("samples.csv"),
            "Location ID,Sample Date\nMW-1,01/01/2023\n",
        )
        .unwrap();
        let mut model = ScreeningModel::new(dir.path());
        let err = model.load_samples("samples.csv").unwrap_err();
        assert!(matches!(err, ScreenError::MissingColumn(_)));
    }

    #[test]
    fn strict_mode_rejects_unknown_class_labels() {
        let dir = tempfile::tempdir().unwrap();
        write_criteria(dir.path(), CRITERIA);
        let mut model = ScreeningModel::new(dir.path());
        let options = CriteriaOptions {
            strict: true,
            ..Default::default()
        };
        let err = model.load_criteria("criteria.xlsx", &options).unwrap_err();
        assert!(matches!(err, ScreenError::Validation(_)));
    }

    #[test]
    fn default_mode_drops_unknown_class_labels() {
        let dir = tempfile::tempdir().unwrap();
        write_criteria(dir.path(), CRITERIA);
        let mut model = ScreeningModel::new(dir.path());
        let tables = model
            .load_criteria("criteria.xlsx", &CriteriaOptions::default())
            .unwrap();
        assert_eq!(tables.acute.height(), 3);
        assert_eq!(tables.chronic.height(), 3);
        assert_eq!(tables.unmatched_labels, vec!["Human health".to_string()]);
    }
}
