/// Column-name and category constants for aqua-screenkit tables.
/// Single source of truth - every filter, join and writer refers to these.

// ── Sample columns (after name normalization) ──────────────────────────────
pub mod sample {
    pub const LOCATION_ID: &str = "location_id";
    pub const SAMPLE_DATE: &str = "sample_date";
    pub const SAMPLE_TYPE: &str = "sample_type";
    pub const FIELD_SAMPLE_ID: &str = "field_sample_id";
    pub const PARAMETER_NAME: &str = "parameter_name";
    pub const FIELD_PREPARATION_CODE: &str = "field_preparation_code";
    pub const DETECTED: &str = "detected";
    pub const REPORT_RESULT: &str = "report_result";
    pub const REPORT_UNITS: &str = "report_units";

    pub const REQUIRED: [&str; 9] = [
        LOCATION_ID,
        SAMPLE_DATE,
        SAMPLE_TYPE,
        FIELD_SAMPLE_ID,
        PARAMETER_NAME,
        FIELD_PREPARATION_CODE,
        DETECTED,
        REPORT_RESULT,
        REPORT_UNITS,
    ];

    /// Join key shared by samples and hardness measurements.
    pub const JOIN_KEY: [&str; 3] = [LOCATION_ID, SAMPLE_DATE, SAMPLE_TYPE];

    /// Input format of `sample_date`.
    pub const DATE_FORMAT: &str = "%m/%d/%Y";
}

// ── Category values found in sample rows ────────────────────────────────────
pub mod codes {
    pub const DETECTED_YES: &str = "Y";

    pub const FILTERED: &str = "F";
    pub const UNFILTERED: &str = "UF";
    pub const ULTRAFILTERED: &str = "F10u";

    pub const SURFACE_WATER_WS: &str = "WS";
    pub const SURFACE_WATER_WT: &str = "WT";

    pub const HARDNESS_PARAMETER: &str = "Hardness";
}

// ── Hardness projection columns ─────────────────────────────────────────────
pub mod hardness {
    pub const FIELD_SAMPLE_ID: &str = "hardness_field_sample_id";
    pub const HARDNESS: &str = "hardness";
    pub const UNITS: &str = "hardness_units";
}

// ── Criteria coefficient table ──────────────────────────────────────────────
pub mod criteria {
    pub const METAL: &str = "metal";
    pub const CRITERIA: &str = "criteria";
    pub const M: &str = "m";
    pub const B: &str = "b";
    pub const CONVERSION_FACTOR: &str = "conversion_factor";

    pub const REQUIRED: [&str; 5] = [METAL, CRITERIA, M, B, CONVERSION_FACTOR];

    pub const ACUTE_LABEL: &str = "Acute aquatic life";
    pub const CHRONIC_LABEL: &str = "Chronic aquatic life";

    pub const ACUTE_M: &str = "acute_m";
    pub const ACUTE_B: &str = "acute_b";
    pub const ACUTE_CONVERSION_FACTOR: &str = "acute_conversion_factor";

    pub const CHRONIC_M: &str = "chronic_m";
    pub const CHRONIC_B: &str = "chronic_b";
    pub const CHRONIC_CONVERSION_FACTOR: &str = "chronic_conversion_factor";
}

// ── Derived screening columns ───────────────────────────────────────────────
pub mod screening {
    pub const ACUTE_CRITERIA: &str = "acute_criteria";
    pub const CHRONIC_CRITERIA: &str = "chronic_criteria";
    pub const ACUTE_EXCEEDANCE: &str = "acute_exceedance";
    pub const CHRONIC_EXCEEDANCE: &str = "chronic_exceedance";
    pub const EXCEEDS: &str = "exceeds";

    pub const DERIVED: [&str; 5] = [
        ACUTE_CRITERIA,
        CHRONIC_CRITERIA,
        ACUTE_EXCEEDANCE,
        CHRONIC_EXCEEDANCE,
        EXCEEDS,
    ];
}

// ── PFAS export and lookup columns ──────────────────────────────────────────
pub mod pfas {
    use super::sample;

    pub const SAMPLE_PURPOSE: &str = "sample_purpose";
    pub const ANALYTIC_METHOD: &str = "analytic_method";
    pub const SHORT_NAME: &str = "short_name";
    pub const TOTAL_RESULT: &str = "total_result";

    pub const REQUIRED: [&str; 8] = [
        sample::LOCATION_ID,
        sample::SAMPLE_DATE,
        sample::SAMPLE_TYPE,
        sample::PARAMETER_NAME,
        sample::DETECTED,
        sample::REPORT_RESULT,
        SAMPLE_PURPOSE,
        ANALYTIC_METHOD,
    ];

    pub const LOOKUP_REQUIRED: [&str; 2] = [sample::PARAMETER_NAME, SHORT_NAME];
}
