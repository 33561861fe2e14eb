//! Hardness-dependent aquatic-life criteria formulas.
//!
//! Criteria are log-linear in water hardness:
//!
//! ```text
//! criteria = exp(m * ln(hardness) + b) * correction
//! ```
//!
//! where `correction` is the table conversion factor, except for Cadmium and
//! Lead which use a correction that itself depends on `ln(hardness)`.
//! Every operand is optional; a missing operand yields a missing criteria
//! value and never an exceedance.

use crate::schema::criteria::{ACUTE_LABEL, CHRONIC_LABEL};

/// Hardness cap (mg CaCO3/L) applied to Aluminum.
pub const ALUMINUM_HARDNESS_CAP: f64 = 220.0;

/// Hardness cap (mg CaCO3/L) applied to every other hardness-dependent metal.
pub const DEFAULT_HARDNESS_CAP: f64 = 400.0;

/// Metals screened against hardness-dependent criteria.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Metal {
    Aluminum,
    Cadmium,
    ChromiumIII,
    Copper,
    Lead,
    Manganese,
    Nickel,
    Silver,
    Zinc,
}

/// The eight metals screened on the filtered (dissolved) fraction.
pub const HARDNESS_DEPENDENT_METALS: [Metal; 8] = [
    Metal::Cadmium,
    Metal::ChromiumIII,
    Metal::Copper,
    Metal::Lead,
    Metal::Manganese,
    Metal::Nickel,
    Metal::Silver,
    Metal::Zinc,
];

impl Metal {
    /// Parameter name as it appears in sample data and the criteria table.
    pub fn name(self) -> &'static str {
        match self {
            Metal::Aluminum => "Aluminum",
            Metal::Cadmium => "Cadmium",
            Metal::ChromiumIII => "Chromium III",
            Metal::Copper => "Copper",
            Metal::Lead => "Lead",
            Metal::Manganese => "Manganese",
            Metal::Nickel => "Nickel",
            Metal::Silver => "Silver",
            Metal::Zinc => "Zinc",
        }
    }

    /// Look up a metal by its `parameter_name` spelling.
    pub fn from_name(name: &str) -> Option<Metal> {
        match name {
            "Aluminum" => Some(Metal::Aluminum),
            "Cadmium" => Some(Metal::Cadmium),
            "Chromium III" => Some(Metal::ChromiumIII),
            "Copper" => Some(Metal::Copper),
            "Lead" => Some(Metal::Lead),
            "Manganese" => Some(Metal::Manganese),
            "Nickel" => Some(Metal::Nickel),
            "Silver" => Some(Metal::Silver),
            "Zinc" => Some(Metal::Zinc),
            _ => None,
        }
    }

    /// Upper bound applied to hardness before evaluating this metal's criteria.
    pub fn hardness_cap(self) -> f64 {
        match self {
            Metal::Aluminum => ALUMINUM_HARDNESS_CAP,
            _ => DEFAULT_HARDNESS_CAP,
        }
    }
}

/// Acute (short-term) or chronic (long-term) criteria.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CriteriaClass {
    Acute,
    Chronic,
}

impl CriteriaClass {
    pub const ALL: [CriteriaClass; 2] = [CriteriaClass::Acute, CriteriaClass::Chronic];

    /// Class label used in the coefficient table's `criteria` column.
    pub fn label(self) -> &'static str {
        match self {
            CriteriaClass::Acute => ACUTE_LABEL,
            CriteriaClass::Chronic => CHRONIC_LABEL,
        }
    }

    /// Inverse of [`CriteriaClass::label`].
    pub fn from_label(label: &str) -> Option<CriteriaClass> {
        CriteriaClass::ALL.into_iter().find(|c| c.label() == label)
    }
}

/// One coefficient row: slope, intercept and conversion factor.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Coefficients {
    pub m: Option<f64>,
    pub b: Option<f64>,
    pub conversion_factor: Option<f64>,
}

/// Clamp hardness to the metal's cap. Values at or below the cap, unknown
/// parameters and missing hardness pass through unchanged.
pub fn clamp_hardness(parameter: &str, hardness: Option<f64>) -> Option<f64> {
    let h = hardness?;
    match Metal::from_name(parameter) {
        Some(metal) if h > metal.hardness_cap() => Some(metal.hardness_cap()),
        _ => Some(h),
    }
}

/// Correction multiplied onto the exponential term.
///
/// Cadmium and Lead ignore the table conversion factor. The chronic Lead
/// correction is the same expression as the acute one; see
/// `chronic_lead_correction_matches_acute` in the tests.
pub fn correction_factor(
    parameter: &str,
    class: CriteriaClass,
    hardness: Option<f64>,
    conversion_factor: Option<f64>,
) -> Option<f64> {
    match (Metal::from_name(parameter), class) {
        (Some(Metal::Cadmium), CriteriaClass::Acute) => {
            hardness.map(|h| 1.136672 - 0.041838 * h.ln())
        }
        (Some(Metal::Cadmium), CriteriaClass::Chronic) => {
            hardness.map(|h| 1.101672 - 0.041838 * h.ln())
        }
        (Some(Metal::Lead), _) => hardness.map(|h| 1.46203 - 0.145712 * h.ln()),
        _ => conversion_factor,
    }
}

/// Evaluate one criteria value in µg/L. `hardness` is expected to be clamped.
pub fn criteria_value(
    parameter: &str,
    class: CriteriaClass,
    hardness: Option<f64>,
    coefficients: &Coefficients,
) -> Option<f64> {
    let h = hardness?;
    let m = coefficients.m?;
    let b = coefficients.b?;
    let correction = correction_factor(parameter, class, Some(h), coefficients.conversion_factor)?;

    let value = (m * h.ln() + b).exp() * correction;
    if value.is_nan() {
        None
    } else {
        Some(value)
    }
}

/// A result exceeds its criteria only when detected and strictly greater.
pub fn is_exceedance(result: Option<f64>, criteria: Option<f64>, detected: bool) -> bool {
    match (result, criteria) {
        (Some(r), Some(c)) => detected && r > c,
        _ => false,
    }
}
