//! Surface-water screening tools.
//!
//! - Hardness criteria screening: flag filtered metal results that exceed
//!   hardness-dependent acute or chronic aquatic-life criteria.
//! - PFAS chart: stacked bar chart of detected PFAS results by location,
//!   faceted by sample type.

pub mod coefficients;
pub mod config;
pub mod criteria;
pub mod error;
pub mod loader;
pub mod model;
pub mod pfas;
pub mod schema;
pub mod screening;
pub mod spreadsheet;
pub mod visualization;

pub use coefficients::{CriteriaOptions, CriteriaTables};
pub use config::Config;
pub use criteria::{CriteriaClass, Metal};
pub use error::ScreenError;
pub use model::ScreeningModel;
pub use screening::ScreeningSummary;
