//! Data models

pub mod threat;
pub mod indicator;
pub mod analysis;

pub use threat::*;
pub use indicator::*;
pub use analysis::*;

/// Open string-keyed JSON payload (`raw_data`, `features_analyzed`)
pub type Payload = serde_json::Map<String, serde_json::Value>;

/// Unknown value for one of the fixed text enumerations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {field} '{value}'")]
pub struct ParseEnumError {
    pub field: &'static str,
    pub value: String,
}

impl ParseEnumError {
    pub fn new(field: &'static str, value: &str) -> Self {
        Self {
            field,
            value: value.to_string(),
        }
    }
}
