//! Portable export / import documents.
//!
//! Export format (camelCase JSON):
//!
//! ```text
//! {
//!   "version": 1,
//!   "exportedAt": 1760000000000,
//!   "brewHistory": [ ... ],
//!   "learningModel": { "<equipment>": { "<method>": { grindOffset, timeOffset, sampleCount } } }
//! }
//! ```
//!
//! Imports are checked shape-first so that the user gets a specific message
//! ("brewHistory must be an array") rather than a serde path.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::history::BrewRecord;
use crate::engine::learning::LearningModel;
use crate::error::{BrewError, Result};

/// Format version written by this build and the only one accepted on import.
pub const EXPORT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportDocument {
    pub version: u32,
    pub exported_at: u64,
    pub brew_history: Vec<BrewRecord>,
    pub learning_model: LearningModel,
}

impl ExportDocument {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Validate and parse an import document.  Nothing is applied here.
    pub fn parse(json: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(json)
            .map_err(|e| BrewError::Import(format!("not valid JSON: {}", e)))?;

        let obj = value
            .as_object()
            .ok_or_else(|| BrewError::Import("document must be a JSON object".to_string()))?;

        match obj.get("version").and_then(Value::as_u64) {
            Some(v) if v == u64::from(EXPORT_VERSION) => {}
            Some(v) => {
                return Err(BrewError::Import(format!(
                    "unsupported version {} (expected {})",
                    v, EXPORT_VERSION
                )))
            }
            None => return Err(BrewError::Import("missing or non-numeric version".to_string())),
        }

        if !obj.get("brewHistory").is_some_and(Value::is_array) {
            return Err(BrewError::Import("brewHistory must be an array".to_string()));
        }
        if !obj.get("learningModel").is_some_and(Value::is_object) {
            return Err(BrewError::Import("learningModel must be an object".to_string()));
        }

        serde_json::from_value(value)
            .map_err(|e| BrewError::Import(format!("malformed document: {}", e)))
    }
}
