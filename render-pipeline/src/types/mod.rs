pub mod kpi_set;
pub mod scene_plan;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

pub use kpi_set::KpiSet;
pub use scene_plan::{KpiCallout, Scene, ScenePlan};

/// Normalized output of the document extraction stage.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ParsedDocument {
    /// Extracted text; empty when the document has no readable text.
    #[serde(default)]
    pub text: String,
    /// Structured entities, when the extraction service returns any.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entities: Vec<serde_json::Value>,
}

impl ParsedDocument {
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            entities: Vec::new(),
        }
    }
}

/// A fully downloaded clip for one scene.
#[derive(Debug, Clone)]
pub struct Clip {
    pub bytes: Bytes,
    pub duration_secs: f64,
    pub content_type: String,
}
