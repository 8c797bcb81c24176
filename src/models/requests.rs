use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::core::selector::Strategy;

/// Query parameters accepted alongside an uploaded image
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct DetectQuery {
    #[validate(range(min = 0.0, max = 1.0))]
    #[serde(alias = "minConfidence", rename = "min_confidence", default)]
    pub min_confidence: Option<f64>,
    #[serde(default)]
    pub strategy: Option<Strategy>,
    #[validate(range(min = 1, max = 100))]
    #[serde(alias = "maxMarkers", rename = "max_markers", default)]
    pub max_markers: Option<usize>,
}
