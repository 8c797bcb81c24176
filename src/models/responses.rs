use serde::{Deserialize, Serialize};
use crate::models::domain::{MapArtifact, MappedLandmark};

/// Response for the detect endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectResponse {
    pub request_id: uuid::Uuid,
    pub landmarks: Vec<MappedLandmark>,
    /// Names reported by the service without a coordinate
    pub unmapped: Vec<String>,
    pub map: MapArtifact,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub detector: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub suggestion: Option<String>,
    pub status_code: u16,
}
