//! Landmarker - landmark detection to map service
//!
//! Takes a photo, asks an image-recognition service which landmarks it shows,
//! and places the ones with known coordinates on an interactive map.

pub mod config;
pub mod core;
pub mod models;
pub mod routes;
pub mod services;

// Re-export commonly used types
pub use crate::core::{MapOptions, MapRenderer, Pipeline, PipelineError, ResultSelector, SelectionPolicy, Strategy};
pub use crate::models::{Coordinate, DisplaySet, LandmarkCandidate, MapArtifact, MappedLandmark};
pub use crate::services::{CloudVisionClient, Credential, DetectionError, LandmarkDetector, StaticDetector};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_exports() {
        let candidates = vec![LandmarkCandidate::new("Maiden Tower", 0.87, Some(Coordinate::new(40.3661, 49.8372)))];
        let display = ResultSelector::default().select(&candidates);
        let artifact = MapRenderer::default().render(&display);

        assert_eq!(artifact.markers.len(), 1);
    }
}
