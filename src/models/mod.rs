// Model exports
pub mod domain;
pub mod requests;
pub mod responses;

pub use domain::{
    BoundingBox, ConfidenceTier, Coordinate, DisplaySet, LandmarkCandidate, MapArtifact,
    MappedLandmark, Marker, PlaceDetails, TileLayer,
};
pub use requests::DetectQuery;
pub use responses::{DetectResponse, ErrorResponse, HealthResponse};
