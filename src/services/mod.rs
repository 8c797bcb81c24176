// Service exports
pub mod places;
pub mod summary;
pub mod vision;

pub use places::{PlaceLookup, PlaceLookupError, PlaceLookupOptions};
pub use summary::{ChatSummaryClient, LandmarkSummarizer, StaticSummarizer, SummaryError, SummaryOptions};
pub use vision::{
    CloudVisionClient, CloudVisionOptions, Credential, DetectionError, LandmarkDetector, StaticDetector,
};
