// Core pipeline exports
pub mod bounds;
pub mod export;
pub mod ingest;
pub mod map;
pub mod pipeline;
pub mod selector;

pub use bounds::{bounding_box, fit_zoom, pad};
pub use export::EXPORT_FILE_NAME;
pub use ingest::{ingest, IngestError, UploadedImage};
pub use map::{MapOptions, MapRenderer};
pub use pipeline::{Pipeline, PipelineError, PipelineOutcome};
pub use selector::{unmapped, ResultSelector, SelectionPolicy, Strategy};
