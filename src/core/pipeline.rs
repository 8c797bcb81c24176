use futures::future::join_all;
use std::sync::Arc;
use thiserror::Error;
use tracing::Instrument;

use crate::core::ingest::{ingest, IngestError};
use crate::core::map::MapRenderer;
use crate::core::selector::{unmapped, ResultSelector, SelectionPolicy};
use crate::models::{DisplaySet, LandmarkCandidate, MapArtifact, Marker};
use crate::services::{DetectionError, LandmarkDetector, LandmarkSummarizer, PlaceLookup};

/// Failure of a pipeline run
///
/// Stage errors pass through unchanged; "no landmark found" is not an error.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    InvalidImage(#[from] IngestError),

    #[error(transparent)]
    Detection(#[from] DetectionError),
}

impl PipelineError {
    pub fn suggestion(&self) -> &'static str {
        match self {
            Self::InvalidImage(e) => e.suggestion(),
            Self::Detection(e) => e.suggestion(),
        }
    }
}

/// Everything produced by one run
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub request_id: uuid::Uuid,
    /// Candidates exactly as the detector reported them
    pub candidates: Vec<LandmarkCandidate>,
    pub unmapped: Vec<String>,
    pub display: DisplaySet,
    pub artifact: MapArtifact,
}

/// Image-to-map orchestrator
///
/// # Stages
/// 1. Ingest: validate and decode the upload
/// 2. Detect: ask the recognition service for landmarks
/// 3. Select: threshold, order and cap
/// 4. Render: build the map artifact (optionally with place context)
///
/// Each run is independent; nothing is cached between runs.
#[derive(Clone)]
pub struct Pipeline {
    detector: Arc<dyn LandmarkDetector>,
    selector: ResultSelector,
    renderer: MapRenderer,
    places: Option<Arc<PlaceLookup>>,
    summarizer: Option<Arc<dyn LandmarkSummarizer>>,
}

impl Pipeline {
    pub fn new(detector: Arc<dyn LandmarkDetector>, selector: ResultSelector, renderer: MapRenderer) -> Self {
        Self {
            detector,
            selector,
            renderer,
            places: None,
            summarizer: None,
        }
    }

    pub fn with_places(mut self, places: Arc<PlaceLookup>) -> Self {
        self.places = Some(places);
        self
    }

    pub fn with_summarizer(mut self, summarizer: Arc<dyn LandmarkSummarizer>) -> Self {
        self.summarizer = Some(summarizer);
        self
    }

    pub fn detector_name(&self) -> &'static str {
        self.detector.name()
    }

    pub fn default_policy(&self) -> &SelectionPolicy {
        self.selector.policy()
    }

    /// Run all stages for one upload
    ///
    /// `policy` replaces the configured selection policy for this run only.
    /// Dropping the returned future cancels an in-flight detection call.
    pub async fn run(
        &self,
        raw: Vec<u8>,
        declared_type: &str,
        policy: Option<SelectionPolicy>,
    ) -> Result<PipelineOutcome, PipelineError> {
        let request_id = uuid::Uuid::new_v4();
        let span = tracing::info_span!("pipeline", %request_id, detector = self.detector.name());

        self.run_stages(request_id, raw, declared_type, policy)
            .instrument(span)
            .await
    }

    async fn run_stages(
        &self,
        request_id: uuid::Uuid,
        raw: Vec<u8>,
        declared_type: &str,
        policy: Option<SelectionPolicy>,
    ) -> Result<PipelineOutcome, PipelineError> {
        // Stage 1
        let image = ingest(raw, declared_type).map_err(|e| {
            tracing::info!("Rejected upload: {}", e);
            e
        })?;

        // Stage 2
        let candidates = self.detector.detect(&image).await.map_err(|e| {
            tracing::error!("Detection failed: {}", e);
            e
        })?;

        // Stage 3
        let selected = match policy {
            Some(policy) => ResultSelector::new(policy).select(&candidates),
            None => self.selector.select(&candidates),
        };
        let unmapped = unmapped(&candidates);

        // Stage 4
        let mut artifact = self.renderer.render(&selected);
        self.enrich(&mut artifact.markers).await;

        let (detected, mapped) = (candidates.len(), selected.len());
        tracing::info!(
            "Detected {} landmarks, mapped {} ({} without coordinates)",
            detected,
            mapped,
            unmapped.len()
        );

        Ok(PipelineOutcome {
            request_id,
            candidates,
            unmapped,
            display: selected,
            artifact,
        })
    }

    /// Best-effort place context for every marker and a summary of the top one
    ///
    /// All lookups run concurrently, so the added latency is bounded by the
    /// slowest single lookup.
    async fn enrich(&self, markers: &mut [Marker]) {
        let places = async {
            match &self.places {
                Some(places) => join_all(markers.iter().map(|m| places.details(&m.name, m.coordinate))).await,
                None => Vec::new(),
            }
        };

        let summary = async {
            let (Some(summarizer), Some(top)) = (&self.summarizer, markers.first()) else {
                return None;
            };
            match summarizer.summarize(&top.name, None).await {
                Ok(text) => Some(text),
                Err(e) => {
                    tracing::warn!("Summary failed for {}: {}", top.name, e);
                    None
                }
            }
        };

        let (details, summary) = tokio::join!(places, summary);

        for (marker, details) in markers.iter_mut().zip(details) {
            if !details.is_empty() {
                marker.place = Some(details);
            }
        }
        if let Some(top) = markers.first_mut() {
            top.summary = summary;
        }
    }
}
