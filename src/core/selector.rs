use serde::{Deserialize, Serialize};
use crate::models::{DisplaySet, LandmarkCandidate, MappedLandmark};

/// How many landmarks survive selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Every candidate meeting the threshold
    #[default]
    All,
    /// Only the highest-confidence candidate
    Best,
}

/// Selection policy applied to the detector's candidates
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectionPolicy {
    /// Inclusive lower bound on confidence; `None` keeps everything
    pub min_confidence: Option<f64>,
    pub strategy: Strategy,
    pub max_markers: Option<usize>,
}

impl SelectionPolicy {
    /// Replace any field the caller supplied, keep the rest
    pub fn with_overrides(
        &self,
        min_confidence: Option<f64>,
        strategy: Option<Strategy>,
        max_markers: Option<usize>,
    ) -> Self {
        Self {
            min_confidence: min_confidence.or(self.min_confidence),
            strategy: strategy.unwrap_or(self.strategy),
            max_markers: max_markers.or(self.max_markers),
        }
    }
}

/// Turns raw candidates into the display set
///
/// # Stages
/// 1. Drop candidates without a coordinate
/// 2. Confidence threshold
/// 3. Stable sort by confidence (descending)
/// 4. Strategy / cap
#[derive(Debug, Clone, Default)]
pub struct ResultSelector {
    policy: SelectionPolicy,
}

impl ResultSelector {
    pub fn new(policy: SelectionPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &SelectionPolicy {
        &self.policy
    }

    /// Select the landmarks to map
    pub fn select(&self, candidates: &[LandmarkCandidate]) -> DisplaySet {
        let mut selected: Vec<MappedLandmark> = candidates
            .iter()
            // Stage 1: mapping needs a coordinate
            .filter_map(LandmarkCandidate::mapped)
            // Stage 2: threshold
            .filter(|landmark| self.meets_threshold(landmark.confidence))
            .collect();

        // Stage 3: `sort_by` is stable, so ties keep service order
        selected.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        // Stage 4
        let cap = match self.policy.strategy {
            Strategy::Best => Some(1),
            Strategy::All => self.policy.max_markers,
        };
        if let Some(cap) = cap {
            selected.truncate(cap);
        }

        tracing::debug!(
            "Selected {} of {} candidates (policy: {:?})",
            selected.len(),
            candidates.len(),
            self.policy
        );

        DisplaySet::new(selected)
    }

    #[inline]
    fn meets_threshold(&self, confidence: f64) -> bool {
        self.policy
            .min_confidence
            .map_or(true, |threshold| confidence >= threshold)
    }
}

/// Names of candidates that cannot be mapped, in service order
pub fn unmapped(candidates: &[LandmarkCandidate]) -> Vec<String> {
    candidates
        .iter()
        .filter(|c| c.coordinate.is_none())
        .map(|c| c.name.clone())
        .collect()
}
