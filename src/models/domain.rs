use serde::{Deserialize, Serialize};

/// Geographic coordinate in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Build a coordinate only if both components are finite and in range
    pub fn checked(latitude: f64, longitude: f64) -> Option<Self> {
        let valid = latitude.is_finite()
            && longitude.is_finite()
            && (-90.0..=90.0).contains(&latitude)
            && (-180.0..=180.0).contains(&longitude);

        valid.then_some(Self { latitude, longitude })
    }
}

/// One detection result from the recognition service
///
/// The coordinate stays `None` when the service did not supply one; it is
/// never defaulted to (0, 0).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LandmarkCandidate {
    pub name: String,
    pub confidence: f64,
    pub coordinate: Option<Coordinate>,
    #[serde(rename = "entityId", default, skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,
}

impl LandmarkCandidate {
    pub fn new(name: impl Into<String>, confidence: f64, coordinate: Option<Coordinate>) -> Self {
        Self {
            name: name.into(),
            confidence: clamp_confidence(confidence),
            coordinate,
            entity_id: None,
        }
    }

    pub fn with_entity_id(mut self, entity_id: impl Into<String>) -> Self {
        self.entity_id = Some(entity_id.into());
        self
    }

    /// Returns the mappable form of this candidate, if it has a coordinate
    pub fn mapped(&self) -> Option<MappedLandmark> {
        self.coordinate.map(|coordinate| MappedLandmark {
            name: self.name.clone(),
            confidence: self.confidence,
            coordinate,
            entity_id: self.entity_id.clone(),
        })
    }
}

fn clamp_confidence(confidence: f64) -> f64 {
    if confidence.is_nan() {
        0.0
    } else {
        confidence.clamp(0.0, 1.0)
    }
}

/// A candidate that is guaranteed to carry a coordinate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappedLandmark {
    pub name: String,
    pub confidence: f64,
    pub coordinate: Coordinate,
    #[serde(rename = "entityId", default, skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,
}

impl MappedLandmark {
    pub fn tier(&self) -> ConfidenceTier {
        ConfidenceTier::from_confidence(self.confidence)
    }

    /// Popup label, e.g. `Eiffel Tower (Matched: 95.00%)`
    pub fn label(&self) -> String {
        format!("{} (Matched: {:.2}%)", self.name, self.confidence * 100.0)
    }
}

impl From<MappedLandmark> for LandmarkCandidate {
    fn from(landmark: MappedLandmark) -> Self {
        Self {
            name: landmark.name,
            confidence: landmark.confidence,
            coordinate: Some(landmark.coordinate),
            entity_id: landmark.entity_id,
        }
    }
}

/// Ordered set of landmarks chosen for mapping
///
/// An empty set means "no landmark found", which is not an error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DisplaySet(Vec<MappedLandmark>);

impl DisplaySet {
    pub fn new(entries: Vec<MappedLandmark>) -> Self {
        Self(entries)
    }

    pub fn empty() -> Self {
        Self(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MappedLandmark> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[MappedLandmark] {
        &self.0
    }

    pub fn into_candidates(self) -> Vec<LandmarkCandidate> {
        self.0.into_iter().map(LandmarkCandidate::from).collect()
    }
}

impl<'a> IntoIterator for &'a DisplaySet {
    type Item = &'a MappedLandmark;
    type IntoIter = std::slice::Iter<'a, MappedLandmark>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Confidence band driving marker styling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceTier {
    Low,
    Medium,
    High,
}

impl ConfidenceTier {
    pub const LOW_CEILING: f64 = 0.35;
    pub const MEDIUM_CEILING: f64 = 0.65;

    pub fn from_confidence(confidence: f64) -> Self {
        if confidence < Self::LOW_CEILING {
            Self::Low
        } else if confidence < Self::MEDIUM_CEILING {
            Self::Medium
        } else {
            Self::High
        }
    }

    pub fn color(self) -> &'static str {
        match self {
            Self::Low => "red",
            Self::Medium => "yellow",
            Self::High => "green",
        }
    }

    pub fn icon(self) -> &'static str {
        match self {
            Self::Low => "cross",
            Self::Medium => "pin",
            Self::High => "star",
        }
    }
}

/// Geospatial bounding box
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl BoundingBox {
    pub fn center(&self) -> Coordinate {
        Coordinate::new(
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lon + self.max_lon) / 2.0,
        )
    }

    pub fn contains(&self, coordinate: &Coordinate) -> bool {
        coordinate.latitude >= self.min_lat
            && coordinate.latitude <= self.max_lat
            && coordinate.longitude >= self.min_lon
            && coordinate.longitude <= self.max_lon
    }
}

/// Reverse-geocoded context for a marker
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlaceDetails {
    pub city: Option<String>,
    pub country: Option<String>,
    #[serde(rename = "wikipediaUrl")]
    pub wikipedia_url: Option<String>,
}

impl PlaceDetails {
    pub fn is_empty(&self) -> bool {
        self.city.is_none() && self.country.is_none() && self.wikipedia_url.is_none()
    }
}

/// A single rendered marker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    pub name: String,
    pub confidence: f64,
    pub coordinate: Coordinate,
    pub tier: ConfidenceTier,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub place: Option<PlaceDetails>,
    /// Short description written by a language model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

/// Tile layer used by the exported map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileLayer {
    pub name: String,
    pub url: String,
    pub attribution: String,
}

/// Renderable and exportable map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapArtifact {
    pub id: uuid::Uuid,
    #[serde(rename = "generatedAt")]
    pub generated_at: chrono::DateTime<chrono::Utc>,
    pub center: Coordinate,
    pub zoom: u8,
    pub bounds: Option<BoundingBox>,
    pub markers: Vec<Marker>,
    pub tiles: Vec<TileLayer>,
    #[serde(rename = "accuracyRadiusM")]
    pub accuracy_radius_m: f64,
}
