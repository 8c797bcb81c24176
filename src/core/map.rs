use crate::core::bounds::{bounding_box, fit_zoom, pad};
use crate::models::{Coordinate, DisplaySet, MapArtifact, Marker, TileLayer};

/// Rendering options for [`MapRenderer`]
#[derive(Debug, Clone, PartialEq)]
pub struct MapOptions {
    /// Center used when nothing was detected
    pub default_center: Coordinate,
    pub default_zoom: u8,
    /// Fraction of each span added on every side of the markers
    pub margin_ratio: f64,
    pub min_padding_deg: f64,
    pub viewport: (u32, u32),
    pub min_zoom: u8,
    pub max_zoom: u8,
    pub base_tiles: TileLayer,
    pub satellite_tiles: Option<TileLayer>,
    /// Radius of the shaded circle drawn under each marker
    pub accuracy_radius_m: f64,
}

impl Default for MapOptions {
    fn default() -> Self {
        Self {
            default_center: Coordinate::new(0.0, 0.0),
            default_zoom: 2,
            margin_ratio: 0.1,
            min_padding_deg: 0.005,
            viewport: (800, 600),
            min_zoom: 1,
            max_zoom: 16,
            base_tiles: openstreetmap_tiles(),
            satellite_tiles: Some(esri_satellite_tiles()),
            accuracy_radius_m: 180.0,
        }
    }
}

pub fn openstreetmap_tiles() -> TileLayer {
    TileLayer {
        name: "OpenStreetMap".to_string(),
        url: "https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png".to_string(),
        attribution: "&copy; OpenStreetMap contributors".to_string(),
    }
}

pub fn esri_satellite_tiles() -> TileLayer {
    TileLayer {
        name: "Esri Satellite".to_string(),
        url: "https://server.arcgisonline.com/ArcGIS/rest/services/World_Imagery/MapServer/tile/{z}/{y}/{x}"
            .to_string(),
        attribution: "Esri".to_string(),
    }
}

/// Converts a display set into a map artifact
#[derive(Debug, Clone, Default)]
pub struct MapRenderer {
    options: MapOptions,
}

impl MapRenderer {
    pub fn new(options: MapOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &MapOptions {
        &self.options
    }

    /// Render one marker per entry and fit the view around them
    ///
    /// An empty display set renders the default view with no markers.
    pub fn render(&self, display: &DisplaySet) -> MapArtifact {
        let markers: Vec<Marker> = display
            .iter()
            .map(|landmark| Marker {
                name: landmark.name.clone(),
                confidence: landmark.confidence,
                coordinate: landmark.coordinate,
                tier: landmark.tier(),
                label: landmark.label(),
                place: None,
                summary: None,
            })
            .collect();

        let coordinates: Vec<Coordinate> = markers.iter().map(|m| m.coordinate).collect();

        let (center, zoom, bounds) = match bounding_box(&coordinates) {
            Some(bbox) => {
                let padded = pad(bbox, self.options.margin_ratio, self.options.min_padding_deg);
                let zoom = fit_zoom(
                    &padded,
                    self.options.viewport,
                    self.options.min_zoom,
                    self.options.max_zoom,
                );
                (padded.center(), zoom, Some(padded))
            }
            None => (self.options.default_center, self.options.default_zoom, None),
        };

        let mut tiles = vec![self.options.base_tiles.clone()];
        tiles.extend(self.options.satellite_tiles.clone());

        tracing::debug!("Rendered map with {} markers at zoom {}", markers.len(), zoom);

        MapArtifact {
            id: uuid::Uuid::new_v4(),
            generated_at: chrono::Utc::now(),
            center,
            zoom,
            bounds,
            markers,
            tiles,
            accuracy_radius_m: self.options.accuracy_radius_m,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ConfidenceTier, LandmarkCandidate};

    fn display(entries: &[(&str, f64, f64, f64)]) -> DisplaySet {
        DisplaySet::new(
            entries
                .iter()
                .filter_map(|(name, conf, lat, lon)| {
                    LandmarkCandidate::new(*name, *conf, Some(Coordinate::new(*lat, *lon))).mapped()
                })
                .collect(),
        )
    }

    #[test]
    fn test_empty_renders_default_view() {
        let artifact = MapRenderer::default().render(&DisplaySet::empty());

        assert!(artifact.markers.is_empty());
        assert!(artifact.bounds.is_none());
        assert_eq!(artifact.center, Coordinate::new(0.0, 0.0));
        assert_eq!(artifact.zoom, 2);
    }

    #[test]
    fn test_single_marker_centered() {
        let artifact = MapRenderer::default().render(&display(&[("Eiffel Tower", 0.95, 48.8584, 2.2945)]));

        assert_eq!(artifact.markers.len(), 1);
        let marker = &artifact.markers[0];
        assert_eq!(marker.coordinate, Coordinate::new(48.8584, 2.2945));
        assert_eq!(marker.tier, ConfidenceTier::High);
        assert!((artifact.center.latitude - 48.8584).abs() < 1e-9);
        assert!((artifact.center.longitude - 2.2945).abs() < 1e-9);
    }

    #[test]
    fn test_bounds_contain_all_markers() {
        let artifact = MapRenderer::default().render(&display(&[
            ("Eiffel Tower", 0.9, 48.8584, 2.2945),
            ("Big Ben", 0.5, 51.5007, -0.1246),
            ("Colosseum", 0.2, 41.8902, 12.4922),
        ]));

        let bounds = artifact.bounds.unwrap();
        for marker in &artifact.markers {
            assert!(bounds.contains(&marker.coordinate));
        }
        // Margin keeps markers off the edge
        assert!(bounds.max_lat > 51.5007);
        assert!(bounds.min_lon < -0.1246);
        assert!(artifact.zoom < MapOptions::default().max_zoom);
    }

    #[test]
    fn test_tiles_include_satellite_when_configured() {
        let renderer = MapRenderer::new(MapOptions {
            satellite_tiles: None,
            ..Default::default()
        });
        assert_eq!(renderer.render(&DisplaySet::empty()).tiles.len(), 1);
        assert_eq!(MapRenderer::default().render(&DisplaySet::empty()).tiles.len(), 2);
    }
}
