use geo::{BoundingRect, MultiPoint, Point};
use crate::models::{BoundingBox, Coordinate};

/// Latitude limit of the web-mercator projection used by tile maps
const MERCATOR_MAX_LAT: f64 = 85.051_128_78;

/// Tile edge length in pixels
const TILE_SIZE: f64 = 256.0;

/// Compute the bounding box around a set of coordinates
///
/// Returns `None` for an empty input.
pub fn bounding_box(coordinates: &[Coordinate]) -> Option<BoundingBox> {
    let points: MultiPoint<f64> = coordinates
        .iter()
        .map(|c| Point::new(c.longitude, c.latitude))
        .collect();

    points.bounding_rect().map(|rect| BoundingBox {
        min_lat: rect.min().y,
        max_lat: rect.max().y,
        min_lon: rect.min().x,
        max_lon: rect.max().x,
    })
}

/// Grow a bounding box by `margin_ratio` of each span
///
/// Each side grows by at least `min_padding_deg`, so a single point still
/// yields a box with area.
pub fn pad(bbox: BoundingBox, margin_ratio: f64, min_padding_deg: f64) -> BoundingBox {
    let lat_pad = ((bbox.max_lat - bbox.min_lat) * margin_ratio).max(min_padding_deg);
    let lon_pad = ((bbox.max_lon - bbox.min_lon) * margin_ratio).max(min_padding_deg);

    BoundingBox {
        min_lat: (bbox.min_lat - lat_pad).max(-90.0),
        max_lat: (bbox.max_lat + lat_pad).min(90.0),
        min_lon: (bbox.min_lon - lon_pad).max(-180.0),
        max_lon: (bbox.max_lon + lon_pad).min(180.0),
    }
}

/// Largest zoom level at which `bbox` fits a viewport of the given size
///
/// Uses the web-mercator tile pyramid (256 px tiles, zoom 0 = whole world in
/// one tile). The result is clamped to `[min_zoom, max_zoom]`.
pub fn fit_zoom(bbox: &BoundingBox, viewport: (u32, u32), min_zoom: u8, max_zoom: u8) -> u8 {
    let (width, height) = (viewport.0.max(1) as f64, viewport.1.max(1) as f64);

    let lon_fraction = (bbox.max_lon - bbox.min_lon) / 360.0;
    let lat_fraction = (mercator_y(bbox.max_lat) - mercator_y(bbox.min_lat)) / (2.0 * std::f64::consts::PI);

    let zoom_for = |pixels: f64, fraction: f64| {
        if fraction <= 0.0 {
            f64::INFINITY
        } else {
            (pixels / TILE_SIZE / fraction).log2()
        }
    };

    let zoom = zoom_for(width, lon_fraction).min(zoom_for(height, lat_fraction));

    if !zoom.is_finite() {
        return max_zoom;
    }

    // `max_zoom` wins over an inverted range instead of panicking like `clamp`
    (zoom.floor().max(0.0) as u8).max(min_zoom).min(max_zoom)
}

#[inline]
fn mercator_y(latitude: f64) -> f64 {
    let lat = latitude.clamp(-MERCATOR_MAX_LAT, MERCATOR_MAX_LAT).to_radians();
    (std::f64::consts::FRAC_PI_4 + lat / 2.0).tan().ln()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounding_box_of_points() {
        let bbox = bounding_box(&[
            Coordinate::new(48.8584, 2.2945),
            Coordinate::new(51.5007, -0.1246),
        ])
        .unwrap();

        assert_eq!(bbox.min_lat, 48.8584);
        assert_eq!(bbox.max_lat, 51.5007);
        assert_eq!(bbox.min_lon, -0.1246);
        assert_eq!(bbox.max_lon, 2.2945);
    }

    #[test]
    fn test_empty_has_no_bounds() {
        assert!(bounding_box(&[]).is_none());
    }

    #[test]
    fn test_single_point_padding() {
        let point = Coordinate::new(40.3661, 49.8372);
        let bbox = pad(bounding_box(&[point]).unwrap(), 0.1, 0.005);

        assert!(bbox.contains(&point));
        assert!((bbox.max_lat - bbox.min_lat - 0.01).abs() < 1e-9);
    }

    #[test]
    fn test_padding_clamped_to_globe() {
        let bbox = pad(
            BoundingBox { min_lat: -89.0, max_lat: 89.0, min_lon: -179.0, max_lon: 179.0 },
            0.5,
            0.0,
        );
        assert_eq!(bbox.min_lat, -90.0);
        assert_eq!(bbox.max_lon, 180.0);
    }

    #[test]
    fn test_whole_world_is_low_zoom() {
        let world = BoundingBox { min_lat: -80.0, max_lat: 80.0, min_lon: -180.0, max_lon: 180.0 };
        assert!(fit_zoom(&world, (800, 600), 1, 16) <= 2);
    }

    #[test]
    fn test_city_block_hits_max_zoom() {
        let block = pad(bounding_box(&[Coordinate::new(48.8584, 2.2945)]).unwrap(), 0.1, 0.0005);
        assert_eq!(fit_zoom(&block, (800, 600), 1, 16), 16);
    }

    #[test]
    fn test_zoom_decreases_with_span() {
        let narrow = BoundingBox { min_lat: 48.0, max_lat: 49.0, min_lon: 2.0, max_lon: 3.0 };
        let wide = BoundingBox { min_lat: 40.0, max_lat: 55.0, min_lon: -5.0, max_lon: 15.0 };
        assert!(fit_zoom(&narrow, (800, 600), 1, 16) > fit_zoom(&wide, (800, 600), 1, 16));
    }

    #[test]
    fn test_inverted_zoom_range_does_not_panic() {
        let bbox = pad(bounding_box(&[Coordinate::new(10.0, 10.0), Coordinate::new(60.0, 80.0)]).unwrap(), 0.1, 0.005);
        assert_eq!(fit_zoom(&bbox, (800, 600), 12, 4), 4);
    }
}
