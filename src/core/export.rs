//! Standalone exports of a [`MapArtifact`]
//!
//! The HTML export is a single Leaflet page that needs nothing but the
//! Leaflet CDN assets; marker data is embedded as JSON and popups are built
//! with DOM text nodes, so landmark names never reach the page as markup.

use std::path::Path;
use serde_json::{json, Value};
use crate::models::MapArtifact;

/// File name offered for downloads
pub const EXPORT_FILE_NAME: &str = "landmarks-map.html";

const LEAFLET_VERSION: &str = "1.9.4";

const HTML_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Landmarker map</title>
    <link rel="stylesheet" href="https://unpkg.com/leaflet@__LEAFLET__/dist/leaflet.css">
    <script src="https://unpkg.com/leaflet@__LEAFLET__/dist/leaflet.js"></script>
    <style>
        html, body, #map { height: 100%; margin: 0; }
        .legend { background: #fff; padding: 6px 10px; border-radius: 4px; font: 12px sans-serif; }
        .legend-bar { width: 160px; height: 10px; background: linear-gradient(to right, red, yellow, green); }
        .legend-scale { display: flex; justify-content: space-between; }
        .landmark-icon { background: none; border: none; }
    </style>
</head>
<body>
<div id="map"></div>
<script>
const ARTIFACT = __ARTIFACT__;

const ICONS = {
    pin: (c) => `<svg xmlns="http://www.w3.org/2000/svg" width="30" height="30" viewBox="0 0 24 24" fill="none" stroke="${c}" stroke-width="2" stroke-linecap="round" stroke-linejoin="round"><path d="M21 10c0 7-9 13-9 13s-9-6-9-13a9 9 0 0 1 18 0z"></path><circle cx="12" cy="10" r="3" fill="${c}"></circle></svg>`,
    star: (c) => `<svg xmlns="http://www.w3.org/2000/svg" width="30" height="30" viewBox="0 0 24 24" fill="${c}" stroke="${c}" stroke-width="2" stroke-linecap="round" stroke-linejoin="round"><polygon points="12 2 15.09 8.5 22 9.27 17 14 18.18 21 12 17.77 5.82 21 7 14 2 9.27 8.91 8.5 12 2"></polygon></svg>`,
    cross: (c) => `<svg xmlns="http://www.w3.org/2000/svg" width="30" height="30" viewBox="0 0 24 24" fill="${c}" stroke="${c}" stroke-width="2" stroke-linecap="round" stroke-linejoin="round"><line x1="18" y1="6" x2="6" y2="18"></line><line x1="6" y1="6" x2="18" y2="18"></line></svg>`
};

const map = L.map('map', {
    center: [ARTIFACT.center.latitude, ARTIFACT.center.longitude],
    zoom: ARTIFACT.zoom
});

const layers = {};
ARTIFACT.tiles.forEach((tile, i) => {
    const layer = L.tileLayer(tile.url, { attribution: tile.attribution, maxZoom: 19 });
    if (i === 0) { layer.addTo(map); }
    layers[tile.name] = layer;
});
if (ARTIFACT.tiles.length > 1) { L.control.layers(layers).addTo(map); }

function popupFor(marker) {
    const root = document.createElement('div');
    const name = document.createElement('strong');
    name.textContent = marker.name;
    root.appendChild(name);
    root.appendChild(document.createElement('br'));
    const score = document.createElement('em');
    score.textContent = `Matched: ${(marker.confidence * 100).toFixed(2)}%`;
    root.appendChild(score);
    const place = marker.place || {};
    const where = [place.city, place.country].filter(Boolean).join(', ');
    if (where) {
        root.appendChild(document.createElement('br'));
        root.appendChild(document.createTextNode(where));
    }
    if (place.wikipediaUrl) {
        root.appendChild(document.createElement('br'));
        const link = document.createElement('a');
        link.href = place.wikipediaUrl;
        link.target = '_blank';
        link.rel = 'noopener';
        link.textContent = 'Wikipedia';
        root.appendChild(link);
    }
    if (marker.summary) {
        const text = document.createElement('p');
        text.textContent = marker.summary;
        root.appendChild(text);
    }
    return root;
}

ARTIFACT.markers.forEach((marker) => {
    const latlng = [marker.coordinate.latitude, marker.coordinate.longitude];
    const color = marker.color;
    L.circle(latlng, {
        radius: ARTIFACT.accuracyRadiusM,
        color: color,
        fill: true,
        fillColor: color,
        opacity: 0.5
    }).bindPopup('Accuracy').addTo(map);
    const icon = L.divIcon({
        html: ICONS[marker.icon](color),
        className: 'landmark-icon',
        iconSize: [30, 30],
        iconAnchor: [15, 15]
    });
    L.marker(latlng, { icon: icon, title: marker.label })
        .bindPopup(popupFor(marker), { maxWidth: 200 })
        .addTo(map);
});

if (ARTIFACT.bounds) {
    const b = ARTIFACT.bounds;
    map.fitBounds([[b.min_lat, b.min_lon], [b.max_lat, b.max_lon]]);
}

const legend = L.control({ position: 'bottomright' });
legend.onAdd = function () {
    const div = L.DomUtil.create('div', 'legend');
    div.innerHTML = '<div>Similarity score</div><div class="legend-bar"></div><div class="legend-scale"><span>0</span><span>50</span><span>100</span></div>';
    return div;
};
legend.addTo(map);
</script>
</body>
</html>
"#;

impl MapArtifact {
    /// Render the artifact as a self-contained HTML page
    pub fn to_html(&self) -> String {
        HTML_TEMPLATE
            .replace("__LEAFLET__", LEAFLET_VERSION)
            .replace("__ARTIFACT__", &script_safe_json(&self.page_data()))
    }

    /// Export markers as a GeoJSON `FeatureCollection`
    pub fn to_geojson(&self) -> Value {
        let features: Vec<Value> = self
            .markers
            .iter()
            .map(|marker| {
                let mut properties = json!({
                    "name": marker.name,
                    "confidence": marker.confidence,
                    "tier": marker.tier,
                    "label": marker.label,
                });
                if let Some(place) = &marker.place {
                    properties["place"] = json!(place);
                }
                if let Some(summary) = &marker.summary {
                    properties["summary"] = json!(summary);
                }

                json!({
                    "type": "Feature",
                    // GeoJSON positions are [longitude, latitude]
                    "geometry": {
                        "type": "Point",
                        "coordinates": [marker.coordinate.longitude, marker.coordinate.latitude],
                    },
                    "properties": properties,
                })
            })
            .collect();

        let mut collection = json!({
            "type": "FeatureCollection",
            "features": features,
        });
        if let Some(b) = &self.bounds {
            collection["bbox"] = json!([b.min_lon, b.min_lat, b.max_lon, b.max_lat]);
        }
        collection
    }

    /// Write the HTML export to `path`
    pub fn save_html<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        let path = path.as_ref();
        std::fs::write(path, self.to_html())?;
        tracing::info!("Saved map artifact {} to {}", self.id, path.display());
        Ok(())
    }

    fn page_data(&self) -> Value {
        let markers: Vec<Value> = self
            .markers
            .iter()
            .map(|marker| {
                json!({
                    "name": marker.name,
                    "confidence": marker.confidence,
                    "coordinate": marker.coordinate,
                    "label": marker.label,
                    "color": marker.tier.color(),
                    "icon": marker.tier.icon(),
                    "place": marker.place,
                    "summary": marker.summary,
                })
            })
            .collect();

        json!({
            "center": self.center,
            "zoom": self.zoom,
            "bounds": self.bounds,
            "tiles": self.tiles,
            "markers": markers,
            "accuracyRadiusM": self.accuracy_radius_m,
        })
    }
}

/// Serialize JSON so it can sit inside a `<script>` element
///
/// `<`, `>` and `&` only occur inside string literals in JSON output, where
/// their `\u` escapes are equivalent.
fn script_safe_json(value: &Value) -> String {
    value
        .to_string()
        .replace('<', "\\u003c")
        .replace('>', "\\u003e")
        .replace('&', "\\u0026")
}
