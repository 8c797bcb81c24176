use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::core::map::{esri_satellite_tiles, MapOptions};
use crate::core::selector::{SelectionPolicy, Strategy};
use crate::models::{Coordinate, TileLayer};
use crate::services::{CloudVisionOptions, PlaceLookupOptions, SummaryOptions};
use crate::services::vision::DEFAULT_MAX_RESPONSE_BYTES;

/// Application configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub vision: VisionSettings,
    #[serde(default)]
    pub selection: SelectionSettings,
    #[serde(default)]
    pub map: MapSettings,
    #[serde(default)]
    pub places: PlacesSettings,
    #[serde(default)]
    pub summary: SummarySettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub workers: Option<usize>,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            workers: None,
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }
fn default_max_upload_bytes() -> usize { 10 * 1024 * 1024 }

/// Which detector backs the pipeline
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectorMode {
    #[default]
    Cloud,
    /// Fixed demo answer, no network
    Static,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VisionSettings {
    #[serde(default)]
    pub mode: DetectorMode,
    #[serde(default = "default_vision_endpoint")]
    pub endpoint: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_vision_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_max_results")]
    pub max_results: u32,
    #[serde(default = "default_max_response_bytes")]
    pub max_response_bytes: usize,
}

impl Default for VisionSettings {
    fn default() -> Self {
        Self {
            mode: DetectorMode::default(),
            endpoint: default_vision_endpoint(),
            api_key: None,
            timeout_secs: default_vision_timeout(),
            connect_timeout_secs: default_connect_timeout(),
            max_results: default_max_results(),
            max_response_bytes: default_max_response_bytes(),
        }
    }
}

impl VisionSettings {
    pub fn options(&self) -> CloudVisionOptions {
        CloudVisionOptions {
            endpoint: self.endpoint.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            max_results: self.max_results,
            max_response_bytes: self.max_response_bytes,
        }
    }
}

fn default_vision_endpoint() -> String { "https://vision.googleapis.com".to_string() }
fn default_vision_timeout() -> u64 { 10 }
fn default_connect_timeout() -> u64 { 5 }
fn default_max_results() -> u32 { 10 }
fn default_max_response_bytes() -> usize { DEFAULT_MAX_RESPONSE_BYTES }

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SelectionSettings {
    pub min_confidence: Option<f64>,
    #[serde(default)]
    pub strategy: Strategy,
    pub max_markers: Option<usize>,
}

impl SelectionSettings {
    pub fn policy(&self) -> SelectionPolicy {
        SelectionPolicy {
            min_confidence: self.min_confidence,
            strategy: self.strategy,
            max_markers: self.max_markers,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MapSettings {
    #[serde(default)]
    pub default_latitude: f64,
    #[serde(default)]
    pub default_longitude: f64,
    #[serde(default = "default_zoom")]
    pub default_zoom: u8,
    #[serde(default = "default_margin_ratio")]
    pub margin_ratio: f64,
    #[serde(default = "default_min_padding")]
    pub min_padding_deg: f64,
    #[serde(default = "default_viewport_width")]
    pub viewport_width: u32,
    #[serde(default = "default_viewport_height")]
    pub viewport_height: u32,
    #[serde(default = "default_min_zoom")]
    pub min_zoom: u8,
    #[serde(default = "default_max_zoom")]
    pub max_zoom: u8,
    #[serde(default = "default_tile_url")]
    pub tile_url: String,
    #[serde(default = "default_tile_attribution")]
    pub tile_attribution: String,
    #[serde(default = "default_true")]
    pub satellite: bool,
    #[serde(default = "default_accuracy_radius")]
    pub accuracy_radius_m: f64,
}

impl Default for MapSettings {
    fn default() -> Self {
        Self {
            default_latitude: 0.0,
            default_longitude: 0.0,
            default_zoom: default_zoom(),
            margin_ratio: default_margin_ratio(),
            min_padding_deg: default_min_padding(),
            viewport_width: default_viewport_width(),
            viewport_height: default_viewport_height(),
            min_zoom: default_min_zoom(),
            max_zoom: default_max_zoom(),
            tile_url: default_tile_url(),
            tile_attribution: default_tile_attribution(),
            satellite: true,
            accuracy_radius_m: default_accuracy_radius(),
        }
    }
}

impl MapSettings {
    pub fn options(&self) -> MapOptions {
        MapOptions {
            default_center: Coordinate::new(self.default_latitude, self.default_longitude),
            default_zoom: self.default_zoom,
            margin_ratio: self.margin_ratio,
            min_padding_deg: self.min_padding_deg,
            viewport: (self.viewport_width, self.viewport_height),
            min_zoom: self.min_zoom,
            max_zoom: self.max_zoom,
            base_tiles: TileLayer {
                name: "Map".to_string(),
                url: self.tile_url.clone(),
                attribution: self.tile_attribution.clone(),
            },
            satellite_tiles: self.satellite.then(esri_satellite_tiles),
            accuracy_radius_m: self.accuracy_radius_m,
        }
    }
}

fn default_zoom() -> u8 { 2 }
fn default_margin_ratio() -> f64 { 0.1 }
fn default_min_padding() -> f64 { 0.005 }
fn default_viewport_width() -> u32 { 800 }
fn default_viewport_height() -> u32 { 600 }
fn default_min_zoom() -> u8 { 1 }
fn default_max_zoom() -> u8 { 16 }
fn default_tile_url() -> String { "https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png".to_string() }
fn default_tile_attribution() -> String { "&copy; OpenStreetMap contributors".to_string() }
fn default_accuracy_radius() -> f64 { 180.0 }
fn default_true() -> bool { true }

#[derive(Debug, Clone, Deserialize)]
pub struct PlacesSettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_nominatim_endpoint")]
    pub nominatim_endpoint: String,
    #[serde(default = "default_wikipedia_endpoint")]
    pub wikipedia_endpoint: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_places_timeout")]
    pub timeout_secs: u64,
}

impl Default for PlacesSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            nominatim_endpoint: default_nominatim_endpoint(),
            wikipedia_endpoint: default_wikipedia_endpoint(),
            user_agent: default_user_agent(),
            timeout_secs: default_places_timeout(),
        }
    }
}

impl PlacesSettings {
    pub fn options(&self) -> PlaceLookupOptions {
        PlaceLookupOptions {
            nominatim_endpoint: self.nominatim_endpoint.clone(),
            wikipedia_endpoint: self.wikipedia_endpoint.clone(),
            user_agent: self.user_agent.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }
}

fn default_nominatim_endpoint() -> String { "https://nominatim.openstreetmap.org".to_string() }
fn default_wikipedia_endpoint() -> String { "https://en.wikipedia.org".to_string() }
fn default_user_agent() -> String { "landmarker".to_string() }
fn default_places_timeout() -> u64 { 5 }

/// Which summarizer backs landmark descriptions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SummaryMode {
    #[default]
    Cloud,
    /// Canned text, no network
    Static,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SummarySettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub mode: SummaryMode,
    #[serde(default = "default_summary_endpoint")]
    pub endpoint: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_summary_model")]
    pub model: String,
    #[serde(default = "default_summary_temperature")]
    pub temperature: f32,
    #[serde(default = "default_summary_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_summary_timeout")]
    pub timeout_secs: u64,
}

impl Default for SummarySettings {
    fn default() -> Self {
        Self {
            enabled: false,
            mode: SummaryMode::default(),
            endpoint: default_summary_endpoint(),
            api_key: None,
            model: default_summary_model(),
            temperature: default_summary_temperature(),
            max_tokens: default_summary_max_tokens(),
            timeout_secs: default_summary_timeout(),
        }
    }
}

impl SummarySettings {
    pub fn options(&self) -> SummaryOptions {
        SummaryOptions {
            endpoint: self.endpoint.clone(),
            model: self.model.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }
}

fn default_summary_endpoint() -> String { "https://api.openai.com".to_string() }
fn default_summary_model() -> String { "gpt-3.5-turbo-0125".to_string() }
fn default_summary_temperature() -> f32 { 0.2 }
fn default_summary_max_tokens() -> u32 { 150 }
fn default_summary_timeout() -> u64 { 15 }

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> String { "json".to_string() }

impl Settings {
    /// Load configuration from file and environment variables
    ///
    /// Configuration is loaded in the following order (later overrides earlier):
    /// 1. Default values in the struct
    /// 2. Configuration file (config/default.toml)
    /// 3. Local overrides (config/local.toml)
    /// 4. Environment variables (prefixed with LANDMARKER)
    pub fn load() -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // e.g., LANDMARKER__SERVER__PORT -> server.port
            .add_source(env_source())
            .build()?;

        Self::finish(settings, |name| std::env::var(name).ok())
    }

    /// Load configuration from a custom path
    ///
    /// Environment overrides and key fallbacks apply exactly as in [`Settings::load`].
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        Self::load_from_with(path, |name| std::env::var(name).ok())
    }

    fn load_from_with<P, F>(path: P, lookup: F) -> Result<Self, ConfigError>
    where
        P: AsRef<Path>,
        F: Fn(&str) -> Option<String>,
    {
        let settings = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(env_source())
            .build()?;

        Self::finish(settings, lookup)
    }

    fn finish<F>(settings: Config, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let settings = substitute_env_vars(settings, lookup)?;

        let settings: Settings = settings.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject settings that would make the pipeline misbehave at request time
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(threshold) = self.selection.min_confidence {
            if !(0.0..=1.0).contains(&threshold) {
                return Err(ConfigError::Message(format!(
                    "selection.min_confidence must be within [0, 1], got {}",
                    threshold
                )));
            }
        }

        if self.map.min_zoom > self.map.max_zoom {
            return Err(ConfigError::Message(format!(
                "map.min_zoom ({}) exceeds map.max_zoom ({})",
                self.map.min_zoom, self.map.max_zoom
            )));
        }

        if self.map.viewport_width == 0 || self.map.viewport_height == 0 {
            return Err(ConfigError::Message("map viewport must be non-zero".to_string()));
        }

        if self.map.margin_ratio < 0.0 || self.map.min_padding_deg < 0.0 {
            return Err(ConfigError::Message("map margins must not be negative".to_string()));
        }

        let has_key = self
            .vision
            .api_key
            .as_deref()
            .is_some_and(|k| !k.trim().is_empty());
        if self.vision.mode == DetectorMode::Cloud && !has_key {
            return Err(ConfigError::Message(
                "vision.api_key is required when vision.mode = \"cloud\" \
                 (set LANDMARKER__VISION__API_KEY or GOOGLE_VISION_API_KEY)"
                    .to_string(),
            ));
        }

        let has_summary_key = self
            .summary
            .api_key
            .as_deref()
            .is_some_and(|k| !k.trim().is_empty());
        if self.summary.enabled && self.summary.mode == SummaryMode::Cloud && !has_summary_key {
            return Err(ConfigError::Message(
                "summary.api_key is required when summaries are enabled in cloud mode \
                 (set LANDMARKER__SUMMARY__API_KEY or OPENAI_API_KEY)"
                    .to_string(),
            ));
        }

        Ok(())
    }
}

fn env_source() -> Environment {
    Environment::with_prefix("LANDMARKER")
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
}

/// Conventional variable names used when a key is not set under the prefix
const KEY_FALLBACKS: [(&str, &str); 2] = [
    ("vision.api_key", "GOOGLE_VISION_API_KEY"),
    ("summary.api_key", "OPENAI_API_KEY"),
];

fn substitute_env_vars<F>(settings: Config, lookup: F) -> Result<Config, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut builder = Config::builder().add_source(settings.clone());
    let mut changed = false;

    for (key, variable) in KEY_FALLBACKS {
        if settings.get_string(key).is_ok() {
            continue;
        }
        if let Some(value) = lookup(variable) {
            builder = builder.set_override(key, value)?;
            changed = true;
        }
    }

    if changed {
        builder.build()
    } else {
        Ok(settings)
    }
}
