use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::core::ingest::UploadedImage;
use crate::models::{Coordinate, LandmarkCandidate};

/// Errors that can occur when calling the recognition service
#[derive(Debug, Error)]
pub enum DetectionError {
    #[error("Network error talking to the vision service: {0}")]
    Network(String),

    #[error("Vision service rejected the credentials: {0}")]
    Auth(String),

    #[error("Vision service quota exceeded: {0}")]
    Quota(String),

    #[error("Vision service error: {0}")]
    Service(String),
}

impl DetectionError {
    pub fn suggestion(&self) -> &'static str {
        match self {
            Self::Network(_) => "The vision service could not be reached. Please try again.",
            Self::Quota(_) => "The vision service is rate limiting requests. Please retry in a little while.",
            Self::Auth(_) => "Check the vision API key configured for this service.",
            Self::Service(_) => "The vision service returned an unexpected response. Please try again.",
        }
    }

    /// The request URL is dropped so nothing about the request leaks into messages
    fn from_reqwest(err: reqwest::Error) -> Self {
        let err = err.without_url();
        if err.is_timeout() {
            Self::Network(format!("request timed out: {}", err))
        } else {
            Self::Network(err.to_string())
        }
    }
}

/// API key handed to the detector by whoever owns the secret
#[derive(Clone)]
pub struct Credential(String);

impl Credential {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credential(****)")
    }
}

/// Anything that can turn an image into landmark candidates
#[async_trait]
pub trait LandmarkDetector: Send + Sync {
    async fn detect(&self, image: &UploadedImage) -> Result<Vec<LandmarkCandidate>, DetectionError>;

    /// Short name used in logs and the health endpoint
    fn name(&self) -> &'static str;
}

/// Timeouts and limits for [`CloudVisionClient`]
#[derive(Debug, Clone)]
pub struct CloudVisionOptions {
    pub endpoint: String,
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub max_results: u32,
    /// Largest response body accepted from the service
    pub max_response_bytes: usize,
}

impl Default for CloudVisionOptions {
    fn default() -> Self {
        Self {
            endpoint: "https://vision.googleapis.com".to_string(),
            timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(5),
            max_results: 10,
            max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
        }
    }
}

pub const DEFAULT_MAX_RESPONSE_BYTES: usize = 4 * 1024 * 1024;

/// Header carrying the API key, kept out of the URL
const API_KEY_HEADER: &str = "x-goog-api-key";

/// Google Cloud Vision client (`images:annotate`, `LANDMARK_DETECTION`)
pub struct CloudVisionClient {
    base_url: String,
    credential: Credential,
    max_results: u32,
    max_response_bytes: usize,
    client: Client,
}

impl CloudVisionClient {
    pub fn new(credential: Credential, options: CloudVisionOptions) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(options.timeout)
            .connect_timeout(options.connect_timeout)
            .build()?;

        Ok(Self {
            base_url: options.endpoint,
            credential,
            max_results: options.max_results,
            max_response_bytes: options.max_response_bytes,
            client,
        })
    }

    fn annotate_url(&self) -> String {
        format!("{}/v1/images:annotate", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl LandmarkDetector for CloudVisionClient {
    async fn detect(&self, image: &UploadedImage) -> Result<Vec<LandmarkCandidate>, DetectionError> {
        let payload = AnnotateRequest {
            requests: vec![AnnotateImageRequest {
                image: WireImage {
                    content: general_purpose::STANDARD.encode(image.bytes()),
                },
                features: vec![Feature {
                    kind: "LANDMARK_DETECTION",
                    max_results: self.max_results,
                }],
            }],
        };

        tracing::debug!("Sending {} byte image to {}", image.bytes().len(), self.annotate_url());

        let response = self
            .client
            .post(self.annotate_url())
            .header(API_KEY_HEADER, self.credential.expose())
            .json(&payload)
            .send()
            .await
            .map_err(DetectionError::from_reqwest)?;

        let status = response.status();
        let body = read_capped(response, self.max_response_bytes).await?;

        if !status.is_success() {
            let detail = error_detail(&body).unwrap_or_else(|| status.to_string());
            tracing::warn!("Vision service returned {}: {}", status, detail);
            return Err(classify_status(status, detail));
        }

        parse_annotate_response(&body)
    }

    fn name(&self) -> &'static str {
        "cloud-vision"
    }
}

/// Read the response body, refusing anything larger than `limit` bytes
async fn read_capped(mut response: reqwest::Response, limit: usize) -> Result<Vec<u8>, DetectionError> {
    let too_large = || DetectionError::Service(format!("response body exceeds {} bytes", limit));

    if response.content_length().is_some_and(|len| len > limit as u64) {
        return Err(too_large());
    }

    let mut body = Vec::new();
    while let Some(chunk) = response.chunk().await.map_err(DetectionError::from_reqwest)? {
        if body.len() + chunk.len() > limit {
            return Err(too_large());
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body)
}

fn classify_status(status: StatusCode, detail: String) -> DetectionError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => DetectionError::Auth(detail),
        StatusCode::TOO_MANY_REQUESTS => DetectionError::Quota(detail),
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => DetectionError::Network(detail),
        _ => DetectionError::Service(format!("{}: {}", status, detail)),
    }
}

fn classify_rpc_status(status: &str, message: String) -> DetectionError {
    match status {
        "UNAUTHENTICATED" | "PERMISSION_DENIED" => DetectionError::Auth(message),
        "RESOURCE_EXHAUSTED" => DetectionError::Quota(message),
        "DEADLINE_EXCEEDED" | "UNAVAILABLE" => DetectionError::Network(message),
        _ => DetectionError::Service(format!("{}: {}", status, message)),
    }
}

fn error_detail(body: &[u8]) -> Option<String> {
    let envelope: ErrorEnvelope = serde_json::from_slice(body).ok()?;
    Some(envelope.error.message)
}

/// Parse an `images:annotate` response body into candidates
///
/// Only the first per-image response is read since exactly one image is sent.
pub fn parse_annotate_response(body: &[u8]) -> Result<Vec<LandmarkCandidate>, DetectionError> {
    let parsed: AnnotateResponse = serde_json::from_slice(body)
        .map_err(|e| DetectionError::Service(format!("Invalid response format: {}", e)))?;

    let Some(first) = parsed.responses.into_iter().next() else {
        return Ok(Vec::new());
    };

    if let Some(err) = first.error {
        return Err(classify_rpc_status(err.status.as_deref().unwrap_or(""), err.message));
    }

    let candidates: Vec<LandmarkCandidate> = first
        .landmark_annotations
        .into_iter()
        .map(candidate_from)
        .collect();

    tracing::debug!(
        "Vision service returned {} landmarks ({} without coordinates)",
        candidates.len(),
        candidates.iter().filter(|c| c.coordinate.is_none()).count()
    );

    Ok(candidates)
}

/// Typed construction step: the coordinate is either validated or absent
fn candidate_from(annotation: WireAnnotation) -> LandmarkCandidate {
    let coordinate = annotation
        .locations
        .iter()
        .find_map(|location| location.lat_lng.as_ref().and_then(WireLatLng::coordinate));

    let name = annotation
        .description
        .filter(|d| !d.trim().is_empty())
        .unwrap_or_else(|| "Unknown".to_string());

    let candidate = LandmarkCandidate::new(name, annotation.score.unwrap_or(0.0), coordinate);
    match annotation.mid {
        Some(mid) if !mid.is_empty() => candidate.with_entity_id(mid),
        _ => candidate,
    }
}

// Wire format. Field names follow the REST API's camelCase JSON mapping.

#[derive(Serialize)]
struct AnnotateRequest {
    requests: Vec<AnnotateImageRequest>,
}

#[derive(Serialize)]
struct AnnotateImageRequest {
    image: WireImage,
    features: Vec<Feature>,
}

#[derive(Serialize)]
struct WireImage {
    content: String,
}

#[derive(Serialize)]
struct Feature {
    #[serde(rename = "type")]
    kind: &'static str,
    #[serde(rename = "maxResults")]
    max_results: u32,
}

#[derive(Debug, Deserialize)]
struct AnnotateResponse {
    #[serde(default)]
    responses: Vec<AnnotateImageResponse>,
}

#[derive(Debug, Deserialize)]
struct AnnotateImageResponse {
    #[serde(rename = "landmarkAnnotations", default)]
    landmark_annotations: Vec<WireAnnotation>,
    #[serde(default)]
    error: Option<RpcStatus>,
}

#[derive(Debug, Deserialize)]
struct WireAnnotation {
    #[serde(default)]
    mid: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    score: Option<f64>,
    #[serde(default)]
    locations: Vec<WireLocation>,
}

#[derive(Debug, Deserialize)]
struct WireLocation {
    #[serde(rename = "latLng", default)]
    lat_lng: Option<WireLatLng>,
}

#[derive(Debug, Deserialize)]
struct WireLatLng {
    #[serde(default)]
    latitude: Option<f64>,
    #[serde(default)]
    longitude: Option<f64>,
}

impl WireLatLng {
    /// The JSON mapping omits zero-valued fields, so a single missing
    /// component means 0.0. An empty object carries no location at all.
    fn coordinate(&self) -> Option<Coordinate> {
        match (self.latitude, self.longitude) {
            (None, None) => None,
            (lat, lon) => Coordinate::checked(lat.unwrap_or(0.0), lon.unwrap_or(0.0)),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RpcStatus {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: RpcStatus,
}

/// Detector that always answers with the same candidates
///
/// Used for offline runs and demos; it never touches the network.
#[derive(Debug, Clone)]
pub struct StaticDetector {
    candidates: Vec<LandmarkCandidate>,
}

impl StaticDetector {
    pub fn new(candidates: Vec<LandmarkCandidate>) -> Self {
        Self { candidates }
    }

    /// A single confident hit on the Maiden Tower in Baku
    pub fn demo() -> Self {
        Self::new(vec![LandmarkCandidate::new(
            "Maiden Tower",
            0.87,
            Some(Coordinate::new(40.366_1, 49.837_2)),
        )])
    }
}

#[async_trait]
impl LandmarkDetector for StaticDetector {
    async fn detect(&self, _image: &UploadedImage) -> Result<Vec<LandmarkCandidate>, DetectionError> {
        Ok(self.candidates.clone())
    }

    fn name(&self) -> &'static str {
        "static"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_response() {
        let body = br#"{"responses":[{"landmarkAnnotations":[
            {"mid":"/m/02j81","description":"Eiffel Tower","score":0.95,
             "locations":[{"latLng":{"latitude":48.8584,"longitude":2.2945}}]},
            {"description":"Unknown","score":0.4}
        ]}]}"#;

        let candidates = parse_annotate_response(body).unwrap();

        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].name, "Eiffel Tower");
        assert_eq!(candidates[0].entity_id.as_deref(), Some("/m/02j81"));
        assert_eq!(candidates[0].coordinate, Some(Coordinate::new(48.8584, 2.2945)));
        assert_eq!(candidates[1].coordinate, None);
    }

    #[test]
    fn test_empty_response_is_no_landmarks() {
        assert!(parse_annotate_response(br#"{"responses":[{}]}"#).unwrap().is_empty());
        assert!(parse_annotate_response(br#"{}"#).unwrap().is_empty());
    }

    #[test]
    fn test_empty_lat_lng_is_absent_not_zero() {
        let body = br#"{"responses":[{"landmarkAnnotations":[
            {"description":"Somewhere","score":0.7,"locations":[{"latLng":{}}]}
        ]}]}"#;
        assert_eq!(parse_annotate_response(body).unwrap()[0].coordinate, None);
    }

    #[test]
    fn test_zero_valued_component_omitted() {
        let body = br#"{"responses":[{"landmarkAnnotations":[
            {"description":"Greenwich","score":0.7,"locations":[{"latLng":{"latitude":51.4779}}]}
        ]}]}"#;
        assert_eq!(
            parse_annotate_response(body).unwrap()[0].coordinate,
            Some(Coordinate::new(51.4779, 0.0))
        );
    }

    #[test]
    fn test_missing_fields_defaulted() {
        let body = br#"{"responses":[{"landmarkAnnotations":[{"score":1.3}]}]}"#;
        let candidate = &parse_annotate_response(body).unwrap()[0];
        assert_eq!(candidate.name, "Unknown");
        assert_eq!(candidate.confidence, 1.0);
    }

    #[test]
    fn test_per_image_error_classified() {
        let quota = br#"{"responses":[{"error":{"code":8,"status":"RESOURCE_EXHAUSTED","message":"quota"}}]}"#;
        assert!(matches!(parse_annotate_response(quota), Err(DetectionError::Quota(_))));

        let auth = br#"{"responses":[{"error":{"code":7,"status":"PERMISSION_DENIED","message":"nope"}}]}"#;
        assert!(matches!(parse_annotate_response(auth), Err(DetectionError::Auth(_))));
    }

    #[test]
    fn test_malformed_body_is_service_error() {
        assert!(matches!(parse_annotate_response(b"<html>"), Err(DetectionError::Service(_))));
    }

    #[test]
    fn test_status_classification() {
        assert!(matches!(classify_status(StatusCode::FORBIDDEN, String::new()), DetectionError::Auth(_)));
        assert!(matches!(classify_status(StatusCode::TOO_MANY_REQUESTS, String::new()), DetectionError::Quota(_)));
        assert!(matches!(classify_status(StatusCode::BAD_GATEWAY, String::new()), DetectionError::Service(_)));
    }

    #[test]
    fn test_credential_debug_redacted() {
        let credential = Credential::new("super-secret");
        assert!(!format!("{:?}", credential).contains("super-secret"));
    }

    #[test]
    fn test_static_detector_returns_demo() {
        use image::{ImageFormat, Rgb, RgbImage};
        let mut buf = std::io::Cursor::new(Vec::new());
        RgbImage::from_pixel(2, 2, Rgb([0, 0, 0])).write_to(&mut buf, ImageFormat::Png).unwrap();
        let image = crate::core::ingest::ingest(buf.into_inner(), "image/png").unwrap();

        let candidates = tokio_test::block_on(StaticDetector::demo().detect(&image)).unwrap();
        assert_eq!(candidates[0].name, "Maiden Tower");
    }

    fn tiny_png() -> UploadedImage {
        use image::{ImageFormat, Rgb, RgbImage};
        let mut buf = std::io::Cursor::new(Vec::new());
        RgbImage::from_pixel(2, 2, Rgb([0, 0, 0])).write_to(&mut buf, ImageFormat::Png).unwrap();
        crate::core::ingest::ingest(buf.into_inner(), "image/png").unwrap()
    }

    fn client_for(endpoint: String, key: &str, max_response_bytes: usize) -> CloudVisionClient {
        CloudVisionClient::new(
            Credential::new(key),
            CloudVisionOptions {
                endpoint,
                timeout: Duration::from_secs(2),
                connect_timeout: Duration::from_secs(2),
                max_response_bytes,
                ..Default::default()
            },
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_network_error_does_not_reveal_key() {
        let addr = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap()
        };
        let key = "SUPERSECRETKEY123";

        let err = client_for(format!("http://{}", addr), key, DEFAULT_MAX_RESPONSE_BYTES)
            .detect(&tiny_png())
            .await
            .unwrap_err();

        assert!(matches!(err, DetectionError::Network(_)));
        assert!(!err.to_string().contains(key));
        assert!(!format!("{:?}", err).contains(key));
    }

    #[tokio::test]
    async fn test_key_sent_as_header_not_query() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/images:annotate")
            .match_header(API_KEY_HEADER, "header-key")
            .with_status(200)
            .with_body(r#"{"responses":[{}]}"#)
            .create_async()
            .await;

        let candidates = client_for(server.url(), "header-key", DEFAULT_MAX_RESPONSE_BYTES)
            .detect(&tiny_png())
            .await
            .unwrap();

        mock.assert_async().await;
        assert!(candidates.is_empty());
    }

    #[tokio::test]
    async fn test_oversized_response_rejected() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/images:annotate")
            .with_status(200)
            .with_body(format!(r#"{{"responses":[{{}}],"padding":"{}"}}"#, "x".repeat(4096)))
            .create_async()
            .await;

        let err = client_for(server.url(), "k", 1024).detect(&tiny_png()).await.unwrap_err();
        assert!(matches!(err, DetectionError::Service(_)));
    }
}
