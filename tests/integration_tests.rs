// Integration tests for Landmarker

use image::{ImageFormat, Rgb, RgbImage};
use landmarker::core::{MapRenderer, Pipeline, PipelineError, ResultSelector, SelectionPolicy, Strategy};
use landmarker::models::Coordinate;
use landmarker::services::{CloudVisionClient, CloudVisionOptions, Credential, DetectionError};
use std::sync::Arc;
use std::time::Duration;

fn photo() -> Vec<u8> {
    let mut buf = std::io::Cursor::new(Vec::new());
    RgbImage::from_pixel(16, 12, Rgb([120, 140, 200]))
        .write_to(&mut buf, ImageFormat::Jpeg)
        .unwrap();
    buf.into_inner()
}

fn vision_pipeline(endpoint: String, timeout: Duration) -> Pipeline {
    let client = CloudVisionClient::new(
        Credential::new("test-key"),
        CloudVisionOptions {
            endpoint,
            timeout,
            connect_timeout: timeout,
            ..Default::default()
        },
    )
    .unwrap();

    Pipeline::new(Arc::new(client), ResultSelector::default(), MapRenderer::default())
}

const EIFFEL_RESPONSE: &str = r#"{
  "responses": [{
    "landmarkAnnotations": [
      {
        "mid": "/m/02j81",
        "description": "Eiffel Tower",
        "score": 0.95,
        "locations": [{"latLng": {"latitude": 48.8584, "longitude": 2.2945}}]
      },
      {
        "description": "Unknown",
        "score": 0.40
      }
    ]
  }]
}"#;

#[tokio::test]
async fn test_integration_end_to_end_detection() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/images:annotate")
        .match_header("x-goog-api-key", "test-key")
        .match_body(mockito::Matcher::Regex("LANDMARK_DETECTION".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(EIFFEL_RESPONSE)
        .create_async()
        .await;

    let pipeline = vision_pipeline(server.url(), Duration::from_secs(5));
    let outcome = pipeline.run(photo(), "image/jpeg", None).await.unwrap();

    mock.assert_async().await;

    assert_eq!(outcome.candidates.len(), 2);
    assert_eq!(outcome.candidates[0].entity_id.as_deref(), Some("/m/02j81"));
    assert_eq!(outcome.unmapped, vec!["Unknown"]);

    let markers = &outcome.artifact.markers;
    assert_eq!(markers.len(), 1);
    assert_eq!(markers[0].name, "Eiffel Tower");
    assert_eq!(markers[0].coordinate, Coordinate::new(48.8584, 2.2945));
    assert_eq!(markers[0].label, "Eiffel Tower (Matched: 95.00%)");

    // Single marker: map centred on it
    let center = outcome.artifact.center;
    assert!((center.latitude - 48.8584).abs() < 1e-9);
    assert!((center.longitude - 2.2945).abs() < 1e-9);
    assert!(outcome.artifact.zoom >= 10);

    let html = outcome.artifact.to_html();
    assert!(html.contains("Eiffel Tower"));
}

#[tokio::test]
async fn test_integration_no_landmarks_is_not_an_error() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/v1/images:annotate")
        .match_query(mockito::Matcher::Any)
        .with_status(200)
        .with_body(r#"{"responses": [{}]}"#)
        .create_async()
        .await;

    let pipeline = vision_pipeline(server.url(), Duration::from_secs(5));
    let outcome = pipeline.run(photo(), "image/jpeg", None).await.unwrap();

    assert!(outcome.candidates.is_empty());
    assert!(outcome.artifact.markers.is_empty());
    assert!(outcome.artifact.bounds.is_none());
}

#[tokio::test]
async fn test_integration_best_strategy_over_many() {
    let body = r#"{
      "responses": [{
        "landmarkAnnotations": [
          {"description": "Trocadero", "score": 0.55,
           "locations": [{"latLng": {"latitude": 48.8616, "longitude": 2.2893}}]},
          {"description": "Eiffel Tower", "score": 0.91,
           "locations": [{"latLng": {"latitude": 48.8584, "longitude": 2.2945}}]},
          {"description": "Champ de Mars", "score": 0.33,
           "locations": [{"latLng": {"latitude": 48.8556, "longitude": 2.2986}}]}
        ]
      }]
    }"#;

    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/v1/images:annotate")
        .match_query(mockito::Matcher::Any)
        .with_status(200)
        .with_body(body)
        .expect(2)
        .create_async()
        .await;

    let pipeline = vision_pipeline(server.url(), Duration::from_secs(5));

    let all = pipeline.run(photo(), "image/jpeg", None).await.unwrap();
    let names: Vec<&str> = all.display.iter().map(|l| l.name.as_str()).collect();
    assert_eq!(names, vec!["Eiffel Tower", "Trocadero", "Champ de Mars"]);
    assert!(all.artifact.bounds.is_some());

    let best = SelectionPolicy {
        strategy: Strategy::Best,
        ..Default::default()
    };
    let one = pipeline.run(photo(), "image/jpeg", Some(best)).await.unwrap();
    assert_eq!(one.display.len(), 1);
    assert_eq!(one.display.as_slice()[0].name, "Eiffel Tower");
}

#[tokio::test]
async fn test_integration_rejected_key_is_auth_error() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/v1/images:annotate")
        .match_query(mockito::Matcher::Any)
        .with_status(403)
        .with_body(r#"{"error": {"code": 403, "message": "API key not valid", "status": "PERMISSION_DENIED"}}"#)
        .create_async()
        .await;

    let pipeline = vision_pipeline(server.url(), Duration::from_secs(5));
    let err = pipeline.run(photo(), "image/jpeg", None).await.unwrap_err();

    match err {
        PipelineError::Detection(DetectionError::Auth(message)) => assert!(message.contains("API key not valid")),
        other => panic!("expected auth error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_integration_quota_exhausted() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/v1/images:annotate")
        .match_query(mockito::Matcher::Any)
        .with_status(429)
        .with_body(r#"{"error": {"code": 429, "message": "Quota exceeded", "status": "RESOURCE_EXHAUSTED"}}"#)
        .create_async()
        .await;

    let pipeline = vision_pipeline(server.url(), Duration::from_secs(5));
    let err = pipeline.run(photo(), "image/jpeg", None).await.unwrap_err();

    assert!(matches!(err, PipelineError::Detection(DetectionError::Quota(_))));
}

#[tokio::test]
async fn test_integration_invalid_image_never_reaches_service() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/images:annotate")
        .match_query(mockito::Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let pipeline = vision_pipeline(server.url(), Duration::from_secs(5));
    let err = pipeline.run(b"not an image".to_vec(), "image/png", None).await.unwrap_err();

    assert!(matches!(err, PipelineError::InvalidImage(_)));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_integration_unresponsive_service_times_out() {
    // Accepts connections but never answers
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let held = tokio::spawn(async move {
        let mut sockets = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            sockets.push(socket);
        }
    });

    let pipeline = vision_pipeline(format!("http://{}", addr), Duration::from_millis(300));
    let err = pipeline.run(photo(), "image/jpeg", None).await.unwrap_err();

    assert!(matches!(err, PipelineError::Detection(DetectionError::Network(_))));
    held.abort();
}

#[tokio::test]
async fn test_integration_unreachable_service() {
    // Nothing listens on a port we just released
    let addr = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };

    let pipeline = vision_pipeline(format!("http://{}", addr), Duration::from_secs(2));
    let err = pipeline.run(photo(), "image/jpeg", None).await.unwrap_err();

    assert!(matches!(err, PipelineError::Detection(DetectionError::Network(_))));
}

#[tokio::test]
async fn test_integration_failure_never_echoes_api_key() {
    let addr = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };

    let client = CloudVisionClient::new(
        Credential::new("SUPERSECRETKEY123"),
        CloudVisionOptions {
            endpoint: format!("http://{}", addr),
            ..Default::default()
        },
    )
    .unwrap();
    let pipeline = Pipeline::new(Arc::new(client), ResultSelector::default(), MapRenderer::default());

    let err = pipeline.run(photo(), "image/jpeg", None).await.unwrap_err();

    assert!(!err.to_string().contains("SUPERSECRETKEY123"));
    assert!(!err.suggestion().contains("SUPERSECRETKEY123"));
}
