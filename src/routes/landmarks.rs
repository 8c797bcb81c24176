use actix_web::{http::header, web, HttpRequest, HttpResponse, Responder};
use validator::Validate;

use crate::core::{Pipeline, PipelineError, PipelineOutcome, EXPORT_FILE_NAME};
use crate::models::{DetectQuery, DetectResponse, ErrorResponse, HealthResponse};
use crate::services::DetectionError;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Pipeline,
}

/// Configure all landmark routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg
        .route("/health", web::get().to(health_check))
        .route("/landmarks/detect", web::post().to(detect_landmarks))
        .route("/landmarks/map", web::post().to(export_map));
}

/// Health check endpoint
async fn health_check(state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        detector: state.pipeline.detector_name().to_string(),
        timestamp: chrono::Utc::now(),
    })
}

/// Detect landmarks in an uploaded image
///
/// POST /api/v1/landmarks/detect?min_confidence=0.5&strategy=all
///
/// The body is the raw image; `Content-Type` declares its format
/// (`image/png`, `image/jpeg` or `image/webp`).
async fn detect_landmarks(
    state: web::Data<AppState>,
    query: web::Query<DetectQuery>,
    body: web::Bytes,
    req: HttpRequest,
) -> impl Responder {
    match run_pipeline(&state, &query, body, &req).await {
        Ok(outcome) => HttpResponse::Ok().json(DetectResponse {
            request_id: outcome.request_id,
            landmarks: outcome.display.as_slice().to_vec(),
            unmapped: outcome.unmapped,
            map: outcome.artifact,
        }),
        Err(response) => response,
    }
}

/// Detect landmarks and return the map as a downloadable HTML page
///
/// POST /api/v1/landmarks/map
async fn export_map(
    state: web::Data<AppState>,
    query: web::Query<DetectQuery>,
    body: web::Bytes,
    req: HttpRequest,
) -> impl Responder {
    match run_pipeline(&state, &query, body, &req).await {
        Ok(outcome) => HttpResponse::Ok()
            .content_type("text/html; charset=utf-8")
            .insert_header((
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", EXPORT_FILE_NAME),
            ))
            .insert_header(("X-Request-Id", outcome.request_id.to_string()))
            .body(outcome.artifact.to_html()),
        Err(response) => response,
    }
}

async fn run_pipeline(
    state: &AppState,
    query: &DetectQuery,
    body: web::Bytes,
    req: &HttpRequest,
) -> Result<PipelineOutcome, HttpResponse> {
    if let Err(errors) = query.validate() {
        tracing::info!("Validation failed for landmark query: {:?}", errors);
        return Err(HttpResponse::BadRequest().json(ErrorResponse {
            error: "Validation failed".to_string(),
            message: errors.to_string(),
            suggestion: None,
            status_code: 400,
        }));
    }

    let declared_type = req
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();

    tracing::info!(
        "Received {} byte upload ({}) on {}",
        body.len(),
        if declared_type.is_empty() { "no content type" } else { declared_type.as_str() },
        req.path()
    );

    let policy = state.pipeline.default_policy().with_overrides(
        query.min_confidence,
        query.strategy,
        query.max_markers,
    );

    state
        .pipeline
        .run(body.to_vec(), &declared_type, Some(policy))
        .await
        .map_err(|e| error_response(&e))
}

fn error_response(err: &PipelineError) -> HttpResponse {
    let (mut builder, error, status_code) = match err {
        PipelineError::InvalidImage(_) => (HttpResponse::BadRequest(), "Invalid image", 400),
        PipelineError::Detection(DetectionError::Network(_)) => {
            (HttpResponse::ServiceUnavailable(), "Detection service unreachable", 503)
        }
        PipelineError::Detection(DetectionError::Quota(_)) => {
            (HttpResponse::TooManyRequests(), "Detection quota exceeded", 429)
        }
        PipelineError::Detection(DetectionError::Auth(_)) => {
            (HttpResponse::BadGateway(), "Detection service rejected credentials", 502)
        }
        PipelineError::Detection(DetectionError::Service(_)) => {
            (HttpResponse::BadGateway(), "Detection service error", 502)
        }
    };

    builder.json(ErrorResponse {
        error: error.to_string(),
        message: err.to_string(),
        suggestion: Some(err.suggestion().to_string()),
        status_code,
    })
}
