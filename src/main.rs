use actix_cors::Cors;
use actix_web::{error, http::StatusCode, middleware, web, App, HttpResponse, HttpServer};
use landmarker::config::{DetectorMode, LoggingSettings, Settings, SummaryMode};
use landmarker::core::{MapRenderer, Pipeline, ResultSelector};
use landmarker::routes::{self, landmarks::AppState};
use landmarker::services::{
    ChatSummaryClient, CloudVisionClient, Credential, LandmarkDetector, LandmarkSummarizer, PlaceLookup,
    StaticDetector, StaticSummarizer,
};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// JSON error response for request extraction errors
#[derive(Debug, serde::Serialize)]
pub struct JsonError {
    pub error: String,
    pub message: String,
    pub status_code: u16,
}

impl std::fmt::Display for JsonError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.error, self.message)
    }
}

impl std::error::Error for JsonError {}

impl error::ResponseError for JsonError {
    fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::BAD_REQUEST)
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(self)
    }
}

/// Handle query string errors (e.g. `strategy=fastest`)
pub fn handle_query_payload_error(err: error::QueryPayloadError, req: &actix_web::HttpRequest) -> actix_web::Error {
    tracing::info!("Query error on {}: {}", req.path(), err);
    JsonError {
        error: "invalid_query".to_string(),
        message: format!("Invalid query: {}", err),
        status_code: 400,
    }
    .into()
}

fn init_logging(settings: &LoggingSettings) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.level));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true);

    match settings.format.as_str() {
        "pretty" => subscriber.pretty().init(),
        "compact" => subscriber.compact().init(),
        _ => subscriber.json().init(),
    }
}

fn build_detector(settings: &Settings) -> std::io::Result<Arc<dyn LandmarkDetector>> {
    match settings.vision.mode {
        DetectorMode::Static => {
            warn!("Using the static demo detector; uploads are not analysed");
            Ok(Arc::new(StaticDetector::demo()))
        }
        DetectorMode::Cloud => {
            let key = settings.vision.api_key.clone().unwrap_or_default();
            let client = CloudVisionClient::new(Credential::new(key), settings.vision.options()).map_err(|e| {
                error!("Failed to build vision client: {}", e);
                std::io::Error::new(std::io::ErrorKind::Other, e)
            })?;
            info!("Cloud Vision client initialized ({})", settings.vision.endpoint);
            Ok(Arc::new(client))
        }
    }
}

fn build_summarizer(settings: &Settings) -> Option<Arc<dyn LandmarkSummarizer>> {
    if !settings.summary.enabled {
        return None;
    }

    match settings.summary.mode {
        SummaryMode::Static => Some(Arc::new(StaticSummarizer::demo())),
        SummaryMode::Cloud => {
            let key = settings.summary.api_key.clone().unwrap_or_default();
            match ChatSummaryClient::new(Credential::new(key), settings.summary.options()) {
                Ok(client) => {
                    info!("Landmark summaries enabled (model: {})", settings.summary.model);
                    Some(Arc::new(client))
                }
                Err(e) => {
                    error!("Failed to build summary client ({}), continuing without it", e);
                    None
                }
            }
        }
    }
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present
    dotenv::dotenv().ok();

    // Configuration comes first so the log settings can be honoured
    let settings = match Settings::load() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return Err(std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()));
        }
    };

    init_logging(&settings.logging);
    info!("Starting Landmarker service...");

    let detector = build_detector(&settings)?;

    let mut pipeline = Pipeline::new(
        detector,
        ResultSelector::new(settings.selection.policy()),
        MapRenderer::new(settings.map.options()),
    );

    if settings.places.enabled {
        match PlaceLookup::new(settings.places.options()) {
            Ok(places) => {
                info!("Place enrichment enabled");
                pipeline = pipeline.with_places(Arc::new(places));
            }
            Err(e) => error!("Failed to build place lookup client ({}), continuing without it", e),
        }
    }

    if let Some(summarizer) = build_summarizer(&settings) {
        pipeline = pipeline.with_summarizer(summarizer);
    }

    info!("Pipeline initialized with policy: {:?}", pipeline.default_policy());

    let app_state = AppState { pipeline };

    // Configure HTTP server
    let host = settings.server.host.clone();
    let port = settings.server.port;
    let workers = settings.server.workers.unwrap_or(4);
    let max_upload_bytes = settings.server.max_upload_bytes;

    info!("Starting HTTP server on {}:{}", host, port);

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .app_data(web::PayloadConfig::new(max_upload_bytes))
            .app_data(web::QueryConfig::default().error_handler(handle_query_payload_error))
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .wrap(middleware::Compress::default())
            .configure(routes::configure_routes)
    })
    .workers(workers)
    .bind((host, port))?
    .run()
    .await
}
