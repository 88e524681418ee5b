//! HTTP Server for the housing affordability API.
//!
//! # API Endpoints
//!
//! | Method | Path            | Description                                      |
//! |--------|-----------------|--------------------------------------------------|
//! | GET    | `/health`       | Health check                                     |
//! | POST   | `/api/analyze`  | Upload a CSV and analyse it                      |
//! | GET    | `/api/analysis` | Analyse the data directory (cached by fingerprint) |
//! | GET    | `/api/logs`     | SSE stream for real-time logs                    |
//!
//! Both analysis endpoints accept `income_group`, `threshold` and `top_k`
//! (query string for `/api/analysis`, multipart text fields for
//! `/api/analyze`). The upload endpoint also accepts `area_column`,
//! `rent_column` and `income_column` pins.

use axum::{
    extract::{Multipart, Query, State},
    http::{header, Method, StatusCode},
    response::{sse::Event, Json, Sse},
    routing::{get, post},
    Router,
};
use futures::stream::Stream;
use serde::Deserialize;
use serde_json::{json, Value};
use std::{convert::Infallible, net::SocketAddr, sync::Arc, time::Duration};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;
use tower_http::cors::CorsLayer;

use super::logs::{log_error, log_info, log_success, Stage, LOG_BROADCASTER};
use super::types::{error_response, AnalysisResponse};
use crate::cache::AnalysisCache;
use crate::config::AppConfig;
use crate::error::{CsvError, PipelineError, ServerError, ServerResult};
use crate::models::IncomeGroup;
use crate::parser::{fingerprint_dir, load_dataset};
use crate::transform::pipeline::{analyze_bytes, prepare, report, CsvInfo, PipelineOptions};

/// Shared state of every handler
pub struct AppState {
    pub config: AppConfig,
    pub cache: AnalysisCache,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            cache: AnalysisCache::new(),
        }
    }
}

type SharedState = Arc<AppState>;
type ApiError = (StatusCode, Json<Value>);

/// Build the router
pub fn router(state: SharedState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/api/analyze", post(analyze_upload))
        .route("/api/analysis", get(analyze_data_dir))
        .route("/api/logs", get(sse_logs))
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server
pub async fn start_server(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let port = config.port;
    let data_dir = config.data_dir.display().to_string();
    let app = router(Arc::new(AppState::new(config)));

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    println!("🚀 Housing mapper running on http://localhost:{}", port);
    println!("   POST /api/analyze  - Upload CSV file");
    println!("   GET  /api/analysis - Analyse {}", data_dir);
    println!("   GET  /api/logs     - SSE log stream");
    println!("   GET  /health       - Health check");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Health check endpoint
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "housing-mapper",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "analyze": "POST /api/analyze",
            "analysis": "GET /api/analysis",
            "logs": "GET /api/logs (SSE)"
        }
    }))
}

/// SSE endpoint for real-time log streaming
async fn sse_logs() -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = LOG_BROADCASTER.subscribe();

    // Lagged receivers skip what they missed
    let stream = BroadcastStream::new(rx).filter_map(|result| {
        let entry = result.ok()?;
        let json = serde_json::to_string(&entry).ok()?;
        Some(Ok(Event::default().data(json)))
    });

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

/// Query of `/api/analysis`
#[derive(Debug, Default, Deserialize)]
pub struct AnalysisQuery {
    pub income_group: Option<String>,
    pub threshold: Option<f64>,
    pub top_k: Option<usize>,
}

/// Analyse the configured data directory
async fn analyze_data_dir(
    State(state): State<SharedState>,
    Query(query): Query<AnalysisQuery>,
) -> Result<Json<AnalysisResponse>, ApiError> {
    let options = report_options(&query).map_err(reject)?;

    let response = tokio::task::spawn_blocking(move || data_dir_response(&state, &options))
        .await
        .map_err(|e| reject(ServerError::Internal(e.to_string())))?
        .map_err(reject)?;

    Ok(Json(response))
}

fn data_dir_response(
    state: &AppState,
    options: &PipelineOptions,
) -> ServerResult<AnalysisResponse> {
    let dir = &state.config.data_dir;
    let fingerprint = fingerprint_dir(dir);
    if fingerprint.is_empty() {
        return Err(CsvError::NoDataset(dir.display().to_string()).into());
    }

    let cached_before = state.cache.get(&fingerprint).is_some();
    let entry = state
        .cache
        .get_or_try_insert_with(&fingerprint, || -> Result<_, PipelineError> {
            log_info(Stage::Load, format!("Loading dataset from {}", dir.display()));
            let (parsed, source) = load_dataset(dir, state.config.preferred_dataset.as_deref())?;
            log_success(Stage::Load, format!("Selected {}", source.name));

            let prepared = prepare(&parsed.table, options)?;
            let csv_info = CsvInfo {
                encoding: parsed.encoding,
                delimiter: parsed.delimiter,
                headers: parsed.headers,
                row_count: parsed.table.row_count(),
                fingerprint: Some(source.fingerprint()),
            };
            Ok((csv_info, prepared))
        })?;

    if cached_before {
        log_info(Stage::Server, format!("Cache hit for {}", fingerprint));
    }

    let report = report(&entry.prepared, options);
    Ok(AnalysisResponse::new(
        &entry.csv_info,
        &entry.prepared,
        report,
        cached_before,
        Some(entry.computed_at.to_rfc3339()),
    ))
}

/// Upload CSV endpoint
async fn analyze_upload(mut multipart: Multipart) -> Result<Json<AnalysisResponse>, ApiError> {
    let mut file_data: Option<Vec<u8>> = None;
    let mut file_name: Option<String> = None;
    let mut query = AnalysisQuery::default();
    let mut options = PipelineOptions::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| reject(ServerError::BadRequest(format!("Multipart error: {}", e))))?
    {
        let name = field.name().unwrap_or("").to_string();

        if name == "file" {
            file_name = field.file_name().map(|s| s.to_string());
            file_data = Some(
                field
                    .bytes()
                    .await
                    .map_err(|e| reject(ServerError::BadRequest(format!("Read error: {}", e))))?
                    .to_vec(),
            );
            continue;
        }

        let value = field
            .text()
            .await
            .map_err(|e| reject(ServerError::BadRequest(format!("Read error: {}", e))))?;
        match name.as_str() {
            "income_group" => query.income_group = Some(value),
            "threshold" => query.threshold = Some(parse_field(&name, &value).map_err(reject)?),
            "top_k" => query.top_k = Some(parse_field(&name, &value).map_err(reject)?),
            "area_column" => options.overrides.area = Some(value),
            "rent_column" => options.overrides.rent = Some(value),
            "income_column" => options.overrides.income = Some(value),
            _ => {}
        }
    }

    let bytes =
        file_data.ok_or_else(|| reject(ServerError::BadRequest("No file provided".into())))?;
    let options = PipelineOptions {
        overrides: options.overrides,
        ..report_options(&query).map_err(reject)?
    };

    log_info(
        Stage::Server,
        format!(
            "New upload: {} ({} bytes)",
            file_name.as_deref().unwrap_or("unknown"),
            bytes.len()
        ),
    );

    let analysis = tokio::task::spawn_blocking(move || analyze_bytes(&bytes, &options))
        .await
        .map_err(|e| reject(ServerError::Internal(e.to_string())))?
        .map_err(|e| reject(e.into()))?;

    Ok(Json(AnalysisResponse::from(analysis)))
}

/// Pipeline options from request parameters
fn report_options(query: &AnalysisQuery) -> ServerResult<PipelineOptions> {
    let mut options = PipelineOptions::default();
    options.income_group = parse_income_group(query.income_group.as_deref())?;
    if let Some(threshold) = query.threshold {
        options.struggling_threshold = threshold;
    }
    if let Some(top_k) = query.top_k {
        options.top_k = top_k;
    }
    Ok(options)
}

/// `None`, empty and "all" select every row
pub fn parse_income_group(raw: Option<&str>) -> ServerResult<Option<IncomeGroup>> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) if s.eq_ignore_ascii_case("all") => Ok(None),
        Some(s) => s.parse().map(Some).map_err(ServerError::BadRequest),
    }
}

fn parse_field<T: std::str::FromStr>(name: &str, value: &str) -> ServerResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| ServerError::BadRequest(format!("Invalid {}: '{}'", name, value)))
}

fn status_of(err: &ServerError) -> StatusCode {
    match err {
        ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
        ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        ServerError::Pipeline(PipelineError::DataUnavailable) => StatusCode::UNPROCESSABLE_ENTITY,
        ServerError::Pipeline(PipelineError::Csv(CsvError::NoDataset(_))) => StatusCode::NOT_FOUND,
        ServerError::Pipeline(PipelineError::Csv(CsvError::IoError(_))) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
        ServerError::Pipeline(_) => StatusCode::BAD_REQUEST,
    }
}

fn reject(err: ServerError) -> ApiError {
    log_error(Stage::Server, err.to_string());
    (status_of(&err), Json(error_response(&err.to_string())))
}
