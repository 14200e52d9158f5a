use crate::artifacts::{self, ArtifactStore};
use crate::config::ApiConfig;
use crate::lifecycle::SubmissionLifecycle;
use crate::metadata_store::{MetadataStore, SubmissionRecord};
use anyhow::{Context, Result};
use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, instrument, warn};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub lifecycle: Arc<SubmissionLifecycle>,
    pub metadata_store: Arc<MetadataStore>,
    pub artifacts: Arc<ArtifactStore>,
    pub max_upload_bytes: usize,
}

/// Successful upload response
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub message: String,
    pub track_id: String,
    pub download_url: String,
}

/// Error response; the body shape is part of the wire format
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    fn not_found() -> (StatusCode, Json<Self>) {
        (
            StatusCode::NOT_FOUND,
            Json(Self {
                error: "Not found".to_string(),
            }),
        )
    }

    fn bad_request(message: &str) -> (StatusCode, Json<Self>) {
        (
            StatusCode::BAD_REQUEST,
            Json(Self {
                error: message.to_string(),
            }),
        )
    }

    fn internal(message: &str) -> (StatusCode, Json<Self>) {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(Self {
                error: message.to_string(),
            }),
        )
    }
}

/// Create the API router
pub fn create_router(state: AppState, config: &ApiConfig) -> Router {
    let cors = if config.cors_enabled {
        if config.cors_origins.is_empty() {
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        } else {
            let origins: Vec<_> = config
                .cors_origins
                .iter()
                .filter_map(|o| match o.parse() {
                    Ok(origin) => Some(origin),
                    Err(e) => {
                        warn!(origin = %o, error = %e, "Ignoring unparsable CORS origin");
                        None
                    }
                })
                .collect();
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods(Any)
                .allow_headers(Any)
        }
    } else {
        CorsLayer::new()
    };

    let body_limit = state.max_upload_bytes;

    Router::new()
        .route("/health", get(health_check))
        .route("/upload/", post(upload_audio))
        .route("/submissions/", get(list_submissions))
        .route("/download/:filename", get(download_file))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "ciphermix-backend"
    }))
}

/// Accept a multipart upload (`file` binary field + `preset` text field) and
/// schedule enhancement. Returns before the transform runs.
#[instrument(skip(state, multipart))]
async fn upload_audio(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, (StatusCode, Json<ErrorResponse>)> {
    let mut file: Option<(String, Vec<u8>)> = None;
    let mut preset: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ErrorResponse::bad_request(&format!("Malformed multipart body: {e}")))?
    {
        let name = field.name().map(|s| s.to_string());
        match name.as_deref() {
            Some("file") => {
                let filename = field
                    .file_name()
                    .unwrap_or("upload.wav")
                    .to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ErrorResponse::bad_request(&format!("Failed to read file field: {e}")))?;
                file = Some((filename, data.to_vec()));
            }
            Some("preset") => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| ErrorResponse::bad_request(&format!("Failed to read preset field: {e}")))?;
                preset = Some(value);
            }
            _ => {}
        }
    }

    let Some((original_filename, data)) = file else {
        return Err(ErrorResponse::bad_request("Missing file field"));
    };
    let Some(preset) = preset else {
        return Err(ErrorResponse::bad_request("Missing preset field"));
    };
    if data.is_empty() {
        return Err(ErrorResponse::bad_request("Uploaded file is empty"));
    }

    let receipt = state
        .lifecycle
        .submit(&original_filename, &preset, data)
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to accept upload");
            ErrorResponse::internal("Failed to accept upload")
        })?;

    Ok(Json(UploadResponse {
        message: "Upload received. Enhancement started.".to_string(),
        track_id: receipt.track_id,
        download_url: receipt.download_url,
    }))
}

/// List every submission keyed by id
#[instrument(skip(state))]
async fn list_submissions(
    State(state): State<AppState>,
) -> Json<HashMap<String, SubmissionRecord>> {
    Json(state.metadata_store.all().await)
}

/// Serve a processed artifact's bytes, or a structured 404
#[instrument(skip(state))]
async fn download_file(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorResponse>)> {
    let Some(path) = state.artifacts.resolve_processed(&filename) else {
        return Err(ErrorResponse::not_found());
    };

    match tokio::fs::read(&path).await {
        Ok(bytes) => {
            let content_type = artifacts::get_content_type(&filename);
            Ok(([(header::CONTENT_TYPE, content_type)], bytes))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(ErrorResponse::not_found()),
        Err(e) => {
            error!(error = %e, filename = %filename, "Failed to read processed artifact");
            Err(ErrorResponse::internal("Failed to read artifact"))
        }
    }
}

/// Start the HTTP API server
pub async fn start_api_server(state: AppState, config: &ApiConfig) -> Result<()> {
    let router = create_router(state, config);
    let addr = format!("{}:{}", config.host, config.port);

    info!(address = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, router)
        .await
        .context("API server error")?;

    Ok(())
}
