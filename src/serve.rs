//! JSON API over an artifact directory.
//!
//! Routes:
//! - GET  /api/health
//! - GET  /api/data-files                  artifact names, newest first
//! - GET  /api/data/{filename}             artifact contents
//! - POST /api/data/{filename}/reconcile   artifact reconciled with a merge config

use crate::error::PulseError;
use crate::model::MergeConfig;
use crate::reconcile::reconcile_with;
use crate::store::ArtifactStore;
use anyhow::Context;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

const NO_STORE: &str = "no-store, max-age=0";

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Maps domain errors onto HTTP responses without exposing file-system paths.
#[derive(Debug)]
pub struct ApiError(PulseError);

impl From<PulseError> for ApiError {
    fn from(err: PulseError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            PulseError::InvalidInput(_) => (StatusCode::BAD_REQUEST, "Invalid request"),
            PulseError::NotFound(_) => (StatusCode::NOT_FOUND, "Not found"),
            PulseError::InvalidDocument(_) => (StatusCode::UNPROCESSABLE_ENTITY, "Invalid document"),
            PulseError::Json(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Invalid JSON file"),
            PulseError::Authentication(_) => (StatusCode::UNAUTHORIZED, "Authentication failed"),
            PulseError::Upstream(_) | PulseError::Http(_) => (StatusCode::BAD_GATEWAY, "Upstream error"),
            PulseError::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Failed to read data file"),
        };

        if status.is_server_error() {
            error!(error = %self.0, "request failed");
        } else {
            warn!(error = %self.0, "request rejected");
        }

        let body = ErrorResponse {
            error: message.to_string(),
            details: Some(self.0.to_string()),
        };
        (status, Json(body)).into_response()
    }
}

type AppState = Arc<ArtifactStore>;

async fn list_files(State(store): State<AppState>) -> Result<Response, ApiError> {
    let files = store.list()?;
    Ok(([(header::CACHE_CONTROL, NO_STORE)], Json(files)).into_response())
}

async fn get_file(
    State(store): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Response, ApiError> {
    let value = store.read_raw(&filename)?;
    Ok(([(header::CACHE_CONTROL, NO_STORE)], Json(value)).into_response())
}

async fn reconcile_file(
    State(store): State<AppState>,
    Path(filename): Path<String>,
    Json(merge): Json<MergeConfig>,
) -> Result<Response, ApiError> {
    let document = store.load(&filename)?;
    let reconciled = reconcile_with(&document, &merge)?;
    Ok(([(header::CACHE_CONTROL, NO_STORE)], Json(reconciled)).into_response())
}

pub fn router(store: ArtifactStore) -> Router {
    Router::new()
        .route("/api/health", get(|| async { "ok" }))
        .route("/api/data-files", get(list_files))
        .route("/api/data/{filename}", get(get_file))
        .route("/api/data/{filename}/reconcile", post(reconcile_file))
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(store))
}

pub async fn exec(store: ArtifactStore, addr: SocketAddr) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(%addr, dir = %store.dir().display(), "serving artifacts");
    println!("Serving {} at http://{addr}/api/data-files", store.dir().display());

    axum::serve(listener, router(store))
        .await
        .context("HTTP server failed")?;
    Ok(())
}
