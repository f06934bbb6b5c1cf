// Copyright 2026 damlog Contributors
// SPDX-License-Identifier: Apache-2.0

//! HTTP trigger surface.
//!
//! `GET /sync` (and its legacy alias `/unazuki`) runs the pipeline once and
//! answers when it is done. `GET /health` reports browser liveness and
//! `GET /getlog` returns the in-memory diagnostic log.

use crate::audit::{DiagnosticLog, LogEntry};
use crate::pipeline::{Pipeline, RunOptions, RunReport};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use damlog::{Phase, PipelineError};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::future::Future;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// State shared by every handler.
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    pub log: DiagnosticLog,
}

/// Body of a successful `/sync`.
#[derive(Debug, Serialize)]
struct SyncResponse {
    success: bool,
    /// Rows appended.
    rows: usize,
    observed: usize,
    skipped: usize,
    duplicates: usize,
    run_id: String,
}

impl From<RunReport> for SyncResponse {
    fn from(report: RunReport) -> Self {
        Self {
            success: true,
            rows: report.appended,
            observed: report.observed,
            skipped: report.skipped,
            duplicates: report.duplicates,
            run_id: report.run_id,
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    success: bool,
    phase: Phase,
    message: String,
}

/// A failed run, answered with a status that tells the caller which side
/// to look at.
struct ApiError(PipelineError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let phase = self.0.phase();
        let status = match phase {
            Phase::Acquisition | Phase::Sync => StatusCode::BAD_GATEWAY,
            Phase::Shape => StatusCode::UNPROCESSABLE_ENTITY,
        };
        let body = ErrorBody {
            success: false,
            phase,
            message: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[derive(Debug, Deserialize)]
struct LogQuery {
    /// Only the most recent `limit` entries.
    limit: Option<usize>,
}

/// Build the axum Router with all endpoints.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/sync", get(handle_sync))
        .route("/unazuki", get(handle_sync))
        .route("/health", get(health))
        .route("/getlog", get(get_log))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Serve the router on `port` until `shutdown` resolves.
pub async fn start<F>(port: u16, state: Arc<AppState>, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = router(state);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("HTTP API listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

// ── Handlers ────────────────────────────────────────────────────

async fn handle_sync(State(state): State<Arc<AppState>>) -> Result<Json<SyncResponse>, ApiError> {
    match state.pipeline.run(RunOptions::default()).await {
        Ok(report) => Ok(Json(report.into())),
        Err(e) => {
            tracing::error!(phase = %e.phase(), "sync failed: {e}");
            Err(ApiError(e))
        }
    }
}

async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    let browser_alive = state.pipeline.sessions().is_alive().await;
    Json(json!({
        "status": "ok",
        "browserAlive": browser_alive,
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

async fn get_log(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LogQuery>,
) -> Json<Vec<LogEntry>> {
    let mut entries = state.log.entries();
    if let Some(limit) = query.limit {
        let excess = entries.len().saturating_sub(limit);
        entries.drain(..excess);
    }
    Json(entries)
}
