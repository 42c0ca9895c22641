// ---------------------------------------------------------------------------
// handlers/system.rs — Health, readiness, host stats, processes
// ---------------------------------------------------------------------------

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use serde_json::{json, Value};

use crate::models::{HealthResponse, HostSnapshot, ProcessList};
use crate::state::AppState;
use crate::system_monitor::{self, TerminateError, MAX_LISTED_PROCESSES};

use super::ApiError;

// ---------------------------------------------------------------------------
// Health Endpoints
// ---------------------------------------------------------------------------

#[utoipa::path(get, path = "/api/health", tag = "health",
    responses((status = 200, description = "Health check", body = HealthResponse))
)]
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: if state.is_ready() { "ok" } else { "starting" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        app: "HostWatch".to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
    })
}

/// GET /api/health/ready — lightweight readiness probe (no locks).
#[utoipa::path(get, path = "/api/health/ready", tag = "health",
    responses(
        (status = 200, description = "Service ready", body = Value),
        (status = 503, description = "Service not ready", body = Value)
    )
)]
pub async fn readiness(State(state): State<AppState>) -> axum::response::Response {
    use axum::http::StatusCode;

    let ready = state.is_ready();
    let uptime = state.start_time.elapsed().as_secs();
    let body = json!({ "ready": ready, "uptime_seconds": uptime });

    if ready {
        (StatusCode::OK, Json(body)).into_response()
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(body)).into_response()
    }
}

// ---------------------------------------------------------------------------
// Host telemetry
// ---------------------------------------------------------------------------

#[utoipa::path(get, path = "/api/stats", tag = "system",
    responses((status = 200, description = "Latest host snapshot", body = HostSnapshot))
)]
pub async fn system_stats(State(state): State<AppState>) -> Json<HostSnapshot> {
    let snap = state.system_monitor.read().await;
    Json(snap.clone())
}

#[utoipa::path(get, path = "/api/processes", tag = "system",
    responses((status = 200, description = "Busiest processes by CPU", body = ProcessList))
)]
pub async fn list_processes() -> Result<Json<ProcessList>, ApiError> {
    tokio::task::spawn_blocking(|| system_monitor::list_processes(MAX_LISTED_PROCESSES))
        .await
        .map(Json)
        .map_err(|e| ApiError::Internal(format!("process listing task failed: {e}")))
}

#[utoipa::path(delete, path = "/api/processes/{pid}", tag = "system",
    params(("pid" = String, Path, description = "Process id")),
    responses(
        (status = 200, description = "SIGTERM sent", body = Value),
        (status = 400, description = "Invalid PID", body = Value),
        (status = 404, description = "No such process", body = Value)
    )
)]
pub async fn kill_process(Path(raw_pid): Path<String>) -> Result<Json<Value>, ApiError> {
    let pid = parse_pid(&raw_pid).ok_or_else(|| ApiError::BadRequest("Invalid PID".into()))?;

    tokio::task::spawn_blocking(move || system_monitor::terminate_process(pid))
        .await
        .map_err(|e| ApiError::Internal(format!("terminate task failed: {e}")))?
        .map_err(|e| match e {
            TerminateError::NotFound(_) => ApiError::NotFound(e.to_string()),
            TerminateError::Unsupported | TerminateError::Failed(_) => ApiError::Internal(e.to_string()),
        })?;

    Ok(Json(json!({
        "success": true,
        "message": format!("Sent SIGTERM to process {pid}"),
    })))
}

/// PIDs 0 and 1 are never valid targets.
pub(crate) fn parse_pid(raw: &str) -> Option<u32> {
    raw.trim().parse::<u32>().ok().filter(|pid| *pid > 1)
}
