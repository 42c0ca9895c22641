pub mod auth;
pub mod claude_config;
pub mod config;
pub mod handlers;
pub mod models;
pub mod state;
pub mod system_monitor;

use axum::routing::{delete, get, post, put};
use axum::{middleware, Json, Router};
use utoipa::OpenApi;

use state::AppState;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "HostWatch API",
        description = "Host telemetry and assistant configuration management"
    ),
    paths(
        handlers::health,
        handlers::readiness,
        handlers::system_stats,
        handlers::list_processes,
        handlers::kill_process,
        handlers::get_config,
        handlers::update_env,
        handlers::list_mcp_servers,
        handlers::add_mcp_server,
        handlers::update_mcp_server,
        handlers::delete_mcp_server,
        handlers::get_instructions,
        handlers::put_instructions,
        handlers::create_backup,
        handlers::list_backups,
        handlers::restore_backup,
    ),
    components(schemas(
        models::HealthResponse,
        models::HostSnapshot,
        models::CpuStats,
        models::MemoryStats,
        models::DiskStats,
        models::NetworkStats,
        models::OsInfo,
        models::ProcessInfo,
        models::ProcessList,
        claude_config::BackupFile,
        claude_config::BackupMetadata,
        claude_config::RestoreReport,
    )),
    tags(
        (name = "health", description = "Liveness and readiness"),
        (name = "system", description = "Host telemetry and processes"),
        (name = "claude-config", description = "Assistant settings, MCP servers, instructions and backups"),
    )
)]
pub struct ApiDoc;

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Build the application router with the given state.
/// Extracted from `main()` so integration tests can construct the app
/// without binding to a network port. The host monitor is spawned by the
/// binary, so a fresh router reports "not ready" until someone marks it.
pub fn create_router(state: AppState) -> Router {
    let protected = Router::new()
        // Host telemetry
        .route("/api/stats", get(handlers::system_stats))
        .route("/api/processes", get(handlers::list_processes))
        .route("/api/processes/{pid}", delete(handlers::kill_process))
        // Assistant configuration
        .route("/api/claude-config", get(handlers::get_config))
        .route("/api/claude-config/env", put(handlers::update_env))
        .route(
            "/api/claude-config/mcp",
            get(handlers::list_mcp_servers).post(handlers::add_mcp_server),
        )
        .route(
            "/api/claude-config/mcp/{name}",
            put(handlers::update_mcp_server).delete(handlers::delete_mcp_server),
        )
        .route(
            "/api/claude-config/claudemd",
            get(handlers::get_instructions).put(handlers::put_instructions),
        )
        .route("/api/claude-config/backup", post(handlers::create_backup))
        .route("/api/claude-config/backups", get(handlers::list_backups))
        .route("/api/claude-config/restore/{id}", post(handlers::restore_backup))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth::require_auth));

    Router::new()
        // Health
        .route("/api/health", get(handlers::health))
        .route("/api/health/ready", get(handlers::readiness))
        .route("/api/openapi.json", get(openapi_json))
        // WebSocket push (auth via ?token=)
        .route("/ws", get(handlers::ws_stats))
        .merge(protected)
        // Shared state
        .with_state(state)
}
