// ---------------------------------------------------------------------------
// handlers/ — HTTP surface
// Sub-modules for logical grouping; mod.rs re-exports all public items
// so that `crate::handlers::*` paths stay flat for lib.rs.
// ---------------------------------------------------------------------------

// Sub-modules are pub(crate) so utoipa __path_* types are accessible from lib.rs OpenApi derive.
pub(crate) mod claude_config;
pub(crate) mod streaming;
pub(crate) mod system;

// ── Re-exports ───────────────────────────────────────────────────────────────

// System / health / telemetry
pub use system::{health, kill_process, list_processes, readiness, system_stats};

// Assistant configuration
pub use claude_config::{
    add_mcp_server, create_backup, delete_mcp_server, get_config, get_instructions,
    list_backups, list_mcp_servers, put_instructions, restore_backup, update_env,
    update_mcp_server,
};

// WebSocket
pub use streaming::ws_stats;

// ── utoipa __path_* re-exports ───────────────────────────────────────────────
// The #[utoipa::path] attribute macro generates private structs like __path_health.
// The OpenApi derive in lib.rs expects them at `handlers::__path_health`, so we
// re-export them here.
pub use system::{
    __path_health, __path_kill_process, __path_list_processes, __path_readiness,
    __path_system_stats,
};
pub use claude_config::{
    __path_add_mcp_server, __path_create_backup, __path_delete_mcp_server, __path_get_config,
    __path_get_instructions, __path_list_backups, __path_list_mcp_servers,
    __path_put_instructions, __path_restore_backup, __path_update_env,
    __path_update_mcp_server,
};

// ── Shared types ─────────────────────────────────────────────────────────────

use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::claude_config::ConfigError;

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Centralized API error type for all handlers.
/// Logs full details server-side, returns sanitized JSON to the client.
///
/// Response format (structured):
/// ```json
/// {
///   "error": {
///     "code": "BAD_REQUEST",
///     "message": "Human-readable description",
///     "request_id": "uuid",
///     "details": { ... }       // null when absent
///   }
/// }
/// ```
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Machine-readable error code string for each variant.
    fn error_code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// HTTP status code for each variant.
    pub(crate) fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Sanitized message safe to return to clients. Internal errors never leak
    /// filesystem paths or OS error text.
    fn sanitized_message(&self) -> String {
        match self {
            ApiError::BadRequest(m) | ApiError::NotFound(m) | ApiError::Conflict(m) => m.clone(),
            ApiError::Internal(_) => "Internal server error".to_string(),
        }
    }

    /// Attach structured details to the error body.
    pub fn with_details(self, details: Value) -> ApiErrorWithDetails {
        ApiErrorWithDetails {
            error: self,
            details: Some(details),
        }
    }

    fn current_request_id() -> String {
        Uuid::new_v4().to_string()
    }

    fn respond(&self, details: Option<Value>) -> axum::response::Response {
        use axum::response::IntoResponse;

        let status = self.status_code();
        let request_id = Self::current_request_id();

        // Log full detail server-side (with request_id for correlation)
        if status.is_server_error() {
            tracing::error!(
                request_id = %request_id,
                code = self.error_code(),
                "API error ({}): {}",
                status.as_u16(),
                self
            );
        } else {
            tracing::warn!(
                request_id = %request_id,
                code = self.error_code(),
                "API error ({}): {}",
                status.as_u16(),
                self
            );
        }

        let body = json!({
            "error": {
                "code": self.error_code(),
                "message": self.sanitized_message(),
                "request_id": request_id,
                "details": details,
            }
        });
        (status, Json(body)).into_response()
    }
}

impl axum::response::IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        self.respond(None)
    }
}

/// ApiError with optional structured details attached.
/// Use `ApiError::Internal("msg".into()).with_details(json!({...}))` to construct.
#[derive(Debug)]
pub struct ApiErrorWithDetails {
    pub error: ApiError,
    pub details: Option<Value>,
}

impl axum::response::IntoResponse for ApiErrorWithDetails {
    fn into_response(self) -> axum::response::Response {
        self.error.respond(self.details)
    }
}

impl From<ApiError> for ApiErrorWithDetails {
    fn from(error: ApiError) -> Self {
        Self { error, details: None }
    }
}

impl From<ConfigError> for ApiErrorWithDetails {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::PartialRestore {
                id,
                restored,
                pre_restore_backup,
                source,
            } => {
                let message = format!(
                    "restore of backup {id} interrupted after {} file(s): {source}",
                    restored.len()
                );
                let details = json!({
                    "restoredFiles": restored,
                    "preRestoreBackup": pre_restore_backup,
                });
                ApiError::Internal(message).with_details(details)
            }
            other => ApiError::from(other).into(),
        }
    }
}

impl From<ConfigError> for ApiError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation(m) => ApiError::BadRequest(m),
            ConfigError::Conflict(m) => ApiError::Conflict(m),
            ConfigError::NotFound(m) => ApiError::NotFound(m),
            ConfigError::NoContent => ApiError::BadRequest(ConfigError::NoContent.to_string()),
            other @ (ConfigError::Io { .. } | ConfigError::PartialRestore { .. }) => {
                ApiError::Internal(other.to_string())
            }
        }
    }
}
