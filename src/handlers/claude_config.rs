// ---------------------------------------------------------------------------
// handlers/claude_config.rs — assistant configuration: merged view, env,
// MCP server registry, CLAUDE.md documents, backups
// ---------------------------------------------------------------------------

use std::path::Path;

use axum::extract::{Path as UrlPath, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::claude_config::{instructions, settings, BackupManager, McpRegistry};
use crate::state::AppState;

use super::{ApiError, ApiErrorWithDetails};

/// `_backup` field value: the single-slot `.bak` written, or null on first write.
fn backup_field(backup: Option<&Path>) -> Value {
    backup
        .map(|p| Value::String(p.display().to_string()))
        .unwrap_or(Value::Null)
}

// ---------------------------------------------------------------------------
// Merged view & env
// ---------------------------------------------------------------------------

#[utoipa::path(get, path = "/api/claude-config", tag = "claude-config",
    responses((status = 200, description = "Global settings deep-merged with the project file", body = Value))
)]
pub async fn get_config(State(state): State<AppState>) -> Json<Value> {
    Json(Value::Object(settings::merged_config(&state.paths).await))
}

#[utoipa::path(put, path = "/api/claude-config/env", tag = "claude-config",
    request_body = Value,
    responses(
        (status = 200, description = "Merged view after replacing the global env", body = Value),
        (status = 400, description = "Missing or non-object env", body = Value)
    )
)]
pub async fn update_env(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let (mut merged, backup) = settings::update_env(&state.paths, &body).await?;
    merged.insert("_backup".into(), backup_field(backup.as_deref()));
    Ok(Json(Value::Object(merged)))
}

// ---------------------------------------------------------------------------
// MCP server registry
// ---------------------------------------------------------------------------

#[utoipa::path(get, path = "/api/claude-config/mcp", tag = "claude-config",
    responses((status = 200, description = "Global and project MCP servers, project overriding global", body = Value))
)]
pub async fn list_mcp_servers(State(state): State<AppState>) -> Json<Value> {
    let servers = McpRegistry::new(&state.paths).list().await;
    Json(json!({ "servers": servers }))
}

#[utoipa::path(post, path = "/api/claude-config/mcp", tag = "claude-config",
    request_body = Value,
    responses(
        (status = 201, description = "Server added to the global registry", body = Value),
        (status = 400, description = "Invalid server definition", body = Value),
        (status = 409, description = "Server name already in use", body = Value)
    )
)]
pub async fn add_mcp_server(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, ApiError> {
    let change = McpRegistry::new(&state.paths).add(&body).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": format!("MCP server \"{}\" added", change.server.name),
            "server": change.server,
            "_backup": backup_field(change.backup.as_deref()),
        })),
    ))
}

#[utoipa::path(put, path = "/api/claude-config/mcp/{name}", tag = "claude-config",
    params(("name" = String, Path, description = "Current server name")),
    request_body = Value,
    responses(
        (status = 200, description = "Server updated or renamed", body = Value),
        (status = 404, description = "Unknown server", body = Value),
        (status = 409, description = "Rename target already in use", body = Value)
    )
)]
pub async fn update_mcp_server(
    State(state): State<AppState>,
    UrlPath(name): UrlPath<String>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let change = McpRegistry::new(&state.paths).update(&name, &body).await?;
    Ok(Json(json!({
        "message": format!("MCP server \"{}\" updated", change.server.name),
        "server": change.server,
        "_backup": backup_field(change.backup.as_deref()),
    })))
}

#[utoipa::path(delete, path = "/api/claude-config/mcp/{name}", tag = "claude-config",
    params(("name" = String, Path, description = "Server name")),
    responses(
        (status = 200, description = "Server removed", body = Value),
        (status = 404, description = "Unknown server", body = Value)
    )
)]
pub async fn delete_mcp_server(
    State(state): State<AppState>,
    UrlPath(name): UrlPath<String>,
) -> Result<Json<Value>, ApiError> {
    let backup = McpRegistry::new(&state.paths).delete(&name).await?;
    Ok(Json(json!({
        "message": format!("MCP server \"{name}\" deleted"),
        "_backup": backup_field(backup.as_deref()),
    })))
}

// ---------------------------------------------------------------------------
// Instructions documents
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct InstructionsQuery {
    pub path: Option<String>,
}

#[utoipa::path(get, path = "/api/claude-config/claudemd", tag = "claude-config",
    params(("path" = String, Query, description = "Document path (`~`, relative or absolute, must end in .md)")),
    responses(
        (status = 200, description = "Document content; missing files read as empty", body = Value),
        (status = 400, description = "Path rejected", body = Value)
    )
)]
pub async fn get_instructions(
    State(state): State<AppState>,
    Query(query): Query<InstructionsQuery>,
) -> Result<Json<Value>, ApiError> {
    let raw = query
        .path
        .ok_or_else(|| ApiError::BadRequest("path query parameter is required".into()))?;
    let doc = instructions::read_document(&state.path_validator, &raw).await?;
    Ok(Json(json!(doc)))
}

#[utoipa::path(put, path = "/api/claude-config/claudemd", tag = "claude-config",
    request_body = Value,
    responses(
        (status = 200, description = "Document written; previous version kept as a timestamped .bak", body = Value),
        (status = 400, description = "Path rejected or content missing", body = Value)
    )
)]
pub async fn put_instructions(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let raw = body
        .get("path")
        .and_then(Value::as_str)
        .ok_or_else(|| ApiError::BadRequest("path must be a string".into()))?;
    let content = body
        .get("content")
        .and_then(Value::as_str)
        .ok_or_else(|| ApiError::BadRequest("content must be a string".into()))?;

    let saved = instructions::write_document(&state.path_validator, raw, content).await?;
    Ok(Json(json!({
        "message": "Instructions saved",
        "path": saved.path,
        "_backup": backup_field(saved.backup.as_deref()),
    })))
}

// ---------------------------------------------------------------------------
// Backups
// ---------------------------------------------------------------------------

#[utoipa::path(post, path = "/api/claude-config/backup", tag = "claude-config",
    responses(
        (status = 201, description = "Snapshot of the live configuration files", body = Value),
        (status = 400, description = "Neither configuration file exists", body = Value)
    )
)]
pub async fn create_backup(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let metadata = BackupManager::new(&state.paths).create_backup().await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": format!("Backup {} created", metadata.id),
            "backup": metadata,
        })),
    ))
}

#[utoipa::path(get, path = "/api/claude-config/backups", tag = "claude-config",
    responses((status = 200, description = "Backups, newest first", body = Value))
)]
pub async fn list_backups(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let backups = BackupManager::new(&state.paths).list_backups().await?;
    Ok(Json(json!({ "backups": backups })))
}

#[utoipa::path(post, path = "/api/claude-config/restore/{id}", tag = "claude-config",
    params(("id" = String, Path, description = "Backup id (YYYYMMDD-HHMMSS-mmm)")),
    responses(
        (status = 200, description = "Files restored; live files were snapshotted first", body = Value),
        (status = 400, description = "Malformed backup id", body = Value),
        (status = 404, description = "Unknown backup", body = Value),
        (status = 500, description = "Restore interrupted; details list what was already restored", body = Value)
    )
)]
pub async fn restore_backup(
    State(state): State<AppState>,
    UrlPath(id): UrlPath<String>,
) -> Result<Json<Value>, ApiErrorWithDetails> {
    let report = BackupManager::new(&state.paths).restore(&id).await?;
    Ok(Json(json!({
        "message": format!("Backup {id} restored"),
        "restoredFiles": report.restored_files,
        "preRestoreBackup": report.pre_restore_backup,
    })))
}
