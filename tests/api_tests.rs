use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use hostwatch_backend::claude_config::ConfigPaths;
use hostwatch_backend::state::AppState;

/// Helper: a home dir and a project dir under a fresh temp root.
fn test_paths(root: &TempDir) -> ConfigPaths {
    let paths = ConfigPaths::under_home(root.path().join("home"), root.path().join("project"));
    std::fs::create_dir_all(&paths.home_dir).unwrap();
    std::fs::create_dir_all(&paths.project_dir).unwrap();
    paths
}

fn test_state(root: &TempDir) -> AppState {
    AppState::new(test_paths(root), None)
}

/// Helper: build a router from a test state.
fn app(state: AppState) -> axum::Router {
    hostwatch_backend::create_router(state)
}

/// Helper: collect a response body into a serde_json::Value.
async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn send_json(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn empty(method: &str, uri: &str) -> Request<Body> {
    Request::builder().method(method).uri(uri).body(Body::empty()).unwrap()
}

async fn call(state: &AppState, request: Request<Body>) -> (StatusCode, Value) {
    let response = app(state.clone()).oneshot(request).await.unwrap();
    let status = response.status();
    (status, body_json(response).await)
}

fn read_global(state: &AppState) -> Value {
    serde_json::from_str(&std::fs::read_to_string(state.paths.global_settings()).unwrap()).unwrap()
}

// ═══════════════════════════════════════════════════════════════════════════
//  Health
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn health_reports_starting_before_first_sample() {
    let root = TempDir::new().unwrap();
    let (status, body) = call(&test_state(&root), get("/api/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "starting");
    assert_eq!(body["app"], "HostWatch");
    assert!(body["uptime_seconds"].is_u64());
}

#[tokio::test]
async fn readiness_flips_after_mark_ready() {
    let root = TempDir::new().unwrap();
    let state = test_state(&root);

    let (status, body) = call(&state, get("/api/health/ready")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["ready"], false);

    state.mark_ready();
    let (status, body) = call(&state, get("/api/health/ready")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ready"], true);
}

// ═══════════════════════════════════════════════════════════════════════════
//  Telemetry
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn stats_returns_current_snapshot() {
    let root = TempDir::new().unwrap();
    let (status, body) = call(&test_state(&root), get("/api/stats")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["os"]["platform"], std::env::consts::OS);
    assert!(body["cpu"]["cores"].is_array());
    assert!(body["disk"].is_array());
}

#[tokio::test]
async fn kill_rejects_invalid_pids() {
    let root = TempDir::new().unwrap();
    let state = test_state(&root);

    for pid in ["abc", "0", "1", "-3"] {
        let (status, body) = call(&state, empty("DELETE", &format!("/api/processes/{pid}"))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "pid {pid}");
        assert_eq!(body["error"]["message"], "Invalid PID");
    }
}

#[tokio::test]
async fn kill_unknown_pid_is_404() {
    let root = TempDir::new().unwrap();
    let uri = format!("/api/processes/{}", u32::MAX - 7);
    let (status, body) = call(&test_state(&root), empty("DELETE", &uri)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

// ═══════════════════════════════════════════════════════════════════════════
//  Merged view & env
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn empty_state_merges_to_empty_sections() {
    let root = TempDir::new().unwrap();
    let (status, body) = call(&test_state(&root), get("/api/claude-config")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "env": {}, "mcpServers": {} }));
}

#[tokio::test]
async fn project_values_override_global_values() {
    let root = TempDir::new().unwrap();
    let state = test_state(&root);
    std::fs::create_dir_all(&state.paths.claude_home).unwrap();
    std::fs::write(
        state.paths.global_settings(),
        r#"{"model":"a","env":{"A":"1","B":"2"},"mcpServers":{}}"#,
    )
    .unwrap();
    std::fs::write(state.paths.project_config(), r#"{"env":{"B":"3"},"theme":"dark"}"#).unwrap();

    let (_, body) = call(&state, get("/api/claude-config")).await;
    assert_eq!(body["env"], json!({ "A": "1", "B": "3" }));
    assert_eq!(body["model"], "a");
    assert_eq!(body["theme"], "dark");
}

#[tokio::test]
async fn env_update_writes_global_and_reports_backup() {
    let root = TempDir::new().unwrap();
    let state = test_state(&root);

    let (status, body) = call(&state, send_json("PUT", "/api/claude-config/env", json!({ "env": { "K": "v" } }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["env"], json!({ "K": "v" }));
    assert!(body["_backup"].is_null(), "first write has nothing to back up");

    let (_, body) = call(&state, send_json("PUT", "/api/claude-config/env", json!({ "env": { "K": "w" } }))).await;
    assert!(body["_backup"].as_str().unwrap().ends_with("settings.json.bak"));
    assert_eq!(read_global(&state)["env"], json!({ "K": "w" }));
}

#[tokio::test]
async fn env_update_requires_env_object() {
    let root = TempDir::new().unwrap();
    let state = test_state(&root);

    for body in [json!({}), json!({ "env": "x" }), json!({ "env": [1] })] {
        let (status, resp) = call(&state, send_json("PUT", "/api/claude-config/env", body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(resp["error"]["code"], "BAD_REQUEST");
    }
    assert!(!state.paths.global_settings().exists());
}

// ═══════════════════════════════════════════════════════════════════════════
//  MCP servers
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn add_then_list_then_conflict() {
    let root = TempDir::new().unwrap();
    let state = test_state(&root);
    let server = json!({ "name": "fs", "command": "npx", "args": ["-y", "server-fs"] });

    let (status, body) = call(&state, send_json("POST", "/api/claude-config/mcp", server.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["server"], json!({ "name": "fs", "command": "npx", "args": ["-y", "server-fs"] }));
    assert!(body["message"].as_str().unwrap().contains("fs"));

    let (status, body) = call(&state, get("/api/claude-config/mcp")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["servers"][0]["name"], "fs");
    assert_eq!(body["servers"][0]["source"], "global");

    let before = std::fs::read(state.paths.global_settings()).unwrap();
    let (status, body) = call(&state, send_json("POST", "/api/claude-config/mcp", server)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "CONFLICT");
    assert_eq!(std::fs::read(state.paths.global_settings()).unwrap(), before);
}

#[tokio::test]
async fn add_validates_before_writing() {
    let root = TempDir::new().unwrap();
    let state = test_state(&root);

    for body in [
        json!({ "command": "x" }),
        json!({ "name": "a" }),
        json!({ "name": "", "command": "x" }),
        json!({ "name": "a", "command": "x", "args": "not-a-list" }),
        json!({ "name": "a", "command": "x", "env": ["K"] }),
    ] {
        let (status, _) = call(&state, send_json("POST", "/api/claude-config/mcp", body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
    assert!(!state.paths.global_settings().exists());
}

#[tokio::test]
async fn project_servers_are_listed_with_project_source() {
    let root = TempDir::new().unwrap();
    let state = test_state(&root);
    std::fs::write(
        state.paths.project_config(),
        r#"{"mcpServers":{"local":{"command":"./run.sh"}}}"#,
    )
    .unwrap();
    call(&state, send_json("POST", "/api/claude-config/mcp", json!({ "name": "g", "command": "x" }))).await;

    let (_, body) = call(&state, get("/api/claude-config/mcp")).await;
    let servers = body["servers"].as_array().unwrap();
    assert_eq!(servers.len(), 2);
    assert_eq!(servers[0]["name"], "g");
    assert_eq!(servers[1], json!({ "name": "local", "command": "./run.sh", "source": "project" }));
}

#[tokio::test]
async fn update_renames_and_merges_fields() {
    let root = TempDir::new().unwrap();
    let state = test_state(&root);
    call(&state, send_json("POST", "/api/claude-config/mcp", json!({ "name": "a", "command": "x", "args": ["1"] }))).await;
    call(&state, send_json("POST", "/api/claude-config/mcp", json!({ "name": "b", "command": "y" }))).await;

    let (status, body) = call(
        &state,
        send_json("PUT", "/api/claude-config/mcp/a", json!({ "newName": "c", "command": "z" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["server"], json!({ "name": "c", "command": "z", "args": ["1"] }));
    assert!(body["_backup"].is_string());

    let servers = read_global(&state)["mcpServers"].clone();
    let names: Vec<&str> = servers.as_object().unwrap().keys().map(String::as_str).collect();
    assert_eq!(names, ["b", "c"]);
}

#[tokio::test]
async fn update_reports_missing_and_conflicting_names() {
    let root = TempDir::new().unwrap();
    let state = test_state(&root);
    call(&state, send_json("POST", "/api/claude-config/mcp", json!({ "name": "a", "command": "x" }))).await;
    call(&state, send_json("POST", "/api/claude-config/mcp", json!({ "name": "b", "command": "y" }))).await;

    let (status, _) = call(&state, send_json("PUT", "/api/claude-config/mcp/nope", json!({ "command": "z" }))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = call(&state, send_json("PUT", "/api/claude-config/mcp/a", json!({ "newName": "b" }))).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = call(&state, send_json("PUT", "/api/claude-config/mcp/a", json!({ "command": 5 }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn delete_removes_server_once() {
    let root = TempDir::new().unwrap();
    let state = test_state(&root);
    call(&state, send_json("POST", "/api/claude-config/mcp", json!({ "name": "a", "command": "x" }))).await;

    let (status, body) = call(&state, empty("DELETE", "/api/claude-config/mcp/a")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["_backup"].is_string());
    assert_eq!(read_global(&state)["mcpServers"], json!({}));

    let (status, _) = call(&state, empty("DELETE", "/api/claude-config/mcp/a")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ═══════════════════════════════════════════════════════════════════════════
//  Instructions documents
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn instructions_round_trip_with_timestamped_backup() {
    let root = TempDir::new().unwrap();
    let state = test_state(&root);
    let put = |content: &str| {
        send_json(
            "PUT",
            "/api/claude-config/claudemd",
            json!({ "path": "~/.claude/CLAUDE.md", "content": content }),
        )
    };

    let (status, body) = call(&state, get("/api/claude-config/claudemd?path=~/.claude/CLAUDE.md")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["exists"], false);
    assert_eq!(body["content"], "");

    let (status, body) = call(&state, put("# one")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["_backup"].is_null());

    let (_, body) = call(&state, put("# two")).await;
    let backup = body["_backup"].as_str().unwrap().to_string();
    assert!(backup.ends_with(".bak"));
    assert_eq!(std::fs::read_to_string(backup).unwrap(), "# one");

    let (_, body) = call(&state, get("/api/claude-config/claudemd?path=~/.claude/CLAUDE.md")).await;
    assert_eq!(body["exists"], true);
    assert_eq!(body["content"], "# two");
}

#[tokio::test]
async fn instructions_paths_are_guarded() {
    let root = TempDir::new().unwrap();
    let state = test_state(&root);

    let (status, _) = call(&state, get("/api/claude-config/claudemd")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    for path in ["../../etc/passwd.md", "notes.txt", "/etc/motd.md"] {
        let (status, body) = call(
            &state,
            send_json("PUT", "/api/claude-config/claudemd", json!({ "path": path, "content": "x" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "path {path}");
        assert_eq!(body["error"]["code"], "BAD_REQUEST");
    }

    let (status, _) = call(
        &state,
        send_json("PUT", "/api/claude-config/claudemd", json!({ "path": "CLAUDE.md" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ═══════════════════════════════════════════════════════════════════════════
//  Backups
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn backup_without_files_is_rejected() {
    let root = TempDir::new().unwrap();
    let state = test_state(&root);

    let (status, _) = call(&state, empty("POST", "/api/claude-config/backup")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = call(&state, get("/api/claude-config/backups")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "backups": [] }));
}

#[tokio::test]
async fn restore_rejects_bad_and_unknown_ids_without_side_effects() {
    let root = TempDir::new().unwrap();
    let state = test_state(&root);
    call(&state, send_json("POST", "/api/claude-config/mcp", json!({ "name": "a", "command": "x" }))).await;
    let before = std::fs::read(state.paths.global_settings()).unwrap();

    let (status, _) = call(&state, empty("POST", "/api/claude-config/restore/not-an-id")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = call(&state, empty("POST", "/api/claude-config/restore/20000101-000000-000")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");

    assert_eq!(std::fs::read(state.paths.global_settings()).unwrap(), before);
    assert!(!state.paths.backup_root().exists());
}

#[tokio::test]
async fn add_backup_delete_restore_brings_server_back() {
    let root = TempDir::new().unwrap();
    let state = test_state(&root);
    std::fs::write(state.paths.project_config(), r#"{"theme":"dark"}"#).unwrap();

    let (status, _) = call(
        &state,
        send_json("POST", "/api/claude-config/mcp", json!({ "name": "fs", "command": "npx" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = call(&state, empty("POST", "/api/claude-config/backup")).await;
    assert_eq!(status, StatusCode::CREATED);
    let id = body["backup"]["id"].as_str().unwrap().to_string();
    let files: Vec<&str> = body["backup"]["files"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["name"].as_str().unwrap())
        .collect();
    assert_eq!(files, ["settings.json", ".claude.json"]);

    let (status, _) = call(&state, empty("DELETE", "/api/claude-config/mcp/fs")).await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = call(&state, get("/api/claude-config/mcp")).await;
    assert_eq!(body["servers"], json!([]));

    let (status, body) = call(&state, empty("POST", &format!("/api/claude-config/restore/{id}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["restoredFiles"], json!(["settings.json", ".claude.json"]));
    let pre_restore = body["preRestoreBackup"].as_str().unwrap().to_string();
    assert_ne!(pre_restore, id);

    let (_, body) = call(&state, get("/api/claude-config/mcp")).await;
    assert_eq!(body["servers"][0]["name"], "fs");

    let (_, body) = call(&state, get("/api/claude-config/backups")).await;
    let backups = body["backups"].as_array().unwrap();
    assert_eq!(backups.len(), 2);
    assert_eq!(backups[0]["id"], pre_restore.as_str());
    assert_eq!(backups[0]["autoBackup"], true);
    assert_eq!(backups[1]["id"], id.as_str());
    assert!(backups[1].get("autoBackup").is_none());
}

#[tokio::test]
async fn interrupted_restore_is_500_with_progress_details() {
    let root = TempDir::new().unwrap();
    let state = test_state(&root);
    std::fs::write(state.paths.project_config(), r#"{"theme":"dark"}"#).unwrap();
    call(
        &state,
        send_json("POST", "/api/claude-config/mcp", json!({ "name": "fs", "command": "npx" })),
    )
    .await;

    let (_, body) = call(&state, empty("POST", "/api/claude-config/backup")).await;
    let id = body["backup"]["id"].as_str().unwrap().to_string();
    let project_copy = state.paths.backup_root().join(&id).join(".claude.json");
    std::fs::remove_file(&project_copy).unwrap();
    std::fs::create_dir(&project_copy).unwrap();

    call(&state, empty("DELETE", "/api/claude-config/mcp/fs")).await;

    let (status, body) = call(&state, empty("POST", &format!("/api/claude-config/restore/{id}"))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"]["code"], "INTERNAL_ERROR");
    assert_eq!(body["error"]["message"], "Internal server error");
    assert_eq!(body["error"]["details"]["restoredFiles"], json!(["settings.json"]));
    let pre_restore = body["error"]["details"]["preRestoreBackup"].as_str().unwrap();
    assert_ne!(pre_restore, id);

    // settings.json was copied back before the failure and stays restored.
    assert_eq!(read_global(&state)["mcpServers"]["fs"]["command"], "npx");
}

// ═══════════════════════════════════════════════════════════════════════════
//  Auth
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn auth_secret_protects_api_but_not_health() {
    let root = TempDir::new().unwrap();
    let state = AppState::new(test_paths(&root), Some("s3cret".to_string()));

    let response = app(state.clone()).oneshot(get("/api/claude-config")).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let wrong = Request::builder()
        .uri("/api/claude-config")
        .header("authorization", "Bearer nope")
        .body(Body::empty())
        .unwrap();
    assert_eq!(app(state.clone()).oneshot(wrong).await.unwrap().status(), StatusCode::UNAUTHORIZED);

    let right = Request::builder()
        .uri("/api/claude-config")
        .header("authorization", "Bearer s3cret")
        .body(Body::empty())
        .unwrap();
    assert_eq!(app(state.clone()).oneshot(right).await.unwrap().status(), StatusCode::OK);

    let response = app(state.clone()).oneshot(get("/api/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn websocket_upgrade_requires_token_when_secret_set() {
    let root = TempDir::new().unwrap();
    let state = AppState::new(test_paths(&root), Some("s3cret".to_string()));

    let response = app(state).oneshot(get("/ws")).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn openapi_document_is_public() {
    let root = TempDir::new().unwrap();
    let state = AppState::new(test_paths(&root), Some("s3cret".to_string()));
    let (status, body) = call(&state, get("/api/openapi.json")).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["paths"]["/api/claude-config/mcp"].is_object());
}
