//! Operations on the merged view and on the global `env` map.

use std::path::PathBuf;

use serde_json::{Map, Value};

use super::json_store::{read_json, write_json};
use super::merge::merged_view;
use super::{ConfigError, ConfigPaths};

/// Read both documents concurrently and return the merged view.
pub async fn merged_config(paths: &ConfigPaths) -> Map<String, Value> {
    let (global_path, project_path) = (paths.global_settings(), paths.project_config());
    let (global, project) = tokio::join!(read_json(&global_path), read_json(&project_path));
    merged_view(&global, &project)
}

/// Replace the global `env` map with the `env` field of `body`.
///
/// Returns the merged view after the write plus the `.bak` taken.
pub async fn update_env(
    paths: &ConfigPaths,
    body: &Value,
) -> Result<(Map<String, Value>, Option<PathBuf>), ConfigError> {
    let env = match body.get("env") {
        None => return Err(ConfigError::Validation("request body must contain env".into())),
        Some(Value::Object(env)) => env.clone(),
        Some(_) => return Err(ConfigError::Validation("env must be an object".into())),
    };

    let global_path = paths.global_settings();
    let mut global = read_json(&global_path).await;
    global.insert("env".into(), Value::Object(env));
    let backup = write_json(&global_path, &global).await?;
    tracing::info!(backup = ?backup, "global env updated");

    let project = read_json(&paths.project_config()).await;
    Ok((merged_view(&global, &project), backup))
}
