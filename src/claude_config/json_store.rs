//! Load/save of a single JSON object document.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tokio::fs;

use super::ConfigError;

/// Read `path` as a JSON object.
///
/// Missing files, unreadable files, malformed JSON and non-object roots all
/// yield an empty object. A missing config file is the common case, not an
/// error.
pub async fn read_json(path: &Path) -> Map<String, Value> {
    let bytes = match fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) => {
            if e.kind() != ErrorKind::NotFound {
                tracing::warn!(path = %path.display(), "config unreadable, treating as empty: {}", e);
            }
            return Map::new();
        }
    };

    match serde_json::from_slice::<Value>(&bytes) {
        Ok(Value::Object(map)) => map,
        Ok(_) => {
            tracing::warn!(path = %path.display(), "config root is not an object, treating as empty");
            Map::new()
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), "config is not valid JSON, treating as empty: {}", e);
            Map::new()
        }
    }
}

/// Write `doc` to `path` with 2-space indentation.
///
/// An existing file is first copied to `<path>.bak` (single slot, replaced on
/// every write). Returns the `.bak` path, or `None` when there was nothing to
/// back up.
pub async fn write_json(path: &Path, doc: &Map<String, Value>) -> Result<Option<PathBuf>, ConfigError> {
    let backup = backup_existing(path).await?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await.map_err(|e| {
            ConfigError::io(format!("failed to create directory {}", parent.display()), e)
        })?;
    }

    let bytes = serde_json::to_vec_pretty(doc).map_err(|e| {
        ConfigError::io(format!("failed to serialize {}", path.display()), e.into())
    })?;
    fs::write(path, bytes)
        .await
        .map_err(|e| ConfigError::io(format!("failed to write {}", path.display()), e))?;

    tracing::debug!(path = %path.display(), backup = ?backup, "config written");
    Ok(backup)
}

/// `<path>.bak`
pub fn single_slot_backup_path(path: &Path) -> PathBuf {
    let mut raw = path.as_os_str().to_owned();
    raw.push(".bak");
    PathBuf::from(raw)
}

async fn backup_existing(path: &Path) -> Result<Option<PathBuf>, ConfigError> {
    let backup = single_slot_backup_path(path);
    match fs::copy(path, &backup).await {
        Ok(_) => Ok(Some(backup)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(ConfigError::io(
            format!("failed to back up {} to {}", path.display(), backup.display()),
            e,
        )),
    }
}
