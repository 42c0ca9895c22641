//! Free-text instructions document (`CLAUDE.md`) at a caller-chosen path.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use tokio::fs;

use super::{ConfigError, PathValidator};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstructionsDocument {
    pub path: PathBuf,
    pub content: String,
    pub exists: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SavedDocument {
    pub path: PathBuf,
    pub backup: Option<PathBuf>,
}

/// Read the document at `raw_path`. A missing file reads as empty content.
pub async fn read_document(validator: &PathValidator, raw_path: &str) -> Result<InstructionsDocument, ConfigError> {
    let path = validator.validate(raw_path).await?;
    match fs::read_to_string(&path).await {
        Ok(content) => Ok(InstructionsDocument {
            path,
            content,
            exists: true,
        }),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(InstructionsDocument {
            path,
            content: String::new(),
            exists: false,
        }),
        Err(e) => Err(ConfigError::io(format!("failed to read {}", path.display()), e)),
    }
}

/// Write `content` to `raw_path`, keeping a timestamped copy of the previous
/// version next to it.
pub async fn write_document(
    validator: &PathValidator,
    raw_path: &str,
    content: &str,
) -> Result<SavedDocument, ConfigError> {
    let path = validator.validate(raw_path).await?;

    let backup_path = timestamped_backup_path(&path, Utc::now());
    let backup = match fs::copy(&path, &backup_path).await {
        Ok(_) => Some(backup_path),
        Err(e) if e.kind() == ErrorKind::NotFound => None,
        Err(e) => return Err(ConfigError::io(format!("failed to back up {}", path.display()), e)),
    };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| ConfigError::io(format!("failed to create directory {}", parent.display()), e))?;
    }
    fs::write(&path, content)
        .await
        .map_err(|e| ConfigError::io(format!("failed to write {}", path.display()), e))?;

    tracing::info!(path = %path.display(), backup = ?backup, "instructions saved");
    Ok(SavedDocument { path, backup })
}

/// `<path>.<UTC timestamp with ':' and '.' replaced by '-'>.bak`
pub fn timestamped_backup_path(path: &Path, at: DateTime<Utc>) -> PathBuf {
    let stamp = at
        .to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace([':', '.'], "-");
    let mut raw = path.as_os_str().to_owned();
    raw.push(format!(".{stamp}.bak"));
    PathBuf::from(raw)
}
