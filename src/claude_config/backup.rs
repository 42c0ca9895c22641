//! Timestamped snapshots of the two configuration documents.
//!
//! Layout: `<claude_home>/backups/<id>/{settings.json,.claude.json,metadata.json}`
//! where `id` is `YYYYMMDD-HHmmss-SSS` in local time. Only files that existed
//! at snapshot time are copied; a snapshot that copied nothing is removed.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use chrono::{DateTime, Local, SecondsFormat, TimeDelta, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::fs;
use utoipa::ToSchema;

use super::{ConfigError, ConfigPaths, GLOBAL_SETTINGS_FILE, PROJECT_CONFIG_FILE};

const METADATA_FILE: &str = "metadata.json";

/// How many consecutive milliseconds to probe for a free id.
const MAX_ID_ATTEMPTS: i64 = 1000;

static BACKUP_ID_RE: OnceLock<Regex> = OnceLock::new();

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct BackupFile {
    pub name: String,
    /// Size in bytes.
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BackupMetadata {
    pub id: String,
    pub created_at: String,
    pub files: Vec<BackupFile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_backup: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RestoreReport {
    pub restored_files: Vec<String>,
    pub pre_restore_backup: Option<String>,
}

pub struct BackupManager<'a> {
    paths: &'a ConfigPaths,
}

impl<'a> BackupManager<'a> {
    pub fn new(paths: &'a ConfigPaths) -> Self {
        Self { paths }
    }

    /// Snapshot the live documents. Fails with `NoContent` when neither exists.
    pub async fn create_backup(&self) -> Result<BackupMetadata, ConfigError> {
        let metadata = self.snapshot(None).await?.ok_or(ConfigError::NoContent)?;
        tracing::info!(id = %metadata.id, files = metadata.files.len(), "backup created");
        Ok(metadata)
    }

    /// All readable backups, newest first. Directories without parseable
    /// metadata are skipped.
    pub async fn list_backups(&self) -> Result<Vec<BackupMetadata>, ConfigError> {
        let root = self.paths.backup_root();
        let mut entries = match fs::read_dir(&root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(ConfigError::io(format!("failed to list {}", root.display()), e)),
        };

        let mut backups = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| ConfigError::io(format!("failed to list {}", root.display()), e))?
        {
            let is_dir = entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
            if !is_dir {
                continue;
            }
            match read_metadata(&entry.path()).await {
                Some(metadata) => backups.push(metadata),
                None => tracing::warn!(dir = %entry.path().display(), "skipping backup without readable metadata"),
            }
        }

        // Ids bumped within one millisecond share a createdAt; the id breaks the tie.
        backups.sort_by(|a, b| {
            created_at_key(b)
                .cmp(&created_at_key(a))
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(backups)
    }

    /// Restore backup `id` over the live documents.
    ///
    /// Validation and lookup failures happen before anything is touched. The
    /// current state is then snapshotted (tagged `autoBackup`), and each file
    /// present in the backup is copied over its live location. Files missing
    /// from the backup are left alone.
    pub async fn restore(&self, id: &str) -> Result<RestoreReport, ConfigError> {
        validate_backup_id(id)?;

        let dir = self.paths.backup_root().join(id);
        let exists = fs::try_exists(&dir)
            .await
            .map_err(|e| ConfigError::io(format!("failed to inspect {}", dir.display()), e))?;
        if !exists {
            return Err(ConfigError::NotFound(format!("backup \"{id}\" does not exist")));
        }
        if read_metadata(&dir).await.is_none() {
            return Err(ConfigError::NotFound(format!(
                "backup \"{id}\" has missing or corrupt metadata"
            )));
        }

        let pre_restore_backup = self
            .snapshot(Some(format!("Automatic snapshot before restoring backup {id}")))
            .await?
            .map(|m| m.id);

        let mut restored_files = Vec::new();
        for (name, live) in self.tracked_files() {
            match restore_file(&dir.join(name), &live).await {
                Ok(true) => restored_files.push(name.to_string()),
                Ok(false) => {}
                Err(source) => {
                    tracing::error!(id = %id, file = name, restored = ?restored_files, "restore interrupted: {}", source);
                    return Err(ConfigError::PartialRestore {
                        id: id.to_string(),
                        restored: restored_files,
                        pre_restore_backup,
                        source,
                    });
                }
            }
        }

        tracing::info!(id = %id, restored = ?restored_files, pre_restore = ?pre_restore_backup, "backup restored");
        Ok(RestoreReport {
            restored_files,
            pre_restore_backup,
        })
    }

    /// (name inside a backup directory, live location)
    fn tracked_files(&self) -> [(&'static str, PathBuf); 2] {
        [
            (GLOBAL_SETTINGS_FILE, self.paths.global_settings()),
            (PROJECT_CONFIG_FILE, self.paths.project_config()),
        ]
    }

    /// Copy whatever live documents exist into a fresh backup directory.
    /// `Ok(None)` means nothing existed and the directory was removed again.
    async fn snapshot(&self, reason: Option<String>) -> Result<Option<BackupMetadata>, ConfigError> {
        let (id, dir) = self.allocate_dir().await?;

        let files = match self.copy_live_files(&dir).await {
            Ok(files) => files,
            Err(e) => {
                if let Err(cleanup) = fs::remove_dir_all(&dir).await {
                    tracing::warn!(dir = %dir.display(), "failed to clean up partial backup: {}", cleanup);
                }
                return Err(e);
            }
        };

        if files.is_empty() {
            fs::remove_dir(&dir)
                .await
                .map_err(|e| ConfigError::io(format!("failed to remove empty backup {}", dir.display()), e))?;
            return Ok(None);
        }

        let metadata = BackupMetadata {
            id,
            created_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            files,
            auto_backup: reason.is_some().then_some(true),
            reason,
        };
        let bytes = serde_json::to_vec_pretty(&metadata)
            .map_err(|e| ConfigError::io("failed to serialize backup metadata", e.into()))?;
        let metadata_path = dir.join(METADATA_FILE);
        fs::write(&metadata_path, bytes)
            .await
            .map_err(|e| ConfigError::io(format!("failed to write {}", metadata_path.display()), e))?;

        Ok(Some(metadata))
    }

    /// Create `<backup_root>/<id>` for the current millisecond, moving forward
    /// one millisecond at a time if that id is already taken.
    async fn allocate_dir(&self) -> Result<(String, PathBuf), ConfigError> {
        let root = self.paths.backup_root();
        fs::create_dir_all(&root)
            .await
            .map_err(|e| ConfigError::io(format!("failed to create {}", root.display()), e))?;

        let now = Local::now();
        for offset in 0..MAX_ID_ATTEMPTS {
            let id = format_backup_id(now + TimeDelta::milliseconds(offset));
            let dir = root.join(&id);
            match fs::create_dir(&dir).await {
                Ok(()) => return Ok((id, dir)),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => {
                    return Err(ConfigError::io(format!("failed to create {}", dir.display()), e));
                }
            }
        }
        Err(ConfigError::io(
            "failed to allocate a backup id",
            std::io::Error::new(ErrorKind::AlreadyExists, "every candidate id is taken"),
        ))
    }

    async fn copy_live_files(&self, dir: &Path) -> Result<Vec<BackupFile>, ConfigError> {
        let mut files = Vec::new();
        for (name, live) in self.tracked_files() {
            let bytes = match fs::read(&live).await {
                Ok(bytes) => bytes,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(ConfigError::io(format!("failed to read {}", live.display()), e)),
            };
            let target = dir.join(name);
            fs::write(&target, &bytes)
                .await
                .map_err(|e| ConfigError::io(format!("failed to write {}", target.display()), e))?;
            files.push(BackupFile {
                name: name.to_string(),
                size: bytes.len() as u64,
            });
        }
        Ok(files)
    }
}

/// Backup ids are used verbatim as directory names, so only the exact
/// `YYYYMMDD-HHmmss-SSS` shape is accepted.
pub fn validate_backup_id(id: &str) -> Result<(), ConfigError> {
    let re = BACKUP_ID_RE.get_or_init(|| Regex::new(r"^[0-9]{8}-[0-9]{6}-[0-9]{3}$").unwrap());
    if re.is_match(id) {
        Ok(())
    } else {
        Err(ConfigError::Validation("invalid backup id format".into()))
    }
}

pub fn format_backup_id(at: DateTime<Local>) -> String {
    at.format("%Y%m%d-%H%M%S-%3f").to_string()
}

async fn read_metadata(dir: &Path) -> Option<BackupMetadata> {
    let bytes = fs::read(dir.join(METADATA_FILE)).await.ok()?;
    serde_json::from_slice(&bytes).ok()
}

/// Unparseable timestamps sort as oldest.
fn created_at_key(metadata: &BackupMetadata) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&metadata.created_at)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

/// Copy one backed-up file over its live location. `Ok(false)` when the
/// backup does not contain it.
async fn restore_file(source: &Path, live: &Path) -> std::io::Result<bool> {
    let bytes = match fs::read(source).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e),
    };
    if let Some(parent) = live.parent() {
        fs::create_dir_all(parent).await?;
    }
    fs::write(live, bytes).await?;
    Ok(true)
}
