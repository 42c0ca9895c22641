//! Assistant configuration management.
//!
//! Two JSON documents feed every operation here:
//! - the global settings file (`<claude_home>/settings.json`), the only
//!   document this module ever rewrites in place;
//! - the project file (`<project_dir>/.claude.json`), read-only except when a
//!   backup is restored over it.
//!
//! Nothing is cached between operations; each call re-reads the files.

pub mod backup;
pub mod instructions;
pub mod json_store;
pub mod merge;
pub mod path_guard;
pub mod registry;
pub mod settings;

use std::path::{Path, PathBuf};

pub use backup::{BackupFile, BackupManager, BackupMetadata, RestoreReport};
pub use path_guard::PathValidator;
pub use registry::{McpRegistry, ServerEntry, ServerSource};

/// File name of the global settings document inside `claude_home`.
pub const GLOBAL_SETTINGS_FILE: &str = "settings.json";
/// File name of the project document inside `project_dir`.
pub const PROJECT_CONFIG_FILE: &str = ".claude.json";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Failure taxonomy shared by every configuration operation.
///
/// "File does not exist" is never an error here; it is a valid empty state.
/// `Io` is reserved for everything else the filesystem throws at us.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    NotFound(String),

    #[error("no configuration files to back up")]
    NoContent,

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// A restore failed after the pre-restore snapshot was taken. Files listed
    /// in `restored` were already overwritten and are not rolled back.
    #[error("restore of backup {id} stopped after restoring {restored:?}: {source}")]
    PartialRestore {
        id: String,
        restored: Vec<String>,
        pre_restore_backup: Option<String>,
        #[source]
        source: std::io::Error,
    },
}

impl ConfigError {
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        ConfigError::Io {
            context: context.into(),
            source,
        }
    }
}

// ---------------------------------------------------------------------------
// Paths
// ---------------------------------------------------------------------------

/// Filesystem locations the configuration subsystem works against.
#[derive(Debug, Clone)]
pub struct ConfigPaths {
    /// User home directory (`~` expansion and path allow-list).
    pub home_dir: PathBuf,
    /// Per-user configuration root, usually `~/.claude`.
    pub claude_home: PathBuf,
    /// Directory the project document lives in, usually the working directory.
    pub project_dir: PathBuf,
}

impl ConfigPaths {
    pub fn new(
        home_dir: impl Into<PathBuf>,
        claude_home: impl Into<PathBuf>,
        project_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            home_dir: home_dir.into(),
            claude_home: claude_home.into(),
            project_dir: project_dir.into(),
        }
    }

    /// Standard layout: `claude_home` is `<home>/.claude`.
    pub fn under_home(home_dir: impl Into<PathBuf>, project_dir: impl Into<PathBuf>) -> Self {
        let home_dir = home_dir.into();
        let claude_home = home_dir.join(".claude");
        Self::new(home_dir, claude_home, project_dir)
    }

    pub fn global_settings(&self) -> PathBuf {
        self.claude_home.join(GLOBAL_SETTINGS_FILE)
    }

    pub fn project_config(&self) -> PathBuf {
        self.project_dir.join(PROJECT_CONFIG_FILE)
    }

    pub fn backup_root(&self) -> PathBuf {
        self.claude_home.join("backups")
    }

    /// Base directories free-text documents may live under.
    pub fn allowed_bases(&self) -> [&Path; 2] {
        [&self.home_dir, &self.project_dir]
    }
}
