//! Authorization of caller-supplied document paths.
//!
//! Canonicalization follows the same approach as the file readers: resolve
//! what exists on disk (symlinks included), then re-join the components that
//! do not exist yet so that new files can still be written.

use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};

use super::{ConfigError, ConfigPaths};

/// Extension (without the dot) that free-text documents must carry.
const REQUIRED_EXTENSION: &str = "md";

#[derive(Debug, Clone)]
pub struct PathValidator {
    home_dir: PathBuf,
    working_dir: PathBuf,
    allowed_bases: Vec<PathBuf>,
}

impl PathValidator {
    /// `working_dir` anchors relative paths. `allowed_bases` are canonicalized
    /// once here, blocking; construct at startup, not on a request path.
    pub fn new(home_dir: PathBuf, working_dir: PathBuf, allowed_bases: &[&Path]) -> Self {
        let allowed_bases = allowed_bases
            .iter()
            .map(|base| resolve_existing_blocking(&normalize(base)))
            .collect();
        Self {
            home_dir,
            working_dir,
            allowed_bases,
        }
    }

    pub fn from_paths(paths: &ConfigPaths) -> Self {
        Self::new(
            paths.home_dir.clone(),
            paths.project_dir.clone(),
            &paths.allowed_bases(),
        )
    }

    /// Validate `raw` and return the absolute path it designates.
    ///
    /// Rejection order: empty input, any textual `..`, wrong extension,
    /// outside every allowed base.
    pub async fn validate(&self, raw: &str) -> Result<PathBuf, ConfigError> {
        if raw.trim().is_empty() {
            return Err(ConfigError::Validation("path must not be empty".into()));
        }
        // Textual check on purpose: `a/../a/x.md` is rejected too.
        if raw.contains("..") {
            return Err(ConfigError::Validation("path must not contain '..'".into()));
        }

        let resolved = resolve_existing(&normalize(&self.absolutize(raw))).await;

        let lower = resolved.to_string_lossy().to_lowercase();
        if !lower.ends_with(&format!(".{REQUIRED_EXTENSION}")) {
            return Err(ConfigError::Validation(format!(
                "only .{REQUIRED_EXTENSION} files may be read or written"
            )));
        }

        // Path::starts_with compares whole components, so `/home/al` does not
        // admit `/home/alice/x.md`.
        if !self.allowed_bases.iter().any(|base| resolved.starts_with(base)) {
            return Err(ConfigError::Validation(
                "path is outside the allowed directories".into(),
            ));
        }

        Ok(resolved)
    }

    fn absolutize(&self, raw: &str) -> PathBuf {
        let expanded = match raw.strip_prefix('~') {
            Some(rest) => self.home_dir.join(rest.trim_start_matches(['/', '\\'])),
            None => PathBuf::from(raw),
        };
        if expanded.is_absolute() {
            expanded
        } else {
            self.working_dir.join(expanded)
        }
    }
}

/// Drop `.` segments. `..` never reaches this point.
fn normalize(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}

/// Canonicalize the longest existing ancestor of `path` and re-append the rest.
async fn resolve_existing(path: &Path) -> PathBuf {
    let mut existing = path;
    let mut missing = Vec::new();
    loop {
        if let Ok(canonical) = tokio::fs::canonicalize(existing).await {
            return rejoin(canonical, &missing);
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                missing.push(name.to_os_string());
                existing = parent;
            }
            _ => return path.to_path_buf(),
        }
    }
}

/// Same walk as `resolve_existing`, for construction outside the runtime.
fn resolve_existing_blocking(path: &Path) -> PathBuf {
    let mut existing = path;
    let mut missing = Vec::new();
    loop {
        if let Ok(canonical) = std::fs::canonicalize(existing) {
            return rejoin(canonical, &missing);
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                missing.push(name.to_os_string());
                existing = parent;
            }
            _ => return path.to_path_buf(),
        }
    }
}

/// `missing` holds the trailing segments innermost-first.
fn rejoin(mut out: PathBuf, missing: &[OsString]) -> PathBuf {
    for segment in missing.iter().rev() {
        out.push(segment);
    }
    out
}
