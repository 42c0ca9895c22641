// hostwatch - Application state

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use tokio::sync::{RwLock, broadcast};

use crate::claude_config::{ConfigPaths, PathValidator};
use crate::config::AppConfig;
use crate::models::HostSnapshot;

/// Buffered push frames per subscriber before it starts lagging.
const STATS_CHANNEL_CAPACITY: usize = 16;

/// Central application state. Clone-friendly: everything shared is behind an Arc.
#[derive(Clone)]
pub struct AppState {
    /// Locations of the global/project documents and the backup root.
    pub paths: Arc<ConfigPaths>,
    /// Allow-list for free-text document paths, built once from `paths`.
    pub path_validator: Arc<PathValidator>,
    /// Latest host telemetry, refreshed by `system_monitor::spawn`.
    pub system_monitor: Arc<RwLock<HostSnapshot>>,
    /// Serialized stats frames for WebSocket subscribers.
    pub stats_tx: broadcast::Sender<String>,
    pub start_time: Instant,
    /// `true` once the monitor has taken its first sample.
    pub ready: Arc<AtomicBool>,
    /// Optional auth secret from AUTH_SECRET env. None = dev mode (no auth).
    pub auth_secret: Option<String>,
}

impl AppState {
    pub fn new(paths: ConfigPaths, auth_secret: Option<String>) -> Self {
        let path_validator = PathValidator::from_paths(&paths);
        let (stats_tx, _) = broadcast::channel(STATS_CHANNEL_CAPACITY);

        if auth_secret.is_some() {
            tracing::info!("AUTH_SECRET configured — authentication enabled");
        } else {
            tracing::info!("AUTH_SECRET not set — authentication disabled (dev mode)");
        }
        tracing::info!(
            global = %paths.global_settings().display(),
            project = %paths.project_config().display(),
            backups = %paths.backup_root().display(),
            "AppState initialised"
        );

        Self {
            paths: Arc::new(paths),
            path_validator: Arc::new(path_validator),
            system_monitor: Arc::new(RwLock::new(HostSnapshot::default())),
            stats_tx,
            start_time: Instant::now(),
            ready: Arc::new(AtomicBool::new(false)),
            auth_secret,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.paths.clone(), config.auth_secret.clone())
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Relaxed)
    }

    pub fn mark_ready(&self) {
        if !self.ready.swap(true, Ordering::Relaxed) {
            tracing::info!("Backend marked as READY");
        }
    }
}
