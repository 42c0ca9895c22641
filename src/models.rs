use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub app: String,
    pub uptime_seconds: u64,
}

// ---------------------------------------------------------------------------
// Host telemetry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct CpuStats {
    /// Average usage across all cores, percent.
    pub usage: f32,
    /// Per-core usage, percent.
    pub cores: Vec<f32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MemoryStats {
    pub total: u64,
    pub used: u64,
    pub free: u64,
    pub available: u64,
    pub used_percent: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DiskStats {
    pub fs: String,
    #[serde(rename = "type")]
    pub fs_type: String,
    pub mount: String,
    pub size: u64,
    pub used: u64,
    pub available: u64,
    pub used_percent: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NetworkStats {
    pub iface: String,
    pub rx_bytes: u64,
    pub tx_bytes: u64,
    pub rx_sec: f64,
    pub tx_sec: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct OsInfo {
    pub platform: String,
    pub distro: String,
    pub hostname: String,
    pub kernel: String,
}

/// Latest sample, refreshed by the background monitor.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HostSnapshot {
    pub cpu: CpuStats,
    pub memory: MemoryStats,
    pub disk: Vec<DiskStats>,
    pub network: Vec<NetworkStats>,
    pub os: OsInfo,
    /// Seconds since boot.
    pub uptime: u64,
}

impl Default for HostSnapshot {
    fn default() -> Self {
        Self {
            cpu: CpuStats::default(),
            memory: MemoryStats::default(),
            disk: Vec::new(),
            network: Vec::new(),
            os: OsInfo {
                platform: std::env::consts::OS.to_string(),
                ..OsInfo::default()
            },
            uptime: 0,
        }
    }
}

/// Frame pushed to WebSocket subscribers on every monitor tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsFrame {
    #[serde(rename = "type")]
    pub kind: String,
    /// Unix milliseconds.
    pub timestamp: i64,
    pub cpu: CpuStats,
    pub memory: MemoryStats,
}

// ---------------------------------------------------------------------------
// Processes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProcessInfo {
    pub pid: u32,
    pub name: String,
    /// CPU usage, percent of one core.
    pub cpu: f32,
    /// Resident memory as percent of total memory.
    pub mem: f64,
    /// Resident memory in bytes.
    pub mem_rss: u64,
    pub user: String,
    pub state: String,
    /// RFC 3339 start time.
    pub started: String,
    pub command: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProcessList {
    pub total: usize,
    pub list: Vec<ProcessInfo>,
}
