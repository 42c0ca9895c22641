// Host telemetry via sysinfo.
//
// A background task refreshes a `HostSnapshot` on a fixed interval so handlers
// read a pre-computed sample, and pushes a compact stats frame to WebSocket
// subscribers on every tick. Process listing and termination are one-shot
// calls that build their own `System`.

use std::time::{Duration, Instant};

use sysinfo::{
    Disks, Networks, Pid, ProcessRefreshKind, ProcessesToUpdate, Signal, System, Users,
};

use crate::models::{
    CpuStats, DiskStats, HostSnapshot, MemoryStats, NetworkStats, OsInfo, ProcessInfo,
    ProcessList, StatsFrame,
};
use crate::state::AppState;

/// Mounts under this prefix are squashfs images, not real disks.
const IGNORED_MOUNT_PREFIX: &str = "/snap";

/// Upper bound on processes returned by `list_processes`.
pub const MAX_LISTED_PROCESSES: usize = 100;

// ---------------------------------------------------------------------------
// Sampling
// ---------------------------------------------------------------------------

/// Keeps the sysinfo handles alive between ticks; CPU usage and network rates
/// are deltas against the previous refresh.
pub struct HostSampler {
    sys: System,
    networks: Networks,
    last_refresh: Instant,
}

impl HostSampler {
    /// Takes the baseline measurement. Call `sample` no sooner than
    /// `sysinfo::MINIMUM_CPU_UPDATE_INTERVAL` afterwards.
    pub fn new() -> Self {
        let mut sys = System::new();
        sys.refresh_cpu_all();
        sys.refresh_memory();
        Self {
            sys,
            networks: Networks::new_with_refreshed_list(),
            last_refresh: Instant::now(),
        }
    }

    pub fn sample(&mut self) -> HostSnapshot {
        // Only CPU + memory, not refresh_all(), which would reset the CPU baseline.
        self.sys.refresh_cpu_all();
        self.sys.refresh_memory();
        self.networks.refresh(true);
        let elapsed = self.last_refresh.elapsed().as_secs_f64().max(0.001);
        self.last_refresh = Instant::now();

        HostSnapshot {
            cpu: cpu_stats(&self.sys),
            memory: memory_stats(&self.sys),
            disk: disk_stats(&Disks::new_with_refreshed_list()),
            network: network_stats(&self.networks, elapsed),
            os: os_info(),
            uptime: System::uptime(),
        }
    }
}

impl Default for HostSampler {
    fn default() -> Self {
        Self::new()
    }
}

fn cpu_stats(sys: &System) -> CpuStats {
    let cores: Vec<f32> = sys.cpus().iter().map(|c| c.cpu_usage()).collect();
    let usage = if cores.is_empty() {
        0.0
    } else {
        cores.iter().sum::<f32>() / cores.len() as f32
    };
    CpuStats { usage, cores }
}

fn memory_stats(sys: &System) -> MemoryStats {
    let total = sys.total_memory();
    let available = sys.available_memory();
    MemoryStats {
        total,
        used: sys.used_memory(),
        free: sys.free_memory(),
        available,
        used_percent: percent(total.saturating_sub(available), total),
    }
}

fn disk_stats(disks: &Disks) -> Vec<DiskStats> {
    disks
        .list()
        .iter()
        .filter_map(|disk| {
            let size = disk.total_space();
            let mount = disk.mount_point().to_string_lossy().into_owned();
            if size == 0 || mount.starts_with(IGNORED_MOUNT_PREFIX) {
                return None;
            }
            let available = disk.available_space();
            let used = size.saturating_sub(available);
            Some(DiskStats {
                fs: disk.name().to_string_lossy().into_owned(),
                fs_type: disk.file_system().to_string_lossy().into_owned(),
                mount,
                size,
                used,
                available,
                used_percent: percent(used, size),
            })
        })
        .collect()
}

fn network_stats(networks: &Networks, elapsed_secs: f64) -> Vec<NetworkStats> {
    let mut stats: Vec<NetworkStats> = networks
        .list()
        .iter()
        .map(|(iface, data)| NetworkStats {
            iface: iface.clone(),
            rx_bytes: data.total_received(),
            tx_bytes: data.total_transmitted(),
            rx_sec: data.received() as f64 / elapsed_secs,
            tx_sec: data.transmitted() as f64 / elapsed_secs,
        })
        .collect();
    stats.sort_by(|a, b| a.iface.cmp(&b.iface));
    stats
}

fn os_info() -> OsInfo {
    OsInfo {
        platform: std::env::consts::OS.to_string(),
        distro: System::long_os_version()
            .or_else(System::name)
            .unwrap_or_default(),
        hostname: System::host_name().unwrap_or_default(),
        kernel: System::kernel_version().unwrap_or_default(),
    }
}

fn percent(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

/// Compact frame pushed to WebSocket subscribers.
pub fn stats_frame(snapshot: &HostSnapshot) -> StatsFrame {
    StatsFrame {
        kind: "stats".to_string(),
        timestamp: chrono::Utc::now().timestamp_millis(),
        cpu: snapshot.cpu.clone(),
        memory: snapshot.memory.clone(),
    }
}

// ---------------------------------------------------------------------------
// Background task
// ---------------------------------------------------------------------------

/// Spawn the sampler. Marks the state ready after the first sample and only
/// serializes push frames while someone is subscribed.
pub fn spawn(state: AppState, interval: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut sampler = HostSampler::new();
        tokio::time::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL).await;
        tracing::info!("system monitor: started (interval={}s)", interval.as_secs());

        loop {
            let snapshot = sampler.sample();

            if state.stats_tx.receiver_count() > 0 {
                match serde_json::to_string(&stats_frame(&snapshot)) {
                    Ok(frame) => {
                        // Err only means every subscriber left since the check.
                        let _ = state.stats_tx.send(frame);
                    }
                    Err(e) => tracing::error!("system monitor: failed to encode stats frame: {}", e),
                }
            }

            *state.system_monitor.write().await = snapshot;
            state.mark_ready();

            tokio::time::sleep(interval).await;
        }
    })
}

// ---------------------------------------------------------------------------
// Processes
// ---------------------------------------------------------------------------

/// Up to `limit` processes, busiest first. Blocks for
/// `MINIMUM_CPU_UPDATE_INTERVAL` to measure CPU, so call it from `spawn_blocking`.
pub fn list_processes(limit: usize) -> ProcessList {
    let mut sys = System::new();
    sys.refresh_memory();
    sys.refresh_processes_specifics(ProcessesToUpdate::All, true, ProcessRefreshKind::everything());
    std::thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
    sys.refresh_processes_specifics(ProcessesToUpdate::All, true, ProcessRefreshKind::everything());

    let users = Users::new_with_refreshed_list();
    let total_memory = sys.total_memory();

    let mut list: Vec<ProcessInfo> = sys
        .processes()
        .values()
        .map(|p| {
            let name = p.name().to_string_lossy().into_owned();
            let command = p
                .cmd()
                .iter()
                .map(|part| part.to_string_lossy())
                .collect::<Vec<_>>()
                .join(" ");
            ProcessInfo {
                pid: p.pid().as_u32(),
                cpu: p.cpu_usage(),
                mem: percent(p.memory(), total_memory),
                mem_rss: p.memory(),
                user: p
                    .user_id()
                    .and_then(|uid| users.get_user_by_id(uid))
                    .map(|u| u.name().to_string())
                    .unwrap_or_default(),
                state: p.status().to_string(),
                started: chrono::DateTime::from_timestamp(p.start_time() as i64, 0)
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_default(),
                command: if command.is_empty() { name.clone() } else { command },
                name,
            }
        })
        .collect();

    let total = list.len();
    list.sort_by(|a, b| b.cpu.total_cmp(&a.cpu));
    list.truncate(limit);
    ProcessList { total, list }
}

#[derive(Debug, thiserror::Error)]
pub enum TerminateError {
    #[error("process {0} not found")]
    NotFound(u32),

    #[error("sending SIGTERM is not supported on this platform")]
    Unsupported,

    #[error("failed to signal process {0}")]
    Failed(u32),
}

/// Send SIGTERM to `pid`.
pub fn terminate_process(pid: u32) -> Result<(), TerminateError> {
    let target = Pid::from_u32(pid);
    let mut sys = System::new();
    sys.refresh_processes(ProcessesToUpdate::Some(&[target]), true);
    let process = sys.process(target).ok_or(TerminateError::NotFound(pid))?;

    match process.kill_with(Signal::Term) {
        Some(true) => {
            tracing::info!(pid, "sent SIGTERM");
            Ok(())
        }
        Some(false) => Err(TerminateError::Failed(pid)),
        None => Err(TerminateError::Unsupported),
    }
}
