// Runtime configuration from environment variables (`.env` honored via dotenvy).

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;

use crate::claude_config::ConfigPaths;

const DEFAULT_PORT: u16 = 7777;
const DEFAULT_STATS_INTERVAL_SECS: u64 = 3;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub paths: ConfigPaths,
    /// `None` = dev mode, no auth.
    pub auth_secret: Option<String>,
    pub stats_interval: Duration,
}

impl AppConfig {
    /// Reads `PORT`, `BIND_ADDR`, `CLAUDE_HOME`, `PROJECT_DIR`, `AUTH_SECRET`
    /// and `STATS_INTERVAL_SECS`.
    pub fn from_env() -> anyhow::Result<Self> {
        let port: u16 = match non_empty_var("PORT") {
            Some(raw) => raw.parse().with_context(|| format!("invalid PORT '{raw}'"))?,
            None => DEFAULT_PORT,
        };
        let ip: IpAddr = match non_empty_var("BIND_ADDR") {
            Some(raw) => raw.parse().with_context(|| format!("invalid BIND_ADDR '{raw}'"))?,
            None => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        };

        let home_dir = dirs::home_dir().context("cannot determine the home directory")?;
        let claude_home = non_empty_var("CLAUDE_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| home_dir.join(".claude"));
        let project_dir = match non_empty_var("PROJECT_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => std::env::current_dir().context("cannot determine the working directory")?,
        };

        let stats_interval_secs = match non_empty_var("STATS_INTERVAL_SECS") {
            Some(raw) => raw
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .with_context(|| format!("invalid STATS_INTERVAL_SECS '{raw}'"))?,
            None => DEFAULT_STATS_INTERVAL_SECS,
        };

        Ok(Self {
            bind_addr: SocketAddr::new(ip, port),
            paths: ConfigPaths::new(home_dir, claude_home, project_dir),
            auth_secret: non_empty_var("AUTH_SECRET"),
            stats_interval: Duration::from_secs(stats_interval_secs),
        })
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}
