use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::warn;

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub relay: RelaySection,
    #[serde(default)]
    pub assets: AssetsSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            relay: RelaySection::default(),
            assets: AssetsSection::default(),
            logging: LoggingSection::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RelaySection {
    #[serde(default = "default_relay_listen")]
    pub listen_addr: String,
    /// Request path of the relay endpoint.
    #[serde(default = "default_endpoint_path")]
    pub endpoint_path: String,
    /// Glob patterns for target hosts the relay may dial. Empty admits any
    /// host.
    #[serde(default)]
    pub allowed_hosts: Vec<String>,
    #[serde(default = "default_dial_timeout")]
    pub dial_timeout_secs: u64,
    /// Per-direction receive limit; absent disables the idle limit.
    #[serde(default)]
    pub idle_timeout_secs: Option<u64>,
}

impl Default for RelaySection {
    fn default() -> Self {
        Self {
            listen_addr: default_relay_listen(),
            endpoint_path: default_endpoint_path(),
            allowed_hosts: Vec::new(),
            dial_timeout_secs: default_dial_timeout(),
            idle_timeout_secs: None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AssetsSection {
    #[serde(default = "default_assets_listen")]
    pub listen_addr: String,
    #[serde(default = "default_assets_root")]
    pub root: PathBuf,
}

impl Default for AssetsSection {
    fn default() -> Self {
        Self {
            listen_addr: default_assets_listen(),
            root: default_assets_root(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LoggingSection {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_session_log_path")]
    pub session_log_path: PathBuf,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            session_log_path: default_session_log_path(),
        }
    }
}

// ---------------------------------------------------------------------------
// Default-value functions used by serde
// ---------------------------------------------------------------------------

fn default_relay_listen() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_endpoint_path() -> String {
    "/proxy".to_string()
}

fn default_dial_timeout() -> u64 {
    10
}

fn default_assets_listen() -> String {
    "127.0.0.1:8081".to_string()
}

fn default_assets_root() -> PathBuf {
    PathBuf::from("public")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_session_log_path() -> PathBuf {
    PathBuf::from("sessions.jsonl")
}

// ---------------------------------------------------------------------------
// Loader
// ---------------------------------------------------------------------------

/// Load configuration from a YAML file.
///
/// If the file does not exist a default configuration is returned and a
/// warning is emitted. This allows ha-bridge to start with sensible
/// defaults when no config file has been written yet.
pub fn load(path: &Path) -> anyhow::Result<Config> {
    if !path.exists() {
        warn!(
            path = %path.display(),
            "configuration file not found; using defaults"
        );
        return Ok(Config::default());
    }

    let contents = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read config file {}: {e}", path.display()))?;

    let config: Config = serde_yml::from_str(&contents)
        .map_err(|e| anyhow::anyhow!("failed to parse config file {}: {e}", path.display()))?;

    Ok(config)
}
