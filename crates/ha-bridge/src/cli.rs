use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "ha-bridge",
    version,
    about = "WebSocket relay and static dashboard server for Home Assistant"
)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "config.yaml")]
    pub config: PathBuf,

    /// Relay listen address (overrides config file setting)
    #[arg(long)]
    pub listen: Option<String>,

    /// Asset server listen address (overrides config file setting)
    #[arg(long)]
    pub assets_listen: Option<String>,

    /// Asset root directory (overrides config file setting)
    #[arg(long)]
    pub assets_root: Option<PathBuf>,

    /// Session log path (overrides config file setting)
    #[arg(long)]
    pub session_log: Option<PathBuf>,
}
