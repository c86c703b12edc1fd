use std::path::PathBuf;

use clap::Parser;

/// Multi-engine inference routing core
#[derive(Debug, Parser)]
#[command(name = "switchboard", about = "Resilient dispatcher for LLM inference engines")]
pub struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "switchboard.toml", env = "SWITCHBOARD_CONFIG")]
    pub config: PathBuf,

    /// Override the listen address
    #[arg(long, env = "SWITCHBOARD_LISTEN")]
    pub listen: Option<std::net::SocketAddr>,

    /// Validate configuration and exit without binding a listener,
    /// reporting the exit codes a CLI harness would probe for
    /// (2 = no engines configured, 3 = kill switch enabled)
    #[arg(long)]
    pub check: bool,
}
