use clap::{ArgAction, Args};
use std::path::PathBuf;

use crate::config::Config;
use crate::logging::LogConfig;

// Global flags shared across every subcommand.
#[derive(Debug, Clone, Default, Args)]
pub struct CommonArgs {
    /// Path to a config.toml file (default: ~/.hostwarden/config.toml)
    #[arg(
        short = 'c',
        long,
        value_name = "PATH",
        env = "HOSTWARDEN_CONFIG",
        global = true
    )]
    pub config: Option<PathBuf>,

    /// Debug logging with source locations
    #[arg(short, long, action = ArgAction::SetTrue, global = true)]
    pub verbose: bool,
}

impl CommonArgs {
    pub fn load_config(&self) -> Result<Config, crate::config::ConfigError> {
        Config::load(self.config.clone())
    }

    pub fn log_config(&self) -> LogConfig {
        let config = LogConfig::from_env();
        if self.verbose { config.verbose() } else { config }
    }
}
