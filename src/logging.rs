//! Structured logging setup.
//!
//! - `HOSTWARDEN_LOG` or `RUST_LOG`: filter directives, e.g. `hostwarden=debug,warn`
//! - `HOSTWARDEN_LOG_FORMAT`: `pretty`, `compact` or `json`
//!
//! Logs go to stderr so `hostwarden exec` and `hostwarden inspect` keep a
//! clean stdout.

use std::str::FromStr;

use strum::{Display, EnumString};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const DEFAULT_FILTER: &str = "hostwarden=info,warn";
const VERBOSE_FILTER: &str = "hostwarden=debug,info";

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum LogFormat {
    /// Human-readable, multi-line
    #[default]
    Pretty,
    /// One line per event
    Compact,
    /// JSON for log aggregation
    Json,
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub filter: String,
    pub format: LogFormat,
    /// Include file/line in logs
    pub with_file: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: DEFAULT_FILTER.to_string(),
            format: LogFormat::default(),
            with_file: false,
        }
    }
}

impl LogConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an environment lookup. Unknown formats fall back to pretty.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let filter = lookup("HOSTWARDEN_LOG")
            .or_else(|| lookup("RUST_LOG"))
            .filter(|f| !f.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_FILTER.to_string());
        let format = lookup("HOSTWARDEN_LOG_FORMAT")
            .and_then(|s| LogFormat::from_str(s.trim()).ok())
            .unwrap_or_default();
        Self {
            filter,
            format,
            ..Default::default()
        }
    }

    /// Debug output for this crate, with source locations.
    pub fn verbose(mut self) -> Self {
        self.filter = VERBOSE_FILTER.to_string();
        self.with_file = true;
        self
    }
}

/// Install the global subscriber. Later calls are ignored.
pub fn init(config: LogConfig) {
    let env_filter =
        EnvFilter::try_new(&config.filter).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_file(config.with_file)
        .with_line_number(config.with_file);

    let registry = tracing_subscriber::registry().with(env_filter);
    let _ = match config.format {
        LogFormat::Json => tracing::subscriber::set_global_default(registry.with(layer.json())),
        LogFormat::Compact => {
            tracing::subscriber::set_global_default(registry.with(layer.compact()))
        }
        LogFormat::Pretty => tracing::subscriber::set_global_default(registry.with(layer.pretty())),
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_parsing() {
        assert_eq!(LogFormat::from_str("json").unwrap(), LogFormat::Json);
        assert_eq!(LogFormat::from_str("JSON").unwrap(), LogFormat::Json);
        assert_eq!(LogFormat::from_str("compact").unwrap(), LogFormat::Compact);
        assert!(LogFormat::from_str("fancy").is_err());
    }

    #[test]
    fn test_own_variable_wins_over_rust_log() {
        let config = LogConfig::from_lookup(|key| match key {
            "HOSTWARDEN_LOG" => Some("hostwarden=trace".into()),
            "RUST_LOG" => Some("debug".into()),
            "HOSTWARDEN_LOG_FORMAT" => Some("Compact".into()),
            _ => None,
        });
        assert_eq!(config.filter, "hostwarden=trace");
        assert_eq!(config.format, LogFormat::Compact);
    }

    #[test]
    fn test_defaults_without_environment() {
        let config = LogConfig::from_lookup(|_| None);
        assert_eq!(config.filter, DEFAULT_FILTER);
        assert_eq!(config.format, LogFormat::Pretty);
        assert!(LogConfig::default().verbose().with_file);
    }
}
