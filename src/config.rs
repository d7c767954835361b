use crate::catalog::PredefinedCommand;
use crate::format::DISPLAY_LIMIT;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

/// Errors raised while loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Largest `display_limit` that still fits a reply in one Telegram message
/// (4096 characters) together with the echoed command and markup.
pub const MAX_DISPLAY_LIMIT: usize = 3800;

/// Longest catalog id. Ids travel as `confirm_<id>` callback data, which
/// Telegram caps at 64 bytes.
pub const MAX_COMMAND_ID_BYTES: usize = 56;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Telegram bot token (from @BotFather); `BOT_TOKEN` overrides
    pub bot_token: Option<String>,
    /// Operators allowed to use the bot; `ADMIN_IDS` overrides
    pub admin_ids: Vec<i64>,
    /// Timeout for operator and catalog commands
    pub command_timeout_secs: u64,
    /// Background monitoring poll interval (reserved; no poller runs yet)
    pub monitoring_interval_secs: u64,
    /// Maximum characters of command output in one reply
    pub display_limit: usize,
    /// Rows in the process table
    pub process_top_n: usize,
    /// systemd units listed in the services report
    pub service_units: Vec<String>,
    /// External endpoints: name → `https://…` URL or `host:port`
    pub services: BTreeMap<String, String>,
    /// Extra catalog entries
    pub commands: Vec<PredefinedCommand>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bot_token: None,
            admin_ids: Vec::new(),
            command_timeout_secs: 30,
            monitoring_interval_secs: 60,
            display_limit: DISPLAY_LIMIT,
            process_top_n: 10,
            service_units: vec!["ssh".into(), "apache2".into(), "mysql".into()],
            services: BTreeMap::new(),
            commands: Vec::new(),
        }
    }
}

impl Config {
    /// Default config file location: `~/.hostwarden/config.toml`.
    pub fn default_path() -> PathBuf {
        let home_dir = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        home_dir.join(".hostwarden").join("config.toml")
    }

    /// Load configuration from file, falling back to defaults when the file
    /// does not exist. Environment overrides are applied afterwards.
    pub fn load(path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let config_path = match path {
            Some(p) => PathBuf::from(shellexpand::tilde(&p.to_string_lossy()).as_ref()),
            None => Self::default_path(),
        };

        let mut config = if config_path.exists() {
            Self::from_file(&config_path)?
        } else {
            Config::default()
        };

        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply `BOT_TOKEN` and `ADMIN_IDS` from the given lookup.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(token) = lookup("BOT_TOKEN").filter(|t| !t.trim().is_empty()) {
            self.bot_token = Some(token.trim().to_string());
        }
        if let Some(ids) = lookup("ADMIN_IDS").filter(|s| !s.trim().is_empty()) {
            self.admin_ids = parse_admin_ids(&ids);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.command_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "command_timeout_secs must be greater than zero".into(),
            ));
        }
        if self.display_limit == 0 || self.display_limit > MAX_DISPLAY_LIMIT {
            return Err(ConfigError::Invalid(format!(
                "display_limit must be between 1 and {}",
                MAX_DISPLAY_LIMIT
            )));
        }
        for cmd in &self.commands {
            if cmd.id.is_empty() || cmd.id.len() > MAX_COMMAND_ID_BYTES {
                return Err(ConfigError::Invalid(format!(
                    "command id `{}` must be 1 to {} bytes long",
                    cmd.id, MAX_COMMAND_ID_BYTES
                )));
            }
        }
        Ok(())
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    pub fn monitoring_interval(&self) -> Duration {
        Duration::from_secs(self.monitoring_interval_secs)
    }
}

/// Parse a comma-separated id list, skipping entries that are not integers.
pub fn parse_admin_ids(raw: &str) -> Vec<i64> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| match s.parse::<i64>() {
            Ok(id) => Some(id),
            Err(_) => {
                warn!(entry = s, "Ignoring invalid admin id");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.command_timeout_secs, 30);
        assert_eq!(config.monitoring_interval_secs, 60);
        assert_eq!(config.display_limit, 3500);
        assert_eq!(config.process_top_n, 10);
        assert!(config.admin_ids.is_empty());
    }

    #[test]
    fn test_parse_toml() {
        let config: Config = toml::from_str(
            r#"
            bot_token = "123:abc"
            admin_ids = [42, 7]
            command_timeout_secs = 10

            [services]
            website = "https://example.com"
            game = "example.com:25565"

            [[commands]]
            id = "docker_ps"
            command = "docker ps"
            description = "Containers"
            "#,
        )
        .unwrap();
        assert_eq!(config.bot_token.as_deref(), Some("123:abc"));
        assert_eq!(config.admin_ids, vec![42, 7]);
        assert_eq!(config.command_timeout(), Duration::from_secs(10));
        assert_eq!(config.services["game"], "example.com:25565");
        assert_eq!(config.commands[0].id, "docker_ps");
        assert!(!config.commands[0].confirm);
        // untouched keys keep their defaults
        assert_eq!(config.display_limit, 3500);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config.apply_env(|key| match key {
            "BOT_TOKEN" => Some(" tok ".into()),
            "ADMIN_IDS" => Some("1, 2,abc,3".into()),
            _ => None,
        });
        assert_eq!(config.bot_token.as_deref(), Some("tok"));
        assert_eq!(config.admin_ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let config = Config {
            command_timeout_secs: 0,
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_display_limit_bounded() {
        let config = Config {
            display_limit: MAX_DISPLAY_LIMIT + 1,
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_long_command_id_rejected() {
        let entry = |id: String| PredefinedCommand {
            id,
            command: "true".into(),
            description: "noop".into(),
            confirm: false,
        };
        let too_long = Config {
            commands: vec![entry("x".repeat(MAX_COMMAND_ID_BYTES + 1))],
            ..Config::default()
        };
        let err = too_long.validate().unwrap_err();
        assert!(err.to_string().contains("command id"));

        let at_limit = Config {
            commands: vec![entry("x".repeat(MAX_COMMAND_ID_BYTES))],
            ..Config::default()
        };
        assert!(at_limit.validate().is_ok());
        assert!(format!("confirm_{}", "x".repeat(MAX_COMMAND_ID_BYTES)).len() <= 64);
    }

    #[test]
    fn test_malformed_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "admin_ids = \"not a list\"").unwrap();
        let err = Config::from_file(&path).unwrap_err();
        assert!(err.to_string().contains("config.toml"));
    }
}
