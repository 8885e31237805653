//! Configuration for Spoolbox

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Mail spool configuration
    #[serde(default)]
    pub spool: SpoolConfig,

    /// Authentication configuration
    #[serde(default)]
    pub auth: AuthConfig,

    /// Protocol limits
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Listen port
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
        }
    }
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    7070
}

/// Mail spool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpoolConfig {
    /// Base directory holding one subdirectory per mailbox
    #[serde(default = "default_spool_path")]
    pub path: PathBuf,
}

impl Default for SpoolConfig {
    fn default() -> Self {
        Self {
            path: default_spool_path(),
        }
    }
}

fn default_spool_path() -> PathBuf {
    PathBuf::from("/var/lib/spoolbox/spool")
}

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Credential file mapping usernames to argon2 password hashes
    #[serde(default = "default_users_file")]
    pub users_file: PathBuf,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            users_file: default_users_file(),
        }
    }
}

fn default_users_file() -> PathBuf {
    PathBuf::from("/etc/spoolbox/users.toml")
}

/// Protocol limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Maximum length of a single protocol line in bytes
    #[serde(default = "default_max_line_length")]
    pub max_line_length: usize,

    /// Maximum total size of a message body in bytes
    #[serde(default = "default_max_message_bytes")]
    pub max_message_bytes: usize,

    /// Failed LOGIN attempts tolerated before the connection is locked out
    #[serde(default = "default_max_login_attempts")]
    pub max_login_attempts: u32,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_line_length: default_max_line_length(),
            max_message_bytes: default_max_message_bytes(),
            max_login_attempts: default_max_login_attempts(),
        }
    }
}

fn default_max_line_length() -> usize {
    4096
}

fn default_max_message_bytes() -> usize {
    64 * 1024
}

fn default_max_login_attempts() -> u32 {
    3
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: "json" or "text"
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

impl Config {
    /// Load configuration from file
    pub fn from_file(path: &std::path::Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| crate::Error::Config(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;

        Ok(config)
    }

    /// Load configuration from the default locations, falling back to
    /// built-in defaults when no file is present.
    pub fn load() -> crate::Result<Self> {
        let paths = [
            std::path::PathBuf::from("./spoolbox.toml"),
            std::path::PathBuf::from("/etc/spoolbox/config.toml"),
        ];

        for path in paths {
            if path.exists() {
                return Self::from_file(&path);
            }
        }

        Ok(Config::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.bind_address, "0.0.0.0");
        assert_eq!(config.server.port, 7070);
        assert_eq!(config.limits.max_line_length, 4096);
        assert_eq!(config.limits.max_message_bytes, 64 * 1024);
        assert_eq!(config.limits.max_login_attempts, 3);
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
[server]
bind_address = "127.0.0.1"
port = 4711

[spool]
path = "/data/spool"

[auth]
users_file = "/data/users.toml"

[limits]
max_message_bytes = 1024
"#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.bind_address, "127.0.0.1");
        assert_eq!(config.server.port, 4711);
        assert_eq!(config.spool.path, PathBuf::from("/data/spool"));
        assert_eq!(config.auth.users_file, PathBuf::from("/data/users.toml"));
        assert_eq!(config.limits.max_message_bytes, 1024);
        // Unset fields keep their defaults.
        assert_eq!(config.limits.max_line_length, 4096);
        assert_eq!(config.limits.max_login_attempts, 3);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.server.port, 7070);
        assert_eq!(config.logging.level, "info");
    }
}
