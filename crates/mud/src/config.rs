//! Configuration management for the MUD server.
//!
//! This module handles loading, validation, and conversion of server configuration
//! from TOML files and command-line arguments.

use crate::cli::CliArgs;
use plugin_chat::{ChatConfig, ChatPlugin};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use telnet_server::{FramingMode, GossipConfig, ServerConfig};
use tracing::info;

/// Application configuration loaded from TOML file.
///
/// Every table is optional; missing tables and keys take their defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Network and connection settings
    #[serde(default)]
    pub server: ServerSettings,
    /// Gossip relay settings
    #[serde(default)]
    pub gossip: GossipConfig,
    /// Chat replies and command table
    #[serde(default)]
    pub chat: ChatConfig,
    /// Logging configuration settings
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Server-specific configuration settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Network address to bind the server to (e.g., "0.0.0.0:2323")
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// Maximum number of concurrent client connections
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    #[serde(default = "default_read_buffer_size")]
    pub read_buffer_size: usize,
    /// Socket reads per connection per reactor turn
    #[serde(default = "default_read_budget")]
    pub read_budget: usize,
    #[serde(default = "default_max_line_length")]
    pub max_line_length: usize,
    #[serde(default = "default_max_outgoing_queue")]
    pub max_outgoing_queue: usize,
    #[serde(default = "default_poll_timeout_ms")]
    pub poll_timeout_ms: u64,
    #[serde(default = "default_true")]
    pub negotiate_on_connect: bool,
    #[serde(default)]
    pub framing: FramingMode,
    #[serde(default = "default_prompt")]
    pub prompt: String,
    /// Interval between tick broadcasts in milliseconds (0 to disable)
    #[serde(default)]
    pub tick_interval_ms: u64,
    #[serde(default = "default_tick_message")]
    pub tick_message: String,
}

/// Logging system configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level filter (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Whether to output logs in JSON format
    #[serde(default)]
    pub json_format: bool,
}

fn default_bind_address() -> String {
    "0.0.0.0:2323".to_string()
}

fn default_max_connections() -> usize {
    1000
}

fn default_read_buffer_size() -> usize {
    1024
}

fn default_read_budget() -> usize {
    16
}

fn default_max_line_length() -> usize {
    4096
}

fn default_max_outgoing_queue() -> usize {
    1024
}

fn default_poll_timeout_ms() -> u64 {
    50
}

fn default_true() -> bool {
    true
}

fn default_prompt() -> String {
    "> ".to_string()
}

fn default_tick_message() -> String {
    "tick!".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            max_connections: default_max_connections(),
            read_buffer_size: default_read_buffer_size(),
            read_budget: default_read_budget(),
            max_line_length: default_max_line_length(),
            max_outgoing_queue: default_max_outgoing_queue(),
            poll_timeout_ms: default_poll_timeout_ms(),
            negotiate_on_connect: true,
            framing: FramingMode::default(),
            prompt: default_prompt(),
            tick_interval_ms: 0,
            tick_message: default_tick_message(),
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json_format: false,
        }
    }
}

impl AppConfig {
    /// Loads configuration from a TOML file.
    ///
    /// If the file doesn't exist, a default configuration file is written at
    /// `path` and the defaults are returned.
    pub async fn load_from_file(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        if path.exists() {
            let content = tokio::fs::read_to_string(path).await?;
            let config: AppConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            let default_config = AppConfig::default();
            let toml_content = toml::to_string_pretty(&default_config)?;
            tokio::fs::write(path, toml_content).await?;
            info!("Created default configuration file: {}", path.display());
            Ok(default_config)
        }
    }

    /// Applies command-line overrides on top of the file settings.
    ///
    /// `--port` is applied after `--bind` and replaces only the port.
    pub fn apply_overrides(&mut self, args: &CliArgs) -> Result<(), String> {
        if let Some(bind_address) = &args.bind_address {
            self.server.bind_address = bind_address.clone();
        }

        if let Some(port) = args.port {
            let mut address: SocketAddr = self.server.bind_address.parse().map_err(|_| {
                format!(
                    "Cannot apply port {port}: invalid bind address {}",
                    self.server.bind_address
                )
            })?;
            address.set_port(port);
            self.server.bind_address = address.to_string();
        }

        if let Some(log_level) = &args.log_level {
            self.logging.level = log_level.clone();
        }

        if args.json_logs {
            self.logging.json_format = true;
        }

        Ok(())
    }

    /// Converts the application configuration to a telnet server configuration.
    pub fn to_server_config(&self) -> Result<ServerConfig, Box<dyn std::error::Error>> {
        Ok(ServerConfig {
            bind_address: self.server.bind_address.parse()?,
            max_connections: self.server.max_connections,
            read_buffer_size: self.server.read_buffer_size,
            read_budget: self.server.read_budget,
            max_line_length: self.server.max_line_length,
            max_outgoing_queue: self.server.max_outgoing_queue,
            poll_timeout_ms: self.server.poll_timeout_ms,
            negotiate_on_connect: self.server.negotiate_on_connect,
            framing: self.server.framing,
            prompt: self.server.prompt.clone(),
            gossip: self.gossip.clone(),
        })
    }

    /// Validates the configuration for consistency and correctness.
    ///
    /// Returns a description of the first problem found.
    pub fn validate(&self) -> Result<(), String> {
        if self.server.bind_address.parse::<SocketAddr>().is_err() {
            return Err(format!(
                "Invalid bind address: {}",
                &self.server.bind_address
            ));
        }

        let limits = [
            ("server.max_connections", self.server.max_connections),
            ("server.read_buffer_size", self.server.read_buffer_size),
            ("server.read_budget", self.server.read_budget),
            ("server.max_line_length", self.server.max_line_length),
            ("server.max_outgoing_queue", self.server.max_outgoing_queue),
        ];
        for (name, value) in limits {
            if value == 0 {
                return Err(format!("{name} must be greater than 0"));
            }
        }

        if self.server.poll_timeout_ms == 0 {
            return Err("server.poll_timeout_ms must be greater than 0".to_string());
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(format!(
                "Invalid log level: {}. Must be one of: {valid_levels:?}",
                &self.logging.level
            ));
        }

        ChatPlugin::new(&self.chat).map_err(|e| e.to_string())?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plugin_chat::CommandRule;
    use std::path::PathBuf;
    use tempfile::{NamedTempFile, TempDir};
    use tokio::fs;

    fn args() -> CliArgs {
        CliArgs {
            config_path: PathBuf::from("config.toml"),
            bind_address: None,
            port: None,
            log_level: None,
            json_logs: false,
        }
    }

    #[test]
    fn test_app_config_default() {
        let config = AppConfig::default();

        assert_eq!(config.server.bind_address, "0.0.0.0:2323");
        assert_eq!(config.server.max_connections, 1000);
        assert_eq!(config.server.read_budget, 16);
        assert_eq!(config.server.poll_timeout_ms, 50);
        assert_eq!(config.server.tick_interval_ms, 0);
        assert_eq!(config.server.tick_message, "tick!");
        assert!(config.gossip.echo_to_sender);
        assert_eq!(config.chat.welcome, "Connected!");
        assert_eq!(config.logging.level, "info");
        assert!(!config.logging.json_format);
        assert!(config.validate().is_ok());
    }

    #[tokio::test]
    async fn test_load_from_nonexistent_file_creates_it() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");

        let config = AppConfig::load_from_file(&path).await.unwrap();
        assert_eq!(config, AppConfig::default());
        assert!(path.exists());

        // The written file loads back to the same settings.
        let reloaded = AppConfig::load_from_file(&path).await.unwrap();
        assert_eq!(reloaded, config);
    }

    #[tokio::test]
    async fn test_load_from_existing_file() {
        let toml_content = r#"
[server]
bind_address = "127.0.0.1:4000"
max_connections = 50
framing = "redraw"
prompt = "$ "
tick_interval_ms = 3000

[gossip]
echo_to_sender = false

[chat]
welcome = "Welcome!"

[[chat.commands]]
pattern = "^smile$"
response = "You smile."

[logging]
level = "debug"
json_format = true
"#;

        let temp_file = NamedTempFile::new().unwrap();
        fs::write(temp_file.path(), toml_content).await.unwrap();

        let config = AppConfig::load_from_file(temp_file.path()).await.unwrap();

        assert_eq!(config.server.bind_address, "127.0.0.1:4000");
        assert_eq!(config.server.max_connections, 50);
        assert_eq!(config.server.framing, FramingMode::Redraw);
        assert_eq!(config.server.prompt, "$ ");
        assert_eq!(config.server.tick_interval_ms, 3000);
        // Unset keys fall back to their defaults.
        assert_eq!(config.server.read_budget, 16);
        assert!(config.server.negotiate_on_connect);

        assert!(!config.gossip.echo_to_sender);
        assert!(config.gossip.enabled);
        assert_eq!(config.gossip.format, "{id} gossips: {text}");

        assert_eq!(config.chat.welcome, "Welcome!");
        assert_eq!(config.chat.no_match, "Your command had no effect.");
        assert_eq!(config.chat.commands.len(), 1);

        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.json_format);
    }

    #[tokio::test]
    async fn test_load_rejects_malformed_file() {
        let temp_file = NamedTempFile::new().unwrap();
        fs::write(temp_file.path(), "[server\nbind_address = ").await.unwrap();
        assert!(AppConfig::load_from_file(temp_file.path()).await.is_err());
    }

    #[test]
    fn test_to_server_config_conversion() {
        let mut config = AppConfig::default();
        config.server.bind_address = "192.168.1.100:4000".to_string();
        config.server.max_line_length = 256;
        config.gossip.format = "<{id}> {text}".to_string();

        let server_config = config.to_server_config().unwrap();
        assert_eq!(server_config.bind_address, "192.168.1.100:4000".parse::<SocketAddr>().unwrap());
        assert_eq!(server_config.max_line_length, 256);
        assert_eq!(server_config.max_connections, 1000);
        assert_eq!(server_config.gossip.render(2, "hi"), "<2> hi");
    }

    #[test]
    fn test_port_override_keeps_host() {
        let mut config = AppConfig::default();
        config.server.bind_address = "127.0.0.1:2323".to_string();

        config
            .apply_overrides(&CliArgs { port: Some(4000), ..args() })
            .unwrap();
        assert_eq!(config.server.bind_address, "127.0.0.1:4000");
    }

    #[test]
    fn test_bind_then_port_override() {
        let mut config = AppConfig::default();
        config
            .apply_overrides(&CliArgs {
                bind_address: Some("10.0.0.1:9000".to_string()),
                port: Some(9001),
                log_level: Some("trace".to_string()),
                json_logs: true,
                ..args()
            })
            .unwrap();

        assert_eq!(config.server.bind_address, "10.0.0.1:9001");
        assert_eq!(config.logging.level, "trace");
        assert!(config.logging.json_format);
    }

    #[test]
    fn test_port_override_needs_valid_address() {
        let mut config = AppConfig::default();
        config.server.bind_address = "nowhere".to_string();
        assert!(config
            .apply_overrides(&CliArgs { port: Some(4000), ..args() })
            .is_err());
    }

    #[test]
    fn test_validation_invalid_bind_address() {
        let mut config = AppConfig::default();
        config.server.bind_address = "invalid".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_zero_limits() {
        let mut config = AppConfig::default();
        config.server.max_connections = 0;
        assert!(config.validate().unwrap_err().contains("max_connections"));

        let mut config = AppConfig::default();
        config.server.read_buffer_size = 0;
        assert!(config.validate().unwrap_err().contains("read_buffer_size"));

        let mut config = AppConfig::default();
        config.server.max_outgoing_queue = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_log_levels() {
        let mut config = AppConfig::default();
        for level in ["trace", "debug", "info", "warn", "error"] {
            config.logging.level = level.to_string();
            assert!(config.validate().is_ok(), "{level}");
        }
        config.logging.level = "verbose".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_bad_command_pattern() {
        let mut config = AppConfig::default();
        config.chat.commands.push(CommandRule {
            pattern: "[unclosed".to_string(),
            response: "never".to_string(),
        });
        assert!(config.validate().unwrap_err().contains("[unclosed"));
    }
}
