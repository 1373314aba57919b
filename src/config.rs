//! Configuration management for LAIM
//!
//! This module handles loading, parsing, validating, and managing
//! configuration from files, environment variables, and CLI overrides.
//! Precedence, lowest first: built-in defaults, YAML file, `LAIM_*`
//! environment variables, command-line flags.

use crate::backend::GenerationOptions;
use crate::error::{LaimError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure for LAIM
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Inbound HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,
    /// Inference backend connection settings
    #[serde(default)]
    pub backend: BackendConfig,
    /// Conversation store settings
    #[serde(default)]
    pub storage: StorageConfig,
    /// Default generation options applied when a client omits them
    #[serde(default)]
    pub generation: GenerationOptions,
    /// Request validation limits
    #[serde(default)]
    pub limits: LimitsConfig,
    /// Stream relay behavior
    #[serde(default)]
    pub relay: RelayConfig,
    /// Model recommender settings
    #[serde(default)]
    pub recommender: RecommenderConfig,
}

/// Inbound HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Interface to bind
    #[serde(default = "default_server_host")]
    pub host: String,

    /// Listen port
    #[serde(default = "default_server_port")]
    pub port: u16,

    /// Maximum accepted upload body, in bytes
    #[serde(default = "default_upload_max_bytes")]
    pub upload_max_bytes: usize,
}

fn default_server_host() -> String {
    "127.0.0.1".to_string()
}

fn default_server_port() -> u16 {
    8080
}

fn default_upload_max_bytes() -> usize {
    10 * 1024 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_server_host(),
            port: default_server_port(),
            upload_max_bytes: default_upload_max_bytes(),
        }
    }
}

impl ServerConfig {
    /// Socket address string in `host:port` form
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Inference backend configuration
///
/// Each operation has its own timeout: interactive generation may take
/// minutes on slow models, pulls download multi-gigabyte artifacts, while
/// listing and deleting are expected to answer within seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the inference server
    #[serde(default = "default_backend_host")]
    pub host: String,

    /// Timeout for streaming generate/chat calls (seconds)
    #[serde(default = "default_generate_timeout")]
    pub generate_timeout_seconds: u64,

    /// Timeout for listing installed models (seconds)
    #[serde(default = "default_list_timeout")]
    pub list_timeout_seconds: u64,

    /// Timeout for pulling a model (seconds)
    #[serde(default = "default_pull_timeout")]
    pub pull_timeout_seconds: u64,

    /// Timeout for deleting a model (seconds)
    #[serde(default = "default_delete_timeout")]
    pub delete_timeout_seconds: u64,
}

fn default_backend_host() -> String {
    "http://localhost:11434".to_string()
}

fn default_generate_timeout() -> u64 {
    300
}

fn default_list_timeout() -> u64 {
    10
}

fn default_pull_timeout() -> u64 {
    1800
}

fn default_delete_timeout() -> u64 {
    10
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            host: default_backend_host(),
            generate_timeout_seconds: default_generate_timeout(),
            list_timeout_seconds: default_list_timeout(),
            pull_timeout_seconds: default_pull_timeout(),
            delete_timeout_seconds: default_delete_timeout(),
        }
    }
}

impl BackendConfig {
    pub fn generate_timeout(&self) -> Duration {
        Duration::from_secs(self.generate_timeout_seconds)
    }

    pub fn list_timeout(&self) -> Duration {
        Duration::from_secs(self.list_timeout_seconds)
    }

    pub fn pull_timeout(&self) -> Duration {
        Duration::from_secs(self.pull_timeout_seconds)
    }

    pub fn delete_timeout(&self) -> Duration {
        Duration::from_secs(self.delete_timeout_seconds)
    }
}

/// Conversation store configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite database path; defaults to `history.db` in the platform data
    /// directory when unset
    #[serde(default)]
    pub db_path: Option<PathBuf>,
}

/// Request validation limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Maximum characters in a prompt or chat message
    #[serde(default = "default_max_content_chars")]
    pub max_content_chars: usize,

    /// Maximum bytes in a single streamed backend record
    #[serde(default = "default_max_record_bytes")]
    pub max_record_bytes: usize,

    /// Frames buffered between the relay and a slow client
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_max_content_chars() -> usize {
    32_000
}

fn default_max_record_bytes() -> usize {
    1024 * 1024
}

fn default_channel_capacity() -> usize {
    32
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_content_chars: default_max_content_chars(),
            max_record_bytes: default_max_record_bytes(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

/// Stream relay configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Keep reading the backend after the client disconnects so the
    /// assistant message can still be recorded
    #[serde(default = "default_drain_on_disconnect")]
    pub drain_on_disconnect: bool,
}

fn default_drain_on_disconnect() -> bool {
    true
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            drain_on_disconnect: default_drain_on_disconnect(),
        }
    }
}

/// Model recommender configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommenderConfig {
    /// Hugging Face base URL used for metadata enrichment
    #[serde(default = "default_hf_endpoint")]
    pub hf_endpoint: String,

    /// Timeout for a single enrichment lookup (seconds)
    #[serde(default = "default_hf_timeout")]
    pub hf_timeout_seconds: u64,

    /// Whether unknown models are enriched at all
    #[serde(default = "default_enrich")]
    pub enrich: bool,
}

fn default_hf_endpoint() -> String {
    "https://huggingface.co".to_string()
}

fn default_hf_timeout() -> u64 {
    3
}

fn default_enrich() -> bool {
    true
}

impl Default for RecommenderConfig {
    fn default() -> Self {
        Self {
            hf_endpoint: default_hf_endpoint(),
            hf_timeout_seconds: default_hf_timeout(),
            enrich: default_enrich(),
        }
    }
}

impl Config {
    /// Load configuration from file with environment and CLI overrides
    ///
    /// # Arguments
    ///
    /// * `path` - Path to configuration file
    /// * `cli` - CLI arguments for overrides
    ///
    /// # Returns
    ///
    /// Returns the loaded and merged configuration
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read or parsed
    pub fn load(path: &str, cli: &crate::cli::Cli) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            tracing::warn!("Config file not found at {}, using defaults", path);
            Self::default()
        };

        config.apply_env_vars();
        config.apply_cli_overrides(cli);

        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| LaimError::Config(format!("Failed to read config file: {}", e)))?;
        serde_yaml::from_str(&contents)
            .map_err(|e| LaimError::Config(format!("Failed to parse config: {}", e)).into())
    }

    fn apply_env_vars(&mut self) {
        if let Ok(host) = std::env::var("LAIM_BACKEND_HOST") {
            self.backend.host = host;
        }

        if let Ok(db_path) = std::env::var("LAIM_DB_PATH") {
            self.storage.db_path = Some(PathBuf::from(db_path));
        }

        if let Ok(host) = std::env::var("LAIM_HOST") {
            self.server.host = host;
        }

        if let Ok(port) = std::env::var("LAIM_PORT") {
            if let Ok(value) = port.parse() {
                self.server.port = value;
            } else {
                tracing::warn!("Invalid LAIM_PORT: {}", port);
            }
        }

        if let Ok(max) = std::env::var("LAIM_UPLOAD_MAX_BYTES") {
            if let Ok(value) = max.parse() {
                self.server.upload_max_bytes = value;
            } else {
                tracing::warn!("Invalid LAIM_UPLOAD_MAX_BYTES: {}", max);
            }
        }

        if let Ok(endpoint) = std::env::var("LAIM_HF_ENDPOINT") {
            self.recommender.hf_endpoint = endpoint;
        }
    }

    fn apply_cli_overrides(&mut self, cli: &crate::cli::Cli) {
        if let Some(url) = &cli.backend_url {
            self.backend.host = url.clone();
        }

        if let crate::cli::Commands::Serve {
            host,
            port,
            db_path,
        } = &cli.command
        {
            if let Some(host) = host {
                self.server.host = host.clone();
            }
            if let Some(port) = port {
                self.server.port = *port;
            }
            if let Some(db_path) = db_path {
                self.storage.db_path = Some(db_path.clone());
            }
        }
    }

    /// Validate the configuration
    ///
    /// Ensures all configuration values are within acceptable ranges
    /// and that required fields are properly set.
    ///
    /// # Errors
    ///
    /// Returns `LaimError::Config` naming the first offending setting
    pub fn validate(&self) -> Result<()> {
        let backend = url::Url::parse(&self.backend.host).map_err(|e| {
            LaimError::Config(format!(
                "backend.host is not a valid URL ({}): {}",
                self.backend.host, e
            ))
        })?;
        if !matches!(backend.scheme(), "http" | "https") {
            return Err(LaimError::Config(format!(
                "backend.host must use http or https, got {}",
                backend.scheme()
            ))
            .into());
        }

        let timeouts = [
            ("generate", self.backend.generate_timeout_seconds),
            ("list", self.backend.list_timeout_seconds),
            ("pull", self.backend.pull_timeout_seconds),
            ("delete", self.backend.delete_timeout_seconds),
        ];
        for (name, seconds) in timeouts {
            if seconds == 0 {
                return Err(LaimError::Config(format!(
                    "backend.{}_timeout_seconds must be greater than 0",
                    name
                ))
                .into());
            }
        }

        if self.server.port == 0 {
            return Err(LaimError::Config("server.port must be greater than 0".to_string()).into());
        }

        if self.server.upload_max_bytes == 0 {
            return Err(LaimError::Config(
                "server.upload_max_bytes must be greater than 0".to_string(),
            )
            .into());
        }

        if self.limits.max_content_chars == 0 {
            return Err(LaimError::Config(
                "limits.max_content_chars must be greater than 0".to_string(),
            )
            .into());
        }

        if self.limits.max_record_bytes < 1024 {
            return Err(LaimError::Config(
                "limits.max_record_bytes must be at least 1024".to_string(),
            )
            .into());
        }

        if self.limits.channel_capacity == 0 {
            return Err(LaimError::Config(
                "limits.channel_capacity must be greater than 0".to_string(),
            )
            .into());
        }

        if self.recommender.enrich {
            url::Url::parse(&self.recommender.hf_endpoint).map_err(|e| {
                LaimError::Config(format!(
                    "recommender.hf_endpoint is not a valid URL ({}): {}",
                    self.recommender.hf_endpoint, e
                ))
            })?;
        }

        if self.recommender.hf_timeout_seconds == 0 {
            return Err(LaimError::Config(
                "recommender.hf_timeout_seconds must be greater than 0".to_string(),
            )
            .into());
        }

        self.generation
            .validate()
            .map_err(|e| LaimError::Config(format!("generation: {}", e)))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use clap::Parser;
    use serial_test::serial;

    fn write_config(contents: &str) -> (tempfile::TempDir, String) {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, contents).expect("write config");
        let path = path.to_string_lossy().to_string();
        (dir, path)
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.backend.host, "http://localhost:11434");
        assert_eq!(config.backend.generate_timeout_seconds, 300);
        assert_eq!(config.backend.list_timeout_seconds, 10);
        assert_eq!(config.backend.pull_timeout_seconds, 1800);
        assert_eq!(config.server.port, 8080);
        assert!(config.relay.drain_on_disconnect);
    }

    #[test]
    fn test_config_validation_success() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_config_validation_bad_backend_url() {
        let mut config = Config::default();
        config.backend.host = "not a url".to_string();
        assert!(config.validate().is_err());

        config.backend.host = "ftp://localhost:11434".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_hf_endpoint_checked_only_when_enriching() {
        let mut config = Config::default();
        config.recommender.hf_endpoint = "::nope".to_string();
        assert!(config.validate().is_err());

        config.recommender.enrich = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_zero_timeout() {
        let mut config = Config::default();
        config.backend.pull_timeout_seconds = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("pull_timeout_seconds"));
    }

    #[test]
    fn test_config_validation_generation_out_of_range() {
        let mut config = Config::default();
        config.generation.temperature = Some(5.0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_from_yaml_partial_sections() {
        let (_dir, path) = write_config(
            "backend:\n  host: http://gpu-box:11434\nlimits:\n  max_content_chars: 100\n",
        );
        let config = Config::from_file(&path).expect("parse");
        assert_eq!(config.backend.host, "http://gpu-box:11434");
        assert_eq!(config.backend.list_timeout_seconds, 10);
        assert_eq!(config.limits.max_content_chars, 100);
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn test_config_from_yaml_rejects_garbage() {
        let (_dir, path) = write_config("server: [1, 2");
        assert!(Config::from_file(&path).is_err());
    }

    #[test]
    #[serial]
    fn test_load_missing_file_uses_defaults() {
        let cli = Cli::try_parse_from(["laim", "models", "list"]).expect("parse cli");
        let config = Config::load("/nonexistent/laim.yaml", &cli).expect("load");
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    #[serial]
    fn test_env_overrides_file() {
        let (_dir, path) = write_config("server:\n  port: 9000\n");
        std::env::set_var("LAIM_PORT", "9100");
        std::env::set_var("LAIM_BACKEND_HOST", "http://env-host:11434");

        let cli = Cli::try_parse_from(["laim", "models", "list"]).expect("parse cli");
        let config = Config::load(&path, &cli).expect("load");

        std::env::remove_var("LAIM_PORT");
        std::env::remove_var("LAIM_BACKEND_HOST");

        assert_eq!(config.server.port, 9100);
        assert_eq!(config.backend.host, "http://env-host:11434");
    }

    #[test]
    #[serial]
    fn test_cli_overrides_env() {
        std::env::set_var("LAIM_PORT", "9100");
        let cli = Cli::try_parse_from([
            "laim",
            "--backend-url",
            "http://cli-host:11434",
            "serve",
            "--port",
            "9200",
            "--db-path",
            "/tmp/laim-cli.db",
        ])
        .expect("parse cli");
        let config = Config::load("/nonexistent/laim.yaml", &cli).expect("load");
        std::env::remove_var("LAIM_PORT");

        assert_eq!(config.server.port, 9200);
        assert_eq!(config.backend.host, "http://cli-host:11434");
        assert_eq!(
            config.storage.db_path,
            Some(PathBuf::from("/tmp/laim-cli.db"))
        );
    }
}
