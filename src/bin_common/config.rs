//! Probe configuration
//!
//! YAML for everything except proxy secrets, which come from the
//! environment (`PROXY_USERNAME` / `PROXY_PASSWORD`, usually via `.env`).

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::info;
use wiresockets::{Endpoint, ProxyConfig, ProxyCredentials, ProxyKind, SocketConfig};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load config file: {0}")]
    FileError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Probe binary configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeConfig {
    /// Where the probe connects to
    pub target: TargetConfig,

    /// Optional proxy between the probe and the target
    #[serde(default)]
    pub proxy: Option<ProxySettings>,

    /// Socket tuning
    #[serde(default)]
    pub socket: SocketConfig,

    /// What the probe sends and how long it waits
    #[serde(default)]
    pub probe: ProbeSettings,

    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxySettings {
    pub kind: ProxyKind,
    pub host: String,
    pub port: u16,

    /// Username from .env (not in YAML)
    #[serde(skip)]
    pub username: Option<String>,

    /// Password from .env (not in YAML)
    #[serde(skip)]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeSettings {
    /// Payload written once connected
    pub payload: String,
    /// Prepend the payload length as a 4-byte little-endian prefix
    pub length_prefix: bool,
    /// Bytes to read back before finishing; 0 disconnects right after writing
    pub expect_bytes: usize,
    /// Owner loop tick
    pub poll_interval_ms: u64,
    /// Upper bound for the whole probe run
    pub run_timeout_secs: u64,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            payload: "ping".to_string(),
            length_prefix: true,
            expect_bytes: 0,
            poll_interval_ms: 50,
            run_timeout_secs: 30,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl ProbeConfig {
    /// Load configuration from YAML file
    pub fn load(config_path: impl AsRef<Path>) -> Result<Self> {
        let yaml_content = std::fs::read_to_string(config_path)?;
        Self::from_yaml(&yaml_content)
    }

    /// Parse, apply environment overrides and validate
    pub fn from_yaml(yaml_content: &str) -> Result<Self> {
        let mut config: ProbeConfig = serde_yaml::from_str(yaml_content)?;

        if let Some(proxy) = config.proxy.as_mut() {
            if let Ok(username) = std::env::var("PROXY_USERNAME") {
                info!("Using proxy username from environment");
                proxy.username = Some(username);
            }
            if let Ok(password) = std::env::var("PROXY_PASSWORD") {
                proxy.password = Some(password);
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        if self.target.host.is_empty() {
            return Err(ConfigError::ValidationError(
                "target.host must not be empty".to_string(),
            ));
        }
        if self.target.port == 0 {
            return Err(ConfigError::ValidationError(
                "target.port must be greater than 0".to_string(),
            ));
        }

        if let Some(proxy) = &self.proxy {
            if proxy.host.is_empty() || proxy.port == 0 {
                return Err(ConfigError::ValidationError(
                    "proxy.host and proxy.port are required when proxy is set".to_string(),
                ));
            }
            if proxy.username.is_some() != proxy.password.is_some() {
                return Err(ConfigError::ValidationError(
                    "PROXY_USERNAME and PROXY_PASSWORD must be set together".to_string(),
                ));
            }
        }

        self.socket
            .validate()
            .map_err(|e| ConfigError::ValidationError(e.to_string()))?;

        if self.probe.poll_interval_ms == 0 {
            return Err(ConfigError::ValidationError(
                "probe.poll_interval_ms must be greater than 0".to_string(),
            ));
        }
        if self.probe.run_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "probe.run_timeout_secs must be greater than 0".to_string(),
            ));
        }

        let valid_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "log_level must be one of: {}",
                valid_levels.join(", ")
            )));
        }

        Ok(())
    }

    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new(self.target.host.clone(), self.target.port)
    }

    /// Proxy configuration handed to the socket
    pub fn proxy_config(&self) -> Option<ProxyConfig> {
        self.proxy.as_ref().map(|proxy| {
            let config = ProxyConfig::new(proxy.kind, proxy.host.clone(), proxy.port);
            match (&proxy.username, &proxy.password) {
                (Some(username), Some(password)) => {
                    config.with_credentials(ProxyCredentials::new(username, password))
                }
                _ => config,
            }
        })
    }

    /// Log configuration summary
    pub fn log(&self) {
        info!("Configuration loaded:");
        info!("  Target: {}", self.endpoint());
        match &self.proxy {
            Some(proxy) => info!(
                "  Proxy: {:?} {}:{} (auth: {})",
                proxy.kind,
                proxy.host,
                proxy.port,
                proxy.username.is_some()
            ),
            None => info!("  Proxy: none"),
        }
        info!("  Connect timeout: {} ms", self.socket.connect_timeout_ms);
        info!("  Payload: {} bytes", self.probe.payload.len());
        info!("  Log level: {}", self.log_level);
    }
}
