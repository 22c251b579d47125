//! TOML Configuration File Support
//!
//! Loads [`ConductorConfig`] from a TOML file at
//! `$XDG_CONFIG_HOME/prism/prism.toml` (typically `~/.config/prism/prism.toml`).
//!
//! # Configuration Priority
//!
//! Configuration values are loaded with the following priority (highest first):
//! 1. CLI arguments ([`ConfigOverrides`])
//! 2. Environment variables (`PRISM_API_BASE_URL`, `PRISM_CONNECT_TIMEOUT_MS`,
//!    `PRISM_EVENT_BUFFER`, `PRISM_MODE`)
//! 3. TOML configuration file
//! 4. Default values
//!
//! # Example Configuration
//!
//! ```toml
//! [api]
//! base_url = "http://localhost:8080"
//! connect_timeout_ms = 5000
//!
//! [conductor]
//! event_buffer = 100
//! default_mode = "chat"
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::conductor::ConductorConfig;
use crate::mode::Mode;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur when loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file at {path}: {source}")]
    ReadError {
        /// The path that was attempted
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("Failed to parse TOML config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

// =============================================================================
// Configuration Source Tracking
// =============================================================================

/// Tracks where a configuration value came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Value from command-line argument
    Cli,
    /// Value from environment variable
    Env,
    /// Value from TOML configuration file
    File,
    /// Default value
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cli => write!(f, "CLI"),
            Self::Env => write!(f, "environment"),
            Self::File => write!(f, "config file"),
            Self::Default => write!(f, "default"),
        }
    }
}

// =============================================================================
// TOML Configuration Structures
// =============================================================================

/// `[api]` section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiToml {
    /// Base URL of the generation service
    pub base_url: Option<String>,

    /// Connection timeout in milliseconds
    pub connect_timeout_ms: Option<u64>,
}

/// `[conductor]` section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConductorToml {
    /// Dispatch channel capacity
    pub event_buffer: Option<usize>,

    /// Mode selected at startup
    pub default_mode: Option<String>,
}

/// Top-level TOML configuration structure
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PrismToml {
    /// Service configuration section
    pub api: ApiToml,

    /// Conductor configuration section
    pub conductor: ConductorToml,
}

// =============================================================================
// Loaded Configuration
// =============================================================================

/// Configuration merged from every source
#[derive(Clone, Debug)]
pub struct LoadedConfig {
    /// The merged conductor configuration
    pub conductor: ConductorConfig,

    /// Path to the config file that was loaded (if any)
    pub config_file_path: Option<PathBuf>,

    /// Source of the base URL
    source: ConfigSource,
}

impl Default for LoadedConfig {
    fn default() -> Self {
        Self {
            conductor: ConductorConfig::default(),
            config_file_path: None,
            source: ConfigSource::Default,
        }
    }
}

impl LoadedConfig {
    /// Where the base URL came from
    #[must_use]
    pub fn source(&self) -> ConfigSource {
        self.source
    }
}

/// Command-line overrides
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    /// Base URL override
    pub base_url: Option<String>,

    /// Connect timeout override
    pub connect_timeout_ms: Option<u64>,

    /// Dispatch channel capacity override
    pub event_buffer: Option<usize>,

    /// Startup mode override
    pub default_mode: Option<Mode>,
}

impl ConfigOverrides {
    /// Create a new empty set of overrides
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set base URL override
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set startup mode override
    #[must_use]
    pub fn with_default_mode(mut self, mode: Mode) -> Self {
        self.default_mode = Some(mode);
        self
    }

    /// Apply overrides to a configuration
    pub fn apply(&self, config: &mut LoadedConfig) {
        if let Some(ref url) = self.base_url {
            config.conductor.base_url = url.clone();
            config.source = ConfigSource::Cli;
        }
        if let Some(ms) = self.connect_timeout_ms {
            config.conductor.connect_timeout_ms = ms;
        }
        if let Some(size) = self.event_buffer {
            config.conductor.event_buffer = size;
        }
        if let Some(mode) = self.default_mode {
            config.conductor.default_mode = mode;
        }
    }
}

// =============================================================================
// Configuration Loading
// =============================================================================

/// Get the default configuration file path
///
/// Returns `$XDG_CONFIG_HOME/prism/prism.toml` or
/// `~/.config/prism/prism.toml` if `XDG_CONFIG_HOME` is not set.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("prism").join("prism.toml"))
}

/// Load configuration from all sources with proper priority
///
/// # Errors
///
/// Returns an error if the config file exists but cannot be parsed, or if the
/// merged configuration is invalid. A missing config file is not an error.
pub fn load_config(overrides: &ConfigOverrides) -> Result<LoadedConfig, ConfigError> {
    load_config_from_path(default_config_path(), overrides)
}

/// Load configuration from a specific path
///
/// # Errors
///
/// Returns an error if the specified config file cannot be read or parsed, or
/// if the merged configuration is invalid.
pub fn load_config_from_path(
    path: Option<PathBuf>,
    overrides: &ConfigOverrides,
) -> Result<LoadedConfig, ConfigError> {
    load_with_env(path, overrides, |key| std::env::var(key).ok())
}

/// Defaults plus environment values read through `env`
pub(crate) fn conductor_from_env<F>(env: F) -> Result<ConductorConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    load_with_env(None, &ConfigOverrides::default(), env).map(|loaded| loaded.conductor)
}

/// Load configuration reading environment values through `env`
fn load_with_env<F>(
    path: Option<PathBuf>,
    overrides: &ConfigOverrides,
    env: F,
) -> Result<LoadedConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    // Start with defaults
    let mut config = LoadedConfig::default();

    if let Some(ref config_path) = path {
        if config_path.exists() {
            let toml_content =
                std::fs::read_to_string(config_path).map_err(|e| ConfigError::ReadError {
                    path: config_path.clone(),
                    source: e,
                })?;

            let toml_config: PrismToml = toml::from_str(&toml_content)?;
            apply_toml_config(&mut config, &toml_config)?;
            config.config_file_path = Some(config_path.clone());

            tracing::info!(
                path = %config_path.display(),
                "Loaded configuration from file"
            );
        } else {
            tracing::debug!(
                path = %config_path.display(),
                "Config file not found, using defaults"
            );
        }
    }

    apply_env_config(&mut config, env)?;
    overrides.apply(&mut config);
    validate(&config.conductor)?;

    tracing::debug!(
        base_url = %config.conductor.base_url,
        source = %config.source,
        "Configuration resolved"
    );
    Ok(config)
}

/// Apply TOML configuration values to the config struct
fn apply_toml_config(config: &mut LoadedConfig, toml: &PrismToml) -> Result<(), ConfigError> {
    if let Some(ref url) = toml.api.base_url {
        config.conductor.base_url = url.clone();
        config.source = ConfigSource::File;
    }
    if let Some(timeout) = toml.api.connect_timeout_ms {
        config.conductor.connect_timeout_ms = timeout;
    }
    if let Some(size) = toml.conductor.event_buffer {
        config.conductor.event_buffer = size;
    }
    if let Some(ref mode) = toml.conductor.default_mode {
        config.conductor.default_mode = parse_mode(mode)?;
    }
    Ok(())
}

/// Apply environment variable overrides to the config
fn apply_env_config<F>(config: &mut LoadedConfig, env: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = env("PRISM_API_BASE_URL") {
        config.conductor.base_url = url;
        config.source = ConfigSource::Env;
    }
    if let Some(timeout) = env("PRISM_CONNECT_TIMEOUT_MS") {
        if let Ok(ms) = timeout.parse::<u64>() {
            config.conductor.connect_timeout_ms = ms;
        }
    }
    if let Some(size) = env("PRISM_EVENT_BUFFER") {
        if let Ok(n) = size.parse::<usize>() {
            config.conductor.event_buffer = n;
        }
    }
    if let Some(mode) = env("PRISM_MODE") {
        config.conductor.default_mode = parse_mode(&mode)?;
    }
    Ok(())
}

fn parse_mode(value: &str) -> Result<Mode, ConfigError> {
    value
        .parse()
        .map_err(|e| ConfigError::ValidationError(format!("{e}")))
}

/// Check a merged configuration
///
/// # Errors
///
/// Rejects an empty or non-HTTP base URL and a zero event buffer.
pub fn validate(config: &ConductorConfig) -> Result<(), ConfigError> {
    let url = config.base_url.trim();
    if url.is_empty() {
        return Err(ConfigError::ValidationError(
            "base_url must not be empty".to_string(),
        ));
    }
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(ConfigError::ValidationError(format!(
            "base_url must start with http:// or https://, got {url}"
        )));
    }
    if config.event_buffer == 0 {
        return Err(ConfigError::ValidationError(
            "event_buffer must be at least 1".to_string(),
        ));
    }
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================
