//! Client configuration.
//!
//! Every field carries a serde default, so an absent file or an empty
//! environment produces a usable configuration. Sources are layered with the
//! `config` crate, later sources overriding earlier ones:
//!
//! 1. `config/sheetgate.{toml,yaml,json}`  (optional)
//! 2. an explicit file path                  (required when given)
//! 3. `SHEETGATE__<SECTION>__<KEY>` environment variables
//!    e.g. `SHEETGATE__RETRY__MAX_ATTEMPTS=3`

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ConfigError;
use crate::retry::RetryPolicy;

/// Top-level client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Path to the service-account key file
    pub credentials_path: PathBuf,

    /// Demote retry diagnostics to DEBUG
    pub silent: bool,

    /// Session cache settings
    pub session: SessionConfig,

    /// Retry settings
    pub retry: RetryConfig,

    /// Operation queue settings
    pub queue: QueueConfig,

    /// Remote endpoints and HTTP settings
    pub remote: RemoteConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            credentials_path: PathBuf::from("credentials.json"),
            silent: false,
            session: SessionConfig::default(),
            retry: RetryConfig::default(),
            queue: QueueConfig::default(),
            remote: RemoteConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Session cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Maximum age of a cached session in seconds
    pub freshness_window_seconds: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            freshness_window_seconds: 50 * 60,
        }
    }
}

impl SessionConfig {
    pub fn freshness_window(&self) -> Duration {
        Duration::from_secs(self.freshness_window_seconds)
    }
}

/// Retry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts per operation, including the first
    pub max_attempts: u32,

    /// Fixed pause between attempts in seconds
    pub delay_seconds: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 8,
            delay_seconds: 60,
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, Duration::from_secs(self.delay_seconds))
    }
}

/// Operation queue configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Pause between queued operations in milliseconds
    pub inter_item_delay_ms: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            inter_item_delay_ms: 100,
        }
    }
}

impl QueueConfig {
    pub fn inter_item_delay(&self) -> Duration {
        Duration::from_millis(self.inter_item_delay_ms)
    }
}

/// Remote service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Base URL of the spreadsheet API
    pub api_base_url: String,

    /// Token endpoint override (defaults to the key file's `token_uri`)
    pub token_uri: Option<String>,

    /// OAuth2 scopes requested for the session
    pub scopes: Vec<String>,

    /// HTTP request timeout in seconds
    pub request_timeout_seconds: u64,

    /// User agent for all requests
    pub user_agent: String,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://sheets.googleapis.com/v4".to_string(),
            token_uri: None,
            scopes: vec!["https://www.googleapis.com/auth/spreadsheets".to_string()],
            request_timeout_seconds: 30,
            user_agent: format!("sheetgate/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset
    pub level: String,

    /// Emit JSON-formatted log lines
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl GateConfig {
    /// Environment variable prefix for overrides.
    pub const ENV_PREFIX: &'static str = "SHEETGATE";

    /// Load configuration from the default file, an optional explicit file,
    /// and the environment, then validate it.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Load` for unreadable or malformed sources and
    /// `ConfigError::Invalid` for values that fail [`GateConfig::validate`].
    pub fn load(explicit_path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder()
            .add_source(config::File::with_name("config/sheetgate").required(false));

        if let Some(path) = explicit_path {
            info!(path = %path.display(), "Loading configuration from explicit path");
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let gate_config: GateConfig = builder
            .add_source(
                config::Environment::with_prefix(Self::ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("remote.scopes"),
            )
            .build()?
            .try_deserialize()?;

        gate_config.validate()?;
        Ok(gate_config)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retry.max_attempts == 0 {
            return Err(invalid("retry.max_attempts", "must be at least 1"));
        }

        if self.session.freshness_window_seconds == 0 {
            return Err(invalid(
                "session.freshness_window_seconds",
                "must be greater than zero",
            ));
        }

        if self.remote.scopes.is_empty() {
            return Err(invalid("remote.scopes", "at least one scope is required"));
        }

        if self.remote.api_base_url.trim().is_empty() {
            return Err(invalid("remote.api_base_url", "cannot be empty"));
        }

        Ok(())
    }
}

fn invalid(field: &str, message: &str) -> ConfigError {
    ConfigError::Invalid {
        field: field.to_string(),
        message: message.to_string(),
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
