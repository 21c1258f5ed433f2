//! Client configuration

use crate::error::ClientError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default API address
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";

/// Default per-request deadline in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 15;

/// Environment variable prefix, e.g. `ACTALOG_BASE_URL`
pub const ENV_PREFIX: &str = "ACTALOG";

/// HTTP client configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base address of the ActaLog API
    pub base_url: String,

    /// Per-request deadline in seconds
    pub timeout_secs: u64,

    /// User agent sent with every request
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            user_agent: concat!("actalog-client/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl ClientConfig {
    /// Load configuration from file, with environment overrides
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ClientError> {
        let config: Self = Self::builder()?
            .add_source(config::File::from(path.as_ref()))
            .add_source(Self::environment())
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration with defaults and environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if environment variables cannot be parsed
    pub fn from_env() -> Result<Self, ClientError> {
        let config: Self = Self::builder()?
            .add_source(Self::environment())
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Per-request deadline
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Check the base URL is an absolute http(s) address
    pub fn validate(&self) -> Result<(), ClientError> {
        let url = url::Url::parse(&self.base_url)
            .map_err(|e| ClientError::Configuration(format!("invalid base_url: {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ClientError::Configuration(format!(
                "base_url must use http or https, got {}",
                url.scheme()
            )));
        }
        if self.timeout_secs == 0 {
            return Err(ClientError::Configuration(
                "timeout_secs must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    fn builder() -> Result<config::ConfigBuilder<config::builder::DefaultState>, ClientError> {
        let defaults = Self::default();
        Ok(config::Config::builder()
            .set_default("base_url", defaults.base_url)?
            .set_default("timeout_secs", defaults.timeout_secs)?
            .set_default("user_agent", defaults.user_agent)?)
    }

    fn environment() -> config::Environment {
        config::Environment::with_prefix(ENV_PREFIX).try_parsing(true)
    }
}
