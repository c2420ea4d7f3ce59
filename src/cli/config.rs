//! Configuration loading for the `kibitz` CLI.
//!
//! Configuration is loaded from TOML files with the following resolution order:
//! 1. `--config <path>` (CLI flag, must exist)
//! 2. `~/.kibitz/config.toml` (user)
//! 3. `/etc/kibitz/config.toml` (system)
//!
//! When no file is found the built-in defaults apply.
//!
//! Secrets are loaded separately with mandatory permission checks:
//! 1. `~/.kibitz/secrets.toml` (user, must be 0600)
//! 2. `/etc/kibitz/secrets.toml` (system, must be 0600)
//! 3. `OPENAI_API_KEY` environment variable

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::broker::BrokerConfig;
use crate::cache::CacheConfig;
use crate::limiter::RateLimitConfig;
use crate::providers::RetryConfig;
use crate::{KibitzError, Result};

const API_KEY_ENV_VAR: &str = "OPENAI_API_KEY";

/// CLI configuration file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub broker: BrokerSection,
    #[serde(default)]
    pub cache: CacheSection,
    #[serde(default)]
    pub rate_limit: RateLimitSection,
    #[serde(default)]
    pub retry: RetrySection,
    #[serde(default)]
    pub openai: OpenAiSection,
}

/// Scheduling and request defaults.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BrokerSection {
    pub batch_size: usize,
    pub poll_interval_ms: u64,
    pub request_timeout_secs: u64,
    pub default_model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub presence_penalty: f32,
    pub frequency_penalty: f32,
    /// Overrides the built-in system prompt when set.
    pub system_prompt: Option<String>,
}

impl Default for BrokerSection {
    fn default() -> Self {
        let defaults = BrokerConfig::default();
        Self {
            batch_size: defaults.batch_size,
            poll_interval_ms: defaults.poll_interval.as_millis() as u64,
            request_timeout_secs: defaults.request_timeout.as_secs(),
            default_model: defaults.default_model,
            temperature: defaults.default_temperature,
            max_tokens: defaults.default_max_tokens,
            presence_penalty: defaults.default_presence_penalty,
            frequency_penalty: defaults.default_frequency_penalty,
            system_prompt: None,
        }
    }
}

/// Response cache settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheSection {
    pub ttl_secs: u64,
    pub max_entries: u64,
    pub similarity_threshold: f64,
    pub max_bucket_len: usize,
}

impl Default for CacheSection {
    fn default() -> Self {
        let defaults = CacheConfig::default();
        Self {
            ttl_secs: defaults.ttl.as_secs(),
            max_entries: defaults.max_entries,
            similarity_threshold: defaults.similarity_threshold,
            max_bucket_len: defaults.max_bucket_len,
        }
    }
}

/// Outbound rate limit.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RateLimitSection {
    pub endpoint: String,
    pub max_requests: u32,
    pub window_secs: u64,
}

impl Default for RateLimitSection {
    fn default() -> Self {
        let defaults = RateLimitConfig::default();
        Self {
            endpoint: defaults.endpoint,
            max_requests: defaults.max_requests,
            window_secs: defaults.window.as_secs(),
        }
    }
}

/// Retry policy.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetrySection {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetrySection {
    fn default() -> Self {
        let defaults = RetryConfig::default();
        Self {
            max_attempts: defaults.max_attempts,
            base_delay_ms: defaults.base_delay.as_millis() as u64,
            max_delay_ms: defaults.max_delay.as_millis() as u64,
        }
    }
}

/// Inference endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OpenAiSection {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for OpenAiSection {
    fn default() -> Self {
        Self {
            base_url: crate::providers::openai::DEFAULT_BASE_URL.to_string(),
            timeout_secs: crate::providers::openai::DEFAULT_TIMEOUT.as_secs(),
        }
    }
}

impl Config {
    /// Load configuration from the standard locations.
    ///
    /// An explicit path must exist; otherwise a missing file simply means
    /// defaults.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        match Self::resolve_config_path(explicit_path)? {
            Some(path) => Self::load_from_file(&path),
            None => {
                debug!("no config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Parse a specific config file.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            KibitzError::Configuration(format!("Failed to read config file {path:?}: {e}"))
        })?;
        let config = toml::from_str(&content).map_err(|e| {
            KibitzError::Configuration(format!("Failed to parse config file {path:?}: {e}"))
        })?;
        debug!(path = %path.display(), "config loaded");
        Ok(config)
    }

    fn resolve_config_path(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
        if let Some(path) = explicit {
            if path.exists() {
                return Ok(Some(path.to_path_buf()));
            }
            return Err(KibitzError::Configuration(format!(
                "Config file not found: {path:?}"
            )));
        }

        // User config
        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".kibitz").join("config.toml");
            if user_config.exists() {
                return Ok(Some(user_config));
            }
        }

        // System config
        let system_config = PathBuf::from("/etc/kibitz/config.toml");
        if system_config.exists() {
            return Ok(Some(system_config));
        }

        Ok(None)
    }

    /// Translate the file sections into a [`BrokerConfig`].
    pub fn broker_config(&self) -> BrokerConfig {
        let defaults = BrokerConfig::default();
        BrokerConfig {
            batch_size: self.broker.batch_size,
            poll_interval: Duration::from_millis(self.broker.poll_interval_ms),
            request_timeout: Duration::from_secs(self.broker.request_timeout_secs),
            default_model: self.broker.default_model.clone(),
            default_temperature: self.broker.temperature,
            default_max_tokens: self.broker.max_tokens,
            default_presence_penalty: self.broker.presence_penalty,
            default_frequency_penalty: self.broker.frequency_penalty,
            system_prompt: self
                .broker
                .system_prompt
                .clone()
                .unwrap_or(defaults.system_prompt),
            cache: CacheConfig::new()
                .ttl(Duration::from_secs(self.cache.ttl_secs))
                .max_entries(self.cache.max_entries)
                .similarity_threshold(self.cache.similarity_threshold)
                .max_bucket_len(self.cache.max_bucket_len),
            rate_limit: RateLimitConfig::new()
                .endpoint(self.rate_limit.endpoint.clone())
                .max_requests(self.rate_limit.max_requests)
                .window(Duration::from_secs(self.rate_limit.window_secs)),
            retry: RetryConfig::new()
                .max_attempts(self.retry.max_attempts)
                .base_delay(Duration::from_millis(self.retry.base_delay_ms))
                .max_delay(Duration::from_millis(self.retry.max_delay_ms)),
        }
    }
}

/// Secrets configuration (API keys).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Secrets {
    #[serde(default)]
    pub openai: Option<ApiKeySecret>,
}

/// A single API key secret.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiKeySecret {
    pub api_key: String,
}

impl Secrets {
    /// Load secrets from the standard locations with permission checks.
    ///
    /// Returns empty secrets if no file exists (the key may come from the
    /// environment).
    pub fn load() -> Result<Self> {
        if let Some(home) = dirs::home_dir() {
            let user_secrets = home.join(".kibitz").join("secrets.toml");
            if user_secrets.exists() {
                return Self::load_from_file(&user_secrets);
            }
        }

        let system_secrets = PathBuf::from("/etc/kibitz/secrets.toml");
        if system_secrets.exists() {
            return Self::load_from_file(&system_secrets);
        }

        Ok(Secrets::default())
    }

    /// Load a specific secrets file after checking its permissions.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        Self::check_permissions(path)?;
        let content = fs::read_to_string(path).map_err(|e| {
            KibitzError::Configuration(format!("Failed to read secrets file {path:?}: {e}"))
        })?;
        toml::from_str(&content).map_err(|e| {
            KibitzError::Configuration(format!("Failed to parse secrets file {path:?}: {e}"))
        })
    }

    /// Check that the secrets file has secure permissions (0600 or 0400).
    #[cfg(unix)]
    fn check_permissions(path: &Path) -> Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let metadata = fs::metadata(path).map_err(|e| {
            KibitzError::Configuration(format!("Failed to stat secrets file {path:?}: {e}"))
        })?;

        let mode = metadata.permissions().mode();
        // Reject if group or other bits are set
        if mode & 0o077 != 0 {
            return Err(KibitzError::Configuration(format!(
                "Secrets file {path:?} has insecure permissions {:o}. Must be 0600 or 0400.",
                mode & 0o777
            )));
        }

        Ok(())
    }

    #[cfg(not(unix))]
    fn check_permissions(_path: &Path) -> Result<()> {
        Ok(())
    }

    /// The OpenAI key, falling back to `OPENAI_API_KEY`.
    pub fn api_key(&self) -> Option<String> {
        self.openai
            .as_ref()
            .map(|s| s.api_key.clone())
            .or_else(|| std::env::var(API_KEY_ENV_VAR).ok())
            .filter(|key| !key.trim().is_empty())
    }
}
