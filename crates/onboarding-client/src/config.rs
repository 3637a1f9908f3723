//! Client configuration.
//!
//! Provides configuration for the onboarding API endpoint, credentials,
//! timeouts, retry behavior and discovery scan probing. Configuration is
//! loaded from environment variables with sensible defaults.

use crate::retry::RetryPolicy;
use onboarding_auth::AuthError;
use onboarding_model::ScanProbeConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Missing required environment variable.
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    /// Invalid configuration value.
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue {
        /// Configuration key.
        key: String,
        /// Error message.
        message: String,
    },

    /// The API token could not be used.
    #[error("API token error: {0}")]
    Token(#[from] AuthError),

    /// The HTTP client could not be built.
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),
}

/// Onboarding client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Explicit API base URL. When unset the tenant URL is read from the token.
    pub base_url: Option<String>,

    /// Platform API token.
    pub api_token: Option<String>,

    /// Default request timeout in seconds.
    pub default_timeout_secs: u64,

    /// Attempts for confirmation fetches after a mutation.
    pub max_retries: u32,

    /// Initial backoff between confirmation attempts, in milliseconds.
    pub retry_base_delay_ms: u64,

    /// Discovery scan polling.
    pub scan_probe: ScanProbeConfig,

    /// Whether to verify TLS certificates (disable only for testing).
    pub verify_tls: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            api_token: None,
            default_timeout_secs: 30,
            max_retries: 3,
            retry_base_delay_ms: 500,
            scan_probe: ScanProbeConfig::default(),
            verify_tls: true,
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `ONBOARDING_API_URL`: API base URL (default: tenant URL from the token)
    /// - `ONBOARDING_API_TOKEN`: API token
    /// - `ONBOARDING_TIMEOUT_SECS`: Request timeout in seconds (default: 30)
    /// - `ONBOARDING_MAX_RETRIES`: Confirmation fetch attempts (default: 3)
    /// - `ONBOARDING_RETRY_BASE_DELAY_MS`: Initial retry backoff (default: 500)
    /// - `ONBOARDING_SCAN_MAX_RETRIES`: Discovery scan polls (default: 20)
    /// - `ONBOARDING_SCAN_INTERVAL_SECS`: Seconds between polls (default: 3)
    /// - `ONBOARDING_VERIFY_TLS`: Whether to verify TLS (default: true)
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            base_url: std::env::var("ONBOARDING_API_URL").ok(),
            api_token: std::env::var("ONBOARDING_API_TOKEN").ok(),
            default_timeout_secs: env_parse("ONBOARDING_TIMEOUT_SECS")
                .unwrap_or(default.default_timeout_secs),
            max_retries: env_parse("ONBOARDING_MAX_RETRIES").unwrap_or(default.max_retries),
            retry_base_delay_ms: env_parse("ONBOARDING_RETRY_BASE_DELAY_MS")
                .unwrap_or(default.retry_base_delay_ms),
            scan_probe: ScanProbeConfig::from_options(
                env_parse("ONBOARDING_SCAN_MAX_RETRIES"),
                env_parse("ONBOARDING_SCAN_INTERVAL_SECS"),
            ),
            verify_tls: std::env::var("ONBOARDING_VERIFY_TLS")
                .map(|s| s != "false" && s != "0")
                .unwrap_or(default.verify_tls),
        }
    }

    /// Get the default request timeout as a Duration.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.default_timeout_secs)
    }

    /// Retry policy for confirmation fetches.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_retries,
            base_delay: Duration::from_millis(self.retry_base_delay_ms),
            ..RetryPolicy::standard()
        }
    }

    /// Validate that the configuration can produce a working client.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_token.as_deref().map_or(true, |t| t.trim().is_empty()) {
            return Err(ConfigError::MissingEnvVar("ONBOARDING_API_TOKEN".to_string()));
        }
        if self.max_retries == 0 {
            return Err(ConfigError::InvalidValue {
                key: "max_retries".to_string(),
                message: "at least one attempt is required".to_string(),
            });
        }
        if self.default_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "default_timeout_secs".to_string(),
                message: "timeout must be positive".to_string(),
            });
        }
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.parse().ok())
}

/// Base URL of the onboarding API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiEndpoint {
    /// Base URL (e.g., "https://acme.onboarding.example.com").
    pub base_url: String,
}

impl ApiEndpoint {
    /// Create an endpoint for the given base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }

    /// Build a full URL by appending a path to the base URL.
    pub fn url(&self, path: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        format!("{}/{}", base, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.default_timeout_secs, 30);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.scan_probe, ScanProbeConfig::default());
        assert!(config.verify_tls);
    }

    #[test]
    fn test_endpoint_url() {
        let endpoint = ApiEndpoint::new("https://api.example.com/");

        assert_eq!(
            endpoint.url("/api/v1/onboarding/aws/accounts"),
            "https://api.example.com/api/v1/onboarding/aws/accounts"
        );
        assert_eq!(
            endpoint.url("api/v1/onboarding/aws/accounts"),
            "https://api.example.com/api/v1/onboarding/aws/accounts"
        );
    }

    #[test]
    fn test_retry_policy_from_config() {
        let config = ClientConfig {
            max_retries: 5,
            retry_base_delay_ms: 10,
            ..Default::default()
        };
        let policy = config.retry_policy();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.base_delay, Duration::from_millis(10));
    }

    #[test]
    fn test_validate() {
        let mut config = ClientConfig::default();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingEnvVar(_))
        ));

        config.api_token = Some("svc_key".to_string());
        assert!(config.validate().is_ok());

        config.max_retries = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { .. })
        ));
    }
}
