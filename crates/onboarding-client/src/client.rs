//! Onboarding client facade.

use crate::config::{ApiEndpoint, ClientConfig, ConfigError};
use crate::error::OnboardingResult;
use crate::http::ApiClient;
use crate::resources::{AwsOrganizationClient, ResourceClient};
use crate::retry::RetryPolicy;
use chrono::Utc;
use onboarding_auth::ApiToken;
use onboarding_model::{ResourceKind, ScanProbeConfig};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Entry point for every onboarding operation.
///
/// Cheap to clone; clones share the HTTP connection pool and cancellation.
#[derive(Debug, Clone)]
pub struct OnboardingClient {
    api: ApiClient,
    retry: RetryPolicy,
    probe: ScanProbeConfig,
    cancel: CancellationToken,
}

impl OnboardingClient {
    /// Build a client from configuration.
    ///
    /// The token must not be expired. The tenant URL comes from
    /// `config.base_url` when set, otherwise from the token's claims.
    pub fn from_config(config: &ClientConfig) -> OnboardingResult<Self> {
        config.validate()?;

        let raw = config
            .api_token
            .as_deref()
            .ok_or_else(|| ConfigError::MissingEnvVar("ONBOARDING_API_TOKEN".to_string()))?;
        let token = ApiToken::parse(raw)?;
        token.ensure_not_expired(Utc::now())?;

        let base_url = token.tenant_url(config.base_url.as_deref())?;
        info!(base_url = %base_url, "Onboarding client configured");

        let api = ApiClient::new(
            ApiEndpoint::new(base_url),
            token,
            config.timeout(),
            config.verify_tls,
        )?;

        Ok(Self {
            api,
            retry: config.retry_policy(),
            probe: config.scan_probe,
            cancel: CancellationToken::new(),
        })
    }

    /// Build a client from `ONBOARDING_*` environment variables.
    pub fn from_env() -> OnboardingResult<Self> {
        Self::from_config(&ClientConfig::from_env())
    }

    /// Share `cancel` with every workflow started from this client.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token that cancels this client's workflows.
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Client for any resource kind.
    pub fn resources(&self, kind: ResourceKind) -> ResourceClient {
        ResourceClient::new(self.api.clone(), kind, self.retry.clone())
            .with_cancellation(self.cancel.clone())
    }

    /// AWS accounts.
    pub fn aws_accounts(&self) -> ResourceClient {
        self.resources(ResourceKind::AwsAccount)
    }

    /// AWS organizations.
    pub fn aws_organizations(&self) -> ResourceClient {
        self.resources(ResourceKind::AwsOrganization)
    }

    /// Member accounts of AWS organizations, with discovery.
    pub fn organization_accounts(&self) -> AwsOrganizationClient {
        AwsOrganizationClient::new(self.api.clone(), self.retry.clone(), self.probe)
            .with_cancellation(self.cancel.clone())
    }

    /// Azure Entra tenants.
    pub fn entra_tenants(&self) -> ResourceClient {
        self.resources(ResourceKind::EntraTenant)
    }

    /// Azure management groups.
    pub fn management_groups(&self) -> ResourceClient {
        self.resources(ResourceKind::ManagementGroup)
    }

    /// Azure subscriptions.
    pub fn subscriptions(&self) -> ResourceClient {
        self.resources(ResourceKind::Subscription)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OnboardingError;
    use onboarding_auth::AuthError;

    fn config(token: &str, base_url: Option<&str>) -> ClientConfig {
        ClientConfig {
            base_url: base_url.map(str::to_string),
            api_token: Some(token.to_string()),
            ..ClientConfig::default()
        }
    }

    #[test]
    fn test_from_config_with_explicit_url() {
        let client =
            OnboardingClient::from_config(&config("svc_key", Some("https://acme.example.com/")))
                .unwrap();
        assert_eq!(client.api.endpoint().base_url, "https://acme.example.com");
        assert_eq!(client.subscriptions().kind(), ResourceKind::Subscription);
        assert_eq!(client.aws_accounts().kind(), ResourceKind::AwsAccount);
    }

    #[test]
    fn test_opaque_token_needs_url() {
        let err = OnboardingClient::from_config(&config("svc_key", None)).unwrap_err();
        assert!(matches!(
            err,
            OnboardingError::Config(ConfigError::Token(AuthError::MissingClaim(_)))
        ));
    }

    #[test]
    fn test_missing_token_rejected() {
        let err = OnboardingClient::from_config(&ClientConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            OnboardingError::Config(ConfigError::MissingEnvVar(_))
        ));
    }

    #[test]
    fn test_cancellation_is_shared() {
        let cancel = CancellationToken::new();
        let client =
            OnboardingClient::from_config(&config("svc_key", Some("http://localhost:8080")))
                .unwrap()
                .with_cancellation(cancel.clone());

        cancel.cancel();
        assert!(client.cancellation_token().is_cancelled());
        assert!(client.clone().cancellation_token().is_cancelled());
    }
}
