//! AWS organization client.
//!
//! Member accounts are attached through their organization. The platform only
//! accepts accounts it has already discovered, so [`sync_account`] falls back
//! to a discovery scan when the account is not visible yet.
//!
//! [`sync_account`]: AwsOrganizationClient::sync_account

use super::ensure_id;
use crate::discovery::{DiscoveryCoordinator, OrganizationDiscovery};
use crate::error::{ApiResult, OnboardingError, OnboardingResult};
use crate::http::ApiClient;
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use onboarding_model::{
    AddedResource, DesiredServiceSpec, OnboardRequest, OnboardedResource, ResourceKind,
    ScanProbeConfig,
};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

/// Discovery scan endpoint.
const SCAN_PATH: &str = "/api/v1/discovery/aws/organizations/scan";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AddAccountBody<'a> {
    account_id: &'a str,
    services: &'a [DesiredServiceSpec],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TriggerScanBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    organization_id: Option<&'a str>,
}

/// Client for accounts managed through an AWS organization.
#[derive(Debug, Clone)]
pub struct AwsOrganizationClient {
    api: ApiClient,
    retry: RetryPolicy,
    probe: ScanProbeConfig,
    cancel: CancellationToken,
}

impl AwsOrganizationClient {
    /// Create a client.
    ///
    /// `probe` is the default scan polling used by [`sync_account`](Self::sync_account).
    pub fn new(api: ApiClient, retry: RetryPolicy, probe: ScanProbeConfig) -> Self {
        Self {
            api,
            retry,
            probe,
            cancel: CancellationToken::new(),
        }
    }

    /// Abort polling and retries when `cancel` fires.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    fn organization_path(org_id: &str) -> String {
        format!("{}/{}", ResourceKind::AwsOrganization.collection_path(), org_id)
    }

    fn account_path(account_id: &str) -> String {
        format!("{}/{}", ResourceKind::AwsAccount.collection_path(), account_id)
    }

    /// Add an account to an organization, without discovery fallback.
    #[instrument(skip(self, services))]
    pub async fn add_account(
        &self,
        org_id: &str,
        account_id: &str,
        services: &[DesiredServiceSpec],
    ) -> OnboardingResult<AddedResource> {
        validate_account(org_id, account_id, services)?;

        self.add_account_to_organization(org_id, account_id, services)
            .await
            .map_err(|source| OnboardingError::AddAccount {
                org_id: org_id.to_string(),
                account_id: account_id.to_string(),
                source,
            })
    }

    /// Get the organization record.
    #[instrument(skip(self))]
    pub async fn get_organization(&self, org_id: &str) -> OnboardingResult<OnboardedResource> {
        ensure_id(org_id)?;
        self.api
            .get(&Self::organization_path(org_id))
            .await
            .map_err(|source| OnboardingError::GetOrganization {
                org_id: org_id.to_string(),
                source,
            })
    }

    /// Start a discovery scan for the organization.
    ///
    /// The scan is requested with the organization's native id. A scan that is
    /// already running counts as success.
    #[instrument(skip(self))]
    pub async fn trigger_scan(&self, org_id: &str) -> OnboardingResult<()> {
        ensure_id(org_id)?;
        DiscoveryCoordinator::new(self, self.probe, self.retry.clone())
            .with_cancellation(self.cancel.clone())
            .trigger_discovery(org_id)
            .await
    }

    /// Get a member account by its onboarding id.
    #[instrument(skip(self))]
    pub async fn get_account(&self, id: &str) -> OnboardingResult<OnboardedResource> {
        ensure_id(id)?;
        self.get_account_details(id)
            .await
            .map_err(|source| OnboardingError::Fetch {
                kind: ResourceKind::AwsAccount,
                id: id.to_string(),
                source,
            })
    }

    /// Add an account to an organization, running a discovery scan first if
    /// the platform does not know the account yet.
    ///
    /// `probe` overrides the client's scan polling for this call.
    #[instrument(skip(self, services, probe))]
    pub async fn sync_account(
        &self,
        org_id: &str,
        account_id: &str,
        services: &[DesiredServiceSpec],
        probe: Option<ScanProbeConfig>,
    ) -> OnboardingResult<OnboardedResource> {
        validate_account(org_id, account_id, services)?;

        let probe = probe.unwrap_or(self.probe);
        info!(
            max_polls = probe.max_retries,
            interval_secs = probe.interval_seconds,
            "Syncing account into organization"
        );

        DiscoveryCoordinator::new(self, probe, self.retry.clone())
            .with_cancellation(self.cancel.clone())
            .sync_account(org_id, account_id, services)
            .await
    }
}

#[async_trait]
impl OrganizationDiscovery for AwsOrganizationClient {
    async fn add_account_to_organization(
        &self,
        org_id: &str,
        account_id: &str,
        services: &[DesiredServiceSpec],
    ) -> ApiResult<AddedResource> {
        let path = format!("{}/accounts", Self::organization_path(org_id));
        self.api
            .post(
                &path,
                &AddAccountBody {
                    account_id,
                    services,
                },
            )
            .await
    }

    async fn get_organization(&self, org_id: &str) -> ApiResult<OnboardedResource> {
        self.api.get(&Self::organization_path(org_id)).await
    }

    async fn trigger_scan(&self, external_org_id: Option<&str>) -> ApiResult<()> {
        self.api
            .post_empty(
                SCAN_PATH,
                &TriggerScanBody {
                    organization_id: external_org_id,
                },
            )
            .await
    }

    async fn get_account_details(&self, id: &str) -> ApiResult<OnboardedResource> {
        self.api.get(&Self::account_path(id)).await
    }
}

fn validate_account(
    org_id: &str,
    account_id: &str,
    services: &[DesiredServiceSpec],
) -> OnboardingResult<()> {
    ensure_id(org_id)?;
    let request = OnboardRequest {
        services: services.to_vec(),
        ..OnboardRequest::new(account_id)
    };
    request.validate(ResourceKind::AwsAccount)?;
    Ok(())
}
