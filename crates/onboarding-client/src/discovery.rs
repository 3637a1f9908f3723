//! Add-with-discovery for accounts under a monitored organization.
//!
//! Adding an account the platform has not discovered yet fails. When that
//! happens the coordinator makes sure a discovery scan runs, waits for the
//! organization to report a scan that finished after the failed add, and
//! tries the add once more. At most one discovery cycle runs per call.
//!
//! Completion is detected by comparing a locally captured start time against
//! the scan timestamp the platform reports, with no allowance for clock skew
//! between the two.

use crate::error::{ApiError, ApiResult, MutationAction, OnboardingError, OnboardingResult};
use crate::reconcile::fetch_confirmed;
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use onboarding_model::{
    parse_scan_timestamp, AddedResource, DesiredServiceSpec, OnboardedResource, ResourceKind,
    ScanProbeConfig,
};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Application error code reported while a discovery scan is running.
pub const SCAN_IN_PROGRESS_CODE: &str = "SCAN_IN_PROGRESS";

/// How a failed add-account call should be handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddFailureKind {
    /// The organization has not discovered the account yet.
    NotFound,
    /// A discovery scan is already running.
    ScanInProgress,
    /// Anything else; not recoverable by discovery.
    Other,
}

impl AddFailureKind {
    /// Classify from the structured status and application code.
    pub fn classify(err: &ApiError) -> Self {
        if err.code() == Some(SCAN_IN_PROGRESS_CODE) {
            AddFailureKind::ScanInProgress
        } else if err.is_not_found() {
            AddFailureKind::NotFound
        } else {
            AddFailureKind::Other
        }
    }
}

/// Organization-level API surface used by discovery.
#[async_trait]
pub trait OrganizationDiscovery: Send + Sync {
    /// Attach an account to the organization with the given services.
    async fn add_account_to_organization(
        &self,
        org_id: &str,
        account_id: &str,
        services: &[DesiredServiceSpec],
    ) -> ApiResult<AddedResource>;

    /// Organization record, including its native id and last scan time.
    async fn get_organization(&self, org_id: &str) -> ApiResult<OnboardedResource>;

    /// Start a discovery scan for the native organization id.
    async fn trigger_scan(&self, external_org_id: Option<&str>) -> ApiResult<()>;

    /// Details of an onboarded account.
    async fn get_account_details(&self, id: &str) -> ApiResult<OnboardedResource>;
}

/// Runs the add-with-discovery workflow.
pub struct DiscoveryCoordinator<'a, D: ?Sized> {
    backend: &'a D,
    probe: ScanProbeConfig,
    retry: RetryPolicy,
    cancel: CancellationToken,
}

impl<'a, D> DiscoveryCoordinator<'a, D>
where
    D: OrganizationDiscovery + ?Sized,
{
    /// Create a coordinator.
    ///
    /// `probe` bounds the scan polling; `retry` governs the final read-back.
    pub fn new(backend: &'a D, probe: ScanProbeConfig, retry: RetryPolicy) -> Self {
        Self {
            backend,
            probe,
            retry,
            cancel: CancellationToken::new(),
        }
    }

    /// Abort polling and read-back retries when `cancel` fires.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Add `account_id` to `org_id`, running one discovery cycle if needed.
    #[instrument(skip(self, services))]
    pub async fn sync_account(
        &self,
        org_id: &str,
        account_id: &str,
        services: &[DesiredServiceSpec],
    ) -> OnboardingResult<OnboardedResource> {
        let added = match self
            .backend
            .add_account_to_organization(org_id, account_id, services)
            .await
        {
            Ok(added) => added,
            Err(err) => {
                let failure = AddFailureKind::classify(&err);
                if failure == AddFailureKind::Other {
                    return Err(add_account_error(org_id, account_id, err));
                }

                let scan_start = Utc::now();
                info!(?failure, %scan_start, "Account not addable yet, waiting for discovery");

                match failure {
                    AddFailureKind::NotFound => self.trigger_discovery(org_id).await?,
                    _ => info!("Discovery scan already running, skipping trigger"),
                }

                self.wait_for_scan(org_id, scan_start).await?;
                if self.cancel.is_cancelled() {
                    return Err(self.polling_canceled(org_id));
                }

                self.backend
                    .add_account_to_organization(org_id, account_id, services)
                    .await
                    .map_err(|err| add_account_error(org_id, account_id, err))?
            }
        };

        info!(resource_id = %added.id, "Account added to organization");

        fetch_confirmed(
            ResourceKind::AwsAccount,
            &added.id,
            MutationAction::Added,
            &self.retry,
            &self.cancel,
            || self.backend.get_account_details(&added.id),
        )
        .await
    }

    pub(crate) async fn trigger_discovery(&self, org_id: &str) -> OnboardingResult<()> {
        let org = self
            .backend
            .get_organization(org_id)
            .await
            .map_err(|source| OnboardingError::GetOrganization {
                org_id: org_id.to_string(),
                source,
            })?;

        let external_org_id = org.external_id.as_deref().filter(|id| !id.is_empty());
        if external_org_id.is_none() {
            warn!("Organization has no external id, requesting an unscoped scan");
        }

        match self.backend.trigger_scan(external_org_id).await {
            Ok(()) => {
                info!(external_org_id = ?external_org_id, "Discovery scan triggered");
                Ok(())
            }
            Err(err) if err.is_conflict() || err.code() == Some(SCAN_IN_PROGRESS_CODE) => {
                info!(external_org_id = ?external_org_id, "Discovery scan already running");
                Ok(())
            }
            Err(source) => Err(OnboardingError::TriggerScan {
                org_id: org_id.to_string(),
                external_org_id: external_org_id.map(str::to_string),
                source,
            }),
        }
    }

    async fn wait_for_scan(&self, org_id: &str, scan_start: DateTime<Utc>) -> OnboardingResult<()> {
        let max_polls = self.probe.max_retries;

        for poll in 1..=max_polls {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    info!(polls = poll - 1, "Discovery polling canceled");
                    return Err(self.polling_canceled(org_id));
                }
                _ = sleep(self.probe.interval()) => {}
            }

            let fetched = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    info!(poll, "Discovery polling canceled during organization fetch");
                    return Err(self.polling_canceled(org_id));
                }
                fetched = self.backend.get_organization(org_id) => fetched,
            };

            let org = match fetched {
                Ok(org) => org,
                Err(err) if err.is_transient() => {
                    warn!(poll, max_polls, error = %err, "Organization poll failed, will retry");
                    continue;
                }
                Err(source) => {
                    return Err(OnboardingError::GetOrganization {
                        org_id: org_id.to_string(),
                        source,
                    });
                }
            };

            let Some(raw) = org.last_successful_scan_timestamp.as_deref() else {
                debug!(poll, max_polls, "No completed scan reported yet");
                continue;
            };

            match parse_scan_timestamp(raw) {
                Ok(finished) if finished > scan_start => {
                    info!(poll, %finished, "Discovery scan completed");
                    return Ok(());
                }
                Ok(finished) => {
                    debug!(poll, max_polls, %finished, "Last scan predates the add attempt");
                }
                Err(err) => {
                    warn!(poll, timestamp = raw, error = %err, "Unparseable scan timestamp");
                }
            }
        }

        if self.cancel.is_cancelled() {
            return Err(self.polling_canceled(org_id));
        }

        warn!(polls = max_polls, "Discovery scan did not complete in time");
        Err(OnboardingError::PollTimeout {
            org_id: org_id.to_string(),
            attempts: max_polls,
        })
    }

    fn polling_canceled(&self, org_id: &str) -> OnboardingError {
        OnboardingError::Canceled {
            operation: "discovery scan polling",
            id: org_id.to_string(),
        }
    }
}

fn add_account_error(org_id: &str, account_id: &str, source: ApiError) -> OnboardingError {
    OnboardingError::AddAccount {
        org_id: org_id.to_string(),
        account_id: account_id.to_string(),
        source,
    }
}
