//! Service-set reconciliation.
//!
//! Converges the services attached to one onboarded resource onto a desired
//! set. The same workflow backs the update operation of every resource kind:
//!
//! 1. Read the current raw state. A failure here aborts before any change.
//! 2. Extract the attached service names and diff them against the desired
//!    specs.
//! 3. Attach missing services in one batch. A failure skips step 4.
//! 4. Detach surplus services in one batch. Business-rule rejections are
//!    surfaced as-is and never retried.
//! 5. Read the resource back with retries. A failure here means the changes
//!    most likely applied and is reported separately.
//!
//! Steps 3 and 4 are not transactional. There is no concurrency check between
//! step 1 and the mutations; two callers reconciling the same resource race.

use crate::error::{ApiResult, MutationAction, OnboardingError, OnboardingResult};
use crate::retry::{with_retry, RetryError, RetryPolicy};
use async_trait::async_trait;
use onboarding_model::{
    current_service_names, DesiredServiceSpec, OnboardedResource, RawResource,
    ReconciliationPlan, ResourceKind,
};
use std::future::Future;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

/// The API surface reconciliation needs from a resource kind.
#[async_trait]
pub trait ServiceAttachment: Send + Sync {
    /// Kind of resource this surface manages.
    fn kind(&self) -> ResourceKind;

    /// Raw attribute map of the resource.
    async fn get_resource(&self, id: &str) -> ApiResult<RawResource>;

    /// Attach services in one call.
    async fn add_services(&self, id: &str, services: &[DesiredServiceSpec]) -> ApiResult<()>;

    /// Detach services in one call.
    async fn remove_services(&self, id: &str, service_names: &[String]) -> ApiResult<()>;

    /// Typed details of the resource.
    async fn get_details(&self, id: &str) -> ApiResult<OnboardedResource>;
}

/// Runs the reconciliation workflow against one [`ServiceAttachment`].
pub struct Reconciler<'a, S: ?Sized> {
    target: &'a S,
    retry: RetryPolicy,
    cancel: CancellationToken,
}

impl<'a, S> Reconciler<'a, S>
where
    S: ServiceAttachment + ?Sized,
{
    /// Create a reconciler using `retry` for the final read-back.
    pub fn new(target: &'a S, retry: RetryPolicy) -> Self {
        Self {
            target,
            retry,
            cancel: CancellationToken::new(),
        }
    }

    /// Abort read-back retries when `cancel` fires.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Converge the resource's services onto `desired` and return the result.
    #[instrument(skip(self, desired), fields(kind = %self.target.kind(), resource_id = %id))]
    pub async fn reconcile(
        &self,
        id: &str,
        desired: &[DesiredServiceSpec],
    ) -> OnboardingResult<OnboardedResource> {
        let kind = self.target.kind();

        let raw = self
            .target
            .get_resource(id)
            .await
            .map_err(|source| OnboardingError::FetchCurrent {
                kind,
                id: id.to_string(),
                source,
            })?;

        let current = current_service_names(&raw);
        let plan = ReconciliationPlan::compute(current, desired);
        debug!(
            to_add = ?plan.added_names(),
            to_remove = ?plan.to_remove,
            "Computed service plan"
        );

        if plan.is_empty() {
            info!("Services already converged, no changes needed");
        }

        if !plan.to_add.is_empty() {
            self.target
                .add_services(id, &plan.to_add)
                .await
                .map_err(|source| OnboardingError::AddServices {
                    kind,
                    id: id.to_string(),
                    source,
                })?;
            info!(count = plan.to_add.len(), "Added services");
        }

        if !plan.to_remove.is_empty() {
            self.target
                .remove_services(id, &plan.to_remove)
                .await
                .map_err(|source| OnboardingError::RemoveServices {
                    kind,
                    id: id.to_string(),
                    source,
                })?;
            info!(count = plan.to_remove.len(), "Removed services");
        }

        fetch_confirmed(
            kind,
            id,
            MutationAction::Updated,
            &self.retry,
            &self.cancel,
            || self.target.get_details(id),
        )
        .await
    }
}

/// Read a resource back after a mutation, retrying transient failures.
///
/// Failures are reported as [`OnboardingError::Confirmation`] so callers know
/// not to repeat the mutation.
pub(crate) async fn fetch_confirmed<F, Fut>(
    kind: ResourceKind,
    id: &str,
    action: MutationAction,
    retry: &RetryPolicy,
    cancel: &CancellationToken,
    fetch: F,
) -> OnboardingResult<OnboardedResource>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ApiResult<OnboardedResource>>,
{
    with_retry(retry, cancel, fetch)
        .await
        .map_err(|source| match source {
            RetryError::Canceled { .. } => OnboardingError::Canceled {
                operation: "confirmation fetch",
                id: id.to_string(),
            },
            source => OnboardingError::Confirmation {
                kind,
                id: id.to_string(),
                action,
                source,
            },
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;
    use std::collections::{HashSet, VecDeque};
    use std::sync::Mutex;
    use std::time::Duration;

    /// In-memory resource that records every call.
    struct FakeResource {
        raw: Mutex<Option<ApiResult<RawResource>>>,
        services: Mutex<Vec<String>>,
        add_error: Option<ApiError>,
        remove_error: Option<ApiError>,
        details_errors: Mutex<VecDeque<ApiError>>,
        calls: Mutex<Vec<String>>,
        add_batches: Mutex<Vec<Vec<String>>>,
        remove_batches: Mutex<Vec<Vec<String>>>,
    }

    impl FakeResource {
        fn with_services(names: &[&str]) -> Self {
            let services: Vec<String> = names.iter().map(|s| s.to_string()).collect();
            let raw = serde_json::json!({ "id": "res-1", "services": services.clone() });
            Self {
                raw: Mutex::new(Some(Ok(raw.as_object().cloned().unwrap()))),
                services: Mutex::new(services),
                add_error: None,
                remove_error: None,
                details_errors: Mutex::new(VecDeque::new()),
                calls: Mutex::new(Vec::new()),
                add_batches: Mutex::new(Vec::new()),
                remove_batches: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn count(&self, call: &str) -> usize {
            self.calls().iter().filter(|c| *c == call).count()
        }
    }

    #[async_trait]
    impl ServiceAttachment for FakeResource {
        fn kind(&self) -> ResourceKind {
            ResourceKind::Subscription
        }

        async fn get_resource(&self, _id: &str) -> ApiResult<RawResource> {
            self.calls.lock().unwrap().push("get_resource".into());
            self.raw.lock().unwrap().clone().unwrap()
        }

        async fn add_services(&self, _id: &str, services: &[DesiredServiceSpec]) -> ApiResult<()> {
            self.calls.lock().unwrap().push("add_services".into());
            let names: Vec<String> = services.iter().map(|s| s.service_name.clone()).collect();
            self.add_batches.lock().unwrap().push(names.clone());
            if let Some(err) = &self.add_error {
                return Err(err.clone());
            }
            self.services.lock().unwrap().extend(names);
            Ok(())
        }

        async fn remove_services(&self, _id: &str, service_names: &[String]) -> ApiResult<()> {
            self.calls.lock().unwrap().push("remove_services".into());
            self.remove_batches.lock().unwrap().push(service_names.to_vec());
            if let Some(err) = &self.remove_error {
                return Err(err.clone());
            }
            self.services
                .lock()
                .unwrap()
                .retain(|s| !service_names.contains(s));
            Ok(())
        }

        async fn get_details(&self, id: &str) -> ApiResult<OnboardedResource> {
            self.calls.lock().unwrap().push("get_details".into());
            if let Some(err) = self.details_errors.lock().unwrap().pop_front() {
                return Err(err);
            }
            Ok(OnboardedResource {
                id: id.to_string(),
                onboarding_type: "azure_subscription".into(),
                region: "westeurope".into(),
                display_name: "Sub".into(),
                status: "active".into(),
                services: self.services.lock().unwrap().clone(),
                external_id: None,
                last_successful_scan_timestamp: None,
            })
        }
    }

    fn specs(names: &[&str]) -> Vec<DesiredServiceSpec> {
        names.iter().map(|n| DesiredServiceSpec::new(*n)).collect()
    }

    fn names(batch: &[String]) -> HashSet<&str> {
        batch.iter().map(String::as_str).collect()
    }

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(100),
            backoff_multiplier: 2.0,
        }
    }

    #[tokio::test]
    async fn test_swap_issues_one_add_and_one_remove() {
        let fake = FakeResource::with_services(&["A", "B"]);

        let resource = Reconciler::new(&fake, policy())
            .reconcile("res-1", &specs(&["B", "C"]))
            .await
            .unwrap();

        assert_eq!(
            fake.calls(),
            vec!["get_resource", "add_services", "remove_services", "get_details"]
        );
        assert_eq!(names(&fake.add_batches.lock().unwrap()[0]), HashSet::from(["C"]));
        assert_eq!(names(&fake.remove_batches.lock().unwrap()[0]), HashSet::from(["A"]));
        let final_services: HashSet<_> = resource.services.iter().map(String::as_str).collect();
        assert_eq!(final_services, HashSet::from(["B", "C"]));
    }

    #[tokio::test]
    async fn test_converged_resource_gets_no_mutations() {
        let fake = FakeResource::with_services(&["A", "B"]);

        Reconciler::new(&fake, policy())
            .reconcile("res-1", &specs(&["B", "A"]))
            .await
            .unwrap();

        assert_eq!(fake.count("add_services"), 0);
        assert_eq!(fake.count("remove_services"), 0);
        assert_eq!(fake.count("get_details"), 1);
    }

    #[tokio::test]
    async fn test_empty_current_only_adds() {
        let fake = FakeResource::with_services(&[]);

        Reconciler::new(&fake, policy())
            .reconcile("res-1", &specs(&["A", "B"]))
            .await
            .unwrap();

        assert_eq!(fake.count("remove_services"), 0);
        assert_eq!(
            names(&fake.add_batches.lock().unwrap()[0]),
            HashSet::from(["A", "B"])
        );
    }

    #[tokio::test]
    async fn test_missing_services_attribute_treated_as_empty() {
        let fake = FakeResource::with_services(&[]);
        *fake.raw.lock().unwrap() = Some(Ok(serde_json::json!({ "id": "res-1" })
            .as_object()
            .cloned()
            .unwrap()));

        Reconciler::new(&fake, policy())
            .reconcile("res-1", &specs(&["A"]))
            .await
            .unwrap();

        assert_eq!(fake.count("add_services"), 1);
        assert_eq!(fake.count("remove_services"), 0);
    }

    #[tokio::test]
    async fn test_business_rule_rejection_surfaced_unmodified() {
        let rejection = ApiError::status(400, "resource must keep at least one service")
            .with_code("MIN_SERVICES");
        let mut fake = FakeResource::with_services(&["A", "B", "C"]);
        fake.remove_error = Some(rejection.clone());

        let err = Reconciler::new(&fake, policy())
            .reconcile("res-1", &[])
            .await
            .unwrap_err();

        assert!(matches!(err, OnboardingError::RemoveServices { .. }));
        assert_eq!(err.api_error(), Some(&rejection));
        assert!(err.to_string().contains("failed to remove services"));
        assert_eq!(fake.count("remove_services"), 1);
        assert_eq!(fake.count("get_details"), 0);
        assert_eq!(
            names(&fake.remove_batches.lock().unwrap()[0]),
            HashSet::from(["A", "B", "C"])
        );
    }

    #[tokio::test]
    async fn test_fetch_failure_aborts_before_mutation() {
        let fake = FakeResource::with_services(&["A"]);
        *fake.raw.lock().unwrap() = Some(Err(ApiError::status(404, "no such subscription")));

        let err = Reconciler::new(&fake, policy())
            .reconcile("res-1", &specs(&["B"]))
            .await
            .unwrap_err();

        assert!(err
            .to_string()
            .starts_with("failed to get current subscription details for res-1"));
        assert_eq!(fake.calls(), vec!["get_resource"]);
    }

    #[tokio::test]
    async fn test_add_failure_skips_remove() {
        let mut fake = FakeResource::with_services(&["A"]);
        fake.add_error = Some(ApiError::status(503, "unavailable"));

        let err = Reconciler::new(&fake, policy())
            .reconcile("res-1", &specs(&["B"]))
            .await
            .unwrap_err();

        assert!(matches!(err, OnboardingError::AddServices { .. }));
        assert_eq!(fake.count("add_services"), 1);
        assert_eq!(fake.count("remove_services"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_confirmation_retries_transient_failures() {
        let fake = FakeResource::with_services(&["A"]);
        fake.details_errors
            .lock()
            .unwrap()
            .extend([ApiError::status(502, "bad gateway"), ApiError::status(429, "slow")]);

        let resource = Reconciler::new(&fake, policy())
            .reconcile("res-1", &specs(&["A"]))
            .await
            .unwrap();

        assert_eq!(resource.id, "res-1");
        assert_eq!(fake.count("get_details"), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_confirmation_failure_is_distinct() {
        let fake = FakeResource::with_services(&["A"]);
        fake.details_errors.lock().unwrap().extend([
            ApiError::status(500, "boom"),
            ApiError::status(500, "boom"),
            ApiError::status(500, "boom"),
        ]);

        let err = Reconciler::new(&fake, policy())
            .reconcile("res-1", &specs(&["A", "B"]))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            OnboardingError::Confirmation {
                action: MutationAction::Updated,
                source: RetryError::Exhausted { attempts: 3, .. },
                ..
            }
        ));
        assert!(err
            .to_string()
            .contains("subscription updated with ID res-1, but failed to fetch details"));
        assert!(err.mutation_may_have_applied());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_confirmation_is_reported_as_canceled() {
        let fake = FakeResource::with_services(&["A"]);
        fake.details_errors.lock().unwrap().extend([
            ApiError::status(500, "boom"),
            ApiError::status(500, "boom"),
            ApiError::status(500, "boom"),
        ]);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = Reconciler::new(&fake, policy())
            .with_cancellation(cancel)
            .reconcile("res-1", &specs(&["A", "B"]))
            .await
            .unwrap_err();

        match err {
            OnboardingError::Canceled { operation, id } => {
                assert_eq!(operation, "confirmation fetch");
                assert_eq!(id, "res-1");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(fake.count("get_details"), 1);
    }
}
