//! Resource clients.
//!
//! One [`ResourceClient`] serves every onboardable kind; the kind picks the
//! collection path and the wording of errors. AWS organizations get an extra
//! [`AwsOrganizationClient`] for member-account discovery.

pub mod aws_organization;

pub use aws_organization::AwsOrganizationClient;

use crate::error::{ApiError, ApiResult, MutationAction, OnboardingError, OnboardingResult};
use crate::http::ApiClient;
use crate::pagination::{paginate, Page, PageStream};
use crate::reconcile::{fetch_confirmed, Reconciler, ServiceAttachment};
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use onboarding_model::{
    validate_services, AddedResource, DesiredServiceSpec, OnboardRequest, OnboardedResource,
    RawResource, ResourceKind, ValidationError,
};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

/// Body of the add-services call.
#[derive(Debug, Serialize)]
struct AddServicesBody<'a> {
    services: &'a [DesiredServiceSpec],
}

/// Body of the remove-services call.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RemoveServicesBody<'a> {
    service_names: &'a [String],
}

/// Client for one kind of onboarded resource.
#[derive(Debug, Clone)]
pub struct ResourceClient {
    api: ApiClient,
    kind: ResourceKind,
    retry: RetryPolicy,
    cancel: CancellationToken,
}

impl ResourceClient {
    /// Create a client for `kind`.
    ///
    /// `retry` governs read-backs after mutations.
    pub fn new(api: ApiClient, kind: ResourceKind, retry: RetryPolicy) -> Self {
        Self {
            api,
            kind,
            retry,
            cancel: CancellationToken::new(),
        }
    }

    /// Abort retries and workflows when `cancel` fires.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Kind served by this client.
    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    fn item_path(&self, id: &str) -> String {
        format!("{}/{}", self.kind.collection_path(), id)
    }

    fn services_path(&self, id: &str) -> String {
        format!("{}/{}/services", self.kind.collection_path(), id)
    }

    /// Onboard a new resource and return it as stored by the platform.
    ///
    /// The request is validated first; nothing is sent when it is rejected.
    #[instrument(skip(self, request), fields(kind = %self.kind, external_id = %request.external_id))]
    pub async fn onboard(&self, request: &OnboardRequest) -> OnboardingResult<OnboardedResource> {
        request.validate(self.kind)?;

        let added: AddedResource = self
            .api
            .post(self.kind.collection_path(), request)
            .await
            .map_err(|source| OnboardingError::Create {
                kind: self.kind,
                source,
            })?;
        info!(resource_id = %added.id, "Resource onboarded");

        let path = self.item_path(&added.id);
        fetch_confirmed(
            self.kind,
            &added.id,
            MutationAction::Created,
            &self.retry,
            &self.cancel,
            || self.api.get::<OnboardedResource>(&path),
        )
        .await
    }

    /// Get a resource.
    #[instrument(skip(self), fields(kind = %self.kind))]
    pub async fn get(&self, id: &str) -> OnboardingResult<OnboardedResource> {
        ensure_id(id)?;
        self.api
            .get(&self.item_path(id))
            .await
            .map_err(|source| self.fetch_error(id, source))
    }

    /// Get a resource as a raw attribute map.
    #[instrument(skip(self), fields(kind = %self.kind))]
    pub async fn get_raw(&self, id: &str) -> OnboardingResult<RawResource> {
        ensure_id(id)?;
        self.api
            .get(&self.item_path(id))
            .await
            .map_err(|source| self.fetch_error(id, source))
    }

    /// Offboard a resource.
    #[instrument(skip(self), fields(kind = %self.kind))]
    pub async fn delete(&self, id: &str) -> OnboardingResult<()> {
        ensure_id(id)?;
        self.api
            .delete(&self.item_path(id))
            .await
            .map_err(|source| OnboardingError::Delete {
                kind: self.kind,
                id: id.to_string(),
                source,
            })?;
        info!("Resource offboarded");
        Ok(())
    }

    /// Stream every resource of this kind, page by page.
    ///
    /// Must be called from within a Tokio runtime: the page producer runs as
    /// a spawned task.
    pub fn list(&self) -> PageStream<OnboardedResource> {
        let api = self.api.clone();
        let path = self.kind.collection_path();

        paginate(move |token: Option<String>| {
            let api = api.clone();
            async move {
                let query: Vec<(&str, String)> = token
                    .map(|token| vec![("pageToken", token)])
                    .unwrap_or_default();
                api.get_query::<Page<OnboardedResource>, _>(path, &query)
                    .await
            }
        })
    }

    /// Collect every resource of this kind.
    #[instrument(skip(self), fields(kind = %self.kind))]
    pub async fn list_all(&self) -> OnboardingResult<Vec<OnboardedResource>> {
        self.list()
            .collect_all()
            .await
            .map_err(|source| OnboardingError::List {
                kind: self.kind,
                source,
            })
    }

    /// Converge the resource's attached services onto `desired`.
    ///
    /// Missing services are added in one call, surplus ones removed in a
    /// second call, and the updated resource is read back.
    #[instrument(skip(self, desired), fields(kind = %self.kind, desired = desired.len()))]
    pub async fn update_services(
        &self,
        id: &str,
        desired: &[DesiredServiceSpec],
    ) -> OnboardingResult<OnboardedResource> {
        ensure_id(id)?;
        validate_services(desired)?;

        Reconciler::new(self, self.retry.clone())
            .with_cancellation(self.cancel.clone())
            .reconcile(id, desired)
            .await
    }

    fn fetch_error(&self, id: &str, source: ApiError) -> OnboardingError {
        OnboardingError::Fetch {
            kind: self.kind,
            id: id.to_string(),
            source,
        }
    }
}

#[async_trait]
impl ServiceAttachment for ResourceClient {
    fn kind(&self) -> ResourceKind {
        self.kind
    }

    async fn get_resource(&self, id: &str) -> ApiResult<RawResource> {
        self.api.get(&self.item_path(id)).await
    }

    async fn add_services(&self, id: &str, services: &[DesiredServiceSpec]) -> ApiResult<()> {
        self.api
            .post_empty(&self.services_path(id), &AddServicesBody { services })
            .await
    }

    async fn remove_services(&self, id: &str, service_names: &[String]) -> ApiResult<()> {
        self.api
            .delete_with_body(&self.services_path(id), &RemoveServicesBody { service_names })
            .await
    }

    async fn get_details(&self, id: &str) -> ApiResult<OnboardedResource> {
        self.api.get(&self.item_path(id)).await
    }
}

pub(crate) fn ensure_id(id: &str) -> Result<(), ValidationError> {
    if id.trim().is_empty() {
        return Err(ValidationError::EmptyField("id"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ApiEndpoint;
    use onboarding_auth::ApiToken;
    use std::time::Duration;

    fn client(kind: ResourceKind) -> ResourceClient {
        let api = ApiClient::new(
            ApiEndpoint::new("http://127.0.0.1:9"),
            ApiToken::parse("test-token").unwrap(),
            Duration::from_secs(1),
            true,
        )
        .unwrap();
        ResourceClient::new(api, kind, RetryPolicy::no_retry())
    }

    #[test]
    fn test_paths_follow_kind() {
        let subscriptions = client(ResourceKind::Subscription);
        assert_eq!(
            subscriptions.item_path("sub-1"),
            "/api/v1/onboarding/azure/subscriptions/sub-1"
        );
        assert_eq!(
            subscriptions.services_path("sub-1"),
            "/api/v1/onboarding/azure/subscriptions/sub-1/services"
        );
    }

    #[test]
    fn test_service_bodies_use_wire_names() {
        let names = vec!["cspm".to_string()];
        let body = serde_json::to_value(RemoveServicesBody {
            service_names: &names,
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({ "serviceNames": ["cspm"] }));

        let specs = vec![DesiredServiceSpec::new("dspm").with_config("depth", 2)];
        let body = serde_json::to_value(AddServicesBody { services: &specs }).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "services": [{ "serviceName": "dspm", "resourceConfig": { "depth": 2 } }]
            })
        );
    }

    #[tokio::test]
    async fn test_empty_id_rejected_before_sending() {
        let accounts = client(ResourceKind::AwsAccount);

        let err = accounts.get("  ").await.unwrap_err();
        assert!(matches!(
            err,
            OnboardingError::Validation(ValidationError::EmptyField("id"))
        ));

        let err = accounts
            .update_services("", &[DesiredServiceSpec::new("cspm")])
            .await
            .unwrap_err();
        assert!(matches!(err, OnboardingError::Validation(_)));
    }

    #[tokio::test]
    async fn test_blank_service_name_rejected() {
        let err = client(ResourceKind::EntraTenant)
            .update_services("tenant-1", &[DesiredServiceSpec::new("")])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            OnboardingError::Validation(ValidationError::EmptyServiceName)
        ));
    }

    #[test]
    #[should_panic]
    fn test_list_outside_runtime_panics() {
        let _ = client(ResourceKind::Subscription).list();
    }
}
