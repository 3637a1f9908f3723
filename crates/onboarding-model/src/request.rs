//! Onboarding request payloads

use crate::error::ValidationError;
use crate::resource::ResourceKind;
use crate::service::DesiredServiceSpec;
use serde::{Deserialize, Serialize};

/// Request body for onboarding a new resource of any kind.
///
/// # Examples
///
/// ```
/// use onboarding_model::{DesiredServiceSpec, OnboardRequest, ResourceKind};
///
/// let request = OnboardRequest::new("123456789012")
///     .with_region("eu-west-1")
///     .with_service(DesiredServiceSpec::new("cspm"));
/// assert!(request.validate(ResourceKind::AwsAccount).is_ok());
/// assert!(request.validate(ResourceKind::Subscription).is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnboardRequest {
    /// Native cloud identifier (AWS account id, `o-` org id, Azure GUID)
    pub external_id: String,

    /// Display name shown on the platform
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    /// Home region
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    /// Parent Entra tenant, required for management groups and subscriptions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,

    /// Services to attach at onboarding time
    #[serde(default)]
    pub services: Vec<DesiredServiceSpec>,
}

impl OnboardRequest {
    /// Create a request for the given native identifier.
    pub fn new(external_id: impl Into<String>) -> Self {
        Self {
            external_id: external_id.into(),
            display_name: None,
            region: None,
            tenant_id: None,
            services: Vec::new(),
        }
    }

    /// Set the display name.
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Set the region.
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Set the parent tenant.
    pub fn with_tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    /// Attach a service.
    pub fn with_service(mut self, service: DesiredServiceSpec) -> Self {
        self.services.push(service);
        self
    }

    /// Check the request for the given kind before it is sent.
    pub fn validate(&self, kind: ResourceKind) -> Result<(), ValidationError> {
        let id = self.external_id.trim();
        if id.is_empty() {
            return Err(ValidationError::EmptyField("external id"));
        }

        match kind {
            ResourceKind::AwsAccount => {
                if id.len() != 12 || !id.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(ValidationError::InvalidExternalId {
                        kind,
                        id: id.to_string(),
                        reason: "AWS account ids are 12 digits",
                    });
                }
            }
            ResourceKind::AwsOrganization => {
                if !id.starts_with("o-") || id.len() <= 2 {
                    return Err(ValidationError::InvalidExternalId {
                        kind,
                        id: id.to_string(),
                        reason: "AWS organization ids start with 'o-'",
                    });
                }
            }
            ResourceKind::EntraTenant
            | ResourceKind::ManagementGroup
            | ResourceKind::Subscription => {}
        }

        if kind.requires_tenant()
            && self
                .tenant_id
                .as_deref()
                .map_or(true, |t| t.trim().is_empty())
        {
            return Err(ValidationError::MissingTenant(kind));
        }

        validate_services(&self.services)
    }
}

/// Reject specs with blank service names.
pub fn validate_services(services: &[DesiredServiceSpec]) -> Result<(), ValidationError> {
    if services.iter().any(|s| s.service_name.trim().is_empty()) {
        return Err(ValidationError::EmptyServiceName);
    }
    Ok(())
}
