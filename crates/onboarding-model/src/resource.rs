//! Onboarded resource models
//!
//! This module provides the five resource kinds the platform can onboard and
//! the record the platform returns for each of them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Cloud provider that owns a resource kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CloudProvider {
    /// Amazon Web Services
    Aws,
    /// Microsoft Azure
    Azure,
}

/// A kind of resource that can be onboarded.
///
/// Every kind shares the same service attach/detach surface; they differ only
/// in endpoint path and in what identifies them natively.
///
/// # Examples
///
/// ```
/// use onboarding_model::{CloudProvider, ResourceKind};
///
/// let kind = ResourceKind::ManagementGroup;
/// assert_eq!(kind.provider(), CloudProvider::Azure);
/// assert!(kind.requires_tenant());
/// assert_eq!(kind.to_string(), "management group");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// A single AWS account
    AwsAccount,
    /// An AWS organization (management account plus members)
    AwsOrganization,
    /// An Azure Entra ID tenant
    EntraTenant,
    /// An Azure management group
    ManagementGroup,
    /// An Azure subscription
    Subscription,
}

impl ResourceKind {
    /// All resource kinds, in display order.
    pub const ALL: [ResourceKind; 5] = [
        ResourceKind::AwsAccount,
        ResourceKind::AwsOrganization,
        ResourceKind::EntraTenant,
        ResourceKind::ManagementGroup,
        ResourceKind::Subscription,
    ];

    /// Human-readable name used in error messages and logs.
    pub fn display_name(&self) -> &'static str {
        match self {
            ResourceKind::AwsAccount => "AWS account",
            ResourceKind::AwsOrganization => "AWS organization",
            ResourceKind::EntraTenant => "Entra tenant",
            ResourceKind::ManagementGroup => "management group",
            ResourceKind::Subscription => "subscription",
        }
    }

    /// Collection path of this kind on the onboarding API.
    pub fn collection_path(&self) -> &'static str {
        match self {
            ResourceKind::AwsAccount => "/api/v1/onboarding/aws/accounts",
            ResourceKind::AwsOrganization => "/api/v1/onboarding/aws/organizations",
            ResourceKind::EntraTenant => "/api/v1/onboarding/azure/tenants",
            ResourceKind::ManagementGroup => "/api/v1/onboarding/azure/management-groups",
            ResourceKind::Subscription => "/api/v1/onboarding/azure/subscriptions",
        }
    }

    /// The cloud provider owning this kind.
    pub fn provider(&self) -> CloudProvider {
        match self {
            ResourceKind::AwsAccount | ResourceKind::AwsOrganization => CloudProvider::Aws,
            ResourceKind::EntraTenant
            | ResourceKind::ManagementGroup
            | ResourceKind::Subscription => CloudProvider::Azure,
        }
    }

    /// Whether onboarding needs the parent Entra tenant id.
    pub fn requires_tenant(&self) -> bool {
        matches!(
            self,
            ResourceKind::ManagementGroup | ResourceKind::Subscription
        )
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// A resource as reported by the onboarding platform.
///
/// Created by an onboarding call and mutated only through the add/remove
/// services endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnboardedResource {
    /// Platform onboarding ID
    pub id: String,

    /// Onboarding type (e.g. "aws_account", "azure_subscription")
    #[serde(default)]
    pub onboarding_type: String,

    /// Home region of the onboarded resource
    #[serde(default)]
    pub region: String,

    /// Display name
    #[serde(default)]
    pub display_name: String,

    /// Onboarding status as reported by the platform
    #[serde(default)]
    pub status: String,

    /// Names of the services currently attached
    #[serde(default)]
    pub services: Vec<String>,

    /// Native cloud identifier (e.g. `o-abc123` for an AWS organization).
    ///
    /// Never interchangeable with `id`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,

    /// Completion time of the last successful discovery scan (RFC 3339)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_successful_scan_timestamp: Option<String>,
}

impl OnboardedResource {
    /// Whether a service with this name is attached.
    pub fn has_service(&self, name: &str) -> bool {
        self.services.iter().any(|s| s == name)
    }
}

/// Identifier returned by create-style calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddedResource {
    /// Platform onboarding ID of the new resource
    pub id: String,
}
