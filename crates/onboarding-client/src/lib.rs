//! # Onboarding Client
//!
//! Client for onboarding cloud resources into the compliance platform and
//! keeping their attached services in sync.
//!
//! ## Overview
//!
//! The onboarding-client crate handles:
//! - **Resources**: Onboard, read, list and offboard AWS accounts and
//!   organizations, Entra tenants, management groups and subscriptions
//! - **Reconciliation**: Converge a resource's services onto a desired set
//!   with one add call and one remove call
//! - **Discovery**: Add accounts to an AWS organization, waiting for a
//!   discovery scan when the platform has not seen the account yet
//! - **Retries**: Exponential backoff for read-backs after mutations
//! - **Pagination**: Page-by-page listing with a bounded producer
//!
//! ## Reconciliation
//!
//! ```text
//! get current ──→ diff ──→ add missing ──→ remove surplus ──→ read back
//!                 (no-op)     │                 │              (retried)
//!                             └─ fail: stop     └─ fail: surfaced as-is
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use onboarding_client::{ClientConfig, OnboardingClient};
//! use onboarding_model::DesiredServiceSpec;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = OnboardingClient::from_config(&ClientConfig::from_env())?;
//!
//! let subscription = client
//!     .subscriptions()
//!     .update_services(
//!         "onb-7f3a",
//!         &[DesiredServiceSpec::new("cspm"), DesiredServiceSpec::new("dspm")],
//!     )
//!     .await?;
//! println!("{:?}", subscription.services);
//!
//! let account = client
//!     .organization_accounts()
//!     .sync_account("onb-org-1", "123456789012", &[DesiredServiceSpec::new("cspm")], None)
//!     .await?;
//! println!("added {}", account.id);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod discovery;
pub mod error;
pub mod http;
pub mod pagination;
pub mod reconcile;
pub mod resources;
pub mod retry;

// Re-export main types for convenience
pub use client::OnboardingClient;
pub use config::{ApiEndpoint, ClientConfig, ConfigError};
pub use discovery::{
    AddFailureKind, DiscoveryCoordinator, OrganizationDiscovery, SCAN_IN_PROGRESS_CODE,
};
pub use error::{ApiError, ApiResult, MutationAction, OnboardingError, OnboardingResult};
pub use http::{ApiClient, REQUEST_ID_HEADER};
pub use pagination::{paginate, Page, PageStream};
pub use reconcile::{Reconciler, ServiceAttachment};
pub use resources::{AwsOrganizationClient, ResourceClient};
pub use retry::{with_retry, with_retry_if, RetryError, RetryPolicy};
