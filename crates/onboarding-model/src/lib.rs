//! # Onboarding Model
//!
//! Domain models shared by the onboarding client crates.
//!
//! ## Overview
//!
//! The onboarding-model crate handles:
//! - **Resource kinds**: AWS accounts and organizations, Azure Entra tenants,
//!   management groups and subscriptions
//! - **Records**: The onboarded resource as reported by the platform
//! - **Services**: Desired service specs and extraction of the current set
//! - **Planning**: The add/remove diff between current and desired services
//! - **Scan probing**: Poll settings for organization discovery scans
//!
//! ## Architecture
//!
//! ```text
//! ResourceKind ──→ OnboardRequest (validated before it is sent)
//!      │
//!      └─→ OnboardedResource
//!             └─ services ──┐
//!                           ├─→ ReconciliationPlan { to_add, to_remove }
//! DesiredServiceSpec[] ─────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use onboarding_model::{DesiredServiceSpec, ReconciliationPlan};
//!
//! let current = vec!["cspm".to_string(), "cwpp".to_string()];
//! let desired = vec![
//!     DesiredServiceSpec::new("cwpp"),
//!     DesiredServiceSpec::new("dspm"),
//! ];
//!
//! let plan = ReconciliationPlan::compute(current, &desired);
//! assert_eq!(plan.to_remove, vec!["cspm".to_string()]);
//! assert_eq!(plan.to_add[0].service_name, "dspm");
//! ```

pub mod error;
pub mod plan;
pub mod request;
pub mod resource;
pub mod scan;
pub mod service;

// Re-export main types for convenience
pub use error::ValidationError;
pub use plan::ReconciliationPlan;
pub use request::{validate_services, OnboardRequest};
pub use resource::{AddedResource, CloudProvider, OnboardedResource, ResourceKind};
pub use scan::{parse_scan_timestamp, ScanProbeConfig};
pub use service::{current_service_names, DesiredServiceSpec, RawResource};
