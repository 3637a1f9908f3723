//! Validation errors for caller-supplied input
//!
//! These are raised before any request leaves the process and are never
//! retried.

use crate::resource::ResourceKind;
use thiserror::Error;

/// Caller input rejected before it reached the platform.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field was empty
    #[error("{0} must not be empty")]
    EmptyField(&'static str),

    /// The native cloud identifier has the wrong shape for its kind
    #[error("invalid {kind} id '{id}': {reason}")]
    InvalidExternalId {
        /// Resource kind being onboarded
        kind: ResourceKind,
        /// The offending identifier
        id: String,
        /// What was wrong with it
        reason: &'static str,
    },

    /// Azure child resources need their parent tenant
    #[error("{0} onboarding requires a tenant id")]
    MissingTenant(ResourceKind),

    /// A desired service spec had an empty name
    #[error("service name must not be empty")]
    EmptyServiceName,
}
