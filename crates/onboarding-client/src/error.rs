//! Error types for the onboarding client.
//!
//! [`ApiError`] is what a single API call fails with: it carries the HTTP
//! status and the platform's application error code so callers can classify
//! failures without looking at response payloads. [`OnboardingError`] is what
//! a workflow fails with: the API error wrapped with the operation and the
//! resource it was working on.

use crate::config::ConfigError;
use crate::retry::RetryError;
use onboarding_auth::AuthError;
use onboarding_model::{ResourceKind, ValidationError};
use std::fmt;
use thiserror::Error;

/// Message fragments of network failures that are worth retrying.
const TRANSIENT_SIGNATURES: &[&str] = &[
    "timeout",
    "timed out",
    "connection reset",
    "reset by peer",
    "broken pipe",
    "unexpected eof",
    "unexpected end of file",
    "incomplete message",
    "connection closed before message completed",
    "end of file before message length reached",
    "error reading a body from connection",
];

/// A single API call failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// The request never produced a complete response.
    #[error("HTTP request failed: {message}")]
    Transport {
        /// Error chain as text.
        message: String,
        /// The exchange was cut off part way (timeout or truncated body).
        interrupted: bool,
    },

    /// Authentication failed.
    #[error("Authentication failed")]
    Unauthorized,

    /// API returned an error response.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Application error code from the response body.
        code: Option<String>,
        /// Error message from the API.
        message: String,
    },

    /// Invalid response from the API.
    #[error("Invalid API response: {0}")]
    InvalidResponse(String),
}

/// Result type for single API calls.
pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    /// Build an API error from a status and message.
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        ApiError::Api {
            status,
            code: None,
            message: message.into(),
        }
    }

    /// Build a transport error from its message alone.
    pub fn transport(message: impl Into<String>) -> Self {
        ApiError::Transport {
            message: message.into(),
            interrupted: false,
        }
    }

    /// Attach an application error code.
    pub fn with_code(self, code: impl Into<String>) -> Self {
        match self {
            ApiError::Api {
                status, message, ..
            } => ApiError::Api {
                status,
                code: Some(code.into()),
                message,
            },
            other => other,
        }
    }

    /// HTTP status, when the server answered.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ApiError::Api { status, .. } => Some(*status),
            ApiError::Unauthorized => Some(401),
            ApiError::Transport { .. } | ApiError::InvalidResponse(_) => None,
        }
    }

    /// Application error code, when the server sent one.
    pub fn code(&self) -> Option<&str> {
        match self {
            ApiError::Api { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    /// The resource does not exist (yet).
    pub fn is_not_found(&self) -> bool {
        self.status_code() == Some(404)
    }

    /// The request conflicts with current server state.
    pub fn is_conflict(&self) -> bool {
        self.status_code() == Some(409)
    }

    /// Whether retrying the same request may succeed.
    ///
    /// Server errors and rate limiting are transient, as are timeouts,
    /// truncated bodies and network failures whose message matches a known
    /// transient signature. All other client errors are not.
    pub fn is_transient(&self) -> bool {
        match self {
            ApiError::Api { status, .. } => *status >= 500 || *status == 429,
            ApiError::Transport {
                interrupted: true, ..
            } => true,
            ApiError::Transport { message, .. } | ApiError::InvalidResponse(message) => {
                has_transient_signature(message)
            }
            ApiError::Unauthorized => false,
        }
    }
}

fn has_transient_signature(message: &str) -> bool {
    let message = message.to_ascii_lowercase();
    TRANSIENT_SIGNATURES.iter().any(|sig| message.contains(sig))
}

/// Render an error and its causes, skipping causes already in the text.
fn describe_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        ApiError::Transport {
            message: describe_chain(&err),
            interrupted: err.is_timeout() || err.is_body(),
        }
    }
}

/// What a confirmed mutation did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationAction {
    /// A resource was onboarded.
    Created,
    /// A resource's services were reconciled.
    Updated,
    /// An account was added to an organization.
    Added,
}

impl fmt::Display for MutationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MutationAction::Created => "created",
            MutationAction::Updated => "updated",
            MutationAction::Added => "added",
        })
    }
}

/// An onboarding workflow failed.
#[derive(Debug, Error)]
pub enum OnboardingError {
    /// Caller input was rejected before anything was sent.
    #[error("invalid request: {0}")]
    Validation(#[from] ValidationError),

    /// The client could not be configured.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Reading the current state failed; nothing was changed.
    #[error("failed to get current {kind} details for {id}: {source}")]
    FetchCurrent {
        /// Resource kind.
        kind: ResourceKind,
        /// Resource id.
        id: String,
        /// Underlying API error.
        #[source]
        source: ApiError,
    },

    /// Attaching services failed; no services were removed.
    #[error("failed to add services to {kind} {id}: {source}")]
    AddServices {
        /// Resource kind.
        kind: ResourceKind,
        /// Resource id.
        id: String,
        /// Underlying API error.
        #[source]
        source: ApiError,
    },

    /// Detaching services failed. Any additions in the same call already
    /// happened; the removal itself may have partially applied. Treated as a
    /// possibly-applied mutation whether or not an add preceded it.
    #[error("failed to remove services from {kind} {id}: {source}")]
    RemoveServices {
        /// Resource kind.
        kind: ResourceKind,
        /// Resource id.
        id: String,
        /// Underlying API error, unmodified.
        #[source]
        source: ApiError,
    },

    /// The mutation most likely succeeded but the resource could not be read
    /// back. Re-query instead of repeating the mutation.
    #[error("{kind} {action} with ID {id}, but failed to fetch details: {source}")]
    Confirmation {
        /// Resource kind.
        kind: ResourceKind,
        /// Resource id.
        id: String,
        /// What the mutation did.
        action: MutationAction,
        /// Final retry outcome.
        #[source]
        source: RetryError<ApiError>,
    },

    /// A plain read failed.
    #[error("failed to get {kind} {id}: {source}")]
    Fetch {
        /// Resource kind.
        kind: ResourceKind,
        /// Resource id.
        id: String,
        /// Underlying API error.
        #[source]
        source: ApiError,
    },

    /// Listing failed part way.
    #[error("failed to list {kind} resources: {source}")]
    List {
        /// Resource kind.
        kind: ResourceKind,
        /// Underlying API error.
        #[source]
        source: ApiError,
    },

    /// Onboarding a new resource failed.
    #[error("failed to create {kind}: {source}")]
    Create {
        /// Resource kind.
        kind: ResourceKind,
        /// Underlying API error.
        #[source]
        source: ApiError,
    },

    /// Offboarding a resource failed.
    #[error("failed to delete {kind} {id}: {source}")]
    Delete {
        /// Resource kind.
        kind: ResourceKind,
        /// Resource id.
        id: String,
        /// Underlying API error.
        #[source]
        source: ApiError,
    },

    /// Adding an account to an organization failed.
    #[error("failed to add account {account_id} to organization {org_id}: {source}")]
    AddAccount {
        /// Organization onboarding id.
        org_id: String,
        /// Native account id.
        account_id: String,
        /// Underlying API error.
        #[source]
        source: ApiError,
    },

    /// Reading the organization during discovery failed.
    #[error("failed to get organization {org_id}: {source}")]
    GetOrganization {
        /// Organization onboarding id.
        org_id: String,
        /// Underlying API error.
        #[source]
        source: ApiError,
    },

    /// Starting a discovery scan failed.
    #[error("failed to trigger discovery scan for organization {org_id}: {source}")]
    TriggerScan {
        /// Organization onboarding id.
        org_id: String,
        /// Native organization id the scan was requested for.
        external_org_id: Option<String>,
        /// Underlying API error.
        #[source]
        source: ApiError,
    },

    /// The discovery scan did not finish within the probe budget.
    #[error("discovery scan for organization {org_id} did not complete after {attempts} polls")]
    PollTimeout {
        /// Organization onboarding id.
        org_id: String,
        /// Polls performed.
        attempts: u32,
    },

    /// The caller canceled the workflow.
    #[error("{operation} canceled for {id}")]
    Canceled {
        /// Step that was interrupted.
        operation: &'static str,
        /// Resource id the step was working on.
        id: String,
    },
}

/// Result type for onboarding workflows.
pub type OnboardingResult<T> = Result<T, OnboardingError>;

impl From<AuthError> for OnboardingError {
    fn from(err: AuthError) -> Self {
        OnboardingError::Config(ConfigError::Token(err))
    }
}

impl OnboardingError {
    /// The API error behind this failure, if any.
    pub fn api_error(&self) -> Option<&ApiError> {
        match self {
            OnboardingError::FetchCurrent { source, .. }
            | OnboardingError::AddServices { source, .. }
            | OnboardingError::RemoveServices { source, .. }
            | OnboardingError::Fetch { source, .. }
            | OnboardingError::List { source, .. }
            | OnboardingError::Create { source, .. }
            | OnboardingError::Delete { source, .. }
            | OnboardingError::AddAccount { source, .. }
            | OnboardingError::GetOrganization { source, .. }
            | OnboardingError::TriggerScan { source, .. } => Some(source),
            OnboardingError::Confirmation { source, .. } => source.last_error(),
            OnboardingError::Validation(_)
            | OnboardingError::Config(_)
            | OnboardingError::PollTimeout { .. }
            | OnboardingError::Canceled { .. } => None,
        }
    }

    /// Whether the remote state may already have changed.
    ///
    /// Conservative: every remove failure answers `true`, even when the plan
    /// had nothing to add, since the remote side may have applied part of the
    /// removal before rejecting it.
    pub fn mutation_may_have_applied(&self) -> bool {
        matches!(
            self,
            OnboardingError::RemoveServices { .. } | OnboardingError::Confirmation { .. }
        )
    }
}
