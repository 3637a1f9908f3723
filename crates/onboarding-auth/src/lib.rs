//! # Onboarding Authentication
//!
//! API token handling for the onboarding client.
//!
//! ## Overview
//!
//! The onboarding-auth crate handles:
//! - **Token parsing**: Opaque service keys and JWT API tokens
//! - **Claims**: Tenant id, tenant URL, region and expiry
//! - **Tenant resolution**: Picking the API base URL for a token
//!
//! ## Features
//!
//! - `jwt` (default): decode JWT tokens using jsonwebtoken
//!
//! ## Usage
//!
//! ```rust,no_run
//! use onboarding_auth::ApiToken;
//!
//! let token = ApiToken::parse(std::env::var("ONBOARDING_API_TOKEN").unwrap()).unwrap();
//! token.ensure_not_expired(chrono::Utc::now()).unwrap();
//!
//! let base_url = token.tenant_url(None).unwrap();
//! println!("talking to {}", base_url);
//! ```

pub mod claims;
pub mod error;
pub mod token;

// Re-export main types
pub use claims::TokenClaims;
pub use error::{AuthError, AuthResult};
pub use token::ApiToken;
