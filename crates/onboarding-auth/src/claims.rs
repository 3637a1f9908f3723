//! Claims carried by platform API tokens
//!
//! The platform issues JWT API tokens whose payload names the tenant the
//! token belongs to. Only the claims the client needs are modeled; anything
//! else is kept in `custom`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Claims decoded from a platform API token.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject (service principal or user id)
    #[serde(default)]
    pub sub: String,

    /// Tenant the token was issued for
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,

    /// Base URL of the tenant's API
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_url: Option<String>,

    /// Platform region the tenant lives in
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    /// Expiration time (Unix timestamp)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,

    /// Claims not modeled above
    #[serde(default, flatten)]
    pub custom: HashMap<String, serde_json::Value>,
}

impl TokenClaims {
    /// Whether the token is expired at `now`. Tokens without `exp` never expire.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.exp.is_some_and(|exp| now.timestamp() >= exp)
    }

    /// Get expiration as DateTime.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.exp.and_then(|exp| DateTime::from_timestamp(exp, 0))
    }
}
