//! Service specs and current-service extraction

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

/// Raw attribute map of a resource as returned by the platform.
pub type RawResource = Map<String, Value>;

/// A service the caller wants attached to a resource.
///
/// `resource_config` is opaque to this crate and passed through as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DesiredServiceSpec {
    /// Service name (unique per resource)
    pub service_name: String,

    /// Service-specific configuration
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub resource_config: Map<String, Value>,
}

impl DesiredServiceSpec {
    /// Create a spec with an empty configuration.
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            resource_config: Map::new(),
        }
    }

    /// Add a configuration entry.
    pub fn with_config(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.resource_config.insert(key.into(), value.into());
        self
    }
}

/// Extract the attached service names from a raw resource.
///
/// The `services` attribute must be an array of strings. When it is absent,
/// or has any other shape, the resource is treated as having no services
/// rather than failing.
///
/// # Examples
///
/// ```
/// use onboarding_model::{current_service_names, RawResource};
///
/// let raw: RawResource = serde_json::from_str(r#"{"services": ["a", "b", "a"]}"#).unwrap();
/// assert_eq!(current_service_names(&raw).len(), 2);
///
/// let malformed: RawResource = serde_json::from_str(r#"{"services": "a"}"#).unwrap();
/// assert!(current_service_names(&malformed).is_empty());
/// ```
pub fn current_service_names(raw: &RawResource) -> BTreeSet<String> {
    let Some(Value::Array(items)) = raw.get("services") else {
        return BTreeSet::new();
    };

    items
        .iter()
        .map(|item| item.as_str().map(str::to_string))
        .collect::<Option<BTreeSet<_>>>()
        .unwrap_or_default()
}
