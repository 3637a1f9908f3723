//! Discovery scan probe settings

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How often, and how many times, to poll for a finished discovery scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanProbeConfig {
    /// Maximum number of organization polls
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Seconds to wait before each poll
    #[serde(default = "default_interval_seconds")]
    pub interval_seconds: u64,
}

impl Default for ScanProbeConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            interval_seconds: default_interval_seconds(),
        }
    }
}

impl ScanProbeConfig {
    /// Build from optional caller overrides, applying defaults when absent.
    pub fn from_options(max_retries: Option<u32>, interval_seconds: Option<u64>) -> Self {
        let default = Self::default();
        Self {
            max_retries: max_retries.unwrap_or(default.max_retries),
            interval_seconds: interval_seconds.unwrap_or(default.interval_seconds),
        }
    }

    /// Wait between polls.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }
}

fn default_max_retries() -> u32 {
    20
}

fn default_interval_seconds() -> u64 {
    3
}

/// Parse a scan timestamp reported by the platform (RFC 3339).
pub fn parse_scan_timestamp(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(raw.trim()).map(|ts| ts.with_timezone(&Utc))
}
