use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One cached document. Persisted as JSON under its entry key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub url: String,
    pub data: String,
    /// Write time, ms since epoch
    pub timestamp: i64,
    pub expires_at: i64,
    pub content_type: String,
    /// Byte length of `data`
    pub size: u64,
}

impl CacheEntry {
    pub fn new(url: &str, data: &str, content_type: &str, now: i64, ttl: Duration) -> Self {
        Self {
            url: url.to_string(),
            data: data.to_string(),
            timestamp: now,
            expires_at: now.saturating_add(i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX)),
            content_type: content_type.to_string(),
            size: data.len() as u64,
        }
    }

    pub fn is_expired(&self, now: i64) -> bool {
        now > self.expires_at
    }
}
