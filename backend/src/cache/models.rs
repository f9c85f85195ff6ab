use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use shared::{ProductRecord, SourceKind};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub source: SourceKind,
    pub query: String,
    pub data: Vec<ProductRecord>,
    /// Limit the upstream was asked for when `data` was fetched.
    #[serde(default)]
    pub fetch_limit: usize,
    pub created_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn new(source: SourceKind, query: String, data: Vec<ProductRecord>, fetch_limit: usize) -> Self {
        Self {
            source,
            query,
            data,
            fetch_limit,
            created_at: Utc::now(),
        }
    }

    pub fn is_expired(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        now - self.created_at > ttl
    }

    /// True when this entry answers a request for `limit` records exactly as
    /// a fresh upstream call would: either it holds enough records, or the
    /// upstream already returned fewer than it was asked for.
    pub fn covers(&self, limit: usize) -> bool {
        self.data.len() >= limit || self.fetch_limit >= limit
    }
}
