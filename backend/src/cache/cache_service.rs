use chrono::{DateTime, Duration, Utc};
use sha2::{Digest, Sha256};
use shared::{ProductRecord, SourceKind};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::cache::models::CacheEntry;

type CacheKey = (SourceKind, String);

/// Expiring `(source, query) -> records` store. Expiry is checked lazily on
/// read and expired entries are pruned on every write; writes to the same
/// key are last-writer-wins.
#[derive(Clone)]
pub struct CacheService {
    entries: Arc<RwLock<HashMap<CacheKey, CacheEntry>>>,
    ttl: Duration,
    directory: Option<PathBuf>,
}

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Cache IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CacheService {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            ttl,
            directory: None,
        }
    }

    /// Also persists entries as JSON files under `directory`.
    pub fn with_directory(ttl: Duration, directory: PathBuf) -> Self {
        Self {
            directory: Some(directory),
            ..Self::new(ttl)
        }
    }

    pub fn calculate_query_hash(query: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(query.as_bytes());
        hex::encode(hasher.finalize())
    }

    fn cache_path(&self, source: SourceKind, query: &str) -> Option<PathBuf> {
        self.directory.as_ref().map(|dir| {
            dir.join(format!(
                "{}_{}.json",
                source,
                Self::calculate_query_hash(query)
            ))
        })
    }

    pub async fn get(&self, source: SourceKind, query: &str) -> Option<Vec<ProductRecord>> {
        self.get_at(source, query, Utc::now()).await
    }

    /// Records for a request of `limit`, or `None` when the stored entry was
    /// fetched with a smaller limit and may be missing records.
    pub async fn get_covering(
        &self,
        source: SourceKind,
        query: &str,
        limit: usize,
    ) -> Option<Vec<ProductRecord>> {
        let entry = self.entry_at(source, query, Utc::now()).await?;
        if !entry.covers(limit) {
            log::debug!(
                "Cached [{}] '{}' was fetched with limit {}, need {}",
                source,
                query,
                entry.fetch_limit,
                limit
            );
            return None;
        }
        let mut data = entry.data;
        data.truncate(limit);
        Some(data)
    }

    pub(crate) async fn get_at(
        &self,
        source: SourceKind,
        query: &str,
        now: DateTime<Utc>,
    ) -> Option<Vec<ProductRecord>> {
        self.entry_at(source, query, now).await.map(|entry| entry.data)
    }

    async fn entry_at(&self, source: SourceKind, query: &str, now: DateTime<Utc>) -> Option<CacheEntry> {
        let key = (source, query.to_string());

        let in_memory = {
            let entries = self.entries.read().await;
            match entries.get(&key) {
                Some(entry) if !entry.is_expired(self.ttl, now) => {
                    log::info!("Cache hit for [{}] '{}'", source, query);
                    return Some(entry.clone());
                }
                Some(_) => true,
                None => false,
            }
        };
        if !in_memory {
            return self.entry_from_disk(key, now).await;
        }

        let mut entries = self.entries.write().await;
        // Re-check: a concurrent put may have refreshed the entry.
        if entries
            .get(&key)
            .is_some_and(|entry| entry.is_expired(self.ttl, now))
        {
            entries.remove(&key);
            log::info!("Cache expired for [{}] '{}'", source, query);
        }
        None
    }

    async fn entry_from_disk(&self, key: CacheKey, now: DateTime<Utc>) -> Option<CacheEntry> {
        let (source, query) = &key;
        let entry = match self.read_from_disk(*source, query).await {
            Ok(Some(entry)) => entry,
            Ok(None) => return None,
            Err(e) => {
                log::error!("Failed to read cache file for [{}] '{}': {}", source, query, e);
                return None;
            }
        };

        if entry.source != *source || entry.query != *query || entry.is_expired(self.ttl, now) {
            return None;
        }

        log::info!("Loaded cache from disk for [{}] '{}'", source, query);
        self.entries.write().await.insert(key, entry.clone());
        Some(entry)
    }

    async fn read_from_disk(
        &self,
        source: SourceKind,
        query: &str,
    ) -> Result<Option<CacheEntry>, CacheError> {
        let Some(path) = self.cache_path(source, query) else {
            return Ok(None);
        };
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(CacheError::Io(e)),
        }
    }

    async fn write_to_disk(&self, entry: &CacheEntry) -> Result<(), CacheError> {
        let (Some(dir), Some(path)) = (
            self.directory.as_ref(),
            self.cache_path(entry.source, &entry.query),
        ) else {
            return Ok(());
        };
        tokio::fs::create_dir_all(dir).await?;
        let bytes = serde_json::to_vec_pretty(entry)?;
        tokio::fs::write(path, bytes).await?;
        Ok(())
    }

    pub async fn put(&self, source: SourceKind, query: &str, data: Vec<ProductRecord>) {
        let fetch_limit = data.len();
        self.put_fetched(source, query, data, fetch_limit).await;
    }

    /// Stores records an upstream returned when asked for `fetch_limit`.
    pub async fn put_fetched(
        &self,
        source: SourceKind,
        query: &str,
        data: Vec<ProductRecord>,
        fetch_limit: usize,
    ) {
        let entry = CacheEntry::new(source, query.to_string(), data, fetch_limit);

        if let Err(e) = self.write_to_disk(&entry).await {
            log::error!("Failed to persist cache for [{}] '{}': {}", source, query, e);
        }

        self.insert(entry, Utc::now()).await;
        log::info!("Cached results for [{}] '{}'", source, query);
    }

    async fn insert(&self, entry: CacheEntry, now: DateTime<Utc>) {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, cached| !cached.is_expired(self.ttl, now));
        if entries.len() < before {
            log::debug!("Pruned {} expired cache entries", before - entries.len());
        }
        entries.insert((entry.source, entry.query.clone()), entry);
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }
}
