//! Bounded cache of per-chunk extraction results.
//!
//! Owned by one [`CheckExtractor`](crate::extractor::CheckExtractor), never
//! process-wide. Keys are the normalized chunk text plus the domain hint,
//! so whitespace and case differences hit the same entry. Eviction is LRU
//! at `max_entries`, and entries also expire after `ttl`. Only successful
//! extractions are stored.

use moka::future::Cache;
use moka::policy::EvictionPolicy;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::Duration;

use underwrite_core::{normalize_text, Check};

use crate::config::CacheConfig;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
    chunk_hash: u64,
    domain: Option<String>,
}

impl CacheKey {
    pub fn new(chunk: &str, domain_hint: Option<&str>) -> Self {
        let mut hasher = DefaultHasher::new();
        normalize_text(chunk).hash(&mut hasher);
        Self {
            chunk_hash: hasher.finish(),
            domain: domain_hint.map(|d| d.trim().to_lowercase()),
        }
    }
}

pub struct ExtractionCache {
    cache: Cache<CacheKey, Vec<Check>>,
}

impl ExtractionCache {
    pub fn new(max_entries: u64, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_entries)
            .time_to_live(ttl)
            .eviction_policy(EvictionPolicy::lru())
            .build();
        Self { cache }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.max_entries, config.ttl)
    }

    pub async fn get(&self, key: &CacheKey) -> Option<Vec<Check>> {
        self.cache.get(key).await
    }

    pub async fn insert(&self, key: CacheKey, checks: Vec<Check>) {
        self.cache.insert(key, checks).await;
    }

    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }

    /// Approximate; pending maintenance tasks may lag.
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }

    /// Apply pending evictions so `entry_count` is exact.
    pub async fn sync(&self) {
        self.cache.run_pending_tasks().await;
    }
}

impl Default for ExtractionCache {
    fn default() -> Self {
        Self::from_config(&CacheConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use underwrite_core::CheckKind;

    #[test]
    fn test_key_ignores_case_and_whitespace() {
        let a = CacheKey::new("LTV must  not exceed 80%.", Some("Financial"));
        let b = CacheKey::new("ltv must not exceed 80%", Some("financial"));
        assert_eq!(a, b);
        assert_ne!(a, CacheKey::new("ltv must not exceed 80%", None));
        assert_ne!(a, CacheKey::new("ltv must not exceed 75%", Some("financial")));
    }

    #[tokio::test]
    async fn test_get_and_insert() {
        let cache = ExtractionCache::default();
        let key = CacheKey::new("FICO score must be at least 620", None);
        assert!(cache.get(&key).await.is_none());

        let checks = vec![Check::new("TH01", CheckKind::Threshold, "FICO >= 620")];
        cache.insert(key.clone(), checks.clone()).await;
        assert_eq!(cache.get(&key).await, Some(checks));
    }

    #[tokio::test]
    async fn test_bounded_size() {
        let cache = ExtractionCache::new(2, Duration::from_secs(60));
        for i in 0..10 {
            cache
                .insert(CacheKey::new(&format!("chunk {i}"), None), Vec::new())
                .await;
        }
        cache.sync().await;
        assert!(cache.entry_count() <= 2);
    }
}
