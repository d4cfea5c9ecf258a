//! Content-addressed cache with TTL expiry.
//!
//! ## Layout
//!
//! ```text
//! {cache}/
//! ├── content/      # Raw document text, keyed by paper link
//! ├── generated/    # LLM output, keyed by stage + stable inputs
//! └── snapshots/    # Crawl snapshots
//!     └── {sha256(fingerprint)}.json
//! ```
//!
//! The cache is never authoritative: every read failure is a miss and every
//! write failure is logged and dropped.

use std::fmt;
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use sha2::{Digest, Sha256};

use crate::error::Result;
use crate::models::CacheConfig;
use crate::storage::LocalStorage;

/// Cache partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    /// Fetched document text
    Content,
    /// Text produced by an enrichment stage
    Generated,
    /// Crawl snapshots
    Snapshot,
}

impl Namespace {
    pub const ALL: [Namespace; 3] = [Namespace::Content, Namespace::Generated, Namespace::Snapshot];

    pub fn as_str(&self) -> &'static str {
        match self {
            Namespace::Content => "content",
            Namespace::Generated => "generated",
            Namespace::Snapshot => "snapshots",
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// On-disk cache record.
#[derive(Debug, Serialize, Deserialize)]
struct CacheRecord<T> {
    namespace: String,
    fingerprint: String,
    payload: T,
    cached_at: DateTime<Utc>,
}

/// Entry counts per namespace.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub namespaces: Vec<(Namespace, usize)>,
    pub total: usize,
}

/// Result of a sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub scanned: usize,
    pub removed: usize,
}

/// SHA-256 hex digest of a fingerprint.
pub fn hash_key(fingerprint: &str) -> String {
    hex::encode(Sha256::digest(fingerprint.as_bytes()))
}

/// File-backed cache store.
#[derive(Debug, Clone)]
pub struct CacheStore {
    storage: LocalStorage,
    ttl: Duration,
    enabled: bool,
    bypass_reads: bool,
}

impl CacheStore {
    pub fn new(storage: LocalStorage, ttl: Duration) -> Self {
        Self {
            storage,
            ttl,
            enabled: true,
            bypass_reads: false,
        }
    }

    /// Build a store rooted at `root` from cache settings.
    pub fn from_config(root: impl Into<std::path::PathBuf>, config: &CacheConfig) -> Self {
        Self::new(LocalStorage::new(root), config.ttl()).with_enabled(config.enabled)
    }

    /// A disabled store misses every read and drops every write.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Miss every read but keep writing fresh results.
    pub fn with_bypass_reads(mut self, bypass: bool) -> Self {
        self.bypass_reads = bypass;
        self
    }

    fn key(namespace: Namespace, fingerprint: &str) -> String {
        format!("{}/{}.json", namespace.as_str(), hash_key(fingerprint))
    }

    fn is_expired(&self, cached_at: DateTime<Utc>) -> bool {
        let age = Utc::now().signed_duration_since(cached_at);
        match age.to_std() {
            Ok(age) => age >= self.ttl,
            // Timestamp in the future: clock skew, treat as fresh.
            Err(_) => false,
        }
    }

    /// Look up a payload. Missing, expired and unreadable entries are `None`.
    pub async fn get<T: DeserializeOwned>(&self, namespace: Namespace, fingerprint: &str) -> Option<T> {
        if !self.enabled || self.bypass_reads {
            return None;
        }
        let key = Self::key(namespace, fingerprint);
        let bytes = match self.storage.read_bytes(&key).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return None,
            Err(e) => {
                log::warn!("Cache read failed for {}: {}", key, e);
                return None;
            }
        };

        let record: CacheRecord<T> = match serde_json::from_slice(&bytes) {
            Ok(record) => record,
            Err(e) => {
                log::warn!("Ignoring corrupt cache entry {}: {}", key, e);
                return None;
            }
        };
        if record.namespace != namespace.as_str() || record.fingerprint != fingerprint {
            log::warn!("Ignoring cache entry {} with mismatched key", key);
            return None;
        }
        if self.is_expired(record.cached_at) {
            log::debug!("Cache entry {} expired", key);
            return None;
        }
        Some(record.payload)
    }

    /// Store a payload. Failures are logged and swallowed.
    pub async fn set<T: Serialize>(&self, namespace: Namespace, fingerprint: &str, payload: &T) {
        if !self.enabled {
            return;
        }
        if let Err(e) = self
            .write_record(namespace, fingerprint, payload, Utc::now())
            .await
        {
            log::warn!("Cache write failed in {}: {}", namespace, e);
        }
    }

    async fn write_record<T: Serialize>(
        &self,
        namespace: Namespace,
        fingerprint: &str,
        payload: &T,
        cached_at: DateTime<Utc>,
    ) -> Result<()> {
        let record = CacheRecord {
            namespace: namespace.as_str().to_string(),
            fingerprint: fingerprint.to_string(),
            payload,
            cached_at,
        };
        self.storage
            .write_json(&Self::key(namespace, fingerprint), &record)
            .await
    }

    /// Entry files of a namespace.
    async fn entries(&self, namespace: Namespace) -> Vec<std::path::PathBuf> {
        let dir = self.storage.path(namespace.as_str());
        let mut read_dir = match tokio::fs::read_dir(&dir).await {
            Ok(read_dir) => read_dir,
            Err(_) => return Vec::new(),
        };

        let mut files = Vec::new();
        while let Ok(Some(entry)) = read_dir.next_entry().await {
            let path = entry.path();
            let is_entry = path.extension().and_then(|e| e.to_str()) == Some("json")
                && !path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with('.'));
            if is_entry {
                files.push(path);
            }
        }
        files
    }

    /// Count entries per namespace. Expired entries are included.
    pub async fn stats(&self) -> CacheStats {
        let mut stats = CacheStats::default();
        for namespace in Namespace::ALL {
            let count = self.entries(namespace).await.len();
            stats.total += count;
            stats.namespaces.push((namespace, count));
        }
        stats
    }

    /// Delete every expired entry.
    ///
    /// Unreadable records fall back to file modification time. Files that
    /// disappear mid-sweep are ignored.
    pub async fn sweep(&self) -> SweepReport {
        let mut report = SweepReport::default();
        for namespace in Namespace::ALL {
            for path in self.entries(namespace).await {
                report.scanned += 1;
                if self.entry_expired(&path).await && tokio::fs::remove_file(&path).await.is_ok() {
                    report.removed += 1;
                }
            }
        }
        log::info!(
            "Cache sweep: removed {} of {} entries",
            report.removed,
            report.scanned
        );
        report
    }

    async fn entry_expired(&self, path: &std::path::Path) -> bool {
        #[derive(Deserialize)]
        struct Stamp {
            cached_at: DateTime<Utc>,
        }

        if let Ok(bytes) = tokio::fs::read(path).await {
            if let Ok(stamp) = serde_json::from_slice::<Stamp>(&bytes) {
                return self.is_expired(stamp.cached_at);
            }
        }

        match tokio::fs::metadata(path).await.and_then(|m| m.modified()) {
            Ok(modified) => SystemTime::now()
                .duration_since(modified)
                .is_ok_and(|age| age >= self.ttl),
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const DAY: Duration = Duration::from_secs(24 * 60 * 60);

    fn store(tmp: &TempDir) -> CacheStore {
        CacheStore::new(LocalStorage::new(tmp.path()), 30 * DAY)
    }

    #[test]
    fn test_hash_key_is_stable() {
        assert_eq!(hash_key("abc"), hash_key("abc"));
        assert_ne!(hash_key("abc"), hash_key("abd"));
        assert_eq!(hash_key("abc").len(), 64);
    }

    #[tokio::test]
    async fn test_set_then_get() {
        let tmp = TempDir::new().unwrap();
        let cache = store(&tmp);

        cache
            .set(Namespace::Generated, "summary:T:body", &"text".to_string())
            .await;
        let hit: Option<String> = cache.get(Namespace::Generated, "summary:T:body").await;
        assert_eq!(hit.as_deref(), Some("text"));
    }

    #[tokio::test]
    async fn test_namespaces_are_separate() {
        let tmp = TempDir::new().unwrap();
        let cache = store(&tmp);

        cache.set(Namespace::Content, "k", &"raw".to_string()).await;
        let miss: Option<String> = cache.get(Namespace::Generated, "k").await;
        assert!(miss.is_none());
    }

    #[tokio::test]
    async fn test_expired_entry_reads_as_none() {
        let tmp = TempDir::new().unwrap();
        let cache = store(&tmp);

        let old = Utc::now() - chrono::Duration::days(31);
        cache
            .write_record(Namespace::Content, "k", &"stale".to_string(), old)
            .await
            .unwrap();
        let miss: Option<String> = cache.get(Namespace::Content, "k").await;
        assert!(miss.is_none());

        // Still on disk until swept.
        assert_eq!(cache.stats().await.total, 1);
        let report = cache.sweep().await;
        assert_eq!(report.removed, 1);
        assert_eq!(cache.stats().await.total, 0);
    }

    #[tokio::test]
    async fn test_sweep_keeps_fresh_entries() {
        let tmp = TempDir::new().unwrap();
        let cache = store(&tmp);

        cache.set(Namespace::Content, "fresh", &"x".to_string()).await;
        let report = cache.sweep().await;
        assert_eq!(report, SweepReport { scanned: 1, removed: 0 });
    }

    #[tokio::test]
    async fn test_corrupt_entry_reads_as_none() {
        let tmp = TempDir::new().unwrap();
        let cache = store(&tmp);

        let path = tmp.path().join(CacheStore::key(Namespace::Content, "k"));
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{not json").unwrap();

        let miss: Option<String> = cache.get(Namespace::Content, "k").await;
        assert!(miss.is_none());
    }

    #[tokio::test]
    async fn test_disabled_and_bypass_modes() {
        let tmp = TempDir::new().unwrap();

        let disabled = store(&tmp).with_enabled(false);
        disabled.set(Namespace::Content, "k", &"v".to_string()).await;
        assert_eq!(disabled.stats().await.total, 0);

        let bypass = store(&tmp).with_bypass_reads(true);
        bypass.set(Namespace::Content, "k", &"v".to_string()).await;
        let miss: Option<String> = bypass.get(Namespace::Content, "k").await;
        assert!(miss.is_none());

        let hit: Option<String> = store(&tmp).get(Namespace::Content, "k").await;
        assert_eq!(hit.as_deref(), Some("v"));
    }
}
