//! Bounded document cache over a shared key/value store.
//!
//! Entries expire lazily on read. After every write the oldest entries by
//! write time are evicted until the total size fits under the ceiling. Reads
//! do not refresh an entry's position, so eviction is FIFO by write time
//! rather than a true LRU.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::error::{CacheError, StoreError};
use crate::error_log::ErrorReporter;
use crate::store::{KeyValueStore, StoreResult};
use crate::utils::{entry_key, index_key, is_owned_key, is_valid_namespace};
use crate::Result;

mod cleaner;
mod entry;
mod index;
mod policy;

pub use cleaner::CacheCleaner;
pub use entry::CacheEntry;
pub use index::{CacheIndex, IndexRecord};
pub use policy::{is_static_asset, CachePolicy};

pub const DEFAULT_CONTENT_TYPE: &str = "text/html";
pub const DEFAULT_NAMESPACE: &str = "@offline_cache:";

pub struct CacheManager {
    store: Arc<dyn KeyValueStore>,
    policy: CachePolicy,
    clock: Arc<dyn Clock>,
    namespace: String,
    errors: Arc<ErrorReporter>,
    // 条目和索引的更新作为一个整体
    write_lock: Mutex<()>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub total_size: u64,
    pub entry_count: usize,
    /// None when the cache is empty
    pub oldest_timestamp: Option<i64>,
    pub newest_timestamp: Option<i64>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub expired: usize,
    /// Index records whose entry was already gone
    pub dangling: usize,
}

impl CacheManager {
    pub fn new(store: Arc<dyn KeyValueStore>, policy: CachePolicy) -> Self {
        info!(
            "Initializing cache manager: max size {} bytes, document ttl {:?}, static ttl {:?}",
            policy.max_size, policy.document_ttl, policy.static_asset_ttl
        );
        Self {
            store,
            policy,
            clock: Arc::new(SystemClock),
            namespace: DEFAULT_NAMESPACE.to_string(),
            errors: Arc::new(ErrorReporter::default()),
            write_lock: Mutex::new(()),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Fails unless the namespace is non-empty and ends with `:`.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Result<Self> {
        let namespace = namespace.into();
        if !is_valid_namespace(&namespace) {
            return Err(CacheError::Config(format!(
                "cache namespace {:?} must be non-empty and end with ':'",
                namespace
            )));
        }
        self.namespace = namespace;
        Ok(self)
    }

    pub fn with_error_reporter(mut self, errors: Arc<ErrorReporter>) -> Self {
        self.errors = errors;
        self
    }

    pub fn policy(&self) -> &CachePolicy {
        &self.policy
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn error_reporter(&self) -> &Arc<ErrorReporter> {
        &self.errors
    }

    /// Stores `data` for `url`, replacing any previous entry, then evicts
    /// the oldest entries while the total size is over the ceiling.
    pub async fn cache(&self, url: &str, data: &str, content_type: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let write_err = |source: StoreError| CacheError::Write {
            url: url.to_string(),
            source,
        };

        let now = self.clock.now_millis();
        let entry = CacheEntry::new(url, data, content_type, now, self.policy.ttl_for(content_type));
        let size = entry.size;
        debug!("Caching {} bytes for {} ({})", size, url, content_type);

        // 先写条目, 再更新索引
        let raw = serde_json::to_string(&entry).map_err(|e| write_err(e.into()))?;
        self.store
            .set(&entry_key(&self.namespace, url), raw)
            .await
            .map_err(write_err)?;

        let mut index = self.load_index().await.map_err(write_err)?;
        if let Some(old) = index.upsert(IndexRecord {
            url: url.to_string(),
            size,
            timestamp: now,
            expires_at: entry.expires_at,
        }) {
            debug!("Replaced previous entry for {} ({} bytes)", url, old.size);
        }

        let evicted = self.evict_over_limit(&mut index);
        self.save_index(&index).await.map_err(write_err)?;
        self.delete_entries(&evicted, "cache.evict").await;

        debug!("Cache now holds {} entries, {} bytes", index.len(), index.total_size);
        Ok(())
    }

    /// Same as [`cache`](Self::cache) with content type `text/html`.
    pub async fn cache_document(&self, url: &str, data: &str) -> Result<()> {
        self.cache(url, data, DEFAULT_CONTENT_TYPE).await
    }

    /// Returns the cached document, or None when absent, expired or unreadable.
    /// Expired entries are deleted on the way out.
    pub async fn get_cached(&self, url: &str) -> Option<String> {
        let entry = match self.read_entry(url).await {
            Ok(Some(entry)) => entry,
            Ok(None) => {
                debug!("Cache miss for {}", url);
                return None;
            }
            Err(e) => {
                warn!("Treating unreadable cache entry as a miss: {}", e);
                self.errors.record("cache.read", &e);
                return None;
            }
        };

        if entry.is_expired(self.clock.now_millis()) {
            debug!("Cache entry expired for {}", url);
            if let Err(e) = self.expire(url).await {
                warn!("Failed to drop expired entry for {}: {}", url, e);
                self.errors.record("cache.expire", &e);
            }
            return None;
        }

        // 索引中没有记录的条目是删除失败留下的孤立数据
        if self.index_snapshot().await.get(url).is_none() {
            debug!("Ignoring unindexed cache entry for {}", url);
            return None;
        }

        debug!("Cache hit for {} ({} bytes)", url, entry.size);
        Some(entry.data)
    }

    pub async fn is_cached(&self, url: &str) -> bool {
        self.get_cached(url).await.is_some()
    }

    pub async fn remove(&self, url: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.remove_locked(url).await
    }

    /// Deletes the index and every entry key of this cache's namespace. Other
    /// keys in the store are left alone, including those of nested namespaces.
    pub async fn clear(&self) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        let keys = self.store.list_keys().await.map_err(CacheError::Clear)?;
        let index_key = index_key(&self.namespace);

        // 先清空索引
        self.store.delete(&index_key).await.map_err(CacheError::Clear)?;

        let owned: Vec<String> = keys
            .into_iter()
            .filter(|k| *k != index_key && is_owned_key(&self.namespace, k))
            .collect();
        self.store.delete_many(&owned).await.map_err(CacheError::Clear)?;

        info!("Cleared {} cache entries", owned.len());
        Ok(())
    }

    /// Bytes held by entries that have not expired yet. Expired entries that
    /// were never read are not counted even though they are still stored.
    pub async fn size(&self) -> u64 {
        let now = self.clock.now_millis();
        self.index_snapshot().await.live_size(now)
    }

    pub async fn stats(&self) -> CacheStats {
        let now = self.clock.now_millis();
        let index = self.index_snapshot().await;
        let live: Vec<&IndexRecord> = index.live(now).collect();
        let stats = CacheStats {
            total_size: live.iter().map(|r| r.size).sum(),
            entry_count: live.len(),
            oldest_timestamp: live.iter().map(|r| r.timestamp).min(),
            newest_timestamp: live.iter().map(|r| r.timestamp).max(),
        };
        debug!("Cache stats: {:?}", stats);
        stats
    }

    /// Drops expired entries and index records with no backing entry.
    /// Read-time expiry does not depend on this ever running.
    pub async fn sweep_expired(&self) -> Result<SweepReport> {
        let _guard = self.write_lock.lock().await;
        let now = self.clock.now_millis();
        let mut index = self.load_index().await.map_err(CacheError::Sweep)?;
        let mut report = SweepReport::default();
        let mut expired = Vec::new();

        for record in index.entries.clone() {
            match self.read_entry(&record.url).await {
                Ok(Some(entry)) if entry.is_expired(now) => {
                    index.remove(&record.url);
                    expired.push(record);
                    report.expired += 1;
                }
                Ok(Some(_)) => {}
                Ok(None) => {
                    debug!("Dropping dangling index record for {}", record.url);
                    index.remove(&record.url);
                    report.dangling += 1;
                }
                Err(e) => warn!("Skipping unreadable entry during sweep: {}", e),
            }
        }

        if report.expired + report.dangling > 0 {
            self.save_index(&index).await.map_err(CacheError::Sweep)?;
        }
        self.delete_entries(&expired, "cache.sweep").await;

        info!(
            "Cache sweep removed {} expired entries and {} dangling records",
            report.expired, report.dangling
        );
        Ok(report)
    }

    async fn read_entry(&self, url: &str) -> Result<Option<CacheEntry>> {
        let read_err = |source: StoreError| CacheError::Read {
            key: url.to_string(),
            source,
        };

        let raw = match self
            .store
            .get(&entry_key(&self.namespace, url))
            .await
            .map_err(read_err)?
        {
            Some(raw) => raw,
            None => return Ok(None),
        };

        let entry: CacheEntry = serde_json::from_str(&raw).map_err(|e| read_err(e.into()))?;
        if entry.url != url {
            warn!("Cache key for {} holds an entry for {}", url, entry.url);
            return Ok(None);
        }
        Ok(Some(entry))
    }

    async fn expire(&self, url: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        // 加锁后重新检查, 避免删掉刚写入的新条目
        match self.read_entry(url).await? {
            Some(entry) if !entry.is_expired(self.clock.now_millis()) => Ok(()),
            _ => self.remove_locked(url).await,
        }
    }

    async fn remove_locked(&self, url: &str) -> Result<()> {
        let delete_err = |source: StoreError| CacheError::Delete {
            url: url.to_string(),
            source,
        };

        // 先更新索引, 再删除条目
        let mut index = self.load_index().await.map_err(delete_err)?;
        if let Some(record) = index.remove(url) {
            self.save_index(&index).await.map_err(delete_err)?;
            debug!("Removed {} ({} bytes) from cache", url, record.size);
        }
        self.store
            .delete(&entry_key(&self.namespace, url))
            .await
            .map_err(delete_err)
    }

    fn evict_over_limit(&self, index: &mut CacheIndex) -> Vec<IndexRecord> {
        let mut evicted = Vec::new();
        while index.total_size > self.policy.max_size {
            match index.pop_oldest() {
                Some(record) => {
                    info!(
                        "Evicting {} ({} bytes, written at {})",
                        record.url, record.size, record.timestamp
                    );
                    evicted.push(record);
                }
                None => break,
            }
        }
        evicted
    }

    async fn delete_entries(&self, records: &[IndexRecord], context: &str) {
        if records.is_empty() {
            return;
        }
        let keys: Vec<String> = records
            .iter()
            .map(|r| entry_key(&self.namespace, &r.url))
            .collect();

        // 索引已经不再引用这些条目, 删除失败只会留下孤立数据
        if let Err(source) = self.store.delete_many(&keys).await {
            let err = CacheError::Delete {
                url: records[0].url.clone(),
                source,
            };
            warn!("Failed to delete {} unindexed entries: {}", keys.len(), err);
            self.errors.record(context, &err);
        }
    }

    async fn load_index(&self) -> StoreResult<CacheIndex> {
        let raw = match self.store.get(&index_key(&self.namespace)).await? {
            Some(raw) => raw,
            None => return Ok(CacheIndex::default()),
        };

        match serde_json::from_str(&raw) {
            Ok(index) => Ok(index),
            Err(e) => {
                warn!("Cache index is corrupt, starting from an empty index: {}", e);
                self.errors.record("cache.index", &e);
                Ok(CacheIndex::default())
            }
        }
    }

    async fn save_index(&self, index: &CacheIndex) -> StoreResult<()> {
        let raw = serde_json::to_string(index)?;
        self.store.set(&index_key(&self.namespace), raw).await
    }

    async fn index_snapshot(&self) -> CacheIndex {
        match self.load_index().await {
            Ok(index) => index,
            Err(source) => {
                let err = CacheError::Read {
                    key: index_key(&self.namespace),
                    source,
                };
                warn!("Failed to read cache index: {}", err);
                self.errors.record("cache.read", &err);
                CacheIndex::default()
            }
        }
    }
}

impl std::fmt::Debug for CacheManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheManager")
            .field("namespace", &self.namespace)
            .field("policy", &self.policy)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::store::{FileStore, MemoryStore};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;
    use tokio::test;

    const HOUR: Duration = Duration::from_secs(3600);

    /// MemoryStore with switchable failures.
    #[derive(Default)]
    struct FlakyStore {
        inner: MemoryStore,
        fail_get: AtomicBool,
        fail_set: AtomicBool,
    }

    #[async_trait]
    impl KeyValueStore for FlakyStore {
        async fn get(&self, key: &str) -> StoreResult<Option<String>> {
            if self.fail_get.load(Ordering::SeqCst) {
                return Err(StoreError::Backend("get failed".into()));
            }
            self.inner.get(key).await
        }

        async fn set(&self, key: &str, value: String) -> StoreResult<()> {
            if self.fail_set.load(Ordering::SeqCst) {
                return Err(StoreError::Backend("set failed".into()));
            }
            self.inner.set(key, value).await
        }

        async fn delete(&self, key: &str) -> StoreResult<()> {
            self.inner.delete(key).await
        }

        async fn list_keys(&self) -> StoreResult<Vec<String>> {
            self.inner.list_keys().await
        }
    }

    fn manager_with(store: Arc<dyn KeyValueStore>, policy: CachePolicy) -> (CacheManager, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(1_700_000_000_000));
        let manager = CacheManager::new(store, policy).with_clock(clock.clone());
        (manager, clock)
    }

    fn manager() -> (CacheManager, Arc<ManualClock>) {
        manager_with(Arc::new(MemoryStore::new()), CachePolicy::default())
    }

    #[test]
    async fn test_basic_cache_operations() {
        let (cache, _) = manager();

        cache.cache("https://x/a", "<html>a</html>", "text/html").await.unwrap();
        assert_eq!(cache.get_cached("https://x/a").await.as_deref(), Some("<html>a</html>"));
        assert!(cache.is_cached("https://x/a").await);
        assert!(cache.get_cached("https://x/missing").await.is_none());
        assert_eq!(cache.size().await, 14);
    }

    #[test]
    async fn test_html_expires_before_css() {
        let (cache, clock) = manager();
        let a = "A".repeat(10);
        let b = "B".repeat(10);

        cache.cache("https://x/a", &a, "text/html").await.unwrap();
        cache.cache("https://x/b", &b, "text/css").await.unwrap();
        assert_eq!(cache.stats().await.entry_count, 2);

        clock.advance(HOUR + Duration::from_millis(1));

        assert!(cache.get_cached("https://x/a").await.is_none());
        assert_eq!(cache.get_cached("https://x/b").await, Some(b));

        let stats = cache.stats().await;
        assert_eq!(stats.entry_count, 1);
        assert_eq!(stats.total_size, 10);
    }

    #[test]
    async fn test_entry_alive_at_exact_expiry() {
        let (cache, clock) = manager();
        cache.cache_document("https://x/a", "doc").await.unwrap();

        clock.advance(HOUR);
        assert!(cache.is_cached("https://x/a").await);

        clock.advance(Duration::from_millis(1));
        assert!(!cache.is_cached("https://x/a").await);
        assert_eq!(cache.size().await, 0);
    }

    #[test]
    async fn test_overwrite_replaces_size_and_timestamp() {
        let (cache, clock) = manager();
        cache.cache_document("https://x/a", "0123456789").await.unwrap();
        clock.advance(Duration::from_secs(10));
        cache.cache_document("https://x/a", "abc").await.unwrap();

        let stats = cache.stats().await;
        assert_eq!(stats.entry_count, 1);
        assert_eq!(stats.total_size, 3);
        assert_eq!(stats.oldest_timestamp, stats.newest_timestamp);
        assert_eq!(cache.get_cached("https://x/a").await.as_deref(), Some("abc"));
    }

    #[test]
    async fn test_eviction_is_by_write_time_not_access() {
        let policy = CachePolicy::default().with_max_size(100);
        let (cache, clock) = manager_with(Arc::new(MemoryStore::new()), policy);
        let chunk = "x".repeat(40);

        cache.cache_document("https://x/1", &chunk).await.unwrap();
        clock.advance(Duration::from_millis(1));
        cache.cache_document("https://x/2", &chunk).await.unwrap();
        clock.advance(Duration::from_millis(1));

        // 读取不会刷新顺序
        for _ in 0..3 {
            assert!(cache.is_cached("https://x/1").await);
        }

        cache.cache_document("https://x/3", &chunk).await.unwrap();

        assert!(cache.get_cached("https://x/1").await.is_none());
        assert!(cache.is_cached("https://x/2").await);
        assert!(cache.is_cached("https://x/3").await);
        assert_eq!(cache.size().await, 80);
    }

    #[test]
    async fn test_size_never_exceeds_ceiling() {
        let policy = CachePolicy::default().with_max_size(1_000);
        let (cache, clock) = manager_with(Arc::new(MemoryStore::new()), policy);

        for i in 0..50 {
            let body = "y".repeat(37 + i * 3);
            cache.cache_document(&format!("https://x/{}", i), &body).await.unwrap();
            assert!(cache.size().await <= 1_000);
            clock.advance(Duration::from_millis(5));
        }

        // 最新的条目一定还在
        assert!(cache.is_cached("https://x/49").await);
        assert!(!cache.is_cached("https://x/0").await);
    }

    #[test]
    async fn test_oversized_entry_is_evicted_with_everything_else() {
        let policy = CachePolicy::default().with_max_size(10);
        let (cache, _) = manager_with(Arc::new(MemoryStore::new()), policy);

        cache.cache_document("https://x/small", "12345").await.unwrap();
        cache.cache_document("https://x/huge", &"z".repeat(20)).await.unwrap();

        assert_eq!(cache.size().await, 0);
        assert!(!cache.is_cached("https://x/huge").await);
        assert!(!cache.is_cached("https://x/small").await);
    }

    #[test]
    async fn test_size_matches_retrievable_entries() {
        let policy = CachePolicy::default().with_max_size(64);
        let (cache, clock) = manager_with(Arc::new(MemoryStore::new()), policy);
        let urls: Vec<String> = (0..6).map(|i| format!("https://x/{}", i)).collect();

        for (i, url) in urls.iter().enumerate() {
            cache.cache_document(url, &"d".repeat(10 + i)).await.unwrap();
            clock.advance(Duration::from_millis(1));
        }
        cache.remove(&urls[5]).await.unwrap();
        cache.cache_document(&urls[4], "short").await.unwrap();

        let mut retrievable = 0u64;
        for url in &urls {
            if let Some(data) = cache.get_cached(url).await {
                retrievable += data.len() as u64;
            }
        }
        assert_eq!(cache.size().await, retrievable);
        assert!(retrievable <= 64);
    }

    #[test]
    async fn test_remove_and_missing_remove() {
        let (cache, _) = manager();
        cache.cache_document("https://x/a", "aaa").await.unwrap();

        cache.remove("https://x/a").await.unwrap();
        cache.remove("https://x/a").await.unwrap();
        cache.remove("https://x/never").await.unwrap();

        assert!(!cache.is_cached("https://x/a").await);
        assert_eq!(cache.stats().await.entry_count, 0);
    }

    #[test]
    async fn test_clear_only_touches_own_namespace() {
        let store = Arc::new(MemoryStore::new());
        store.set("onboarding:done", "true".into()).await.unwrap();
        let (cache, _) = manager_with(store.clone(), CachePolicy::default());

        cache.cache_document("https://x/a", "a").await.unwrap();
        cache.cache("https://x/b.css", "b", "text/css").await.unwrap();
        cache.clear().await.unwrap();

        assert!(cache.get_cached("https://x/a").await.is_none());
        assert!(cache.get_cached("https://x/b.css").await.is_none());
        assert_eq!(cache.size().await, 0);
        assert_eq!(store.list_keys().await.unwrap(), vec!["onboarding:done".to_string()]);
    }

    #[test]
    async fn test_separate_namespaces_do_not_collide() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let first = CacheManager::new(store.clone(), CachePolicy::default())
            .with_namespace("@one:")
            .unwrap();
        let second = CacheManager::new(store, CachePolicy::default())
            .with_namespace("@two:")
            .unwrap();

        first.cache_document("https://x/a", "one").await.unwrap();
        second.cache_document("https://x/a", "two").await.unwrap();
        first.clear().await.unwrap();

        assert!(first.get_cached("https://x/a").await.is_none());
        assert_eq!(second.get_cached("https://x/a").await.as_deref(), Some("two"));
    }

    #[test]
    async fn test_empty_stats() {
        let (cache, _) = manager();
        let stats = cache.stats().await;
        assert_eq!(
            stats,
            CacheStats {
                total_size: 0,
                entry_count: 0,
                oldest_timestamp: None,
                newest_timestamp: None,
            }
        );
    }

    #[test]
    async fn test_write_failure_is_reported_to_caller() {
        let store = Arc::new(FlakyStore::default());
        let (cache, _) = manager_with(store.clone(), CachePolicy::default());

        store.fail_set.store(true, Ordering::SeqCst);
        let err = cache.cache_document("https://x/a", "a").await.unwrap_err();
        assert!(matches!(err, CacheError::Write { .. }));

        store.fail_set.store(false, Ordering::SeqCst);
        assert!(cache.get_cached("https://x/a").await.is_none());
        assert_eq!(cache.size().await, 0);
    }

    #[test]
    async fn test_read_failure_degrades_to_miss() {
        let store = Arc::new(FlakyStore::default());
        let (cache, _) = manager_with(store.clone(), CachePolicy::default());
        cache.cache_document("https://x/a", "a").await.unwrap();

        store.fail_get.store(true, Ordering::SeqCst);
        assert!(cache.get_cached("https://x/a").await.is_none());
        assert_eq!(cache.size().await, 0);
        assert_eq!(cache.error_reporter().len(), 2);

        store.fail_get.store(false, Ordering::SeqCst);
        assert!(cache.is_cached("https://x/a").await);
    }

    #[test]
    async fn test_corrupt_entry_reads_as_miss() {
        let store = Arc::new(MemoryStore::new());
        let (cache, _) = manager_with(store.clone(), CachePolicy::default());
        store
            .set(&entry_key(DEFAULT_NAMESPACE, "https://x/a"), "{not json".into())
            .await
            .unwrap();

        assert!(cache.get_cached("https://x/a").await.is_none());
        assert_eq!(cache.error_reporter().recent()[0].context, "cache.read");
    }

    #[test]
    async fn test_dangling_index_record_is_tolerated_and_swept() {
        let store = Arc::new(MemoryStore::new());
        let (cache, _) = manager_with(store.clone(), CachePolicy::default());
        cache.cache_document("https://x/a", "aaaa").await.unwrap();
        cache.cache_document("https://x/b", "bb").await.unwrap();

        // 模拟写索引后、删条目前崩溃的反面情况: 条目丢失
        store.delete(&entry_key(DEFAULT_NAMESPACE, "https://x/a")).await.unwrap();
        assert!(cache.get_cached("https://x/a").await.is_none());

        let report = cache.sweep_expired().await.unwrap();
        assert_eq!(report, SweepReport { expired: 0, dangling: 1 });
        assert_eq!(cache.size().await, 2);
    }

    #[test]
    async fn test_sweep_removes_expired_entries() {
        let store = Arc::new(MemoryStore::new());
        let (cache, clock) = manager_with(store.clone(), CachePolicy::default());
        cache.cache_document("https://x/page", "page").await.unwrap();
        cache.cache("https://x/app.js", "js", "application/javascript").await.unwrap();

        clock.advance(HOUR * 2);
        let report = cache.sweep_expired().await.unwrap();
        assert_eq!(report.expired, 1);

        let stats = cache.stats().await;
        assert_eq!(stats.entry_count, 1);
        assert_eq!(stats.total_size, 2);
        assert!(store
            .get(&entry_key(DEFAULT_NAMESPACE, "https://x/page"))
            .await
            .unwrap()
            .is_none());
    }

    #[test]
    async fn test_unicode_urls_and_content() {
        let (cache, _) = manager();
        cache.cache_document("https://例子.测试/页面", "你好").await.unwrap();
        cache.cache_document("https://例子.测试/页面?x", "世界").await.unwrap();

        assert_eq!(cache.get_cached("https://例子.测试/页面").await.as_deref(), Some("你好"));
        assert_eq!(cache.size().await, 12);
    }

    #[test]
    async fn test_cache_survives_restart_with_file_store() {
        let temp_dir = tempfile::tempdir().unwrap();

        {
            let store = Arc::new(FileStore::open(temp_dir.path()).await.unwrap());
            let cache = CacheManager::new(store, CachePolicy::default());
            cache.cache_document("https://x/a", "persisted").await.unwrap();
        }

        let store = Arc::new(FileStore::open(temp_dir.path()).await.unwrap());
        let cache = CacheManager::new(store, CachePolicy::default());
        assert_eq!(cache.get_cached("https://x/a").await.as_deref(), Some("persisted"));
        assert_eq!(cache.stats().await.entry_count, 1);
    }

    #[test]
    async fn test_size_excludes_expired_entries_before_any_read() {
        let (cache, clock) = manager();
        cache.cache("https://x/a", &"A".repeat(10), "text/html").await.unwrap();
        cache.cache("https://x/b.css", "bbbb", "text/css").await.unwrap();

        clock.advance(HOUR + Duration::from_millis(1));

        // 不先读取, 直接查询大小
        assert_eq!(cache.size().await, 4);
        let stats = cache.stats().await;
        assert_eq!(stats.entry_count, 1);
        assert_eq!(stats.total_size, 4);
        assert_eq!(stats.oldest_timestamp, stats.newest_timestamp);

        assert!(cache.get_cached("https://x/a").await.is_none());
        assert_eq!(cache.size().await, 4);
    }

    #[test]
    async fn test_invalid_namespace_is_rejected() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        for bad in ["", ":", "@a"] {
            let err = CacheManager::new(store.clone(), CachePolicy::default())
                .with_namespace(bad)
                .unwrap_err();
            assert!(matches!(err, CacheError::Config(_)));
        }
    }

    #[test]
    async fn test_clear_leaves_nested_namespace_and_foreign_keys() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        store.set("onboarding:done", "true".into()).await.unwrap();
        store.set("@a:settings", "{}".into()).await.unwrap();

        let outer = CacheManager::new(store.clone(), CachePolicy::default())
            .with_namespace("@a:")
            .unwrap();
        let nested = CacheManager::new(store.clone(), CachePolicy::default())
            .with_namespace("@a:b:")
            .unwrap();
        outer.cache_document("https://x/a", "outer").await.unwrap();
        nested.cache_document("https://x/a", "nested").await.unwrap();

        outer.clear().await.unwrap();

        assert!(outer.get_cached("https://x/a").await.is_none());
        assert_eq!(nested.get_cached("https://x/a").await.as_deref(), Some("nested"));
        let keys = store.list_keys().await.unwrap();
        assert!(keys.contains(&"onboarding:done".to_string()));
        assert!(keys.contains(&"@a:settings".to_string()));
        assert!(keys.contains(&index_key("@a:b:")));
        assert!(!keys.contains(&index_key("@a:")));
    }

    #[test]
    async fn test_unindexed_entry_reads_as_miss() {
        let store = Arc::new(MemoryStore::new());
        let (cache, _) = manager_with(store.clone(), CachePolicy::default());
        cache.cache_document("https://x/a", "a").await.unwrap();
        cache.cache_document("https://x/b", "bb").await.unwrap();

        // 索引已更新但条目删除失败: 条目仍在存储中
        let raw = store
            .get(&entry_key(DEFAULT_NAMESPACE, "https://x/a"))
            .await
            .unwrap()
            .unwrap();
        cache.remove("https://x/a").await.unwrap();
        store
            .set(&entry_key(DEFAULT_NAMESPACE, "https://x/a"), raw)
            .await
            .unwrap();

        assert!(cache.get_cached("https://x/a").await.is_none());
        assert_eq!(cache.size().await, 2);
        assert!(cache.is_cached("https://x/b").await);
    }
}
