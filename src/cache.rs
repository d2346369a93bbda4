pub mod backend;

pub use backend::{CacheBackend, FileBackend, MemoryBackend};

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::error::CacheError;
use crate::fields::FieldMap;
use crate::row::Row;

pub static DEFAULT_CACHE_KEY: &str = "cardSystem_cache";

/// 持久化的数据快照
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub raw: Vec<Arc<Row>>,
    pub fields: FieldMap,
    /// 毫秒时间戳
    pub timestamp: i64,
}

impl CacheEntry {
    pub fn is_expired(&self, now_ms: i64, ttl: Duration) -> bool {
        now_ms - self.timestamp > ttl.as_millis() as i64
    }
}

/// 以 TTL 控制的单键缓存，所有失败只记录日志
pub struct CacheStore<B> {
    backend: B,
    key: String,
    ttl: Duration,
    // 因过期而移除的条目，只在加载失败时作为备用
    evicted: Option<CacheEntry>,
}

impl<B: CacheBackend> CacheStore<B> {
    pub fn new(backend: B, key: impl Into<String>, ttl: Duration) -> Self {
        Self {
            backend,
            key: key.into(),
            ttl,
            evicted: None,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    async fn read(&self) -> Option<CacheEntry> {
        let text = match self.backend.read(&self.key).await {
            Ok(Some(text)) => text,
            Ok(None) => return None,
            Err(e) => {
                warn!("无法读取缓存: {}", e);
                return None;
            }
        };
        match serde_json::from_str(&text) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("缓存内容无效: {}", CacheError::from(e));
                None
            }
        }
    }

    /// 用于正常加载：过期的条目会被移除
    #[instrument(skip(self))]
    pub async fn get_fresh(&mut self, now_ms: i64) -> Option<CacheEntry> {
        let entry = self.read().await?;
        if entry.is_expired(now_ms, self.ttl) {
            info!("缓存已过期 ({} ms)", now_ms - entry.timestamp);
            if let Err(e) = self.backend.remove(&self.key).await {
                warn!("无法移除过期缓存: {}", e);
            }
            self.evicted = Some(entry);
            return None;
        }
        debug!("命中缓存");
        Some(entry)
    }

    /// 用于加载失败后的回退：忽略 TTL
    #[instrument(skip(self))]
    pub async fn get_stale(&self) -> Option<CacheEntry> {
        match self.read().await {
            Some(entry) => Some(entry),
            None => self.evicted.clone(),
        }
    }

    /// 覆盖写入，失败时不影响调用方
    #[instrument(skip_all)]
    pub async fn put(&mut self, entry: &CacheEntry) -> bool {
        let result = match serde_json::to_string(entry) {
            Ok(text) => self.backend.write(&self.key, &text).await,
            Err(e) => Err(CacheError::from(e)),
        };
        match result {
            Ok(()) => {
                self.evicted = None;
                debug!("缓存已写入: {} 行", entry.raw.len());
                true
            }
            Err(e) => {
                warn!("无法储存缓存: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const TTL: Duration = Duration::from_secs(5 * 60);

    fn entry(timestamp: i64) -> CacheEntry {
        let mut row = Row::new(0);
        row.insert("TITLE", json!("A"));
        CacheEntry {
            raw: vec![Arc::new(row)],
            fields: FieldMap::default(),
            timestamp,
        }
    }

    #[tokio::test]
    async fn fresh_entry_is_returned() {
        let mut store = CacheStore::new(MemoryBackend::default(), DEFAULT_CACHE_KEY, TTL);
        let now = 1_000_000_000;
        assert!(store.put(&entry(now - 1000)).await);
        assert_eq!(store.get_fresh(now).await, Some(entry(now - 1000)));
    }

    #[tokio::test]
    async fn file_store_persists_and_evicts() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = CacheStore::new(FileBackend::new(dir.path()), DEFAULT_CACHE_KEY, TTL);
        let now = 1_000_000_000;
        assert!(store.put(&entry(now)).await);

        let path = store.backend().path_for(DEFAULT_CACHE_KEY);
        assert!(tokio::fs::try_exists(&path).await.unwrap());
        assert_eq!(store.get_fresh(now).await, Some(entry(now)));

        let later = now + TTL.as_millis() as i64 + 1;
        assert_eq!(store.get_fresh(later).await, None);
        assert!(!tokio::fs::try_exists(&path).await.unwrap());
        assert_eq!(store.get_stale().await, Some(entry(now)));
    }

    #[test]
    fn expiry_is_strictly_greater_than_ttl() {
        let e = entry(0);
        assert!(!e.is_expired(TTL.as_millis() as i64, TTL));
        assert!(e.is_expired(TTL.as_millis() as i64 + 1, TTL));
    }

    #[tokio::test]
    async fn expired_entry_is_removed_but_still_usable_as_fallback() {
        let mut store = CacheStore::new(MemoryBackend::default(), DEFAULT_CACHE_KEY, TTL);
        let now = 1_000_000_000;
        let old = entry(now - 6 * 60 * 1000);
        store.put(&old).await;

        assert_eq!(store.get_fresh(now).await, None);
        assert!(store.backend().get(DEFAULT_CACHE_KEY).is_none());
        assert_eq!(store.get_stale().await, Some(old));
    }

    #[tokio::test]
    async fn write_failures_are_swallowed() {
        let backend = MemoryBackend::with_quota(8);
        let mut store = CacheStore::new(backend, DEFAULT_CACHE_KEY, TTL);
        assert!(!store.put(&entry(0)).await);
        assert_eq!(store.get_fresh(0).await, None);
        assert_eq!(store.get_stale().await, None);
    }

    #[tokio::test]
    async fn corrupt_entry_reads_as_absent() {
        let backend = MemoryBackend::default();
        backend.set(DEFAULT_CACHE_KEY, "{not json");
        let mut store = CacheStore::new(backend, DEFAULT_CACHE_KEY, TTL);
        assert_eq!(store.get_fresh(0).await, None);
        assert_eq!(store.get_stale().await, None);
    }

    #[test]
    fn persisted_shape_uses_raw_fields_timestamp() {
        let text = serde_json::to_value(entry(42)).unwrap();
        assert_eq!(text["timestamp"], json!(42));
        assert_eq!(text["raw"][0]["__idx"], json!(0));
        assert_eq!(text["raw"][0]["TITLE"], json!("A"));
        assert_eq!(text["fields"]["chapter"], json!("CHAPTER"));
        assert_eq!(text["fields"]["level"], json!(null));
    }
}
