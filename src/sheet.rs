pub mod client;
pub mod envelope;

pub use client::{HttpSource, SheetSource};
pub use envelope::parse_body;

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, instrument, warn};

use crate::cache::{CacheBackend, CacheEntry, CacheStore};
use crate::error::LoadError;
use crate::fields::{self, FieldCandidates, FieldMap, Role};
use crate::row::Row;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(8);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Network,
    Cache,
    /// 请求失败后使用的过期缓存
    StaleCache,
}

/// 一次加载得到的行和列映射
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub rows: Vec<Arc<Row>>,
    pub fields: FieldMap,
    pub origin: Origin,
}

impl Dataset {
    fn from_entry(entry: CacheEntry, origin: Origin) -> Self {
        Self {
            rows: entry.raw,
            fields: entry.fields,
            origin,
        }
    }
}

pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

pub struct SheetLoader<S, B> {
    source: S,
    cache: CacheStore<B>,
    candidates: FieldCandidates,
    timeout: Duration,
    clock: fn() -> i64,
}

impl<S: SheetSource, B: CacheBackend> SheetLoader<S, B> {
    pub fn new(source: S, cache: CacheStore<B>, candidates: FieldCandidates) -> Self {
        Self {
            source,
            cache,
            candidates,
            timeout: DEFAULT_TIMEOUT,
            clock: now_ms,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_clock(mut self, clock: fn() -> i64) -> Self {
        self.clock = clock;
        self
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// 有效缓存直接返回；否则请求网络，失败时回退到过期缓存
    #[instrument(skip_all)]
    pub async fn load(&mut self) -> Result<Dataset, LoadError> {
        let now = (self.clock)();
        if let Some(entry) = self.cache.get_fresh(now).await {
            info!("使用缓存数据: {} 行", entry.raw.len());
            return Ok(Dataset::from_entry(entry, Origin::Cache));
        }

        match self.fetch_rows().await {
            Ok(rows) => {
                let rows: Vec<Arc<Row>> = rows.into_iter().map(Arc::new).collect();
                let field_map = fields::resolve(rows.first().map(Arc::as_ref), &self.candidates);
                for role in Role::ALL {
                    info!("字段 {} -> {:?}", role, field_map.label(role));
                }
                let entry = CacheEntry {
                    raw: rows,
                    fields: field_map,
                    timestamp: (self.clock)(),
                };
                self.cache.put(&entry).await;
                Ok(Dataset::from_entry(entry, Origin::Network))
            }
            Err(e) => {
                error!("数据加载失败: {}", e);
                match self.cache.get_stale().await {
                    Some(entry) => {
                        warn!("改用过期缓存: {} 行", entry.raw.len());
                        Ok(Dataset::from_entry(entry, Origin::StaleCache))
                    }
                    None => Err(e),
                }
            }
        }
    }

    /// 请求与超时竞速，先完成的一方决定结果，另一方被丢弃
    async fn fetch_rows(&self) -> Result<Vec<Row>, LoadError> {
        let body = tokio::select! {
            body = self.source.fetch() => body?,
            _ = tokio::time::sleep(self.timeout) => {
                return Err(LoadError::Timeout(self.timeout.as_secs()));
            }
        };
        parse_body(&body)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::cache::{DEFAULT_CACHE_KEY, MemoryBackend};

    const TTL: Duration = Duration::from_secs(300);

    static BODY: &str = r#"google.visualization.Query.setResponse({"status":"ok","table":{"cols":[{"label":"章節"},{"label":"標題"},{"label":"層級"}],"rows":[{"c":[{"v":"序章"},{"v":"A"},{"v":""}]},{"c":[{"v":"序章"},{"v":"B"},{"v":"node"}]}]}});"#;

    enum Reply {
        Body(String),
        Status(u16),
        Hang,
    }

    struct StubSource {
        reply: Mutex<Reply>,
        calls: AtomicUsize,
    }

    impl StubSource {
        fn new(reply: Reply) -> Self {
            Self {
                reply: Mutex::new(reply),
                calls: AtomicUsize::new(0),
            }
        }

        fn set(&self, reply: Reply) {
            *self.reply.lock().unwrap() = reply;
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl SheetSource for StubSource {
        async fn fetch(&self) -> Result<String, LoadError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let hang = matches!(*self.reply.lock().unwrap(), Reply::Hang);
            if hang {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            match &*self.reply.lock().unwrap() {
                Reply::Body(body) => Ok(body.clone()),
                Reply::Status(code) => Err(LoadError::Network(format!("HTTP {}", code))),
                Reply::Hang => Ok(String::new()),
            }
        }
    }

    fn loader(reply: Reply) -> SheetLoader<StubSource, MemoryBackend> {
        let cache = CacheStore::new(MemoryBackend::default(), DEFAULT_CACHE_KEY, TTL);
        SheetLoader::new(StubSource::new(reply), cache, FieldCandidates::default())
    }

    #[tokio::test]
    async fn fresh_load_resolves_fields_and_caches() {
        let mut loader = loader(Reply::Body(BODY.to_string()));
        let data = loader.load().await.unwrap();
        assert_eq!(data.origin, Origin::Network);
        assert_eq!(data.rows.len(), 2);
        assert_eq!(data.fields.chapter, "章節");
        assert_eq!(data.fields.title, "標題");
        assert_eq!(data.fields.level.as_deref(), Some("層級"));
        assert_eq!(data.fields.body, "BODY");

        let again = loader.load().await.unwrap();
        assert_eq!(again.origin, Origin::Cache);
        assert_eq!(again.rows, data.rows);
        assert_eq!(again.fields, data.fields);
        assert_eq!(loader.source().calls(), 1);
    }

    #[tokio::test]
    async fn http_error_without_cache_surfaces() {
        let mut loader = loader(Reply::Status(500));
        let err = loader.load().await.unwrap_err();
        assert!(matches!(err, LoadError::Network(_)));
        assert!(!err.is_timeout());
    }

    #[tokio::test(start_paused = true)]
    async fn slow_fetch_times_out() {
        let mut loader = loader(Reply::Hang);
        let err = loader.load().await.unwrap_err();
        assert!(err.is_timeout());
    }

    #[tokio::test(start_paused = true)]
    async fn expired_cache_is_refetched_then_used_on_failure() {
        let mut loader =
            loader(Reply::Body(BODY.to_string())).with_clock(|| now_ms() - 6 * 60 * 1000);
        let seeded = loader.load().await.unwrap();
        assert_eq!(seeded.origin, Origin::Network);

        // 时间回到现在，缓存已过期六分钟
        let mut loader = SheetLoader {
            clock: now_ms,
            ..loader
        };
        loader.source().set(Reply::Hang);
        let data = loader.load().await.unwrap();
        assert_eq!(loader.source().calls(), 2);
        assert_eq!(data.origin, Origin::StaleCache);
        assert_eq!(data.rows, seeded.rows);
    }

    #[tokio::test]
    async fn remote_error_falls_back_to_stale_cache() {
        let mut loader = loader(Reply::Body(BODY.to_string())).with_clock(|| 0);
        loader.load().await.unwrap();

        let mut loader = SheetLoader {
            clock: now_ms,
            ..loader
        };
        loader.source().set(Reply::Body(r#"x({"status":"error"})"#.to_string()));
        let data = loader.load().await.unwrap();
        assert_eq!(data.origin, Origin::StaleCache);
        assert_eq!(data.rows.len(), 2);
    }
}
