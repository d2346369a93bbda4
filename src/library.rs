use std::sync::Arc;

use anyhow::Result;
use tracing::{error, info, instrument};

use crate::cache::{CacheBackend, CacheStore, FileBackend};
use crate::chapter::{Chapter, ChapterCollection, UNNAMED_CHAPTER, aggregate};
use crate::config::AppConfig;
use crate::fields::FieldMap;
use crate::image::{ImageCandidates, ImageResolver};
use crate::query::{QueryContext, QueryEngine};
use crate::row::Row;
use crate::sheet::{HttpSource, Origin, SheetLoader, SheetSource};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadStatus {
    Loading,
    Ready,
    Error(String),
}

/// 详情列表中的一张卡片
#[derive(Debug, Clone, PartialEq)]
pub struct CardView {
    pub index: usize,
    pub title: String,
    pub body: String,
    pub cover: String,
    pub row: Arc<Row>,
}

impl CardView {
    fn new(row: &Arc<Row>, fields: &FieldMap) -> Self {
        Self {
            index: row.index,
            title: row
                .non_empty(&fields.title)
                .unwrap_or_else(|| UNNAMED_CHAPTER.to_string()),
            body: row.non_empty(&fields.body).unwrap_or_default(),
            cover: row.non_empty(&fields.cover).unwrap_or_default(),
            row: Arc::clone(row),
        }
    }
}

/// 章节卡片的只读视图
#[derive(Debug, Clone, PartialEq)]
pub struct ChapterView {
    pub name: String,
    pub total: usize,
    pub outer_count: usize,
    pub node_count: usize,
    pub hero_title: String,
    pub hero_body: String,
    pub hero_cover: String,
    pub outer_rows: Vec<CardView>,
    pub node_rows: Vec<CardView>,
}

impl ChapterView {
    pub fn new(chapter: &Chapter, fields: &FieldMap) -> Self {
        let hero = chapter.hero();
        Self {
            name: chapter.name.clone(),
            total: chapter.total,
            outer_count: chapter.outer_rows.len(),
            node_count: chapter.node_rows.len(),
            hero_title: hero
                .non_empty(&fields.title)
                .unwrap_or_else(|| chapter.name.clone()),
            hero_body: hero.non_empty(&fields.body).unwrap_or_default(),
            hero_cover: hero.non_empty(&fields.cover).unwrap_or_default(),
            outer_rows: chapter.outer_rows.iter().map(|r| CardView::new(r, fields)).collect(),
            node_rows: chapter.node_rows.iter().map(|r| CardView::new(r, fields)).collect(),
        }
    }
}

pub type SheetLibrary = Library<HttpSource, FileBackend>;

/// 展示层使用的入口：加载一次数据，之后按需查询
pub struct Library<S, B> {
    loader: SheetLoader<S, B>,
    chapters: ChapterCollection,
    status: LoadStatus,
    origin: Option<Origin>,
    engine: QueryEngine,
    images: ImageResolver,
    batch_size: usize,
    skeleton_count: usize,
}

impl SheetLibrary {
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let source = HttpSource::new(config.dataset_url()?);
        let cache = CacheStore::new(
            FileBackend::new(&config.cache.dir),
            &config.cache.key,
            config.cache_ttl(),
        );
        let loader = SheetLoader::new(source, cache, config.fields.clone())
            .with_timeout(config.fetch_timeout());
        Ok(Self::new(loader, config))
    }
}

impl<S: SheetSource, B: CacheBackend> Library<S, B> {
    pub fn new(loader: SheetLoader<S, B>, config: &AppConfig) -> Self {
        Self {
            loader,
            chapters: ChapterCollection::default(),
            status: LoadStatus::Loading,
            origin: None,
            engine: QueryEngine::new(),
            images: ImageResolver::new(config.image_dir.clone()),
            batch_size: config.render_batch_size.max(1),
            skeleton_count: config.skeleton_count,
        }
    }

    /// 整体重建章节集合
    #[instrument(skip_all)]
    pub async fn load(&mut self) -> &LoadStatus {
        self.status = LoadStatus::Loading;
        match self.loader.load().await {
            Ok(data) => {
                self.chapters = aggregate(&data.rows, &data.fields);
                self.origin = Some(data.origin);
                self.status = LoadStatus::Ready;
                info!(
                    "数据已就绪: {} 行, {} 个章节 ({:?})",
                    data.rows.len(),
                    self.chapters.len(),
                    data.origin
                );
            }
            Err(e) => {
                error!("无法加载数据: {}", e);
                self.status = LoadStatus::Error(e.user_message().to_string());
            }
        }
        &self.status
    }

    pub fn status(&self) -> &LoadStatus {
        &self.status
    }

    pub fn origin(&self) -> Option<Origin> {
        self.origin
    }

    pub fn collection(&self) -> &ChapterCollection {
        &self.chapters
    }

    pub fn loader(&self) -> &SheetLoader<S, B> {
        &self.loader
    }

    pub fn get_chapters(&self, ctx: &QueryContext) -> Vec<ChapterView> {
        let fields = self.chapters.fields();
        self.engine
            .run(&self.chapters, ctx)
            .into_iter()
            .map(|c| ChapterView::new(c, fields))
            .collect()
    }

    pub fn chapter(&self, name: &str) -> Option<ChapterView> {
        self.chapters
            .get(name)
            .map(|c| ChapterView::new(c, self.chapters.fields()))
    }

    pub fn resolve_image_candidates(&self, cover_key: &str, is_large: bool) -> ImageCandidates {
        self.images.resolve(cover_key, is_large)
    }

    /// 按批次大小切分，供分批渲染
    pub fn batches<'a, T>(&self, views: &'a [T]) -> std::slice::Chunks<'a, T> {
        views.chunks(self.batch_size)
    }

    pub fn skeleton_count(&self) -> usize {
        self.skeleton_count
    }
}
