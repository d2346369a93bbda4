use std::cmp::Ordering;
use std::fmt;

use icu_collator::{Collator, CollatorOptions};
use icu_locid::Locale;
use serde::Deserialize;
use tracing::warn;

use crate::chapter::Chapter;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortMode {
    #[default]
    ChapterAsc,
    ChapterDesc,
    CountDesc,
    CountAsc,
}

impl SortMode {
    pub const ALL: [SortMode; 4] = [
        SortMode::ChapterAsc,
        SortMode::ChapterDesc,
        SortMode::CountDesc,
        SortMode::CountAsc,
    ];

    /// 未知或空值时回落到 chapter_asc
    pub fn parse(value: &str) -> Self {
        match value.trim() {
            "chapter_desc" => SortMode::ChapterDesc,
            "count_desc" => SortMode::CountDesc,
            "count_asc" => SortMode::CountAsc,
            _ => SortMode::ChapterAsc,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SortMode::ChapterAsc => "chapter_asc",
            SortMode::ChapterDesc => "chapter_desc",
            SortMode::CountDesc => "count_desc",
            SortMode::CountAsc => "count_asc",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SortMode::ChapterAsc => "章節名稱 (A-Z)",
            SortMode::ChapterDesc => "章節名稱 (Z-A)",
            SortMode::CountDesc => "卡片數量 (多到少)",
            SortMode::CountAsc => "卡片數量 (少到多)",
        }
    }
}

impl From<Option<&str>> for SortMode {
    fn from(value: Option<&str>) -> Self {
        value.map(SortMode::parse).unwrap_or_default()
    }
}

impl fmt::Display for SortMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 一次查询的搜索词和排序方式，由调用方显式传入
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryContext {
    pub query: String,
    pub sort: SortMode,
}

impl QueryContext {
    pub fn new(query: impl Into<String>, sort: SortMode) -> Self {
        Self {
            query: query.into(),
            sort,
        }
    }

    pub fn normalized_query(&self) -> String {
        normalize_query(&self.query)
    }
}

pub fn normalize_query(query: &str) -> String {
    query.to_lowercase().trim().to_string()
}

/// 繁体中文按笔画排序
pub static COLLATION_LOCALE: &str = "zh-Hant-u-co-stroke";

/// 章节名按繁体中文语系比较
pub struct QueryEngine {
    collator: Option<Collator>,
}

impl Default for QueryEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryEngine {
    pub fn new() -> Self {
        Self {
            collator: stroke_collator(),
        }
    }

    pub fn has_collator(&self) -> bool {
        self.collator.is_some()
    }

    pub fn compare_names(&self, a: &str, b: &str) -> Ordering {
        match &self.collator {
            Some(collator) => collator.compare(a, b),
            None => a.cmp(b),
        }
    }

    pub fn filter<'a>(
        &self,
        chapters: impl IntoIterator<Item = &'a Chapter>,
        query: &str,
    ) -> Vec<&'a Chapter> {
        let query = normalize_query(query);
        chapters.into_iter().filter(|c| c.matches(&query)).collect()
    }

    /// 稳定排序，比较结果相同的章节保持原有相对顺序
    pub fn sort<'a>(&self, mut chapters: Vec<&'a Chapter>, mode: SortMode) -> Vec<&'a Chapter> {
        chapters.sort_by(|a, b| match mode {
            SortMode::ChapterAsc => self.compare_names(&a.name, &b.name),
            SortMode::ChapterDesc => self.compare_names(&b.name, &a.name),
            SortMode::CountDesc => b.total.cmp(&a.total),
            SortMode::CountAsc => a.total.cmp(&b.total),
        });
        chapters
    }

    /// 先过滤再排序
    pub fn run<'a>(
        &self,
        chapters: impl IntoIterator<Item = &'a Chapter>,
        ctx: &QueryContext,
    ) -> Vec<&'a Chapter> {
        let filtered = self.filter(chapters, &ctx.query);
        self.sort(filtered, ctx.sort)
    }
}

fn stroke_collator() -> Option<Collator> {
    let locale: Locale = match COLLATION_LOCALE.parse() {
        Ok(locale) => locale,
        Err(e) => {
            warn!("排序语系无效 {}: {}", COLLATION_LOCALE, e);
            return None;
        }
    };
    match Collator::try_new(&locale.into(), CollatorOptions::new()) {
        Ok(collator) => Some(collator),
        Err(e) => {
            warn!("无法创建排序规则，改用码位比较: {}", e);
            None
        }
    }
}
