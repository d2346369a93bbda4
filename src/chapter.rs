use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, instrument};

use crate::fields::FieldMap;
use crate::row::Row;

pub static UNNAMED_CHAPTER: &str = "未命名";
pub static NODE_LEVEL: &str = "node";

/// 同一章节名下的所有行
#[derive(Debug, Clone, PartialEq)]
pub struct Chapter {
    pub name: String,
    pub rows: Vec<Arc<Row>>,
    pub outer_rows: Vec<Arc<Row>>, // 主卡
    pub node_rows: Vec<Arc<Row>>,  // 子节点
    pub total: usize,
    hero: Arc<Row>,
    search_text: String,
}

impl Chapter {
    /// 代表该章节的卡片：第一张主卡，没有主卡时为第一行
    pub fn hero(&self) -> &Row {
        &self.hero
    }

    /// 小写且去掉所有空白的搜索文本
    pub fn search_text(&self) -> &str {
        &self.search_text
    }

    pub fn matches(&self, normalized_query: &str) -> bool {
        normalized_query.is_empty() || self.search_text.contains(normalized_query)
    }
}

struct ChapterBuilder {
    name: String,
    rows: Vec<Arc<Row>>,
    outer_rows: Vec<Arc<Row>>,
    node_rows: Vec<Arc<Row>>,
    hero: Option<Arc<Row>>,
    search_text: String,
}

impl ChapterBuilder {
    fn new(name: String) -> Self {
        Self {
            name,
            rows: Vec::new(),
            outer_rows: Vec::new(),
            node_rows: Vec::new(),
            hero: None,
            search_text: String::new(),
        }
    }

    fn push(&mut self, row: &Arc<Row>, is_node: bool) {
        self.rows.push(Arc::clone(row));
        self.search_text.push(' ');
        self.search_text.push_str(&row.joined_values());

        if is_node {
            self.node_rows.push(Arc::clone(row));
        } else {
            self.outer_rows.push(Arc::clone(row));
            if self.hero.is_none() {
                self.hero = Some(Arc::clone(row));
            }
        }
    }

    fn finish(self) -> Option<Chapter> {
        let hero = self.hero.or_else(|| self.rows.first().cloned())?;
        Some(Chapter {
            name: self.name,
            total: self.rows.len(),
            rows: self.rows,
            outer_rows: self.outer_rows,
            node_rows: self.node_rows,
            hero,
            search_text: normalize_search_text(&self.search_text),
        })
    }
}

/// 聚合后的章节集合，按首次出现的顺序排列
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChapterCollection {
    chapters: Vec<Chapter>,
    by_name: HashMap<String, usize>,
    fields: FieldMap,
}

impl ChapterCollection {
    pub fn fields(&self) -> &FieldMap {
        &self.fields
    }

    pub fn get(&self, name: &str) -> Option<&Chapter> {
        self.by_name.get(name).map(|&i| &self.chapters[i])
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Chapter> {
        self.chapters.iter()
    }

    pub fn len(&self) -> usize {
        self.chapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chapters.is_empty()
    }

    pub fn row_count(&self) -> usize {
        self.chapters.iter().map(|c| c.total).sum()
    }
}

impl<'a> IntoIterator for &'a ChapterCollection {
    type Item = &'a Chapter;
    type IntoIter = std::slice::Iter<'a, Chapter>;

    fn into_iter(self) -> Self::IntoIter {
        self.chapters.iter()
    }
}

/// 章节名：空值归入未命名章节，然后去掉首尾空白
///
/// 只有空白的单元格不是空值，去掉空白后得到空名称的章节。
pub fn chapter_name(row: &Row, fields: &FieldMap) -> String {
    row.non_empty(&fields.chapter)
        .map(|name| name.trim().to_string())
        .unwrap_or_else(|| UNNAMED_CHAPTER.to_string())
}

pub fn is_node(row: &Row, fields: &FieldMap) -> bool {
    fields
        .level
        .as_deref()
        .is_some_and(|label| row.text(label).to_lowercase() == NODE_LEVEL)
}

pub fn normalize_search_text(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect()
}

/// 单次遍历把行分组为章节，每次重新加载都完整重建
#[instrument(skip_all, fields(rows = rows.len()))]
pub fn aggregate(rows: &[Arc<Row>], fields: &FieldMap) -> ChapterCollection {
    let mut builders: Vec<ChapterBuilder> = Vec::new();
    let mut by_name: HashMap<String, usize> = HashMap::new();

    for row in rows {
        let name = chapter_name(row, fields);
        let idx = *by_name.entry(name.clone()).or_insert_with(|| {
            builders.push(ChapterBuilder::new(name));
            builders.len() - 1
        });
        builders[idx].push(row, is_node(row, fields));
    }

    let chapters: Vec<Chapter> = builders
        .into_iter()
        .filter_map(ChapterBuilder::finish)
        .collect();
    debug!("聚合完成: {} 个章节", chapters.len());

    ChapterCollection {
        chapters,
        by_name,
        fields: fields.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(index: usize, cells: &[(&str, &str)]) -> Arc<Row> {
        let mut row = Row::new(index);
        for (label, value) in cells {
            row.insert(*label, json!(value));
        }
        Arc::new(row)
    }

    fn fields() -> FieldMap {
        FieldMap {
            title: "TITLE".into(),
            body: "BODY".into(),
            cover: "COVER_BG_KEY".into(),
            chapter: "CHAPTER".into(),
            level: Some("LEVEL".into()),
        }
    }

    #[test]
    fn groups_rows_into_chapters() {
        let rows = vec![
            row(0, &[("CHAPTER", "序章"), ("LEVEL", ""), ("TITLE", "A")]),
            row(1, &[("CHAPTER", "序章"), ("LEVEL", "node"), ("TITLE", "B")]),
            row(2, &[("CHAPTER", "終章"), ("TITLE", "C")]),
        ];
        let chapters = aggregate(&rows, &fields());
        assert_eq!(chapters.len(), 2);

        let prologue = chapters.get("序章").unwrap();
        assert_eq!(prologue.total, 2);
        assert_eq!(prologue.outer_rows, vec![rows[0].clone()]);
        assert_eq!(prologue.node_rows, vec![rows[1].clone()]);
        assert_eq!(prologue.hero().text("TITLE"), "A");

        let finale = chapters.get("終章").unwrap();
        assert_eq!(finale.total, 1);
        assert_eq!(finale.hero().text("TITLE"), "C");

        let names: Vec<_> = chapters.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["序章", "終章"]);
    }

    #[test]
    fn hero_falls_back_to_first_row() {
        let rows = vec![
            row(0, &[("CHAPTER", "X"), ("LEVEL", "NODE"), ("TITLE", "n1")]),
            row(1, &[("CHAPTER", "X"), ("LEVEL", "node"), ("TITLE", "n2")]),
        ];
        let chapters = aggregate(&rows, &fields());
        let x = chapters.get("X").unwrap();
        assert!(x.outer_rows.is_empty());
        assert_eq!(x.node_rows.len(), 2);
        assert_eq!(x.hero().index, 0);
    }

    #[test]
    fn level_without_resolved_column_is_outer() {
        let mut map = fields();
        map.level = None;
        let rows = vec![row(0, &[("CHAPTER", "X"), ("LEVEL", "node")])];
        let chapters = aggregate(&rows, &map);
        assert_eq!(chapters.get("X").unwrap().outer_rows.len(), 1);
    }

    #[test]
    fn empty_chapter_names_are_unnamed_and_names_are_trimmed() {
        let rows = vec![
            row(0, &[("CHAPTER", "")]),
            row(1, &[("TITLE", "no chapter")]),
            row(2, &[("CHAPTER", " 序章 ")]),
            row(3, &[("CHAPTER", "序章")]),
        ];
        let chapters = aggregate(&rows, &fields());
        assert_eq!(chapters.get(UNNAMED_CHAPTER).unwrap().total, 2);
        assert_eq!(chapters.get("序章").unwrap().total, 2);
    }

    #[test]
    fn whitespace_only_chapter_name_trims_to_empty() {
        let rows = vec![
            row(0, &[("CHAPTER", "   ")]),
            row(1, &[("CHAPTER", "\t")]),
        ];
        let chapters = aggregate(&rows, &fields());
        let names: Vec<_> = chapters.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec![""]);
        assert_eq!(chapters.get("").unwrap().total, 2);
        assert!(chapters.get(UNNAMED_CHAPTER).is_none());
    }

    #[test]
    fn search_text_leaves_out_origin_index() {
        // 只搜索列值，不含 __idx
        let rows = vec![row(7, &[("CHAPTER", "X"), ("TITLE", "abc")])];
        let chapters = aggregate(&rows, &fields());
        let chapter = chapters.get("X").unwrap();
        assert_eq!(chapter.search_text(), "xabc");
        assert!(!chapter.matches("7"));
    }

    #[test]
    fn differently_cased_names_stay_distinct() {
        let rows = vec![
            row(0, &[("CHAPTER", "Intro")]),
            row(1, &[("CHAPTER", "intro")]),
        ];
        assert_eq!(aggregate(&rows, &fields()).len(), 2);
    }

    #[test]
    fn search_text_strips_all_whitespace() {
        let rows = vec![row(
            0,
            &[("CHAPTER", "天"), ("TITLE", "飛 龍 在天"), ("BODY", "Hello\tWorld")],
        )];
        let chapters = aggregate(&rows, &fields());
        let chapter = chapters.get("天").unwrap();
        assert_eq!(chapter.search_text(), "天飛龍在天helloworld");
        assert!(chapter.matches("龍在"));
        assert!(chapter.matches("oworld"));
    }

    #[test]
    fn totals_add_up() {
        let rows: Vec<_> = (0..50)
            .map(|i| {
                let chapter = format!("c{}", i % 7);
                let level = if i % 3 == 0 { "node" } else { "" };
                row(i, &[("CHAPTER", chapter.as_str()), ("LEVEL", level)])
            })
            .collect();
        let chapters = aggregate(&rows, &fields());
        assert_eq!(chapters.row_count(), rows.len());
        for chapter in &chapters {
            assert_eq!(chapter.total, chapter.outer_rows.len() + chapter.node_rows.len());
            assert_eq!(chapter.total, chapter.rows.len());
            assert!(chapter.rows.iter().any(|r| **r == *chapter.hero()));
            if let Some(first) = chapter.outer_rows.first() {
                assert_eq!(**first, *chapter.hero());
            }
        }
    }
}
