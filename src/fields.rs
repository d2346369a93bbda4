use std::fmt;

use serde::{Deserialize, Serialize};

use crate::row::Row;

/// 语义角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Title,
    Body,
    Cover,
    Chapter,
    Level,
}

impl Role {
    pub const ALL: [Role; 5] = [
        Role::Title,
        Role::Body,
        Role::Cover,
        Role::Chapter,
        Role::Level,
    ];

    /// 所有候选都匹配失败时使用的列名，level 没有默认值
    pub fn default_label(self) -> Option<&'static str> {
        match self {
            Role::Title => Some("TITLE"),
            Role::Body => Some("BODY"),
            Role::Cover => Some("COVER_BG_KEY"),
            Role::Chapter => Some("CHAPTER"),
            Role::Level => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::Title => "title",
            Role::Body => "body",
            Role::Cover => "cover",
            Role::Chapter => "chapter",
            Role::Level => "level",
        };
        f.write_str(name)
    }
}

/// 每个角色按优先级排列的候选列名
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldCandidates {
    pub title: Vec<String>,
    pub body: Vec<String>,
    pub cover: Vec<String>,
    pub chapter: Vec<String>,
    pub level: Vec<String>,
}

impl Default for FieldCandidates {
    fn default() -> Self {
        let list = |names: &[&str]| names.iter().map(|s| s.to_string()).collect();
        Self {
            title: list(&["TITLE", "標題"]),
            body: list(&["BODY", "內容"]),
            cover: list(&["COVER_BG_KEY", "封面"]),
            chapter: list(&["CHAPTER", "章節"]),
            level: list(&["LEVEL", "層級"]),
        }
    }
}

impl FieldCandidates {
    pub fn for_role(&self, role: Role) -> &[String] {
        match role {
            Role::Title => &self.title,
            Role::Body => &self.body,
            Role::Cover => &self.cover,
            Role::Chapter => &self.chapter,
            Role::Level => &self.level,
        }
    }
}

/// 角色到实际列名的映射，每次加载数据后计算一次
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMap {
    pub title: String,
    pub body: String,
    pub cover: String,
    pub chapter: String,
    #[serde(default)]
    pub level: Option<String>,
}

impl FieldMap {
    pub fn label(&self, role: Role) -> Option<&str> {
        match role {
            Role::Title => Some(&self.title),
            Role::Body => Some(&self.body),
            Role::Cover => Some(&self.cover),
            Role::Chapter => Some(&self.chapter),
            Role::Level => self.level.as_deref(),
        }
    }
}

impl Default for FieldMap {
    fn default() -> Self {
        resolve_labels(&[], &FieldCandidates::default())
    }
}

/// 只看第一行来决定 FieldMap，没有行时全部使用默认值
pub fn resolve(sample: Option<&Row>, candidates: &FieldCandidates) -> FieldMap {
    let labels: Vec<&str> = sample.map(|r| r.labels().collect()).unwrap_or_default();
    resolve_labels(&labels, candidates)
}

pub fn resolve_labels(labels: &[&str], candidates: &FieldCandidates) -> FieldMap {
    let pick = |role: Role| -> Option<String> {
        match_label(labels, candidates.for_role(role))
            .or_else(|| role.default_label())
            .map(str::to_owned)
    };

    FieldMap {
        title: pick(Role::Title).unwrap_or_default(),
        body: pick(Role::Body).unwrap_or_default(),
        cover: pick(Role::Cover).unwrap_or_default(),
        chapter: pick(Role::Chapter).unwrap_or_default(),
        level: pick(Role::Level),
    }
}

/// 对每个候选依次尝试：精确匹配、忽略大小写匹配、忽略大小写的子串匹配
pub fn match_label<'a>(labels: &[&'a str], candidates: &[String]) -> Option<&'a str> {
    for cand in candidates {
        if let Some(label) = labels.iter().copied().find(|l| *l == cand.as_str()) {
            return Some(label);
        }

        let lower = cand.to_lowercase();
        // 小写相同的列名，后出现的覆盖先出现的
        if let Some(label) = labels.iter().copied().rev().find(|l| l.to_lowercase() == lower) {
            return Some(label);
        }

        if let Some(label) = labels
            .iter()
            .copied()
            .find(|l| l.to_lowercase().contains(&lower))
        {
            return Some(label);
        }
    }
    None
}
