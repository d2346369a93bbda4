use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use regex::Regex;
use tracing::debug;

/// 候选扩展名，按尝试顺序排列
pub const EXTENSIONS: [&str; 5] = ["webp", "jpg", "png", "jpeg", "gif"];

// 与 encodeURIComponent 相同的保留字符
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

static EXTENSION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\.[^/.]+$").unwrap_or_else(|e| panic!("扩展名正则编译失败: {}", e))
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImageSize {
    #[default]
    Card,
    Large,
}

impl ImageSize {
    pub fn from_large(is_large: bool) -> Self {
        if is_large { ImageSize::Large } else { ImageSize::Card }
    }

    pub fn class_name(self) -> &'static str {
        match self {
            ImageSize::Card => "card__image",
            ImageSize::Large => "modal__image",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageCandidates {
    /// 没有可用的图片，调用方显示占位符
    NoImage,
    Paths {
        stem: String,
        paths: Vec<String>,
        size: ImageSize,
    },
}

impl ImageCandidates {
    pub fn paths(&self) -> &[String] {
        match self {
            ImageCandidates::NoImage => &[],
            ImageCandidates::Paths { paths, .. } => paths,
        }
    }

    pub fn is_no_image(&self) -> bool {
        matches!(self, ImageCandidates::NoImage)
    }

    pub fn cursor(&self) -> FallbackCursor<'_> {
        FallbackCursor::new(self.paths())
    }
}

#[derive(Debug, Clone)]
pub struct ImageResolver {
    image_dir: String,
}

impl ImageResolver {
    pub fn new(image_dir: impl Into<String>) -> Self {
        Self {
            image_dir: image_dir.into(),
        }
    }

    pub fn resolve(&self, cover_key: &str, is_large: bool) -> ImageCandidates {
        let Some(stem) = normalize_filename(cover_key) else {
            return ImageCandidates::NoImage;
        };
        let paths = EXTENSIONS
            .iter()
            .map(|ext| format!("{}{}.{}", self.image_dir, stem, ext))
            .collect();
        ImageCandidates::Paths {
            stem,
            paths,
            size: ImageSize::from_large(is_large),
        }
    }
}

/// 取出纯文件名：去掉开头的斜线、查询串、片段、路径和扩展名，再统一编码
pub fn normalize_filename(cover_key: &str) -> Option<String> {
    if cover_key.is_empty() {
        return None;
    }
    let base = cover_key.trim_start_matches('/');
    let base = base.split('?').next().unwrap_or_default();
    let base = base.split('#').next().unwrap_or_default();
    let filename = base.rsplit('/').next().unwrap_or_default();
    let filename = EXTENSION_RE.replace(filename, "");

    // 先解码再编码，避免重复编码；无法解码时保留原文
    let decoded = percent_decode_str(&filename)
        .decode_utf8()
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| filename.to_string());
    let encoded = utf8_percent_encode(&decoded, COMPONENT).to_string();

    if encoded.is_empty() { None } else { Some(encoded) }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackState {
    Pending(usize),
    Exhausted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackStep<'a> {
    /// 改为加载下一个候选
    Retry(&'a str),
    /// 候选已用完，显示占位符
    Placeholder,
}

/// 单个图片元素的回退状态，每次加载失败前进一格
#[derive(Debug, Clone)]
pub struct FallbackCursor<'a> {
    paths: &'a [String],
    state: FallbackState,
}

impl<'a> FallbackCursor<'a> {
    pub fn new(paths: &'a [String]) -> Self {
        let state = if paths.is_empty() {
            FallbackState::Exhausted
        } else {
            FallbackState::Pending(0)
        };
        Self { paths, state }
    }

    pub fn state(&self) -> FallbackState {
        self.state
    }

    pub fn current(&self) -> Option<&'a str> {
        match self.state {
            FallbackState::Pending(i) => self.paths.get(i).map(String::as_str),
            FallbackState::Exhausted => None,
        }
    }

    pub fn on_error(&mut self) -> FallbackStep<'a> {
        let next = match self.state {
            FallbackState::Pending(i) => i + 1,
            FallbackState::Exhausted => return FallbackStep::Placeholder,
        };
        match self.paths.get(next) {
            Some(path) => {
                self.state = FallbackState::Pending(next);
                FallbackStep::Retry(path.as_str())
            }
            None => {
                self.state = FallbackState::Exhausted;
                FallbackStep::Placeholder
            }
        }
    }
}

/// 按候选顺序在本地目录中查找第一个存在的文件
pub async fn probe_local(root: &Path, candidates: &ImageCandidates) -> Option<PathBuf> {
    let mut cursor = candidates.cursor();
    let mut current = cursor.current();
    while let Some(path) = current {
        let decoded = percent_decode_str(path).decode_utf8_lossy();
        let full = root.join(decoded.as_ref());
        if tokio::fs::try_exists(&full).await.unwrap_or(false) {
            return Some(full);
        }
        debug!("图片不存在，尝试下一个: {}", full.display());
        current = match cursor.on_error() {
            FallbackStep::Retry(next) => Some(next),
            FallbackStep::Placeholder => None,
        };
    }
    None
}
