use std::{collections::HashMap, path::PathBuf, time::Duration};

use anyhow::Result;
use regex::Regex;
use serde::Deserialize;
use url::Url;

use crate::cache::DEFAULT_CACHE_KEY;
use crate::fields::FieldCandidates;

static CONFIG_FILE: &str = "config";

static ENV_PREFIX: &str = "CARD_FETCH";

static DEFAULT_URL_TEMPLATE: &str =
    "https://docs.google.com/spreadsheets/d/{sheet_id}/gviz/tq?tqx=out:json&gid={gid}&tq=select *";

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub sheet_id: String,
    pub gid: u64,
    pub url_template: String,
    /// 图片路径前缀
    pub image_dir: String,
    /// 查找本地图片时的根目录
    pub image_root: PathBuf,
    pub fields: FieldCandidates,
    pub cache: CacheConfig,
    pub fetch_timeout_secs: u64,
    pub render_batch_size: usize,
    pub skeleton_count: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            sheet_id: "1CF9hUYU5Kowvv2j8Um3pJ1P21MHnoCCvIZwFhry7vps".to_string(),
            gid: 0,
            url_template: DEFAULT_URL_TEMPLATE.to_string(),
            image_dir: "image/".to_string(),
            image_root: PathBuf::from("."),
            fields: FieldCandidates::default(),
            cache: CacheConfig::default(),
            fetch_timeout_secs: 8,
            render_batch_size: 10,
            skeleton_count: 6,
        }
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct CacheConfig {
    pub dir: PathBuf,
    pub key: String,
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(".cache"),
            key: DEFAULT_CACHE_KEY.to_string(),
            ttl_secs: 5 * 60,
        }
    }
}

impl AppConfig {
    /// 读取工作目录下可选的 config.toml，环境变量 CARD_FETCH__* 可覆盖
    pub fn load() -> Result<Self> {
        config::Config::builder()
            .add_source(
                config::File::with_name(CONFIG_FILE)
                    .format(config::FileFormat::Toml)
                    .required(false),
            )
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?
            .try_deserialize()
            .map_err(|e| anyhow::anyhow!("配置文件反序列化失败: {}", e))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        config::Config::builder()
            .add_source(config::File::from_str(content, config::FileFormat::Toml))
            .build()?
            .try_deserialize()
            .map_err(|e| anyhow::anyhow!("配置反序列化失败: {}", e))
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.ttl_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn dataset_url(&self) -> Result<Url> {
        let mut values = HashMap::new();
        values.insert("sheet_id", self.sheet_id.clone());
        values.insert("gid", self.gid.to_string());

        let url = self.replace_params(&values)?;
        Url::parse(&url).map_err(|e| anyhow::anyhow!("数据源地址无效 {}: {}", url, e))
    }

    fn replace_params(&self, values: &HashMap<&str, String>) -> Result<String> {
        let re = Regex::new(r"\{(\w+)\}")?;
        if let Some(caps) = re
            .captures_iter(&self.url_template)
            .find(|caps| !values.contains_key(&caps[1]))
        {
            anyhow::bail!("地址模板中有未知参数: {}", &caps[0]);
        }
        Ok(re
            .replace_all(&self.url_template, |caps: &regex::Captures| {
                values.get(&caps[1]).cloned().unwrap_or_default()
            })
            .to_string())
    }
}
