use thiserror::Error;

pub static TIMEOUT_MESSAGE: &str = "載入超時，請檢查網路連線";
pub static GENERIC_MESSAGE: &str = "資料載入失敗，請稍後再試";

/// 数据加载过程中可能出现的错误
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("加载超时 ({0}秒)")]
    Timeout(u64),
    #[error("网络请求失败: {0}")]
    Network(String),
    #[error("响应解析失败: {0}")]
    Parse(String),
    #[error("数据源响应错误: status={0}")]
    Remote(String),
}

impl LoadError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, LoadError::Timeout(_))
    }

    /// 面向用户的提示，只区分超时与其他错误
    pub fn user_message(&self) -> &'static str {
        if self.is_timeout() {
            TIMEOUT_MESSAGE
        } else {
            GENERIC_MESSAGE
        }
    }
}

impl From<reqwest::Error> for LoadError {
    fn from(e: reqwest::Error) -> Self {
        LoadError::Network(e.to_string())
    }
}

impl From<serde_json::Error> for LoadError {
    fn from(e: serde_json::Error) -> Self {
        LoadError::Parse(e.to_string())
    }
}

/// 缓存读写错误，不会传递给调用方
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("缓存读写失败: {0}")]
    Io(#[from] std::io::Error),
    #[error("缓存序列化失败: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("缓存空间不足: 需要 {needed} 字节，上限 {limit}")]
    Quota { needed: usize, limit: usize },
}
