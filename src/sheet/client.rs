use std::future::Future;

use reqwest::Client;
use tracing::{info, instrument};
use url::Url;

use crate::error::LoadError;

/// 提供原始响应文本的数据源
pub trait SheetSource {
    fn fetch(&self) -> impl Future<Output = Result<String, LoadError>> + Send;
}

/// 通过 gviz 接口读取 Google Sheets
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: Client,
    url: Url,
}

impl HttpSource {
    pub fn new(url: Url) -> Self {
        Self {
            client: Client::new(),
            url,
        }
    }
}

impl SheetSource for HttpSource {
    #[instrument(skip_all, fields(url = %self.url))]
    async fn fetch(&self) -> Result<String, LoadError> {
        info!("正在请求数据");
        let response = self.client.get(self.url.clone()).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(LoadError::Network(format!("HTTP {}", status)));
        }

        let text = response.text().await?;
        info!("收到 {} 字节", text.len());
        Ok(text)
    }
}
