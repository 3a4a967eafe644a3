use crate::utils::error::Result;
use async_trait::async_trait;
use scraper::Html;

/// 一次請求取回的頁面；只保存原始內容，解析在同步程式碼中進行
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub url: String,
    pub body: String,
}

impl Page {
    pub fn new(url: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            body: body.into(),
        }
    }

    pub fn document(&self) -> Html {
        Html::parse_document(&self.body)
    }
}

#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn get(&self, url: &str) -> Result<Page>;

    /// POST `application/x-www-form-urlencoded` with the given referer
    async fn post_form(&self, url: &str, fields: &[(String, String)], referer: &str)
        -> Result<Page>;
}
