use crate::config::HttpConfig;
use crate::core::{Page, PageFetcher};
use crate::utils::error::{HspError, Result};
use async_trait::async_trait;
use reqwest::{header, Client, RequestBuilder};
use std::time::Duration;

/// reqwest 實作的頁面抓取器：逾時、暫時性錯誤重試與指數退避
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    retry_attempts: u32,
    retry_delay: Duration,
}

impl HttpFetcher {
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(config.user_agent.as_str())
            .build()?;

        Ok(Self {
            client,
            retry_attempts: config.retry_attempts,
            retry_delay: Duration::from_millis(config.retry_delay_ms),
        })
    }

    /// 第 n 次重試前等待 retry_delay * 2^(n-1)
    fn backoff(&self, retry: u32) -> Duration {
        self.retry_delay
            .saturating_mul(2u32.saturating_pow(retry.saturating_sub(1)))
    }

    async fn send_with_retry<B>(
        &self,
        method: &str,
        url: &str,
        retryable: fn(&HspError) -> bool,
        build: B,
    ) -> Result<Page>
    where
        B: Fn() -> RequestBuilder + Send + Sync,
    {
        let mut retry = 0;
        loop {
            tracing::debug!("📡 {} {} (attempt {})", method, url, retry + 1);
            match self.send_once(url, build()).await {
                Ok(page) => {
                    tracing::debug!("📥 {} {}: {} bytes", method, url, page.body.len());
                    return Ok(page);
                }
                Err(e) if retryable(&e) && retry < self.retry_attempts => {
                    retry += 1;
                    let delay = self.backoff(retry);
                    tracing::warn!(
                        "🔄 {} {} failed: {}; retry {}/{} in {:?}",
                        method,
                        url,
                        e,
                        retry,
                        self.retry_attempts,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn send_once(&self, url: &str, request: RequestBuilder) -> Result<Page> {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(HspError::HttpStatusError {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let final_url = response.url().to_string();
        let body = response.text().await?;
        Ok(Page::new(final_url, body))
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn get(&self, url: &str) -> Result<Page> {
        self.send_with_retry("GET", url, HspError::is_retryable, || self.client.get(url))
            .await
    }

    async fn post_form(
        &self,
        url: &str,
        fields: &[(String, String)],
        referer: &str,
    ) -> Result<Page> {
        self.send_with_retry("POST", url, HspError::is_safe_to_resend, || {
            self.client
                .post(url)
                .header(header::REFERER, referer)
                .form(fields)
        })
        .await
    }
}
