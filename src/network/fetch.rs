use std::time::Duration;

use bytes::Bytes;
use hyper::client::HttpConnector;
use hyper::header::{CONTENT_TYPE, LOCATION};
use hyper::{Body, Client, Uri};
use hyper_tls::HttpsConnector;
use tracing::{debug, info};
use url::Url;

use super::retry::with_retry;
use crate::error::CacheError;
use crate::Result;

const MAX_REDIRECTS: usize = 5;

#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// URL after following redirects
    pub url: String,
    pub content_type: String,
    pub body: String,
}

/// Fetches live pages for the shell.
#[derive(Debug, Clone)]
pub struct PageFetcher {
    client: Client<HttpsConnector<HttpConnector>, Body>,
    max_retries: u32,
    retry_delay: Duration,
    timeout: Duration,
}

impl PageFetcher {
    pub fn new(max_retries: u32, timeout: Duration) -> Self {
        Self {
            client: Client::builder().build(HttpsConnector::new()),
            max_retries,
            retry_delay: Duration::from_secs(1),
            timeout,
        }
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub async fn fetch(&self, url: &str) -> Result<FetchedPage> {
        info!("Fetching live page: {}", url);
        let page = with_retry(|| self.fetch_once(url), self.max_retries, self.retry_delay).await?;
        debug!("Fetched {} bytes from {}", page.body.len(), page.url);
        Ok(page)
    }

    async fn fetch_once(&self, url: &str) -> Result<FetchedPage> {
        let mut current = Url::parse(url).map_err(|e| CacheError::Fetch(e.to_string()))?;

        for _ in 0..=MAX_REDIRECTS {
            let uri: Uri = current
                .as_str()
                .parse()
                .map_err(|e: hyper::http::uri::InvalidUri| CacheError::Fetch(e.to_string()))?;

            let resp = tokio::time::timeout(self.timeout, self.client.get(uri))
                .await
                .map_err(|_| CacheError::Fetch(format!("timed out fetching {}", current)))?
                .map_err(|e| CacheError::Fetch(e.to_string()))?;

            let status = resp.status();
            if status.is_redirection() {
                let location = resp
                    .headers()
                    .get(LOCATION)
                    .and_then(|v| v.to_str().ok())
                    .ok_or_else(|| CacheError::Fetch(format!("redirect without location from {}", current)))?;
                // 相对地址按当前 URL 解析
                current = current
                    .join(location)
                    .map_err(|e| CacheError::Fetch(e.to_string()))?;
                debug!("Following redirect to {}", current);
                continue;
            }

            if !status.is_success() {
                return Err(CacheError::Fetch(format!("HTTP error: {}", status)));
            }

            let content_type = resp
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("text/html")
                .to_string();

            let body: Bytes = hyper::body::to_bytes(resp.into_body())
                .await
                .map_err(|e| CacheError::Fetch(e.to_string()))?;

            return Ok(FetchedPage {
                url: current.to_string(),
                content_type,
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        Err(CacheError::Fetch(format!("too many redirects from {}", url)))
    }
}
