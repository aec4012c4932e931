use std::time::Duration;

/// Expiration table and size ceiling for the document cache.
#[derive(Debug, Clone)]
pub struct CachePolicy {
    /// HTML and everything not classified as a static asset
    pub document_ttl: Duration,
    /// Style sheets, scripts and images
    pub static_asset_ttl: Duration,
    pub max_size: u64,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            document_ttl: Duration::from_secs(3600),     // 1 hour
            static_asset_ttl: Duration::from_secs(86400), // 24 hours
            max_size: 50 * 1024 * 1024,                   // 50MB
        }
    }
}

impl CachePolicy {
    pub fn with_document_ttl(mut self, ttl: Duration) -> Self {
        self.document_ttl = ttl;
        self
    }

    pub fn with_static_asset_ttl(mut self, ttl: Duration) -> Self {
        self.static_asset_ttl = ttl;
        self
    }

    pub fn with_max_size(mut self, max_size: u64) -> Self {
        self.max_size = max_size;
        self
    }

    pub fn ttl_for(&self, content_type: &str) -> Duration {
        if is_static_asset(content_type) {
            self.static_asset_ttl
        } else {
            self.document_ttl
        }
    }
}

/// 判断是否为静态资源 (CSS / JS / 图片). 忽略参数部分和大小写
pub fn is_static_asset(content_type: &str) -> bool {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    matches!(
        mime.as_str(),
        "text/css"
            | "text/javascript"
            | "text/ecmascript"
            | "application/javascript"
            | "application/x-javascript"
            | "application/ecmascript"
    ) || mime.starts_with("image/")
}
