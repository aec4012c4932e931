use thiserror::Error;

/// 键值存储的通用错误
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Store backend error: {0}")]
    Backend(String),
}

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Cache read failed for key {key}: {source}")]
    Read {
        key: String,
        #[source]
        source: StoreError,
    },
    #[error("Cache write failed for {url}: {source}")]
    Write {
        url: String,
        #[source]
        source: StoreError,
    },
    #[error("Cache delete failed for {url}: {source}")]
    Delete {
        url: String,
        #[source]
        source: StoreError,
    },
    #[error("Cache clear failed: {0}")]
    Clear(#[source] StoreError),
    #[error("Cache sweep failed: {0}")]
    Sweep(#[source] StoreError),
    #[error("Network query error: {0}")]
    NetworkQuery(String),
    #[error("Fetch error: {0}")]
    Fetch(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
