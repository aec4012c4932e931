use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::cache::CachePolicy;
use crate::error::CacheError;
use crate::Result;
use crate::utils::is_valid_namespace;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub cache: CacheSettings,
    pub network: NetworkSettings,
    pub shell: ShellSettings,
    pub logging: LoggingSettings,
    pub error_log: ErrorLogSettings,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub namespace: String,
    pub max_size_bytes: u64,
    pub document_ttl_secs: u64,
    pub static_asset_ttl_secs: u64,
    pub sweep_interval_secs: Option<u64>,
    pub store_path: PathBuf,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct NetworkSettings {
    pub probe_url: String,
    pub probe_timeout_secs: u64,
    pub poll_interval_secs: u64,
    pub max_retries: u32,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ShellSettings {
    pub primary_url: String,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub filter: String,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ErrorLogSettings {
    pub capacity: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            namespace: "@offline_cache:".to_string(),
            max_size_bytes: 50 * 1024 * 1024, // 50MB
            document_ttl_secs: 3600,
            static_asset_ttl_secs: 86400,
            sweep_interval_secs: None,
            store_path: "./offline_cache".into(),
        }
    }
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            probe_url: "http://connectivitycheck.gstatic.com/generate_204".to_string(),
            probe_timeout_secs: 5,
            poll_interval_secs: 10,
            max_retries: 3,
        }
    }
}

impl Default for ShellSettings {
    fn default() -> Self {
        Self {
            primary_url: "https://example.com/".to_string(),
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

impl Default for ErrorLogSettings {
    fn default() -> Self {
        Self { capacity: 50 }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        // 首先尝试从环境变量加载
        if let Ok(config_path) = std::env::var("CONFIG_PATH") {
            return Self::from_file(&config_path);
        }

        // 否则使用默认配置
        Ok(Self::default())
    }

    pub fn from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(content).map_err(|e| CacheError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.cache.max_size_bytes == 0 {
            return Err(CacheError::Config("cache.max_size_bytes must be > 0".into()));
        }
        if self.cache.document_ttl_secs == 0 || self.cache.static_asset_ttl_secs == 0 {
            return Err(CacheError::Config("cache TTLs must be > 0".into()));
        }
        if !is_valid_namespace(&self.cache.namespace) {
            return Err(CacheError::Config(
                "cache.namespace must be non-empty and end with ':'".into(),
            ));
        }
        if self.cache.sweep_interval_secs == Some(0) {
            return Err(CacheError::Config("cache.sweep_interval_secs must be > 0".into()));
        }
        if self.error_log.capacity == 0 {
            return Err(CacheError::Config("error_log.capacity must be > 0".into()));
        }
        if self.network.poll_interval_secs == 0 {
            return Err(CacheError::Config("network.poll_interval_secs must be > 0".into()));
        }
        url::Url::parse(&self.shell.primary_url)
            .map_err(|e| CacheError::Config(format!("shell.primary_url: {}", e)))?;
        url::Url::parse(&self.network.probe_url)
            .map_err(|e| CacheError::Config(format!("network.probe_url: {}", e)))?;
        Ok(())
    }

    pub fn cache_policy(&self) -> CachePolicy {
        CachePolicy::default()
            .with_document_ttl(Duration::from_secs(self.cache.document_ttl_secs))
            .with_static_asset_ttl(Duration::from_secs(self.cache.static_asset_ttl_secs))
            .with_max_size(self.cache.max_size_bytes)
    }
}
