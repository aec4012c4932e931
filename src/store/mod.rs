//! Process-wide string key/value store shared by the cache and the host shell.

use async_trait::async_trait;

use crate::error::StoreError;

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// 读取键值, 不存在时返回 None
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// 写入键值, 覆盖旧值
    async fn set(&self, key: &str, value: String) -> StoreResult<()>;

    /// 删除键, 不存在时不报错
    async fn delete(&self, key: &str) -> StoreResult<()>;

    /// 列出所有键
    async fn list_keys(&self) -> StoreResult<Vec<String>>;

    /// 批量删除
    async fn delete_many(&self, keys: &[String]) -> StoreResult<()> {
        for key in keys {
            self.delete(key).await?;
        }
        Ok(())
    }
}
