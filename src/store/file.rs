use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::{debug, warn};

use super::{KeyValueStore, StoreResult};
use crate::error::StoreError;

const TMP_SUFFIX: &str = ".tmp";

/// Directory-backed store. Each key lives in its own file, named by the hex
/// encoding of the key bytes; writes go through a temp file and a rename.
#[derive(Debug, Clone)]
pub struct FileStore {
    base_path: PathBuf,
}

impl FileStore {
    pub async fn open<P: AsRef<Path>>(base_path: P) -> StoreResult<Self> {
        let base_path = base_path.as_ref().to_path_buf();
        fs::create_dir_all(&base_path).await?;
        debug!("Opened file store at {:?}", base_path);
        Ok(Self { base_path })
    }

    fn key_path(&self, key: &str) -> PathBuf {
        self.base_path.join(hex::encode(key.as_bytes()))
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        match fs::read_to_string(self.key_path(key)).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    async fn set(&self, key: &str, value: String) -> StoreResult<()> {
        let path = self.key_path(key);
        let mut tmp = path.clone().into_os_string();
        tmp.push(TMP_SUFFIX);
        let tmp = PathBuf::from(tmp);

        fs::write(&tmp, value.as_bytes()).await?;
        fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        match fs::remove_file(self.key_path(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    async fn list_keys(&self) -> StoreResult<Vec<String>> {
        let mut keys = Vec::new();
        let mut read_dir = fs::read_dir(&self.base_path).await?;

        while let Some(entry) = read_dir.next_entry().await? {
            let name = entry.file_name();
            let name = match name.to_str() {
                Some(name) if !name.ends_with(TMP_SUFFIX) => name,
                _ => continue,
            };

            // 忽略不是本存储写入的文件
            match hex::decode(name).ok().and_then(|bytes| String::from_utf8(bytes).ok()) {
                Some(key) => keys.push(key),
                None => warn!("Skipping foreign file in store: {:?}", entry.path()),
            }
        }

        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::test;

    #[test]
    async fn test_file_store_roundtrip_and_persistence() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(temp_dir.path()).await.unwrap();

        store.set("@ns:entry:1", "hello".into()).await.unwrap();
        store.set("other/key with spaces", "world".into()).await.unwrap();
        assert_eq!(store.get("@ns:entry:1").await.unwrap().as_deref(), Some("hello"));
        assert!(store.get("missing").await.unwrap().is_none());

        // 重新打开后数据仍在
        let reopened = FileStore::open(temp_dir.path()).await.unwrap();
        let mut keys = reopened.list_keys().await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["@ns:entry:1".to_string(), "other/key with spaces".to_string()]);
    }

    #[test]
    async fn test_file_store_delete() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(temp_dir.path()).await.unwrap();

        store.set("a", "1".into()).await.unwrap();
        store.set("b", "2".into()).await.unwrap();
        store.delete("a").await.unwrap();
        store.delete("a").await.unwrap();
        assert!(store.get("a").await.unwrap().is_none());

        store.delete_many(&["b".to_string()]).await.unwrap();
        assert!(store.list_keys().await.unwrap().is_empty());
    }

    #[test]
    async fn test_list_keys_skips_foreign_files() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(temp_dir.path()).await.unwrap();
        std::fs::write(temp_dir.path().join("README.txt"), "not a key").unwrap();

        store.set("k", "v".into()).await.unwrap();
        assert_eq!(store.list_keys().await.unwrap(), vec!["k".to_string()]);
    }
}
