use async_trait::async_trait;
use bytes::Bytes;
use std::path::PathBuf;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::storage::StorageProvider;

/// Local file system bucket
pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    /// Keys are flat object ids; anything that could escape the bucket is refused
    fn get_full_path(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty() || key.contains('/') || key.contains('\\') || key.contains("..") {
            return Err(AppError::Storage(format!("Invalid object key: {}", key)));
        }
        Ok(self.base_path.join(key))
    }
}

#[async_trait]
impl StorageProvider for LocalStorage {
    async fn put(&self, key: &str, data: Bytes) -> Result<()> {
        let full_path = self.get_full_path(key)?;
        fs::create_dir_all(&self.base_path).await?;

        let mut file = fs::File::create(&full_path).await?;
        file.write_all(&data).await?;
        file.flush().await?;

        tracing::debug!("Saved object to {:?}", full_path);
        Ok(())
    }

    async fn put_file(&self, key: &str, local_path: &std::path::Path) -> Result<()> {
        let full_path = self.get_full_path(key)?;
        fs::create_dir_all(&self.base_path).await?;

        fs::copy(local_path, &full_path).await?;
        tracing::debug!("Copied object from {:?} to {:?}", local_path, full_path);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Bytes> {
        let full_path = self.get_full_path(key)?;

        let data = fs::read(&full_path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AppError::NotFound("File content not found".to_string())
            } else {
                AppError::Storage(format!("Failed to read object {}: {}", key, e))
            }
        })?;

        Ok(Bytes::from(data))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let full_path = self.get_full_path(key)?;

        match fs::remove_file(&full_path).await {
            Ok(()) => {
                tracing::debug!("Deleted object {:?}", full_path);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::Storage(format!("Failed to delete object {}: {}", key, e))),
        }
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let full_path = self.get_full_path(key)?;
        Ok(fs::try_exists(&full_path).await?)
    }

    fn storage_type(&self) -> &'static str {
        "local"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_get_delete() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path().join("bucket"));

        storage.put("obj1", Bytes::from_static(b"hello")).await.unwrap();
        assert!(storage.exists("obj1").await.unwrap());
        assert_eq!(storage.get("obj1").await.unwrap(), Bytes::from_static(b"hello"));

        storage.delete("obj1").await.unwrap();
        assert!(!storage.exists("obj1").await.unwrap());
        // deleting twice is fine
        storage.delete("obj1").await.unwrap();
    }

    #[tokio::test]
    async fn test_put_file_copies() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("upload.tmp");
        tokio::fs::write(&src, b"payload").await.unwrap();

        let storage = LocalStorage::new(dir.path().join("bucket"));
        storage.put_file("obj2", &src).await.unwrap();
        assert_eq!(storage.get("obj2").await.unwrap(), Bytes::from_static(b"payload"));
        assert!(src.exists());
    }

    #[tokio::test]
    async fn test_missing_object_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());
        assert!(matches!(storage.get("nope").await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_rejects_traversal_keys() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());
        for key in ["../etc/passwd", "a/b", "", "..", "a\\b"] {
            assert!(
                matches!(storage.get(key).await, Err(AppError::Storage(_))),
                "key {:?} accepted",
                key
            );
        }
    }
}
