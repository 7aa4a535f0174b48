use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;

/// Object storage keyed by bucket file id
#[async_trait]
pub trait StorageProvider: Send + Sync {
    /// Upload data to storage
    async fn put(&self, key: &str, data: Bytes) -> Result<()>;

    /// Upload file from local path
    /// Default implementation reads file to memory and calls put (not efficient for large files)
    async fn put_file(&self, key: &str, local_path: &std::path::Path) -> Result<()> {
        let data = tokio::fs::read(local_path).await?;
        self.put(key, Bytes::from(data)).await
    }

    /// Download data from storage
    async fn get(&self, key: &str) -> Result<Bytes>;

    /// Delete data from storage. Missing objects are not an error.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Check if an object exists
    async fn exists(&self, key: &str) -> Result<bool>;

    /// Get the storage type name
    fn storage_type(&self) -> &'static str;
}
