pub mod local;
pub mod provider;

pub use local::*;
pub use provider::*;

use std::sync::Arc;

use crate::config::StorageConfig;

/// Build the bucket provider for the configured backend
pub fn from_config(config: &StorageConfig) -> Arc<dyn StorageProvider> {
    let provider = LocalStorage::new(&config.local_path);
    tracing::info!(
        "Using {} object storage at {}",
        provider.storage_type(),
        config.local_path
    );
    Arc::new(provider)
}
