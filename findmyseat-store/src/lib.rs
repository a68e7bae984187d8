pub mod app_config;
pub mod memory_repo;
pub mod redis_repo;

pub use memory_repo::MemoryStore;
pub use redis_repo::RedisStore;

use app_config::{StoreBackend, StoreConfig};
use findmyseat_core::{LedgerStore, StoreError};
use std::sync::Arc;

/// Opens the store selected in configuration.
pub async fn connect(config: &StoreConfig) -> Result<Arc<dyn LedgerStore>, StoreError> {
    match config.backend {
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory store; bookings will not survive a restart");
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreBackend::Redis => {
            let url = config
                .redis_url
                .as_deref()
                .ok_or("store.redis_url is required for the redis backend")?;
            let store = RedisStore::new(url).await?;
            store.ping().await?;
            tracing::info!("Connected to Redis store");
            Ok(Arc::new(store))
        }
    }
}
