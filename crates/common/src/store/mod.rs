//! Snapshot storage backends
//!
//! Provides:
//! - A JSON file store (atomic replace on save)
//! - A Redis store with TTL and key prefixing
//! - An in-memory store for tests
//!
//! Stores deal in raw JSON so that version upgrades happen in the engine,
//! not in the storage layer.

use crate::config::{PersistenceBackend, PersistenceConfig};
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use redis::{aio::MultiplexedConnection, AsyncCommands, Client};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Persistence sink for session snapshots
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Load the last saved snapshot, if any
    async fn load(&self) -> Result<Option<Value>>;

    /// Replace the saved snapshot
    async fn save(&self, snapshot: &Value) -> Result<()>;

    /// Remove the saved snapshot
    async fn clear(&self) -> Result<()>;

    /// Backend name for logs
    fn backend(&self) -> &'static str;
}

/// Snapshot kept in a JSON file
pub struct FileSnapshotStore {
    path: PathBuf,
}

impl FileSnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl SnapshotStore for FileSnapshotStore {
    async fn load(&self) -> Result<Option<Value>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => {
                let value = serde_json::from_slice(&bytes)?;
                debug!(path = %self.path.display(), "Snapshot loaded");
                Ok(Some(value))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Persistence {
                message: format!("Failed to read '{}': {}", self.path.display(), e),
            }),
        }
    }

    async fn save(&self, snapshot: &Value) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let bytes = serde_json::to_vec(snapshot)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;

        debug!(path = %self.path.display(), bytes = bytes.len(), "Snapshot saved");
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn backend(&self) -> &'static str {
        "file"
    }
}

/// Snapshot kept under one Redis key
pub struct RedisSnapshotStore {
    connection: RwLock<MultiplexedConnection>,
    key: String,
    ttl_secs: u64,
}

impl RedisSnapshotStore {
    /// Connect to Redis
    pub async fn new(url: &str, key_prefix: &str, ttl_secs: u64) -> Result<Self> {
        let client = Client::open(url).map_err(|e| AppError::Persistence {
            message: format!("Failed to create Redis client: {}", e),
        })?;

        let connection = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| AppError::Persistence {
                message: format!("Failed to connect to Redis: {}", e),
            })?;

        Ok(Self {
            connection: RwLock::new(connection),
            key: format!("{}:sessions", key_prefix),
            ttl_secs,
        })
    }
}

#[async_trait]
impl SnapshotStore for RedisSnapshotStore {
    async fn load(&self) -> Result<Option<Value>> {
        let mut conn = self.connection.write().await;

        let value: Option<String> = conn.get(&self.key).await.map_err(|e| AppError::Persistence {
            message: format!("Failed to get key '{}': {}", self.key, e),
        })?;

        match value {
            Some(json) => {
                debug!(key = %self.key, "Snapshot hit");
                Ok(Some(serde_json::from_str(&json)?))
            }
            None => {
                debug!(key = %self.key, "Snapshot miss");
                Ok(None)
            }
        }
    }

    async fn save(&self, snapshot: &Value) -> Result<()> {
        let json = serde_json::to_string(snapshot)?;

        let mut conn = self.connection.write().await;
        conn.set_ex::<_, _, ()>(&self.key, &json, self.ttl_secs)
            .await
            .map_err(|e| AppError::Persistence {
                message: format!("Failed to set key '{}': {}", self.key, e),
            })?;

        debug!(key = %self.key, ttl_secs = self.ttl_secs, "Snapshot saved");
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        let mut conn = self.connection.write().await;
        let _: i32 = conn.del(&self.key).await?;
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "redis"
    }
}

/// In-process store, used by tests and when nothing should touch disk
#[derive(Default)]
pub struct MemorySnapshotStore {
    slot: RwLock<Option<Value>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-seeded store, e.g. with a legacy snapshot
    pub fn with_snapshot(snapshot: Value) -> Self {
        Self {
            slot: RwLock::new(Some(snapshot)),
        }
    }
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn load(&self) -> Result<Option<Value>> {
        Ok(self.slot.read().await.clone())
    }

    async fn save(&self, snapshot: &Value) -> Result<()> {
        *self.slot.write().await = Some(snapshot.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        *self.slot.write().await = None;
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

/// Create the configured store; `None` when persistence is off
pub async fn create_store(config: &PersistenceConfig) -> Result<Option<Arc<dyn SnapshotStore>>> {
    if !config.enabled {
        return Ok(None);
    }

    let store: Arc<dyn SnapshotStore> = match config.backend {
        PersistenceBackend::File => Arc::new(FileSnapshotStore::new(&config.path)),
        PersistenceBackend::Redis => {
            let url = config.redis_url.as_deref().ok_or_else(|| AppError::Configuration {
                message: "persistence.redis_url is required for the redis backend".to_string(),
            })?;
            Arc::new(RedisSnapshotStore::new(url, &config.key_prefix, config.ttl_secs).await?)
        }
    };

    info!(backend = store.backend(), "Snapshot persistence enabled");
    Ok(Some(store))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio_test::assert_ok;

    #[tokio::test]
    async fn test_memory_store_round_trip() {
        let store = MemorySnapshotStore::new();
        assert!(store.load().await.unwrap().is_none());

        assert_ok!(store.save(&json!({"version": 2})).await);
        assert_eq!(store.load().await.unwrap(), Some(json!({"version": 2})));

        assert_ok!(store.clear().await);
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_file_store_missing_file_is_empty() {
        let path = std::env::temp_dir().join(format!("citenet-missing-{}.json", uuid::Uuid::new_v4()));
        let store = FileSnapshotStore::new(&path);
        assert!(store.load().await.unwrap().is_none());
        assert_ok!(store.clear().await);
    }

    #[tokio::test]
    async fn test_file_store_replaces_snapshot() {
        let dir = std::env::temp_dir().join(format!("citenet-store-{}", uuid::Uuid::new_v4()));
        let store = FileSnapshotStore::new(dir.join("sessions.json"));

        store.save(&json!({"sessions": [1]})).await.unwrap();
        store.save(&json!({"sessions": [1, 2]})).await.unwrap();
        assert_eq!(store.load().await.unwrap(), Some(json!({"sessions": [1, 2]})));

        store.clear().await.unwrap();
        tokio::fs::remove_dir_all(&dir).await.ok();
    }

    #[tokio::test]
    async fn test_disabled_persistence_creates_nothing() {
        let config = PersistenceConfig::default();
        assert!(create_store(&config).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_redis_backend_requires_url() {
        let config = PersistenceConfig {
            enabled: true,
            backend: PersistenceBackend::Redis,
            ..PersistenceConfig::default()
        };
        assert!(matches!(
            create_store(&config).await,
            Err(AppError::Configuration { .. })
        ));
    }
}
