use crate::core::moderation::{ModerationConfigStore, StoreError, StoredModerationConfig};
use async_trait::async_trait;
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use tokio::sync::RwLock;

/// JSON-backed store for saved moderation settings. All guilds live in one
/// file as a map: { guild_id: StoredModerationConfig }
pub struct JsonModerationStore {
    path: PathBuf,
    cache: RwLock<HashMap<u64, StoredModerationConfig>>,
}

impl JsonModerationStore {
    /// Open the store, reading the file if it already exists.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let configs: HashMap<u64, StoredModerationConfig> = if path.exists() {
            let reader = BufReader::new(File::open(&path)?);
            serde_json::from_reader(reader)?
        } else {
            HashMap::new()
        };

        tracing::debug!(path = %path.display(), guilds = configs.len(), "Loaded moderation settings");

        Ok(Self {
            path,
            cache: RwLock::new(configs),
        })
    }

    async fn persist(&self) -> Result<(), StoreError> {
        let cache = self.cache.read().await;
        let file = File::create(&self.path)?;
        serde_json::to_writer_pretty(file, &*cache)?;
        Ok(())
    }
}

#[async_trait]
impl ModerationConfigStore for JsonModerationStore {
    async fn get_config(
        &self,
        guild_id: u64,
    ) -> Result<Option<StoredModerationConfig>, StoreError> {
        let cache = self.cache.read().await;
        Ok(cache.get(&guild_id).cloned())
    }

    async fn save_config(
        &self,
        guild_id: u64,
        record: StoredModerationConfig,
    ) -> Result<(), StoreError> {
        let mut cache = self.cache.write().await;
        cache.insert(guild_id, record);
        drop(cache); // Release lock before persisting
        self.persist().await
    }
}
