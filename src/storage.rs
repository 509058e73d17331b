use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tracing::debug;

use crate::constants::{SNAPSHOT_KEY, STORE_NAME};
use crate::error::{Result, ScraperError};
use crate::types::Snapshot;

/// Durable home of the one snapshot record. Each sync overwrites the
/// record wholesale; there is no versioning and no migration. A missing
/// record is a normal state, not an error.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn load(&self) -> Result<Option<Snapshot>>;
    async fn save(&self, snapshot: &Snapshot) -> Result<()>;
}

/// In-memory store for development and testing.
pub struct InMemoryStore {
    records: Arc<Mutex<HashMap<String, String>>>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            records: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

#[async_trait]
impl SnapshotStore for InMemoryStore {
    async fn load(&self) -> Result<Option<Snapshot>> {
        let records = self.records.lock().unwrap();
        match records.get(SNAPSHOT_KEY) {
            Some(raw) => Ok(Some(serde_json::from_str(raw)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, snapshot: &Snapshot) -> Result<()> {
        let raw = serde_json::to_string(snapshot)?;
        let mut records = self.records.lock().unwrap();
        records.insert(SNAPSHOT_KEY.to_string(), raw);
        debug!("Stored snapshot with {} events", snapshot.count);
        Ok(())
    }
}

/// File-backed store: one JSON document at
/// `<data_dir>/dfw-theatre/events.json`.
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            path: data_dir.into().join(STORE_NAME).join(SNAPSHOT_KEY),
        }
    }
}

#[async_trait]
impl SnapshotStore for FileStore {
    async fn load(&self) -> Result<Option<Snapshot>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ScraperError::Storage(format!(
                "failed to read {}: {}",
                self.path.display(),
                e
            ))),
        }
    }

    async fn save(&self, snapshot: &Snapshot) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let raw = serde_json::to_string(snapshot)?;
        tokio::fs::write(&self.path, raw).await?;
        debug!(
            "Stored snapshot with {} events at {}",
            snapshot.count,
            self.path.display()
        );
        Ok(())
    }
}
