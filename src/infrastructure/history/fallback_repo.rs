//! Flat-file history repository.
//!
//! A single JSON file holding an array of entries. Used as the fallback
//! persistence tier and as the source of the one-time migration into
//! SQLite. Every operation rewrites the whole file; history is small (at
//! most the entry cap) so this stays cheap.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::warn;
use uuid::Uuid;

use crate::domain::errors::StoreError;
use crate::domain::models::HistoryEntry;
use crate::domain::ports::HistoryRepository;

pub struct FlatFileHistoryRepo {
    path: PathBuf,
    // Serializes read-modify-write cycles on the file.
    lock: Mutex<()>,
}

impl FlatFileHistoryRepo {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    async fn read_entries(&self) -> Result<Vec<HistoryEntry>, StoreError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(text) if text.trim().is_empty() => Ok(Vec::new()),
            Ok(text) => match serde_json::from_str::<Vec<HistoryEntry>>(&text) {
                Ok(entries) => Ok(entries),
                Err(err) => {
                    warn!(path = %self.path.display(), error = %err, "unreadable history file");
                    Err(StoreError::Corrupt(format!(
                        "history file is not a valid entry array: {err}"
                    )))
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(err) => Err(err.into()),
        }
    }

    async fn write_entries(&self, entries: &[HistoryEntry]) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let text = serde_json::to_string_pretty(entries)?;
        tokio::fs::write(&self.path, text).await?;
        Ok(())
    }
}

#[async_trait]
impl HistoryRepository for FlatFileHistoryRepo {
    async fn load_all(&self) -> Result<Vec<HistoryEntry>, StoreError> {
        let _guard = self.lock.lock().await;
        let mut entries = self.read_entries().await?;
        entries.sort_by(|a, b| b.saved_at.cmp(&a.saved_at));
        Ok(entries)
    }

    async fn get(&self, id: Uuid) -> Result<Option<HistoryEntry>, StoreError> {
        let _guard = self.lock.lock().await;
        let entries = self.read_entries().await?;
        Ok(entries.into_iter().find(|e| e.id == id))
    }

    async fn put(&self, entry: &HistoryEntry) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let mut entries = self.read_entries().await?;
        entries.retain(|e| e.id != entry.id);
        entries.push(entry.clone());
        self.write_entries(&entries).await
    }

    async fn delete_many(&self, ids: &[Uuid]) -> Result<usize, StoreError> {
        let _guard = self.lock.lock().await;
        let mut entries = self.read_entries().await?;
        let before = entries.len();
        entries.retain(|e| !ids.contains(&e.id));
        let deleted = before - entries.len();
        if deleted > 0 {
            self.write_entries(&entries).await?;
        }
        Ok(deleted)
    }

    async fn count(&self) -> Result<usize, StoreError> {
        let _guard = self.lock.lock().await;
        Ok(self.read_entries().await?.len())
    }

    async fn oldest_ids(&self, n: usize) -> Result<Vec<Uuid>, StoreError> {
        let _guard = self.lock.lock().await;
        let mut entries = self.read_entries().await?;
        entries.sort_by(|a, b| a.saved_at.cmp(&b.saved_at));
        Ok(entries.into_iter().take(n).map(|e| e.id).collect())
    }
}
