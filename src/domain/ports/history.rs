//! History repository port.
//!
//! Implemented by the SQLite primary tier and the flat-file fallback tier.
//! Callers go through `services::HistoryStore`, which hides which tier
//! served a given call.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::StoreError;
use crate::domain::models::HistoryEntry;

#[async_trait]
pub trait HistoryRepository: Send + Sync {
    /// All entries, newest-first by save time.
    async fn load_all(&self) -> Result<Vec<HistoryEntry>, StoreError>;

    async fn get(&self, id: Uuid) -> Result<Option<HistoryEntry>, StoreError>;

    /// Insert or replace by id.
    async fn put(&self, entry: &HistoryEntry) -> Result<(), StoreError>;

    /// Delete by ids; returns how many rows existed.
    async fn delete_many(&self, ids: &[Uuid]) -> Result<usize, StoreError>;

    async fn count(&self) -> Result<usize, StoreError>;

    /// Ids of the `n` oldest entries by save time, oldest first. Used for
    /// cap enforcement.
    async fn oldest_ids(&self, n: usize) -> Result<Vec<Uuid>, StoreError>;
}
