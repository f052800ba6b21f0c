pub mod fallback_repo;

use std::sync::Arc;

use tracing::{info, warn};

use crate::domain::errors::StoreError;
use crate::domain::ports::HistoryRepository;
use crate::infrastructure::database::{DatabaseConnection, SqliteHistoryRepo};
use crate::services::HistoryStore;

pub use fallback_repo::FlatFileHistoryRepo;

/// Wire up the two-tier history store.
///
/// Tries to open the SQLite primary; on failure the store runs on the flat
/// file alone. On first successful open, performs the one-time flat-file
/// migration: only into an empty primary, and marked complete even when
/// there was nothing to migrate.
pub async fn open_history_store(
    database_url: &str,
    fallback_path: &str,
    max_entries: usize,
) -> HistoryStore {
    let fallback = Arc::new(FlatFileHistoryRepo::new(fallback_path));

    let primary: Option<Arc<dyn HistoryRepository>> =
        match open_primary(database_url, fallback.as_ref()).await {
            Ok(repo) => Some(repo),
            Err(err) => {
                warn!(error = %err, "primary history store unavailable, using flat file");
                None
            }
        };

    HistoryStore::new(primary, fallback, max_entries)
}

async fn open_primary(
    database_url: &str,
    fallback: &FlatFileHistoryRepo,
) -> Result<Arc<dyn HistoryRepository>, StoreError> {
    let connection = DatabaseConnection::new(database_url).await?;
    let repo = SqliteHistoryRepo::new(connection.pool().clone());

    if !repo.migration_done().await? {
        if repo.count().await? == 0 {
            let legacy = match fallback.load_all().await {
                Ok(entries) => entries,
                Err(err) => {
                    warn!(error = %err, "skipping unreadable flat-file history during migration");
                    Vec::new()
                }
            };
            if !legacy.is_empty() {
                info!(entries = legacy.len(), "migrating flat-file history into sqlite");
                for entry in &legacy {
                    repo.put(entry).await?;
                }
            }
        }
        repo.mark_migration_done().await?;
    }

    Ok(Arc::new(repo))
}
