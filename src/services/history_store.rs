//! Durable run history.
//!
//! Two-tier persistence: a primary transactional store (SQLite) and a flat
//! JSON file used when the primary is unavailable. Callers never learn which
//! tier served a call. Every mutating operation emits a change notification;
//! observers that miss one are still correct because reads always go to
//! durable storage, never to an in-memory cache.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::errors::StoreError;
use crate::domain::models::{
    ExportEnvelope, HistoryEntry, ImportOutcome, Run, HISTORY_SCHEMA_VERSION,
};
use crate::domain::ports::HistoryRepository;

/// Default maximum number of persisted entries.
pub const DEFAULT_MAX_ENTRIES: usize = 500;

/// Change notifications emitted after every mutation.
#[derive(Debug, Clone)]
pub enum HistoryEvent {
    Saved(Uuid),
    Updated(Uuid),
    Deleted(Vec<Uuid>),
    Imported(ImportOutcome),
}

/// Route a repository call to the primary tier, falling back to the flat
/// store when the primary errors mid-flight.
macro_rules! tiered {
    ($self:ident, $call:ident ( $($arg:expr),* )) => {{
        match &$self.primary {
            Some(primary) => match primary.$call($($arg),*).await {
                Ok(value) => Ok(value),
                Err(err) => {
                    warn!(error = %err, "primary history tier failed, using fallback");
                    $self.fallback.$call($($arg),*).await
                }
            },
            None => $self.fallback.$call($($arg),*).await,
        }
    }};
}

pub struct HistoryStore {
    primary: Option<Arc<dyn HistoryRepository>>,
    fallback: Arc<dyn HistoryRepository>,
    max_entries: usize,
    events: broadcast::Sender<HistoryEvent>,
}

impl HistoryStore {
    pub fn new(
        primary: Option<Arc<dyn HistoryRepository>>,
        fallback: Arc<dyn HistoryRepository>,
        max_entries: usize,
    ) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            primary,
            fallback,
            max_entries,
            events,
        }
    }

    /// Subscribe to change notifications. Best-effort: a lagging receiver
    /// should re-read rather than rely on the backlog.
    pub fn subscribe(&self) -> broadcast::Receiver<HistoryEvent> {
        self.events.subscribe()
    }

    fn notify(&self, event: HistoryEvent) {
        // No receivers is fine.
        let _ = self.events.send(event);
    }

    /// All entries, newest-first. Structurally invalid stored records are
    /// skipped, never trusted.
    pub async fn load(&self) -> Result<Vec<HistoryEntry>, StoreError> {
        let entries: Vec<HistoryEntry> = tiered!(self, load_all())?;
        Ok(entries
            .into_iter()
            .filter(|entry| match entry.validate() {
                Ok(()) => true,
                Err(reason) => {
                    warn!(id = %entry.id, %reason, "skipping invalid history entry");
                    false
                }
            })
            .collect())
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<HistoryEntry>, StoreError> {
        tiered!(self, get(id))
    }

    /// Persist a terminal run: strips ephemeral per-trial progress fields,
    /// derives the completion timestamp, writes, then enforces the entry cap
    /// by deleting the oldest entries.
    pub async fn save(&self, mut run: Run) -> Result<HistoryEntry, StoreError> {
        for trial in &mut run.trials {
            trial.strip_ephemeral();
        }
        let entry = HistoryEntry::from_run(run);
        tiered!(self, put(&entry))?;
        self.enforce_cap().await?;
        info!(id = %entry.id, "saved run to history");
        self.notify(HistoryEvent::Saved(entry.id));
        Ok(entry)
    }

    async fn enforce_cap(&self) -> Result<(), StoreError> {
        let count = tiered!(self, count())?;
        if count > self.max_entries {
            let excess = count - self.max_entries;
            let ids: Vec<Uuid> = tiered!(self, oldest_ids(excess))?;
            debug!(pruned = ids.len(), "pruning history beyond cap");
            tiered!(self, delete_many(&ids))?;
        }
        Ok(())
    }

    /// Read-modify-write on one entry. Returns `false` (no-op) when the id
    /// is absent.
    pub async fn update<F>(&self, id: Uuid, mutate: F) -> Result<bool, StoreError>
    where
        F: FnOnce(&mut HistoryEntry),
    {
        let Some(mut entry) = tiered!(self, get(id))? else {
            return Ok(false);
        };
        mutate(&mut entry);
        tiered!(self, put(&entry))?;
        self.notify(HistoryEvent::Updated(id));
        Ok(true)
    }

    pub async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        Ok(self.delete_many(&[id]).await? > 0)
    }

    pub async fn delete_many(&self, ids: &[Uuid]) -> Result<usize, StoreError> {
        let deleted = tiered!(self, delete_many(ids))?;
        if deleted > 0 {
            self.notify(HistoryEvent::Deleted(ids.to_vec()));
        }
        Ok(deleted)
    }

    /// Serialize all entries into the versioned export envelope.
    pub async fn export(&self) -> Result<String, StoreError> {
        let entries = self.load().await?;
        let envelope = ExportEnvelope::new(entries);
        Ok(serde_json::to_string_pretty(&envelope)?)
    }

    /// Parse and merge an export file.
    ///
    /// Invalid entries are counted as skipped, not fatal. Duplicates within
    /// the file keep the latest `savedAt`. An existing stored id is only
    /// overwritten when the incoming `savedAt` is strictly newer.
    pub async fn import(&self, text: &str) -> Result<ImportOutcome, StoreError> {
        let envelope: serde_json::Value = serde_json::from_str(text)
            .map_err(|e| StoreError::Corrupt(format!("import is not valid JSON: {e}")))?;
        let version = envelope
            .get("schemaVersion")
            .and_then(serde_json::Value::as_u64);
        if version != Some(u64::from(HISTORY_SCHEMA_VERSION)) {
            return Err(StoreError::Corrupt(format!(
                "unsupported export schemaVersion {version:?}"
            )));
        }
        let Some(raw_entries) = envelope.get("entries").and_then(serde_json::Value::as_array)
        else {
            return Err(StoreError::Corrupt(
                "export has no entries array".to_string(),
            ));
        };

        let mut outcome = ImportOutcome::default();

        // Structural pass: parse and validate each entry independently.
        let mut valid: Vec<HistoryEntry> = Vec::new();
        for raw in raw_entries {
            match serde_json::from_value::<HistoryEntry>(raw.clone()) {
                Ok(entry) => match entry.validate() {
                    Ok(()) => valid.push(entry),
                    Err(reason) => {
                        warn!(%reason, "skipping invalid entry in import");
                        outcome.skipped += 1;
                    }
                },
                Err(err) => {
                    warn!(error = %err, "skipping unparseable entry in import");
                    outcome.skipped += 1;
                }
            }
        }

        // Deduplicate within the file by id, keeping the latest savedAt.
        let mut by_id: BTreeMap<Uuid, HistoryEntry> = BTreeMap::new();
        for entry in valid {
            match by_id.get(&entry.id) {
                Some(existing) if existing.saved_at >= entry.saved_at => {
                    outcome.skipped += 1;
                }
                Some(_) => {
                    outcome.skipped += 1;
                    by_id.insert(entry.id, entry);
                }
                None => {
                    by_id.insert(entry.id, entry);
                }
            }
        }

        // Merge against storage: overwrite only when strictly newer.
        for (id, entry) in by_id {
            match tiered!(self, get(id))? {
                Some(stored) if stored.saved_at >= entry.saved_at => {
                    outcome.skipped += 1;
                }
                _ => {
                    tiered!(self, put(&entry))?;
                    outcome.imported += 1;
                }
            }
        }

        self.enforce_cap().await?;
        info!(
            imported = outcome.imported,
            skipped = outcome.skipped,
            "history import finished"
        );
        self.notify(HistoryEvent::Imported(outcome));
        Ok(outcome)
    }
}
