//! Persisted history records.
//!
//! A `HistoryEntry` is the durable, versioned record of one terminal run.
//! Entries are created when a run reaches a terminal state and mutated only
//! through explicit updates (reevaluation writing back `bestTrialId` and
//! weights).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::run::Run;
use super::sweep::SweepMode;

/// Schema version carried on every entry and on the export envelope.
pub const HISTORY_SCHEMA_VERSION: u32 = 1;

/// One persisted run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub version: u32,
    /// Equals the run id.
    pub id: Uuid,
    pub saved_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_id: Option<String>,
    pub sweep_mode: SweepMode,
    pub run: Run,
}

impl HistoryEntry {
    /// Build an entry from a terminal run. The caller is responsible for
    /// stripping ephemeral trial fields first.
    pub fn from_run(run: Run) -> Self {
        Self {
            version: HISTORY_SCHEMA_VERSION,
            id: run.run_id,
            saved_at: Utc::now(),
            completed_at: Some(run.completed_at()),
            model_id: run.model_id.clone(),
            sweep_mode: run.kind,
            run,
        }
    }

    /// Structural validation applied to stored and imported records.
    pub fn validate(&self) -> Result<(), String> {
        if self.version != HISTORY_SCHEMA_VERSION {
            return Err(format!("unsupported entry version {}", self.version));
        }
        if self.id != self.run.run_id {
            return Err("entry id does not match run id".to_string());
        }
        if self.sweep_mode != self.run.kind {
            return Err("entry sweepMode does not match run kind".to_string());
        }
        self.run.validate_structure()
    }
}

/// Versioned envelope wrapping an export of all entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportEnvelope {
    pub schema_version: u32,
    pub exported_at: DateTime<Utc>,
    pub entries: Vec<HistoryEntry>,
}

impl ExportEnvelope {
    pub fn new(entries: Vec<HistoryEntry>) -> Self {
        Self {
            schema_version: HISTORY_SCHEMA_VERSION,
            exported_at: Utc::now(),
            entries,
        }
    }
}

/// Outcome counters for an import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportOutcome {
    pub imported: usize,
    pub skipped: usize,
}
