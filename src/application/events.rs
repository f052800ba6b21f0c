//! Live progress events for observers (CLI progress rendering, tests).
//!
//! Best-effort broadcast: a lagging receiver should re-read the run state
//! rather than rely on the backlog.

use uuid::Uuid;

use crate::domain::models::{RunStatus, TrialResult, TrialStatus};

#[derive(Debug, Clone)]
pub enum RunEvent {
    StatusChanged(RunStatus),
    TrialStarted(Uuid),
    /// Snapshot of a trial after an incremental update (a prompt finished).
    TrialUpdated(Box<TrialResult>),
    TrialFinished(Uuid, TrialStatus),
    RunFinished(RunStatus),
}
