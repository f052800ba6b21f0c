//! Run domain model and best-trial weighting.
//!
//! A run is the full sweep: an ordered sequence of trials plus run-level
//! state and best-trial selection. Exactly one run may be active at a time
//! process-wide; that invariant is enforced by `application::RunManager`.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::scenario::ScenarioId;
use super::sweep::SweepMode;
use super::trial::TrialResult;

/// Top-level run state machine states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Idle,
    RepairingTemplate,
    RunningTrials,
    Completed,
    Cancelled,
    Error,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::RepairingTemplate => "repairing_template",
            Self::RunningTrials => "running_trials",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Error)
    }
}

/// Metric name → non-negative weight mapping used by the Composite Scorer.
///
/// Keys follow the serialized trial field names: `chatScore`, `toolScore`,
/// `totalScore`, `avgTps`, `avgTtft`, and the fill-level variants
/// `tps@0`..`tps@80` / `ttft@0`..`ttft@80`. Pure data, owned by the run and
/// editable after completion.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BestConfigWeights(pub BTreeMap<String, f64>);

impl BestConfigWeights {
    /// Default objective: rank by total score alone.
    pub fn total_score_only() -> Self {
        let mut weights = BTreeMap::new();
        weights.insert("totalScore".to_string(), 1.0);
        Self(weights)
    }

    pub fn get(&self, metric: &str) -> f64 {
        self.0.get(metric).copied().unwrap_or(0.0)
    }

    pub fn set(&mut self, metric: impl Into<String>, weight: f64) {
        self.0.insert(metric.into(), weight);
    }

    /// All weights must be non-negative; negative weights would invert the
    /// lower-is-better handling inside the scorer.
    pub fn validate(&self) -> Result<(), String> {
        for (metric, weight) in &self.0 {
            if !weight.is_finite() || *weight < 0.0 {
                return Err(format!("weight for {metric} must be a non-negative number"));
            }
        }
        Ok(())
    }
}

/// The full sweep: run-level state plus the ordered trial list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Run {
    pub run_id: Uuid,
    pub kind: SweepMode,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    /// Scenarios enabled for this run, in execution order. Template probing
    /// may remove the tool scenario before the trial loop starts.
    pub scenarios: Vec<ScenarioId>,
    pub trials: Vec<TrialResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub best_trial_id: Option<Uuid>,
    pub weights: BestConfigWeights,
    /// Model under test, recorded for history display.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_id: Option<String>,
    /// Terminal error message when `status == Error`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Run {
    pub fn new(kind: SweepMode, scenarios: Vec<ScenarioId>, weights: BestConfigWeights) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            kind,
            status: RunStatus::Idle,
            started_at: Utc::now(),
            scenarios,
            trials: Vec::new(),
            best_trial_id: None,
            weights,
            model_id: None,
            error: None,
        }
    }

    /// Whether at least one trial was attempted; terminal runs below this
    /// bar are not worth persisting.
    pub fn attempted_any_trial(&self) -> bool {
        !self.trials.is_empty()
    }

    /// Latest trial finish time, falling back to the run start time. Used to
    /// derive `completedAt` on the history entry.
    pub fn completed_at(&self) -> DateTime<Utc> {
        self.trials
            .iter()
            .filter_map(|t| t.finished_at)
            .max()
            .unwrap_or(self.started_at)
    }

    /// Structural validation applied at storage boundaries. Stored or
    /// imported records failing this are skipped, never trusted blindly.
    pub fn validate_structure(&self) -> Result<(), String> {
        if self.trials.iter().any(|t| !t.status.is_terminal()) {
            return Err("persisted run contains non-terminal trials".to_string());
        }
        if let Some(best) = self.best_trial_id {
            if !self.trials.iter().any(|t| t.id == best) {
                return Err(format!("bestTrialId {best} does not match any trial"));
            }
        }
        self.weights.validate()
    }
}
