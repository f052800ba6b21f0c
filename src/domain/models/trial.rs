//! Trial execution results.
//!
//! A trial is the execution of all enabled scenarios for one candidate.
//! `PromptResult`s are immutable once produced; the owning `ScenarioResult`
//! and `TrialResult` are recomputed incrementally as prompts complete so that
//! observers see live partial progress.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::candidate::Candidate;
use super::scenario::ScenarioId;

/// Terminal usage block reported by the streaming endpoint.
///
/// Persisted in camelCase; the wire sends snake_case, accepted via aliases.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Usage {
    #[serde(alias = "prompt_tokens")]
    pub prompt_tokens: u64,
    #[serde(alias = "output_tokens")]
    pub output_tokens: u64,
    #[serde(alias = "tokens_per_second", skip_serializing_if = "Option::is_none")]
    pub tokens_per_second: Option<f64>,
    #[serde(
        alias = "time_to_first_token_ms",
        skip_serializing_if = "Option::is_none"
    )]
    pub time_to_first_token_ms: Option<f64>,
}

/// A tool call accumulated from streaming deltas.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmittedToolCall {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    /// Raw argument string, concatenated from `arguments` deltas.
    pub arguments: String,
}

/// Result of executing one prompt. Produced once, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptResult {
    pub prompt_id: String,
    pub assistant_text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<EmittedToolCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
    pub score: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
    /// Fill percentage carried over from the prompt, for per-fill bucketing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fill_pct: Option<u8>,
}

/// Aggregate over the prompts of one scenario completed so far.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioResult {
    pub scenario_id: ScenarioId,
    pub prompt_results: Vec<PromptResult>,
    /// Arithmetic mean of prompt scores completed so far.
    pub score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_tps: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_ttft: Option<f64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub avg_tps_by_fill: BTreeMap<u8, f64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub avg_ttft_by_fill: BTreeMap<u8, f64>,
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let values: Vec<f64> = values.collect();
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

impl ScenarioResult {
    /// Recompute the aggregate from a set of completed prompt results.
    pub fn from_results(scenario_id: ScenarioId, prompt_results: Vec<PromptResult>) -> Self {
        let score = mean(prompt_results.iter().map(|r| r.score)).unwrap_or(0.0);
        let avg_tps = mean(
            prompt_results
                .iter()
                .filter_map(|r| r.usage.and_then(|u| u.tokens_per_second)),
        );
        let avg_ttft = mean(
            prompt_results
                .iter()
                .filter_map(|r| r.usage.and_then(|u| u.time_to_first_token_ms)),
        );

        let mut avg_tps_by_fill = BTreeMap::new();
        let mut avg_ttft_by_fill = BTreeMap::new();
        let fills: Vec<u8> = {
            let mut f: Vec<u8> = prompt_results.iter().filter_map(|r| r.fill_pct).collect();
            f.sort_unstable();
            f.dedup();
            f
        };
        for fill in fills {
            let at_fill = prompt_results.iter().filter(|r| r.fill_pct == Some(fill));
            if let Some(tps) = mean(
                at_fill
                    .clone()
                    .filter_map(|r| r.usage.and_then(|u| u.tokens_per_second)),
            ) {
                avg_tps_by_fill.insert(fill, tps);
            }
            if let Some(ttft) =
                mean(at_fill.filter_map(|r| r.usage.and_then(|u| u.time_to_first_token_ms)))
            {
                avg_ttft_by_fill.insert(fill, ttft);
            }
        }

        Self {
            scenario_id,
            prompt_results,
            score,
            avg_tps,
            avg_ttft,
            avg_tps_by_fill,
            avg_ttft_by_fill,
        }
    }
}

/// Status of a trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrialStatus {
    Queued,
    Running,
    Completed,
    Cancelled,
    Failed,
    Skipped,
}

impl Default for TrialStatus {
    fn default() -> Self {
        Self::Queued
    }
}

impl TrialStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Cancelled | Self::Failed | Self::Skipped
        )
    }
}

/// A live log line attached to a running trial. Ephemeral: stripped before
/// persistence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub at: DateTime<Utc>,
    pub message: String,
}

/// Result of executing all enabled scenarios for one candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrialResult {
    /// Stable for the trial's lifetime.
    pub id: Uuid,
    pub status: TrialStatus,
    pub candidate: Candidate,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scenario_results: Vec<ScenarioResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_tps: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_ttft: Option<f64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub avg_tps_by_fill: BTreeMap<u8, f64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub avg_ttft_by_fill: BTreeMap<u8, f64>,
    /// Candidate-granularity failure (config runs), e.g. session creation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Prompts currently in flight. Ephemeral: stripped before persistence.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub active_prompts: Vec<String>,
    /// Live progress log. Ephemeral: stripped before persistence.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub log_entries: Vec<LogEntry>,
}

impl TrialResult {
    pub fn new(candidate: Candidate) -> Self {
        Self {
            id: Uuid::new_v4(),
            status: TrialStatus::Queued,
            candidate,
            started_at: Utc::now(),
            finished_at: None,
            scenario_results: Vec::new(),
            total_score: None,
            avg_tps: None,
            avg_ttft: None,
            avg_tps_by_fill: BTreeMap::new(),
            avg_ttft_by_fill: BTreeMap::new(),
            error: None,
            active_prompts: Vec::new(),
            log_entries: Vec::new(),
        }
    }

    fn scenario(&self, id: ScenarioId) -> Option<&ScenarioResult> {
        self.scenario_results.iter().find(|s| s.scenario_id == id)
    }

    /// Chat-quality scenario score, if the chat scenario ran.
    pub fn chat_score(&self) -> Option<f64> {
        self.scenario(ScenarioId::Chat).map(|s| s.score)
    }

    /// Tool-calling scenario score, if the tool scenario ran.
    pub fn tool_score(&self) -> Option<f64> {
        self.scenario(ScenarioId::ToolCall).map(|s| s.score)
    }

    /// Recompute the trial-level aggregates from the scenario results.
    ///
    /// `total_score` is `0.6 * tool + 0.4 * chat` when both scenario scores
    /// exist, the single one when only one exists, and `None` otherwise.
    /// TPS/TTFT averages are means across the defined scenario-level
    /// averages; per-fill aggregates come from the context-fill scenario.
    pub fn recompute_totals(&mut self) {
        self.total_score = match (self.tool_score(), self.chat_score()) {
            (Some(tool), Some(chat)) => Some(0.6 * tool + 0.4 * chat),
            (Some(tool), None) => Some(tool),
            (None, Some(chat)) => Some(chat),
            (None, None) => None,
        };
        self.avg_tps = mean(self.scenario_results.iter().filter_map(|s| s.avg_tps));
        self.avg_ttft = mean(self.scenario_results.iter().filter_map(|s| s.avg_ttft));
        let fill_maps = self
            .scenario(ScenarioId::ContextFill)
            .map(|fill| (fill.avg_tps_by_fill.clone(), fill.avg_ttft_by_fill.clone()));
        if let Some((tps_by_fill, ttft_by_fill)) = fill_maps {
            self.avg_tps_by_fill = tps_by_fill;
            self.avg_ttft_by_fill = ttft_by_fill;
        }
    }

    /// Drop ephemeral live-progress fields before persistence.
    pub fn strip_ephemeral(&mut self) {
        self.active_prompts.clear();
        self.log_entries.clear();
    }
}
