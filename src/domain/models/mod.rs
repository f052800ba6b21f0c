pub mod candidate;
pub mod history;
pub mod run;
pub mod scenario;
pub mod sweep;
pub mod trial;

pub use candidate::{
    CacheMode, CacheType, Candidate, ConfigCandidate, ReasoningEffort, SamplingAxis,
    SamplingCandidate,
};
pub use history::{ExportEnvelope, HistoryEntry, ImportOutcome, HISTORY_SCHEMA_VERSION};
pub use run::{BestConfigWeights, Run, RunStatus};
pub use scenario::{ChatMessage, Expectation, PromptDef, Scenario, ScenarioId, ToolSpec};
pub use sweep::{AxisRange, ConfigSweep, SamplingSweep, SweepDefinition, SweepMode};
pub use trial::{
    EmittedToolCall, LogEntry, PromptResult, ScenarioResult, TrialResult, TrialStatus, Usage,
};
