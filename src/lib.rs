//! Tunesmith - Parameter Sweep & Evaluation Engine
//!
//! Tunesmith sweeps sampling and server-config parameters of an LLM
//! inference server, scores each candidate against a built-in scenario
//! library, and keeps a durable history of runs with reweightable
//! best-trial selection.
//!
//! # Architecture
//!
//! This crate follows Clean Architecture / Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): models, ports, and the error taxonomy
//! - **Service Layer** (`services`): candidate generation, scoring, history
//! - **Application Layer** (`application`): run lifecycle orchestration
//! - **Infrastructure Layer** (`infrastructure`): HTTP, SQLite, config
//! - **CLI Layer** (`cli`): command-line interface

pub mod application;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use application::{PromptExecutor, RunController, RunEvent, RunManager, RunSettings};
pub use domain::errors::{StoreError, SweepError, SweepResult, TransportError};
pub use domain::models::{
    BestConfigWeights, Candidate, ConfigCandidate, HistoryEntry, Run, RunStatus,
    SamplingCandidate, Scenario, ScenarioId, SweepDefinition, SweepMode, TrialResult, TrialStatus,
};
pub use services::{HistoryEvent, HistoryStore};
