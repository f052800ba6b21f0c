pub mod events;
pub mod prompt_executor;
pub mod run_controller;
pub mod run_manager;
pub mod trial_orchestrator;

pub use events::RunEvent;
pub use prompt_executor::PromptExecutor;
pub use run_controller::{RunController, RunSettings};
pub use run_manager::RunManager;
pub use trial_orchestrator::TrialOrchestrator;
