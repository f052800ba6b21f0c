pub mod candidate_generator;
pub mod composite_scorer;
pub mod history_store;
pub mod scenario_library;
pub mod scoring;

pub use candidate_generator::generate;
pub use composite_scorer::{composite_score, select_best};
pub use history_store::{HistoryEvent, HistoryStore, DEFAULT_MAX_ENTRIES};
pub use scenario_library::{builtin_scenarios, fill_prompts};
pub use scoring::score_response;
