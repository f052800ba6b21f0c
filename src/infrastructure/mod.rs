pub mod config;
pub mod database;
pub mod history;
pub mod llm;
