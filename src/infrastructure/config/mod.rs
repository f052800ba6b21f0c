pub mod loader;

pub use loader::{Config, ConfigError, HistoryConfig, ServerConfig};
