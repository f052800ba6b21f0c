//! Domain errors for the sweep engine.
//!
//! Taxonomy: validation errors are terminal for a run; transport errors are
//! recovered locally (prompt or candidate granularity); cancellation is
//! distinguished from failure and never logged as a fault; persistence
//! errors degrade to the fallback tier and never fail a run.

use thiserror::Error;

/// Transport-layer failures from the chat/session collaborators.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("http {status}: {body}")]
    Http { status: u16, body: String },

    #[error("stream error: {0}")]
    Stream(String),

    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Persistence-layer failures from either history tier.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt record: {0}")]
    Corrupt(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Corrupt(err.to_string())
    }
}

/// Top-level error taxonomy for the sweep engine.
#[derive(Debug, Error)]
pub enum SweepError {
    /// Bad sweep definition or empty candidate set. Terminal: surfaces as
    /// run status `error` with this message.
    #[error("validation error: {0}")]
    Validation(String),

    /// Network/HTTP/stream failure. Recovered locally, never aborts a run.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Cooperative cancellation. Produces `cancelled`, not `error`.
    #[error("cancelled")]
    Cancelled,

    /// Storage failure after both tiers were exhausted.
    #[error(transparent)]
    Persistence(#[from] StoreError),

    /// A run is already active; only one run may exist process-wide.
    #[error("a run is already active")]
    AlreadyRunning,
}

pub type SweepResult<T> = Result<T, SweepError>;

impl SweepError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
