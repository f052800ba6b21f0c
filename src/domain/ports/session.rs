//! Ephemeral session lifecycle collaborator contract.
//!
//! Config sweeps create one short-lived inference session per candidate and
//! tear it down afterwards, success or failure. `delete` is idempotent and
//! safe to call on cleanup paths even after a failed create.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::errors::TransportError;
use crate::domain::models::ConfigCandidate;

/// Chat template selection for a new session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "template_mode", rename_all = "snake_case")]
pub enum TemplateMode {
    /// Use a named built-in template.
    Named { template_name: String },
    /// Use an inline template script.
    Script { template_script: String },
}

/// Request to create an ephemeral session.
#[derive(Debug, Clone, Serialize)]
pub struct CreateSessionRequest {
    pub model_id: String,
    #[serde(flatten)]
    pub template: Option<TemplateMode>,
    pub config: ConfigCandidate,
}

/// The server-effective configuration: the server may round or clamp
/// requested values, and calibration must use what actually took effect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectiveConfig {
    pub context_window: u32,
    pub n_seq_max: u32,
}

/// A created session handle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionInfo {
    pub session_id: String,
    pub effective_config: EffectiveConfig,
}

/// Port for the ephemeral session collaborator.
#[async_trait]
pub trait SessionClient: Send + Sync {
    async fn create(&self, request: CreateSessionRequest) -> Result<SessionInfo, TransportError>;

    /// Idempotent delete; callers invoke this unconditionally on cleanup.
    async fn delete(&self, session_id: &str) -> Result<(), TransportError>;
}
