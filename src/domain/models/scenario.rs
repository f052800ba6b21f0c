//! Scenario and prompt definitions.
//!
//! A scenario is a named group of prompts sharing a scoring strategy. The
//! built-in catalog (chat quality, tool calling, context-fill performance)
//! lives in `services::scenario_library`.

use serde::{Deserialize, Serialize};

/// One chat message in a prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// A tool the model is allowed to call, with its required parameters.
///
/// This is the domain-level view; the wire-level JSON-schema rendering lives
/// in the transport layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// Required parameter names; each missing one costs 20 points.
    pub required_params: Vec<String>,
    /// Optional parameter names, accepted but never required.
    #[serde(default)]
    pub optional_params: Vec<String>,
}

/// Expected-result predicate attached to a prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Expectation {
    /// Case-insensitive trimmed comparison; substring match scores half.
    Exact { value: String },
    /// Case-insensitive multiline regex; match or nothing.
    Regex { value: String },
    /// The response must call the declared tools correctly.
    ToolCall,
    /// The response must not call any tool.
    NoToolCall,
}

/// One prompt to execute against a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptDef {
    pub id: String,
    pub messages: Vec<ChatMessage>,
    /// Tools declared for this prompt, when tool calling is being exercised.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolSpec>,
    /// Scoring predicate. Prompts without one are timing-only and score 100.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected: Option<Expectation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<i64>,
    /// Target context-fill percentage for calibration prompts (0/20/50/80).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fill_pct: Option<u8>,
}

impl PromptDef {
    pub fn new(id: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            id: id.into(),
            messages,
            tools: Vec::new(),
            expected: None,
            max_tokens: None,
            fill_pct: None,
        }
    }
}

/// Well-known scenario identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioId {
    Chat,
    ToolCall,
    ContextFill,
}

impl ScenarioId {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Chat => "chat",
            Self::ToolCall => "tool_call",
            Self::ContextFill => "context_fill",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "chat" => Some(Self::Chat),
            "tool_call" => Some(Self::ToolCall),
            "context_fill" => Some(Self::ContextFill),
            _ => None,
        }
    }
}

/// A named group of prompts sharing a scoring strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scenario {
    pub id: ScenarioId,
    pub name: String,
    pub prompts: Vec<PromptDef>,
}
