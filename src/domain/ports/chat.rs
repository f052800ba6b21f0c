//! Streaming chat-completion collaborator contract.
//!
//! The engine treats the chat endpoint as a black box emitting incremental
//! chunks. `tool_calls` deltas are incremental patches keyed by `index`:
//! `name`/`id` are set once, `arguments` is append-only.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};

use crate::domain::errors::TransportError;
use crate::domain::models::{ChatMessage, SamplingCandidate, ToolSpec, Usage};

/// Request for one streaming chat completion.
///
/// Sampling fields use the wire (snake_case) names and are omitted when
/// unset so the server default stays in effect.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ChatRequest {
    pub session_id: String,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolDefinition>>,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repeat_penalty: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repeat_last_n: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dry_multiplier: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dry_base: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dry_allowed_length: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub xtc_probability: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub xtc_threshold: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_thinking: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning_effort: Option<String>,
}

impl ChatRequest {
    pub fn new(session_id: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            session_id: session_id.into(),
            messages,
            stream: true,
            ..Default::default()
        }
    }

    /// Attach a candidate's sampling parameters.
    pub fn with_sampling(mut self, sampling: &SamplingCandidate) -> Self {
        self.temperature = sampling.temperature;
        self.top_p = sampling.top_p;
        self.top_k = sampling.top_k;
        self.min_p = sampling.min_p;
        self.repeat_penalty = sampling.repeat_penalty;
        self.repeat_last_n = sampling.repeat_last_n;
        self.frequency_penalty = sampling.frequency_penalty;
        self.presence_penalty = sampling.presence_penalty;
        self.dry_multiplier = sampling.dry_multiplier;
        self.dry_base = sampling.dry_base;
        self.dry_allowed_length = sampling.dry_allowed_length;
        self.xtc_probability = sampling.xtc_probability;
        self.xtc_threshold = sampling.xtc_threshold;
        if sampling.max_tokens.is_some() {
            self.max_tokens = sampling.max_tokens;
        }
        self.enable_thinking = sampling.enable_thinking;
        self.reasoning_effort = sampling.reasoning_effort.map(|e| e.as_str().to_string());
        self
    }
}

/// Wire-level tool declaration (OpenAI function style).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    #[serde(rename = "type")]
    pub kind: String,
    pub function: FunctionDefinition,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

impl ToolDefinition {
    /// Render a domain tool spec as a JSON-schema function declaration.
    pub fn from_spec(spec: &ToolSpec) -> Self {
        let mut properties = serde_json::Map::new();
        for param in spec.required_params.iter().chain(&spec.optional_params) {
            properties.insert(
                param.clone(),
                serde_json::json!({ "type": "string" }),
            );
        }
        Self {
            kind: "function".to_string(),
            function: FunctionDefinition {
                name: spec.name.clone(),
                description: spec.description.clone(),
                parameters: serde_json::json!({
                    "type": "object",
                    "properties": properties,
                    "required": spec.required_params,
                }),
            },
        }
    }
}

/// One incremental chunk from the stream.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatCompletionChunk {
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChunkChoice {
    #[serde(default)]
    pub delta: ChoiceDelta,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChoiceDelta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallDelta>>,
}

/// Incremental tool-call patch keyed by `index`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallDelta {
    pub index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function: Option<FunctionDelta>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FunctionDelta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,
}

/// Stream of parsed chunks. Dropping the stream aborts the transfer, which
/// is how cancellation propagates into the transport.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<ChatCompletionChunk, TransportError>> + Send>>;

/// Port for the streaming chat collaborator.
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Issue exactly one streaming chat request.
    async fn stream_chat(&self, request: ChatRequest) -> Result<ChunkStream, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_definition_renders_required_schema() {
        let spec = ToolSpec {
            name: "get_weather".to_string(),
            description: "Look up the weather".to_string(),
            required_params: vec!["location".to_string()],
            optional_params: vec!["unit".to_string()],
        };
        let def = ToolDefinition::from_spec(&spec);
        assert_eq!(def.kind, "function");
        assert_eq!(def.function.parameters["required"][0], "location");
        assert!(def.function.parameters["properties"]["unit"].is_object());
    }

    #[test]
    fn chunk_deserializes_tool_call_delta() {
        let json = r#"{
            "choices": [{
                "delta": {
                    "tool_calls": [{
                        "index": 0,
                        "id": "call_1",
                        "type": "function",
                        "function": {"name": "get_weather", "arguments": "{\"loc"}
                    }]
                },
                "finish_reason": null
            }]
        }"#;
        let chunk: ChatCompletionChunk = serde_json::from_str(json).unwrap();
        let deltas = chunk.choices[0].delta.tool_calls.as_ref().unwrap();
        assert_eq!(deltas[0].index, 0);
        assert_eq!(
            deltas[0].function.as_ref().unwrap().arguments.as_deref(),
            Some("{\"loc")
        );
    }

    #[test]
    fn request_carries_sampling_params_in_wire_casing() {
        let sampling = SamplingCandidate {
            temperature: Some(0.7),
            top_p: Some(0.9),
            ..Default::default()
        };
        let req = ChatRequest::new("s1", vec![ChatMessage::user("hi")]).with_sampling(&sampling);
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["session_id"], "s1");
        assert_eq!(json["stream"], true);
        assert_eq!(json["temperature"], 0.7);
        assert_eq!(json["top_p"], 0.9);
        assert!(json.get("top_k").is_none());
    }
}
