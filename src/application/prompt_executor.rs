//! Single-prompt streaming execution.
//!
//! Issues one streaming chat request, accumulates deltas into a final
//! response, and scores it. Transport failures degrade to a zero-score
//! result with an explanatory note so one bad prompt never sinks the trial;
//! cancellation is the only condition that propagates as an error.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::domain::errors::{SweepError, SweepResult};
use crate::domain::models::{EmittedToolCall, PromptDef, PromptResult, SamplingCandidate, Usage};
use crate::domain::ports::{ChatClient, ChatRequest, ToolDefinition};
use crate::services::scoring::score_response;

/// Executes prompts against an existing session.
pub struct PromptExecutor {
    chat: Arc<dyn ChatClient>,
}

#[derive(Default)]
struct PendingToolCall {
    id: Option<String>,
    name: String,
    arguments: String,
}

impl PromptExecutor {
    pub fn new(chat: Arc<dyn ChatClient>) -> Self {
        Self { chat }
    }

    /// Run one prompt to completion.
    ///
    /// Returns `Err(SweepError::Cancelled)` only when the token fires
    /// mid-stream; the partial accumulation is discarded. Every other
    /// failure mode produces an `Ok` result carrying a zero score.
    pub async fn execute(
        &self,
        session_id: &str,
        prompt: &PromptDef,
        sampling: Option<&SamplingCandidate>,
        cancel: &CancellationToken,
    ) -> SweepResult<PromptResult> {
        let mut request = ChatRequest::new(session_id, prompt.messages.clone());
        if !prompt.tools.is_empty() {
            request.tools = Some(prompt.tools.iter().map(ToolDefinition::from_spec).collect());
        }
        request.max_tokens = prompt.max_tokens;
        if let Some(sampling) = sampling {
            request = request.with_sampling(sampling);
        }

        if cancel.is_cancelled() {
            return Err(SweepError::Cancelled);
        }
        // The request itself races the token, so a blocked server cannot
        // pin a cancelled run until the transport timeout.
        let established = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(SweepError::Cancelled),
            result = self.chat.stream_chat(request) => result,
        };
        let mut stream = match established {
            Ok(stream) => stream,
            Err(err) => {
                warn!(prompt = %prompt.id, error = %err, "chat request failed");
                return Ok(failed_result(prompt, format!("request failed: {err}")));
            }
        };

        let mut text = String::new();
        let mut pending: BTreeMap<usize, PendingToolCall> = BTreeMap::new();
        let mut usage: Option<Usage> = None;

        loop {
            let chunk = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    // Dropping the stream aborts the transfer.
                    debug!(prompt = %prompt.id, "prompt cancelled mid-stream");
                    return Err(SweepError::Cancelled);
                }
                next = stream.next() => next,
            };
            let chunk = match chunk {
                Some(Ok(chunk)) => chunk,
                Some(Err(err)) => {
                    warn!(prompt = %prompt.id, error = %err, "stream failed");
                    return Ok(failed_result(prompt, format!("stream failed: {err}")));
                }
                None => break,
            };

            if chunk.usage.is_some() {
                usage = chunk.usage;
            }
            for choice in chunk.choices {
                if let Some(content) = choice.delta.content {
                    text.push_str(&content);
                }
                for delta in choice.delta.tool_calls.unwrap_or_default() {
                    let call = pending.entry(delta.index).or_default();
                    if delta.id.is_some() {
                        call.id = delta.id;
                    }
                    if let Some(function) = delta.function {
                        if let Some(name) = function.name {
                            call.name = name;
                        }
                        if let Some(arguments) = function.arguments {
                            call.arguments.push_str(&arguments);
                        }
                    }
                }
            }
        }

        let tool_calls: Vec<EmittedToolCall> = pending
            .into_values()
            .map(|call| EmittedToolCall {
                id: call.id,
                name: call.name,
                arguments: call.arguments,
            })
            .collect();

        let (score, notes) = score_response(prompt, &text, &tool_calls);
        debug!(prompt = %prompt.id, score, "prompt finished");
        Ok(PromptResult {
            prompt_id: prompt.id.clone(),
            assistant_text: text,
            tool_calls,
            usage,
            score,
            notes,
            fill_pct: prompt.fill_pct,
        })
    }
}

fn failed_result(prompt: &PromptDef, note: String) -> PromptResult {
    PromptResult {
        prompt_id: prompt.id.clone(),
        assistant_text: String::new(),
        tool_calls: Vec::new(),
        usage: None,
        score: 0.0,
        notes: vec![note],
        fill_pct: prompt.fill_pct,
    }
}
