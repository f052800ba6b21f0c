//! Response scoring.
//!
//! Pure functions turning an accumulated response (text + tool calls) into a
//! 0..=100 score, per the expectation attached to the prompt.

use regex::RegexBuilder;

use crate::domain::models::{EmittedToolCall, Expectation, PromptDef, ToolSpec};

/// Responses longer than this incur a flat penalty regardless of match type.
const MAX_RESPONSE_CHARS: usize = 2000;
const LENGTH_PENALTY: f64 = 10.0;

const UNDECLARED_TOOL_PENALTY: f64 = 40.0;
const MISSING_PARAM_PENALTY: f64 = 20.0;
const UNPARSEABLE_ARGS_PENALTY: f64 = 30.0;

/// Score an accumulated response against its prompt's expectation.
///
/// Returns the clamped score and human-readable notes explaining any
/// deductions. Prompts without an expectation are timing-only and score 100
/// (minus the length penalty, which always applies).
pub fn score_response(
    prompt: &PromptDef,
    text: &str,
    tool_calls: &[EmittedToolCall],
) -> (f64, Vec<String>) {
    let mut notes = Vec::new();

    let mut score = match &prompt.expected {
        None => 100.0,
        Some(Expectation::Exact { value }) => score_exact(value, text, &mut notes),
        Some(Expectation::Regex { value }) => score_regex(value, text, &mut notes),
        Some(Expectation::ToolCall) => score_tool_calls(&prompt.tools, tool_calls, &mut notes),
        Some(Expectation::NoToolCall) => {
            if tool_calls.is_empty() {
                100.0
            } else {
                notes.push(format!(
                    "expected no tool calls, got {}",
                    tool_calls.len()
                ));
                0.0
            }
        }
    };

    if text.chars().count() > MAX_RESPONSE_CHARS {
        score -= LENGTH_PENALTY;
        notes.push(format!(
            "response exceeds {MAX_RESPONSE_CHARS} characters"
        ));
    }

    (score.clamp(0.0, 100.0), notes)
}

fn score_exact(target: &str, text: &str, notes: &mut Vec<String>) -> f64 {
    let response = text.trim().to_lowercase();
    let target = target.trim().to_lowercase();
    if response == target {
        100.0
    } else if response.contains(&target) {
        notes.push("target found with extra surrounding text".to_string());
        50.0
    } else {
        notes.push(format!("expected '{target}'"));
        0.0
    }
}

fn score_regex(pattern: &str, text: &str, notes: &mut Vec<String>) -> f64 {
    match RegexBuilder::new(pattern)
        .case_insensitive(true)
        .multi_line(true)
        .build()
    {
        Ok(re) if re.is_match(text) => 100.0,
        Ok(_) => {
            notes.push(format!("response does not match /{pattern}/"));
            0.0
        }
        Err(err) => {
            notes.push(format!("invalid expectation regex: {err}"));
            0.0
        }
    }
}

/// Tool-call scoring starts at 100 and deducts per defect:
/// 40 per call to an undeclared tool, 30 per call whose arguments do not
/// parse as a JSON object, 20 per missing required parameter.
fn score_tool_calls(
    declared: &[ToolSpec],
    tool_calls: &[EmittedToolCall],
    notes: &mut Vec<String>,
) -> f64 {
    if tool_calls.is_empty() {
        notes.push("expected a tool call, got none".to_string());
        return 0.0;
    }

    let mut score = 100.0;
    for call in tool_calls {
        let Some(spec) = declared.iter().find(|t| t.name == call.name) else {
            score -= UNDECLARED_TOOL_PENALTY;
            notes.push(format!("call to undeclared tool '{}'", call.name));
            continue;
        };

        // Models commonly emit "" for tools that take no arguments; treat it
        // as an empty object rather than malformed JSON. Missing required
        // parameters are still deducted below.
        let args = if call.arguments.trim().is_empty() {
            Ok(serde_json::Value::Object(serde_json::Map::new()))
        } else {
            serde_json::from_str::<serde_json::Value>(&call.arguments)
        };
        match args {
            Ok(serde_json::Value::Object(fields)) => {
                for required in &spec.required_params {
                    if !fields.contains_key(required) {
                        score -= MISSING_PARAM_PENALTY;
                        notes.push(format!(
                            "call to '{}' missing required parameter '{required}'",
                            call.name
                        ));
                    }
                }
            }
            _ => {
                score -= UNPARSEABLE_ARGS_PENALTY;
                notes.push(format!(
                    "arguments of '{}' are not a JSON object",
                    call.name
                ));
            }
        }
    }

    score.clamp(0.0, 100.0)
}
