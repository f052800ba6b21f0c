//! Built-in scenario catalog.
//!
//! Three fixed scenarios: `chat` (exact/regex-scored quality prompts),
//! `tool_call` (tool-call-scored prompts around a declared weather tool),
//! and `context_fill` (timing-only prompts synthesized at calibration time).

use crate::domain::models::{
    ChatMessage, Expectation, PromptDef, Scenario, ScenarioId, ToolSpec,
};

/// Fill percentages benchmarked by the context-fill scenario.
pub const FILL_LEVELS: [u8; 4] = [0, 20, 50, 80];

/// Heuristic used to size fill prompts from a token budget.
const CHARS_PER_TOKEN: usize = 4;

/// The weather tool every tool-call prompt declares.
pub fn weather_tool() -> ToolSpec {
    ToolSpec {
        name: "get_weather".to_string(),
        description: "Get the current weather for a location".to_string(),
        required_params: vec!["location".to_string()],
        optional_params: vec!["unit".to_string()],
    }
}

/// Probe prompt used during template repair: a model whose template is
/// intact answers this with a valid `get_weather` call.
pub fn weather_probe_prompt() -> PromptDef {
    let mut prompt = PromptDef::new(
        "probe_weather",
        vec![ChatMessage::user(
            "What is the weather in Paris right now? Use the get_weather tool.",
        )],
    );
    prompt.tools = vec![weather_tool()];
    prompt.expected = Some(Expectation::ToolCall);
    prompt.max_tokens = Some(256);
    prompt
}

fn chat_scenario() -> Scenario {
    let mut exact = PromptDef::new(
        "chat_exact_pineapple",
        vec![
            ChatMessage::system("Answer with exactly the requested word and nothing else."),
            ChatMessage::user("Reply with exactly the word: pineapple"),
        ],
    );
    exact.expected = Some(Expectation::Exact {
        value: "pineapple".to_string(),
    });
    exact.max_tokens = Some(32);

    let mut arithmetic = PromptDef::new(
        "chat_exact_arithmetic",
        vec![
            ChatMessage::system("Answer with only the number, no punctuation."),
            ChatMessage::user("What is 17 + 25?"),
        ],
    );
    arithmetic.expected = Some(Expectation::Exact {
        value: "42".to_string(),
    });
    arithmetic.max_tokens = Some(32);

    let mut haiku = PromptDef::new(
        "chat_regex_haiku",
        vec![ChatMessage::user(
            "Write a three-line haiku about winter. Output only the haiku.",
        )],
    );
    haiku.expected = Some(Expectation::Regex {
        value: r"^\s*\S.*\n.*\S.*\n.*\S".to_string(),
    });
    haiku.max_tokens = Some(128);

    Scenario {
        id: ScenarioId::Chat,
        name: "Chat quality".to_string(),
        prompts: vec![exact, arithmetic, haiku],
    }
}

fn tool_call_scenario() -> Scenario {
    let mut call = PromptDef::new(
        "tool_weather_call",
        vec![ChatMessage::user(
            "I'm in Tokyo. Check the current weather for me with the get_weather tool.",
        )],
    );
    call.tools = vec![weather_tool()];
    call.expected = Some(Expectation::ToolCall);
    call.max_tokens = Some(256);

    let mut no_call = PromptDef::new(
        "tool_no_call",
        vec![ChatMessage::user(
            "Say hello in one short sentence. Do not use any tools.",
        )],
    );
    no_call.tools = vec![weather_tool()];
    no_call.expected = Some(Expectation::NoToolCall);
    no_call.max_tokens = Some(64);

    Scenario {
        id: ScenarioId::ToolCall,
        name: "Tool calling".to_string(),
        prompts: vec![call, no_call],
    }
}

fn context_fill_scenario() -> Scenario {
    // Prompts are synthesized during calibration once the context window is
    // known; until then the scenario is empty.
    Scenario {
        id: ScenarioId::ContextFill,
        name: "Context fill performance".to_string(),
        prompts: Vec::new(),
    }
}

/// The fixed catalog, in execution order.
pub fn builtin_scenarios() -> Vec<Scenario> {
    vec![chat_scenario(), tool_call_scenario(), context_fill_scenario()]
}

/// Synthesize timing-only fill prompts for a context window.
///
/// Each prompt carries filler text sized to approximately
/// `fill_pct% * context_window` tokens under a ~4 chars/token heuristic.
pub fn fill_prompts(context_window: u32) -> Vec<PromptDef> {
    let filler_sentence = "The quick brown fox jumps over the lazy dog near the riverbank. ";
    FILL_LEVELS
        .iter()
        .map(|&pct| {
            let target_tokens = (u64::from(context_window) * u64::from(pct)) / 100;
            let target_chars = target_tokens as usize * CHARS_PER_TOKEN;
            let mut body = String::with_capacity(target_chars + filler_sentence.len());
            while body.len() < target_chars {
                body.push_str(filler_sentence);
            }
            body.push_str("\nSummarize the text above in one sentence.");
            let mut prompt =
                PromptDef::new(format!("fill_{pct}"), vec![ChatMessage::user(body)]);
            prompt.max_tokens = Some(128);
            prompt.fill_pct = Some(pct);
            prompt
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_is_ordered_chat_tool_fill() {
        let ids: Vec<ScenarioId> = builtin_scenarios().iter().map(|s| s.id).collect();
        assert_eq!(
            ids,
            vec![ScenarioId::Chat, ScenarioId::ToolCall, ScenarioId::ContextFill]
        );
    }

    #[test]
    fn tool_prompts_declare_the_weather_tool() {
        let scenarios = builtin_scenarios();
        let scenario = scenarios
            .iter()
            .find(|s| s.id == ScenarioId::ToolCall)
            .unwrap();
        assert!(scenario
            .prompts
            .iter()
            .all(|p| p.tools.iter().any(|t| t.name == "get_weather")));
    }

    #[test]
    fn fill_prompts_cover_all_levels_and_scale() {
        let prompts = fill_prompts(8192);
        assert_eq!(prompts.len(), 4);
        let fills: Vec<u8> = prompts.iter().filter_map(|p| p.fill_pct).collect();
        assert_eq!(fills, vec![0, 20, 50, 80]);
        // 80% prompt is much larger than the 20% prompt.
        let len20 = prompts[1].messages[0].content.len();
        let len80 = prompts[3].messages[0].content.len();
        assert!(len80 > len20 * 3);
        // Timing-only: no expectation.
        assert!(prompts.iter().all(|p| p.expected.is_none()));
    }
}
