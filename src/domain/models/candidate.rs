//! Candidate domain models.
//!
//! A candidate is one concrete parameter set to be tested: either a set of
//! sampling parameters (sampling sweeps) or a server-load configuration
//! (config sweeps). Candidates are immutable once generated.

use serde::{Deserialize, Serialize};

/// Reasoning effort requested from the model, when the template supports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasoningEffort {
    Low,
    Medium,
    High,
}

impl ReasoningEffort {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

/// A flat record of generation parameters.
///
/// Optional fields are omitted from the chat request when `None`, leaving the
/// server default in effect.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SamplingCandidate {
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
    pub reasoning_effort: Option<ReasoningEffort>,
}

/// Numeric sampling axes that can be swept one at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SamplingAxis {
    Temperature,
    TopP,
    TopK,
    MinP,
    RepeatPenalty,
    RepeatLastN,
    FrequencyPenalty,
    PresencePenalty,
    DryMultiplier,
    DryBase,
    DryAllowedLength,
    XtcProbability,
    XtcThreshold,
    MaxTokens,
}

impl SamplingAxis {
    /// Every axis, in a stable order.
    pub const ALL: [Self; 14] = [
        Self::Temperature,
        Self::TopP,
        Self::TopK,
        Self::MinP,
        Self::RepeatPenalty,
        Self::RepeatLastN,
        Self::FrequencyPenalty,
        Self::PresencePenalty,
        Self::DryMultiplier,
        Self::DryBase,
        Self::DryAllowedLength,
        Self::XtcProbability,
        Self::XtcThreshold,
        Self::MaxTokens,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Temperature => "temperature",
            Self::TopP => "top_p",
            Self::TopK => "top_k",
            Self::MinP => "min_p",
            Self::RepeatPenalty => "repeat_penalty",
            Self::RepeatLastN => "repeat_last_n",
            Self::FrequencyPenalty => "frequency_penalty",
            Self::PresencePenalty => "presence_penalty",
            Self::DryMultiplier => "dry_multiplier",
            Self::DryBase => "dry_base",
            Self::DryAllowedLength => "dry_allowed_length",
            Self::XtcProbability => "xtc_probability",
            Self::XtcThreshold => "xtc_threshold",
            Self::MaxTokens => "max_tokens",
        }
    }

    /// Read this axis from a candidate as a float, if set.
    pub fn get(&self, candidate: &SamplingCandidate) -> Option<f64> {
        match self {
            Self::Temperature => candidate.temperature,
            Self::TopP => candidate.top_p,
            Self::TopK => candidate.top_k.map(|v| v as f64),
            Self::MinP => candidate.min_p,
            Self::RepeatPenalty => candidate.repeat_penalty,
            Self::RepeatLastN => candidate.repeat_last_n.map(|v| v as f64),
            Self::FrequencyPenalty => candidate.frequency_penalty,
            Self::PresencePenalty => candidate.presence_penalty,
            Self::DryMultiplier => candidate.dry_multiplier,
            Self::DryBase => candidate.dry_base,
            Self::DryAllowedLength => candidate.dry_allowed_length.map(|v| v as f64),
            Self::XtcProbability => candidate.xtc_probability,
            Self::XtcThreshold => candidate.xtc_threshold,
            Self::MaxTokens => candidate.max_tokens.map(|v| v as f64),
        }
    }

    /// Write this axis on a candidate.
    pub fn set(&self, candidate: &mut SamplingCandidate, value: f64) {
        match self {
            Self::Temperature => candidate.temperature = Some(value),
            Self::TopP => candidate.top_p = Some(value),
            Self::TopK => candidate.top_k = Some(value.round() as i64),
            Self::MinP => candidate.min_p = Some(value),
            Self::RepeatPenalty => candidate.repeat_penalty = Some(value),
            Self::RepeatLastN => candidate.repeat_last_n = Some(value.round() as i64),
            Self::FrequencyPenalty => candidate.frequency_penalty = Some(value),
            Self::PresencePenalty => candidate.presence_penalty = Some(value),
            Self::DryMultiplier => candidate.dry_multiplier = Some(value),
            Self::DryBase => candidate.dry_base = Some(value),
            Self::DryAllowedLength => candidate.dry_allowed_length = Some(value.round() as i64),
            Self::XtcProbability => candidate.xtc_probability = Some(value),
            Self::XtcThreshold => candidate.xtc_threshold = Some(value),
            Self::MaxTokens => candidate.max_tokens = Some(value.round() as i64),
        }
    }
}

/// KV cache quantization type for config sweeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheType {
    F16,
    F32,
    Q8_0,
    Q4_0,
}

impl CacheType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::F16 => "f16",
            Self::F32 => "f32",
            Self::Q8_0 => "q8_0",
            Self::Q4_0 => "q4_0",
        }
    }
}

/// Cache allocation mode for config sweeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheMode {
    Unified,
    Split,
    Swa,
}

impl CacheMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unified => "unified",
            Self::Split => "split",
            Self::Swa => "swa",
        }
    }
}

/// A flat record of server-load parameters.
///
/// Invariant: `n_ubatch <= n_batch`. The generator filters violating
/// combinations before a candidate is ever constructed into a trial.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigCandidate {
    pub context_window: u32,
    pub n_batch: u32,
    pub n_ubatch: u32,
    pub n_seq_max: u32,
    pub flash_attention: bool,
    pub cache_type: CacheType,
    pub cache_mode: CacheMode,
}

impl ConfigCandidate {
    /// Check the micro-batch invariant.
    pub fn is_valid(&self) -> bool {
        self.n_ubatch <= self.n_batch
    }

    /// Short human-readable label used in progress output and trial notes.
    pub fn label(&self) -> String {
        format!(
            "ctx={} nbatch={} nubatch={} nseq={} fa={} cache={}/{}",
            self.context_window,
            self.n_batch,
            self.n_ubatch,
            self.n_seq_max,
            self.flash_attention,
            self.cache_type.as_str(),
            self.cache_mode.as_str(),
        )
    }
}

/// One concrete parameter set to be tested, discriminated by sweep mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Candidate {
    Sampling(SamplingCandidate),
    Config(ConfigCandidate),
}

impl Candidate {
    /// Sampling parameters to attach to chat requests, if any.
    pub fn sampling(&self) -> Option<&SamplingCandidate> {
        match self {
            Self::Sampling(c) => Some(c),
            Self::Config(_) => None,
        }
    }

    /// Parallel-sequence budget that bounds concurrent prompt execution.
    ///
    /// Sampling candidates carry no sequence budget and run strictly
    /// sequentially.
    pub fn n_seq_max(&self) -> Option<u32> {
        match self {
            Self::Sampling(_) => None,
            Self::Config(c) => Some(c.n_seq_max),
        }
    }

    /// Short human-readable label used in progress output and trial notes.
    pub fn label(&self) -> String {
        match self {
            Self::Sampling(c) => {
                let mut parts: Vec<String> = Vec::new();
                for axis in SamplingAxis::ALL {
                    if let Some(value) = axis.get(c) {
                        parts.push(format!("{}={value}", axis.as_str()));
                    }
                }
                if let Some(thinking) = c.enable_thinking {
                    parts.push(format!("thinking={thinking}"));
                }
                if let Some(effort) = c.reasoning_effort {
                    parts.push(format!("effort={}", effort.as_str()));
                }
                if parts.is_empty() {
                    "server defaults".to_string()
                } else {
                    parts.join(" ")
                }
            }
            Self::Config(c) => c.label(),
        }
    }
}
