//! Sweep definitions.
//!
//! A sweep definition describes what the Candidate Generator should expand:
//! a baseline plus per-axis ranges for sampling sweeps, or per-axis value
//! lists for config sweeps.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::candidate::{CacheMode, CacheType, ReasoningEffort, SamplingAxis, SamplingCandidate};

/// Inclusive `(min, max, step)` range for one numeric axis.
///
/// `min == max` means the axis is pinned to the baseline and produces no
/// variation. `min > max` or a non-finite/non-positive step is a validation
/// error at generation time, never silently clamped.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisRange {
    pub min: f64,
    pub max: f64,
    pub step: f64,
}

impl AxisRange {
    pub fn new(min: f64, max: f64, step: f64) -> Self {
        Self { min, max, step }
    }

    /// A range that pins the axis to a single value.
    pub fn pinned(value: f64) -> Self {
        Self {
            min: value,
            max: value,
            step: 0.0,
        }
    }

    pub fn is_pinned(&self) -> bool {
        // Exact comparison is intentional: a pinned axis is authored as
        // min == max, not computed.
        self.min == self.max
    }
}

/// Definition of a sampling-parameter sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SamplingSweep {
    /// Baseline candidate, always included in the generated list exactly once.
    pub baseline: SamplingCandidate,
    /// Per-axis ranges. Axes not present are left at the baseline value.
    /// `BTreeMap` keeps axis iteration order deterministic.
    #[serde(default)]
    pub axes: BTreeMap<SamplingAxis, AxisRange>,
    /// Selected `enable_thinking` checkbox values, one extra candidate each.
    #[serde(default)]
    pub enable_thinking: Vec<bool>,
    /// Selected `reasoning_effort` checkbox values, one extra candidate each.
    #[serde(default)]
    pub reasoning_effort: Vec<ReasoningEffort>,
}

/// Definition of a server-load config sweep.
///
/// Every axis is a discrete value list; the generator takes the full
/// cartesian product and filters combinations violating `n_ubatch <= n_batch`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigSweep {
    pub context_window: Vec<u32>,
    pub n_batch: Vec<u32>,
    pub n_ubatch: Vec<u32>,
    pub n_seq_max: Vec<u32>,
    pub flash_attention: Vec<bool>,
    pub cache_type: Vec<CacheType>,
    pub cache_mode: Vec<CacheMode>,
}

impl Default for ConfigSweep {
    fn default() -> Self {
        Self {
            context_window: vec![8192],
            n_batch: vec![2048],
            n_ubatch: vec![512],
            n_seq_max: vec![1],
            flash_attention: vec![true],
            cache_type: vec![CacheType::F16],
            cache_mode: vec![CacheMode::Unified],
        }
    }
}

/// What kind of sweep a run performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SweepMode {
    Sampling,
    Config,
}

impl SweepMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sampling => "sampling",
            Self::Config => "config",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "sampling" => Some(Self::Sampling),
            "config" => Some(Self::Config),
            _ => None,
        }
    }
}

/// Full sweep definition, discriminated by mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SweepDefinition {
    Sampling(SamplingSweep),
    Config(ConfigSweep),
}

impl SweepDefinition {
    pub fn mode(&self) -> SweepMode {
        match self {
            Self::Sampling(_) => SweepMode::Sampling,
            Self::Config(_) => SweepMode::Config,
        }
    }
}
