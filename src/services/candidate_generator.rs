//! Candidate generation.
//!
//! Sampling sweeps use a one-factor-at-a-time design: the baseline plus, per
//! swept axis, one candidate per enumerated value with only that axis
//! changed. Trial count therefore grows linearly with axis count and
//! resolution. Config sweeps take the full cartesian product of the enabled
//! value lists and filter out combinations violating `n_ubatch <= n_batch`.

use tracing::debug;

use crate::domain::errors::{SweepError, SweepResult};
use crate::domain::models::{
    AxisRange, Candidate, ConfigCandidate, ConfigSweep, SamplingAxis, SamplingSweep,
    SweepDefinition,
};

/// Tolerance when comparing enumerated values against the baseline.
const VALUE_EPS: f64 = 1e-9;

/// Expand a sweep definition into the ordered candidate list.
pub fn generate(definition: &SweepDefinition) -> SweepResult<Vec<Candidate>> {
    match definition {
        SweepDefinition::Sampling(sweep) => {
            let candidates = generate_sampling(sweep)?;
            Ok(candidates.into_iter().map(Candidate::Sampling).collect())
        }
        SweepDefinition::Config(sweep) => {
            let candidates = generate_config(sweep)?;
            Ok(candidates.into_iter().map(Candidate::Config).collect())
        }
    }
}

fn validate_range(axis: SamplingAxis, range: &AxisRange) -> SweepResult<()> {
    if !range.min.is_finite() || !range.max.is_finite() {
        return Err(SweepError::validation(format!(
            "axis {}: bounds must be finite",
            axis.as_str()
        )));
    }
    if range.min > range.max {
        return Err(SweepError::validation(format!(
            "axis {}: min {} exceeds max {}",
            axis.as_str(),
            range.min,
            range.max
        )));
    }
    if !range.is_pinned() && (!range.step.is_finite() || range.step <= 0.0) {
        return Err(SweepError::validation(format!(
            "axis {}: step {} is not a positive finite number",
            axis.as_str(),
            range.step
        )));
    }
    Ok(())
}

/// Enumerate `min, min+step, ..., max` inclusive.
fn enumerate_range(range: &AxisRange) -> Vec<f64> {
    let mut values = Vec::new();
    let mut v = range.min;
    while v <= range.max + VALUE_EPS {
        values.push(v.min(range.max));
        v += range.step;
    }
    values
}

fn generate_sampling(
    sweep: &SamplingSweep,
) -> SweepResult<Vec<crate::domain::models::SamplingCandidate>> {
    for (axis, range) in &sweep.axes {
        validate_range(*axis, range)?;
    }

    let mut candidates = vec![sweep.baseline.clone()];

    for (axis, range) in &sweep.axes {
        if range.is_pinned() {
            continue;
        }
        let baseline_value = axis.get(&sweep.baseline);
        for value in enumerate_range(range) {
            // The baseline is in the list exactly once; an enumerated value
            // landing on it would duplicate it.
            if baseline_value.is_some_and(|b| (b - value).abs() < VALUE_EPS) {
                continue;
            }
            let mut candidate = sweep.baseline.clone();
            axis.set(&mut candidate, value);
            candidates.push(candidate);
        }
    }

    for &thinking in &sweep.enable_thinking {
        if sweep.baseline.enable_thinking == Some(thinking) {
            continue;
        }
        let mut candidate = sweep.baseline.clone();
        candidate.enable_thinking = Some(thinking);
        candidates.push(candidate);
    }
    for &effort in &sweep.reasoning_effort {
        if sweep.baseline.reasoning_effort == Some(effort) {
            continue;
        }
        let mut candidate = sweep.baseline.clone();
        candidate.reasoning_effort = Some(effort);
        candidates.push(candidate);
    }

    debug!(count = candidates.len(), "generated sampling candidates");
    Ok(candidates)
}

fn generate_config(sweep: &ConfigSweep) -> SweepResult<Vec<ConfigCandidate>> {
    for (name, empty) in [
        ("context_window", sweep.context_window.is_empty()),
        ("nbatch", sweep.n_batch.is_empty()),
        ("nubatch", sweep.n_ubatch.is_empty()),
        ("nseq_max", sweep.n_seq_max.is_empty()),
        ("flash_attention", sweep.flash_attention.is_empty()),
        ("cache_type", sweep.cache_type.is_empty()),
        ("cache_mode", sweep.cache_mode.is_empty()),
    ] {
        if empty {
            return Err(SweepError::validation(format!(
                "config sweep axis {name} has no values"
            )));
        }
    }

    let mut candidates = Vec::new();
    for &context_window in &sweep.context_window {
        for &n_batch in &sweep.n_batch {
            for &n_ubatch in &sweep.n_ubatch {
                for &n_seq_max in &sweep.n_seq_max {
                    for &flash_attention in &sweep.flash_attention {
                        for &cache_type in &sweep.cache_type {
                            for &cache_mode in &sweep.cache_mode {
                                let candidate = ConfigCandidate {
                                    context_window,
                                    n_batch,
                                    n_ubatch,
                                    n_seq_max,
                                    flash_attention,
                                    cache_type,
                                    cache_mode,
                                };
                                if candidate.is_valid() {
                                    candidates.push(candidate);
                                }
                            }
                        }
                    }
                }
            }
        }
    }

    if candidates.is_empty() {
        return Err(SweepError::validation(
            "no valid candidates: every combination violates nubatch <= nbatch",
        ));
    }

    debug!(count = candidates.len(), "generated config candidates");
    Ok(candidates)
}
