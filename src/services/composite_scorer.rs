//! Composite scoring and best-trial selection.
//!
//! Pure and deterministic: the same trial snapshot and weights always yield
//! the same composite, so selection can be re-run at any time against
//! persisted trials (reevaluation) without re-running inference.
//!
//! Lower-is-better metrics (TTFT and its fill-level variants) are negated
//! before weighting so that a higher composite always means more preferred.

use uuid::Uuid;

use crate::domain::models::{BestConfigWeights, TrialResult, TrialStatus};

/// Tolerance for composite ties; within it, raw avgTps breaks the tie.
const TIE_EPS: f64 = 1e-6;

/// Read one metric off a trial by its weight key. `None` when the metric is
/// absent (e.g. the scenario did not run).
fn metric_value(trial: &TrialResult, metric: &str) -> Option<f64> {
    match metric {
        "chatScore" => trial.chat_score(),
        "toolScore" => trial.tool_score(),
        "totalScore" => trial.total_score,
        "avgTps" => trial.avg_tps,
        "avgTtft" => trial.avg_ttft.map(|v| -v),
        _ => {
            if let Some(fill) = metric.strip_prefix("tps@") {
                let fill: u8 = fill.parse().ok()?;
                trial.avg_tps_by_fill.get(&fill).copied()
            } else if let Some(fill) = metric.strip_prefix("ttft@") {
                let fill: u8 = fill.parse().ok()?;
                trial.avg_ttft_by_fill.get(&fill).copied().map(|v| -v)
            } else {
                None
            }
        }
    }
}

/// Weighted objective across the trial's metrics. Metrics absent on the
/// trial contribute zero regardless of weight.
pub fn composite_score(trial: &TrialResult, weights: &BestConfigWeights) -> f64 {
    weights
        .0
        .iter()
        .filter(|(_, &w)| w > 0.0)
        .map(|(metric, &w)| metric_value(trial, metric).map_or(0.0, |v| w * v))
        .sum()
}

/// Whether any positively-weighted metric is defined on the trial.
fn has_scored_metric(trial: &TrialResult, weights: &BestConfigWeights) -> bool {
    weights
        .0
        .iter()
        .any(|(metric, &w)| w > 0.0 && metric_value(trial, metric).is_some())
}

/// Select the best trial under the weighted objective.
///
/// Only completed trials with at least one defined weighted metric compete.
/// Ties within floating-point tolerance are broken by raw avgTps.
pub fn select_best(trials: &[TrialResult], weights: &BestConfigWeights) -> Option<Uuid> {
    let mut best: Option<(&TrialResult, f64)> = None;
    for trial in trials {
        if trial.status != TrialStatus::Completed || !has_scored_metric(trial, weights) {
            continue;
        }
        let score = composite_score(trial, weights);
        best = match best {
            None => Some((trial, score)),
            Some((current, current_score)) => {
                if score > current_score + TIE_EPS {
                    Some((trial, score))
                } else if (score - current_score).abs() <= TIE_EPS {
                    let current_tps = current.avg_tps.unwrap_or(f64::NEG_INFINITY);
                    let tps = trial.avg_tps.unwrap_or(f64::NEG_INFINITY);
                    if tps > current_tps {
                        Some((trial, score))
                    } else {
                        Some((current, current_score))
                    }
                } else {
                    Some((current, current_score))
                }
            }
        };
    }
    best.map(|(trial, _)| trial.id)
}
