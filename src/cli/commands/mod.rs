pub mod history;
pub mod reevaluate;
pub mod run;

use std::collections::BTreeMap;

use anyhow::{bail, Context, Result};

use crate::domain::models::BestConfigWeights;

/// Parse repeated `name=value` weight arguments. Empty input falls back to
/// ranking by total score alone.
pub fn parse_weights(args: &[String]) -> Result<BestConfigWeights> {
    if args.is_empty() {
        return Ok(BestConfigWeights::total_score_only());
    }
    let mut weights = BTreeMap::new();
    for arg in args {
        let Some((name, value)) = arg.split_once('=') else {
            bail!("invalid weight '{arg}', expected name=value");
        };
        let value: f64 = value
            .parse()
            .with_context(|| format!("invalid weight value in '{arg}'"))?;
        weights.insert(name.trim().to_string(), value);
    }
    let weights = BestConfigWeights(weights);
    weights
        .validate()
        .map_err(|reason| anyhow::anyhow!("invalid weights: {reason}"))?;
    Ok(weights)
}
