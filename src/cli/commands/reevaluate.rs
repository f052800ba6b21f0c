//! `tunesmith reevaluate` command.
//!
//! Re-runs best-trial selection against an already-persisted run under new
//! weights, without re-running any inference, and writes the new selection
//! and weights back to the stored entry.

use anyhow::{bail, Context, Result};
use uuid::Uuid;

use crate::cli::output::format_trial_table;
use crate::domain::models::BestConfigWeights;
use crate::infrastructure::config::Config;
use crate::infrastructure::history::open_history_store;
use crate::services::composite_scorer::select_best;

pub async fn execute(
    config: &Config,
    run_id: Uuid,
    weights: BestConfigWeights,
    json: bool,
) -> Result<()> {
    let store = open_history_store(
        &config.history.database_url,
        &config.history.fallback_path,
        config.history.max_entries,
    )
    .await;

    let Some(entry) = store.get(run_id).await.context("failed to read history")? else {
        bail!("no history entry with id {run_id}");
    };

    let best = select_best(&entry.run.trials, &weights);
    let updated = store
        .update(run_id, |entry| {
            entry.run.weights = weights.clone();
            entry.run.best_trial_id = best;
        })
        .await
        .context("failed to update history entry")?;
    if !updated {
        bail!("history entry {run_id} disappeared during reevaluation");
    }

    let Some(entry) = store.get(run_id).await.context("failed to re-read entry")? else {
        bail!("history entry {run_id} disappeared during reevaluation");
    };

    if json {
        println!(
            "{}",
            serde_json::json!({ "runId": run_id, "bestTrialId": best })
        );
    } else {
        match best {
            Some(id) => println!("Best trial under new weights: {id}"),
            None => println!("No eligible trial under the new weights."),
        }
        println!("{}", format_trial_table(&entry.run));
    }
    Ok(())
}
