//! `tunesmith history` subcommands.

use std::path::Path;

use anyhow::{bail, Context, Result};
use uuid::Uuid;

use crate::cli::output::{format_history_table, format_trial_table};
use crate::infrastructure::config::Config;
use crate::infrastructure::history::open_history_store;
use crate::services::HistoryStore;

async fn open_store(config: &Config) -> HistoryStore {
    open_history_store(
        &config.history.database_url,
        &config.history.fallback_path,
        config.history.max_entries,
    )
    .await
}

pub async fn list(config: &Config, json: bool) -> Result<()> {
    let store = open_store(config).await;
    let entries = store.load().await.context("failed to load history")?;
    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
    } else if entries.is_empty() {
        println!("History is empty.");
    } else {
        println!("{}", format_history_table(&entries));
    }
    Ok(())
}

pub async fn show(config: &Config, run_id: Uuid, json: bool) -> Result<()> {
    let store = open_store(config).await;
    let Some(entry) = store.get(run_id).await.context("failed to read history")? else {
        bail!("no history entry with id {run_id}");
    };
    if json {
        println!("{}", serde_json::to_string_pretty(&entry)?);
    } else {
        println!(
            "Run {} ({}, saved {})",
            entry.id,
            entry.sweep_mode.as_str(),
            entry.saved_at.format("%Y-%m-%d %H:%M:%S")
        );
        if let Some(model) = &entry.model_id {
            println!("  Model: {model}");
        }
        println!("  Status: {}", entry.run.status.as_str());
        println!("{}", format_trial_table(&entry.run));
    }
    Ok(())
}

pub async fn delete(config: &Config, run_ids: &[Uuid], json: bool) -> Result<()> {
    if run_ids.is_empty() {
        bail!("no run ids given");
    }
    let store = open_store(config).await;
    let deleted = store
        .delete_many(run_ids)
        .await
        .context("failed to delete history entries")?;
    if json {
        println!("{}", serde_json::json!({ "deleted": deleted }));
    } else {
        println!("Deleted {deleted} entr{}.", if deleted == 1 { "y" } else { "ies" });
    }
    Ok(())
}

pub async fn export(config: &Config, output: Option<&Path>, json: bool) -> Result<()> {
    let store = open_store(config).await;
    let envelope = store.export().await.context("failed to export history")?;
    match output {
        Some(path) => {
            std::fs::write(path, &envelope)
                .with_context(|| format!("failed to write {}", path.display()))?;
            if json {
                println!("{}", serde_json::json!({ "written": path.display().to_string() }));
            } else {
                println!("Exported history to {}.", path.display());
            }
        }
        None => println!("{envelope}"),
    }
    Ok(())
}

pub async fn import(config: &Config, input: &Path, json: bool) -> Result<()> {
    let text = std::fs::read_to_string(input)
        .with_context(|| format!("failed to read {}", input.display()))?;
    let store = open_store(config).await;
    let outcome = store.import(&text).await.context("import failed")?;
    if json {
        println!(
            "{}",
            serde_json::json!({ "imported": outcome.imported, "skipped": outcome.skipped })
        );
    } else {
        println!(
            "Imported {} entries, skipped {}.",
            outcome.imported, outcome.skipped
        );
    }
    Ok(())
}
