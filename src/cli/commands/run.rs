//! `tunesmith run sampling|config` command.

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tokio::sync::broadcast;

use crate::application::{PromptExecutor, RunController, RunEvent, RunManager, RunSettings};
use crate::cli::output::{create_spinner, format_trial_table};
use crate::domain::models::{BestConfigWeights, RunStatus, SweepDefinition, SweepMode};
use crate::infrastructure::config::Config;
use crate::infrastructure::history::open_history_store;
use crate::infrastructure::llm::{HttpChatClient, HttpSessionClient, LlmClientConfig};

pub async fn execute(
    config: &Config,
    expected_mode: SweepMode,
    sweep_path: &Path,
    weights: BestConfigWeights,
    json: bool,
) -> Result<()> {
    let sweep_text = std::fs::read_to_string(sweep_path)
        .with_context(|| format!("failed to read sweep file {}", sweep_path.display()))?;
    let definition: SweepDefinition =
        serde_yaml::from_str(&sweep_text).context("invalid sweep definition")?;
    if definition.mode() != expected_mode {
        bail!(
            "sweep file defines a {} sweep, but the {} subcommand was used",
            definition.mode().as_str(),
            expected_mode.as_str()
        );
    }
    if config.model_id.trim().is_empty() {
        bail!("model_id is not configured");
    }

    let llm_config = LlmClientConfig {
        base_url: config.server.base_url.clone(),
        api_key: config.server.api_key.clone(),
        timeout_secs: config.server.timeout_secs,
    };
    let chat = Arc::new(HttpChatClient::new(llm_config.clone())?);
    let sessions = Arc::new(HttpSessionClient::new(llm_config)?);
    let history = Arc::new(
        open_history_store(
            &config.history.database_url,
            &config.history.fallback_path,
            config.history.max_entries,
        )
        .await,
    );

    let (events, mut event_rx) = broadcast::channel(256);
    let controller = Arc::new(RunController::new(
        sessions,
        Arc::new(PromptExecutor::new(chat)),
        history,
        events,
        RunSettings {
            model_id: config.model_id.clone(),
            session_id: config.session_id.clone(),
            template: None,
            context_window: config.context_window,
        },
    ));
    let manager = Arc::new(RunManager::new(controller));

    manager
        .start(definition, weights)
        .await
        .context("failed to start run")?;

    let spinner = (!json).then(|| create_spinner("starting run"));
    let event_spinner = spinner.clone();
    let progress = tokio::spawn(async move {
        while let Ok(event) = event_rx.recv().await {
            if let Some(spinner) = &event_spinner {
                match &event {
                    RunEvent::StatusChanged(status) => {
                        spinner.set_message(format!("status: {}", status.as_str()));
                    }
                    RunEvent::TrialStarted(id) => {
                        spinner.set_message(format!("trial {id} running"));
                    }
                    RunEvent::TrialFinished(id, status) => {
                        spinner.set_message(format!("trial {id} {}", status.as_str()));
                    }
                    _ => {}
                }
            }
            if matches!(event, RunEvent::RunFinished(_)) {
                break;
            }
        }
    });
    // Ctrl-C requests cooperative cancellation; the run still reaches a
    // terminal state and is persisted.
    let ctrl_c = {
        let manager = Arc::clone(&manager);
        let spinner = spinner.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                if let Some(spinner) = &spinner {
                    spinner.set_message("cancelling".to_string());
                }
                manager.cancel().await;
            }
        })
    };
    let run = manager.wait().await;
    ctrl_c.abort();
    progress.abort();
    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }

    let Some(run) = run else {
        bail!("run task failed unexpectedly");
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&run)?);
    } else {
        println!("Run {} finished: {}", run.run_id, run.status.as_str());
        if let Some(error) = &run.error {
            println!("  Error: {error}");
        }
        if !run.trials.is_empty() {
            println!("{}", format_trial_table(&run));
        }
    }

    if run.status == RunStatus::Error {
        bail!(
            "run ended in error: {}",
            run.error.as_deref().unwrap_or("unknown")
        );
    }
    Ok(())
}
