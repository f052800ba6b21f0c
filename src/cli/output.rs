//! Table and progress rendering helpers.

use comfy_table::{presets::UTF8_FULL_CONDENSED, Cell, ContentArrangement, Table};
use indicatif::{ProgressBar, ProgressStyle};

use crate::domain::models::{HistoryEntry, Run};

pub fn create_spinner(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(std::time::Duration::from_millis(120));
    spinner
}

fn fmt_opt_score(score: Option<f64>) -> String {
    score.map_or_else(|| "-".to_string(), |s| format!("{s:.1}"))
}

/// Render the history listing table.
pub fn format_history_table(entries: &[HistoryEntry]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            "Run ID", "Saved", "Mode", "Model", "Status", "Trials", "Best",
        ]);
    for entry in entries {
        let best = entry
            .run
            .best_trial_id
            .and_then(|id| entry.run.trials.iter().find(|t| t.id == id))
            .and_then(|t| t.total_score);
        table.add_row(vec![
            Cell::new(entry.id),
            Cell::new(entry.saved_at.format("%Y-%m-%d %H:%M:%S")),
            Cell::new(entry.sweep_mode.as_str()),
            Cell::new(entry.model_id.as_deref().unwrap_or("-")),
            Cell::new(entry.run.status.as_str()),
            Cell::new(entry.run.trials.len()),
            Cell::new(fmt_opt_score(best)),
        ]);
    }
    table
}

/// Render the per-trial summary of one run. The best trial is starred.
pub fn format_trial_table(run: &Run) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            "Trial", "Status", "Candidate", "Total", "Chat", "Tool", "TPS", "TTFT ms",
        ]);
    for trial in &run.trials {
        let marker = if run.best_trial_id == Some(trial.id) {
            "* "
        } else {
            ""
        };
        table.add_row(vec![
            Cell::new(format!("{marker}{}", &trial.id.to_string()[..8])),
            Cell::new(trial.status.as_str()),
            Cell::new(trial.candidate.label()),
            Cell::new(fmt_opt_score(trial.total_score)),
            Cell::new(fmt_opt_score(trial.chat_score())),
            Cell::new(fmt_opt_score(trial.tool_score())),
            Cell::new(fmt_opt_score(trial.avg_tps)),
            Cell::new(fmt_opt_score(trial.avg_ttft)),
        ]);
    }
    table
}
