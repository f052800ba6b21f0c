//! Command-line surface. Thin glue over the library; all invariants live
//! below it.

pub mod commands;
pub mod output;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "tunesmith")]
#[command(about = "Parameter sweep and evaluation engine for LLM inference servers", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Path to the configuration file
    #[arg(short, long, global = true, default_value = "tunesmith.yaml")]
    pub config: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start a sweep run and stream its progress
    Run {
        #[command(subcommand)]
        mode: RunCommands,
    },

    /// Inspect and manage the run history
    History {
        #[command(subcommand)]
        command: HistoryCommands,
    },

    /// Re-select the best trial of a stored run under new weights
    Reevaluate {
        /// Run id to reevaluate
        run_id: Uuid,

        /// Metric weight as `name=value`, e.g. `avgTps=1.0`; repeatable
        #[arg(short, long = "weight", value_name = "NAME=VALUE")]
        weights: Vec<String>,
    },
}

#[derive(Subcommand)]
pub enum RunCommands {
    /// Sampling-parameter sweep from a YAML definition
    Sampling {
        /// Sweep definition file
        sweep: PathBuf,

        /// Metric weight as `name=value`; repeatable
        #[arg(short, long = "weight", value_name = "NAME=VALUE")]
        weights: Vec<String>,
    },

    /// Server-config sweep from a YAML definition
    Config {
        /// Sweep definition file
        sweep: PathBuf,

        /// Metric weight as `name=value`; repeatable
        #[arg(short, long = "weight", value_name = "NAME=VALUE")]
        weights: Vec<String>,
    },
}

#[derive(Subcommand)]
pub enum HistoryCommands {
    /// List stored runs, newest first
    List,

    /// Print one stored run as JSON
    Show {
        /// Run id
        run_id: Uuid,
    },

    /// Delete stored runs
    Delete {
        /// Run ids to delete
        run_ids: Vec<Uuid>,
    },

    /// Export the whole history as a versioned JSON envelope
    Export {
        /// Output file; stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Import a previously exported envelope
    Import {
        /// Envelope file
        input: PathBuf,
    },
}

/// Print an error and exit non-zero, honoring `--json`.
pub fn handle_error(err: anyhow::Error, json: bool) {
    if json {
        let output = serde_json::json!({ "error": format!("{err:#}") });
        eprintln!("{output}");
    } else {
        eprintln!("error: {err:#}");
    }
    std::process::exit(1);
}
