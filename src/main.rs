//! Tunesmith CLI entry point.

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use tunesmith::cli::{commands, Cli, Commands, HistoryCommands, RunCommands};
use tunesmith::domain::models::SweepMode;
use tunesmith::infrastructure::config::Config;

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config = match Config::load_from(&cli.config) {
        Ok(config) => config,
        Err(err) => {
            tunesmith::cli::handle_error(err.into(), cli.json);
            return;
        }
    };

    let result = match cli.command {
        Commands::Run { mode } => match mode {
            RunCommands::Sampling { sweep, weights } => match commands::parse_weights(&weights) {
                Ok(weights) => {
                    commands::run::execute(&config, SweepMode::Sampling, &sweep, weights, cli.json)
                        .await
                }
                Err(err) => Err(err),
            },
            RunCommands::Config { sweep, weights } => match commands::parse_weights(&weights) {
                Ok(weights) => {
                    commands::run::execute(&config, SweepMode::Config, &sweep, weights, cli.json)
                        .await
                }
                Err(err) => Err(err),
            },
        },
        Commands::History { command } => match command {
            HistoryCommands::List => commands::history::list(&config, cli.json).await,
            HistoryCommands::Show { run_id } => {
                commands::history::show(&config, run_id, cli.json).await
            }
            HistoryCommands::Delete { run_ids } => {
                commands::history::delete(&config, &run_ids, cli.json).await
            }
            HistoryCommands::Export { output } => {
                commands::history::export(&config, output.as_deref(), cli.json).await
            }
            HistoryCommands::Import { input } => {
                commands::history::import(&config, &input, cli.json).await
            }
        },
        Commands::Reevaluate { run_id, weights } => match commands::parse_weights(&weights) {
            Ok(weights) => commands::reevaluate::execute(&config, run_id, weights, cli.json).await,
            Err(err) => Err(err),
        },
    };

    if let Err(err) = result {
        tunesmith::cli::handle_error(err, cli.json);
    }
}
