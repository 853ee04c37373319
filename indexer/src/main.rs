use clap::Parser;
use dotenvy::dotenv;
use std::process::ExitCode;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use indexer::config::{load_config, CLIArguments};
use indexer::Indexer;

#[tokio::main]
async fn main() -> ExitCode {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli_args = CLIArguments::parse();
    let mut config = match load_config(cli_args.config_path.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!("Irrecoverable error: fail to load config: {}", e);
            return ExitCode::FAILURE;
        }
    };
    config.apply(&cli_args);

    let indexer = match Indexer::from_config(config, cli_args.dry_run).await {
        Ok(indexer) => indexer,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    let dataset = indexer.config().dataset_name.clone();

    tokio::select! {
        outcome = indexer.run() => match outcome {
            Ok(summary) => {
                info!(
                    "loaded {} rows in {} batches into {}.blocks",
                    summary.rows, summary.batches, dataset
                );
                if let (Some(first), Some(last)) = (summary.first_block, summary.last_block) {
                    info!("blocks {}..={}", first, last);
                }
                info!(
                    "Try this SQL: SELECT number AS block_number, to_timestamp(timestamp) AS block_ts, transactions_count, gas_used FROM {}.blocks ORDER BY number DESC LIMIT 100;",
                    dataset
                );
                ExitCode::SUCCESS
            }
            Err(failure) => {
                error!("{}", failure);
                ExitCode::FAILURE
            }
        },
        _ = tokio::signal::ctrl_c() => {
            warn!("interrupted; batches merged so far stay committed");
            ExitCode::FAILURE
        }
    }
}
