use anyhow::Context;
use clap::Parser;
use mapco2_processor::cli::Args;
use mapco2_processor::models::ProcessingStats;
use mapco2_processor::processor::BatchProcessor;
use std::process;
use tokio_util::sync::CancellationToken;
use tracing::Level;

fn main() {
    let args = Args::parse();

    let level = if args.verbose {
        Level::DEBUG
    } else {
        Level::WARN
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let runtime = tokio::runtime::Runtime::new().unwrap_or_else(|e| {
        eprintln!("Failed to create async runtime: {}", e);
        process::exit(1);
    });

    let result = runtime.block_on(async {
        let cancellation_token = CancellationToken::new();

        // First Ctrl+C stops scheduling new files and new frames; partial output is kept
        let signal_token = cancellation_token.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("\nReceived CTRL+C, finishing with partial output...");
                signal_token.cancel();
            }
        });

        run(args, cancellation_token).await
    });

    match result {
        Ok(stats) if stats.files_failed > 0 => process::exit(2),
        Ok(_) => process::exit(0),
        Err(error) => {
            eprintln!("Error: {:#}", error);
            process::exit(1);
        }
    }
}

async fn run(args: Args, cancel: CancellationToken) -> anyhow::Result<ProcessingStats> {
    let config = args
        .processor_config()
        .context("Invalid command-line options")?;

    let mut processor = BatchProcessor::new(args.inputs.clone(), args.output.clone())
        .with_config(config)
        .with_cancellation(cancel);

    processor
        .process()
        .await
        .with_context(|| format!("Failed to process {}", args.inputs.join(", ")))
}
