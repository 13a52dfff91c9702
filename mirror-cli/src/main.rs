mod cli;
mod error;

use std::process;

use clap::Parser;
use mirror_engine::{Mirror, write_manifest};
use tracing::{Level, error, info, warn};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use crate::{cli::Args, error::AppError};

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logging(args.verbose, args.quiet);

    if let Err(e) = run(args).await {
        error!("Application error: {}", e);
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), AppError> {
    let config = args.into_config()?;
    info!(
        url = %config.playlist_url,
        output = %config.output_dir.display(),
        workers = config.workers,
        "Starting mirror"
    );

    let mirror = Mirror::new(config)?;
    let outcome = mirror.run().await?;
    let index = write_manifest(&mirror.config().output_dir, &outcome.manifest).await?;

    if !outcome.is_complete() {
        warn!(
            failed = outcome.report.failed.len(),
            total = outcome.total,
            "Some resources could not be downloaded"
        );
    }
    info!(
        index = %index.display(),
        resources = outcome.report.succeeded,
        "Done in {}s",
        outcome.elapsed.as_secs()
    );
    Ok(())
}

fn init_logging(verbose: bool, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(Level::INFO.into())
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_level(verbose))
        .init();
}
