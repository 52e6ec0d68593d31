//! catup - catalog version pin updater CLI
//!
//! Reads a workspace snapshot, proposes catalog updates and analyzes their
//! risk through the best available analysis backend.

use catup::cli::CliArgs;
use catup::orchestrator::Orchestrator;
use catup::output::{create_formatter, OutputConfig};
use clap::Parser;
use std::io::{self, IsTerminal, Write};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter
const LOG_ENV: &str = "CATUP_LOG";

/// Exit code when the plan has cross-catalog conflicts
const CONFLICT_EXIT_CODE: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    let args = CliArgs::parse();
    init_tracing(args.verbose);

    match run(args).await {
        Ok(exit_code) => exit_code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "catup=debug" } else { "warn" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

/// Main application logic
async fn run(args: CliArgs) -> anyhow::Result<ExitCode> {
    if args.verbose {
        eprintln!("catup v{}", env!("CARGO_PKG_VERSION"));
        eprintln!("Snapshot: {}", args.snapshot.display());
    }

    let orchestrator = Orchestrator::from_cli(&args)?;
    let result = orchestrator.run(&args.snapshot).await?;

    let color = io::stdout().is_terminal() && std::env::var_os("NO_COLOR").is_none();
    let formatter = create_formatter(
        OutputConfig::from_cli(args.json, args.verbose, args.quiet).with_color(color),
    );
    let mut stdout = io::stdout().lock();
    formatter.format(&result, &mut stdout)?;
    stdout.flush()?;

    if result.has_conflicts() {
        Ok(ExitCode::from(CONFLICT_EXIT_CODE))
    } else {
        Ok(ExitCode::SUCCESS)
    }
}
