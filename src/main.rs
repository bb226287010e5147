//! Stackyard CLI entrypoint.

use std::process::ExitCode;
use std::sync::Arc;

use stackyard::cli::{Cli, OutputFormatter};
use stackyard::cloud::{LookupCache, OpenStackClient};
use stackyard::config::ConfigParser;
use stackyard::engine::PulumiCli;
use stackyard::error::Result;
use stackyard::sequencer::{Action, RunPlan, Sequencer, discover_units};
use stackyard::units::ProgramWriter;

use clap::Parser;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Main entrypoint.
fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.verbose);

    // Run async runtime
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(e.exit_code())
        }
    }
}

/// Initializes the logging system.
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Runs the requested action and returns the process exit code.
async fn run(cli: Cli) -> Result<u8> {
    let formatter = OutputFormatter::new(cli.output);
    let action = Action::from(cli.action);

    ConfigParser::new().with_base_path(&cli.root).load_dotenv()?;

    let units = discover_units(&cli.root, &cli.excludes())?;
    let plan = RunPlan::new(action, cli.env.clone(), units, cli.infra_only);
    if plan.is_empty() {
        warn!("No units found under {}", cli.root.display());
    }
    info!(
        "{} {} units on stack {}",
        plan.action,
        plan.units.len(),
        plan.stack
    );

    let engine = PulumiCli::new(&cli.pulumi_bin);
    debug!("Using engine binary {}", engine.binary().display());

    let mut sequencer = Sequencer::new(Arc::new(engine));
    if action.renders_program() && !plan.is_empty() {
        let client = OpenStackClient::from_env()?;
        let writer = ProgramWriter::new(LookupCache::new(Arc::new(client)));
        sequencer = sequencer.with_renderer(Arc::new(writer));
    }

    let report = sequencer.run(&plan).await;
    println!("{}", formatter.format_report(&report));

    Ok(report.exit_code())
}
