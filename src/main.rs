use clap::Parser;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use casework_core::{Holder, PatientDraft, PatientRegister};
use casework_lease::{
    constants::{LEASE_TTL_ENV, SWEEP_INTERVAL_ENV},
    Clock, InMemoryLeaseStore, LeaseConfig, LeaseController, Sweeper, SystemClock,
};

mod shell;

use shell::{Flow, Session};

#[derive(Parser)]
#[command(name = "casework")]
#[command(about = "Casework patient register session")]
struct Cli {
    /// Session user id
    #[arg(long, default_value = "clinician")]
    user: String,
    /// Session user display name
    #[arg(long, default_value = "Clinician")]
    name: String,
    /// JSON file with an array of patient drafts to load at start
    #[arg(long)]
    patients: Option<PathBuf>,
    /// Load the demo patients at start
    #[arg(long)]
    seed: bool,
}

/// Main entry point for a casework session
///
/// Builds the in-memory patient register, starts the background lease sweep and then reads
/// commands from stdin until `quit`, EOF or Ctrl-C. Nothing is persisted.
///
/// # Environment Variables
/// - `CASEWORK_LEASE_TTL_MS`: edit lock lifetime (default: 300000)
/// - `CASEWORK_SWEEP_INTERVAL_MS`: how often expired locks are evicted (default: 30000)
/// - `RUST_LOG`: log filter (logs go to stderr)
///
/// # Errors
/// Returns an error if:
/// - the logging configuration cannot be initialised,
/// - the lease configuration is invalid, or
/// - the patients file cannot be read or parsed.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("casework=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let lease_config = LeaseConfig::from_env_values(
        std::env::var(LEASE_TTL_ENV).ok(),
        std::env::var(SWEEP_INTERVAL_ENV).ok(),
    )?;
    tracing::info!(
        "-- Starting casework session (lease ttl={}ms, sweep every {}ms)",
        lease_config.ttl_ms(),
        lease_config.sweep_interval().as_millis()
    );

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let mut register = PatientRegister::new(LeaseController::new(
        InMemoryLeaseStore::new(),
        lease_config.policy(),
    ));

    if let Some(path) = &cli.patients {
        let json = std::fs::read_to_string(path)?;
        let ids = register.import(PatientDraft::list_from_json(&json)?, clock.now_millis())?;
        tracing::info!("loaded {} patients from {}", ids.len(), path.display());
    }
    if cli.seed {
        register.seed_demo_data(clock.now_millis())?;
    }

    let register = Arc::new(Mutex::new(register));
    let sweeper = Sweeper::new(
        register.clone(),
        clock.clone(),
        lease_config.sweep_interval(),
    )
    .start();

    let mut session = Session::new(register, clock, Holder::new(cli.user, cli.name));
    println!("Type 'help' for commands.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("{}> ", session.user().id);
        std::io::stdout().flush()?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            println!();
            break;
        };

        match session.execute(&line) {
            Flow::Continue(output) if output.is_empty() => {}
            Flow::Continue(output) => println!("{output}"),
            Flow::Quit => break,
        }
    }

    sweeper.abort();
    tracing::info!("-- Session ended");
    Ok(())
}
