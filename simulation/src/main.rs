//! Canteen offline queue simulation
//!
//! Runs outage, flaky-store, and restart scenarios against the offline
//! sync queue and prints what happened to every queued write.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use canteen_logging::CanteenSubscriberBuilder;
use canteen_simulation::{ScenarioReport, SimConfig, scenarios};

#[derive(Parser)]
#[command(
    name = "canteen-simulation",
    about = "Offline sync queue scenarios for the canteen attendance app",
    version
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Attendance confirmations to queue
    #[arg(short, long, global = true, default_value = "12")]
    operations: usize,

    /// Attempt budget per operation
    #[arg(short, long, global = true, default_value = "5")]
    max_attempts: u32,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Queue writes while offline, reconnect, and replay
    Outage,

    /// Replay against a store that rejects writes at random
    Flaky {
        /// Probability that any single write is rejected
        #[arg(short, long, default_value = "0.3")]
        failure_rate: f64,

        /// Seed for reproducible failures
        #[arg(short, long)]
        seed: Option<u64>,

        /// Upper bound on sync passes
        #[arg(short = 'p', long, default_value = "10")]
        max_passes: usize,
    },

    /// Persist a backlog, rebuild the queue from disk, and replay
    Restart {
        /// Directory holding the journal
        #[arg(short, long, default_value = "./canteen-journal")]
        journal_dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let _guard = CanteenSubscriberBuilder::new()
        .with_level(if cli.verbose { "debug" } else { "info" })
        .init();

    let config = SimConfig::default()
        .with_operations(cli.operations)
        .with_max_attempts(cli.max_attempts);

    let report = match cli.command {
        Commands::Outage => scenarios::run_outage(&config).await?,
        Commands::Flaky {
            failure_rate,
            seed,
            max_passes,
        } => {
            let mut config = config
                .with_failure_rate(failure_rate)
                .with_max_passes(max_passes);
            if let Some(seed) = seed {
                config = config.with_seed(seed);
            }
            scenarios::run_flaky(&config).await?
        }
        Commands::Restart { journal_dir } => scenarios::run_restart(&config, &journal_dir).await?,
    };

    print_report(&report);
    Ok(())
}

fn print_report(report: &ScenarioReport) {
    println!("\n{report}");
    if report.is_clean() {
        println!("\nAll queued writes reached the store.");
    } else {
        println!(
            "\n{} write(s) still pending, {} dropped.",
            report.remaining,
            report.permanently_failed()
        );
    }
}
