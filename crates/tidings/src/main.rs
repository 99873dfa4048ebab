// SPDX-FileCopyrightText: 2026 Tidings Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tidings - an interest-tracking notification decision engine.
//!
//! This is the binary entry point for the Tidings service.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod doctor;
mod serve;
mod status;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

/// Tidings - an interest-tracking notification decision engine.
#[derive(Parser, Debug)]
#[command(name = "tidings", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the batch-window and digest schedulers until interrupted.
    Serve,
    /// Print today's budget state and recent runs.
    Status,
    /// Re-execute a persisted run and diff its actions.
    Replay {
        /// The run record id to replay.
        run_id: String,
    },
    /// Check configuration and storage health.
    Doctor,
    /// Clear today's sticky budget disable flags (operator reset).
    ResetBudget,
}

fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match tidings_config::load_and_validate() {
        Ok(config) => config,
        Err(errors) => {
            tidings_config::render_errors(&errors);
            std::process::exit(1);
        }
    };
    init_tracing(&config.agent.log_level);

    let result = match cli.command {
        Some(Commands::Serve) => serve::run(config).await,
        Some(Commands::Status) => status::run(config).await,
        Some(Commands::Replay { run_id }) => serve::replay(config, &run_id).await,
        Some(Commands::Doctor) => doctor::run(config).await,
        Some(Commands::ResetBudget) => status::reset_budget(config).await,
        None => {
            println!("tidings: use --help for available commands");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("tidings: {e}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    #[test]
    #[cfg(not(target_env = "msvc"))]
    fn jemalloc_is_active() {
        // Verify jemalloc is the global allocator by advancing the epoch.
        // Only jemalloc supports this -- the system allocator would fail.
        use tikv_jemalloc_ctl::{epoch, stats};
        epoch::advance().unwrap();
        let allocated = stats::allocated::read().unwrap();
        assert!(allocated > 0, "jemalloc should report non-zero allocation");
    }

    #[test]
    fn binary_loads_config_defaults() {
        let config =
            tidings_config::load_and_validate_str("").expect("default config should be valid");
        assert_eq!(config.agent.name, "tidings");
    }
}
