// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tollgate - usage quota and payment reconciliation for AI chat services.
//!
//! This is the binary entry point: an interactive shell that drives the
//! dispatcher, plus operator subcommands for accounts and payments.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod admin;
mod shell;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use colored::Colorize;

use tollgate_config::TollgateConfig;
use tollgate_core::TollgateError;

/// Tollgate - usage quota and payment reconciliation for AI chat services.
#[derive(Parser, Debug)]
#[command(name = "tollgate", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the standard locations.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Chat with the engine from the terminal as user `local`.
    Shell,
    /// Show an account's quota and balance.
    Account {
        user_id: String,
    },
    /// List accounts with usage and balance, oldest first.
    Accounts {
        /// Accounts per page.
        #[arg(long, default_value_t = 50)]
        limit: u32,
        /// 1-based page number.
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    /// List the purchasable packages.
    Packages,
    /// Open a hosted checkout session for a package.
    Checkout {
        user_id: String,
        package_id: String,
    },
    /// Issue an in-chat invoice for a package.
    Invoice {
        user_id: String,
        package_id: String,
    },
    /// Complete a pending payment and credit its owner.
    Reconcile {
        token: String,
    },
    /// Record a pending payment as failed.
    FailPayment {
        token: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => tollgate_config::load_and_validate_path(path),
        None => tollgate_config::load_and_validate(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            tollgate_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    init_tracing(&config.agent.log_level);

    let Some(command) = cli.command else {
        println!("tollgate: use --help for available commands");
        return;
    };

    if let Err(e) = run(command, config).await {
        eprintln!("{}: {e}", "error".red());
        std::process::exit(1);
    }
}

async fn run(command: Commands, config: TollgateConfig) -> Result<(), TollgateError> {
    match command {
        Commands::Shell => shell::run_shell(config).await,
        Commands::Account { user_id } => admin::account(&config, &user_id).await,
        Commands::Accounts { limit, page } => admin::accounts(&config, limit, page).await,
        Commands::Packages => {
            admin::packages(&config);
            Ok(())
        }
        Commands::Checkout {
            user_id,
            package_id,
        } => admin::checkout(&config, &user_id, &package_id).await,
        Commands::Invoice {
            user_id,
            package_id,
        } => admin::invoice(&config, &user_id, &package_id).await,
        Commands::Reconcile { token } => admin::reconcile(&config, &token).await,
        Commands::FailPayment { token } => admin::fail_payment(&config, &token).await,
    }
}

/// Installs the global subscriber. `RUST_LOG` wins over the configured level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("tollgate={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}
