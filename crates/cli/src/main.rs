// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! adv - Advance CLI

mod client;
mod commands;
mod completions;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::daemon;
use rust_decimal::Decimal;
use std::path::PathBuf;

use crate::client::DaemonClient;

#[derive(Parser)]
#[command(
    name = "adv",
    version,
    about = "Advance - cash advances with automatic settlement"
)]
struct Cli {
    /// Books directory (default: ~/.local/share/adv, or ADV_DATA_DIR)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Print responses as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show how much a user can draw right now
    Available {
        /// User to check
        user: String,
    },
    /// Issue an advance to a user's wallet
    Take {
        /// User taking the advance
        user: String,
        /// Amount to draw
        amount: Decimal,
    },
    /// Repay part of a user's active advance
    Repay {
        /// User repaying
        user: String,
        /// Amount to repay
        amount: Decimal,
    },
    /// Run a settlement cycle now
    Settle,
    /// Show pool and advance totals
    Status,
    /// Daemon management
    Daemon(daemon::DaemonArgs),
    /// Generate shell completions
    Completions(completions::CompletionsArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Handle daemon command separately (doesn't need client connection)
    if let Commands::Daemon(args) = cli.command {
        return daemon::daemon(args, cli.data_dir).await;
    }

    // Completions write to stdout and never touch the daemon
    if let Commands::Completions(args) = cli.command {
        completions::generate_completions::<Cli>(args.shell);
        return Ok(());
    }

    // All other commands go through the daemon
    let data_dir = client::resolve_data_dir(cli.data_dir)?;
    let client = DaemonClient::connect_or_start(data_dir).await?;

    match cli.command {
        Commands::Available { user } => {
            let availability = client.availability(&user).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&availability)?);
            } else {
                println!("Weekly limit:      {}", availability.weekly_limit);
                println!("Used this cycle:   {}", availability.used);
                println!("Limit remaining:   {}", availability.limit_remaining);
                println!("Performance limit: {}", availability.performance_limit);
                println!("Pool balance:      {}", availability.pool_balance);
                println!("Available:         {}", availability.available);
            }
        }

        Commands::Take { user, amount } => {
            let issued = client.take(&user, amount).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&issued)?);
            } else {
                println!(
                    "Advance {} issued: {} (wallet balance {})",
                    issued.advance.id, issued.advance.total_amount, issued.new_balance
                );
            }
        }

        Commands::Repay { user, amount } => {
            let repayment = client.repay(&user, amount).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&repayment)?);
            } else if repayment.advance.outstanding_amount.is_zero() {
                println!(
                    "Repaid {} on advance {}; repaid in full",
                    repayment.amount, repayment.advance.id
                );
            } else {
                println!(
                    "Repaid {} on advance {}; {} outstanding",
                    repayment.amount, repayment.advance.id, repayment.advance.outstanding_amount
                );
            }
        }

        Commands::Settle => {
            let report = client.settle().await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                for item in &report.processed {
                    if item.repaid {
                        println!("{}: collected {} (repaid in full)", item.user_id, item.amount);
                    } else {
                        println!(
                            "{}: collected {} ({} outstanding)",
                            item.user_id, item.amount, item.outstanding_after
                        );
                    }
                }
                for item in &report.skipped {
                    println!("{}: skipped ({})", item.user_id, item.reason);
                }
                for item in &report.errors {
                    println!("{}: failed ({})", item.user_id, item.error);
                }
                println!(
                    "Cycle {}: {} collected, {} skipped, {} failed",
                    report.cycle,
                    report.processed.len(),
                    report.skipped.len(),
                    report.errors.len()
                );
            }
        }

        Commands::Status => {
            let (uptime_secs, pool, advances_active, outstanding_total) = client.status().await?;
            if cli.json {
                let status = serde_json::json!({
                    "uptime_secs": uptime_secs,
                    "pool": pool,
                    "advances_active": advances_active,
                    "outstanding_total": outstanding_total,
                });
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                println!("Uptime:       {}s", uptime_secs);
                println!("Pool:         {} (balance {})", pool.id, pool.balance);
                println!("  lent:       {}", pool.total_lent);
                println!("  repaid:     {}", pool.total_repaid);
                println!("Active:       {}", advances_active);
                println!("Outstanding:  {}", outstanding_total);
            }
        }

        Commands::Daemon(_) | Commands::Completions(_) => unreachable!(),
    }

    Ok(())
}
