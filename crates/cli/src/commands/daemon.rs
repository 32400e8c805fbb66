// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon management commands

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Subcommand};

use crate::client::{self, ClientError, DaemonClient};

#[derive(Args)]
pub struct DaemonArgs {
    #[command(subcommand)]
    pub command: DaemonCommand,
}

#[derive(Subcommand)]
pub enum DaemonCommand {
    /// Start the daemon for the books directory
    Start,
    /// Stop the daemon
    Stop,
    /// Show whether the daemon is running
    Status,
}

pub async fn daemon(args: DaemonArgs, data_dir: Option<PathBuf>) -> Result<()> {
    let data_dir = client::resolve_data_dir(data_dir)?;

    match args.command {
        DaemonCommand::Start => {
            match DaemonClient::connect(data_dir.clone()) {
                Ok(_) => {
                    println!("Daemon already running");
                    Ok(())
                }
                Err(ClientError::DaemonNotRunning) => {
                    let client = DaemonClient::connect_or_start(data_dir).await?;
                    let protocol = client.hello().await?;
                    println!("Daemon started (protocol {})", protocol);
                    Ok(())
                }
                Err(e) => Err(e.into()),
            }
        }
        DaemonCommand::Stop => {
            if client::daemon_stop(&data_dir).await? {
                println!("Daemon stopped");
            } else {
                println!("Daemon not running");
            }
            Ok(())
        }
        DaemonCommand::Status => {
            match DaemonClient::connect(data_dir.clone()) {
                Ok(client) => {
                    let protocol = client.hello().await?;
                    match client::read_daemon_pid(&data_dir)? {
                        Some(pid) => {
                            println!("Daemon running (pid {}, protocol {})", pid, protocol)
                        }
                        None => println!("Daemon running (protocol {})", protocol),
                    }
                    Ok(())
                }
                Err(ClientError::DaemonNotRunning) => {
                    println!("Daemon not running");
                    Ok(())
                }
                Err(e) => Err(e.into()),
            }
        }
    }
}
