// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! CONTEXT: bootguardd entrypoint – CLI wiring for the probation loop and reporting commands
//!
//! Exit codes: 0 validated / command ok, 1 error, 75 restart requested (the
//! supervisor restarts the device).

use std::path::PathBuf;
use std::process::ExitCode;

use bootguardd::{DaemonConfig, Exit, ReadyNotifier};
use clap::{Parser, Subcommand};

const EXIT_RESTART: u8 = 75;

#[derive(Debug, Parser)]
#[command(name = "bootguardd", about = "Boot-health watchdog and automatic rollback")]
struct Cli {
    /// TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Overrides `state_dir` from the configuration.
    #[arg(long)]
    state_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Count this boot and watch connectivity until validation or rollback (default).
    Run,
    /// Print the last failure record and counters.
    Status,
    /// Clear the failure record after it has been reported.
    Ack,
    /// Record the identifier of the update about to be applied.
    SetPending {
        /// Update identifier blamed if the new image rolls back.
        id: String,
    },
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("bootguardd: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> bootguardd::Result<ExitCode> {
    let mut config = DaemonConfig::load(cli.config.as_deref())?;
    if let Some(dir) = cli.state_dir {
        config.state_dir = dir;
    }

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => {
            match bootguardd::service_main_loop(&config, ReadyNotifier::new(|| {}))? {
                Exit::Validated => Ok(ExitCode::SUCCESS),
                Exit::Restart(_) => Ok(ExitCode::from(EXIT_RESTART)),
            }
        }
        Command::Status => {
            println!("{}", bootguardd::report_status(&config)?);
            Ok(ExitCode::SUCCESS)
        }
        Command::Ack => {
            bootguardd::acknowledge(&config)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::SetPending { id } => {
            let slot = bootguardd::set_pending(&config, &id)?;
            println!("staged slot {slot} for update {id}");
            Ok(ExitCode::SUCCESS)
        }
    }
}
