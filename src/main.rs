// file: src/main.rs
// version: 2.0.0
// guid: h8i9j0k1-l2m3-4567-8901-234567hijklm

//! Cluster Provisioner - Main entry point

use clap::Parser;
use cluster_provisioner::{
    cli::{args::Cli, args::Commands, commands::*, output},
    logging::logger,
    ProvisionError, Result,
};
use std::process::ExitCode;
use tokio::signal;
use tracing::{error, warn};

const EXIT_INTERRUPTED: u8 = 130;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let json_output = cli.command.json_output();

    let logger_ready = if json_output {
        logger::init_json_logger(cli.verbose, cli.quiet)
    } else {
        logger::init_logger(cli.verbose, cli.quiet)
    };
    if let Err(e) = logger_ready {
        eprintln!("{}", e);
        return ExitCode::FAILURE;
    }

    // Installers block on SSH I/O; run them on a worker so Ctrl+C is still observed
    let command = tokio::spawn(run(cli));

    tokio::select! {
        joined = command => match joined {
            Ok(Ok(true)) => ExitCode::SUCCESS,
            Ok(Ok(false)) => ExitCode::FAILURE,
            Ok(Err(ProvisionError::Interrupted)) => interrupted(json_output),
            Ok(Err(e)) => {
                error!("{}", e);
                let _ = output::print_error("Unexpected error", &e.to_string(), json_output);
                ExitCode::FAILURE
            }
            Err(e) => {
                error!("Command task failed: {}", e);
                ExitCode::FAILURE
            }
        },
        _ = signal::ctrl_c() => {
            warn!("Received Ctrl+C, stopping");
            interrupted(json_output)
        }
    }
}

async fn run(cli: Cli) -> Result<bool> {
    let verbose = cli.verbose;
    match cli.command {
        Commands::Install {
            config,
            yes,
            json_output,
        } => install_command(config, yes, json_output, verbose).await,
        Commands::Elastic(args) => elastic_command(args, verbose).await,
        Commands::Validate {
            config,
            elastic,
            check_connection,
        } => validate_command(&config, elastic, check_connection).await,
        Commands::List { json_output } => list_command(json_output),
        Commands::Info { name } => info_command(&name),
    }
}

fn interrupted(json_output: bool) -> ExitCode {
    // Each SSH session belongs to a single step, so there is nothing to clean up
    let _ = output::print_error("Interrupted", "interrupted by user", json_output);
    ExitCode::from(EXIT_INTERRUPTED)
}
