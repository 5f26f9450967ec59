// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

mod cameras;
mod capture;
mod error;
mod metrics;
mod utils;

use clap::{Parser, Subcommand};
use error::result_to_exit_code;
use std::process::ExitCode;

/// rpigrafx CLI - Raspberry Pi camera pipeline and capture tool
#[derive(Parser)]
#[command(name = "rpigrafx")]
#[command(version)]
#[command(about = "rpigrafx CLI - Raspberry Pi camera pipeline and capture tool")]
#[command(long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging (use RUST_LOG=trace for more)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Output results in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Use a simulated 3280x2464 camera instead of the MMAL libraries
    #[arg(long, global = true)]
    simulate: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the attached cameras and their native resolution
    Cameras(cameras::Args),

    /// Build a camera pipeline and measure frame delivery
    Capture(capture::Args),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.quiet);

    let result = match cli.command {
        Commands::Cameras(args) => cameras::execute(args, cli.json, cli.simulate),
        Commands::Capture(args) => capture::execute(args, cli.json, cli.simulate),
    };

    result_to_exit_code(result)
}

/// Initialize env_logger based on verbosity flags
fn init_logging(verbose: bool, quiet: bool) {
    let env = env_logger::Env::default();

    let env = if quiet {
        env.default_filter_or("error")
    } else if verbose {
        env.default_filter_or("debug")
    } else {
        env.default_filter_or("info")
    };

    env_logger::Builder::from_env(env)
        .format_timestamp(None)
        .format_target(false)
        .init();

    log::debug!("Logging initialized");
}
