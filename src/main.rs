//! Binary entry point for docdex.
//!
//! `docdex index` ingests corpora; `docdex serve` runs the MCP service.

#![allow(clippy::print_stderr)]

use std::process::ExitCode;

use clap::Parser;
use docdex::cli::{Cli, execute};
use docdex::config::Settings;

#[tokio::main]
async fn main() -> ExitCode {
    // Best-effort .env loading before the environment is read.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };
    docdex::logging::init(&settings.log_level);

    match execute(cli, settings).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "fatal");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
