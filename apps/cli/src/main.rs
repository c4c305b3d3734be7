//! FirmScope CLI — company website profiling.
//!
//! Crawls company websites, extracts a structured company record with a
//! chat model, validates its sectors against a controlled vocabulary and
//! stores the results in a local database.

mod commands;
mod export;
mod progress;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
