//! welfarebridge CLI — welfare listing ingestion and income estimates.
//!
//! Pulls the local-government welfare listing into a relational table whose
//! columns may lag the code, and turns free-form model output into
//! structured income estimates.

mod commands;

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
