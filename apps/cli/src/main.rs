//! graphctx CLI: build a content graph and pull request-relevant context out
//! of it for a language model.

mod commands;
mod ingest;

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
