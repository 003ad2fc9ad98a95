mod classifier;
mod cli;
mod config;
mod domain;
mod filter;
mod infrastructure;
mod pipeline;
mod segment;

use anyhow::Result;
use clap::Parser;
use infrastructure::{directories, logging};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = cli::Cli::parse();
    let config = config::load_config()?;
    let paths = directories::ensure_directories(&config.directories)?;
    logging::init_tracing(&config, &paths)?;

    cli::run(cli, config, paths).await
}
