use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod args;
mod commands;
mod config;

use args::{Cli, Command};
use config::Config;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut stdout = std::io::stdout().lock();

    match &cli.command {
        Command::Categories => commands::categories(&mut stdout),
        Command::Process(args) => {
            let config = Config::load(cli.config.as_deref())?;
            commands::process(args, &config, &mut stdout)
        }
        Command::Remote(args) => {
            let config = Config::load(cli.config.as_deref())?;
            commands::remote(args, &config, &mut stdout)
        }
    }
}
