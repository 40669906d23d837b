use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use kassensturz_core::DateWindow;

/// Normalise Swiss bank and card exports for a budgeting app
#[derive(Parser, Debug)]
#[command(name = "kassensturz", version, about, long_about = None)]
pub struct Cli {
    /// TOML file with mappings, custom layouts and export settings
    #[arg(long, global = true, value_name = "PATH", env = "KASSENSTURZ_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Import a CSV statement
    Process(ProcessArgs),
    /// Fetch transactions from a card account API
    Remote(RemoteArgs),
    /// List categories and their subcategories
    Categories,
}

#[derive(Args, Debug)]
pub struct ProcessArgs {
    /// Statement file
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Layout name (swisscard, zkb, migros, generic or a configured one);
    /// detected when omitted
    #[arg(long, value_name = "NAME")]
    pub layout: Option<String>,

    /// Account label written on every transaction
    #[arg(long)]
    pub account: Option<String>,

    #[command(flatten)]
    pub window: WindowArgs,

    #[command(flatten)]
    pub output: OutputArgs,
}

#[derive(Args, Debug)]
pub struct RemoteArgs {
    /// Card or account id
    #[arg(long, env = "KASSENSTURZ_ACCOUNT_ID")]
    pub account_id: String,

    /// API base URL
    #[arg(long, env = "KASSENSTURZ_API_URL")]
    pub api_url: String,

    #[arg(long, env = "KASSENSTURZ_USERNAME")]
    pub username: String,

    #[arg(long, env = "KASSENSTURZ_PASSWORD", hide_env_values = true)]
    pub password: String,

    /// Label used as account and batch source
    #[arg(long, default_value = "viseca")]
    pub name: String,

    #[arg(long, value_name = "N")]
    pub page_size: Option<usize>,

    /// HTTP timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    #[command(flatten)]
    pub window: WindowArgs,

    #[command(flatten)]
    pub output: OutputArgs,
}

#[derive(Args, Debug, Default)]
pub struct WindowArgs {
    /// First day to keep (YYYY-MM-DD)
    #[arg(long, value_name = "DATE")]
    pub from: Option<NaiveDate>,

    /// Last day to keep (YYYY-MM-DD)
    #[arg(long, value_name = "DATE")]
    pub to: Option<NaiveDate>,
}

impl WindowArgs {
    pub fn window(&self) -> DateWindow {
        DateWindow::new(self.from, self.to)
    }
}

#[derive(Args, Debug)]
pub struct OutputArgs {
    #[arg(long, value_enum, default_value_t = OutputKind::Csv)]
    pub output: OutputKind,

    /// CSV destination; stdout when omitted
    #[arg(long, value_name = "PATH")]
    pub out: Option<PathBuf>,

    /// Show what would be written or sent without doing it
    #[arg(long)]
    pub dry_run: bool,

    /// How import links are sent
    #[arg(long, value_enum, default_value_t = SendMode::Browser)]
    pub send: SendMode,

    /// Use the form route that does not save automatically
    #[arg(long)]
    pub route_only: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputKind {
    Csv,
    Links,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum SendMode {
    Browser,
    Http,
}
