use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "ynab2firefly")]
#[command(version)]
#[command(about = "Import YNAB4 ledger exports into Firefly III", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Reconcile a YNAB4 export and upload it to a Firefly III instance.
    Import(ImportArgs),
}

#[derive(Debug, Args)]
pub struct ImportArgs {
    /// Path to the import configuration (JSON).
    pub config: PathBuf,

    /// Path to the YNAB register export ("<budget> as of <timestamp>-Register.csv").
    pub register: PathBuf,

    /// Path to the YNAB budget export ("<budget> as of <timestamp>-Budget.csv").
    pub budget: PathBuf,

    /// Base URL of the Firefly III instance.
    #[arg(long, env = "FIREFLY_III_URL")]
    pub firefly_url: Option<String>,

    /// Personal access token (Profile -> OAuth -> Personal Access Tokens).
    #[arg(long, env = "FIREFLY_III_ACCESS_TOKEN", hide_env_values = true)]
    pub firefly_token: Option<String>,

    /// Reconcile and print summary counts without any remote calls.
    #[arg(long)]
    pub dry_run: bool,

    /// Only import transactions on or after this date (YYYY-MM-DD).
    #[arg(long)]
    pub min_date: Option<NaiveDate>,

    /// Only import transactions on or before this date (YYYY-MM-DD).
    #[arg(long)]
    pub max_date: Option<NaiveDate>,

    /// Directory the sync cache is persisted in.
    #[arg(long, default_value = ".cache")]
    pub cache_dir: PathBuf,
}
