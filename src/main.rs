mod cache;
mod cli;
mod config;
mod error;
mod firefly;
mod forex;
mod model;
mod reconcile;
mod register;

use anyhow::{Result, anyhow};
use clap::Parser;

use crate::cache::SyncCache;
use crate::cli::{Cli, Command, ImportArgs};
use crate::config::load_config;
use crate::firefly::{FireflyClient, SyncEngine};
use crate::forex::ForexResolver;
use crate::model::{ImportData, LineItem};

fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("{err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Import(args) => run_import(args),
    }
}

fn run_import(args: ImportArgs) -> Result<()> {
    let config = load_config(&args.config)?;
    let mut cache = SyncCache::load(&args.cache_dir.join("firefly_data.json"))?;

    let client = if args.dry_run {
        None
    } else {
        let url = args.firefly_url.as_deref().ok_or_else(|| {
            anyhow!("--firefly-url (or FIREFLY_III_URL) is required unless --dry-run is given")
        })?;
        let token = args.firefly_token.as_deref().ok_or_else(|| {
            anyhow!("--firefly-token (or FIREFLY_III_ACCESS_TOKEN) is required unless --dry-run is given")
        })?;
        println!("Loaded config for import into {url}");
        let client = FireflyClient::new(url, token)?;
        client.verify_connection()?;
        Some(client)
    };

    let records = register::read_register(&args.register, &config)?;
    println!("Loaded {} transactions", records.len());
    let budget_rows = register::read_budgets(&args.budget)?;
    println!("Loaded {} budgets", budget_rows.len());

    let data = {
        let mut forex = ForexResolver::new(&config, &mut cache, !args.dry_run)?;
        reconcile::build_import_data(&config, records, budget_rows, &mut forex)?
    };

    match client {
        None => print_dry_run_summary(&data),
        Some(client) => {
            let mut engine = SyncEngine::new(&client, &config, &mut cache);
            engine.run(&data, args.min_date, args.max_date)?;
            println!("Import finished");
        }
    }
    Ok(())
}

fn print_dry_run_summary(data: &ImportData) {
    let mut withdrawals = 0usize;
    let mut deposits = 0usize;
    let mut transfers = 0usize;
    for item in data
        .transaction_groups
        .iter()
        .flat_map(|group| &group.transactions)
    {
        match item {
            LineItem::Withdrawal { .. } => withdrawals += 1,
            LineItem::Deposit { .. } => deposits += 1,
            LineItem::Transfer { .. } => transfers += 1,
        }
    }

    println!("Dry run: nothing was sent to Firefly III");
    println!("asset_accounts\t{}", data.asset_accounts.len());
    println!("revenue_accounts\t{}", data.revenue_accounts.len());
    println!("expense_accounts\t{}", data.expense_accounts.len());
    println!("categories\t{}", data.categories.len());
    println!("budgets\t{}", data.budgets.len());
    println!("budget_limits\t{}", data.budget_history.len());
    println!("transaction_groups\t{}", data.transaction_groups.len());
    println!("withdrawals\t{withdrawals}");
    println!("deposits\t{deposits}");
    println!("transfers\t{transfers}");
}
