use assert_cmd::prelude::*;
use std::path::{Path, PathBuf};
use std::process::Command;

fn ynab2firefly_cmd() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("ynab2firefly"));
    // Make sure an operator's environment doesn't leak into the tests.
    cmd.env_remove("FIREFLY_III_URL");
    cmd.env_remove("FIREFLY_III_ACCESS_TOKEN");
    cmd
}

const CONFIG: &str = r#"{
    "currency": "USD",
    "accounts": {
        "Cash EUR": {"currency": "EUR", "role": "cash"}
    },
    "payee_mapping": {"Mkt": "Market"},
    "fallback_rates": {"EUR": "0.9"}
}"#;

const REGISTER: &str = "\
\"Account\",\"Flag\",\"Check Number\",\"Date\",\"Payee\",\"Category\",\"Master Category\",\"Sub Category\",\"Memo\",\"Outflow\",\"Inflow\",\"Cleared\",\"Running Balance\"
\"Checking\",\"\",\"\",\"01/01/2020\",\"Starting Balance\",\"\",\"\",\"\",\"\",\"$0.00\",\"$1,000.00\",\"R\",\"$1,000.00\"
\"Savings\",\"\",\"\",\"01/01/2020\",\"Starting Balance\",\"\",\"\",\"\",\"\",\"$0.00\",\"$500.00\",\"R\",\"$500.00\"
\"Cash EUR\",\"\",\"\",\"01/01/2020\",\"Starting Balance\",\"\",\"\",\"\",\"\",\"$0.00\",\"$100.00\",\"R\",\"$100.00\"
\"Checking\",\"\",\"\",\"01/10/2020\",\"Employer\",\"Income:Available this month\",\"Income\",\"Available this month\",\"salary\",\"$0.00\",\"$2,000.00\",\"R\",\"$3,000.00\"
\"Checking\",\"Red\",\"\",\"01/12/2020\",\"Mkt\",\"Everyday Expenses:Groceries\",\"Everyday Expenses\",\"Groceries\",\"(Split 1/2) Groceries\",\"$42.50\",\"$0.00\",\"R\",\"$2,947.50\"
\"Checking\",\"Red\",\"\",\"01/12/2020\",\"Mkt\",\"Everyday Expenses:Snacks\",\"Everyday Expenses\",\"Snacks\",\"(Split 2/2) Snacks\",\"$10.00\",\"$0.00\",\"R\",\"$2,947.50\"
\"Checking\",\"\",\"\",\"01/15/2020\",\"Transfer : Savings\",\"\",\"\",\"\",\"\",\"$100.00\",\"$0.00\",\"R\",\"$2,847.50\"
\"Savings\",\"\",\"\",\"01/15/2020\",\"Transfer : Checking\",\"\",\"\",\"\",\"\",\"$0.00\",\"$100.00\",\"R\",\"$600.00\"
\"Cash EUR\",\"\",\"\",\"01/20/2020\",\"Restaurant\",\"Everyday Expenses:Dining\",\"Everyday Expenses\",\"Dining\",\"EUR 45.00 dinner\",\"$50.00\",\"$0.00\",\"\",\"$50.00\"
";

const BUDGET: &str = "\
\"Month\",\"Category\",\"Master Category\",\"Sub Category\",\"Budgeted\",\"Outflows\",\"Category Balance\"
\"January 2020\",\"Everyday Expenses:Groceries\",\"Everyday Expenses\",\"Groceries\",\"$300.00\",\"$52.50\",\"$247.50\"
\"January 2020\",\"Everyday Expenses:Snacks\",\"Everyday Expenses\",\"Snacks\",\"$50.00\",\"$10.00\",\"$40.00\"
\"January 2020\",\"Everyday Expenses:Dining\",\"Everyday Expenses\",\"Dining\",\"$100.00\",\"$50.00\",\"$50.00\"
";

fn write_fixtures(dir: &Path) -> (PathBuf, PathBuf, PathBuf) {
    let config = dir.join("config.json");
    let register = dir.join("My Budget as of 2020-02-01-Register.csv");
    let budget = dir.join("My Budget as of 2020-02-01-Budget.csv");
    std::fs::write(&config, CONFIG).expect("write config");
    std::fs::write(&register, REGISTER).expect("write register");
    std::fs::write(&budget, BUDGET).expect("write budget");
    (config, register, budget)
}

fn run_dry(dir: &Path) -> String {
    let (config, register, budget) = write_fixtures(dir);
    let mut cmd = ynab2firefly_cmd();
    cmd.arg("import")
        .arg(&config)
        .arg(&register)
        .arg(&budget)
        .arg("--dry-run")
        .arg("--cache-dir")
        .arg(dir.join("cache"));
    let out = cmd.assert().success().get_output().stdout.clone();
    String::from_utf8(out).expect("utf8 stdout")
}

#[test]
fn dry_run_reconciles_and_prints_summary_counts() {
    let dir = tempfile::tempdir().expect("tempdir");
    let out = run_dry(dir.path());

    assert!(out.contains("Loaded 9 transactions"), "got: {out}");
    assert!(out.contains("Loaded 3 budgets"), "got: {out}");
    assert!(out.contains("Dry run: nothing was sent to Firefly III"));

    // Three asset accounts, one payee each way (payee_mapping folds "Mkt"
    // into "Market").
    assert!(out.contains("asset_accounts\t3"), "got: {out}");
    assert!(out.contains("revenue_accounts\t1"), "got: {out}");
    assert!(out.contains("expense_accounts\t2"), "got: {out}");

    // Groceries/Snacks/Dining plus the two income buckets.
    assert!(out.contains("categories\t5"), "got: {out}");
    assert!(out.contains("budgets\t5"), "got: {out}");
    assert!(out.contains("budget_limits\t3"), "got: {out}");

    // Deposit, split pair as one group, the transfer pair folded into one
    // leg, and the foreign withdrawal.
    assert!(out.contains("transaction_groups\t4"), "got: {out}");
    assert!(out.contains("withdrawals\t3"), "got: {out}");
    assert!(out.contains("deposits\t1"), "got: {out}");
    assert!(out.contains("transfers\t1"), "got: {out}");
}

#[test]
fn dry_run_is_idempotent_over_the_same_input() {
    let dir = tempfile::tempdir().expect("tempdir");
    let first = run_dry(dir.path());
    let second = run_dry(dir.path());
    assert_eq!(first, second);
}

#[test]
fn unknown_budget_reference_aborts_the_run() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (config, register, _) = write_fixtures(dir.path());

    // A budget export missing the categories the register references.
    let budget = dir.path().join("empty-budget.csv");
    std::fs::write(
        &budget,
        "\"Month\",\"Category\",\"Master Category\",\"Sub Category\",\"Budgeted\",\"Outflows\",\"Category Balance\"\n",
    )
    .expect("write budget");

    let mut cmd = ynab2firefly_cmd();
    cmd.arg("import")
        .arg(&config)
        .arg(&register)
        .arg(&budget)
        .arg("--dry-run")
        .arg("--cache-dir")
        .arg(dir.path().join("cache"));
    let output = cmd.assert().failure().get_output().stderr.clone();
    let stderr = String::from_utf8(output).expect("utf8 stderr");
    assert!(stderr.contains("unknown budget"), "got: {stderr}");
}

#[test]
fn malformed_amount_aborts_with_the_raw_value() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (config, _, budget) = write_fixtures(dir.path());

    let register = dir.path().join("broken-register.csv");
    std::fs::write(
        &register,
        "\"Account\",\"Flag\",\"Check Number\",\"Date\",\"Payee\",\"Category\",\"Master Category\",\"Sub Category\",\"Memo\",\"Outflow\",\"Inflow\",\"Cleared\",\"Running Balance\"\n\
         \"Checking\",\"\",\"\",\"01/01/2020\",\"Starting Balance\",\"\",\"\",\"\",\"\",\"oops\",\"$1.00\",\"R\",\"$1.00\"\n",
    )
    .expect("write register");

    let mut cmd = ynab2firefly_cmd();
    cmd.arg("import")
        .arg(&config)
        .arg(&register)
        .arg(&budget)
        .arg("--dry-run")
        .arg("--cache-dir")
        .arg(dir.path().join("cache"));
    let output = cmd.assert().failure().get_output().stderr.clone();
    let stderr = String::from_utf8(output).expect("utf8 stderr");
    assert!(stderr.contains("|oops|"), "got: {stderr}");
}

#[test]
fn unresolvable_foreign_amount_names_the_missing_rate() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (_, register, budget) = write_fixtures(dir.path());

    // Same data, but no fallback rate and a memo that does not annotate the
    // EUR amount: dry runs make no remote calls, so this cannot resolve.
    let config = dir.path().join("no-fallback.json");
    std::fs::write(
        &config,
        r#"{
            "currency": "USD",
            "accounts": {"Cash EUR": {"currency": "EUR", "role": "cash"}},
            "payee_mapping": {"Mkt": "Market"}
        }"#,
    )
    .expect("write config");

    let register_text = std::fs::read_to_string(&register)
        .expect("read register")
        .replace("EUR 45.00 dinner", "dinner");
    std::fs::write(&register, register_text).expect("rewrite register");

    let mut cmd = ynab2firefly_cmd();
    cmd.arg("import")
        .arg(&config)
        .arg(&register)
        .arg(&budget)
        .arg("--dry-run")
        .arg("--cache-dir")
        .arg(dir.path().join("cache"));
    let output = cmd.assert().failure().get_output().stderr.clone();
    let stderr = String::from_utf8(output).expect("utf8 stderr");
    assert!(stderr.contains("fallback_rates.EUR"), "got: {stderr}");
    assert!(stderr.contains("Cash EUR"), "got: {stderr}");
}
