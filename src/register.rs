use crate::config::ImportConfig;
use crate::error::ImportError;
use crate::model::{BudgetRecord, LedgerRecord, month_start};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use regex::Regex;
use rust_decimal::Decimal;
use std::io::Read;
use std::path::Path;
use std::sync::LazyLock;

// Register columns: Account, Flag, Check Number, Date, Payee, Category,
// Master Category, Sub Category, Memo, Outflow, Inflow, Cleared,
// Running Balance.
const COL_ACCOUNT: usize = 0;
const COL_FLAG: usize = 1;
const COL_DATE: usize = 3;
const COL_PAYEE: usize = 4;
const COL_CATEGORY: usize = 5;
const COL_MASTER_CATEGORY: usize = 6;
const COL_SUB_CATEGORY: usize = 7;
const COL_MEMO: usize = 8;
const COL_OUTFLOW: usize = 9;
const COL_INFLOW: usize = 10;
const COL_CLEARED: usize = 11;
const COL_RUNNING_BALANCE: usize = 12;

// Budget columns: Month, Category, Master Category, Sub Category, Budgeted,
// Outflows, Category Balance.
const COL_BG_MONTH: usize = 0;
const COL_BG_CATEGORY: usize = 1;
const COL_BG_MASTER_CATEGORY: usize = 2;
const COL_BG_SUB_CATEGORY: usize = 3;
const COL_BG_BUDGETED: usize = 4;
const COL_BG_OUTFLOWS: usize = 5;
const COL_BG_BALANCE: usize = 6;

static AMOUNT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(-)?[^0-9]*([0-9,.]+)$").unwrap());

/// Parse a free-text currency cell like "$1,234.56" or "-€42.00".
///
/// Everything between an optional leading minus sign and the digits is
/// ignored; a cell without any digits is malformed input.
pub fn parse_amount(raw: &str) -> Result<Decimal, ImportError> {
    let caps = AMOUNT_RE
        .captures(raw.trim())
        .ok_or_else(|| ImportError::BadAmount(raw.to_string()))?;
    let digits = caps[2].replace(',', "");
    let mut amount = digits
        .parse::<Decimal>()
        .map_err(|_| ImportError::BadAmount(raw.to_string()))?;
    if caps.get(1).is_some() {
        amount = -amount;
    }
    Ok(amount)
}

/// Budget months use a fixed "month year" pattern independent of the
/// configured register pattern.
fn parse_budget_month(raw: &str) -> Result<NaiveDate, ImportError> {
    let date = NaiveDate::parse_from_str(&format!("{} 1", raw.trim()), "%B %Y %d").map_err(|_| {
        ImportError::BadDate {
            raw: raw.to_string(),
            pattern: "%B %Y".to_string(),
        }
    })?;
    Ok(month_start(date))
}

pub fn read_register(path: &Path, config: &ImportConfig) -> Result<Vec<LedgerRecord>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open register {}", path.display()))?;
    parse_register(file, config).with_context(|| format!("In register {}", path.display()))
}

pub fn parse_register(input: impl Read, config: &ImportConfig) -> Result<Vec<LedgerRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(input);

    let mut out = Vec::new();
    for (idx, row) in reader.records().enumerate() {
        // +2: 1-based and the header row was skipped.
        let line = idx + 2;
        let row = row.with_context(|| format!("Failed to read row {line}"))?;
        let cell = |col: usize| row.get(col).unwrap_or("").trim();

        let record = LedgerRecord {
            account: cell(COL_ACCOUNT).to_string(),
            flag: cell(COL_FLAG).to_string(),
            date: config.parse_date(cell(COL_DATE))?,
            payee: cell(COL_PAYEE).to_string(),
            category: cell(COL_CATEGORY).to_string(),
            master_category: cell(COL_MASTER_CATEGORY).to_string(),
            sub_category: cell(COL_SUB_CATEGORY).to_string(),
            memo: cell(COL_MEMO).to_string(),
            outflow: parse_amount(cell(COL_OUTFLOW)).with_context(|| format!("Row {line}"))?,
            inflow: parse_amount(cell(COL_INFLOW)).with_context(|| format!("Row {line}"))?,
            cleared: cell(COL_CLEARED).to_string(),
            running_balance: parse_amount(cell(COL_RUNNING_BALANCE))
                .with_context(|| format!("Row {line}"))?,
            foreign_amount: None,
            foreign_currency: None,
        };
        out.push(record);
    }
    Ok(out)
}

pub fn read_budgets(path: &Path) -> Result<Vec<BudgetRecord>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open budget export {}", path.display()))?;
    parse_budgets(file).with_context(|| format!("In budget export {}", path.display()))
}

pub fn parse_budgets(input: impl Read) -> Result<Vec<BudgetRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(input);

    let mut out = Vec::new();
    for (idx, row) in reader.records().enumerate() {
        let line = idx + 2;
        let row = row.with_context(|| format!("Failed to read row {line}"))?;
        let cell = |col: usize| row.get(col).unwrap_or("").trim();

        let record = BudgetRecord {
            month: parse_budget_month(cell(COL_BG_MONTH))?,
            category: cell(COL_BG_CATEGORY).to_string(),
            master_category: cell(COL_BG_MASTER_CATEGORY).to_string(),
            sub_category: cell(COL_BG_SUB_CATEGORY).to_string(),
            budgeted: parse_amount(cell(COL_BG_BUDGETED)).with_context(|| format!("Row {line}"))?,
            outflows: parse_amount(cell(COL_BG_OUTFLOWS)).with_context(|| format!("Row {line}"))?,
            category_balance: parse_amount(cell(COL_BG_BALANCE))
                .with_context(|| format!("Row {line}"))?,
        };
        out.push(record);
    }
    Ok(out)
}
