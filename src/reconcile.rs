use crate::config::ImportConfig;
use crate::error::ImportError;
use crate::forex::ForexResolver;
use crate::model::{
    AssetAccount, Budget, BudgetHistory, BudgetRecord, CategorySource, HIDDEN_MASTER_CATEGORY,
    ImportData, LedgerRecord, LineItem, LineMeta, STARTING_BALANCE_PAYEE, TransactionGroup,
    month_end, month_start,
};
use anyhow::{Context, Result, anyhow};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, BTreeSet};

/// Special income budgets/categories YNAB uses for rule 4 ("live on last
/// month's income"); they exist in every export but never in the budget file.
const INCOME_BUDGETS: [&str; 2] = ["Available this month", "Available next month"];

const SPLIT_MARKER: &str = "(Split ";

/// Turn the raw export into everything the sync engine needs: classified
/// budgets, account metadata, canonical transaction groups, and the
/// running-balance oracle.
pub fn build_import_data(
    config: &ImportConfig,
    records: Vec<LedgerRecord>,
    budget_rows: Vec<BudgetRecord>,
    forex: &mut ForexResolver<'_>,
) -> Result<ImportData> {
    let mut data = ImportData::default();
    process_budgets(config, &budget_rows, &mut data);
    process_accounts(config, &records, &mut data)?;
    process_transactions(config, records, forex, &mut data)?;
    Ok(data)
}

/// Budget name for a row, honoring hidden-category re-derivation and the
/// configured rewrite table.
pub fn budget_name(config: &ImportConfig, row: &impl CategorySource) -> String {
    let derived = if row.raw_master_category() == HIDDEN_MASTER_CATEGORY {
        // Hidden rows carry the original name in a backtick-delimited
        // fragment of the concatenated category.
        let fragment = row.raw_category().split('`').nth(1).unwrap_or("").trim();
        format!("{fragment} (hidden)")
    } else {
        row.category_column(config.budget_field).to_string()
    };
    let derived = derived.trim().to_string();
    config
        .budget_mapping
        .get(row.raw_category())
        .cloned()
        .unwrap_or(derived)
}

pub fn category_name(config: &ImportConfig, row: &impl CategorySource) -> String {
    row.category_column(config.category_field).trim().to_string()
}

fn process_budgets(config: &ImportConfig, rows: &[BudgetRecord], data: &mut ImportData) {
    for row in rows {
        let category = category_name(config, row);
        if !category.is_empty() && !row.is_hidden() {
            data.categories.insert(category);
        }
    }
    for category in INCOME_BUDGETS {
        data.categories.insert(category.to_string());
    }

    for row in rows {
        if row.is_pre_ynab() {
            continue;
        }
        let name = budget_name(config, row);
        if name.is_empty() {
            continue;
        }
        let active = !row.is_hidden();
        data.budgets.insert(name.clone(), Budget { name, active });
    }
    for name in INCOME_BUDGETS {
        data.budgets.insert(
            name.to_string(),
            Budget {
                name: name.to_string(),
                active: true,
            },
        );
    }

    data.budget_history = rows
        .iter()
        .filter(|row| !row.is_pre_ynab() && !row.budgeted.is_zero())
        .filter_map(|row| {
            let name = budget_name(config, row);
            if name.is_empty() {
                return None;
            }
            Some(BudgetHistory {
                name,
                amount: row.budgeted,
                start: row.month,
                end: month_end(row.month),
            })
        })
        .collect();
}

fn process_accounts(
    config: &ImportConfig,
    records: &[LedgerRecord],
    data: &mut ImportData,
) -> Result<()> {
    let account_names: BTreeSet<&str> = records.iter().map(|tx| tx.account.as_str()).collect();
    for name in config.accounts.keys() {
        if !account_names.contains(name.as_str()) {
            return Err(ImportError::UnknownConfiguredAccount(name.clone()).into());
        }
    }

    let mut starting_balances: BTreeMap<&str, (NaiveDate, Decimal)> = BTreeMap::new();
    for tx in records {
        if tx.payee == STARTING_BALANCE_PAYEE {
            starting_balances.insert(tx.account.as_str(), (tx.date, tx.inflow - tx.outflow));
        }
    }

    for name in &account_names {
        let (opening_date, opening_balance) = starting_balances
            .get(name)
            .copied()
            .ok_or_else(|| ImportError::MissingStartingBalance(name.to_string()))?;
        let account_config = config.account(name);
        let role = account_config.role;

        let monthly_payment_date = if role == crate::config::AccountRole::CreditCard {
            Some(monthly_payment_date(config, records, name, &account_config)?)
        } else {
            None
        };

        data.asset_accounts.push(AssetAccount {
            name: name.to_string(),
            opening_date,
            opening_balance,
            role,
            monthly_payment_date,
        });
    }

    let revenue: BTreeSet<String> = records
        .iter()
        .filter(|tx| tx.is_deposit() && !tx.is_transfer() && tx.payee != STARTING_BALANCE_PAYEE)
        .map(|tx| config.mapped_payee(&tx.payee))
        .collect();
    let expense: BTreeSet<String> = records
        .iter()
        .filter(|tx| tx.is_expense() && !tx.is_transfer() && tx.payee != STARTING_BALANCE_PAYEE)
        .map(|tx| config.mapped_payee(&tx.payee))
        .collect();
    data.revenue_accounts = revenue.into_iter().collect();
    data.expense_accounts = expense.into_iter().collect();

    println!(
        "Configured account data for {} asset accounts, {} revenue accounts, and {} expense accounts",
        data.asset_accounts.len(),
        data.revenue_accounts.len(),
        data.expense_accounts.len()
    );
    Ok(())
}

fn monthly_payment_date(
    config: &ImportConfig,
    records: &[LedgerRecord],
    account: &str,
    account_config: &crate::config::AccountConfig,
) -> Result<NaiveDate> {
    if let Some(raw) = account_config
        .monthly_payment_date
        .as_deref()
        .filter(|s| !s.trim().is_empty())
    {
        if let Ok(date) = NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d") {
            return Ok(date);
        }
        return config
            .parse_date(raw)
            .with_context(|| format!("monthly_payment_date for account |{account}|"));
    }

    // Infer from the most recent transfer paying into this account.
    let inferred = records
        .iter()
        .rev()
        .find(|tx| tx.is_transfer() && tx.transfer_account() == Some(account))
        .map(|tx| tx.date);
    match inferred {
        Some(date) => Ok(date),
        None => {
            log::warn!("Couldn't figure out monthly payment date for {account}, defaulting to 01/01");
            Ok(NaiveDate::from_ymd_opt(2020, 1, 1).unwrap())
        }
    }
}

/// Grouping key for memo-tagged split rows.
///
/// Splits of a transfer must share both accounts; splits of an expense or
/// deposit share the account and the direction. The running balance pins the
/// physical posting, separating same-day groups.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct SplitKey {
    account: String,
    counterpart: Option<String>,
    deposit: Option<bool>,
    date: NaiveDate,
    running_balance: Decimal,
}

fn split_key(tx: &LedgerRecord) -> Result<SplitKey> {
    if tx.is_transfer() {
        let counterpart = tx
            .transfer_account()
            .ok_or_else(|| ImportError::BadTransferPayee(tx.payee.clone()))?;
        Ok(SplitKey {
            account: tx.account.clone(),
            counterpart: Some(counterpart.to_string()),
            deposit: None,
            date: tx.date,
            running_balance: tx.running_balance,
        })
    } else {
        Ok(SplitKey {
            account: tx.account.clone(),
            counterpart: None,
            deposit: Some(tx.is_deposit()),
            date: tx.date,
            running_balance: tx.running_balance,
        })
    }
}

/// Reorient a transfer leg so the account is always the side money leaves.
fn fix_transfer(tx: &LedgerRecord) -> Result<LedgerRecord> {
    if !tx.is_transfer() {
        return Ok(tx.clone());
    }
    let counterpart = tx
        .transfer_account()
        .ok_or_else(|| ImportError::BadTransferPayee(tx.payee.clone()))?
        .to_string();

    let mut out = tx.clone();
    if tx.outflow > Decimal::ZERO {
        out.payee = counterpart;
    } else {
        out.account = counterpart;
        out.payee = tx.account.clone();
        out.outflow = tx.inflow;
        out.inflow = tx.outflow;
    }
    Ok(out)
}

/// Dedup key for double-logged transfers: each logical transfer appears once
/// per account, with the same pair, date, and magnitude.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct TransferKey {
    accounts: (String, String),
    date: NaiveDate,
    amount: Decimal,
}

fn transfer_key(tx: &LedgerRecord) -> TransferKey {
    let mut pair = [tx.account.clone(), tx.payee.clone()];
    pair.sort();
    let [a, b] = pair;
    TransferKey {
        accounts: (a, b),
        date: tx.date,
        amount: (tx.outflow - tx.inflow).abs(),
    }
}

fn description(config: &ImportConfig, tx: &LedgerRecord) -> String {
    if !config.memo_to_description {
        return config.empty_description.clone();
    }
    let memo = tx.memo.trim();
    let memo = if memo.contains(SPLIT_MARKER) {
        memo.splitn(2, ')').nth(1).unwrap_or("").trim()
    } else {
        memo
    };
    if memo.is_empty() {
        config.empty_description.clone()
    } else {
        memo.to_string()
    }
}

fn notes(config: &ImportConfig, tx: &LedgerRecord) -> String {
    if config.memo_to_description {
        String::new()
    } else {
        tx.memo.trim().to_string()
    }
}

fn tags(tx: &LedgerRecord) -> Vec<String> {
    if tx.flag.is_empty() {
        Vec::new()
    } else {
        vec![tx.flag.clone()]
    }
}

fn process_transactions(
    config: &ImportConfig,
    records: Vec<LedgerRecord>,
    forex: &mut ForexResolver<'_>,
    data: &mut ImportData,
) -> Result<()> {
    // Replay in reverse so the first hit per (month, account) is the last
    // record of that month: its running balance is the end-of-month balance.
    for tx in records.iter().rev() {
        data.running_balances
            .entry(month_start(tx.date))
            .or_default()
            .entry(tx.account.clone())
            .or_insert(tx.running_balance);
    }

    let transactions: Vec<LedgerRecord> = records
        .into_iter()
        .filter(|tx| {
            !(tx.inflow.is_zero() && tx.outflow.is_zero()) && tx.payee != STARTING_BALANCE_PAYEE
        })
        .collect();

    // Group splits first: a split transfer's legs must be matched against the
    // split rendition of its counterpart, not a stray single leg.
    let mut split_groups: Vec<Vec<LedgerRecord>> = Vec::new();
    let mut split_index: BTreeMap<SplitKey, usize> = BTreeMap::new();
    let mut singles: Vec<Vec<LedgerRecord>> = Vec::new();
    for tx in transactions {
        if tx.memo.contains(SPLIT_MARKER) {
            let key = split_key(&tx)?;
            match split_index.get(&key) {
                Some(&idx) => split_groups[idx].push(tx),
                None => {
                    split_index.insert(key, split_groups.len());
                    split_groups.push(vec![tx]);
                }
            }
        } else {
            singles.push(vec![tx]);
        }
    }

    let mut grouped = split_groups;
    grouped.extend(singles);
    // Stable by date: splits stay ahead of single rows on the same day.
    grouped.sort_by_key(|group| group[0].date);

    let mut transfers_seen: BTreeMap<TransferKey, u32> = BTreeMap::new();
    let mut withdrawals = 0usize;
    let mut deposits = 0usize;
    let mut transfers = 0usize;

    for group_records in grouped {
        let mut group = TransactionGroup {
            title: config.empty_description.clone(),
            transactions: Vec::new(),
        };

        for tx in group_records {
            let was_transfer = tx.is_transfer();
            let tx = fix_transfer(&tx)?;
            let tx = forex.resolve(&tx, was_transfer).with_context(|| {
                format!(
                    "Failed to resolve foreign amount for |{}| -> |{}| on {}",
                    tx.account, tx.payee, tx.date
                )
            })?;

            let budget = budget_name(config, &tx);
            let category = if budget.is_empty() {
                String::new()
            } else {
                let known = data
                    .budgets
                    .get(&budget)
                    .ok_or_else(|| ImportError::UnknownBudget(budget.clone()))?;
                if known.active {
                    let category = category_name(config, &tx);
                    if !category.is_empty() && !data.categories.contains(&category) {
                        return Err(ImportError::UnknownCategory(category).into());
                    }
                    category
                } else {
                    // Hidden budgets keep their budget link but lose the
                    // category reference.
                    String::new()
                }
            };

            let amount = if config.is_foreign(&tx.account) {
                tx.foreign_amount.ok_or_else(|| {
                    anyhow!("Unresolved foreign amount for account |{}|", tx.account)
                })?
            } else {
                tx.raw_amount()
            };

            let meta = LineMeta {
                date: tx.date,
                amount,
                description: description(config, &tx),
                notes: notes(config, &tx),
                tags: tags(&tx),
                reconciled: tx.is_reconciled(),
                // Running balances differ between the two accounts of a
                // same-day same-amount pair, which is what makes this key
                // collision-free.
                external_id: tx.running_balance.to_string(),
            };

            if was_transfer {
                let key = transfer_key(&tx);
                let count = transfers_seen.entry(key.clone()).or_insert(0);
                *count += 1;
                match *count {
                    1 => {}
                    2 => continue,
                    _ => {
                        return Err(ImportError::TransferTriple {
                            from: key.accounts.0,
                            to: key.accounts.1,
                            date: key.date,
                            amount: key.amount,
                        }
                        .into());
                    }
                }

                let from_foreign = config.is_foreign(&tx.account);
                let to_foreign = config.is_foreign(&tx.payee);
                let foreign = if from_foreign != to_foreign {
                    tx.foreign_amount
                        .zip(tx.foreign_currency.clone())
                } else {
                    None
                };

                group.transactions.push(LineItem::Transfer {
                    meta,
                    from_account: tx.account.clone(),
                    to_account: tx.payee.clone(),
                    foreign,
                });
                transfers += 1;
            } else if tx.is_expense() {
                group.transactions.push(LineItem::Withdrawal {
                    meta,
                    account: tx.account.clone(),
                    payee: config.mapped_payee(&tx.payee),
                    budget,
                    category,
                });
                withdrawals += 1;
            } else if tx.is_deposit() {
                group.transactions.push(LineItem::Deposit {
                    meta,
                    account: tx.account.clone(),
                    payee: config.mapped_payee(&tx.payee),
                    budget,
                    category,
                });
                deposits += 1;
            } else {
                return Err(anyhow!(
                    "Cannot classify register row for |{}| / |{}| on {}",
                    tx.account,
                    tx.payee,
                    tx.date
                ));
            }
        }

        // A group whose only leg was the duplicate side of a transfer has
        // nothing left to upload.
        if !group.transactions.is_empty() {
            data.transaction_groups.push(group);
        }
    }

    println!(
        "Configured transaction data for {} deposits and {} withdrawals, and {} transfers in a total of {} groups",
        deposits,
        withdrawals,
        transfers,
        data.transaction_groups.len()
    );
    Ok(())
}
