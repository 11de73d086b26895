use crate::config::{AccountRole, CategoryField};
use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, BTreeSet};

/// Payee fragment marking a register row as one leg of a transfer.
pub const TRANSFER_MARKER: &str = "Transfer : ";

/// Payee of the synthetic row that opens an account.
pub const STARTING_BALANCE_PAYEE: &str = "Starting Balance";

/// Master category grouping budgets that were hidden in YNAB.
pub const HIDDEN_MASTER_CATEGORY: &str = "Hidden Categories";

/// One row of the YNAB register export, normalized.
///
/// Exactly one of outflow/inflow is nonzero for any row that moves money;
/// rows with both zero (and starting-balance rows) only seed account
/// metadata. The foreign fields start out empty and are filled in by the
/// foreign currency resolver before any amount is read downstream.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerRecord {
    pub account: String,
    pub flag: String,
    pub date: NaiveDate,
    pub payee: String,
    pub category: String,
    pub master_category: String,
    pub sub_category: String,
    pub memo: String,
    pub outflow: Decimal,
    pub inflow: Decimal,
    pub cleared: String,
    pub running_balance: Decimal,

    pub foreign_amount: Option<Decimal>,
    pub foreign_currency: Option<String>,
}

impl LedgerRecord {
    pub fn is_expense(&self) -> bool {
        self.outflow > Decimal::ZERO
    }

    pub fn is_deposit(&self) -> bool {
        self.inflow > Decimal::ZERO
    }

    pub fn is_transfer(&self) -> bool {
        self.payee.contains(TRANSFER_MARKER)
    }

    pub fn is_reconciled(&self) -> bool {
        self.cleared == "R"
    }

    /// Counterpart account encoded in a transfer payee, e.g.
    /// "Transfer : Savings" or "(Split 1/2) Dinner / Transfer : Savings".
    /// Only meaningful when `is_transfer()` holds.
    pub fn transfer_account(&self) -> Option<&str> {
        let payee = match self.payee.split_once(" / ") {
            Some((_, rest)) if rest.contains(TRANSFER_MARKER) => rest,
            _ => self.payee.as_str(),
        };
        payee.split_once(" : ").map(|(_, account)| account.trim())
    }

    /// The side of the row that carries money, regardless of direction.
    pub fn raw_amount(&self) -> Decimal {
        if self.outflow > Decimal::ZERO {
            self.outflow
        } else {
            self.inflow
        }
    }
}

/// One row of the YNAB budget export, normalized. `month` is the first day
/// of the month the row applies to.
#[derive(Debug, Clone, PartialEq)]
pub struct BudgetRecord {
    pub month: NaiveDate,
    pub category: String,
    pub master_category: String,
    pub sub_category: String,
    pub budgeted: Decimal,
    pub outflows: Decimal,
    pub category_balance: Decimal,
}

impl BudgetRecord {
    pub fn is_hidden(&self) -> bool {
        self.master_category == HIDDEN_MASTER_CATEGORY
    }

    pub fn is_pre_ynab(&self) -> bool {
        self.category.starts_with("Pre-YNAB Debt")
    }
}

/// Row types the classifier can read category columns from.
pub trait CategorySource {
    fn raw_category(&self) -> &str;
    fn raw_master_category(&self) -> &str;
    fn raw_sub_category(&self) -> &str;

    fn category_column(&self, which: CategoryField) -> &str {
        match which {
            CategoryField::Category => self.raw_category(),
            CategoryField::MasterCategory => self.raw_master_category(),
            CategoryField::SubCategory => self.raw_sub_category(),
        }
    }
}

impl CategorySource for LedgerRecord {
    fn raw_category(&self) -> &str {
        &self.category
    }

    fn raw_master_category(&self) -> &str {
        &self.master_category
    }

    fn raw_sub_category(&self) -> &str {
        &self.sub_category
    }
}

impl CategorySource for BudgetRecord {
    fn raw_category(&self) -> &str {
        &self.category
    }

    fn raw_master_category(&self) -> &str {
        &self.master_category
    }

    fn raw_sub_category(&self) -> &str {
        &self.sub_category
    }
}

/// Fields shared by every uploaded transaction line.
#[derive(Debug, Clone, PartialEq)]
pub struct LineMeta {
    pub date: NaiveDate,
    pub amount: Decimal,
    pub description: String,
    pub notes: String,
    pub tags: Vec<String>,
    pub reconciled: bool,
    /// Remote-side dedup key, derived from the source running balance: two
    /// accounts never share a running balance for the same date and amount.
    pub external_id: String,
}

/// A single transaction line in its canonical direction.
#[derive(Debug, Clone, PartialEq)]
pub enum LineItem {
    Withdrawal {
        meta: LineMeta,
        account: String,
        payee: String,
        budget: String,
        category: String,
    },
    Deposit {
        meta: LineMeta,
        account: String,
        payee: String,
        budget: String,
        category: String,
    },
    Transfer {
        meta: LineMeta,
        from_account: String,
        to_account: String,
        /// Set iff exactly one side is a foreign-currency account.
        foreign: Option<(Decimal, String)>,
    },
}

impl LineItem {
    pub fn meta(&self) -> &LineMeta {
        match self {
            LineItem::Withdrawal { meta, .. }
            | LineItem::Deposit { meta, .. }
            | LineItem::Transfer { meta, .. } => meta,
        }
    }

    /// Firefly III transaction type discriminant.
    pub fn kind(&self) -> &'static str {
        match self {
            LineItem::Withdrawal { .. } => "withdrawal",
            LineItem::Deposit { .. } => "deposit",
            LineItem::Transfer { .. } => "transfer",
        }
    }
}

/// One physical posting: a split produces several lines, everything else one.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionGroup {
    pub title: String,
    pub transactions: Vec<LineItem>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssetAccount {
    pub name: String,
    pub opening_date: NaiveDate,
    pub opening_balance: Decimal,
    pub role: AccountRole,
    pub monthly_payment_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Budget {
    pub name: String,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BudgetHistory {
    pub name: String,
    pub amount: Decimal,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// Everything the sync engine uploads, fully reconciled and classified.
#[derive(Debug, Clone, Default)]
pub struct ImportData {
    pub asset_accounts: Vec<AssetAccount>,
    pub revenue_accounts: Vec<String>,
    pub expense_accounts: Vec<String>,

    pub categories: BTreeSet<String>,
    pub budgets: BTreeMap<String, Budget>,
    pub budget_history: Vec<BudgetHistory>,

    pub transaction_groups: Vec<TransactionGroup>,

    /// month start -> account -> balance at the end of that month.
    /// Verification oracle only; never feeds amount computations.
    pub running_balances: BTreeMap<NaiveDate, BTreeMap<String, Decimal>>,
}

pub fn month_start(date: NaiveDate) -> NaiveDate {
    NaiveDate::from_ymd_opt(date.year(), date.month(), 1).unwrap()
}

pub fn month_end(date: NaiveDate) -> NaiveDate {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1)
        .unwrap()
        .pred_opt()
        .unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(payee: &str) -> LedgerRecord {
        LedgerRecord {
            account: "Checking".to_string(),
            flag: String::new(),
            date: NaiveDate::from_ymd_opt(2020, 1, 15).unwrap(),
            payee: payee.to_string(),
            category: String::new(),
            master_category: String::new(),
            sub_category: String::new(),
            memo: String::new(),
            outflow: Decimal::new(10000, 2),
            inflow: Decimal::ZERO,
            cleared: "R".to_string(),
            running_balance: Decimal::new(50000, 2),
            foreign_amount: None,
            foreign_currency: None,
        }
    }

    #[test]
    fn transfer_detection_and_counterpart() {
        let tx = record("Transfer : Savings");
        assert!(tx.is_transfer());
        assert_eq!(tx.transfer_account(), Some("Savings"));

        let plain = record("Grocery Store");
        assert!(!plain.is_transfer());
        assert_eq!(plain.transfer_account(), None);
    }

    #[test]
    fn split_transfer_counterpart_skips_prefix() {
        let tx = record("(Split 1/2) Rent share / Transfer : Joint Account");
        assert!(tx.is_transfer());
        assert_eq!(tx.transfer_account(), Some("Joint Account"));
    }

    #[test]
    fn raw_amount_picks_the_nonzero_side() {
        let mut tx = record("Grocery Store");
        assert_eq!(tx.raw_amount(), Decimal::new(10000, 2));
        tx.outflow = Decimal::ZERO;
        tx.inflow = Decimal::new(2500, 2);
        assert_eq!(tx.raw_amount(), Decimal::new(2500, 2));
    }

    #[test]
    fn month_bounds() {
        let d = NaiveDate::from_ymd_opt(2020, 2, 14).unwrap();
        assert_eq!(month_start(d), NaiveDate::from_ymd_opt(2020, 2, 1).unwrap());
        assert_eq!(month_end(d), NaiveDate::from_ymd_opt(2020, 2, 29).unwrap());

        let december = NaiveDate::from_ymd_opt(2021, 12, 3).unwrap();
        assert_eq!(
            month_end(december),
            NaiveDate::from_ymd_opt(2021, 12, 31).unwrap()
        );
    }
}
