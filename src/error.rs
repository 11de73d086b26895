use chrono::NaiveDate;
use rust_decimal::Decimal;
use thiserror::Error;

/// Failures that end an import run. Remote transport errors are wrapped with
/// anyhow context at the call site; everything that is a property of the
/// ledger data or the configuration lives here.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("invalid value with no amount: |{0}|")]
    BadAmount(String),

    #[error("unparseable date |{raw}| (expected pattern {pattern})")]
    BadDate { raw: String, pattern: String },

    #[error("malformed transfer payee: |{0}|")]
    BadTransferPayee(String),

    #[error(
        "no exchange rate for {currency} on {date}; add fallback_rates.{currency} to the config or re-run with the rate service reachable"
    )]
    MissingRate { currency: String, date: NaiveDate },

    #[error(
        "cannot handle a transfer between two different foreign currencies ({from_currency} -> {to_currency}): |{payee}| on {date}"
    )]
    ForeignTransferMismatch {
        from_currency: String,
        to_currency: String,
        payee: String,
        date: NaiveDate,
    },

    #[error("transaction references unknown budget: |{0}|")]
    UnknownBudget(String),

    #[error("transaction references unknown category: |{0}|")]
    UnknownCategory(String),

    #[error("configured account has no transactions in the register: |{0}|")]
    UnknownConfiguredAccount(String),

    #[error("account |{0}| has no Starting Balance record")]
    MissingStartingBalance(String),

    #[error(
        "transfer {from} <-> {to} of {amount} on {date} appears more than twice in the register; the export is inconsistent"
    )]
    TransferTriple {
        from: String,
        to: String,
        date: NaiveDate,
        amount: Decimal,
    },

    #[error(
        "running balance for {account} does not match for {month}: ledger says {expected}, Firefly says {actual}"
    )]
    BalanceMismatch {
        account: String,
        month: String,
        expected: Decimal,
        actual: Decimal,
    },
}
