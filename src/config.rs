use crate::error::ImportError;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Which column of the YNAB category hierarchy a value is read from.
///
/// `Category` is the concatenated form ("Everyday Expenses:Household"),
/// `MasterCategory` the group, `SubCategory` the leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryField {
    Category,
    MasterCategory,
    #[default]
    SubCategory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountRole {
    #[default]
    Default,
    CreditCard,
    Savings,
    Cash,
}

impl AccountRole {
    /// Firefly III `account_role` value for asset accounts.
    pub fn firefly_role(self) -> &'static str {
        match self {
            AccountRole::Default => "defaultAsset",
            AccountRole::CreditCard => "ccAsset",
            AccountRole::Savings => "savingAsset",
            AccountRole::Cash => "cashWalletAsset",
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AccountConfig {
    /// ISO 4217 currency code. The account is foreign iff this is set and
    /// differs from the default currency.
    #[serde(default)]
    pub currency: Option<String>,

    #[serde(default)]
    pub role: AccountRole,

    /// Monthly bill payment date for credit cards. Parsed as an ISO date
    /// first, then with the configured register pattern. Inferred from
    /// transfer history when missing.
    #[serde(default)]
    pub monthly_payment_date: Option<String>,

    /// Mark the account as inactive after import.
    #[serde(default)]
    pub inactive: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ImportConfig {
    /// Per-account overrides; only accounts that need customization have to
    /// be listed. Every listed account must appear in the register.
    #[serde(default)]
    pub accounts: BTreeMap<String, AccountConfig>,

    #[serde(default = "default_currency")]
    pub currency: String,

    /// chrono pattern for register dates.
    #[serde(default = "default_date_format")]
    pub date_format: String,

    #[serde(default)]
    pub payee_mapping: BTreeMap<String, String>,

    /// Raw concatenated category -> budget name. Takes precedence over the
    /// name derived from `budget_field`.
    #[serde(default)]
    pub budget_mapping: BTreeMap<String, String>,

    #[serde(default)]
    pub skip_budget_limits_import: bool,

    #[serde(default)]
    pub category_field: CategoryField,

    #[serde(default)]
    pub budget_field: CategoryField,

    /// Use the memo for the transaction description. The memo lands in the
    /// notes field otherwise.
    #[serde(default = "default_true")]
    pub memo_to_description: bool,

    #[serde(default = "default_empty_description")]
    pub empty_description: String,

    /// Per-currency rate used when the rate service is unreachable and no
    /// cached rate exists (always consulted in dry runs).
    #[serde(default)]
    pub fallback_rates: BTreeMap<String, Decimal>,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            accounts: BTreeMap::new(),
            currency: default_currency(),
            date_format: default_date_format(),
            payee_mapping: BTreeMap::new(),
            budget_mapping: BTreeMap::new(),
            skip_budget_limits_import: false,
            category_field: CategoryField::default(),
            budget_field: CategoryField::default(),
            memo_to_description: true,
            empty_description: default_empty_description(),
            fallback_rates: BTreeMap::new(),
        }
    }
}

fn default_currency() -> String {
    "USD".to_string()
}

fn default_date_format() -> String {
    "%m/%d/%Y".to_string()
}

fn default_empty_description() -> String {
    "(empty description)".to_string()
}

fn default_true() -> bool {
    true
}

impl ImportConfig {
    pub fn account(&self, name: &str) -> AccountConfig {
        self.accounts.get(name).cloned().unwrap_or_default()
    }

    /// Currency an account is denominated in.
    pub fn account_currency(&self, name: &str) -> String {
        self.accounts
            .get(name)
            .and_then(|a| a.currency.clone())
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| self.currency.clone())
    }

    pub fn is_foreign(&self, name: &str) -> bool {
        self.accounts
            .get(name)
            .and_then(|a| a.currency.as_deref())
            .is_some_and(|code| !code.is_empty() && code != self.currency)
    }

    pub fn parse_date(&self, raw: &str) -> Result<NaiveDate, ImportError> {
        NaiveDate::parse_from_str(raw.trim(), &self.date_format).map_err(|_| {
            ImportError::BadDate {
                raw: raw.to_string(),
                pattern: self.date_format.clone(),
            }
        })
    }

    pub fn mapped_payee(&self, raw: &str) -> String {
        let trimmed = raw.trim();
        self.payee_mapping
            .get(trimmed)
            .cloned()
            .unwrap_or_else(|| trimmed.to_string())
    }
}

pub fn load_config(path: &Path) -> Result<ImportConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    let cfg: ImportConfig = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse config {}", path.display()))?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_to_empty_config() {
        let cfg: ImportConfig = serde_json::from_str("{}").expect("parse empty config");
        assert_eq!(cfg.currency, "USD");
        assert_eq!(cfg.date_format, "%m/%d/%Y");
        assert!(cfg.memo_to_description);
        assert_eq!(cfg.empty_description, "(empty description)");
        assert_eq!(cfg.category_field, CategoryField::SubCategory);
        assert!(!cfg.skip_budget_limits_import);
    }

    #[test]
    fn foreign_account_detection() {
        let cfg: ImportConfig = serde_json::from_str(
            r#"{
                "currency": "USD",
                "accounts": {
                    "Cash EUR": {"currency": "EUR", "role": "cash"},
                    "Checking": {"role": "default"}
                }
            }"#,
        )
        .expect("parse config");

        assert!(cfg.is_foreign("Cash EUR"));
        assert!(!cfg.is_foreign("Checking"));
        assert!(!cfg.is_foreign("Unlisted"));
        assert_eq!(cfg.account_currency("Cash EUR"), "EUR");
        assert_eq!(cfg.account_currency("Checking"), "USD");
        assert_eq!(cfg.account("Cash EUR").role, AccountRole::Cash);
    }

    #[test]
    fn parse_date_uses_configured_pattern() {
        let cfg = ImportConfig::default();
        assert_eq!(
            cfg.parse_date("03/14/2020").expect("valid date"),
            NaiveDate::from_ymd_opt(2020, 3, 14).unwrap()
        );
        assert!(matches!(
            cfg.parse_date("2020-03-14"),
            Err(ImportError::BadDate { .. })
        ));
    }

    #[test]
    fn unknown_config_keys_are_rejected() {
        assert!(serde_json::from_str::<ImportConfig>(r#"{"curency": "USD"}"#).is_err());
    }
}
