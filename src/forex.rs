use crate::cache::{SyncCache, value_as_decimal};
use crate::config::ImportConfig;
use crate::error::ImportError;
use crate::model::LedgerRecord;
use anyhow::{Context, Result, anyhow};
use chrono::NaiveDate;
use regex::Regex;
use reqwest::blocking::Client;
use rust_decimal::Decimal;
use std::sync::LazyLock;

const RATE_SERVICE_URL: &str = "https://api.exchangeratesapi.io";

// "EUR 45.00 dinner", "VES 1,250K; taxi" - a currency code, an amount with
// an optional thousands suffix, and whatever trails it.
static MEMO_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^.*([A-Z]{3})\s+([0-9][0-9,.]*)(K)?;?(.*)$").unwrap());

/// Resolves the foreign-currency amount of any leg touching a foreign
/// account, preferring the amount embedded in the memo over a historical
/// exchange rate. Rates come from the cache, the rate service (when network
/// use is allowed), or the configured fallback table, in that order.
pub struct ForexResolver<'a> {
    config: &'a ImportConfig,
    cache: &'a mut SyncCache,
    http: Option<Client>,
}

impl<'a> ForexResolver<'a> {
    pub fn new(config: &'a ImportConfig, cache: &'a mut SyncCache, allow_network: bool) -> Result<Self> {
        let http = if allow_network {
            Some(
                Client::builder()
                    .build()
                    .context("Failed to build HTTP client for rate lookups")?,
            )
        } else {
            None
        };
        Ok(Self { config, cache, http })
    }

    /// Fill in `foreign_amount`/`foreign_currency` for a leg touching a
    /// foreign account. Resolution is idempotent: an already-resolved record
    /// passes through unchanged. `is_transfer` reflects the record before
    /// canonical reorientation, which rewrites the payee.
    pub fn resolve(&mut self, tx: &LedgerRecord, is_transfer: bool) -> Result<LedgerRecord> {
        if tx.foreign_amount.is_some() {
            return Ok(tx.clone());
        }

        let account_foreign = self.config.is_foreign(&tx.account);
        let payee_foreign = self.config.is_foreign(&tx.payee);
        if !account_foreign && !payee_foreign {
            return Ok(tx.clone());
        }

        if is_transfer && account_foreign && payee_foreign {
            let from_currency = self.config.account_currency(&tx.account);
            let to_currency = self.config.account_currency(&tx.payee);
            if from_currency != to_currency {
                return Err(ImportError::ForeignTransferMismatch {
                    from_currency,
                    to_currency,
                    payee: tx.payee.clone(),
                    date: tx.date,
                }
                .into());
            }
        }

        let foreign_account = if account_foreign { &tx.account } else { &tx.payee };
        let currency = self.config.account_currency(foreign_account);

        let mut out = tx.clone();
        if let Some(caps) = MEMO_RE.captures(&tx.memo) {
            if &caps[1] == currency {
                let mut amount: Decimal = caps[2]
                    .replace(',', "")
                    .parse()
                    .map_err(|_| ImportError::BadAmount(caps[2].to_string()))?;
                if caps.get(3).is_some() {
                    amount *= Decimal::from(1000);
                }
                out.memo = caps
                    .get(4)
                    .map(|m| m.as_str().trim().to_string())
                    .unwrap_or_default();
                out.foreign_amount = Some(amount);
                out.foreign_currency = Some(currency);
                return Ok(out);
            }
        }

        let rate = self.rate_for(&currency, tx.date)?;
        out.foreign_amount = Some(tx.raw_amount() * rate);
        out.foreign_currency = Some(currency);
        Ok(out)
    }

    fn rate_for(&mut self, currency: &str, date: NaiveDate) -> Result<Decimal> {
        if let Some(rate) = self.cache.rate(currency, date) {
            return Ok(rate);
        }

        if let Some(client) = &self.http {
            match fetch_rate(client, &self.config.currency, currency, date) {
                Ok(rate) => {
                    self.cache.set_rate(currency, date, rate);
                    self.cache.save()?;
                    return Ok(rate);
                }
                Err(err) => {
                    log::warn!("Rate service lookup failed for {currency} on {date}: {err:#}");
                }
            }
        }

        if let Some(rate) = self.config.fallback_rates.get(currency) {
            return Ok(*rate);
        }

        Err(ImportError::MissingRate {
            currency: currency.to_string(),
            date,
        }
        .into())
    }
}

fn fetch_rate(client: &Client, base: &str, currency: &str, date: NaiveDate) -> Result<Decimal> {
    let url = format!("{RATE_SERVICE_URL}/{date}");
    let response = client
        .get(&url)
        .query(&[("base", base), ("symbols", currency)])
        .send()
        .with_context(|| format!("Rate request to {url} failed"))?;

    if !response.status().is_success() {
        return Err(anyhow!("Rate service returned HTTP {}", response.status()));
    }

    let body: serde_json::Value = response
        .json()
        .context("Rate service returned invalid JSON")?;
    value_as_decimal(&body["rates"][currency])
        .ok_or_else(|| anyhow!("Rate service response has no rate for {currency}: {body}"))
}
