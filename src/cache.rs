use anyhow::{Context, Result};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// A remote entity as Firefly reported it: its primary key plus the raw
/// attribute object, kept verbatim for attribute diffing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteObject {
    pub id: String,
    pub attributes: Value,
}

impl RemoteObject {
    /// Build from one element of a list endpoint's `data` array.
    pub fn from_entry(entry: &Value) -> Option<Self> {
        let id = match &entry["id"] {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            _ => return None,
        };
        Some(Self {
            id,
            attributes: entry["attributes"].clone(),
        })
    }

    pub fn name(&self) -> Option<&str> {
        self.attributes["name"].as_str()
    }
}

/// Persisted identity cache: the only cross-run state.
///
/// Any entity class with at least one entry is considered already synced and
/// its creation step is skipped on later runs. The file is rewritten
/// atomically after every mutating remote call, never before it, so a crash
/// can only lose the association of work that was not yet confirmed remotely.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct SyncCache {
    #[serde(skip)]
    path: PathBuf,

    #[serde(default)]
    pub currencies: BTreeMap<String, String>,
    #[serde(default)]
    pub categories: BTreeMap<String, String>,
    #[serde(default)]
    pub budgets: BTreeMap<String, RemoteObject>,
    /// Keyed by `budget::start::end` (ISO dates).
    #[serde(default)]
    pub budget_limits: BTreeMap<String, RemoteObject>,
    #[serde(default)]
    pub asset_accounts: BTreeMap<String, RemoteObject>,
    #[serde(default)]
    pub revenue_accounts: BTreeMap<String, RemoteObject>,
    #[serde(default)]
    pub expense_accounts: BTreeMap<String, RemoteObject>,
    /// Historical exchange rates, keyed by `CODE::date`. Historical rates
    /// never change, so entries are kept forever.
    #[serde(default)]
    pub rates: BTreeMap<String, Decimal>,
}

impl SyncCache {
    /// Load the cache, starting empty when the file is missing or does not
    /// parse (a stale or corrupt cache only costs re-fetching).
    pub fn load(path: &Path) -> Result<Self> {
        let mut cache = if path.exists() {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("Failed to read cache {}", path.display()))?;
            match serde_json::from_str::<SyncCache>(&raw) {
                Ok(cache) => cache,
                Err(err) => {
                    log::warn!("Ignoring unreadable cache {}: {err}", path.display());
                    SyncCache::default()
                }
            }
        } else {
            SyncCache::default()
        };
        cache.path = path.to_path_buf();
        Ok(cache)
    }

    pub fn save(&self) -> Result<()> {
        let json = serde_json::to_vec(self)?;
        atomic_write(&self.path, &json)
            .with_context(|| format!("Failed to write cache {}", self.path.display()))
    }

    pub fn rate(&self, currency: &str, date: NaiveDate) -> Option<Decimal> {
        self.rates.get(&rate_key(currency, date)).copied()
    }

    pub fn set_rate(&mut self, currency: &str, date: NaiveDate, rate: Decimal) {
        self.rates.insert(rate_key(currency, date), rate);
    }
}

pub fn rate_key(currency: &str, date: NaiveDate) -> String {
    format!("{currency}::{date}")
}

pub fn budget_limit_key(budget: &str, start: NaiveDate, end: NaiveDate) -> String {
    format!("{budget}::{start}::{end}")
}

fn atomic_write(path: &Path, contents: &[u8]) -> Result<()> {
    let parent = path.parent().context("Cache path has no parent dir")?;
    fs::create_dir_all(parent)
        .with_context(|| format!("Failed to create dir {}", parent.display()))?;

    let tmp = parent.join(format!(
        ".{}.tmp",
        path.file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("firefly_data")
    ));

    {
        let mut f = fs::File::create(&tmp)
            .with_context(|| format!("Failed to create temp file {}", tmp.display()))?;
        f.write_all(contents)
            .with_context(|| format!("Failed to write temp file {}", tmp.display()))?;
        f.sync_all()
            .with_context(|| format!("Failed to sync temp file {}", tmp.display()))?;
    }

    fs::rename(&tmp, path)
        .with_context(|| format!("Failed to rename {} -> {}", tmp.display(), path.display()))?;
    Ok(())
}

/// Numeric view of a JSON value, for amount comparison.
pub fn value_as_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => n.to_string().parse().ok(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Calendar-date view of a JSON value; time components are ignored.
pub fn value_as_date(value: &Value) -> Option<NaiveDate> {
    let s = value.as_str()?;
    let date_part = s.split('T').next().unwrap_or(s);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}

/// Whether a remote entity differs from the payload we would send for it.
///
/// Decimals compare numerically (a missing or null remote value counts as
/// zero), dates compare as calendar dates, everything else by equality.
pub fn needs_update(local: &Value, remote_attributes: &Value) -> bool {
    let Some(fields) = local.as_object() else {
        return false;
    };
    fields
        .iter()
        .any(|(key, value)| !attr_matches(value, remote_attributes.get(key)))
}

fn attr_matches(local: &Value, remote: Option<&Value>) -> bool {
    let Some(remote) = remote.filter(|v| !v.is_null()) else {
        return match value_as_decimal(local) {
            Some(d) => d.is_zero(),
            None => local.is_null(),
        };
    };
    if let (Some(a), Some(b)) = (value_as_date(local), value_as_date(remote)) {
        return a == b;
    }
    if let (Some(a), Some(b)) = (value_as_decimal(local), value_as_decimal(remote)) {
        return a == b;
    }
    local == remote
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn composite_keys_are_unambiguous() {
        let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2020, 1, 31).unwrap();
        assert_eq!(
            budget_limit_key("Groceries", start, end),
            "Groceries::2020-01-01::2020-01-31"
        );
        assert_eq!(rate_key("EUR", start), "EUR::2020-01-01");
    }

    #[test]
    fn save_and_reload_round_trips() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("cache").join("firefly_data.json");

        let mut cache = SyncCache::load(&path).expect("load empty");
        cache.currencies.insert("USD".to_string(), "1".to_string());
        cache.set_rate(
            "EUR",
            NaiveDate::from_ymd_opt(2020, 1, 15).unwrap(),
            Decimal::new(92, 2),
        );
        cache.save().expect("save");

        let reloaded = SyncCache::load(&path).expect("reload");
        assert_eq!(reloaded.currencies.get("USD"), Some(&"1".to_string()));
        assert_eq!(
            reloaded.rate("EUR", NaiveDate::from_ymd_opt(2020, 1, 15).unwrap()),
            Some(Decimal::new(92, 2))
        );
        assert_eq!(
            reloaded.rate("EUR", NaiveDate::from_ymd_opt(2020, 1, 16).unwrap()),
            None
        );
    }

    #[test]
    fn corrupt_cache_starts_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("firefly_data.json");
        fs::write(&path, "{not json").expect("write garbage");

        let cache = SyncCache::load(&path).expect("load");
        assert!(cache.currencies.is_empty());
        assert!(cache.budgets.is_empty());
    }

    #[test]
    fn decimal_comparison_is_numeric() {
        let local = json!({"amount": "300.00"});
        assert!(!needs_update(&local, &json!({"amount": "300.0000000"})));
        assert!(!needs_update(&local, &json!({"amount": 300.0})));
        assert!(needs_update(&local, &json!({"amount": "299.99"})));
    }

    #[test]
    fn missing_remote_value_counts_as_zero() {
        assert!(!needs_update(&json!({"opening_balance": "0"}), &json!({})));
        assert!(!needs_update(
            &json!({"opening_balance": "0.00"}),
            &json!({"opening_balance": null})
        ));
        assert!(needs_update(&json!({"opening_balance": "10"}), &json!({})));
    }

    #[test]
    fn dates_compare_as_calendar_dates() {
        let local = json!({"start": "2020-01-01"});
        assert!(!needs_update(
            &local,
            &json!({"start": "2020-01-01T00:00:00+01:00"})
        ));
        assert!(needs_update(&local, &json!({"start": "2020-01-02"})));
    }

    #[test]
    fn plain_values_compare_by_equality() {
        let local = json!({"name": "Groceries", "active": true});
        assert!(!needs_update(
            &local,
            &json!({"name": "Groceries", "active": true, "extra": "ignored"})
        ));
        assert!(needs_update(
            &local,
            &json!({"name": "Groceries", "active": false})
        ));
    }
}
