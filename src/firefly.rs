use crate::cache::{
    RemoteObject, SyncCache, budget_limit_key, needs_update, value_as_date, value_as_decimal,
};
use crate::config::{AccountRole, ImportConfig};
use crate::error::ImportError;
use crate::model::{ImportData, LineItem, TransactionGroup, month_end, month_start};
use anyhow::{Context, Result, anyhow, bail};
use chrono::NaiveDate;
use indicatif::{ProgressBar, ProgressStyle};
use regex::Regex;
use reqwest::Method;
use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue};
use rust_decimal::Decimal;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::sync::LazyLock;

static DUPLICATE_TX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^Duplicate of transaction #([0-9]+)\.$").unwrap());

/// Thin blocking wrapper over the Firefly III REST API.
///
/// Transport failures are fatal; HTTP-level failures are handed back in the
/// response so callers can apply their own policy (duplicate detection,
/// swallowed budget 5xx).
pub struct FireflyClient {
    base_url: String,
    http: Client,
}

pub struct ApiResponse {
    pub status: reqwest::StatusCode,
    pub body: Value,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Unwrap the body, surfacing the full error payload on failure.
    pub fn into_data(self, what: &str) -> Result<Value> {
        if self.is_success() {
            Ok(self.body)
        } else {
            Err(anyhow!("{what} failed: HTTP {}: {}", self.status, self.body))
        }
    }
}

impl FireflyClient {
    pub fn new(base_url: &str, token: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let mut auth = HeaderValue::from_str(&format!("Bearer {token}"))
            .context("Access token is not a valid header value")?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let http = Client::builder()
            .default_headers(headers)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    fn request(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<ApiResponse> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.http.request(method.clone(), &url);
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request
            .send()
            .with_context(|| format!("{method} {url} failed"))?;
        let status = response.status();
        let body = response.json().unwrap_or(Value::Null);
        Ok(ApiResponse { status, body })
    }

    pub fn get(&self, path: &str, query: &[(&str, String)]) -> Result<ApiResponse> {
        self.request(Method::GET, path, query, None)
    }

    pub fn post(&self, path: &str, body: Option<&Value>) -> Result<ApiResponse> {
        self.request(Method::POST, path, &[], body)
    }

    pub fn put(&self, path: &str, body: &Value) -> Result<ApiResponse> {
        self.request(Method::PUT, path, &[], Some(body))
    }

    /// Drain a paginated list endpoint until it reports the last page.
    pub fn get_all_pages(&self, path: &str, query: &[(&str, String)]) -> Result<Vec<Value>> {
        let mut page = 1i64;
        let mut out = Vec::new();
        loop {
            let mut q: Vec<(&str, String)> = query.to_vec();
            q.push(("page", page.to_string()));
            let body = self.get(path, &q)?.into_data(path)?;
            if let Some(data) = body["data"].as_array() {
                out.extend(data.iter().cloned());
            }
            let pagination = &body["meta"]["pagination"];
            let current = pagination["current_page"].as_i64().unwrap_or(1);
            let total = pagination["total_pages"].as_i64().unwrap_or(1);
            if current >= total {
                break;
            }
            page = current + 1;
        }
        Ok(out)
    }

    pub fn verify_connection(&self) -> Result<()> {
        let body = self
            .get("/api/v1/about/user", &[])?
            .into_data("Connection check")?;
        let email = body["data"]["attributes"]["email"]
            .as_str()
            .unwrap_or("<unknown>");
        println!("Authenticated successfully as {email}");
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PayeeKind {
    Revenue,
    Expense,
}

impl PayeeKind {
    fn as_str(self) -> &'static str {
        match self {
            PayeeKind::Revenue => "revenue",
            PayeeKind::Expense => "expense",
        }
    }
}

/// Idempotent create-or-update of every entity class, then the chronological
/// transaction upload. The cache decides what is already done; it is written
/// back after every confirmed remote mutation.
pub struct SyncEngine<'a> {
    client: &'a FireflyClient,
    config: &'a ImportConfig,
    cache: &'a mut SyncCache,
}

impl<'a> SyncEngine<'a> {
    pub fn new(client: &'a FireflyClient, config: &'a ImportConfig, cache: &'a mut SyncCache) -> Self {
        Self {
            client,
            config,
            cache,
        }
    }

    pub fn run(
        &mut self,
        data: &ImportData,
        min_date: Option<NaiveDate>,
        max_date: Option<NaiveDate>,
    ) -> Result<()> {
        self.sync_currencies()?;
        self.sync_categories(data)?;
        self.sync_budgets(data)?;
        self.sync_budget_limits(data)?;
        self.sync_asset_accounts(data)?;
        self.sync_payee_accounts(PayeeKind::Revenue, &data.revenue_accounts)?;
        self.sync_payee_accounts(PayeeKind::Expense, &data.expense_accounts)?;
        self.upload_transactions(data, min_date, max_date)?;
        self.deactivate_accounts()?;
        Ok(())
    }

    fn sync_currencies(&mut self) -> Result<()> {
        if !self.cache.currencies.is_empty() {
            log::info!("Currencies already synced, skipping");
            return Ok(());
        }
        let entries = self.client.get_all_pages("/api/v1/currencies", &[])?;
        for entry in &entries {
            let Some(obj) = RemoteObject::from_entry(entry) else {
                continue;
            };
            if let Some(code) = obj.attributes["code"].as_str() {
                self.cache.currencies.insert(code.to_string(), obj.id);
            }
        }
        self.cache.save()?;

        // Keep EUR (Firefly's recommendation), the default currency, and
        // every configured account currency; disable the rest.
        let mut keep: Vec<&str> = vec!["EUR", self.config.currency.as_str()];
        keep.extend(
            self.config
                .accounts
                .values()
                .filter_map(|a| a.currency.as_deref())
                .filter(|c| !c.is_empty()),
        );

        for entry in &entries {
            let attrs = &entry["attributes"];
            let Some(code) = attrs["code"].as_str() else {
                continue;
            };
            if code == self.config.currency && !attrs["default"].as_bool().unwrap_or(false) {
                self.client
                    .post(&format!("/api/v1/currencies/{code}/default"), None)?
                    .into_data("Setting default currency")?;
            }
            let enabled = attrs["enabled"].as_bool().unwrap_or(false);
            if keep.contains(&code) {
                if !enabled {
                    self.client
                        .post(&format!("/api/v1/currencies/{code}/enable"), None)?
                        .into_data("Enabling currency")?;
                }
            } else if enabled {
                self.client
                    .post(&format!("/api/v1/currencies/{code}/disable"), None)?
                    .into_data("Disabling currency")?;
            }
        }
        println!("Synced {} currencies", self.cache.currencies.len());
        Ok(())
    }

    fn sync_categories(&mut self, data: &ImportData) -> Result<()> {
        if !self.cache.categories.is_empty() {
            log::info!("Categories already synced, skipping");
            return Ok(());
        }
        let entries = self.client.get_all_pages("/api/v1/categories", &[])?;
        for entry in &entries {
            let Some(obj) = RemoteObject::from_entry(entry) else {
                continue;
            };
            if let Some(name) = obj.name() {
                self.cache.categories.insert(name.to_string(), obj.id);
            }
        }
        self.cache.save()?;

        for category in &data.categories {
            if self.cache.categories.contains_key(category) {
                continue;
            }
            let body = self
                .client
                .post("/api/v1/categories", Some(&json!({"name": category})))?
                .into_data("Creating category")?;
            let obj = RemoteObject::from_entry(&body["data"])
                .ok_or_else(|| anyhow!("Category create response has no id: {body}"))?;
            self.cache.categories.insert(category.clone(), obj.id);
            self.cache.save()?;
        }
        println!("Synced {} categories", self.cache.categories.len());
        Ok(())
    }

    fn sync_budgets(&mut self, data: &ImportData) -> Result<()> {
        if !self.cache.budgets.is_empty() {
            log::info!("Budgets already synced, skipping");
            return Ok(());
        }
        let entries = self.client.get_all_pages("/api/v1/budgets", &[])?;
        for entry in &entries {
            let Some(obj) = RemoteObject::from_entry(entry) else {
                continue;
            };
            let Some(name) = obj.name().map(str::to_string) else {
                continue;
            };
            self.cache.budgets.insert(name, obj);
        }
        self.cache.save()?;

        for budget in data.budgets.values() {
            let payload = json!({"name": budget.name, "active": budget.active});
            if let Some(remote) = self.cache.budgets.get(&budget.name) {
                if needs_update(&payload, &remote.attributes) {
                    let response = self
                        .client
                        .put(&format!("/api/v1/budgets/{}", remote.id), &payload)?;
                    self.check_budget_response(response, "Updating budget", &budget.name)?;
                }
            } else {
                let response = self.client.post("/api/v1/budgets", Some(&payload))?;
                if response.is_success() {
                    if let Some(obj) = RemoteObject::from_entry(&response.body["data"]) {
                        self.cache.budgets.insert(budget.name.clone(), obj);
                        self.cache.save()?;
                    }
                } else {
                    self.check_budget_response(response, "Creating budget", &budget.name)?;
                }
            }
        }
        println!("Synced {} budgets", self.cache.budgets.len());
        Ok(())
    }

    /// Firefly has been observed to apply budget writes and still answer
    /// with a 5xx; those are logged and ignored.
    fn check_budget_response(
        &self,
        response: ApiResponse,
        what: &str,
        budget: &str,
    ) -> Result<()> {
        if response.is_success() {
            return Ok(());
        }
        if response.status.is_server_error() {
            log::warn!(
                "{what} |{budget}| returned HTTP {}; assuming Firefly applied it anyway",
                response.status
            );
            return Ok(());
        }
        Err(anyhow!(
            "{what} |{budget}| failed: HTTP {}: {}",
            response.status,
            response.body
        ))
    }

    fn sync_budget_limits(&mut self, data: &ImportData) -> Result<()> {
        if self.config.skip_budget_limits_import {
            println!("Skipping budget limits import as requested");
            return Ok(());
        }
        if !self.cache.budget_limits.is_empty() {
            log::info!("Budget limits already synced, skipping");
            return Ok(());
        }

        let budgets: Vec<(String, String)> = self
            .cache
            .budgets
            .iter()
            .map(|(name, obj)| (name.clone(), obj.id.clone()))
            .collect();
        for (name, id) in &budgets {
            let entries = self
                .client
                .get_all_pages(&format!("/api/v1/budgets/{id}/limits"), &[])?;
            for entry in &entries {
                let Some(obj) = RemoteObject::from_entry(entry) else {
                    continue;
                };
                let (Some(start), Some(end)) = (
                    value_as_date(&obj.attributes["start"]),
                    value_as_date(&obj.attributes["end"]),
                ) else {
                    continue;
                };
                self.cache
                    .budget_limits
                    .insert(budget_limit_key(name, start, end), obj);
            }
        }
        self.cache.save()?;

        for limit in &data.budget_history {
            let Some(budget) = self.cache.budgets.get(&limit.name) else {
                log::warn!("Skipping budget limit for budget |{}| that never synced", limit.name);
                continue;
            };
            let budget_id = budget.id.clone();
            let payload = json!({
                "budget_id": budget_id,
                "start": limit.start.to_string(),
                "end": limit.end.to_string(),
                "amount": limit.amount.to_string(),
            });
            let key = budget_limit_key(&limit.name, limit.start, limit.end);
            if let Some(remote) = self.cache.budget_limits.get(&key) {
                if needs_update(&payload, &remote.attributes) {
                    self.client
                        .put(&format!("/api/v1/budgets/limits/{}", remote.id), &payload)?
                        .into_data("Updating budget limit")?;
                }
            } else {
                let body = self
                    .client
                    .post(&format!("/api/v1/budgets/{budget_id}/limits"), Some(&payload))?
                    .into_data("Creating budget limit")?;
                if let Some(obj) = RemoteObject::from_entry(&body["data"]) {
                    self.cache.budget_limits.insert(key, obj);
                    self.cache.save()?;
                }
            }
        }
        println!("Synced {} budget limits", self.cache.budget_limits.len());
        Ok(())
    }

    fn list_accounts(
        &self,
        kind: &str,
        date: Option<NaiveDate>,
    ) -> Result<BTreeMap<String, RemoteObject>> {
        let mut query = vec![("type", kind.to_string())];
        if let Some(date) = date {
            query.push(("date", date.to_string()));
        }
        let entries = self.client.get_all_pages("/api/v1/accounts", &query)?;
        let mut out = BTreeMap::new();
        for entry in &entries {
            let Some(obj) = RemoteObject::from_entry(entry) else {
                continue;
            };
            let Some(name) = obj.name().map(str::to_string) else {
                continue;
            };
            out.insert(name, obj);
        }
        Ok(out)
    }

    fn sync_asset_accounts(&mut self, data: &ImportData) -> Result<()> {
        if !self.cache.asset_accounts.is_empty() {
            log::info!("Asset accounts already synced, skipping");
            return Ok(());
        }
        self.cache.asset_accounts = self.list_accounts("asset", None)?;
        self.cache.save()?;

        for account in &data.asset_accounts {
            let currency = self.config.account_currency(&account.name);
            let currency_id = self
                .cache
                .currencies
                .get(&currency)
                .cloned()
                .ok_or_else(|| anyhow!("Currency {currency} is not known to Firefly"))?;

            let mut payload = json!({
                "name": account.name,
                "active": true,
                "type": "asset",
                "account_role": account.role.firefly_role(),
                "currency_id": currency_id,
                "include_net_worth": true,
            });
            if !account.opening_balance.is_zero() {
                // Firefly ignores the date unless the balance is nonzero.
                payload["opening_balance"] = json!(account.opening_balance.to_string());
                payload["opening_balance_date"] = json!(account.opening_date.to_string());
            }
            if account.role == AccountRole::CreditCard {
                payload["credit_card_type"] = json!("monthlyFull");
                if let Some(date) = account.monthly_payment_date {
                    payload["monthly_payment_date"] = json!(date.to_string());
                }
            }

            if let Some(remote) = self.cache.asset_accounts.get(&account.name) {
                if needs_update(&payload, &remote.attributes) {
                    self.client
                        .put(&format!("/api/v1/accounts/{}", remote.id), &payload)?
                        .into_data("Updating asset account")?;
                }
            } else {
                let body = self
                    .client
                    .post("/api/v1/accounts", Some(&payload))?
                    .into_data("Creating asset account")?;
                if let Some(obj) = RemoteObject::from_entry(&body["data"]) {
                    self.cache.asset_accounts.insert(account.name.clone(), obj);
                    self.cache.save()?;
                }
            }
        }
        println!("Synced {} asset accounts", self.cache.asset_accounts.len());
        Ok(())
    }

    fn sync_payee_accounts(&mut self, kind: PayeeKind, names: &[String]) -> Result<()> {
        let already_synced = match kind {
            PayeeKind::Revenue => !self.cache.revenue_accounts.is_empty(),
            PayeeKind::Expense => !self.cache.expense_accounts.is_empty(),
        };
        if already_synced {
            log::info!("{} accounts already synced, skipping", kind.as_str());
            return Ok(());
        }

        let listed = self.list_accounts(kind.as_str(), None)?;
        match kind {
            PayeeKind::Revenue => self.cache.revenue_accounts = listed,
            PayeeKind::Expense => self.cache.expense_accounts = listed,
        }
        self.cache.save()?;

        for name in names {
            let payload = json!({
                "name": name,
                "active": true,
                "type": kind.as_str(),
                "include_net_worth": true,
            });
            let existing = match kind {
                PayeeKind::Revenue => self.cache.revenue_accounts.get(name),
                PayeeKind::Expense => self.cache.expense_accounts.get(name),
            }
            .cloned();

            if let Some(remote) = existing {
                if needs_update(&payload, &remote.attributes) {
                    self.client
                        .put(&format!("/api/v1/accounts/{}", remote.id), &payload)?
                        .into_data("Updating payee account")?;
                }
            } else {
                let body = self
                    .client
                    .post("/api/v1/accounts", Some(&payload))?
                    .into_data("Creating payee account")?;
                if let Some(obj) = RemoteObject::from_entry(&body["data"]) {
                    match kind {
                        PayeeKind::Revenue => {
                            self.cache.revenue_accounts.insert(name.clone(), obj)
                        }
                        PayeeKind::Expense => {
                            self.cache.expense_accounts.insert(name.clone(), obj)
                        }
                    };
                    self.cache.save()?;
                }
            }
        }

        let count = match kind {
            PayeeKind::Revenue => self.cache.revenue_accounts.len(),
            PayeeKind::Expense => self.cache.expense_accounts.len(),
        };
        println!("Synced {count} {} accounts", kind.as_str());
        Ok(())
    }

    pub fn upload_transactions(
        &mut self,
        data: &ImportData,
        min_date: Option<NaiveDate>,
        max_date: Option<NaiveDate>,
    ) -> Result<()> {
        let total = data.transaction_groups.len();
        if total == 0 {
            println!("No transaction groups to import");
            return Ok(());
        }

        let progress = ProgressBar::new(total as u64);
        progress.set_style(
            ProgressStyle::with_template("{bar:40} {pos}/{len} {msg}").unwrap(),
        );

        let mut imported = 0usize;
        let mut ignored = 0usize;
        let mut duplicates = 0usize;
        let mut current_month = month_start(data.transaction_groups[0].transactions[0].meta().date);

        for group in &data.transaction_groups {
            let date = group.transactions[0].meta().date;
            if max_date.is_some_and(|max| date > max) || min_date.is_some_and(|min| date < min) {
                ignored += 1;
                progress.inc(1);
                continue;
            }

            let group_month = month_start(date);
            if group_month != current_month {
                self.verify_running_balance(data, current_month)?;
                progress.println(format!(
                    "Imported and verified {}",
                    current_month.format("%B %Y")
                ));
                current_month = group_month;
            }

            let payload = self.transaction_group_payload(group)?;
            let response = self.client.post("/api/v1/transactions", Some(&payload))?;
            if response.is_success() {
                if let Some(id) = response.body["data"]["id"].as_str() {
                    log::info!("Created transaction group #{id}");
                }
            } else if response.status.as_u16() == 422 {
                for id in duplicate_transaction_ids(&response.body)? {
                    progress.println(format!("Ignoring transaction duplicate of #{id}"));
                    duplicates += 1;
                }
            } else {
                progress.finish_and_clear();
                bail!(
                    "Creating transaction group failed: HTTP {}: {}",
                    response.status,
                    response.body
                );
            }
            imported += 1;
            progress.inc(1);
        }
        progress.finish_and_clear();
        println!(
            "Imported {imported} transaction groups ({duplicates} duplicates skipped, {ignored} outside the date filter)"
        );
        Ok(())
    }

    /// Compare the reconstructed end-of-month balances against what Firefly
    /// reports, re-listing accounts as of that date. Stale cached balances
    /// would defeat the check, so the cache is bypassed on purpose.
    fn verify_running_balance(&mut self, data: &ImportData, month: NaiveDate) -> Result<()> {
        let Some(balances) = data.running_balances.get(&month) else {
            return Ok(());
        };
        let listed = self.list_accounts("asset", Some(month_end(month)))?;

        for (account, expected) in balances {
            if self.config.is_foreign(account) {
                continue;
            }
            let remote = listed.get(account).ok_or_else(|| {
                anyhow!("Account |{account}| missing from Firefly during balance verification")
            })?;
            let actual =
                value_as_decimal(&remote.attributes["current_balance"]).unwrap_or(Decimal::ZERO);
            if *expected != actual {
                return Err(ImportError::BalanceMismatch {
                    account: account.clone(),
                    month: month.format("%B %Y").to_string(),
                    expected: *expected,
                    actual,
                }
                .into());
            }
        }
        Ok(())
    }

    fn transaction_group_payload(&self, group: &TransactionGroup) -> Result<Value> {
        let mut lines = Vec::new();
        for tx in &group.transactions {
            let meta = tx.meta();
            let mut line = json!({
                "original_source": concat!("ynab2firefly-v", env!("CARGO_PKG_VERSION")),
                "type": tx.kind(),
                "date": meta.date.to_string(),
                "amount": meta.amount.to_string(),
                "description": meta.description,
                "tags": meta.tags,
                "notes": meta.notes,
                "reconciled": meta.reconciled,
                "external_id": meta.external_id,
            });
            match tx {
                LineItem::Withdrawal {
                    account,
                    payee,
                    budget,
                    category,
                    ..
                } => {
                    line["source_id"] =
                        json!(account_id(&self.cache.asset_accounts, account, "asset")?);
                    line["destination_id"] =
                        json!(account_id(&self.cache.expense_accounts, payee, "expense")?);
                    self.attach_budget(&mut line, budget, category)?;
                }
                LineItem::Deposit {
                    account,
                    payee,
                    budget,
                    category,
                    ..
                } => {
                    line["source_id"] =
                        json!(account_id(&self.cache.revenue_accounts, payee, "revenue")?);
                    line["destination_id"] =
                        json!(account_id(&self.cache.asset_accounts, account, "asset")?);
                    self.attach_budget(&mut line, budget, category)?;
                }
                LineItem::Transfer {
                    from_account,
                    to_account,
                    foreign,
                    ..
                } => {
                    line["source_id"] =
                        json!(account_id(&self.cache.asset_accounts, from_account, "asset")?);
                    line["destination_id"] =
                        json!(account_id(&self.cache.asset_accounts, to_account, "asset")?);
                    if let Some((amount, code)) = foreign {
                        line["foreign_amount"] = json!(amount.to_string());
                        line["foreign_currency_code"] = json!(code);
                    }
                }
            }
            lines.push(line);
        }
        Ok(json!({
            "error_if_duplicate_hash": true,
            "apply_rules": false,
            "group_title": group.title,
            "transactions": lines,
        }))
    }

    fn attach_budget(&self, line: &mut Value, budget: &str, category: &str) -> Result<()> {
        if !budget.is_empty() {
            let remote = self
                .cache
                .budgets
                .get(budget)
                .ok_or_else(|| anyhow!("No synced budget named |{budget}|"))?;
            line["budget_id"] = json!(remote.id);
        }
        if !category.is_empty() {
            let id = self
                .cache
                .categories
                .get(category)
                .ok_or_else(|| anyhow!("No synced category named |{category}|"))?;
            line["category_id"] = json!(id);
        }
        Ok(())
    }

    /// Accounts configured `inactive` are flipped off only after everything
    /// imported into them.
    fn deactivate_accounts(&mut self) -> Result<()> {
        for (name, account_config) in &self.config.accounts {
            if !account_config.inactive {
                continue;
            }
            let Some(remote) = self.cache.asset_accounts.get(name) else {
                continue;
            };
            self.client
                .put(
                    &format!("/api/v1/accounts/{}", remote.id),
                    &json!({"name": name, "active": false}),
                )?
                .into_data("Deactivating account")?;
            println!("Marked account {name} inactive");
        }
        Ok(())
    }
}

fn account_id(map: &BTreeMap<String, RemoteObject>, name: &str, kind: &str) -> Result<String> {
    map.get(name)
        .map(|obj| obj.id.clone())
        .ok_or_else(|| anyhow!("No synced {kind} account named |{name}|"))
}

/// Pick apart a 422 payload from transaction creation.
///
/// A line whose description field carries exactly one "Duplicate of
/// transaction #N." message was already imported by a previous run and is
/// skipped; any other validation message aborts the import.
fn duplicate_transaction_ids(body: &Value) -> Result<Vec<i64>> {
    let Some(errors) = body["errors"].as_object() else {
        bail!("Transaction rejected without field errors: {body}");
    };

    let mut duplicate_ids = Vec::new();
    for (field, messages) in errors {
        let mut parts = field.split('.');
        let root = parts.next().unwrap_or_default();
        let child = parts.nth(1);

        let messages: Vec<&str> = messages
            .as_array()
            .map(|m| m.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();

        let duplicate_id = if root == "transactions" && child == Some("description") {
            messages
                .first()
                .filter(|_| messages.len() == 1)
                .and_then(|msg| DUPLICATE_TX_RE.captures(msg))
                .and_then(|caps| caps[1].parse::<i64>().ok())
        } else {
            None
        };

        match duplicate_id {
            Some(id) => duplicate_ids.push(id),
            None => bail!("Transaction validation failed: {body}"),
        }
    }
    Ok(duplicate_ids)
}
