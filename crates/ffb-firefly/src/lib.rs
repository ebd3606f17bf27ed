//! Firefly III adapter.
//!
//! Implements the `ffb-core` ledger port over the Firefly III REST API (`/api/v1`).

use std::{future::Future, time::Duration};

use async_trait::async_trait;
use chrono::{Local, NaiveDate};
use serde::Deserialize;
use serde_json::{json, Map, Value};

use ffb_core::{
    errors::Error,
    ledger::{
        AccountChoice, AccountKind, LedgerClient, LedgerCredentials, LedgerResponse,
        TransactionRequest,
    },
    Result,
};

/// Upper bound on account pages fetched during setup.
const MAX_ACCOUNT_PAGES: u32 = 20;

#[derive(Clone, Debug)]
pub struct FireflyClient {
    http: reqwest::Client,
}

impl FireflyClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("reqwest client build failed: {e}")))?;
        Ok(Self { http })
    }

    fn get(&self, creds: &LedgerCredentials, endpoint: &str) -> reqwest::RequestBuilder {
        self.http
            .get(api_url(&creds.base_url, endpoint))
            .bearer_auth(&creds.token)
            .header(reqwest::header::ACCEPT, "application/json")
    }

    async fn accounts_page(
        &self,
        creds: &LedgerCredentials,
        kind: AccountKind,
        page: u32,
    ) -> Result<AccountsPage> {
        let resp = self
            .get(creds, "accounts")
            .query(&[("type", kind.as_query().to_string()), ("page", page.to_string())])
            .send()
            .await
            .map_err(map_http_err)?;

        let status = resp.status();
        let body = resp.text().await.map_err(map_http_err)?;
        if !status.is_success() {
            return Err(Error::Ledger(format!(
                "firefly accounts request failed: {status} {}",
                truncate(&body)
            )));
        }
        parse_accounts_page(&body)
    }
}

fn api_url(base_url: &str, endpoint: &str) -> String {
    format!("{}/api/v1/{endpoint}", base_url.trim_end_matches('/'))
}

fn map_http_err(e: reqwest::Error) -> Error {
    Error::Ledger(format!("firefly request error: {e}"))
}

fn truncate(body: &str) -> String {
    body.chars().take(200).collect()
}

#[derive(Debug, Deserialize)]
struct AccountsPage {
    #[serde(default)]
    data: Vec<AccountRecord>,
    #[serde(default)]
    meta: Option<PageMeta>,
}

#[derive(Debug, Deserialize)]
struct AccountRecord {
    id: String,
    attributes: AccountAttributes,
}

#[derive(Debug, Deserialize)]
struct AccountAttributes {
    name: String,
}

#[derive(Debug, Deserialize)]
struct PageMeta {
    pagination: Option<Pagination>,
}

#[derive(Debug, Deserialize)]
struct Pagination {
    current_page: u32,
    total_pages: u32,
}

impl AccountsPage {
    fn has_more(&self) -> bool {
        self.meta
            .as_ref()
            .and_then(|m| m.pagination.as_ref())
            .map(|p| p.current_page < p.total_pages)
            .unwrap_or(false)
    }
}

fn parse_accounts_page(body: &str) -> Result<AccountsPage> {
    serde_json::from_str(body)
        .map_err(|e| Error::Ledger(format!("unexpected accounts response: {e}")))
}

/// Digits are account ids, anything else is an account name.
fn account_ref(field: &str, reference: &str) -> (String, Value) {
    let key = if !reference.is_empty() && reference.chars().all(|c| c.is_ascii_digit()) {
        format!("{field}_id")
    } else {
        format!("{field}_name")
    };
    (key, Value::String(reference.to_string()))
}

/// Withdrawal payload for `POST /api/v1/transactions`.
fn transaction_payload(req: &TransactionRequest, date: NaiveDate) -> Value {
    let mut split = Map::new();
    split.insert("type".to_string(), json!("withdrawal"));
    split.insert("description".to_string(), json!(req.description));
    split.insert("date".to_string(), json!(date.format("%Y-%m-%d").to_string()));
    split.insert("amount".to_string(), json!(req.amount));
    if let Some(category) = &req.category {
        split.insert("category_name".to_string(), json!(category));
    }
    if let Some(budget) = &req.budget {
        split.insert("budget_name".to_string(), json!(budget));
    }
    if let Some(source) = &req.source_account {
        let (k, v) = account_ref("source", source);
        split.insert(k, v);
    }
    match &req.destination_account {
        Some(dest) => {
            let (k, v) = account_ref("destination", dest);
            split.insert(k, v);
        }
        None => {
            split.insert("destination_name".to_string(), json!(req.description));
        }
    }

    json!({ "transactions": [Value::Object(split)] })
}

/// Fetch pages 1, 2, ... until the last one or `MAX_ACCOUNT_PAGES`.
async fn collect_accounts<F, Fut>(mut fetch: F) -> Result<Vec<AccountChoice>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<AccountsPage>>,
{
    let mut out = Vec::new();
    let mut page = 1u32;
    loop {
        let parsed = fetch(page).await?;
        let has_more = parsed.has_more();
        out.extend(parsed.data.into_iter().map(|a| AccountChoice {
            id: a.id,
            name: a.attributes.name,
        }));

        if !has_more {
            break;
        }
        if page >= MAX_ACCOUNT_PAGES {
            tracing::warn!(
                pages = page,
                accounts = out.len(),
                "account listing truncated at page limit"
            );
            break;
        }
        page += 1;
    }
    Ok(out)
}

#[async_trait]
impl LedgerClient for FireflyClient {
    async fn list_accounts(
        &self,
        creds: &LedgerCredentials,
        kind: AccountKind,
    ) -> Result<Vec<AccountChoice>> {
        let out = collect_accounts(|page| self.accounts_page(creds, kind, page)).await?;
        tracing::debug!(count = out.len(), "listed firefly accounts");
        Ok(out)
    }

    async fn create_transaction(
        &self,
        creds: &LedgerCredentials,
        req: &TransactionRequest,
    ) -> Result<LedgerResponse> {
        let payload = transaction_payload(req, Local::now().date_naive());
        let resp = self
            .http
            .post(api_url(&creds.base_url, "transactions"))
            .bearer_auth(&creds.token)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(map_http_err)?;

        let status = resp.status().as_u16();
        let body = resp.text().await.map_err(map_http_err)?;
        Ok(LedgerResponse { status, body })
    }

    async fn about_user(&self, creds: &LedgerCredentials) -> Result<String> {
        let resp = self
            .get(creds, "about/user")
            .send()
            .await
            .map_err(map_http_err)?;

        let status = resp.status();
        let body = resp.text().await.map_err(map_http_err)?;
        if !status.is_success() {
            return Err(Error::Ledger(format!(
                "firefly about request failed: {status} {}",
                truncate(&body)
            )));
        }

        Ok(pretty_json(&body))
    }
}

fn pretty_json(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| serde_json::to_string_pretty(&v).ok())
        .unwrap_or_else(|| body.to_string())
}
