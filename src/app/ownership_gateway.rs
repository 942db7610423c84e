//! How a session reaches the ownership ledger: in-process, or over the HTTP
//! API the same way a game client does.

use crate::app::ledger_service::OwnershipLedger;
use crate::error::{Error, Result};
use crate::infra::with_timeout_retry;
use crate::storage::ledger::{AddOutcome, OwnershipRecord, UpsertOutcome};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

#[async_trait]
pub trait OwnershipGateway: Send + Sync {
    /// Records a login for `npub` under `name`.
    async fn register(&self, npub: &str, name: &str) -> Result<OwnershipRecord>;

    async fn owned_items(&self, npub: &str) -> Result<Vec<String>>;

    async fn purchase(&self, npub: &str, item: &str) -> Result<AddOutcome>;
}

pub struct LocalOwnershipGateway {
    ledger: Arc<OwnershipLedger>,
}

impl LocalOwnershipGateway {
    pub fn new(ledger: Arc<OwnershipLedger>) -> Self {
        Self { ledger }
    }
}

#[async_trait]
impl OwnershipGateway for LocalOwnershipGateway {
    async fn register(&self, npub: &str, name: &str) -> Result<OwnershipRecord> {
        Ok(self.ledger.upsert_identity(npub, name).await?.user)
    }

    async fn owned_items(&self, npub: &str) -> Result<Vec<String>> {
        self.ledger.owned_items(npub).await
    }

    async fn purchase(&self, npub: &str, item: &str) -> Result<AddOutcome> {
        self.ledger.add_owned_item(npub, item).await
    }
}

/// Client for the ledger HTTP API.
pub struct HttpOwnershipGateway {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

#[derive(Deserialize)]
struct ResultBody<T> {
    result: T,
}

#[derive(Deserialize)]
struct CharactersBody {
    characters: Vec<String>,
}

#[derive(Deserialize, Default)]
struct FailureBody {
    success: Option<bool>,
    error: Option<String>,
    message: Option<String>,
}

impl HttpOwnershipGateway {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post_user(&self, npub: &str, name: &str) -> Result<OwnershipRecord> {
        let resp = self
            .client
            .post(self.url("/users"))
            .json(&serde_json::json!({ "nostrName": name, "npub": npub }))
            .send()
            .await?;
        if resp.status().is_success() {
            let body: ResultBody<UpsertOutcome> = resp.json().await?;
            return Ok(body.result.user);
        }
        Err(failure(resp).await)
    }

    async fn get_characters(&self, npub: &str) -> Result<Vec<String>> {
        let resp = self
            .client
            .get(self.url(&format!("/users/{}/characters", npub)))
            .send()
            .await?;
        match resp.status() {
            s if s.is_success() => Ok(resp.json::<CharactersBody>().await?.characters),
            StatusCode::NOT_FOUND => Ok(Vec::new()),
            _ => Err(failure(resp).await),
        }
    }

    async fn post_buy(&self, npub: &str, item: &str) -> Result<AddOutcome> {
        let resp = self
            .client
            .post(self.url(&format!("/users/{}/buy-animal", npub)))
            .json(&serde_json::json!({ "animal": item }))
            .send()
            .await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(AddOutcome { added: true });
        }
        let body: FailureBody = resp.json().await.unwrap_or_default();
        if status == StatusCode::BAD_REQUEST && body.success == Some(false) && body.error.is_none() {
            return Ok(AddOutcome { added: false });
        }
        Err(classify(status, body))
    }
}

async fn failure(resp: reqwest::Response) -> Error {
    let status = resp.status();
    let body: FailureBody = resp.json().await.unwrap_or_default();
    classify(status, body)
}

fn classify(status: StatusCode, body: FailureBody) -> Error {
    let message = body
        .error
        .or(body.message)
        .unwrap_or_else(|| status.to_string());
    match status {
        StatusCode::BAD_REQUEST => Error::Validation(message),
        StatusCode::NOT_FOUND => Error::NotFound(message),
        StatusCode::GATEWAY_TIMEOUT => Error::Timeout(message),
        _ => Error::Persistence(message),
    }
}

#[async_trait]
impl OwnershipGateway for HttpOwnershipGateway {
    async fn register(&self, npub: &str, name: &str) -> Result<OwnershipRecord> {
        with_timeout_retry("POST /users", self.timeout, move || self.post_user(npub, name)).await
    }

    async fn owned_items(&self, npub: &str) -> Result<Vec<String>> {
        with_timeout_retry("GET characters", self.timeout, move || self.get_characters(npub)).await
    }

    async fn purchase(&self, npub: &str, item: &str) -> Result<AddOutcome> {
        with_timeout_retry("POST buy-animal", self.timeout, move || self.post_buy(npub, item)).await
    }
}
