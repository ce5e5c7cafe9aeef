// src/fetch/http.rs

use anyhow::{Context, Result};
use futures::future::{BoxFuture, FutureExt};
use reqwest::{header::AUTHORIZATION, Client};
use serde_json::{json, Value};
use std::{sync::Arc, time::Duration};
use tokio::time::sleep;
use tracing::{debug, error, instrument, warn};
use url::Url;

use super::{ColumnSource, FetchResponse};
use crate::config::Config;

const FETCH_METHOD: &str = "fetch_columns";
/// Upper bound for a single retry delay.
const MAX_BACKOFF_MS: u64 = 60_000;

/// Delay before retry number `attempt` (1-based): doubles each time, capped.
fn backoff_ms(initial: u64, attempt: u32) -> u64 {
    let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
    factor.saturating_mul(initial).min(MAX_BACKOFF_MS)
}

/// Fetches columns by calling the query document's `fetch_columns` method
/// through a Frappe-style `run_doc_method` endpoint. The server derives the
/// table set from the saved document, so the requested tables are only logged.
#[derive(Clone)]
pub struct HttpColumnSource {
    client: Client,
    endpoint: Url,
    body: Arc<Value>,
    token: Option<String>,
    max_retries: u32,
    initial_backoff_ms: u64,
}

impl HttpColumnSource {
    pub fn new(client: Client, config: &Config) -> Result<Self> {
        let mut base = Url::parse(&config.base_url)
            .with_context(|| format!("invalid base_url {:?}", config.base_url))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let endpoint = base
            .join("api/method/run_doc_method")
            .context("building run_doc_method url")?;

        Ok(Self {
            client,
            endpoint,
            body: Arc::new(json!({
                "dt": config.doctype,
                "dn": config.query,
                "method": FETCH_METHOD,
            })),
            token: config.api_token.clone(),
            max_retries: config.max_retries,
            initial_backoff_ms: config.initial_backoff_ms,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    async fn post_once(&self) -> Result<FetchResponse> {
        debug!("POST {}", self.endpoint);
        let mut req = self.client.post(self.endpoint.clone()).json(&*self.body);
        if let Some(token) = &self.token {
            req = req.header(AUTHORIZATION, format!("token {}", token));
        }
        Ok(req
            .send()
            .await
            .with_context(|| format!("POST {} failed", self.endpoint))?
            .error_for_status()
            .with_context(|| format!("Non-success status {}", self.endpoint))?
            .json::<FetchResponse>()
            .await
            .with_context(|| format!("Decoding columns from {}", self.endpoint))?)
    }

    #[instrument(level = "info", skip(self), fields(url = %self.endpoint))]
    async fn post_with_retry(&self, tables: Vec<String>) -> Result<FetchResponse> {
        debug!(?tables, "fetching columns");
        let mut attempts = 0;
        loop {
            match self.post_once().await {
                Ok(r) => return Ok(r),
                Err(e) if attempts < self.max_retries => {
                    attempts += 1;
                    let backoff = backoff_ms(self.initial_backoff_ms, attempts);
                    warn!(attempt = attempts, delay_ms = backoff, error = %e, "Retrying");
                    sleep(Duration::from_millis(backoff)).await;
                }
                Err(e) => {
                    error!(error = %e, "Exhausted retries");
                    return Err(e);
                }
            }
        }
    }
}

impl ColumnSource for HttpColumnSource {
    fn fetch_columns(&self, tables: Vec<String>) -> BoxFuture<'static, Result<FetchResponse>> {
        let this = self.clone();
        async move { this.post_with_retry(tables).await }.boxed()
    }
}
