// src/fetch/mod.rs

use anyhow::Result;
use futures::future::BoxFuture;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use tokio::{sync::watch, task::JoinHandle};
use tracing::{debug, info, warn};

use crate::columns::ColumnDescriptor;

pub mod http;

pub use http::HttpColumnSource;

/// Body of a column metadata response: `{ "message": [ ...columns ] }`.
///
/// Records that do not describe a column (no `table` or `column`) are
/// skipped with a warning; the rest of the batch is kept.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FetchResponse {
    #[serde(default, deserialize_with = "lenient_columns")]
    pub message: Vec<ColumnDescriptor>,
}

fn lenient_columns<'de, D>(deserializer: D) -> Result<Vec<ColumnDescriptor>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<Vec<Value>> = Option::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .enumerate()
        .filter_map(|(i, record)| match serde_json::from_value::<ColumnDescriptor>(record) {
            Ok(desc) => Some(desc),
            Err(e) => {
                warn!(index = i, error = %e, "skipping malformed column record");
                None
            }
        })
        .collect())
}

/// Transport that knows how to fetch the columns of a set of tables.
pub trait ColumnSource: Send + Sync + 'static {
    fn fetch_columns(&self, tables: Vec<String>) -> BoxFuture<'static, Result<FetchResponse>>;
}

/// A response together with the submission that produced it.
#[derive(Debug, Clone)]
pub struct Fetched {
    pub generation: u64,
    pub response: Arc<FetchResponse>,
}

struct Inner {
    source: Box<dyn ColumnSource>,
    data: watch::Sender<Option<Fetched>>,
    submitted: AtomicU64,
}

/// Fire-and-forget fetch resource: `submit()` starts a request, `data`
/// publishes the latest successful response.
///
/// Failures are logged and leave `data` untouched. A response from an older
/// submission never replaces one from a newer submission.
#[derive(Clone)]
pub struct ColumnFetch {
    inner: Arc<Inner>,
}

impl ColumnFetch {
    pub fn new(source: impl ColumnSource) -> Self {
        let (data, _) = watch::channel(None);
        Self {
            inner: Arc::new(Inner {
                source: Box::new(source),
                data,
                submitted: AtomicU64::new(0),
            }),
        }
    }

    /// Start fetching columns for `tables`. Must be called within a Tokio runtime.
    pub fn submit(&self, tables: Vec<String>) -> JoinHandle<()> {
        let generation = self.inner.submitted.fetch_add(1, Ordering::SeqCst) + 1;
        info!(generation, tables = ?tables, "submitting column fetch");

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            match inner.source.fetch_columns(tables).await {
                Ok(response) => {
                    let count = response.message.len();
                    let response = Arc::new(response);
                    let published = inner.data.send_if_modified(|current| {
                        if current.as_ref().map_or(false, |c| c.generation > generation) {
                            return false;
                        }
                        *current = Some(Fetched {
                            generation,
                            response,
                        });
                        true
                    });
                    if published {
                        debug!(generation, columns = count, "column fetch published");
                    } else {
                        debug!(generation, "discarding stale column fetch");
                    }
                }
                Err(e) => warn!(generation, error = %e, "column fetch failed"),
            }
        })
    }

    /// Number of submissions so far.
    pub fn submissions(&self) -> u64 {
        self.inner.submitted.load(Ordering::SeqCst)
    }

    pub fn data(&self) -> Option<Fetched> {
        self.inner.data.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Fetched>> {
        self.inner.data.subscribe()
    }
}
