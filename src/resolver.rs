// src/resolver.rs

use std::sync::Arc;
use tokio::{sync::watch, task::JoinHandle};
use tracing::{debug, error, info, trace};

use crate::columns::{
    index_options, value_options, ChartOption, ColumnCache, ColumnDescriptor, ColumnOption,
    NormalizedColumn, QueryColumn,
};
use crate::fetch::{ColumnFetch, Fetched};
use crate::query::{table_reference_set, QueryDocument, TableRef};

/// Decides when the query's table set warrants a refetch.
///
/// A refetch is due when the current set is present and differs by value from
/// the previously observed one. The previous value starts absent, so the first
/// present set always triggers.
#[derive(Debug, Default)]
pub struct TableSetTracker {
    previous: Option<Vec<String>>,
}

impl TableSetTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `current`; returns the set to fetch, if any.
    pub fn observe(&mut self, current: Option<Vec<String>>) -> Option<Vec<String>> {
        let trigger = match &current {
            Some(set) if self.previous.as_ref() != Some(set) => Some(set.clone()),
            _ => None,
        };
        self.previous = current;
        trigger
    }

    pub fn previous(&self) -> Option<&[String]> {
        self.previous.as_deref()
    }
}

pub fn normalize_columns(columns: &[QueryColumn]) -> Vec<NormalizedColumn> {
    columns.iter().map(QueryColumn::normalize).collect()
}

pub fn build_options(fetched: &Fetched) -> Vec<ColumnOption> {
    fetched
        .response
        .message
        .iter()
        .map(ColumnOption::from_descriptor)
        .collect()
}

struct Outputs {
    normalized: watch::Sender<Vec<NormalizedColumn>>,
    options: watch::Sender<Option<Vec<ColumnOption>>>,
    index_options: watch::Sender<Vec<ChartOption>>,
    value_options: watch::Sender<Vec<ChartOption>>,
}

impl Outputs {
    fn publish_columns(&self, columns: &[QueryColumn]) {
        trace!(count = columns.len(), "re-deriving committed columns");
        self.normalized.send_replace(normalize_columns(columns));
        self.index_options.send_replace(index_options(columns));
        self.value_options.send_replace(value_options(columns));
    }
}

/// Keeps a query's selectable columns in sync with the tables it references.
///
/// One driver task watches the query's `tables` and `columns` and the fetch
/// resource's `data`, and republishes the derived values below. Dropping the
/// resolver stops the driver.
pub struct ColumnResolver {
    normalized: watch::Receiver<Vec<NormalizedColumn>>,
    options: watch::Receiver<Option<Vec<ColumnOption>>>,
    index_options: watch::Receiver<Vec<ChartOption>>,
    value_options: watch::Receiver<Vec<ChartOption>>,
    driver: JoinHandle<()>,
}

impl ColumnResolver {
    /// Start resolving columns for `query`. Must be called within a Tokio runtime.
    pub fn spawn(query: &QueryDocument, fetch: ColumnFetch, cache: Arc<ColumnCache>) -> Self {
        let tables = query.subscribe_tables();
        let mut columns = query.subscribe_columns();
        let data = fetch.subscribe();

        // committed columns are derived up front so readers never see a blank slate
        let committed = columns.borrow_and_update().clone();
        let (normalized_tx, normalized) = watch::channel(normalize_columns(&committed));
        let (options_tx, options) = watch::channel(None);
        let (index_tx, index_options) = watch::channel(index_options(&committed));
        let (value_tx, value_options) = watch::channel(value_options(&committed));

        let outputs = Outputs {
            normalized: normalized_tx,
            options: options_tx,
            index_options: index_tx,
            value_options: value_tx,
        };
        let driver = tokio::spawn(drive(tables, columns, data, fetch, cache, outputs));

        Self {
            normalized,
            options,
            index_options,
            value_options,
            driver,
        }
    }

    pub fn normalized(&self) -> watch::Receiver<Vec<NormalizedColumn>> {
        self.normalized.clone()
    }

    /// `None` until the first fetch succeeds.
    pub fn options(&self) -> watch::Receiver<Option<Vec<ColumnOption>>> {
        self.options.clone()
    }

    pub fn index_options(&self) -> watch::Receiver<Vec<ChartOption>> {
        self.index_options.clone()
    }

    pub fn value_options(&self) -> watch::Receiver<Vec<ChartOption>> {
        self.value_options.clone()
    }

    pub fn current_options(&self) -> Option<Vec<ColumnOption>> {
        self.options.borrow().clone()
    }

    pub fn current_normalized(&self) -> Vec<NormalizedColumn> {
        self.normalized.borrow().clone()
    }
}

impl Drop for ColumnResolver {
    fn drop(&mut self) {
        self.driver.abort();
    }
}

async fn drive(
    mut tables: watch::Receiver<Option<Vec<TableRef>>>,
    mut columns: watch::Receiver<Vec<QueryColumn>>,
    mut data: watch::Receiver<Option<Fetched>>,
    fetch: ColumnFetch,
    cache: Arc<ColumnCache>,
    outputs: Outputs,
) {
    let mut tracker = TableSetTracker::new();

    // immediate: evaluate the table set once before waiting for changes
    evaluate_tables(&mut tracker, &mut tables, &fetch);
    let already_fetched = data.borrow_and_update().clone();
    if let Some(fetched) = already_fetched {
        publish_options(&fetched, &cache, &outputs).await;
    }

    // biased: the table set is always settled before anything else is republished
    loop {
        tokio::select! {
            biased;
            changed = tables.changed() => {
                if changed.is_err() {
                    break;
                }
                evaluate_tables(&mut tracker, &mut tables, &fetch);
            }
            changed = data.changed() => {
                if changed.is_err() {
                    break;
                }
                let fetched = data.borrow_and_update().clone();
                if let Some(fetched) = fetched {
                    publish_options(&fetched, &cache, &outputs).await;
                }
            }
            changed = columns.changed() => {
                if changed.is_err() {
                    break;
                }
                let committed = columns.borrow_and_update().clone();
                outputs.publish_columns(&committed);
            }
        }
    }
    debug!("column resolver stopped");
}

fn evaluate_tables(
    tracker: &mut TableSetTracker,
    tables: &mut watch::Receiver<Option<Vec<TableRef>>>,
    fetch: &ColumnFetch,
) {
    let current = tables
        .borrow_and_update()
        .as_deref()
        .map(table_reference_set);
    match tracker.observe(current) {
        Some(set) => {
            info!(tables = ?set, "table set changed; refetching columns");
            fetch.submit(set);
        }
        None => trace!("table set unchanged"),
    }
}

/// Feed the cache, then publish. Cache I/O runs on the blocking pool; options
/// are published only after it finishes.
async fn publish_options(fetched: &Fetched, cache: &Arc<ColumnCache>, outputs: &Outputs) {
    let options = build_options(fetched);
    let ingested = tokio::task::spawn_blocking({
        let cache = Arc::clone(cache);
        let batch: Vec<ColumnDescriptor> = options.iter().map(|o| o.descriptor.clone()).collect();
        move || cache.ingest(&batch)
    })
    .await;
    match ingested {
        Ok(Ok(0)) => {}
        Ok(Ok(added)) => debug!(added, "cached new column metadata"),
        Ok(Err(e)) => error!("column cache update failed: {:#}", e),
        Err(e) => error!("column cache task failed: {}", e),
    }
    outputs.options.send_replace(Some(options));
}
