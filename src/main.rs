use anyhow::{Context, Result};
use querycols::{
    operators_for, ColumnCache, ColumnFetch, ColumnResolver, Config, HttpColumnSource,
    OperatorOption, QueryDocument,
};
use reqwest::Client;
use serde::Serialize;
use std::{env, sync::Arc, time::Duration};
use tokio::time::timeout;
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Serialize)]
struct OptionReport<'a> {
    #[serde(flatten)]
    option: &'a querycols::ColumnOption,
    operators: Vec<OperatorOption>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive(log_level.parse().unwrap_or(Level::INFO.into())),
        )
        .with_writer(std::io::stderr)
        .init();
    info!("startup");

    // ─── 2) config, cache, query document ────────────────────────────
    let config = Config::load().context("loading config")?;
    let cache = Arc::new(
        ColumnCache::open(&config.cache_dir, &config.cache_namespace)
            .context("opening column cache")?,
    );
    info!(entries = cache.len(), "column cache ready");

    let query = QueryDocument::load(&config.query_file)
        .with_context(|| format!("loading query document {}", config.query_file))?;

    // ─── 3) resolve ──────────────────────────────────────────────────
    let source = HttpColumnSource::new(Client::new(), &config)?;
    let fetch = ColumnFetch::new(source);
    let resolver = ColumnResolver::spawn(&query, fetch, Arc::clone(&cache));

    let mut options = resolver.options();
    let wait = Duration::from_secs(config.wait_timeout_secs);
    match timeout(wait, options.wait_for(Option::is_some)).await {
        Ok(Ok(_)) => info!("columns fetched"),
        Ok(Err(_)) => warn!("resolver stopped before columns arrived"),
        Err(_) => warn!(secs = config.wait_timeout_secs, "timed out waiting for columns"),
    }

    // ─── 4) report ───────────────────────────────────────────────────
    let fetched = resolver.current_options().unwrap_or_default();
    let index_options = resolver.index_options().borrow().clone();
    let value_options = resolver.value_options().borrow().clone();
    let report = serde_json::json!({
        "options": fetched
            .iter()
            .map(|o| OptionReport {
                option: o,
                operators: operators_for(o.descriptor.ty.as_deref()),
            })
            .collect::<Vec<_>>(),
        "normalized": resolver.current_normalized(),
        "index_options": index_options,
        "value_options": value_options,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);

    info!(cached = cache.len(), "all done");
    Ok(())
}
