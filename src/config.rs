// src/config.rs

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{env, fs, path::Path};

use crate::columns::store::DEFAULT_NAMESPACE;

/// Runtime settings. Loaded from an optional YAML file, then overridden from
/// `QUERYCOLS_*` environment variables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Site serving the column metadata, e.g. `https://insights.example.com`.
    pub base_url: String,
    pub doctype: String,
    /// Name of the query document whose columns are fetched.
    pub query: String,
    /// `key:secret` API token; sent as `Authorization: token <api_token>`.
    pub api_token: Option<String>,
    pub cache_dir: String,
    pub cache_namespace: String,
    pub query_file: String,
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub wait_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".into(),
            doctype: "Insights Query".into(),
            query: String::new(),
            api_token: None,
            cache_dir: "cache".into(),
            cache_namespace: DEFAULT_NAMESPACE.into(),
            query_file: "query.json".into(),
            max_retries: 3,
            initial_backoff_ms: 500,
            wait_timeout_secs: 30,
        }
    }
}

impl Config {
    /// YAML from `$QUERYCOLS_CONFIG` (default `querycols.yaml`), then env overrides.
    pub fn load() -> Result<Self> {
        let path = env::var("QUERYCOLS_CONFIG").unwrap_or_else(|_| "querycols.yaml".to_string());
        let mut config = Self::from_file_or_default(&path)?;
        config.apply_overrides(|key| env::var(key).ok());
        Ok(config)
    }

    /// A missing file is not an error; a malformed one is.
    pub fn from_file_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = fs::read_to_string(path).with_context(|| format!("reading {:?}", path))?;
        Self::from_yaml_str(&text).with_context(|| format!("parsing {:?}", path))
    }

    pub fn from_yaml_str(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("QUERYCOLS_BASE_URL") {
            self.base_url = v;
        }
        if let Some(v) = lookup("QUERYCOLS_QUERY") {
            self.query = v;
        }
        if let Some(v) = lookup("QUERYCOLS_API_TOKEN") {
            self.api_token = Some(v).filter(|t| !t.is_empty());
        }
        if let Some(v) = lookup("QUERYCOLS_CACHE_DIR") {
            self.cache_dir = v;
        }
        if let Some(v) = lookup("QUERYCOLS_QUERY_FILE") {
            self.query_file = v;
        }
    }
}
