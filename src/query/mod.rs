// src/query/mod.rs

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::{fs, path::Path};
use tokio::sync::watch;

use crate::columns::QueryColumn;

/// One entry of a query's table list: a base table, optionally joined to another.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableRef {
    pub table: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join: Option<Join>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Join {
    #[serde(default)]
    pub with: JoinTarget,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct JoinTarget {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TableRef {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            join: None,
            extra: Map::new(),
        }
    }

    pub fn joined_with(mut self, other: impl Into<String>) -> Self {
        self.join = Some(Join {
            with: JoinTarget {
                value: Some(other.into()),
                extra: Map::new(),
            },
            extra: Map::new(),
        });
        self
    }

    /// The joined table, if the join target has a concrete value.
    pub fn joined_table(&self) -> Option<&str> {
        self.join
            .as_ref()
            .and_then(|j| j.with.value.as_deref())
            .filter(|v| !v.is_empty())
    }
}

/// Table names a query depends on: each base table followed by its joined
/// table, in declaration order. Duplicates are kept.
pub fn table_reference_set(tables: &[TableRef]) -> Vec<String> {
    let mut set = Vec::with_capacity(tables.len() * 2);
    for row in tables {
        set.push(row.table.clone());
        if let Some(joined) = row.joined_table() {
            set.push(joined.to_string());
        }
    }
    set
}

/// Serialized form of a query document as the host hands it over.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuerySnapshot {
    /// `None` until the host has loaded the table list.
    #[serde(default)]
    pub tables: Option<Vec<TableRef>>,
    #[serde(default)]
    pub columns: Vec<QueryColumn>,
}

/// Host query document exposing `tables` and `columns` as observables.
///
/// Every setter bumps the observable's version, even when the new value is
/// equal to the old one; deciding whether that matters is up to subscribers.
pub struct QueryDocument {
    tables: watch::Sender<Option<Vec<TableRef>>>,
    columns: watch::Sender<Vec<QueryColumn>>,
}

impl Default for QueryDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryDocument {
    /// An empty document whose table list is not loaded yet.
    pub fn new() -> Self {
        Self::from_snapshot(QuerySnapshot::default())
    }

    pub fn from_snapshot(snapshot: QuerySnapshot) -> Self {
        let (tables, _) = watch::channel(snapshot.tables);
        let (columns, _) = watch::channel(snapshot.columns);
        Self { tables, columns }
    }

    /// Load a `{ "tables": [...], "columns": [...] }` JSON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).with_context(|| format!("reading {:?}", path))?;
        let snapshot: QuerySnapshot =
            serde_json::from_str(&text).with_context(|| format!("parsing {:?}", path))?;
        Ok(Self::from_snapshot(snapshot))
    }

    pub fn set_tables(&self, tables: Vec<TableRef>) {
        self.tables.send_replace(Some(tables));
    }

    /// Mark the table list as not loaded.
    pub fn clear_tables(&self) {
        self.tables.send_replace(None);
    }

    pub fn set_columns(&self, columns: Vec<QueryColumn>) {
        self.columns.send_replace(columns);
    }

    pub fn update_columns(&self, f: impl FnOnce(&mut Vec<QueryColumn>)) {
        self.columns.send_modify(f);
    }

    pub fn tables(&self) -> Option<Vec<TableRef>> {
        self.tables.borrow().clone()
    }

    pub fn columns(&self) -> Vec<QueryColumn> {
        self.columns.borrow().clone()
    }

    pub fn subscribe_tables(&self) -> watch::Receiver<Option<Vec<TableRef>>> {
        self.tables.subscribe()
    }

    pub fn subscribe_columns(&self) -> watch::Receiver<Vec<QueryColumn>> {
        self.columns.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn reference_set_follows_declaration_order() {
        let tables = vec![
            TableRef::new("orders"),
            TableRef::new("orders").joined_with("customers"),
            TableRef::new("orders").joined_with("customers"),
        ];
        assert_eq!(
            table_reference_set(&tables),
            vec!["orders", "orders", "customers", "orders", "customers"]
        );
    }

    #[test]
    fn join_without_value_adds_nothing() {
        let tables: Vec<TableRef> = serde_json::from_value(json!([
            {"table": "orders", "join": {"type": "left", "with": {"label": "Customers"}}},
            {"table": "items", "join": {"with": {"value": ""}}},
            {"table": "users", "join": {}}
        ]))
        .unwrap();
        assert_eq!(table_reference_set(&tables), vec!["orders", "items", "users"]);
    }

    #[test]
    fn load_reads_snapshot_file() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("query.json");
        fs::write(
            &path,
            json!({
                "tables": [{"table": "orders", "join": {"with": {"value": "customers"}}}],
                "columns": [{"table": "orders", "column": "id", "type": "Int"}]
            })
            .to_string(),
        )
        .unwrap();

        let doc = QueryDocument::load(&path).unwrap();
        let tables = doc.tables().unwrap();
        assert_eq!(table_reference_set(&tables), vec!["orders", "customers"]);
        assert_eq!(doc.columns().len(), 1);
    }

    #[test]
    fn missing_tables_means_not_loaded() {
        let doc = QueryDocument::from_snapshot(serde_json::from_value(json!({})).unwrap());
        assert!(doc.tables().is_none());
        doc.set_tables(vec![]);
        assert_eq!(doc.tables(), Some(vec![]));
    }

    #[test]
    fn setters_bump_version_even_for_equal_values() {
        let doc = QueryDocument::new();
        doc.set_tables(vec![TableRef::new("orders")]);
        let mut rx = doc.subscribe_tables();
        assert!(!rx.has_changed().unwrap());
        doc.set_tables(vec![TableRef::new("orders")]);
        assert!(rx.has_changed().unwrap());
    }
}
