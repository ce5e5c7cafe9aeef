// src/columns/types.rs

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use super::decode::decode_structure;

/// Composite cache identity for a `(table, column)` pair.
pub fn cache_key(table: &str, column: &str) -> String {
    format!("{}_{}", table, column)
}

/// A selectable column as returned by the metadata fetch.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct ColumnDescriptor {
    pub table: String,
    pub column: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub ty: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_label: Option<String>,
    /// Fields we don't interpret but hand back to consumers untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ColumnDescriptor {
    pub fn new(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
            label: None,
            ty: None,
            table_label: None,
            extra: Map::new(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_type(mut self, ty: impl Into<String>) -> Self {
        self.ty = Some(ty.into());
        self
    }

    pub fn with_table_label(mut self, table_label: impl Into<String>) -> Self {
        self.table_label = Some(table_label.into());
        self
    }

    pub fn key(&self) -> String {
        cache_key(&self.table, &self.column)
    }

    /// Label shown to the user; falls back to the column name.
    pub fn display_label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.column)
    }
}

/// A fetched column shaped for an autocomplete selector.
#[derive(Debug, Serialize, PartialEq, Clone)]
pub struct ColumnOption {
    #[serde(flatten)]
    pub descriptor: ColumnDescriptor,
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ColumnOption {
    pub fn from_descriptor(descriptor: &ColumnDescriptor) -> Self {
        let mut descriptor = descriptor.clone();
        // `value`/`description` are ours; a stray backend field must not shadow them.
        descriptor.extra.remove("value");
        descriptor.extra.remove("description");
        Self {
            value: descriptor.column.clone(),
            description: descriptor.table_label.clone(),
            descriptor,
        }
    }
}

/// A column as committed to the query document. Identity fields may be
/// missing (e.g. expression columns), and the structured fields arrive
/// serialized.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone, Default)]
pub struct QueryColumn {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub ty: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format_option: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregation_condition: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression: Option<Value>,
    #[serde(default, deserialize_with = "truthy")]
    pub is_expression: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl QueryColumn {
    pub fn new(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            table: Some(table.into()),
            column: Some(column.into()),
            ..Default::default()
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_type(mut self, ty: impl Into<String>) -> Self {
        self.ty = Some(ty.into());
        self
    }

    /// Decode the serialized substructures. Never fails: anything that does
    /// not decode comes back as `None`.
    pub fn normalize(&self) -> NormalizedColumn {
        NormalizedColumn {
            table: self.table.clone(),
            column: self.column.clone(),
            label: self.label.clone(),
            ty: self.ty.clone(),
            table_label: self.table_label.clone(),
            is_expression: self.is_expression,
            format_option: decode_structure(self.format_option.as_ref()),
            aggregation_condition: decode_structure(self.aggregation_condition.as_ref()),
            expression: if self.is_expression {
                decode_structure(self.expression.as_ref())
            } else {
                None
            },
            extra: self.extra.clone(),
        }
    }
}

/// A committed column with its structured fields materialized.
#[derive(Debug, Serialize, PartialEq, Clone)]
pub struct NormalizedColumn {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub ty: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_label: Option<String>,
    pub is_expression: bool,
    pub format_option: Option<Value>,
    pub aggregation_condition: Option<Value>,
    pub expression: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `{label, value}` pair consumed by chart/pivot pickers.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct ChartOption {
    pub label: String,
    pub value: String,
}

impl ChartOption {
    pub fn from_column(column: &QueryColumn) -> Self {
        let label = column.label.as_ref().or(column.column.as_ref());
        let value = column.column.as_ref().or(column.label.as_ref());
        Self {
            label: label.cloned().unwrap_or_default(),
            value: value.cloned().unwrap_or_default(),
        }
    }
}

/// Hosts send flags as booleans, 0/1, or "0"/"1".
fn truthy<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(match raw {
        Some(Value::Bool(b)) => b,
        Some(Value::Number(n)) => n.as_f64().map_or(false, |f| f != 0.0),
        Some(Value::String(s)) => matches!(s.trim(), "1" | "true" | "True"),
        _ => false,
    })
}
