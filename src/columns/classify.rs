// src/columns/classify.rs

use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::HashMap;

/// Semantic family a raw column type belongs to. Types outside every family
/// classify as `None`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Family {
    Text,
    Number,
    Date,
}

pub const TEXT_TYPES: &[&str] = &[
    "String",
    "Text",
    "Long Text",
    "Small Text",
    "Text Editor",
    "Markdown Editor",
    "HTML Editor",
    "Code",
    "Char",
    "Varchar",
    "Enum",
    "Data",
    "Link",
    "Dynamic Link",
    "Select",
    "Read Only",
    "Password",
];

pub const NUMBER_TYPES: &[&str] = &[
    "Integer", "Int", "Bigint", "Decimal", "Float", "Double", "Currency", "Percent",
];

pub const DATE_TYPES: &[&str] = &["Date", "Datetime", "Time", "Timestamp"];

static FAMILIES: Lazy<HashMap<&'static str, Family>> = Lazy::new(|| {
    let mut map = HashMap::new();
    for (types, family) in [
        (TEXT_TYPES, Family::Text),
        (NUMBER_TYPES, Family::Number),
        (DATE_TYPES, Family::Date),
    ] {
        for &ty in types {
            map.insert(ty, family);
        }
    }
    map
});

/// Map a raw type name (exact, case-sensitive) to its family.
pub fn classify(raw_type: &str) -> Option<Family> {
    FAMILIES.get(raw_type).copied()
}

/// `classify` for an optional type; absent types have no family.
pub fn classify_opt(raw_type: Option<&str>) -> Option<Family> {
    raw_type.and_then(classify)
}
