// src/columns/operators.rs

use serde::Serialize;

use super::classify::{classify_opt, Family};

/// A filter operator choice: display label plus canonical token.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct OperatorOption {
    pub label: &'static str,
    pub value: &'static str,
}

const fn op(label: &'static str, value: &'static str) -> OperatorOption {
    OperatorOption { label, value }
}

/// Offered for every column, always first.
pub const BASE_OPERATORS: &[OperatorOption] = &[
    op("equals", "="),
    op("not equals", "!="),
    op("is", "is"),
];

pub const TEXT_OPERATORS: &[OperatorOption] = &[
    op("contains", "contains"),
    op("not contains", "not_contains"),
    op("starts with", "starts_with"),
    op("ends with", "ends_with"),
    op("one of", "in"),
    op("not one of", "not_in"),
];

pub const NUMBER_OPERATORS: &[OperatorOption] = &[
    op("one of", "in"),
    op("not one of", "not_in"),
    op("greater than", ">"),
    op("smaller than", "<"),
    op("greater than equal to", ">="),
    op("smaller than equal to", "<="),
    op("between", "between"),
];

pub const DATE_OPERATORS: &[OperatorOption] = &[
    op("greater than", ">"),
    op("smaller than", "<"),
    op("greater than equal to", ">="),
    op("smaller than equal to", "<="),
    op("between", "between"),
    op("within", "timespan"),
];

impl Family {
    /// Operators specific to this family, appended after the base set.
    pub fn operators(self) -> &'static [OperatorOption] {
        match self {
            Family::Text => TEXT_OPERATORS,
            Family::Number => NUMBER_OPERATORS,
            Family::Date => DATE_OPERATORS,
        }
    }
}

/// Ordered operator choices for a column of `column_type`.
pub fn operators_for(column_type: Option<&str>) -> Vec<OperatorOption> {
    let mut options = BASE_OPERATORS.to_vec();
    if let Some(family) = classify_opt(column_type) {
        options.extend_from_slice(family.operators());
    }
    options
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::columns::classify::{DATE_TYPES, NUMBER_TYPES, TEXT_TYPES};

    fn values(options: &[OperatorOption]) -> Vec<&'static str> {
        options.iter().map(|o| o.value).collect()
    }

    #[test]
    fn absent_type_gets_base_set() {
        assert_eq!(values(&operators_for(None)), vec!["=", "!=", "is"]);
        assert_eq!(operators_for(Some("")).len(), 3);
        assert_eq!(operators_for(Some("Blob")).len(), 3);
    }

    #[test]
    fn number_types_get_ten_operators() {
        for ty in NUMBER_TYPES {
            assert_eq!(
                values(&operators_for(Some(*ty))),
                vec!["=", "!=", "is", "in", "not_in", ">", "<", ">=", "<=", "between"],
                "type {}",
                ty
            );
        }
    }

    #[test]
    fn text_types_get_nine_operators() {
        for ty in TEXT_TYPES {
            assert_eq!(
                values(&operators_for(Some(*ty))),
                vec![
                    "=",
                    "!=",
                    "is",
                    "contains",
                    "not_contains",
                    "starts_with",
                    "ends_with",
                    "in",
                    "not_in"
                ],
                "type {}",
                ty
            );
        }
    }

    #[test]
    fn date_types_end_with_timespan() {
        for ty in DATE_TYPES {
            let ops = operators_for(Some(*ty));
            assert_eq!(ops.len(), 9, "type {}", ty);
            assert_eq!(ops.last().map(|o| o.value), Some("timespan"));
            assert_eq!(ops[8].label, "within");
        }
    }
}
