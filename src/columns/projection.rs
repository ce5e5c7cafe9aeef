// src/columns/projection.rs

use super::classify::{classify_opt, Family};
use super::{ChartOption, QueryColumn};

fn is_value_like(column: &QueryColumn) -> bool {
    classify_opt(column.ty.as_deref()) == Some(Family::Number)
}

/// Non-numeric committed columns (chart axes, pivot rows).
pub fn index_options(columns: &[QueryColumn]) -> Vec<ChartOption> {
    columns
        .iter()
        .filter(|c| !is_value_like(c))
        .map(ChartOption::from_column)
        .collect()
}

/// Numeric committed columns (chart series, pivot values).
pub fn value_options(columns: &[QueryColumn]) -> Vec<ChartOption> {
    columns
        .iter()
        .filter(|c| is_value_like(c))
        .map(ChartOption::from_column)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_numeric_from_the_rest() {
        let columns = vec![
            QueryColumn::new("people", "age").with_type("Int").with_label("Age"),
            QueryColumn::new("people", "name")
                .with_type("Varchar")
                .with_label("Name"),
        ];

        let index = index_options(&columns);
        assert_eq!(index.len(), 1);
        assert_eq!(index[0].value, "name");
        assert_eq!(index[0].label, "Name");

        let values = value_options(&columns);
        assert_eq!(values.len(), 1);
        assert_eq!(values[0].value, "age");
    }

    #[test]
    fn untyped_and_date_columns_are_index_like() {
        let columns = vec![
            QueryColumn::new("orders", "created").with_type("Datetime"),
            QueryColumn {
                label: Some("Expr".into()),
                ..Default::default()
            },
        ];
        assert_eq!(index_options(&columns).len(), 2);
        assert!(value_options(&columns).is_empty());
        assert_eq!(index_options(&columns)[1].value, "Expr");
    }

    #[test]
    fn preserves_committed_order() {
        let columns = vec![
            QueryColumn::new("o", "b").with_type("Float"),
            QueryColumn::new("o", "a").with_type("Integer"),
        ];
        let values: Vec<_> = value_options(&columns).into_iter().map(|o| o.value).collect();
        assert_eq!(values, vec!["b", "a"]);
    }
}
