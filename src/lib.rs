//! Column metadata for a query builder.
//!
//! - `columns/` - column records, type families, filter operators, the
//!   persisted column cache, and chart/pivot projections
//! - `query/`   - the host query document (`tables`, `columns` observables)
//! - `fetch/`   - the fire-and-forget column fetch and its HTTP transport
//! - `resolver` - ties the three together: refetches when the table set
//!   changes and republishes the derived values

pub mod columns;
pub mod config;
pub mod fetch;
pub mod query;
pub mod resolver;

pub use columns::{
    classify, index_options, operators_for, value_options, ChartOption, ColumnCache,
    ColumnDescriptor, ColumnOption, Family, NormalizedColumn, OperatorOption, QueryColumn,
};
pub use config::Config;
pub use fetch::{ColumnFetch, ColumnSource, FetchResponse, HttpColumnSource};
pub use query::{table_reference_set, QueryDocument, TableRef};
pub use resolver::{ColumnResolver, TableSetTracker};
