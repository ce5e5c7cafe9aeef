pub mod classify;
pub mod decode;
pub mod operators;
pub mod projection;
pub mod store;
pub mod types;
pub mod write;

pub use classify::{classify, Family};
pub use decode::decode_structure;
pub use operators::{operators_for, OperatorOption};
pub use projection::{index_options, value_options};
pub use store::ColumnCache;
pub use types::{cache_key, ChartOption, ColumnDescriptor, ColumnOption, NormalizedColumn, QueryColumn};
