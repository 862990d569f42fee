//! Query Builder Module - parameterized statement generation over entity metadata

pub mod aggregate;
pub mod batch;
pub mod builder;
pub mod dml;
pub mod pagination;
pub mod params;
pub(crate) mod resolution;
pub mod select;
pub mod types;
pub mod where_clause;

// Re-export main types and builder
pub use batch::{BatchOperation, BatchStep, KeyLink};
pub use builder::QueryBuilder;
pub use dml::CURRENT_TIME_SENTINEL;
pub use params::{BoundParameter, ParamValue, ParameterDirection, Statement};
pub use resolution::ROOT_ALIAS;
pub use types::{AggregateSource, Combinator};
