//! Listing and aggregation descriptors
//!
//! - `predicate`: the search-value mini language
//! - `filter_info`: window, per-column search and sort directives
//! - `aggregate`: group-by, rollup and aggregate functions

pub mod aggregate;
pub mod filter_info;
pub mod predicate;

pub use aggregate::{
    AggregateFunction, AggregateFunctionKind, AggregateSpec, CompareOperator,
    DEFAULT_AGGREGATE_ALIAS,
};
pub use filter_info::{ColumnSpec, FilterInfo, SortDirection, SortSpec};
pub use predicate::{Condition, Predicate};
