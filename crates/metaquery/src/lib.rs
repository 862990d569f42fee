//! # metaquery: metadata-driven SQL generation
//!
//! Builds parameterized SQL statements from a runtime description of a
//! table (an [`Entity`] with its [`Field`]s and current property values),
//! a listing descriptor ([`FilterInfo`]) and an aggregate descriptor
//! ([`AggregateSpec`]). Every statement comes back as SQL text plus an
//! ordered list of named parameters (`p0`, `p1`, …); user-supplied values
//! never reach the SQL text.
//!
//! Two dialects are provided, SQL Server and Oracle, behind the
//! [`SqlDialect`] trait. The crate does not connect to or execute against
//! a database.

pub mod backends;
pub mod config;
pub mod error;
pub mod filter;
pub mod model;
pub mod query;
pub mod security;

// Re-export core types
pub use backends::{DialectKind, OracleDialect, SqlDialect, SqlServerDialect};
pub use config::{ConfigError, EncryptionConfig, QueryBuilderConfig};
pub use error::*;
pub use filter::{
    AggregateFunction, AggregateFunctionKind, AggregateSpec, ColumnSpec, CompareOperator,
    Condition, FilterInfo, Predicate, SortDirection, SortSpec, DEFAULT_AGGREGATE_ALIAS,
};
pub use model::*;
pub use query::*;
