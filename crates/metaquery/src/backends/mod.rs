//! SQL dialect backends
//!
//! One statement engine serves every database; what differs between
//! databases (placeholders, quoting, pagination, key return, batch
//! scaffolding, column encryption) lives behind the `SqlDialect` trait.

pub mod core;
pub mod oracle;
pub mod sqlserver;

use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub use self::core::*;
pub use oracle::OracleDialect;
pub use sqlserver::SqlServerDialect;

/// Dialect selection enumeration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DialectKind {
    #[default]
    #[serde(rename = "sqlserver", alias = "mssql", alias = "tsql")]
    SqlServer,
    #[serde(rename = "oracle")]
    Oracle,
}

impl std::fmt::Display for DialectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DialectKind::SqlServer => write!(f, "sqlserver"),
            DialectKind::Oracle => write!(f, "oracle"),
        }
    }
}

impl std::str::FromStr for DialectKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sqlserver" | "mssql" | "tsql" => Ok(DialectKind::SqlServer),
            "oracle" => Ok(DialectKind::Oracle),
            _ => Err(format!("Unsupported SQL dialect: {}", s)),
        }
    }
}

/// Dialect implementation for a kind
pub fn dialect_for(kind: DialectKind) -> Arc<dyn SqlDialect> {
    match kind {
        DialectKind::SqlServer => Arc::new(SqlServerDialect),
        DialectKind::Oracle => Arc::new(OracleDialect),
    }
}
