//! Core dialect trait
//!
//! The statement engine assembles dialect-neutral pieces (projection,
//! FROM clause, predicates, assignments) and hands them to a `SqlDialect`
//! to be put together in the database's syntax. The pieces arrive fully
//! rendered: identifiers already quoted, placeholders already bound.

use std::fmt::Debug;

use super::DialectKind;
use crate::config::EncryptionConfig;
use crate::error::{QueryError, QueryResult};
use crate::model::DataType;
use crate::security::quote_identifier;

/// A listing query split into the parts pagination needs to rearrange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PagedSelect {
    /// Comma-separated projection, without `SELECT`
    pub projection: String,
    /// `FROM` clause including joins
    pub from: String,
    /// WHERE body, without the keyword
    pub filter: Option<String>,
    /// ORDER BY terms, without the keyword
    pub order_by: String,
}

/// Row window of a paged query. `start` is 0-based; `first_row` and
/// `last_row` are the 1-based inclusive bounds `start + 1 ..= start + length`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: u64,
    pub length: u64,
    pub first_row: u64,
    pub last_row: u64,
}

impl Window {
    /// `None` when `length` is zero or a bound does not fit in `u64`
    pub fn new(start: u64, length: u64) -> Option<Self> {
        if length == 0 {
            return None;
        }
        Some(Self {
            start,
            length,
            first_row: start.checked_add(1)?,
            last_row: start.checked_add(length)?,
        })
    }
}

/// INSERT pieces. `columns` and `values` are parallel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertParts {
    pub table: String,
    pub columns: Vec<String>,
    pub values: Vec<String>,
}

/// How the generated key of an INSERT is handed back
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyReturn {
    /// Nothing to return
    Omit,
    /// Return to the caller. `output` is the placeholder of the output
    /// parameter for dialects that return keys through one.
    Return {
        column: String,
        output: Option<String>,
    },
    /// Store in a batch variable for later statements
    Capture { column: String, variable: String },
}

/// A batch variable holding a captured key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchVariable {
    pub name: String,
    /// Output placeholder receiving the value at the end of the batch
    pub output: Option<String>,
}

/// Statement fragments of a batch plus the variables they share
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchParts {
    pub variables: Vec<BatchVariable>,
    pub fragments: Vec<String>,
}

/// SQL dialect policy
pub trait SqlDialect: Send + Sync + Debug {
    fn kind(&self) -> DialectKind;

    /// Short name used in errors and log events
    fn name(&self) -> &'static str;

    /// Placeholder for a named parameter
    fn placeholder(&self, name: &str) -> String;

    /// Opening and closing identifier quote
    fn identifier_quotes(&self) -> (char, char);

    fn quote(&self, identifier: &str) -> String {
        let (open, close) = self.identifier_quotes();
        quote_identifier(identifier, open, close)
    }

    /// Expression rendering a date column as `YYYY-MM-DD`
    fn date_to_string(&self, column: &str) -> String;

    /// Current-time expression for a Date or DateTime column
    fn current_timestamp(&self, data_type: DataType) -> &'static str;

    fn paginate(&self, select: &PagedSelect, window: Window) -> String;

    /// Whether a returned key travels in an output parameter
    fn returns_key_via_output_parameter(&self) -> bool;

    fn insert_statement(&self, parts: &InsertParts, key: &KeyReturn) -> String;

    fn update_statement(
        &self,
        table: &str,
        alias: &str,
        assignments: &[String],
        predicate: &str,
    ) -> String;

    fn delete_statement(&self, table: &str, alias: &str, predicate: &str) -> String;

    /// Name of the `index`-th batch variable
    fn batch_variable(&self, index: usize) -> String;

    /// Wrap fragments into one transactional unit
    fn batch_statement(&self, parts: &BatchParts) -> String;

    fn supports_column_encryption(&self) -> bool {
        false
    }

    fn decrypt_column(&self, _column: &str) -> QueryResult<String> {
        Err(QueryError::unsupported(self.name(), "column decryption"))
    }

    fn encrypt_value(&self, _value: &str, _config: &EncryptionConfig) -> QueryResult<String> {
        Err(QueryError::unsupported(self.name(), "column encryption"))
    }

    /// Surround a statement with the key management it needs
    fn with_encryption(&self, _sql: &str, _config: &EncryptionConfig) -> QueryResult<String> {
        Err(QueryError::unsupported(self.name(), "column encryption"))
    }
}

/// `WHERE <filter>` with a leading space, or nothing
pub(crate) fn where_suffix(filter: Option<&str>) -> String {
    filter
        .map(|filter| format!(" WHERE {}", filter))
        .unwrap_or_default()
}
