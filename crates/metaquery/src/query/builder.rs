//! Query Builder - Core builder implementation

use std::sync::Arc;

use crate::backends::{dialect_for, DialectKind, SqlDialect};
use crate::config::{ConfigError, EncryptionConfig, QueryBuilderConfig};
use crate::error::{QueryError, QueryResult};
use crate::model::{DataType, Entity, Field};
use crate::query::params::{ParamSink, Statement};

/// Statement generator for one dialect.
///
/// Every operation takes shared references, holds no state between calls
/// and never mutates its inputs, so one builder can serve any number of
/// threads.
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    pub(crate) dialect: Arc<dyn SqlDialect>,
    pub(crate) config: QueryBuilderConfig,
}

impl QueryBuilder {
    /// Create a builder for the configured dialect
    pub fn new(config: QueryBuilderConfig) -> Self {
        Self {
            dialect: dialect_for(config.dialect),
            config,
        }
    }

    /// Create a builder around a custom dialect implementation
    pub fn with_dialect(dialect: Arc<dyn SqlDialect>, config: QueryBuilderConfig) -> Self {
        Self { dialect, config }
    }

    pub fn sql_server() -> Self {
        Self::new(QueryBuilderConfig::sql_server())
    }

    pub fn oracle() -> Self {
        Self::new(QueryBuilderConfig::oracle())
    }

    /// Create a builder from `METAQUERY_*` environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self::new(QueryBuilderConfig::from_env()?))
    }

    pub fn dialect(&self) -> &dyn SqlDialect {
        self.dialect.as_ref()
    }

    pub fn dialect_kind(&self) -> DialectKind {
        self.dialect.kind()
    }

    pub fn config(&self) -> &QueryBuilderConfig {
        &self.config
    }

    pub(crate) fn sink(&self) -> ParamSink<'_> {
        ParamSink::new(self.dialect.as_ref())
    }

    /// Identifier as it appears in SQL text
    pub(crate) fn ident(&self, name: &str) -> String {
        if self.config.quote_identifiers {
            self.dialect.quote(name)
        } else {
            name.to_string()
        }
    }

    /// `alias.column`
    pub(crate) fn qualify(&self, alias: &str, column: &str) -> String {
        format!("{}.{}", alias, self.ident(column))
    }

    /// Table reference; each part of a schema-qualified name is rendered
    /// separately (`[dbo].[Users]`)
    pub(crate) fn table_ident(&self, table: &str) -> String {
        table
            .split('.')
            .map(|part| self.ident(part))
            .collect::<Vec<_>>()
            .join(".")
    }

    pub(crate) fn table_name(&self, entity: &Entity) -> String {
        self.table_ident(&entity.table)
    }

    /// Encryption settings for an encrypted field. Dialect support is
    /// checked before configuration.
    pub(crate) fn encryption(&self, field: &Field) -> QueryResult<&EncryptionConfig> {
        if !self.dialect.supports_column_encryption() {
            return Err(QueryError::unsupported(
                self.dialect.name(),
                &format!("encrypted column '{}'", field.name),
            ));
        }
        self.config.encryption.as_ref().ok_or_else(|| {
            QueryError::EncryptionConfigMissing(format!(
                "field '{}' is encrypted but no key/certificate is configured",
                field.name
            ))
        })
    }

    /// Expression reading a root field: decrypted when encrypted, the bare
    /// qualified column otherwise
    pub(crate) fn read_expression(
        &self,
        field: &Field,
        column: String,
        sink: &mut ParamSink<'_>,
    ) -> QueryResult<String> {
        if field.data_type != DataType::Encrypted {
            return Ok(column);
        }
        self.encryption(field)?;
        sink.mark_encryption();
        self.dialect.decrypt_column(&column)
    }

    /// Finish a statement, adding key management when encrypted columns
    /// were touched
    pub(crate) fn finish(&self, sql: String, sink: ParamSink<'_>) -> QueryResult<Statement> {
        let sql = if sink.uses_encryption() {
            let config = self.config.encryption.as_ref().ok_or_else(|| {
                QueryError::EncryptionConfigMissing(
                    "statement touches encrypted columns but no key/certificate is configured"
                        .to_string(),
                )
            })?;
            self.dialect.with_encryption(&sql, config)?
        } else {
            sql
        };
        Ok(sink.finish(sql))
    }

    /// Run one operation with validation and logging
    pub(crate) fn build<F>(
        &self,
        operation: &str,
        entity: &Entity,
        build_statement: F,
    ) -> QueryResult<Statement>
    where
        F: FnOnce() -> QueryResult<Statement>,
    {
        let result = entity.validate().and_then(|_| build_statement());
        match &result {
            Ok(statement) => tracing::debug!(
                "Built {} statement for '{}' ({} dialect, {} parameters)",
                operation,
                entity.table,
                self.dialect.name(),
                statement.params.len()
            ),
            Err(e) => tracing::warn!(
                "Rejected {} for '{}' ({} dialect): {} [{}]",
                operation,
                entity.table,
                self.dialect.name(),
                e,
                e.kind()
            ),
        }
        result
    }
}

impl Default for QueryBuilder {
    fn default() -> Self {
        Self::new(QueryBuilderConfig::default())
    }
}
