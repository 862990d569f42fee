//! SQL Server dialect
//!
//! `@name` placeholders, `[bracket]` quoting, `ROW_NUMBER()` windowing,
//! `OUTPUT INSERTED` key return and symmetric-key column encryption.

use super::core::{
    where_suffix, BatchParts, InsertParts, KeyReturn, PagedSelect, SqlDialect, Window,
};
use super::DialectKind;
use crate::config::EncryptionConfig;
use crate::error::QueryResult;
use crate::model::DataType;
use crate::security::quote_literal;

/// Alias of the derived table wrapping a windowed select
const PAGED_ALIAS: &str = "paged";

#[derive(Debug, Clone, Copy, Default)]
pub struct SqlServerDialect;

impl SqlDialect for SqlServerDialect {
    fn kind(&self) -> DialectKind {
        DialectKind::SqlServer
    }

    fn name(&self) -> &'static str {
        "sqlserver"
    }

    fn placeholder(&self, name: &str) -> String {
        format!("@{}", name)
    }

    fn identifier_quotes(&self) -> (char, char) {
        ('[', ']')
    }

    fn date_to_string(&self, column: &str) -> String {
        format!("CONVERT(VARCHAR(10), {}, 120)", column)
    }

    fn current_timestamp(&self, data_type: DataType) -> &'static str {
        match data_type {
            DataType::Date => "CAST(GETDATE() AS DATE)",
            _ => "GETDATE()",
        }
    }

    fn paginate(&self, select: &PagedSelect, window: Window) -> String {
        format!(
            "SELECT * FROM (SELECT {}, ROW_NUMBER() OVER (ORDER BY {}) AS RowNum {}{}) {} \
             WHERE {}.RowNum BETWEEN {} AND {} ORDER BY {}.RowNum",
            select.projection,
            select.order_by,
            select.from,
            where_suffix(select.filter.as_deref()),
            PAGED_ALIAS,
            PAGED_ALIAS,
            window.first_row,
            window.last_row,
            PAGED_ALIAS,
        )
    }

    fn returns_key_via_output_parameter(&self) -> bool {
        false
    }

    fn insert_statement(&self, parts: &InsertParts, key: &KeyReturn) -> String {
        let columns = parts.columns.join(", ");
        let values = parts.values.join(", ");
        match key {
            KeyReturn::Return { column, .. } => format!(
                "INSERT INTO {} ({}) OUTPUT INSERTED.{} VALUES ({})",
                parts.table, columns, column, values
            ),
            KeyReturn::Capture { variable, .. } => format!(
                "INSERT INTO {} ({}) VALUES ({}); SET {} = SCOPE_IDENTITY()",
                parts.table, columns, values, variable
            ),
            KeyReturn::Omit => format!(
                "INSERT INTO {} ({}) VALUES ({})",
                parts.table, columns, values
            ),
        }
    }

    fn update_statement(
        &self,
        table: &str,
        alias: &str,
        assignments: &[String],
        predicate: &str,
    ) -> String {
        format!(
            "UPDATE {} SET {} FROM {} {} WHERE {}",
            alias,
            assignments.join(", "),
            table,
            alias,
            predicate
        )
    }

    fn delete_statement(&self, table: &str, alias: &str, predicate: &str) -> String {
        format!("DELETE {} FROM {} {} WHERE {}", alias, table, alias, predicate)
    }

    fn batch_variable(&self, index: usize) -> String {
        format!("@id{}", index)
    }

    fn batch_statement(&self, parts: &BatchParts) -> String {
        let mut lines = vec![
            "SET XACT_ABORT ON;".to_string(),
            "BEGIN TRANSACTION;".to_string(),
        ];
        for variable in &parts.variables {
            lines.push(format!("DECLARE {} BIGINT;", variable.name));
        }
        for fragment in &parts.fragments {
            lines.push(format!("{};", fragment));
        }
        lines.push("COMMIT TRANSACTION;".to_string());

        if !parts.variables.is_empty() {
            let captured: Vec<String> = parts
                .variables
                .iter()
                .map(|variable| {
                    format!(
                        "{} AS {}",
                        variable.name,
                        variable.name.trim_start_matches('@')
                    )
                })
                .collect();
            lines.push(format!("SELECT {};", captured.join(", ")));
        }

        lines.join("\n")
    }

    fn supports_column_encryption(&self) -> bool {
        true
    }

    fn decrypt_column(&self, column: &str) -> QueryResult<String> {
        Ok(format!("CONVERT(NVARCHAR(MAX), DECRYPTBYKEY({}))", column))
    }

    fn encrypt_value(&self, value: &str, config: &EncryptionConfig) -> QueryResult<String> {
        Ok(format!(
            "ENCRYPTBYKEY(KEY_GUID({}), CONVERT(NVARCHAR(MAX), {}))",
            quote_literal(&config.key_name),
            value
        ))
    }

    fn with_encryption(&self, sql: &str, config: &EncryptionConfig) -> QueryResult<String> {
        let key = self.quote(&config.key_name);
        Ok(format!(
            "OPEN SYMMETRIC KEY {} DECRYPTION BY CERTIFICATE {};\n{};\nCLOSE SYMMETRIC KEY {};",
            key,
            self.quote(&config.certificate_name),
            sql.trim_end_matches(';'),
            key
        ))
    }
}
