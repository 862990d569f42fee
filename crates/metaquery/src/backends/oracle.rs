//! Oracle dialect
//!
//! `:name` placeholders, `"double"` quoting, native `OFFSET ... FETCH NEXT`
//! pagination (12c+), `RETURNING ... INTO` key return and PL/SQL batch
//! blocks. Column encryption is not available.

use super::core::{
    where_suffix, BatchParts, InsertParts, KeyReturn, PagedSelect, SqlDialect, Window,
};
use super::DialectKind;
use crate::model::DataType;

#[derive(Debug, Clone, Copy, Default)]
pub struct OracleDialect;

impl SqlDialect for OracleDialect {
    fn kind(&self) -> DialectKind {
        DialectKind::Oracle
    }

    fn name(&self) -> &'static str {
        "oracle"
    }

    fn placeholder(&self, name: &str) -> String {
        format!(":{}", name)
    }

    fn identifier_quotes(&self) -> (char, char) {
        ('"', '"')
    }

    fn date_to_string(&self, column: &str) -> String {
        format!("TO_CHAR({}, 'YYYY-MM-DD')", column)
    }

    fn current_timestamp(&self, data_type: DataType) -> &'static str {
        match data_type {
            DataType::Date => "TRUNC(SYSDATE)",
            _ => "SYSTIMESTAMP",
        }
    }

    fn paginate(&self, select: &PagedSelect, window: Window) -> String {
        format!(
            "SELECT {} {}{} ORDER BY {} OFFSET {} ROWS FETCH NEXT {} ROWS ONLY",
            select.projection,
            select.from,
            where_suffix(select.filter.as_deref()),
            select.order_by,
            window.start,
            window.length
        )
    }

    fn returns_key_via_output_parameter(&self) -> bool {
        true
    }

    fn insert_statement(&self, parts: &InsertParts, key: &KeyReturn) -> String {
        let insert = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            parts.table,
            parts.columns.join(", "),
            parts.values.join(", ")
        );
        match key {
            KeyReturn::Return {
                column,
                output: Some(output),
            } => format!("{} RETURNING {} INTO {}", insert, column, output),
            KeyReturn::Capture { column, variable } => {
                format!("{} RETURNING {} INTO {}", insert, column, variable)
            }
            KeyReturn::Return { output: None, .. } | KeyReturn::Omit => insert,
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
            "UPDATE {} {} SET {} WHERE {}",
            table,
            alias,
            assignments.join(", "),
            predicate
        )
    }

    fn delete_statement(&self, table: &str, alias: &str, predicate: &str) -> String {
        format!("DELETE FROM {} {} WHERE {}", table, alias, predicate)
    }

    fn batch_variable(&self, index: usize) -> String {
        format!("v_id{}", index)
    }

    fn batch_statement(&self, parts: &BatchParts) -> String {
        let mut lines = Vec::new();
        if !parts.variables.is_empty() {
            lines.push("DECLARE".to_string());
            for variable in &parts.variables {
                lines.push(format!("  {} NUMBER;", variable.name));
            }
        }
        lines.push("BEGIN".to_string());
        for fragment in &parts.fragments {
            lines.push(format!("  {};", fragment));
        }
        lines.push("  COMMIT;".to_string());
        for variable in &parts.variables {
            if let Some(output) = &variable.output {
                lines.push(format!("  {} := {};", output, variable.name));
            }
        }
        lines.push("END;".to_string());
        lines.join("\n")
    }
}
