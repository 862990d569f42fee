//! Identifier and literal safety helpers
//!
//! Statement text is assembled from metadata (table names, column names,
//! join declarations) and from configuration (encryption key and
//! certificate names). Values never reach the SQL text; they are always
//! bound as parameters. This module guards the few strings that do:
//! - validating identifiers before they are spliced into SQL
//! - quoting identifiers in a dialect's style
//! - quoting the configuration names that appear as string literals

use crate::error::{QueryError, QueryResult};

/// Characters allowed in SQL identifiers (alphanumeric, underscore, dollar, hash)
const ALLOWED_IDENTIFIER_CHARS: &str =
    "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789_$#";

/// Longest identifier accepted by both SQL Server and Oracle 12.2+
pub const MAX_IDENTIFIER_LENGTH: usize = 128;

/// Validate that an identifier is safe to splice into SQL text
///
/// # Arguments
/// * `identifier` - The identifier to validate
///
/// # Returns
/// * Ok(()) if valid, Err(QueryError::InvalidEntity) if invalid
pub fn validate_identifier(identifier: &str) -> QueryResult<()> {
    if identifier.is_empty() {
        return Err(QueryError::invalid_entity("identifier cannot be empty"));
    }

    if identifier.len() > MAX_IDENTIFIER_LENGTH {
        return Err(QueryError::invalid_entity(format!(
            "identifier '{}' is too long (max {} characters)",
            identifier, MAX_IDENTIFIER_LENGTH
        )));
    }

    if let Some(c) = identifier
        .chars()
        .find(|c| !ALLOWED_IDENTIFIER_CHARS.contains(*c))
    {
        return Err(QueryError::invalid_entity(format!(
            "identifier '{}' contains invalid character '{}'",
            identifier,
            c.escape_default()
        )));
    }

    if identifier.starts_with(|c: char| c.is_ascii_digit()) {
        return Err(QueryError::invalid_entity(format!(
            "identifier '{}' cannot start with a number",
            identifier
        )));
    }

    Ok(())
}

/// Most parts a table name may carry (`database.schema.table`)
pub const MAX_TABLE_NAME_PARTS: usize = 3;

/// Validate a table name that may be schema-qualified (`dbo.Users`,
/// `HR.EMPLOYEES`). Each dot-separated part must be a valid identifier.
pub fn validate_table_name(name: &str) -> QueryResult<()> {
    let parts: Vec<&str> = name.split('.').collect();
    if parts.len() > MAX_TABLE_NAME_PARTS {
        return Err(QueryError::invalid_entity(format!(
            "table name '{}' has more than {} parts",
            name, MAX_TABLE_NAME_PARTS
        )));
    }
    parts.into_iter().try_for_each(validate_identifier)
}

/// Wrap an identifier in the given quote pair, doubling any embedded closing quote
///
/// # Examples
/// ```
/// use metaquery::security::quote_identifier;
///
/// assert_eq!(quote_identifier("Users", '[', ']'), "[Users]");
/// assert_eq!(quote_identifier("Users", '"', '"'), "\"Users\"");
/// ```
pub fn quote_identifier(identifier: &str, open: char, close: char) -> String {
    let escaped = identifier.replace(close, &format!("{}{}", close, close));
    format!("{}{}{}", open, escaped, close)
}

/// Render a string literal with single quotes doubled
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_identifier() {
        assert!(validate_identifier("Users").is_ok());
        assert!(validate_identifier("order_lines").is_ok());
        assert!(validate_identifier("_private").is_ok());
        assert!(validate_identifier("SYS$ROLE#1").is_ok());

        assert!(validate_identifier("").is_err());
        assert!(validate_identifier("1table").is_err());
        assert!(validate_identifier("table-name").is_err());
        assert!(validate_identifier("table name").is_err());
        assert!(validate_identifier("Users; DROP TABLE Users").is_err());
        assert!(validate_identifier("a'b").is_err());
        assert!(validate_identifier(&"a".repeat(MAX_IDENTIFIER_LENGTH + 1)).is_err());
    }

    #[test]
    fn test_validate_table_name() {
        assert!(validate_table_name("Users").is_ok());
        assert!(validate_table_name("dbo.Users").is_ok());
        assert!(validate_table_name("HR.EMPLOYEES").is_ok());
        assert!(validate_table_name("Sales.dbo.Orders").is_ok());

        assert!(validate_table_name("a.b.c.d").is_err());
        assert!(validate_table_name("dbo.").is_err());
        assert!(validate_table_name(".Users").is_err());
        assert!(validate_table_name("dbo.Users; DROP TABLE Users").is_err());
    }

    #[test]
    fn test_quote_identifier_doubles_closing_quote() {
        assert_eq!(quote_identifier("odd]name", '[', ']'), "[odd]]name]");
        assert_eq!(quote_identifier("odd\"name", '"', '"'), "\"odd\"\"name\"");
    }

    #[test]
    fn test_quote_literal() {
        assert_eq!(quote_literal("PayrollKey"), "'PayrollKey'");
        assert_eq!(quote_literal("o'brien"), "'o''brien'");
    }
}
