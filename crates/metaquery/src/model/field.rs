//! Field metadata - one column's type, flags, default and join description

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Abstract column type. Drives value coercion, projection and parameter typing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Text,
    Integer,
    Decimal,
    Date,
    DateTime,
    Boolean,
    Binary,
    /// Text stored encrypted at rest; decrypted on read, encrypted on write
    Encrypted,
}

impl DataType {
    /// Type tag used for bound parameters. Encrypted values travel as text
    /// and are wrapped by the database.
    pub fn parameter_type(self) -> DataType {
        match self {
            DataType::Encrypted => DataType::Text,
            other => other,
        }
    }

    /// Whether a value of this type may carry the current-time sentinel
    pub fn is_temporal(self) -> bool {
        matches!(self, DataType::Date | DataType::DateTime)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Text => write!(f, "text"),
            DataType::Integer => write!(f, "integer"),
            DataType::Decimal => write!(f, "decimal"),
            DataType::Date => write!(f, "date"),
            DataType::DateTime => write!(f, "datetime"),
            DataType::Boolean => write!(f, "boolean"),
            DataType::Binary => write!(f, "binary"),
            DataType::Encrypted => write!(f, "encrypted"),
        }
    }
}

/// Join direction for a foreign-key-resolved field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JoinDirection {
    Inner,
    Left,
    Right,
}

impl fmt::Display for JoinDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JoinDirection::Inner => write!(f, "INNER JOIN"),
            JoinDirection::Left => write!(f, "LEFT OUTER JOIN"),
            JoinDirection::Right => write!(f, "RIGHT OUTER JOIN"),
        }
    }
}

/// Foreign-key join attached to a field.
///
/// The join condition is `target.on_column = <local side>`. The local side
/// defaults to the owning field's column on the root table; `local_column`
/// names another column instead, either a root field or a column pulled in
/// by an earlier join. Every entry of `join_fields` is pulled into the
/// result, either as `"Column"` or as `"Column AS Alias"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinSpec {
    pub direction: JoinDirection,
    pub table: String,
    pub on_column: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_column: Option<String>,
    #[serde(default)]
    pub join_fields: Vec<String>,
}

impl JoinSpec {
    pub fn new(direction: JoinDirection, table: &str, on_column: &str) -> Self {
        Self {
            direction,
            table: table.to_string(),
            on_column: on_column.to_string(),
            local_column: None,
            join_fields: Vec::new(),
        }
    }

    pub fn inner(table: &str, on_column: &str) -> Self {
        Self::new(JoinDirection::Inner, table, on_column)
    }

    pub fn left(table: &str, on_column: &str) -> Self {
        Self::new(JoinDirection::Left, table, on_column)
    }

    pub fn right(table: &str, on_column: &str) -> Self {
        Self::new(JoinDirection::Right, table, on_column)
    }

    /// Match `on_column` against `name` instead of the owning field
    pub fn local(mut self, name: &str) -> Self {
        self.local_column = Some(name.to_string());
        self
    }

    /// Pull a column from the joined table (`"Name"` or `"Name AS CustomerName"`)
    pub fn pull(mut self, declaration: &str) -> Self {
        self.join_fields.push(declaration.to_string());
        self
    }

    /// Parsed view of `join_fields`
    pub fn columns(&self) -> Vec<JoinColumn> {
        self.join_fields
            .iter()
            .map(|declaration| JoinColumn::parse(declaration))
            .collect()
    }
}

/// One column pulled from a joined table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinColumn {
    pub source: String,
    pub alias: Option<String>,
}

impl JoinColumn {
    /// Parse the `"source AS alias"` convention. The keyword is case-insensitive.
    pub fn parse(declaration: &str) -> Self {
        let trimmed = declaration.trim();
        match split_as(trimmed) {
            Some((source, alias)) => Self {
                source: source.to_string(),
                alias: Some(alias.to_string()),
            },
            None => Self {
                source: trimmed.to_string(),
                alias: None,
            },
        }
    }

    /// Name under which the column appears in the result
    pub fn exposed_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.source)
    }
}

/// Split `"left AS right"` into its halves
pub(crate) fn split_as(declaration: &str) -> Option<(&str, &str)> {
    let upper = declaration.to_ascii_uppercase();
    let pos = upper.find(" AS ")?;
    let left = declaration[..pos].trim();
    let right = declaration[pos + 4..].trim();
    if left.is_empty() || right.is_empty() {
        return None;
    }
    Some((left, right))
}

/// Column metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_name: Option<String>,
    pub data_type: DataType,
    #[serde(default)]
    pub is_key: bool,
    #[serde(default = "default_true")]
    pub insertable: bool,
    #[serde(default = "default_true")]
    pub updatable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join: Option<JoinSpec>,
}

fn default_true() -> bool {
    true
}

impl Field {
    /// Create an insertable, updatable, non-key field
    pub fn new(name: &str, data_type: DataType) -> Self {
        Self {
            name: name.to_string(),
            db_name: None,
            data_type,
            is_key: false,
            insertable: true,
            updatable: true,
            default: None,
            join: None,
        }
    }

    /// Create a key field. Keys are generated by the database and never inserted.
    pub fn key(name: &str, data_type: DataType) -> Self {
        Self::new(name, data_type).as_key()
    }

    pub fn as_key(mut self) -> Self {
        self.is_key = true;
        self
    }

    pub fn with_db_name(mut self, db_name: &str) -> Self {
        self.db_name = Some(db_name.to_string());
        self
    }

    pub fn insertable(mut self, insertable: bool) -> Self {
        self.insertable = insertable;
        self
    }

    pub fn updatable(mut self, updatable: bool) -> Self {
        self.updatable = updatable;
        self
    }

    pub fn with_default<T: Into<Value>>(mut self, value: T) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn with_join(mut self, join: JoinSpec) -> Self {
        self.join = Some(join);
        self
    }

    /// Physical column name; falls back to the logical name
    pub fn column_name(&self) -> &str {
        self.db_name.as_deref().unwrap_or(&self.name)
    }

    /// Whether the field shows up in generated projections
    pub fn is_projected(&self) -> bool {
        self.insertable || self.updatable
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_name_defaults_to_name() {
        let field = Field::new("Name", DataType::Text);
        assert_eq!(field.column_name(), "Name");

        let field = Field::new("Name", DataType::Text).with_db_name("full_name");
        assert_eq!(field.column_name(), "full_name");
    }

    #[test]
    fn test_join_column_parsing() {
        let plain = JoinColumn::parse("Name");
        assert_eq!(plain.source, "Name");
        assert_eq!(plain.alias, None);
        assert_eq!(plain.exposed_name(), "Name");

        let aliased = JoinColumn::parse(" Name as CustomerName ");
        assert_eq!(aliased.source, "Name");
        assert_eq!(aliased.alias.as_deref(), Some("CustomerName"));
        assert_eq!(aliased.exposed_name(), "CustomerName");
    }

    #[test]
    fn test_field_deserializes_with_flag_defaults() {
        let field: Field =
            serde_json::from_str(r#"{"name": "Age", "data_type": "Integer"}"#).unwrap();
        assert!(field.insertable);
        assert!(field.updatable);
        assert!(!field.is_key);
        assert!(field.join.is_none());
    }

    #[test]
    fn test_join_local_column_is_optional() {
        let join: JoinSpec = serde_json::from_str(
            r#"{"direction": "Inner", "table": "Regions", "on_column": "Id"}"#,
        )
        .unwrap();
        assert_eq!(join.local_column, None);

        let join: JoinSpec = serde_json::from_str(
            r#"{"direction": "Left", "table": "Regions", "on_column": "Id", "local_column": "RegionId"}"#,
        )
        .unwrap();
        assert_eq!(join, JoinSpec::left("Regions", "Id").local("RegionId"));
    }

    #[test]
    fn test_invisible_field() {
        let field = Field::new("RowVersion", DataType::Binary)
            .insertable(false)
            .updatable(false);
        assert!(!field.is_projected());
    }
}
