//! Entity - a named table view: ordered field metadata plus current values

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};

use super::field::Field;
use crate::error::{QueryError, QueryResult};
use crate::security::{validate_identifier, validate_table_name};

/// Table metadata with the property values of one logical record.
///
/// Property keys that match no field are kept but ignored by statement
/// builders.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub table: String,
    pub fields: Vec<Field>,
    #[serde(default)]
    pub properties: HashMap<String, Value>,
}

impl Entity {
    pub fn new(table: &str) -> Self {
        Self {
            table: table.to_string(),
            fields: Vec::new(),
            properties: HashMap::new(),
        }
    }

    /// Append a field definition
    pub fn with_field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    /// Set a property value (builder style)
    pub fn with_value<T: Into<Value>>(mut self, name: &str, value: T) -> Self {
        self.set(name, value);
        self
    }

    /// Set a property value
    pub fn set<T: Into<Value>>(&mut self, name: &str, value: T) {
        self.properties.insert(name.to_string(), value.into());
    }

    pub fn value(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    /// Look up a field by logical name
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn key_field(&self) -> Option<&Field> {
        self.fields.iter().find(|f| f.is_key)
    }

    /// Key field, or `InvalidEntity` when the entity declares none
    pub fn require_key(&self) -> QueryResult<&Field> {
        self.key_field().ok_or_else(|| {
            QueryError::invalid_entity(format!("table '{}' has no key field", self.table))
        })
    }

    /// Key field together with its current, non-null value
    pub fn require_key_value(&self) -> QueryResult<(&Field, &Value)> {
        let key = self.require_key()?;
        match self.value(&key.name) {
            Some(value) if !value.is_null() => Ok((key, value)),
            _ => Err(QueryError::invalid_entity(format!(
                "key '{}' of table '{}' has no value",
                key.name, self.table
            ))),
        }
    }

    /// Check the invariants every statement builder relies on
    pub fn validate(&self) -> QueryResult<()> {
        if self.table.trim().is_empty() {
            return Err(QueryError::invalid_entity("table name is empty"));
        }
        validate_table_name(&self.table)?;

        let keys = self.fields.iter().filter(|f| f.is_key).count();
        if keys > 1 {
            return Err(QueryError::invalid_entity(format!(
                "table '{}' declares {} key fields, at most one is allowed",
                self.table, keys
            )));
        }

        for field in &self.fields {
            validate_identifier(&field.name)?;
            validate_identifier(field.column_name())?;

            if let Some(join) = &field.join {
                validate_table_name(&join.table)?;
                validate_identifier(&join.on_column)?;
                if let Some(local) = &join.local_column {
                    validate_identifier(local)?;
                }
                for column in join.columns() {
                    validate_identifier(&column.source)?;
                    if let Some(alias) = &column.alias {
                        validate_identifier(alias)?;
                    }
                }
            }
        }

        self.check_exposed_names()
    }

    /// Every result column name (visible root fields, then join columns)
    /// must be unique, compared case-insensitively
    fn check_exposed_names(&self) -> QueryResult<()> {
        let root = self
            .fields
            .iter()
            .filter(|f| f.is_projected())
            .map(|f| f.name.clone());
        let joined = self
            .fields
            .iter()
            .filter_map(|f| f.join.as_ref())
            .flat_map(|join| join.columns())
            .map(|column| column.exposed_name().to_string());

        let mut seen = HashSet::new();
        for name in root.chain(joined) {
            if !seen.insert(name.to_ascii_lowercase()) {
                return Err(QueryError::invalid_entity(format!(
                    "table '{}' exposes column '{}' more than once",
                    self.table, name
                )));
            }
        }
        Ok(())
    }

    /// Parse entity metadata (and optional values) from JSON
    pub fn from_json(json: &str) -> QueryResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| QueryError::invalid_entity(format!("malformed entity metadata: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DataType, JoinSpec};

    fn users() -> Entity {
        Entity::new("Users")
            .with_field(Field::key("Id", DataType::Integer))
            .with_field(Field::new("Name", DataType::Text))
    }

    #[test]
    fn test_key_lookup() {
        let entity = users();
        assert_eq!(entity.key_field().map(|f| f.name.as_str()), Some("Id"));
        assert!(entity.require_key_value().is_err());

        let entity = entity.with_value("Id", 7);
        let (key, value) = entity.require_key_value().unwrap();
        assert_eq!(key.name, "Id");
        assert_eq!(value, &Value::from(7));
    }

    #[test]
    fn test_null_key_value_is_missing() {
        let entity = users().with_value("Id", Value::Null);
        assert!(matches!(
            entity.require_key_value(),
            Err(QueryError::InvalidEntity(_))
        ));
    }

    #[test]
    fn test_validate_rejects_empty_table() {
        let entity = Entity::new("  ");
        assert!(matches!(entity.validate(), Err(QueryError::InvalidEntity(_))));
    }

    #[test]
    fn test_validate_accepts_schema_qualified_tables() {
        let entity = Entity::new("dbo.Users")
            .with_field(Field::key("Id", DataType::Integer))
            .with_field(
                Field::new("DeptId", DataType::Integer)
                    .with_join(JoinSpec::inner("HR.DEPARTMENTS", "Id").pull("Title")),
            );
        assert!(entity.validate().is_ok());
        assert!(Entity::new("dbo.").with_field(Field::key("Id", DataType::Integer)).validate().is_err());
    }

    #[test]
    fn test_validate_rejects_two_keys() {
        let entity = users().with_field(Field::key("Code", DataType::Text));
        let err = entity.validate().unwrap_err();
        assert!(err.to_string().contains("2 key fields"));
    }

    #[test]
    fn test_validate_checks_join_identifiers() {
        let entity = users().with_field(
            Field::new("CustomerId", DataType::Integer)
                .with_join(JoinSpec::left("Customers", "Id").pull("Name AS Bad Alias")),
        );
        assert!(entity.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_duplicate_exposed_names() {
        let shadowing = users().with_field(
            Field::new("CustomerId", DataType::Integer)
                .with_join(JoinSpec::left("Customers", "Id").pull("Name")),
        );
        let err = shadowing.validate().unwrap_err();
        assert!(matches!(err, QueryError::InvalidEntity(_)));
        assert!(err.to_string().contains("'Name'"));

        let aliased_twice = users().with_field(
            Field::new("CustomerId", DataType::Integer).with_join(
                JoinSpec::left("Customers", "Id")
                    .pull("Name AS CustomerName")
                    .pull("Title AS customername"),
            ),
        );
        assert!(aliased_twice.validate().is_err());

        let aliased = users().with_field(
            Field::new("CustomerId", DataType::Integer)
                .with_join(JoinSpec::left("Customers", "Id").pull("Name AS CustomerName")),
        );
        assert!(aliased.validate().is_ok());

        let hidden_root = Entity::new("Users")
            .with_field(Field::key("Id", DataType::Integer))
            .with_field(Field::new("Name", DataType::Text).insertable(false).updatable(false))
            .with_field(
                Field::new("CustomerId", DataType::Integer)
                    .with_join(JoinSpec::left("Customers", "Id").pull("Name")),
            );
        assert!(hidden_root.validate().is_ok());
    }

    #[test]
    fn test_unmapped_properties_are_kept() {
        let entity = users().with_value("Unknown", "x");
        assert!(entity.validate().is_ok());
        assert_eq!(entity.value("Unknown"), Some(&Value::from("x")));
    }

    #[test]
    fn test_from_json() {
        let entity = Entity::from_json(
            r#"{
                "table": "Users",
                "fields": [
                    {"name": "Id", "data_type": "Integer", "is_key": true},
                    {"name": "Name", "data_type": "Text"}
                ],
                "properties": {"Name": "smith"}
            }"#,
        )
        .unwrap();
        assert_eq!(entity.fields.len(), 2);
        assert_eq!(entity.value("Name"), Some(&Value::from("smith")));

        assert!(Entity::from_json("{").is_err());
    }
}
