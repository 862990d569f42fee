//! Query Builder DML operations - INSERT, UPDATE and DELETE

use serde_json::Value;
use std::collections::HashMap;

use super::builder::QueryBuilder;
use super::resolution::{Target, ROOT_ALIAS};
use crate::backends::{InsertParts, KeyReturn};
use crate::error::{QueryError, QueryResult};
use crate::model::{DataType, Entity, Field};
use crate::query::params::{ParamSink, ParamValue, Statement};

/// Value that stands for "the current date/time" on Date and DateTime fields
pub const CURRENT_TIME_SENTINEL: &str = "NOW";

/// SQL expressions replacing property values, keyed by field name
pub(crate) type Overrides<'a> = HashMap<&'a str, String>;

/// What an INSERT does with the generated key
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum KeyHandling {
    Return,
    Capture(String),
    Omit,
}

impl QueryBuilder {
    /// INSERT of every insertable non-key field that has a value or a
    /// default. The generated key, when the entity has one, is returned.
    pub fn insert(&self, entity: &Entity) -> QueryResult<Statement> {
        self.build("insert", entity, || {
            let mut sink = self.sink();
            let sql =
                self.insert_fragment(entity, &Overrides::new(), KeyHandling::Return, &mut sink)?;
            self.finish(sql, sink)
        })
    }

    /// UPDATE of every updatable non-key field; fields without a value are
    /// set to NULL
    pub fn update(&self, entity: &Entity) -> QueryResult<Statement> {
        self.build("update", entity, || {
            let mut sink = self.sink();
            let sql = self.update_fragment(entity, None, &Overrides::new(), &mut sink)?;
            self.finish(sql, sink)
        })
    }

    /// UPDATE of the named fields only. Names that match no updatable
    /// non-key field are ignored.
    pub fn update_properties(&self, entity: &Entity, names: &[&str]) -> QueryResult<Statement> {
        self.build("update_properties", entity, || {
            let mut sink = self.sink();
            let sql = self.update_fragment(entity, Some(names), &Overrides::new(), &mut sink)?;
            self.finish(sql, sink)
        })
    }

    /// DELETE by key
    pub fn delete(&self, entity: &Entity) -> QueryResult<Statement> {
        self.build("delete", entity, || {
            let mut sink = self.sink();
            let sql = self.delete_fragment(entity, &Overrides::new(), &mut sink)?;
            self.finish(sql, sink)
        })
    }

    pub(crate) fn insert_fragment(
        &self,
        entity: &Entity,
        overrides: &Overrides<'_>,
        key_handling: KeyHandling,
        sink: &mut ParamSink<'_>,
    ) -> QueryResult<String> {
        let mut columns = Vec::new();
        let mut values = Vec::new();

        for field in entity.fields.iter().filter(|f| f.insertable && !f.is_key) {
            let expression = match overrides.get(field.name.as_str()) {
                Some(expression) => expression.clone(),
                None => {
                    let value = entity
                        .value(&field.name)
                        .filter(|v| !v.is_null())
                        .or(field.default.as_ref());
                    match value {
                        Some(value) => self.value_expression(entity, field, value, sink)?,
                        None => continue,
                    }
                }
            };
            columns.push(self.ident(field.column_name()));
            values.push(expression);
        }

        if columns.is_empty() {
            return Err(QueryError::invalid_entity(format!(
                "table '{}' has no values to insert",
                entity.table
            )));
        }

        let key = match (entity.key_field(), key_handling) {
            (Some(key), KeyHandling::Return) => KeyReturn::Return {
                column: self.ident(key.column_name()),
                output: self
                    .dialect
                    .returns_key_via_output_parameter()
                    .then(|| sink.bind_output(key.data_type)),
            },
            (Some(key), KeyHandling::Capture(variable)) => KeyReturn::Capture {
                column: self.ident(key.column_name()),
                variable,
            },
            _ => KeyReturn::Omit,
        };

        let parts = InsertParts {
            table: self.table_name(entity),
            columns,
            values,
        };
        Ok(self.dialect.insert_statement(&parts, &key))
    }

    pub(crate) fn update_fragment(
        &self,
        entity: &Entity,
        names: Option<&[&str]>,
        overrides: &Overrides<'_>,
        sink: &mut ParamSink<'_>,
    ) -> QueryResult<String> {
        entity.require_key()?;

        let mut assignments = Vec::new();
        for field in entity.fields.iter().filter(|f| f.updatable && !f.is_key) {
            if let Some(names) = names {
                if !names.contains(&field.name.as_str()) {
                    continue;
                }
            }

            let expression = match overrides.get(field.name.as_str()) {
                Some(expression) => expression.clone(),
                None => match entity.value(&field.name).filter(|v| !v.is_null()) {
                    Some(value) => self.value_expression(entity, field, value, sink)?,
                    None => sink.bind(ParamValue::Null, field.data_type),
                },
            };
            assignments.push(format!(
                "{} = {}",
                self.column_ref(&Target::Root(field)),
                expression
            ));
        }

        if assignments.is_empty() {
            return Err(QueryError::invalid_entity(format!(
                "table '{}' has no updatable fields to set",
                entity.table
            )));
        }

        let key_override = self.key_override(entity, overrides);
        let predicate = self.key_predicate(entity, key_override, sink)?;
        Ok(self.dialect.update_statement(
            &self.table_name(entity),
            ROOT_ALIAS,
            &assignments,
            &predicate,
        ))
    }

    pub(crate) fn delete_fragment(
        &self,
        entity: &Entity,
        overrides: &Overrides<'_>,
        sink: &mut ParamSink<'_>,
    ) -> QueryResult<String> {
        let key_override = self.key_override(entity, overrides);
        let predicate = self.key_predicate(entity, key_override, sink)?;
        Ok(self
            .dialect
            .delete_statement(&self.table_name(entity), ROOT_ALIAS, &predicate))
    }

    fn key_override<'o>(&self, entity: &Entity, overrides: &'o Overrides<'_>) -> Option<&'o str> {
        entity
            .key_field()
            .and_then(|key| overrides.get(key.name.as_str()))
            .map(String::as_str)
    }

    /// SQL for a value written into a column: the current-time expression
    /// for the sentinel, an encryption wrapper for encrypted fields, a
    /// plain placeholder otherwise
    fn value_expression(
        &self,
        entity: &Entity,
        field: &Field,
        value: &Value,
        sink: &mut ParamSink<'_>,
    ) -> QueryResult<String> {
        if field.data_type.is_temporal() && is_current_time(value) {
            return Ok(self.dialect.current_timestamp(field.data_type).to_string());
        }

        let typed = ParamValue::coerce(value, field.data_type).map_err(|reason| {
            QueryError::invalid_entity(format!(
                "value for field '{}' of table '{}': {}",
                field.name, entity.table, reason
            ))
        })?;

        if field.data_type == DataType::Encrypted {
            let config = self.encryption(field)?;
            let placeholder = sink.bind(typed, field.data_type);
            sink.mark_encryption();
            return self.dialect.encrypt_value(&placeholder, config);
        }

        Ok(sink.bind(typed, field.data_type))
    }
}

fn is_current_time(value: &Value) -> bool {
    value
        .as_str()
        .map(|s| s.trim().eq_ignore_ascii_case(CURRENT_TIME_SENTINEL))
        .unwrap_or(false)
}
