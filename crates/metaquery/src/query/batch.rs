//! Query Builder batch operations
//!
//! A batch runs several INSERT / UPDATE / DELETE fragments as one
//! transactional statement. Every insert with a numeric key stores the
//! generated key in a scratch variable, and `KeyLink`s splice that variable
//! into later fragments in place of a property value.

use std::collections::HashMap;

use super::builder::QueryBuilder;
use super::dml::{KeyHandling, Overrides};
use crate::backends::{BatchParts, BatchVariable};
use crate::error::{QueryError, QueryResult};
use crate::model::{DataType, Entity};
use crate::query::params::Statement;

/// Statement kind of a batch step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOperation {
    Insert,
    Update,
    Delete,
}

impl std::fmt::Display for BatchOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BatchOperation::Insert => write!(f, "insert"),
            BatchOperation::Update => write!(f, "update"),
            BatchOperation::Delete => write!(f, "delete"),
        }
    }
}

/// Use the key generated by an earlier insert step as a field's value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyLink {
    pub field: String,
    /// Index of the insert step within the batch
    pub step: usize,
}

/// One fragment of a batch
#[derive(Debug, Clone)]
pub struct BatchStep<'a> {
    pub operation: BatchOperation,
    pub entity: &'a Entity,
    pub links: Vec<KeyLink>,
}

impl<'a> BatchStep<'a> {
    pub fn new(operation: BatchOperation, entity: &'a Entity) -> Self {
        Self {
            operation,
            entity,
            links: Vec::new(),
        }
    }

    pub fn insert(entity: &'a Entity) -> Self {
        Self::new(BatchOperation::Insert, entity)
    }

    pub fn update(entity: &'a Entity) -> Self {
        Self::new(BatchOperation::Update, entity)
    }

    pub fn delete(entity: &'a Entity) -> Self {
        Self::new(BatchOperation::Delete, entity)
    }

    /// Take `field`'s value from the key generated by step `step`
    pub fn link(mut self, field: &str, step: usize) -> Self {
        self.links.push(KeyLink {
            field: field.to_string(),
            step,
        });
        self
    }
}

impl QueryBuilder {
    /// One transactional statement running every step in order
    pub fn batch(&self, steps: &[BatchStep<'_>]) -> QueryResult<Statement> {
        let result = self.build_batch(steps);
        match &result {
            Ok(statement) => tracing::debug!(
                "Built batch statement with {} steps ({} dialect, {} parameters)",
                steps.len(),
                self.dialect.name(),
                statement.params.len()
            ),
            Err(e) => tracing::warn!(
                "Rejected batch of {} steps ({} dialect): {} [{}]",
                steps.len(),
                self.dialect.name(),
                e,
                e.kind()
            ),
        }
        result
    }

    fn build_batch(&self, steps: &[BatchStep<'_>]) -> QueryResult<Statement> {
        if steps.is_empty() {
            return Err(QueryError::invalid_entity("batch has no steps"));
        }

        let variables = self.capture_variables(steps)?;
        let mut sink = self.sink();
        let mut fragments = Vec::with_capacity(steps.len());

        for (index, step) in steps.iter().enumerate() {
            step.entity.validate()?;

            let mut overrides = Overrides::new();
            for link in &step.links {
                if step.entity.field(&link.field).is_none() {
                    return Err(QueryError::invalid_entity(format!(
                        "step {} links unknown field '{}' of table '{}'",
                        index, link.field, step.entity.table
                    )));
                }
                if let Some(variable) = variables.get(&link.step) {
                    overrides.insert(link.field.as_str(), variable.clone());
                }
            }

            let fragment = match step.operation {
                BatchOperation::Insert => {
                    let handling = match variables.get(&index) {
                        Some(variable) => KeyHandling::Capture(variable.clone()),
                        None => KeyHandling::Omit,
                    };
                    self.insert_fragment(step.entity, &overrides, handling, &mut sink)?
                }
                BatchOperation::Update => {
                    self.update_fragment(step.entity, None, &overrides, &mut sink)?
                }
                BatchOperation::Delete => self.delete_fragment(step.entity, &overrides, &mut sink)?,
            };
            fragments.push(fragment);
        }

        let mut captured: Vec<(usize, &String)> = variables.iter().map(|(s, v)| (*s, v)).collect();
        captured.sort_by_key(|(step, _)| *step);

        let variables = captured
            .into_iter()
            .map(|(_, name)| BatchVariable {
                name: name.clone(),
                output: self
                    .dialect
                    .returns_key_via_output_parameter()
                    .then(|| sink.bind_output(DataType::Integer)),
            })
            .collect();

        let sql = self.dialect.batch_statement(&BatchParts {
            variables,
            fragments,
        });
        self.finish(sql, sink)
    }

    /// One variable per insert whose generated key can be captured, keyed
    /// by step index and numbered in step order. Links are checked against
    /// the captured set.
    fn capture_variables(&self, steps: &[BatchStep<'_>]) -> QueryResult<HashMap<usize, String>> {
        let mut variables = HashMap::new();
        for (index, step) in steps.iter().enumerate() {
            if step.operation != BatchOperation::Insert {
                continue;
            }
            let captured = step
                .entity
                .key_field()
                .map(|key| matches!(key.data_type, DataType::Integer | DataType::Decimal))
                .unwrap_or(false);
            if captured {
                variables.insert(index, self.dialect.batch_variable(variables.len()));
            }
        }

        for (index, step) in steps.iter().enumerate() {
            for link in &step.links {
                if link.step >= index {
                    return Err(QueryError::invalid_entity(format!(
                        "step {} links the key of step {}, which does not run before it",
                        index, link.step
                    )));
                }

                let source = &steps[link.step];
                if source.operation != BatchOperation::Insert {
                    return Err(QueryError::invalid_entity(format!(
                        "step {} links the key of step {}, which is an {} and generates no key",
                        index, link.step, source.operation
                    )));
                }

                let key = source.entity.key_field().ok_or_else(|| {
                    QueryError::invalid_entity(format!(
                        "step {} links the key of step {}, but table '{}' has no key field",
                        index, link.step, source.entity.table
                    ))
                })?;
                if !variables.contains_key(&link.step) {
                    return Err(QueryError::invalid_entity(format!(
                        "key '{}' of table '{}' is {} and cannot be captured in a batch",
                        key.name, source.entity.table, key.data_type
                    )));
                }
            }
        }

        Ok(variables)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Field;

    fn order() -> Entity {
        Entity::new("Orders")
            .with_field(Field::key("Id", DataType::Integer))
            .with_field(Field::new("Ref", DataType::Text))
            .with_value("Ref", "A-1")
    }

    fn line(sku: &str) -> Entity {
        Entity::new("Lines")
            .with_field(Field::key("Id", DataType::Integer))
            .with_field(Field::new("OrderId", DataType::Integer))
            .with_field(Field::new("Sku", DataType::Text))
            .with_value("Sku", sku)
    }

    #[test]
    fn test_sql_server_key_chaining() {
        let order = order();
        let line = line("X");
        let statement = QueryBuilder::sql_server()
            .batch(&[
                BatchStep::insert(&order),
                BatchStep::insert(&line).link("OrderId", 0),
            ])
            .unwrap();
        assert_eq!(
            statement.sql,
            "SET XACT_ABORT ON;\n\
             BEGIN TRANSACTION;\n\
             DECLARE @id0 BIGINT;\n\
             DECLARE @id1 BIGINT;\n\
             INSERT INTO Orders (Ref) VALUES (@p0); SET @id0 = SCOPE_IDENTITY();\n\
             INSERT INTO Lines (OrderId, Sku) VALUES (@id0, @p1); SET @id1 = SCOPE_IDENTITY();\n\
             COMMIT TRANSACTION;\n\
             SELECT @id0 AS id0, @id1 AS id1;"
        );
        assert_eq!(statement.params.len(), 2);
    }

    #[test]
    fn test_oracle_key_chaining_returns_captured_keys() {
        let order = order();
        let line = line("X");
        let statement = QueryBuilder::oracle()
            .batch(&[
                BatchStep::insert(&order),
                BatchStep::insert(&line).link("OrderId", 0),
            ])
            .unwrap();
        assert!(statement
            .sql
            .contains("INSERT INTO Orders (Ref) VALUES (:p0) RETURNING Id INTO v_id0;"));
        assert!(statement
            .sql
            .contains("INSERT INTO Lines (OrderId, Sku) VALUES (v_id0, :p1) RETURNING Id INTO v_id1;"));
        assert!(statement
            .sql
            .ends_with("  :p2 := v_id0;\n  :p3 := v_id1;\nEND;"));
        assert_eq!(statement.output_params().count(), 2);
    }

    #[test]
    fn test_link_must_point_backwards_to_an_insert() {
        let order = order().with_value("Id", 1);
        let line = line("X");
        let builder = QueryBuilder::sql_server();

        let forward = builder.batch(&[
            BatchStep::insert(&line).link("OrderId", 1),
            BatchStep::insert(&order),
        ]);
        assert!(matches!(forward, Err(QueryError::InvalidEntity(_))));

        let from_update = builder.batch(&[
            BatchStep::update(&order),
            BatchStep::insert(&line).link("OrderId", 0),
        ]);
        assert!(matches!(from_update, Err(QueryError::InvalidEntity(_))));
    }

    #[test]
    fn test_link_to_keyless_insert() {
        let log = Entity::new("Log")
            .with_field(Field::new("Message", DataType::Text))
            .with_value("Message", "hi");
        let line = line("X");
        let result = QueryBuilder::sql_server().batch(&[
            BatchStep::insert(&log),
            BatchStep::insert(&line).link("OrderId", 0),
        ]);
        assert!(matches!(result, Err(QueryError::InvalidEntity(_))));
    }

    #[test]
    fn test_keyless_and_text_keyed_inserts_declare_nothing() {
        let log = Entity::new("Log")
            .with_field(Field::new("Message", DataType::Text))
            .with_value("Message", "hi");
        let tag = Entity::new("Tags")
            .with_field(Field::key("Code", DataType::Text))
            .with_field(Field::new("Label", DataType::Text))
            .with_value("Label", "Urgent");
        let builder = QueryBuilder::sql_server();

        let statement = builder
            .batch(&[BatchStep::insert(&log), BatchStep::insert(&tag)])
            .unwrap();
        assert!(!statement.sql.contains("DECLARE"));
        assert!(statement.sql.contains("\nINSERT INTO Log (Message) VALUES (@p0);\n"));
        assert!(statement.sql.contains("\nINSERT INTO Tags (Label) VALUES (@p1);\n"));
        assert!(statement.sql.ends_with("COMMIT TRANSACTION;"));

        let linked = line("X");
        let result = builder.batch(&[
            BatchStep::insert(&tag),
            BatchStep::insert(&linked).link("OrderId", 0),
        ]);
        assert!(matches!(result, Err(QueryError::InvalidEntity(_))));
    }

    #[test]
    fn test_empty_batch() {
        assert!(matches!(
            QueryBuilder::sql_server().batch(&[]),
            Err(QueryError::InvalidEntity(_))
        ));
    }
}
