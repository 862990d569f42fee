//! Query Builder WHERE clause construction
//!
//! Predicates are collected into lists and joined once, so a finished
//! clause never carries a dangling `AND`/`OR`.

use super::builder::QueryBuilder;
use super::resolution::{AliasTable, Target};
use super::types::Combinator;
use crate::error::{QueryError, QueryResult};
use crate::filter::{Condition, FilterInfo, Predicate};
use crate::model::Entity;
use crate::query::params::{ParamSink, ParamValue};

impl QueryBuilder {
    /// WHERE body for a listing filter: per-column predicates joined with
    /// AND, the global search over searchable columns joined with OR, and
    /// both groups joined with AND.
    pub(crate) fn filter_clause(
        &self,
        aliases: &AliasTable<'_>,
        filter: &FilterInfo,
        sink: &mut ParamSink<'_>,
    ) -> QueryResult<Option<String>> {
        let mut column_predicates = Vec::new();
        for column in &filter.columns {
            let Some(predicate) = &column.search else {
                continue;
            };
            let target = aliases.require(&column.data)?;
            let condition = predicate.coerce(target.data_type()).map_err(|reason| {
                QueryError::invalid_filter(format!(
                    "search value '{}' for column '{}': {}",
                    predicate, column.data, reason
                ))
            })?;
            let operand = self.operand(&target, sink)?;
            column_predicates.push(self.render_condition(&operand, &condition, target, sink));
        }

        let mut search_predicates = Vec::new();
        if let Some(search) = &filter.search {
            for column in filter.columns.iter().filter(|c| c.searchable) {
                let target = aliases.require(&column.data)?;
                // Columns that cannot hold the search text are left out
                let Ok(condition) = search.coerce(target.data_type()) else {
                    continue;
                };
                let operand = self.operand(&target, sink)?;
                search_predicates.push(self.render_condition(&operand, &condition, target, sink));
            }
        }

        let clause = match (column_predicates.is_empty(), search_predicates.is_empty()) {
            (true, true) => None,
            (false, true) => Some(Combinator::And.join(&column_predicates)),
            (true, false) => Some(Combinator::Or.join(&search_predicates)),
            (false, false) => Some(format!(
                "({}) AND ({})",
                Combinator::And.join(&column_predicates),
                Combinator::Or.join(&search_predicates)
            )),
        };
        Ok(clause)
    }

    /// WHERE body built from the entity's own property values. Missing,
    /// null and empty values are skipped.
    pub(crate) fn example_clause(
        &self,
        entity: &Entity,
        combinator: Combinator,
        sink: &mut ParamSink<'_>,
    ) -> QueryResult<Option<String>> {
        let mut predicates = Vec::new();
        for field in &entity.fields {
            let Some(value) = entity.value(&field.name) else {
                continue;
            };
            let Some(predicate) = Predicate::from_value(value)? else {
                continue;
            };
            let condition = predicate.coerce(field.data_type).map_err(|reason| {
                QueryError::invalid_filter(format!(
                    "value '{}' for field '{}': {}",
                    predicate, field.name, reason
                ))
            })?;
            let target = Target::Root(field);
            let operand = self.operand(&target, sink)?;
            predicates.push(self.render_condition(&operand, &condition, target, sink));
        }

        if predicates.is_empty() {
            Ok(None)
        } else {
            Ok(Some(combinator.join(&predicates)))
        }
    }

    /// Render one typed condition, binding its values in text order
    pub(crate) fn render_condition(
        &self,
        operand: &str,
        condition: &Condition,
        target: Target<'_>,
        sink: &mut ParamSink<'_>,
    ) -> String {
        let data_type = target.data_type();
        match condition {
            Condition::IsNull => format!("{} IS NULL", operand),
            Condition::IsNotNull => format!("{} IS NOT NULL", operand),
            Condition::Not(inner) => format!(
                "NOT ({})",
                self.render_condition(operand, inner, target, sink)
            ),
            Condition::Range { lower, upper } => match (lower, upper) {
                (Some(lower), Some(upper)) => {
                    let lower = sink.bind(lower.clone(), data_type);
                    let upper = sink.bind(upper.clone(), data_type);
                    format!("({} >= {} AND {} <= {})", operand, lower, operand, upper)
                }
                (Some(lower), None) => {
                    format!("{} >= {}", operand, sink.bind(lower.clone(), data_type))
                }
                (None, Some(upper)) => {
                    format!("{} <= {}", operand, sink.bind(upper.clone(), data_type))
                }
                // Never produced by `Predicate::coerce`
                (None, None) => "1 = 1".to_string(),
            },
            Condition::In(items) => {
                let placeholders: Vec<String> = items
                    .iter()
                    .map(|item| sink.bind(item.clone(), data_type))
                    .collect();
                format!("{} IN ({})", operand, placeholders.join(", "))
            }
            Condition::Like(text) => {
                format!("{} LIKE {}", operand, sink.bind_wildcard(text.clone()))
            }
            Condition::Equals(value) => {
                format!("{} = {}", operand, sink.bind(value.clone(), data_type))
            }
        }
    }

    /// `alias.key = p` for the entity's key value
    pub(crate) fn key_predicate(
        &self,
        entity: &Entity,
        key_override: Option<&str>,
        sink: &mut ParamSink<'_>,
    ) -> QueryResult<String> {
        let key = entity.require_key()?;
        let column = self.column_ref(&Target::Root(key));
        if let Some(expression) = key_override {
            return Ok(format!("{} = {}", column, expression));
        }

        let (_, value) = entity.require_key_value()?;
        let typed = ParamValue::coerce(value, key.data_type).map_err(|reason| {
            QueryError::invalid_entity(format!(
                "key '{}' of table '{}': {}",
                key.name, entity.table, reason
            ))
        })?;
        Ok(format!("{} = {}", column, sink.bind(typed, key.data_type)))
    }
}
