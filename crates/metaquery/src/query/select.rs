//! Query Builder SELECT operations

use super::builder::QueryBuilder;
use super::resolution::{AliasTable, ROOT_ALIAS};
use super::types::Combinator;
use crate::backends::core::where_suffix;
use crate::backends::PagedSelect;
use crate::error::{QueryError, QueryResult};
use crate::filter::FilterInfo;
use crate::model::{DataType, Entity};
use crate::query::params::{ParamSink, Statement};

impl QueryBuilder {
    /// Listing query. Without a filter every row is returned in storage
    /// order; with one, its predicates, sort and window apply.
    pub fn select(&self, entity: &Entity, filter: Option<&FilterInfo>) -> QueryResult<Statement> {
        self.build("select", entity, || {
            let aliases = AliasTable::new(entity);
            let mut sink = self.sink();
            let projection = self.projection(entity, &aliases, &mut sink)?;
            let from = self.from_clause(entity, &aliases)?;

            let (where_clause, order_by) = match filter {
                Some(filter) => (
                    self.filter_clause(&aliases, filter, &mut sink)?,
                    self.sort_terms(&aliases, filter, &mut sink)?.join(", "),
                ),
                None => (None, String::new()),
            };

            let select = PagedSelect {
                projection,
                from,
                filter: where_clause,
                order_by,
            };
            let sql = self.paged_select(entity, select, filter)?;
            self.finish(sql, sink)
        })
    }

    /// Single row by the entity's key value
    pub fn select_by_key(&self, entity: &Entity) -> QueryResult<Statement> {
        self.build("select_by_key", entity, || {
            let aliases = AliasTable::new(entity);
            let mut sink = self.sink();
            let projection = self.projection(entity, &aliases, &mut sink)?;
            let from = self.from_clause(entity, &aliases)?;
            let predicate = self.key_predicate(entity, None, &mut sink)?;
            let sql = format!("SELECT {} {} WHERE {}", projection, from, predicate);
            self.finish(sql, sink)
        })
    }

    /// Rows matching the entity's non-empty property values. Each value is
    /// read through the search predicate language.
    pub fn select_by_example(
        &self,
        entity: &Entity,
        combinator: Combinator,
    ) -> QueryResult<Statement> {
        self.build("select_by_example", entity, || {
            let aliases = AliasTable::new(entity);
            let mut sink = self.sink();
            let projection = self.projection(entity, &aliases, &mut sink)?;
            let from = self.from_clause(entity, &aliases)?;
            let where_clause = self.example_clause(entity, combinator, &mut sink)?;
            let sql = format!(
                "SELECT {} {}{}",
                projection,
                from,
                where_suffix(where_clause.as_deref())
            );
            self.finish(sql, sink)
        })
    }

    /// Row count over the joined source. With a filter, only its
    /// predicates apply; run it without one for the unfiltered total.
    pub fn count(&self, entity: &Entity, filter: Option<&FilterInfo>) -> QueryResult<Statement> {
        self.build("count", entity, || {
            let aliases = AliasTable::new(entity);
            let mut sink = self.sink();
            let from = self.from_clause(entity, &aliases)?;
            let where_clause = match filter {
                Some(filter) => self.filter_clause(&aliases, filter, &mut sink)?,
                None => None,
            };
            let sql = format!(
                "SELECT COUNT(*) AS Total {}{}",
                from,
                where_suffix(where_clause.as_deref())
            );
            self.finish(sql, sink)
        })
    }

    /// Comma-separated projection: visible root fields, then every column
    /// pulled in by a join
    pub(crate) fn projection(
        &self,
        entity: &Entity,
        aliases: &AliasTable<'_>,
        sink: &mut ParamSink<'_>,
    ) -> QueryResult<String> {
        let mut columns = Vec::new();

        for field in entity.fields.iter().filter(|f| f.is_projected()) {
            let column = self.qualify(ROOT_ALIAS, field.column_name());
            let projected = match field.data_type {
                DataType::Date => format!(
                    "{} AS {}",
                    self.dialect.date_to_string(&column),
                    self.ident(&field.name)
                ),
                DataType::Encrypted => format!(
                    "{} AS {}",
                    self.read_expression(field, column, sink)?,
                    self.ident(&field.name)
                ),
                _ if field.column_name() != field.name => {
                    format!("{} AS {}", column, self.ident(&field.name))
                }
                _ => column,
            };
            columns.push(projected);
        }

        for table in aliases.joins() {
            for column in &table.columns {
                let source = self.qualify(&table.alias, &column.source);
                columns.push(match &column.alias {
                    Some(alias) => format!("{} AS {}", source, self.ident(alias)),
                    None => source,
                });
            }
        }

        if columns.is_empty() {
            return Err(QueryError::invalid_entity(format!(
                "table '{}' has no visible columns to select",
                entity.table
            )));
        }
        Ok(columns.join(", "))
    }

    /// `FROM table t0` followed by one join per joined field
    pub(crate) fn from_clause(
        &self,
        entity: &Entity,
        aliases: &AliasTable<'_>,
    ) -> QueryResult<String> {
        let mut from = format!("FROM {} {}", self.table_name(entity), ROOT_ALIAS);
        for (index, table) in aliases.joins().iter().enumerate() {
            let local = aliases.join_source(index)?;
            from.push_str(&format!(
                " {} {} {} ON {} = {}",
                table.join.direction,
                self.table_ident(&table.join.table),
                table.alias,
                self.qualify(&table.alias, &table.join.on_column),
                self.column_ref(&local)
            ));
        }
        Ok(from)
    }
}
