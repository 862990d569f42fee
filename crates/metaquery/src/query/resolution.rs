//! Column resolution for one statement
//!
//! The root table is always aliased `t0`; every field carrying a join gets
//! the next `jK` alias in declaration order. A name used by a filter,
//! sort or aggregate resolves in this order:
//!
//! 1. a join column declared as the plain name `N` → `jK.N`
//! 2. a join column declared as `L AS N` → `jK.L`
//! 3. an entity field named `N` → `t0.<db name>`
//!
//! The local side of a join condition resolves the same way, but only
//! sees the joins declared before it.

use crate::error::{QueryError, QueryResult};
use crate::model::{DataType, Entity, Field, JoinColumn, JoinSpec};
use crate::query::builder::QueryBuilder;
use crate::query::params::ParamSink;

/// Fixed alias of the root table
pub const ROOT_ALIAS: &str = "t0";

/// One joined table
#[derive(Debug, Clone)]
pub(crate) struct JoinedTable<'e> {
    pub(crate) alias: String,
    pub(crate) field: &'e Field,
    pub(crate) join: &'e JoinSpec,
    pub(crate) columns: Vec<JoinColumn>,
}

/// What a name resolved to
#[derive(Debug, Clone, Copy)]
pub(crate) enum Target<'a> {
    Root(&'a Field),
    Joined {
        alias: &'a str,
        column: &'a JoinColumn,
    },
}

impl<'a> Target<'a> {
    /// Type used to coerce values compared against the column. Joined
    /// columns carry no metadata and compare as text.
    pub(crate) fn data_type(self) -> DataType {
        match self {
            Target::Root(field) => field.data_type,
            Target::Joined { .. } => DataType::Text,
        }
    }

    /// Physical column name, without alias
    pub(crate) fn column_name(self) -> &'a str {
        match self {
            Target::Root(field) => field.column_name(),
            Target::Joined { column, .. } => &column.source,
        }
    }
}

/// Per-statement alias table
#[derive(Debug)]
pub(crate) struct AliasTable<'e> {
    joins: Vec<JoinedTable<'e>>,
    entity: &'e Entity,
}

impl<'e> AliasTable<'e> {
    pub(crate) fn new(entity: &'e Entity) -> Self {
        let joins = entity
            .fields
            .iter()
            .filter_map(|field| field.join.as_ref().map(|join| (field, join)))
            .enumerate()
            .map(|(index, (field, join))| JoinedTable {
                alias: format!("j{}", index),
                field,
                join,
                columns: join.columns(),
            })
            .collect();
        Self { joins, entity }
    }

    pub(crate) fn joins(&self) -> &[JoinedTable<'e>] {
        &self.joins
    }

    pub(crate) fn resolve(&self, name: &str) -> Option<Target<'_>> {
        self.resolve_within(&self.joins, name)
    }

    fn resolve_within<'a>(
        &'a self,
        joins: &'a [JoinedTable<'e>],
        name: &str,
    ) -> Option<Target<'a>> {
        Self::find_joined(joins, |column| column.alias.is_none() && column.source == name)
            .or_else(|| Self::find_joined(joins, |column| column.alias.as_deref() == Some(name)))
            .or_else(|| self.entity.field(name).map(Target::Root))
    }

    fn find_joined<'a, F>(joins: &'a [JoinedTable<'e>], matches: F) -> Option<Target<'a>>
    where
        F: Fn(&JoinColumn) -> bool,
    {
        joins.iter().find_map(|table| {
            table
                .columns
                .iter()
                .find(|column| matches(column))
                .map(|column| Target::Joined {
                    alias: table.alias.as_str(),
                    column,
                })
        })
    }

    /// Column the join at `index` matches its `on_column` against: the
    /// owning field by default, or `local_column` resolved over the root
    /// fields and the joins declared before it
    pub(crate) fn join_source(&self, index: usize) -> QueryResult<Target<'_>> {
        let table = &self.joins[index];
        let Some(local) = table.join.local_column.as_deref() else {
            return Ok(Target::Root(table.field));
        };
        self.resolve_within(&self.joins[..index], local).ok_or_else(|| {
            QueryError::invalid_entity(format!(
                "join on '{}' reads '{}', which matches no field or earlier join column of table '{}'",
                table.join.table, local, self.entity.table
            ))
        })
    }

    /// Resolve a name coming from a filter or aggregate descriptor
    pub(crate) fn require(&self, name: &str) -> QueryResult<Target<'_>> {
        self.resolve(name).ok_or_else(|| {
            QueryError::invalid_filter(format!(
                "column '{}' matches no field or join column of table '{}'",
                name, self.entity.table
            ))
        })
    }
}

impl QueryBuilder {
    /// Qualified column reference of a target
    pub(crate) fn column_ref(&self, target: &Target<'_>) -> String {
        match target {
            Target::Root(field) => self.qualify(ROOT_ALIAS, field.column_name()),
            Target::Joined { alias, column } => self.qualify(alias, &column.source),
        }
    }

    /// Expression a predicate, sort or group term reads the target through
    pub(crate) fn operand(
        &self,
        target: &Target<'_>,
        sink: &mut ParamSink<'_>,
    ) -> QueryResult<String> {
        let column = self.column_ref(target);
        match target {
            Target::Root(field) => self.read_expression(field, column, sink),
            Target::Joined { .. } => Ok(column),
        }
    }
}
