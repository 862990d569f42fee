//! Query Builder aggregate operations - GROUP BY, ROLLUP and HAVING

use super::builder::QueryBuilder;
use super::resolution::{AliasTable, Target};
use super::types::AggregateSource;
use crate::backends::core::where_suffix;
use crate::error::{QueryError, QueryResult};
use crate::filter::{AggregateFunction, AggregateFunctionKind, AggregateSpec, CompareOperator};
use crate::model::{DataType, Entity};
use crate::query::params::{ParamSink, ParamValue, Statement};

impl QueryBuilder {
    /// Grouped aggregate query. Group fields are projected first, then one
    /// column per aggregate function; the WHERE clause comes from `source`.
    pub fn aggregate(
        &self,
        entity: &Entity,
        spec: &AggregateSpec,
        source: AggregateSource<'_>,
    ) -> QueryResult<Statement> {
        self.build("aggregate", entity, || {
            if spec.group_by.is_empty() && spec.rollup.is_none() && spec.functions.is_empty() {
                return Err(QueryError::invalid_filter(format!(
                    "aggregate on table '{}' has no group fields and no functions",
                    entity.table
                )));
            }

            let aliases = AliasTable::new(entity);
            let mut sink = self.sink();
            let mut projection = Vec::new();

            let mut group_names: Vec<&str> = spec.group_by.iter().map(String::as_str).collect();
            if let Some(rollup) = spec.rollup.as_deref() {
                if !group_names.contains(&rollup) {
                    group_names.push(rollup);
                }
            }

            let mut group_terms = Vec::with_capacity(group_names.len());
            for name in &group_names {
                let target = aliases.require(name)?;
                let operand = self.operand(&target, &mut sink)?;
                projection.push(format!(
                    "{} AS {}",
                    operand,
                    self.ident(target.column_name())
                ));
                group_terms.push(operand);
            }

            if let Some(rollup) = spec.rollup.as_deref() {
                let target = aliases.require(rollup)?;
                let operand = self.operand(&target, &mut sink)?;
                projection.push(format!(
                    "GROUPING({}) AS {}",
                    operand,
                    self.ident(&format!("{}Grouping", rollup))
                ));
            }

            let mut calls = Vec::with_capacity(spec.functions.len());
            for (function, alias) in spec.functions.iter().zip(spec.resolved_aliases()) {
                let (call, target) = self.aggregate_call(&aliases, function, &mut sink)?;
                projection.push(format!("{} AS {}", call, self.ident(&alias)));
                calls.push((function, call, target));
            }

            // WHERE binds before HAVING so placeholders follow text order
            let where_clause = match source {
                AggregateSource::Example(combinator) => {
                    self.example_clause(entity, combinator, &mut sink)?
                }
                AggregateSource::Filter(filter) => self.filter_clause(&aliases, filter, &mut sink)?,
            };

            let mut having = Vec::new();
            for (function, call, target) in calls {
                if let Some(condition) = self.having_condition(&call, function, target, &mut sink)? {
                    having.push(condition);
                }
            }

            let from = self.from_clause(entity, &aliases)?;
            let mut sql = format!(
                "SELECT {} {}{}",
                projection.join(", "),
                from,
                where_suffix(where_clause.as_deref())
            );
            if !group_terms.is_empty() {
                if spec.rollup.is_some() {
                    sql.push_str(&format!(" GROUP BY ROLLUP({})", group_terms.join(", ")));
                } else {
                    sql.push_str(&format!(" GROUP BY {}", group_terms.join(", ")));
                }
            }
            if !having.is_empty() {
                sql.push_str(" HAVING ");
                sql.push_str(&having.join(" AND "));
            }

            self.finish(sql, sink)
        })
    }

    /// `FUNC(expr)` for one aggregate function, with the target it reads
    fn aggregate_call<'a>(
        &self,
        aliases: &'a AliasTable<'_>,
        function: &AggregateFunction,
        sink: &mut ParamSink<'_>,
    ) -> QueryResult<(String, Option<Target<'a>>)> {
        let Some(name) = function.field.as_deref() else {
            return match function.function {
                AggregateFunctionKind::Count => Ok(("COUNT(*)".to_string(), None)),
                kind => Err(QueryError::invalid_filter(format!(
                    "aggregate function {} needs a field",
                    kind
                ))),
            };
        };

        let target = aliases.require(name)?;
        let operand = self.operand(&target, sink)?;
        let call = match function.function {
            AggregateFunctionKind::Count => format!("COUNT({})", operand),
            AggregateFunctionKind::CountDistinct => format!("COUNT(DISTINCT {})", operand),
            AggregateFunctionKind::Sum => format!("SUM({})", operand),
            AggregateFunctionKind::Avg => format!("AVG({})", operand),
            AggregateFunctionKind::Min => format!("MIN({})", operand),
            AggregateFunctionKind::Max => format!("MAX({})", operand),
        };
        Ok((call, Some(target)))
    }

    /// `FUNC(expr) op p` when the function declares both a HAVING operator
    /// and a non-null value
    fn having_condition(
        &self,
        call: &str,
        function: &AggregateFunction,
        target: Option<Target<'_>>,
        sink: &mut ParamSink<'_>,
    ) -> QueryResult<Option<String>> {
        let (Some(operator), Some(value)) = (
            function.having_operator.as_deref(),
            function.having_value.as_ref().filter(|v| !v.is_null()),
        ) else {
            return Ok(None);
        };
        let operator: CompareOperator = operator.parse()?;

        let data_type = match function.function {
            AggregateFunctionKind::Count | AggregateFunctionKind::CountDistinct => {
                DataType::Integer
            }
            AggregateFunctionKind::Avg => DataType::Decimal,
            _ => target.map(Target::data_type).unwrap_or(DataType::Decimal),
        };
        let typed = ParamValue::coerce(value, data_type).map_err(|reason| {
            QueryError::invalid_filter(format!(
                "HAVING value for {}: {}",
                function.alias_or_default(),
                reason
            ))
        })?;

        Ok(Some(format!(
            "{} {} {}",
            call,
            operator,
            sink.bind(typed, data_type)
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{ColumnSpec, FilterInfo};
    use crate::model::{Field, JoinSpec};
    use crate::query::types::Combinator;

    fn sales() -> Entity {
        Entity::new("Sales")
            .with_field(Field::key("Id", DataType::Integer))
            .with_field(Field::new("Region", DataType::Text).with_db_name("region_code"))
            .with_field(Field::new("Amount", DataType::Decimal))
            .with_field(
                Field::new("ProductId", DataType::Integer)
                    .with_join(JoinSpec::inner("Products", "Id").pull("Category")),
            )
    }

    #[test]
    fn test_group_and_default_aliases() {
        let spec = AggregateSpec::new()
            .group_by("Region")
            .function(AggregateFunction::count())
            .function(AggregateFunction::of(AggregateFunctionKind::Sum, "Amount"));
        let statement = QueryBuilder::sql_server()
            .aggregate(&sales(), &spec, AggregateSource::Example(Combinator::And))
            .unwrap();
        assert_eq!(
            statement.sql,
            "SELECT t0.region_code AS region_code, COUNT(*) AS Aggregate, SUM(t0.Amount) AS Aggregate1 \
             FROM Sales t0 INNER JOIN Products j0 ON j0.Id = t0.ProductId \
             GROUP BY t0.region_code"
        );
    }

    #[test]
    fn test_rollup_over_join_column() {
        let spec = AggregateSpec::new()
            .group_by("Region")
            .rollup("Category")
            .function(AggregateFunction::of(AggregateFunctionKind::Max, "Amount").with_alias("Top"));
        let statement = QueryBuilder::oracle()
            .aggregate(&sales(), &spec, AggregateSource::Example(Combinator::And))
            .unwrap();
        assert_eq!(
            statement.sql,
            "SELECT t0.region_code AS region_code, j0.Category AS Category, \
             GROUPING(j0.Category) AS CategoryGrouping, MAX(t0.Amount) AS Top \
             FROM Sales t0 INNER JOIN Products j0 ON j0.Id = t0.ProductId \
             GROUP BY ROLLUP(t0.region_code, j0.Category)"
        );
    }

    #[test]
    fn test_having_binds_after_where() {
        let spec = AggregateSpec::new()
            .group_by("Region")
            .function(AggregateFunction::count().having(">=", 5))
            .function(AggregateFunction::of(AggregateFunctionKind::Avg, "Amount").having("!=", "2.5"));
        let filter = FilterInfo::new()
            .with_column(ColumnSpec::new("Region").with_search_text("EU").unwrap());
        let statement = QueryBuilder::sql_server()
            .aggregate(&sales(), &spec, AggregateSource::Filter(&filter))
            .unwrap();
        assert!(statement.sql.ends_with(
            "WHERE t0.region_code = @p0 GROUP BY t0.region_code \
             HAVING COUNT(*) >= @p1 AND AVG(t0.Amount) <> @p2"
        ));
        assert_eq!(statement.params[0].value, ParamValue::Text("EU".to_string()));
        assert_eq!(statement.params[1].value, ParamValue::Integer(5));
    }

    #[test]
    fn test_invalid_aggregates() {
        let builder = QueryBuilder::sql_server();
        let source = AggregateSource::Example(Combinator::And);

        assert!(matches!(
            builder.aggregate(&sales(), &AggregateSpec::new(), source),
            Err(QueryError::InvalidFilter(_))
        ));

        let fieldless_sum = AggregateSpec::new()
            .function(AggregateFunction::new(AggregateFunctionKind::Sum, None));
        assert!(matches!(
            builder.aggregate(&sales(), &fieldless_sum, source),
            Err(QueryError::InvalidFilter(_))
        ));

        let bad_having = AggregateSpec::new().function(AggregateFunction::count().having("~", 1));
        assert!(matches!(
            builder.aggregate(&sales(), &bad_having, source),
            Err(QueryError::InvalidFilter(_))
        ));

        let unknown = AggregateSpec::new().group_by("Nope");
        assert!(matches!(
            builder.aggregate(&sales(), &unknown, source),
            Err(QueryError::InvalidFilter(_))
        ));
    }
}
