//! Query Builder ordering and pagination

use super::builder::QueryBuilder;
use super::resolution::{AliasTable, Target};
use crate::backends::core::where_suffix;
use crate::backends::{PagedSelect, Window};
use crate::error::{QueryError, QueryResult};
use crate::filter::{FilterInfo, SortDirection};
use crate::model::Entity;
use crate::query::params::ParamSink;

impl QueryBuilder {
    /// ORDER BY terms requested by the filter, in directive order
    pub(crate) fn sort_terms(
        &self,
        aliases: &AliasTable<'_>,
        filter: &FilterInfo,
        sink: &mut ParamSink<'_>,
    ) -> QueryResult<Vec<String>> {
        filter
            .sort_targets()?
            .into_iter()
            .map(|(column, direction)| {
                let target = aliases.require(&column.data)?;
                Ok(format!("{} {}", self.operand(&target, sink)?, direction))
            })
            .collect()
    }

    /// Ordering for a windowed query: the requested terms, or the key
    /// ascending when the filter names none
    fn window_order(&self, entity: &Entity, order_by: &str) -> QueryResult<String> {
        if !order_by.is_empty() {
            return Ok(order_by.to_string());
        }
        let key = entity.key_field().ok_or_else(|| {
            QueryError::invalid_filter(format!(
                "a paged query on table '{}' needs a sort column or a key field",
                entity.table
            ))
        })?;
        Ok(format!(
            "{} {}",
            self.column_ref(&Target::Root(key)),
            SortDirection::Asc
        ))
    }

    /// Assemble a listing query, windowed when the filter asks for a page
    pub(crate) fn paged_select(
        &self,
        entity: &Entity,
        select: PagedSelect,
        filter: Option<&FilterInfo>,
    ) -> QueryResult<String> {
        match filter {
            Some(filter) if filter.is_windowed() => {
                let window = Window::new(filter.start, filter.length).ok_or_else(|| {
                    QueryError::invalid_filter(format!(
                        "page of {} rows starting at row {} is out of range",
                        filter.length, filter.start
                    ))
                })?;
                let order_by = self.window_order(entity, &select.order_by)?;
                let select = PagedSelect { order_by, ..select };
                Ok(self.dialect.paginate(&select, window))
            }
            _ => {
                let mut sql = format!(
                    "SELECT {} {}{}",
                    select.projection,
                    select.from,
                    where_suffix(select.filter.as_deref())
                );
                if !select.order_by.is_empty() {
                    sql.push_str(" ORDER BY ");
                    sql.push_str(&select.order_by);
                }
                Ok(sql)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{ColumnSpec, SortSpec};
    use crate::model::{DataType, Field};

    fn select(order_by: &str) -> PagedSelect {
        PagedSelect {
            projection: "t0.Id, t0.Name".to_string(),
            from: "FROM People t0".to_string(),
            filter: None,
            order_by: order_by.to_string(),
        }
    }

    fn people() -> Entity {
        Entity::new("People")
            .with_field(Field::key("Id", DataType::Integer))
            .with_field(Field::new("Name", DataType::Text))
    }

    #[test]
    fn test_sort_terms_follow_directives() {
        let builder = QueryBuilder::sql_server();
        let entity = people();
        let aliases = AliasTable::new(&entity);
        let mut sink = builder.sink();
        let filter = FilterInfo::new()
            .with_column(ColumnSpec::new("Id"))
            .with_column(ColumnSpec::new("Name"))
            .sort_by(SortSpec::desc(1))
            .sort_by(SortSpec::asc(0));
        assert_eq!(
            builder.sort_terms(&aliases, &filter, &mut sink).unwrap(),
            vec!["t0.Name DESC", "t0.Id ASC"]
        );
    }

    #[test]
    fn test_window_defaults_to_key_order() {
        let builder = QueryBuilder::oracle();
        let filter = FilterInfo::new().page(0, 5);
        let sql = builder
            .paged_select(&people(), select(""), Some(&filter))
            .unwrap();
        assert_eq!(
            sql,
            "SELECT t0.Id, t0.Name FROM People t0 ORDER BY t0.Id ASC OFFSET 0 ROWS FETCH NEXT 5 ROWS ONLY"
        );
    }

    #[test]
    fn test_window_without_order_is_rejected() {
        let builder = QueryBuilder::sql_server();
        let keyless = Entity::new("Log").with_field(Field::new("Message", DataType::Text));
        let filter = FilterInfo::new().page(10, 10);
        assert!(matches!(
            builder.paged_select(&keyless, select(""), Some(&filter)),
            Err(QueryError::InvalidFilter(_))
        ));
    }

    #[test]
    fn test_window_bounds_past_u64_are_rejected() {
        let filter = FilterInfo::new().page(u64::MAX - 5, 10);
        for builder in [QueryBuilder::sql_server(), QueryBuilder::oracle()] {
            assert!(matches!(
                builder.paged_select(&people(), select("t0.Name ASC"), Some(&filter)),
                Err(QueryError::InvalidFilter(_))
            ));
        }

        let last_page = FilterInfo::new().page(u64::MAX - 10, 10);
        let sql = QueryBuilder::sql_server()
            .paged_select(&people(), select("t0.Name ASC"), Some(&last_page))
            .unwrap();
        assert!(sql.ends_with(&format!(
            "BETWEEN {} AND {} ORDER BY paged.RowNum",
            u64::MAX - 9,
            u64::MAX
        )));
    }

    #[test]
    fn test_unbounded_length_has_no_window() {
        let builder = QueryBuilder::sql_server();
        let filter = FilterInfo::new().page(20, 0);
        let sql = builder
            .paged_select(&people(), select("t0.Name ASC"), Some(&filter))
            .unwrap();
        assert_eq!(sql, "SELECT t0.Id, t0.Name FROM People t0 ORDER BY t0.Name ASC");
    }
}
