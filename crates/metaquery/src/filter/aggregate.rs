//! Aggregate descriptors - group-by fields, rollup and aggregate functions

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use crate::error::QueryError;

/// Alias used when a function declares none
pub const DEFAULT_AGGREGATE_ALIAS: &str = "Aggregate";

/// Supported aggregate functions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AggregateFunctionKind {
    Count,
    CountDistinct,
    Sum,
    Avg,
    Min,
    Max,
}

impl fmt::Display for AggregateFunctionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AggregateFunctionKind::Count => write!(f, "COUNT"),
            AggregateFunctionKind::CountDistinct => write!(f, "COUNT_DISTINCT"),
            AggregateFunctionKind::Sum => write!(f, "SUM"),
            AggregateFunctionKind::Avg => write!(f, "AVG"),
            AggregateFunctionKind::Min => write!(f, "MIN"),
            AggregateFunctionKind::Max => write!(f, "MAX"),
        }
    }
}

impl FromStr for AggregateFunctionKind {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "COUNT" => Ok(AggregateFunctionKind::Count),
            "COUNT_DISTINCT" => Ok(AggregateFunctionKind::CountDistinct),
            "SUM" => Ok(AggregateFunctionKind::Sum),
            "AVG" | "AVERAGE" => Ok(AggregateFunctionKind::Avg),
            "MIN" => Ok(AggregateFunctionKind::Min),
            "MAX" => Ok(AggregateFunctionKind::Max),
            _ => Err(QueryError::invalid_filter(format!(
                "unknown aggregate function '{}'",
                s
            ))),
        }
    }
}

/// Comparison operator of a HAVING condition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOperator {
    Equal,
    NotEqual,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
}

impl fmt::Display for CompareOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompareOperator::Equal => write!(f, "="),
            CompareOperator::NotEqual => write!(f, "<>"),
            CompareOperator::GreaterThan => write!(f, ">"),
            CompareOperator::GreaterThanOrEqual => write!(f, ">="),
            CompareOperator::LessThan => write!(f, "<"),
            CompareOperator::LessThanOrEqual => write!(f, "<="),
        }
    }
}

impl FromStr for CompareOperator {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "=" => Ok(CompareOperator::Equal),
            "!=" | "<>" => Ok(CompareOperator::NotEqual),
            ">" => Ok(CompareOperator::GreaterThan),
            ">=" => Ok(CompareOperator::GreaterThanOrEqual),
            "<" => Ok(CompareOperator::LessThan),
            "<=" => Ok(CompareOperator::LessThanOrEqual),
            _ => Err(QueryError::invalid_filter(format!(
                "unsupported HAVING operator '{}'",
                s
            ))),
        }
    }
}

/// One aggregate column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateFunction {
    pub function: AggregateFunctionKind,
    /// Target field; `None` aggregates rows (`COUNT(*)`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub having_operator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub having_value: Option<Value>,
}

impl AggregateFunction {
    pub fn new(function: AggregateFunctionKind, field: Option<&str>) -> Self {
        Self {
            function,
            field: field.map(str::to_string),
            alias: None,
            having_operator: None,
            having_value: None,
        }
    }

    pub fn count() -> Self {
        Self::new(AggregateFunctionKind::Count, None)
    }

    pub fn of(function: AggregateFunctionKind, field: &str) -> Self {
        Self::new(function, Some(field))
    }

    pub fn with_alias(mut self, alias: &str) -> Self {
        self.alias = Some(alias.to_string());
        self
    }

    pub fn having<T: Into<Value>>(mut self, operator: &str, value: T) -> Self {
        self.having_operator = Some(operator.to_string());
        self.having_value = Some(value.into());
        self
    }

    /// Declared alias, or the shared default
    pub fn alias_or_default(&self) -> &str {
        self.alias.as_deref().unwrap_or(DEFAULT_AGGREGATE_ALIAS)
    }
}

/// Group-by / aggregate / HAVING descriptor
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateSpec {
    #[serde(default)]
    pub group_by: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rollup: Option<String>,
    #[serde(default)]
    pub functions: Vec<AggregateFunction>,
}

impl AggregateSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn group_by(mut self, field: &str) -> Self {
        self.group_by.push(field.to_string());
        self
    }

    pub fn rollup(mut self, field: &str) -> Self {
        self.rollup = Some(field.to_string());
        self
    }

    pub fn function(mut self, function: AggregateFunction) -> Self {
        self.functions.push(function);
        self
    }

    /// Result aliases in function order. An alias that is already taken gets
    /// the first free numeric suffix: `Aggregate`, `Aggregate1`, `Aggregate2`.
    pub fn resolved_aliases(&self) -> Vec<String> {
        let mut taken: HashSet<String> = HashSet::new();
        let mut next_suffix: HashMap<&str, usize> = HashMap::new();
        self.functions
            .iter()
            .map(|function| {
                let alias = function.alias_or_default();
                let mut resolved = alias.to_string();
                while taken.contains(&resolved) {
                    let suffix = next_suffix.entry(alias).or_insert(1);
                    resolved = format!("{}{}", alias, suffix);
                    *suffix += 1;
                }
                taken.insert(resolved.clone());
                resolved
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_alias_collision() {
        let spec = AggregateSpec::new()
            .function(AggregateFunction::count())
            .function(AggregateFunction::count())
            .function(AggregateFunction::of(AggregateFunctionKind::Sum, "Total"))
            .function(AggregateFunction::count().with_alias("Orders"));
        assert_eq!(
            spec.resolved_aliases(),
            vec!["Aggregate", "Aggregate1", "Aggregate2", "Orders"]
        );
    }

    #[test]
    fn test_suffix_skips_explicit_alias() {
        let spec = AggregateSpec::new()
            .function(AggregateFunction::count())
            .function(AggregateFunction::count())
            .function(AggregateFunction::count().with_alias("Aggregate1"));
        assert_eq!(
            spec.resolved_aliases(),
            vec!["Aggregate", "Aggregate1", "Aggregate11"]
        );

        let spec = AggregateSpec::new()
            .function(AggregateFunction::count().with_alias("Aggregate1"))
            .function(AggregateFunction::count())
            .function(AggregateFunction::count());
        assert_eq!(
            spec.resolved_aliases(),
            vec!["Aggregate1", "Aggregate", "Aggregate2"]
        );
    }

    #[test]
    fn test_function_kind_parsing() {
        assert_eq!("count".parse::<AggregateFunctionKind>().unwrap(), AggregateFunctionKind::Count);
        assert_eq!("Avg".parse::<AggregateFunctionKind>().unwrap(), AggregateFunctionKind::Avg);
        assert!("MEDIAN".parse::<AggregateFunctionKind>().is_err());
    }

    #[test]
    fn test_compare_operator_parsing() {
        assert_eq!("!=".parse::<CompareOperator>().unwrap(), CompareOperator::NotEqual);
        assert_eq!(CompareOperator::NotEqual.to_string(), "<>");
        assert!("LIKE".parse::<CompareOperator>().is_err());
    }

    #[test]
    fn test_deserialize_spec() {
        let spec: AggregateSpec = serde_json::from_str(
            r#"{
                "group_by": ["Region"],
                "functions": [
                    {"function": "SUM", "field": "Total", "having_operator": ">", "having_value": 100}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(spec.functions[0].function, AggregateFunctionKind::Sum);
        assert_eq!(spec.functions[0].having_value, Some(Value::from(100)));
    }
}
