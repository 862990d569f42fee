//! Search predicate language
//!
//! Search values arrive as plain strings with a small prefix convention:
//!
//! | Wire form            | Predicate                   |
//! |----------------------|-----------------------------|
//! | `NULL`               | `IS NULL`                   |
//! | `NOT_NULL`           | `IS NOT NULL`               |
//! | `NOT_<rest>`         | `NOT (<rest>)`              |
//! | `<lo>_RANGE_<hi>`    | `>= lo AND <= hi`           |
//! | `LIST_a,b,c`         | `IN (a, b, c)`              |
//! | `LIKE_<text>`        | `LIKE %text%`               |
//! | anything else        | `= value`                   |
//!
//! The string is parsed once at the boundary into `Predicate`, and
//! `Display` renders the same wire form back.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::error::{QueryError, QueryResult};
use crate::model::DataType;
use crate::query::params::ParamValue;

const NULL: &str = "NULL";
const NOT_NULL: &str = "NOT_NULL";
const NOT_PREFIX: &str = "NOT_";
const RANGE_INFIX: &str = "_RANGE_";
const LIST_PREFIX: &str = "LIST_";
const LIKE_PREFIX: &str = "LIKE_";

/// Parsed search value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    IsNull,
    IsNotNull,
    Not(Box<Predicate>),
    /// Either bound may be absent, never both
    Range {
        lower: Option<String>,
        upper: Option<String>,
    },
    List(Vec<String>),
    Like(String),
    Equals(String),
}

impl Predicate {
    /// Parse the wire form. Empty input yields `None` (no predicate).
    pub fn parse(input: &str) -> QueryResult<Option<Predicate>> {
        if input.is_empty() {
            return Ok(None);
        }
        Self::parse_non_empty(input).map(Some)
    }

    fn parse_non_empty(input: &str) -> QueryResult<Predicate> {
        if input == NULL {
            return Ok(Predicate::IsNull);
        }
        if input == NOT_NULL {
            return Ok(Predicate::IsNotNull);
        }

        if let Some(rest) = input.strip_prefix(NOT_PREFIX) {
            if rest.is_empty() {
                return Err(QueryError::invalid_filter(format!(
                    "'{}' negates nothing",
                    input
                )));
            }
            return Ok(Predicate::Not(Box::new(Self::parse_non_empty(rest)?)));
        }

        if let Some(pos) = input.find(RANGE_INFIX) {
            let lower = &input[..pos];
            let upper = &input[pos + RANGE_INFIX.len()..];
            let lower = (!lower.trim().is_empty()).then(|| lower.trim().to_string());
            let upper = (!upper.trim().is_empty()).then(|| upper.trim().to_string());
            if lower.is_none() && upper.is_none() {
                return Err(QueryError::invalid_filter(format!(
                    "range '{}' has neither a lower nor an upper bound",
                    input
                )));
            }
            return Ok(Predicate::Range { lower, upper });
        }

        if let Some(rest) = input.strip_prefix(LIST_PREFIX) {
            let items: Vec<String> = rest
                .split(',')
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(str::to_string)
                .collect();
            if items.is_empty() {
                return Err(QueryError::invalid_filter(format!(
                    "list '{}' has no items",
                    input
                )));
            }
            return Ok(Predicate::List(items));
        }

        if let Some(rest) = input.strip_prefix(LIKE_PREFIX) {
            return Ok(Predicate::Like(rest.to_string()));
        }

        Ok(Predicate::Equals(input.to_string()))
    }

    /// Predicate for an entity property value. Strings go through the wire
    /// parser, arrays become lists, scalars become equality. Null and empty
    /// strings yield `None`.
    pub fn from_value(value: &Value) -> QueryResult<Option<Predicate>> {
        match value {
            Value::Null => Ok(None),
            Value::String(s) => Self::parse(s),
            Value::Array(items) => {
                let items: Vec<String> = items
                    .iter()
                    .filter(|v| !v.is_null())
                    .map(scalar_text)
                    .collect();
                if items.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(Predicate::List(items)))
                }
            }
            Value::Object(_) => Err(QueryError::invalid_filter(
                "object values cannot be used as search values",
            )),
            other => Ok(Some(Predicate::Equals(scalar_text(other)))),
        }
    }

    /// Type the payload for a column. Fails with a reason when a value
    /// cannot be represented in `data_type`.
    pub fn coerce(&self, data_type: DataType) -> Result<Condition, String> {
        let typed = |text: &str| ParamValue::coerce(&Value::String(text.to_string()), data_type);

        Ok(match self {
            Predicate::IsNull => Condition::IsNull,
            Predicate::IsNotNull => Condition::IsNotNull,
            Predicate::Not(inner) => Condition::Not(Box::new(inner.coerce(data_type)?)),
            Predicate::Range {
                lower: None,
                upper: None,
            } => return Err("range has neither a lower nor an upper bound".to_string()),
            Predicate::Range { lower, upper } => Condition::Range {
                lower: lower.as_deref().map(typed).transpose()?,
                upper: upper.as_deref().map(typed).transpose()?,
            },
            Predicate::List(items) => Condition::In(
                items
                    .iter()
                    .map(|item| typed(item.as_str()))
                    .collect::<Result<Vec<_>, _>>()?,
            ),
            Predicate::Like(text) => Condition::Like(text.clone()),
            Predicate::Equals(text) => Condition::Equals(typed(text)?),
        })
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl FromStr for Predicate {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)?.ok_or_else(|| QueryError::invalid_filter("empty search value"))
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::IsNull => write!(f, "{}", NULL),
            Predicate::IsNotNull => write!(f, "{}", NOT_NULL),
            Predicate::Not(inner) => write!(f, "{}{}", NOT_PREFIX, inner),
            Predicate::Range { lower, upper } => write!(
                f,
                "{}{}{}",
                lower.as_deref().unwrap_or(""),
                RANGE_INFIX,
                upper.as_deref().unwrap_or("")
            ),
            Predicate::List(items) => write!(f, "{}{}", LIST_PREFIX, items.join(",")),
            Predicate::Like(text) => write!(f, "{}{}", LIKE_PREFIX, text),
            Predicate::Equals(text) => write!(f, "{}", text),
        }
    }
}

// Predicates travel in their wire form inside serialized filters.
impl Serialize for Predicate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Predicate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// Optional predicate field where an empty string means "no predicate"
pub(crate) fn deserialize_optional<'de, D>(deserializer: D) -> Result<Option<Predicate>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        Some(text) => Predicate::parse(&text).map_err(serde::de::Error::custom),
        None => Ok(None),
    }
}

/// A predicate whose values are typed for the target column
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    IsNull,
    IsNotNull,
    Not(Box<Condition>),
    Range {
        lower: Option<ParamValue>,
        upper: Option<ParamValue>,
    },
    In(Vec<ParamValue>),
    /// Raw text; wrapped in wildcards when bound
    Like(String),
    Equals(ParamValue),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(s: &str) -> Predicate {
        s.parse().unwrap()
    }

    #[test]
    fn test_null_literals_win_over_not_prefix() {
        assert_eq!(parse("NULL"), Predicate::IsNull);
        assert_eq!(parse("NOT_NULL"), Predicate::IsNotNull);
    }

    #[test]
    fn test_not_prefix_recurses() {
        assert_eq!(
            parse("NOT_LIKE_abc"),
            Predicate::Not(Box::new(Predicate::Like("abc".to_string())))
        );
        assert_eq!(
            parse("NOT_LIST_1,2"),
            Predicate::Not(Box::new(Predicate::List(vec![
                "1".to_string(),
                "2".to_string()
            ])))
        );
        assert!("NOT_".parse::<Predicate>().is_err());
    }

    #[test]
    fn test_range_bounds() {
        assert_eq!(
            parse("2020-01-01_RANGE_2020-12-31"),
            Predicate::Range {
                lower: Some("2020-01-01".to_string()),
                upper: Some("2020-12-31".to_string()),
            }
        );
        assert_eq!(
            parse("_RANGE_10"),
            Predicate::Range {
                lower: None,
                upper: Some("10".to_string()),
            }
        );
        assert_eq!(
            parse("5_RANGE_"),
            Predicate::Range {
                lower: Some("5".to_string()),
                upper: None,
            }
        );
        assert!(matches!(
            "_RANGE_".parse::<Predicate>(),
            Err(QueryError::InvalidFilter(_))
        ));
    }

    #[test]
    fn test_list_and_like() {
        assert_eq!(
            parse("LIST_1, 2,3"),
            Predicate::List(vec!["1".to_string(), "2".to_string(), "3".to_string()])
        );
        assert!("LIST_".parse::<Predicate>().is_err());
        assert_eq!(parse("LIKE_o'brien"), Predicate::Like("o'brien".to_string()));
        assert_eq!(parse("smith"), Predicate::Equals("smith".to_string()));
    }

    #[test]
    fn test_wire_form_is_preserved() {
        for wire in [
            "NULL",
            "NOT_NULL",
            "NOT_smith",
            "1_RANGE_9",
            "_RANGE_9",
            "LIST_a,b",
            "LIKE_x",
            "plain",
        ] {
            assert_eq!(parse(wire).to_string(), wire);
        }
    }

    #[test]
    fn test_empty_is_no_predicate() {
        assert_eq!(Predicate::parse("").unwrap(), None);
        assert_eq!(Predicate::from_value(&json!("")).unwrap(), None);
        assert_eq!(Predicate::from_value(&Value::Null).unwrap(), None);
    }

    #[test]
    fn test_from_value() {
        assert_eq!(
            Predicate::from_value(&json!(30)).unwrap(),
            Some(Predicate::Equals("30".to_string()))
        );
        assert_eq!(
            Predicate::from_value(&json!([1, 2])).unwrap(),
            Some(Predicate::List(vec!["1".to_string(), "2".to_string()]))
        );
        assert!(Predicate::from_value(&json!({"a": 1})).is_err());
    }

    #[test]
    fn test_coerce_types_payload() {
        let condition = parse("LIST_1,2,3").coerce(DataType::Integer).unwrap();
        assert_eq!(
            condition,
            Condition::In(vec![
                ParamValue::Integer(1),
                ParamValue::Integer(2),
                ParamValue::Integer(3)
            ])
        );

        assert!(parse("smith").coerce(DataType::Integer).is_err());
        assert_eq!(
            parse("LIKE_smi").coerce(DataType::Integer).unwrap(),
            Condition::Like("smi".to_string())
        );
    }

    #[test]
    fn test_serde_uses_wire_form() {
        let json = serde_json::to_string(&parse("LIKE_abc")).unwrap();
        assert_eq!(json, "\"LIKE_abc\"");
        let back: Predicate = serde_json::from_str("\"NOT_NULL\"").unwrap();
        assert_eq!(back, Predicate::IsNotNull);
    }
}
