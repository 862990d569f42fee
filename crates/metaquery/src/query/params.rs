//! Bound parameters and finished statements
//!
//! A `Statement` owns its parameter list. Names are positional (`p0`,
//! `p1`, ...) and follow the order in which placeholders were written into
//! the SQL text, so an execution port can bind strictly in list order.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value;
use std::fmt;

use crate::backends::SqlDialect;
use crate::model::DataType;

/// Typed value of a bound parameter
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Null,
    Text(String),
    Integer(i64),
    Decimal(f64),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Boolean(bool),
    Binary(Vec<u8>),
}

impl ParamValue {
    pub fn is_null(&self) -> bool {
        matches!(self, ParamValue::Null)
    }

    /// Coerce a loosely typed JSON value into the representation of `data_type`.
    ///
    /// Returns a human-readable reason on failure; callers decide which
    /// error kind it becomes.
    pub fn coerce(value: &Value, data_type: DataType) -> Result<ParamValue, String> {
        if value.is_null() {
            return Ok(ParamValue::Null);
        }

        match data_type {
            DataType::Text | DataType::Encrypted => match value {
                Value::String(s) => Ok(ParamValue::Text(s.clone())),
                Value::Number(n) => Ok(ParamValue::Text(n.to_string())),
                Value::Bool(b) => Ok(ParamValue::Text(b.to_string())),
                _ => Err(format!("cannot use {} as text", value)),
            },
            DataType::Integer => match value {
                Value::Number(n) => n
                    .as_i64()
                    .map(ParamValue::Integer)
                    .ok_or_else(|| format!("{} is not an integer", n)),
                Value::String(s) => s
                    .trim()
                    .parse::<i64>()
                    .map(ParamValue::Integer)
                    .map_err(|_| format!("'{}' is not an integer", s)),
                _ => Err(format!("cannot use {} as integer", value)),
            },
            DataType::Decimal => match value {
                Value::Number(n) => n
                    .as_f64()
                    .map(ParamValue::Decimal)
                    .ok_or_else(|| format!("{} is not a decimal", n)),
                Value::String(s) => s
                    .trim()
                    .parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite())
                    .map(ParamValue::Decimal)
                    .ok_or_else(|| format!("'{}' is not a decimal", s)),
                _ => Err(format!("cannot use {} as decimal", value)),
            },
            DataType::Boolean => match value {
                Value::Bool(b) => Ok(ParamValue::Boolean(*b)),
                Value::Number(n) => match n.as_i64() {
                    Some(0) => Ok(ParamValue::Boolean(false)),
                    Some(1) => Ok(ParamValue::Boolean(true)),
                    _ => Err(format!("{} is not a boolean", n)),
                },
                Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                    "true" | "1" | "yes" | "y" => Ok(ParamValue::Boolean(true)),
                    "false" | "0" | "no" | "n" => Ok(ParamValue::Boolean(false)),
                    _ => Err(format!("'{}' is not a boolean", s)),
                },
                _ => Err(format!("cannot use {} as boolean", value)),
            },
            DataType::Date => match value {
                Value::String(s) => parse_date_time(s)
                    .map(|dt| ParamValue::Date(dt.date()))
                    .ok_or_else(|| format!("'{}' is not a date", s)),
                _ => Err(format!("cannot use {} as date", value)),
            },
            DataType::DateTime => match value {
                Value::String(s) => parse_date_time(s)
                    .map(ParamValue::DateTime)
                    .ok_or_else(|| format!("'{}' is not a date/time", s)),
                _ => Err(format!("cannot use {} as date/time", value)),
            },
            DataType::Binary => match value {
                Value::String(s) => {
                    let digits = s.trim();
                    let digits = digits
                        .strip_prefix("0x")
                        .or_else(|| digits.strip_prefix("0X"))
                        .unwrap_or(digits);
                    hex::decode(digits)
                        .map(ParamValue::Binary)
                        .map_err(|e| format!("'{}' is not hex-encoded binary: {}", s, e))
                }
                Value::Array(items) => items
                    .iter()
                    .map(|item| {
                        item.as_u64()
                            .and_then(|b| u8::try_from(b).ok())
                            .ok_or_else(|| format!("{} is not a byte", item))
                    })
                    .collect::<Result<Vec<u8>, String>>()
                    .map(ParamValue::Binary),
                _ => Err(format!("cannot use {} as binary", value)),
            },
        }
    }

    /// Convert to JSON value
    pub fn to_json(&self) -> Value {
        match self {
            ParamValue::Null => Value::Null,
            ParamValue::Text(s) => Value::String(s.clone()),
            ParamValue::Integer(i) => Value::from(*i),
            ParamValue::Decimal(f) => serde_json::Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            ParamValue::Date(d) => Value::String(d.format("%Y-%m-%d").to_string()),
            ParamValue::DateTime(dt) => {
                Value::String(dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string())
            }
            ParamValue::Boolean(b) => Value::Bool(*b),
            ParamValue::Binary(bytes) => Value::String(hex::encode(bytes)),
        }
    }
}

/// Accepts RFC 3339, ISO-8601 without offset (`T` or space separated) and
/// plain dates (midnight).
fn parse_date_time(input: &str) -> Option<NaiveDateTime> {
    let s = input.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_local());
    }
    const FORMATS: [&str; 4] = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ];
    for format in FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Text(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Text(value)
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        ParamValue::Integer(value)
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        ParamValue::Boolean(value)
    }
}

impl From<NaiveDate> for ParamValue {
    fn from(value: NaiveDate) -> Self {
        ParamValue::Date(value)
    }
}

/// Whether the execution port sends or receives the value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterDirection {
    Input,
    /// Filled by the database (Oracle `RETURNING ... INTO`)
    Output,
}

/// One named, typed value bound into a statement
#[derive(Debug, Clone, PartialEq)]
pub struct BoundParameter {
    pub name: String,
    pub value: ParamValue,
    pub data_type: DataType,
    /// Value is matched as a substring pattern (`%value%`)
    pub wildcard: bool,
    pub direction: ParameterDirection,
}

impl BoundParameter {
    /// Value the execution port hands to the driver. Wildcard text is wrapped
    /// in `%`; the raw text in `value` is left untouched.
    pub fn bind_value(&self) -> ParamValue {
        match (&self.value, self.wildcard) {
            (ParamValue::Text(text), true) => ParamValue::Text(format!("%{}%", text)),
            (value, _) => value.clone(),
        }
    }

    pub fn is_output(&self) -> bool {
        self.direction == ParameterDirection::Output
    }
}

/// Generated SQL text with its ordered parameter list
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<BoundParameter>,
}

impl Statement {
    /// Look up a parameter by name
    pub fn param(&self, name: &str) -> Option<&BoundParameter> {
        self.params.iter().find(|p| p.name == name)
    }

    /// Values to bind, in placeholder order
    pub fn bind_values(&self) -> Vec<ParamValue> {
        self.params.iter().map(BoundParameter::bind_value).collect()
    }

    pub fn output_params(&self) -> impl Iterator<Item = &BoundParameter> {
        self.params.iter().filter(|p| p.is_output())
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.sql)
    }
}

/// Parameter accumulator shared by every clause of one statement.
///
/// Each `bind*` call appends a parameter and returns the dialect placeholder
/// to splice into the SQL text; callers must emit placeholders in the order
/// they were bound.
pub(crate) struct ParamSink<'d> {
    dialect: &'d dyn SqlDialect,
    params: Vec<BoundParameter>,
    uses_encryption: bool,
}

impl<'d> ParamSink<'d> {
    pub(crate) fn new(dialect: &'d dyn SqlDialect) -> Self {
        Self {
            dialect,
            params: Vec::new(),
            uses_encryption: false,
        }
    }

    fn push(
        &mut self,
        value: ParamValue,
        data_type: DataType,
        wildcard: bool,
        direction: ParameterDirection,
    ) -> String {
        let name = format!("p{}", self.params.len());
        let placeholder = self.dialect.placeholder(&name);
        self.params.push(BoundParameter {
            name,
            value,
            data_type: data_type.parameter_type(),
            wildcard,
            direction,
        });
        placeholder
    }

    pub(crate) fn bind(&mut self, value: ParamValue, data_type: DataType) -> String {
        self.push(value, data_type, false, ParameterDirection::Input)
    }

    pub(crate) fn bind_wildcard(&mut self, text: String) -> String {
        self.push(
            ParamValue::Text(text),
            DataType::Text,
            true,
            ParameterDirection::Input,
        )
    }

    pub(crate) fn bind_output(&mut self, data_type: DataType) -> String {
        self.push(
            ParamValue::Null,
            data_type,
            false,
            ParameterDirection::Output,
        )
    }

    pub(crate) fn mark_encryption(&mut self) {
        self.uses_encryption = true;
    }

    pub(crate) fn uses_encryption(&self) -> bool {
        self.uses_encryption
    }

    pub(crate) fn finish(self, sql: String) -> Statement {
        Statement {
            sql,
            params: self.params,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_coerce_text() {
        assert_eq!(
            ParamValue::coerce(&json!("o'brien"), DataType::Text),
            Ok(ParamValue::Text("o'brien".to_string()))
        );
        assert_eq!(
            ParamValue::coerce(&json!(30), DataType::Text),
            Ok(ParamValue::Text("30".to_string()))
        );
    }

    #[test]
    fn test_coerce_numbers() {
        assert_eq!(
            ParamValue::coerce(&json!("30"), DataType::Integer),
            Ok(ParamValue::Integer(30))
        );
        assert_eq!(
            ParamValue::coerce(&json!(12.5), DataType::Decimal),
            Ok(ParamValue::Decimal(12.5))
        );
        assert!(ParamValue::coerce(&json!("smith"), DataType::Integer).is_err());
        assert!(ParamValue::coerce(&json!(1.5), DataType::Integer).is_err());
        assert!(ParamValue::coerce(&json!("NaN"), DataType::Decimal).is_err());
    }

    #[test]
    fn test_coerce_dates() {
        let date = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        assert_eq!(
            ParamValue::coerce(&json!("2020-01-01"), DataType::Date),
            Ok(ParamValue::Date(date))
        );
        assert_eq!(
            ParamValue::coerce(&json!("2020-01-01T10:30:00"), DataType::DateTime),
            Ok(ParamValue::DateTime(date.and_hms_opt(10, 30, 0).unwrap()))
        );
        assert_eq!(
            ParamValue::coerce(&json!("2020-01-01"), DataType::DateTime),
            Ok(ParamValue::DateTime(date.and_hms_opt(0, 0, 0).unwrap()))
        );
        assert!(ParamValue::coerce(&json!("yesterday"), DataType::Date).is_err());
    }

    #[test]
    fn test_coerce_boolean_and_binary() {
        assert_eq!(
            ParamValue::coerce(&json!("Yes"), DataType::Boolean),
            Ok(ParamValue::Boolean(true))
        );
        assert_eq!(
            ParamValue::coerce(&json!(0), DataType::Boolean),
            Ok(ParamValue::Boolean(false))
        );
        assert_eq!(
            ParamValue::coerce(&json!("0xCAFE"), DataType::Binary),
            Ok(ParamValue::Binary(vec![0xca, 0xfe]))
        );
        assert_eq!(
            ParamValue::coerce(&json!([1, 2]), DataType::Binary),
            Ok(ParamValue::Binary(vec![1, 2]))
        );
        assert!(ParamValue::coerce(&json!([256]), DataType::Binary).is_err());
    }

    #[test]
    fn test_null_coerces_for_every_type() {
        for data_type in [DataType::Text, DataType::Integer, DataType::Date, DataType::Binary] {
            assert_eq!(ParamValue::coerce(&Value::Null, data_type), Ok(ParamValue::Null));
        }
    }

    #[test]
    fn test_wildcard_bind_value_keeps_raw_text() {
        let param = BoundParameter {
            name: "p0".to_string(),
            value: ParamValue::Text("o'brien".to_string()),
            data_type: DataType::Text,
            wildcard: true,
            direction: ParameterDirection::Input,
        };
        assert_eq!(param.value, ParamValue::Text("o'brien".to_string()));
        assert_eq!(param.bind_value(), ParamValue::Text("%o'brien%".to_string()));
    }
}
