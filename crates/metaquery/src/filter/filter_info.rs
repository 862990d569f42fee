//! FilterInfo - pagination window, per-column search and sort directives

use serde::{Deserialize, Serialize};
use std::fmt;

use super::predicate::{deserialize_optional, Predicate};
use crate::error::{QueryError, QueryResult};

/// Sort direction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortDirection::Asc => write!(f, "ASC"),
            SortDirection::Desc => write!(f, "DESC"),
        }
    }
}

/// One display column
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ColumnSpec {
    /// Logical field name or exposed join column name
    pub data: String,
    #[serde(default)]
    pub searchable: bool,
    /// Per-column predicate, combined with AND
    #[serde(
        default,
        deserialize_with = "deserialize_optional",
        skip_serializing_if = "Option::is_none"
    )]
    pub search: Option<Predicate>,
}

impl ColumnSpec {
    pub fn new(data: &str) -> Self {
        Self {
            data: data.to_string(),
            searchable: false,
            search: None,
        }
    }

    /// Include the column in the global free-text search
    pub fn searchable(mut self) -> Self {
        self.searchable = true;
        self
    }

    pub fn with_search(mut self, predicate: Predicate) -> Self {
        self.search = Some(predicate);
        self
    }

    /// Set the per-column predicate from its wire form
    pub fn with_search_text(mut self, text: &str) -> QueryResult<Self> {
        self.search = Predicate::parse(text)?;
        Ok(self)
    }
}

/// One sort directive; `column` indexes `FilterInfo::columns`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub column: usize,
    #[serde(default)]
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn asc(column: usize) -> Self {
        Self {
            column,
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(column: usize) -> Self {
        Self {
            column,
            direction: SortDirection::Desc,
        }
    }
}

/// Listing descriptor: 0-based window, search state and sort order.
///
/// `total` and `filtered_records` are outputs; builders never read or
/// write them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterInfo {
    #[serde(default)]
    pub start: u64,
    /// Zero means unbounded
    #[serde(default)]
    pub length: u64,
    /// Global search, applied to every searchable column with OR
    #[serde(
        default,
        deserialize_with = "deserialize_optional",
        skip_serializing_if = "Option::is_none"
    )]
    pub search: Option<Predicate>,
    #[serde(default)]
    pub columns: Vec<ColumnSpec>,
    #[serde(default)]
    pub sort_columns: Vec<SortSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filtered_records: Option<u64>,
}

impl FilterInfo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the pagination window
    pub fn page(mut self, start: u64, length: u64) -> Self {
        self.start = start;
        self.length = length;
        self
    }

    pub fn with_column(mut self, column: ColumnSpec) -> Self {
        self.columns.push(column);
        self
    }

    pub fn with_search(mut self, predicate: Predicate) -> Self {
        self.search = Some(predicate);
        self
    }

    /// Set the global search from its wire form
    pub fn with_search_text(mut self, text: &str) -> QueryResult<Self> {
        self.search = Predicate::parse(text)?;
        Ok(self)
    }

    pub fn sort_by(mut self, sort: SortSpec) -> Self {
        self.sort_columns.push(sort);
        self
    }

    /// Whether the listing is restricted to a window
    pub fn is_windowed(&self) -> bool {
        self.length > 0
    }

    /// Resolve each sort directive to its column
    pub fn sort_targets(&self) -> QueryResult<Vec<(&ColumnSpec, SortDirection)>> {
        self.sort_columns
            .iter()
            .map(|sort| {
                self.columns
                    .get(sort.column)
                    .map(|column| (column, sort.direction))
                    .ok_or_else(|| {
                        QueryError::invalid_filter(format!(
                            "sort column index {} is out of bounds ({} columns)",
                            sort.column,
                            self.columns.len()
                        ))
                    })
            })
            .collect()
    }

    /// Store the results of the count statements run by the host
    pub fn record_counts(&mut self, total: u64, filtered_records: u64) {
        self.total = Some(total);
        self.filtered_records = Some(filtered_records);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_targets_out_of_bounds() {
        let filter = FilterInfo::new()
            .with_column(ColumnSpec::new("Name"))
            .sort_by(SortSpec::desc(3));
        let err = filter.sort_targets().unwrap_err();
        assert!(matches!(err, QueryError::InvalidFilter(_)));
        assert!(err.to_string().contains("index 3"));
    }

    #[test]
    fn test_sort_targets_resolve() {
        let filter = FilterInfo::new()
            .with_column(ColumnSpec::new("Name"))
            .with_column(ColumnSpec::new("Age"))
            .sort_by(SortSpec::desc(1));
        let targets = filter.sort_targets().unwrap();
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].0.data, "Age");
        assert_eq!(targets[0].1, SortDirection::Desc);
    }

    #[test]
    fn test_deserialize_wire_filter() {
        let filter: FilterInfo = serde_json::from_str(
            r#"{
                "start": 20,
                "length": 10,
                "search": "LIKE_smi",
                "columns": [
                    {"data": "Name", "searchable": true},
                    {"data": "Age", "search": "18_RANGE_65"},
                    {"data": "City", "search": ""}
                ],
                "sort_columns": [{"column": 0, "direction": "desc"}]
            }"#,
        )
        .unwrap();
        assert!(filter.is_windowed());
        assert_eq!(filter.search, Some(Predicate::Like("smi".to_string())));
        assert!(matches!(filter.columns[1].search, Some(Predicate::Range { .. })));
        assert_eq!(filter.columns[2].search, None);
        assert_eq!(filter.sort_columns[0], SortSpec::desc(0));
    }

    #[test]
    fn test_record_counts() {
        let mut filter = FilterInfo::new();
        filter.record_counts(100, 12);
        assert_eq!(filter.total, Some(100));
        assert_eq!(filter.filtered_records, Some(12));
    }
}
