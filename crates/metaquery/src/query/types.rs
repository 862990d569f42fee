//! Query Builder Types - combinators and aggregate WHERE sources

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::filter::FilterInfo;

/// Joins sibling predicates
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Combinator {
    #[default]
    And,
    Or,
}

impl Combinator {
    /// Join predicates with this combinator. Never leaves a dangling token.
    pub(crate) fn join(self, predicates: &[String]) -> String {
        predicates.join(&format!(" {} ", self))
    }
}

impl fmt::Display for Combinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Combinator::And => write!(f, "AND"),
            Combinator::Or => write!(f, "OR"),
        }
    }
}

/// WHERE source of an aggregate query
#[derive(Debug, Clone, Copy)]
pub enum AggregateSource<'a> {
    /// Predicates from the entity's property values
    Example(Combinator),
    /// Per-column and global search predicates; the window and sort are ignored
    Filter(&'a FilterInfo),
}
