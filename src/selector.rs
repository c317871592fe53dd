use std::fmt;
use std::str::FromStr;

use crate::error::{TableError, TableResult};
use crate::query::Query;

/// Which table of the document to extract
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableSelector {
    /// Zero-based position among all tables, in document order
    Position(i64),
    /// Value of the table's `id` attribute
    Id(String),
    /// A raw path expression, used verbatim
    Expression(String),
}

impl TableSelector {
    /// Build the query selecting exactly the target table (first match wins)
    pub fn to_query(&self) -> TableResult<Query> {
        match self {
            TableSelector::Position(position) if *position < 0 => Err(TableError::invalid_selector(
                position.to_string(),
                "the table offset must be a positive integer or the table id attribute value",
            )),
            TableSelector::Position(position) => Ok(Query::nth_table(*position as usize)),
            TableSelector::Id(id) => {
                if id.is_empty() || id.chars().any(char::is_whitespace) {
                    return Err(TableError::invalid_selector(
                        id.as_str(),
                        "the id attribute's value must not be empty or contain whitespace (spaces, tabs etc.)",
                    ));
                }
                let quote = match (id.contains('"'), id.contains('\'')) {
                    (false, _) => '"',
                    (true, false) => '\'',
                    (true, true) => {
                        return Err(TableError::invalid_selector(
                            id.as_str(),
                            "the id attribute's value cannot contain both quote characters",
                        ))
                    }
                };
                Query::parse(&format!("//table[@id={q}{}{q}]", id, q = quote))
            }
            TableSelector::Expression(expression) => Query::parse(expression),
        }
    }
}

impl Default for TableSelector {
    fn default() -> Self {
        TableSelector::Position(0)
    }
}

impl fmt::Display for TableSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableSelector::Position(position) => write!(f, "table #{}", position),
            TableSelector::Id(id) => write!(f, "table id={}", id),
            TableSelector::Expression(expression) => f.write_str(expression),
        }
    }
}

/// Integers become positions, anything starting with `/` or `(` an
/// expression, everything else an id
impl FromStr for TableSelector {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(position) = s.parse::<i64>() {
            Ok(TableSelector::Position(position))
        } else if s.starts_with('/') || s.starts_with('(') {
            Ok(TableSelector::Expression(s.to_string()))
        } else {
            Ok(TableSelector::Id(s.to_string()))
        }
    }
}

impl From<usize> for TableSelector {
    fn from(position: usize) -> Self {
        TableSelector::Position(position as i64)
    }
}

impl From<&str> for TableSelector {
    fn from(id: &str) -> Self {
        TableSelector::Id(id.to_string())
    }
}
