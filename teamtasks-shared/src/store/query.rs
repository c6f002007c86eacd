/// Filtered queries over a collection
///
/// Queries are conjunctions of field filters. Two operators are supported,
/// matching what the dashboards need:
///
/// - `Eq`: field equals a value (`userId == caller`)
/// - `In`: field equals any value of a set (`userId in subordinate_ids`)
///
/// A missing field compares as JSON `null`. An `In` filter with an empty set
/// matches nothing.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Collection, Document};

/// Filter operator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "op", content = "value")]
pub enum FilterOp {
    /// Field equals the value
    Eq(Value),

    /// Field equals one of the values
    In(Vec<Value>),
}

/// A single field filter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    /// Field name (top-level document field)
    pub field: String,

    /// Comparison
    pub op: FilterOp,
}

impl Filter {
    /// Checks a document against this filter
    pub fn matches(&self, document: &Document) -> bool {
        let actual = document.field(&self.field).unwrap_or(&Value::Null);

        match &self.op {
            FilterOp::Eq(expected) => actual == expected,
            FilterOp::In(candidates) => candidates.iter().any(|c| c == actual),
        }
    }
}

/// A query: collection plus a conjunction of filters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    /// Collection to read
    pub collection: Collection,

    /// Filters, all of which must match
    pub filters: Vec<Filter>,
}

impl Query {
    /// Creates an unfiltered query over a collection
    pub fn new(collection: Collection) -> Self {
        Self {
            collection,
            filters: Vec::new(),
        }
    }

    /// Adds an equality filter
    pub fn where_eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push(Filter {
            field: field.into(),
            op: FilterOp::Eq(value.into()),
        });
        self
    }

    /// Adds a set-membership filter
    pub fn where_in<I, V>(mut self, field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.filters.push(Filter {
            field: field.into(),
            op: FilterOp::In(values.into_iter().map(Into::into).collect()),
        });
        self
    }

    /// Checks a document against every filter
    pub fn matches(&self, document: &Document) -> bool {
        self.filters.iter().all(|f| f.matches(document))
    }
}
