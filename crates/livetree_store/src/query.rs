//! Query descriptors: ordering and limits over a node's children.
//!
//! The façade treats a [`QuerySpec`] as opaque; only backends interpret it.

use crate::value::{compare_keys, compare_values};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cmp::Ordering;

/// How children are ordered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderBy {
    /// By key (the default ordering of a node).
    #[default]
    Key,
    /// By the child's own value.
    Value,
    /// By the value of a named field of each child.
    Child(String),
}

/// Which end of the ordering a limit keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Limit {
    /// Keep the first `n` children.
    First(usize),
    /// Keep the last `n` children.
    Last(usize),
}

/// An ordered, optionally limited view over the children of a node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QuerySpec {
    /// Child ordering.
    pub order_by: OrderBy,
    /// Optional limit applied after ordering.
    pub limit: Option<Limit>,
}

impl QuerySpec {
    /// Creates a key-ordered query with no limit.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Orders children by key.
    #[must_use]
    pub fn order_by_key(mut self) -> Self {
        self.order_by = OrderBy::Key;
        self
    }

    /// Orders children by their value.
    #[must_use]
    pub fn order_by_value(mut self) -> Self {
        self.order_by = OrderBy::Value;
        self
    }

    /// Orders children by a named field.
    #[must_use]
    pub fn order_by_child(mut self, field: impl Into<String>) -> Self {
        self.order_by = OrderBy::Child(field.into());
        self
    }

    /// Keeps only the first `n` children.
    #[must_use]
    pub fn limit_to_first(mut self, n: usize) -> Self {
        self.limit = Some(Limit::First(n));
        self
    }

    /// Keeps only the last `n` children.
    #[must_use]
    pub fn limit_to_last(mut self, n: usize) -> Self {
        self.limit = Some(Limit::Last(n));
        self
    }

    fn compare(&self, a: (&str, &Value), b: (&str, &Value)) -> Ordering {
        let by_value = match &self.order_by {
            OrderBy::Key => Ordering::Equal,
            OrderBy::Value => compare_values(a.1, b.1),
            OrderBy::Child(field) => compare_values(
                a.1.get(field).unwrap_or(&Value::Null),
                b.1.get(field).unwrap_or(&Value::Null),
            ),
        };
        by_value.then_with(|| compare_keys(a.0, b.0))
    }
}

/// Returns the children of `value` in query order, with the limit
/// applied. Without a query, children are ordered by key.
pub fn ordered_children(value: &Value, query: Option<&QuerySpec>) -> Vec<(String, Value)> {
    let Value::Object(map) = value else {
        return Vec::new();
    };

    let default_query = QuerySpec::default();
    let query = query.unwrap_or(&default_query);

    let mut children: Vec<(String, Value)> = map
        .iter()
        .map(|(key, child)| (key.clone(), child.clone()))
        .collect();
    children.sort_by(|a, b| query.compare((&a.0, &a.1), (&b.0, &b.1)));

    match query.limit {
        Some(Limit::First(n)) => children.truncate(n),
        Some(Limit::Last(n)) => {
            let skip = children.len().saturating_sub(n);
            children.drain(..skip);
        }
        None => {}
    }
    children
}

/// Returns the value a query observes at a node: the matching children
/// as an object, or the node value itself when there is no query.
pub fn query_view(value: &Value, query: Option<&QuerySpec>) -> Value {
    match query {
        None => value.clone(),
        Some(query) => {
            let map: Map<String, Value> = ordered_children(value, Some(query)).into_iter().collect();
            if map.is_empty() {
                Value::Null
            } else {
                Value::Object(map)
            }
        }
    }
}
