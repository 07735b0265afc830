use super::DocumentSnapshot;
use serde_json::Value;
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq(String, Value),
    /// Field value equals one of the candidates.
    In(String, Vec<Value>),
    /// Array field contains the value.
    ArrayContains(String, Value),
    Gte(String, Value),
    Lte(String, Value),
    /// Any of the nested filters holds.
    Or(Vec<Filter>),
}

impl Filter {
    pub fn matches(&self, data: &Value) -> bool {
        match self {
            Filter::Eq(field, expected) => data
                .get(field)
                .is_some_and(|actual| values_equal(actual, expected)),
            Filter::In(field, candidates) => data.get(field).is_some_and(|actual| {
                candidates.iter().any(|candidate| values_equal(actual, candidate))
            }),
            Filter::ArrayContains(field, expected) => data
                .get(field)
                .and_then(Value::as_array)
                .is_some_and(|items| items.iter().any(|item| values_equal(item, expected))),
            Filter::Gte(field, bound) => data.get(field).is_some_and(|actual| {
                matches!(
                    compare_values(actual, bound),
                    Some(Ordering::Greater | Ordering::Equal)
                )
            }),
            Filter::Lte(field, bound) => data.get(field).is_some_and(|actual| {
                matches!(
                    compare_values(actual, bound),
                    Some(Ordering::Less | Ordering::Equal)
                )
            }),
            Filter::Or(filters) => filters.iter().any(|filter| filter.matches(data)),
        }
    }
}

/// A collection query: conjunctive filters, optional ordering and limit.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub collection: String,
    pub filters: Vec<Filter>,
    pub order_by: Option<(String, Direction)>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn new(collection: &str) -> Self {
        Query {
            collection: collection.to_string(),
            filters: Vec::new(),
            order_by: None,
            limit: None,
        }
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn where_eq(self, field: &str, value: impl Into<Value>) -> Self {
        self.filter(Filter::Eq(field.to_string(), value.into()))
    }

    pub fn where_in<V: Into<Value>>(self, field: &str, values: impl IntoIterator<Item = V>) -> Self {
        let values = values.into_iter().map(Into::into).collect();
        self.filter(Filter::In(field.to_string(), values))
    }

    pub fn where_array_contains(self, field: &str, value: impl Into<Value>) -> Self {
        self.filter(Filter::ArrayContains(field.to_string(), value.into()))
    }

    pub fn where_gte(self, field: &str, value: impl Into<Value>) -> Self {
        self.filter(Filter::Gte(field.to_string(), value.into()))
    }

    pub fn where_lte(self, field: &str, value: impl Into<Value>) -> Self {
        self.filter(Filter::Lte(field.to_string(), value.into()))
    }

    pub fn where_any(self, filters: Vec<Filter>) -> Self {
        self.filter(Filter::Or(filters))
    }

    pub fn order_by(mut self, field: &str, direction: Direction) -> Self {
        self.order_by = Some((field.to_string(), direction));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, doc: &DocumentSnapshot) -> bool {
        if let Some((field, _)) = &self.order_by {
            // Ordered queries only return documents that carry the field.
            if doc.data.get(field).is_none() {
                return false;
            }
        }
        self.filters.iter().all(|filter| filter.matches(&doc.data))
    }

    /// Filters, orders and truncates an unordered set of documents.
    pub fn apply(&self, docs: Vec<DocumentSnapshot>) -> Vec<DocumentSnapshot> {
        let mut matched: Vec<DocumentSnapshot> =
            docs.into_iter().filter(|doc| self.matches(doc)).collect();

        if let Some((field, direction)) = &self.order_by {
            matched.sort_by(|a, b| {
                let ordering = match (a.data.get(field), b.data.get(field)) {
                    (Some(x), Some(y)) => total_order(x, y),
                    _ => Ordering::Equal,
                };
                let ordering = match direction {
                    Direction::Ascending => ordering,
                    Direction::Descending => ordering.reverse(),
                };
                ordering.then_with(|| a.id.cmp(&b.id))
            });
        }

        if let Some(limit) = self.limit {
            matched.truncate(limit);
        }
        matched
    }
}

fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Orders values of different types by type first: null, bool, number,
/// string, array, object.
fn total_order(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(f64::NAN);
            let y = y.as_f64().unwrap_or(f64::NAN);
            x.total_cmp(&y)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Array(_) | Value::Object(_), _) if type_rank(a) == type_rank(b) => {
            a.to_string().cmp(&b.to_string())
        }
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    compare_values(a, b) == Some(Ordering::Equal) || a == b
}
