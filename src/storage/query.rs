use crate::core::{Record, RowId, Value};
use std::sync::Arc;

/// Comparison applied by a single filter entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cond {
    Eq,
    Lt,
    Le,
    Gt,
    Ge,
    /// Field value is one of the listed values.
    Set,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpType {
    And,
    Or,
}

#[derive(Debug, Clone)]
pub struct Condition {
    pub field: String,
    pub cond: Cond,
    pub values: Vec<Value>,
}

impl Condition {
    pub fn matches(&self, value: &Value) -> bool {
        match (self.cond, self.values.first()) {
            (Cond::Set, _) => self.values.iter().any(|v| v == value),
            (_, None) => false,
            (Cond::Eq, Some(target)) => value == target,
            (Cond::Lt, Some(target)) => value < target,
            (Cond::Le, Some(target)) => value <= target,
            (Cond::Gt, Some(target)) => value > target,
            (Cond::Ge, Some(target)) => value >= target,
        }
    }
}

#[derive(Debug, Clone)]
pub struct QueryEntry {
    pub op: OpType,
    pub condition: Condition,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateKind {
    Avg,
    Sum,
    Count,
}

#[derive(Debug, Clone)]
pub struct Aggregation {
    pub kind: AggregateKind,
    pub field: String,
}

#[derive(Debug, Clone)]
pub struct SortSpec {
    pub field: String,
    pub desc: bool,
}

/// Declarative query against one collection.
///
/// Filters are combined left to right: each entry is joined to everything
/// before it with AND, unless `or()` was called right before adding it.
/// `a.or().b.c` therefore means `(a OR b) AND c`.
#[derive(Debug, Clone)]
pub struct Query {
    collection: String,
    entries: Vec<QueryEntry>,
    next_op: OpType,
    sort: Option<SortSpec>,
    limit: Option<usize>,
    aggregations: Vec<Aggregation>,
}

impl Query {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            entries: Vec::new(),
            next_op: OpType::And,
            sort: None,
            limit: None,
            aggregations: Vec::new(),
        }
    }

    pub fn filter(self, field: impl Into<String>, cond: Cond, value: impl Into<Value>) -> Self {
        self.push(field.into(), cond, vec![value.into()])
    }

    pub fn filter_set<I, V>(self, field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.push(field.into(), Cond::Set, values)
    }

    /// Joins the next filter with OR instead of AND.
    pub fn or(mut self) -> Self {
        self.next_op = OpType::Or;
        self
    }

    pub fn sort(mut self, field: impl Into<String>, desc: bool) -> Self {
        self.sort = Some(SortSpec {
            field: field.into(),
            desc,
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Aggregates are computed over every matching record, before `limit`.
    pub fn aggregate(mut self, kind: AggregateKind, field: impl Into<String>) -> Self {
        self.aggregations.push(Aggregation {
            kind,
            field: field.into(),
        });
        self
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn entries(&self) -> &[QueryEntry] {
        &self.entries
    }

    pub fn sort_spec(&self) -> Option<&SortSpec> {
        self.sort.as_ref()
    }

    pub fn limit_value(&self) -> Option<usize> {
        self.limit
    }

    pub fn aggregations(&self) -> &[Aggregation] {
        &self.aggregations
    }

    fn push(mut self, field: String, cond: Cond, values: Vec<Value>) -> Self {
        self.entries.push(QueryEntry {
            op: self.next_op,
            condition: Condition {
                field,
                cond,
                values,
            },
        });
        self.next_op = OpType::And;
        self
    }
}

#[derive(Debug, Clone)]
pub struct Item {
    pub row_id: RowId,
    pub record: Arc<Record>,
}

#[derive(Debug, Clone, Default)]
pub struct QueryResults {
    pub items: Vec<Item>,
    /// One value per requested aggregation, in request order.
    pub aggregations: Vec<f64>,
}

impl QueryResults {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn records(&self) -> impl Iterator<Item = &Arc<Record>> {
        self.items.iter().map(|item| &item.record)
    }

    /// The only match, if there is exactly one.
    pub fn single(&self) -> Option<&Item> {
        match self.items.as_slice() {
            [item] => Some(item),
            _ => None,
        }
    }

    pub fn aggregation(&self, idx: usize) -> Option<f64> {
        self.aggregations.get(idx).copied()
    }
}
