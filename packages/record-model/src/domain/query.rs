//! Query vocabulary shared by the model layer and every record store.
//!
//! Filters are plain data: the SQLite adapter compiles them to parameterised
//! SQL, the in-memory adapter evaluates them with [`Filter::matches`].

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use super::models::{Row, Value};

/// Row predicate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Filter {
    /// Matches every row
    All,
    Eq(String, Value),
    Lt(String, Value),
    Le(String, Value),
    Gt(String, Value),
    Ge(String, Value),
    /// `column IN (...)`; an empty list matches nothing
    In(String, Vec<Value>),
    IsNull(String),
    And(Vec<Filter>),
    Or(Vec<Filter>),
}

impl Default for Filter {
    fn default() -> Self {
        Filter::All
    }
}

impl Filter {
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Eq(column.into(), value.into())
    }

    pub fn lt(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Lt(column.into(), value.into())
    }

    pub fn le(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Le(column.into(), value.into())
    }

    pub fn gt(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Gt(column.into(), value.into())
    }

    pub fn ge(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Ge(column.into(), value.into())
    }

    pub fn is_in(column: impl Into<String>, values: impl IntoIterator<Item = Value>) -> Self {
        Filter::In(column.into(), values.into_iter().collect())
    }

    pub fn is_null(column: impl Into<String>) -> Self {
        Filter::IsNull(column.into())
    }

    /// AND two predicates, dropping `All` and flattening nested conjunctions
    pub fn and(self, other: Filter) -> Filter {
        match (self, other) {
            (Filter::All, f) | (f, Filter::All) => f,
            (Filter::And(mut a), Filter::And(b)) => {
                a.extend(b);
                Filter::And(a)
            }
            (Filter::And(mut a), f) => {
                a.push(f);
                Filter::And(a)
            }
            (f, Filter::And(mut b)) => {
                b.insert(0, f);
                Filter::And(b)
            }
            (a, b) => Filter::And(vec![a, b]),
        }
    }

    /// AND of every predicate in `filters` (`All` when empty)
    pub fn all_of(filters: impl IntoIterator<Item = Filter>) -> Filter {
        filters.into_iter().fold(Filter::All, Filter::and)
    }

    /// Evaluate against a row with SQL semantics (missing column = NULL)
    pub fn matches(&self, row: &Row) -> bool {
        let cmp = |column: &str, value: &Value| {
            row.get(column).unwrap_or(&Value::Null).sql_cmp(value)
        };

        match self {
            Filter::All => true,
            Filter::Eq(c, v) => cmp(c, v) == Some(Ordering::Equal),
            Filter::Lt(c, v) => cmp(c, v) == Some(Ordering::Less),
            Filter::Le(c, v) => matches!(cmp(c, v), Some(Ordering::Less | Ordering::Equal)),
            Filter::Gt(c, v) => cmp(c, v) == Some(Ordering::Greater),
            Filter::Ge(c, v) => {
                matches!(cmp(c, v), Some(Ordering::Greater | Ordering::Equal))
            }
            Filter::In(c, values) => values.iter().any(|v| cmp(c, v) == Some(Ordering::Equal)),
            Filter::IsNull(c) => row.get(c).map_or(true, Value::is_null),
            Filter::And(filters) => filters.iter().all(|f| f.matches(row)),
            Filter::Or(filters) => filters.iter().any(|f| f.matches(row)),
        }
    }
}

/// Column assignment in an UPDATE
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Assignment {
    /// `column = value`
    Set(String, Value),
    /// `column = column + delta`
    Increment(String, i64),
    /// `column = NOT column`
    Toggle(String),
}

impl Assignment {
    pub fn set(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Assignment::Set(column.into(), value.into())
    }

    pub fn increment(column: impl Into<String>, delta: i64) -> Self {
        Assignment::Increment(column.into(), delta)
    }

    pub fn toggle(column: impl Into<String>) -> Self {
        Assignment::Toggle(column.into())
    }

    pub fn column(&self) -> &str {
        match self {
            Assignment::Set(c, _) | Assignment::Increment(c, _) | Assignment::Toggle(c) => c,
        }
    }

    /// Assignments setting every column of `row`
    pub fn from_row(row: &Row) -> Vec<Assignment> {
        row.iter()
            .map(|(column, value)| Assignment::set(column, value.clone()))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
    pub column: String,
    pub direction: Direction,
}

impl OrderBy {
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: Direction::Asc,
        }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: Direction::Desc,
        }
    }
}

/// SELECT * with filter, ordering and window
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Select {
    pub filter: Filter,
    pub order: Vec<OrderBy>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl Select {
    pub fn new(filter: Filter) -> Self {
        Self {
            filter,
            ..Self::default()
        }
    }

    pub fn order_by(mut self, order: OrderBy) -> Self {
        self.order.push(order);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }
}

/// One statement of a transactional batch
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    Update {
        filter: Filter,
        assignments: Vec<Assignment>,
    },
    Delete {
        filter: Filter,
    },
}

impl Mutation {
    pub fn update(filter: Filter, assignments: Vec<Assignment>) -> Self {
        Mutation::Update {
            filter,
            assignments,
        }
    }

    pub fn delete(filter: Filter) -> Self {
        Mutation::Delete { filter }
    }
}

/// Value computed by the store inside the INSERT statement itself
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComputedColumn {
    /// `1 + IFNULL(MAX(column), 0)` over the whole table
    NextInSequence(String),
}

impl ComputedColumn {
    pub fn column(&self) -> &str {
        match self {
            ComputedColumn::NextInSequence(c) => c,
        }
    }
}
