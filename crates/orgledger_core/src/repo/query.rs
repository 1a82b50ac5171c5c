//! Query builder consumed by the generic repository.
//!
//! A [`Query`] combines SQL-side criteria (evaluated by SQLite) with an
//! optional in-memory predicate and comparator (evaluated after eager
//! loads, so they may look at navigation fields).

use super::entity::Entity;
use rusqlite::types::Value;
use std::cmp::Ordering;

/// SQL-side filter. Column names are compile-time constants, never caller
/// input; values are always bound as parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum Criterion {
    /// `column = value`
    Eq(&'static str, Value),
    /// `column IS NULL`
    IsNull(&'static str),
    /// `column IN (values...)`; an empty list matches nothing.
    In(&'static str, Vec<Value>),
    /// Case-insensitive substring match on one column.
    Contains(&'static str, String),
    /// Case-insensitive substring match on any of several columns.
    AnyContains(&'static [&'static str], String),
    /// Fixed SQL fragment with positional `?` parameters.
    Sql(&'static str, Vec<Value>),
}

impl Criterion {
    pub(crate) fn append_to(&self, sql: &mut String, binds: &mut Vec<Value>) {
        match self {
            Self::Eq(column, value) => {
                sql.push_str(&format!(" AND {column} = ?"));
                binds.push(value.clone());
            }
            Self::IsNull(column) => sql.push_str(&format!(" AND {column} IS NULL")),
            Self::In(column, values) => {
                if values.is_empty() {
                    sql.push_str(" AND 0 = 1");
                    return;
                }
                let placeholders = vec!["?"; values.len()].join(", ");
                sql.push_str(&format!(" AND {column} IN ({placeholders})"));
                binds.extend(values.iter().cloned());
            }
            Self::Contains(column, term) => {
                sql.push_str(&format!(" AND {column} LIKE ? ESCAPE '\\'"));
                binds.push(Value::Text(like_pattern(term)));
            }
            Self::AnyContains(columns, term) => {
                let clauses: Vec<String> = columns
                    .iter()
                    .map(|column| format!("{column} LIKE ? ESCAPE '\\'"))
                    .collect();
                sql.push_str(&format!(" AND ({})", clauses.join(" OR ")));
                for _ in columns.iter() {
                    binds.push(Value::Text(like_pattern(term)));
                }
            }
            Self::Sql(fragment, values) => {
                sql.push_str(&format!(" AND ({fragment})"));
                binds.extend(values.iter().cloned());
            }
        }
    }
}

/// Wraps `term` for a `LIKE ... ESCAPE '\'` substring match.
pub(crate) fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for ch in term.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped.push('%');
    escaped
}

type Predicate<'q, T> = Box<dyn Fn(&T) -> bool + 'q>;
type Comparator<'q, T> = Box<dyn Fn(&T, &T) -> Ordering + 'q>;

/// What to read, what to eager-load and how to order it.
///
/// Without a comparator, rows come back in insertion order.
pub struct Query<'q, T: Entity> {
    criteria: Vec<Criterion>,
    predicate: Option<Predicate<'q, T>>,
    includes: Vec<T::Include>,
    order_by: Option<Comparator<'q, T>>,
    include_inactive: bool,
}

impl<'q, T: Entity> Default for Query<'q, T> {
    fn default() -> Self {
        Self {
            criteria: Vec::new(),
            predicate: None,
            includes: Vec::new(),
            order_by: None,
            include_inactive: false,
        }
    }
}

impl<'q, T: Entity> Query<'q, T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Matches exactly the row identified by `key`.
    pub fn for_key(key: &T::Key) -> Self {
        let mut query = Self::new();
        for (column, value) in T::KEY_COLUMNS.iter().zip(T::key_values(key)) {
            query.criteria.push(Criterion::Eq(*column, value));
        }
        query
    }

    pub fn filter(mut self, criterion: Criterion) -> Self {
        self.criteria.push(criterion);
        self
    }

    pub fn where_eq(self, column: &'static str, value: Value) -> Self {
        self.filter(Criterion::Eq(column, value))
    }

    /// In-memory predicate, applied after eager loads.
    pub fn matching(mut self, predicate: impl Fn(&T) -> bool + 'q) -> Self {
        self.predicate = Some(Box::new(predicate));
        self
    }

    pub fn include(mut self, path: T::Include) -> Self {
        if !self.includes.contains(&path) {
            self.includes.push(path);
        }
        self
    }

    pub fn include_paths(self, paths: impl IntoIterator<Item = T::Include>) -> Self {
        paths
            .into_iter()
            .fold(self, |query, path| query.include(path))
    }

    pub fn order_by(mut self, comparator: impl Fn(&T, &T) -> Ordering + 'q) -> Self {
        self.order_by = Some(Box::new(comparator));
        self
    }

    /// Lifts the soft-delete filter for this read.
    pub fn with_inactive(mut self) -> Self {
        self.include_inactive = true;
        self
    }

    pub fn criteria(&self) -> &[Criterion] {
        &self.criteria
    }

    pub fn includes(&self) -> &[T::Include] {
        &self.includes
    }

    pub fn includes_inactive(&self) -> bool {
        self.include_inactive
    }

    pub(crate) fn has_predicate(&self) -> bool {
        self.predicate.is_some()
    }

    pub(crate) fn has_ordering(&self) -> bool {
        self.order_by.is_some()
    }

    /// Applies the predicate and comparator to already-loaded rows.
    pub(crate) fn finish(&self, mut rows: Vec<T>) -> Vec<T> {
        if let Some(predicate) = &self.predicate {
            rows.retain(|row| predicate(row));
        }
        if let Some(order_by) = &self.order_by {
            rows.sort_by(|left, right| order_by(left, right));
        }
        rows
    }
}
