//! Table description consumed by the generic repository.

use super::{RepoError, RepoResult};
use crate::model::ValidationError;
use rusqlite::types::Value;
use rusqlite::{Connection, Row};
use std::fmt::Debug;
use std::hash::Hash;
use uuid::Uuid;

/// Named relation that a read may eager-load.
pub trait IncludePath: Copy + Eq + Debug + 'static {
    /// Every path the entity supports.
    const ALL: &'static [Self];

    /// Stable lowercase name used by comma-separated include lists.
    fn name(self) -> &'static str;
}

/// Mapping between one entity type and its table.
///
/// Implementors describe columns and row conversion; all SQL is generated
/// by the generic repository from these descriptions.
pub trait Entity: Clone + Sized {
    type Key: Clone + Eq + Hash + Debug;
    type Include: IncludePath;

    /// Singular name used in errors and log events.
    const NAME: &'static str;
    const TABLE: &'static str;
    /// Every stored column, in the order produced by [`Entity::to_values`].
    const COLUMNS: &'static [&'static str];
    /// Columns forming the identity, a subset of `COLUMNS`.
    const KEY_COLUMNS: &'static [&'static str];
    /// Soft-delete flag column (1 = active), if the entity has one.
    const ACTIVE_COLUMN: Option<&'static str> = None;

    fn key(&self) -> Self::Key;

    /// Key encoded in `KEY_COLUMNS` order.
    fn key_values(key: &Self::Key) -> Vec<Value>;

    fn describe_key(key: &Self::Key) -> String {
        format!("{key:?}")
    }

    /// Column values in `COLUMNS` order.
    fn to_values(&self) -> Vec<Value>;

    fn from_row(row: &Row<'_>) -> RepoResult<Self>;

    fn validate(&self) -> Result<(), ValidationError> {
        Ok(())
    }

    /// Fills the navigation fields named by `includes` for all `items`.
    fn load_includes(
        conn: &Connection,
        items: &mut [Self],
        includes: &[Self::Include],
    ) -> RepoResult<()>;
}

/// Parses a comma-separated include list such as `"department, manager"`.
///
/// Matching is case-insensitive; duplicates are dropped while keeping the
/// first occurrence's position. Unknown names fail the whole list.
pub fn parse_includes<T: Entity>(list: &str) -> RepoResult<Vec<T::Include>> {
    let mut paths: Vec<T::Include> = Vec::new();
    for raw in list.split(',') {
        let name = raw.trim();
        if name.is_empty() {
            continue;
        }
        let path = T::Include::ALL
            .iter()
            .copied()
            .find(|candidate| candidate.name().eq_ignore_ascii_case(name))
            .ok_or_else(|| RepoError::UnknownInclude {
                entity: T::NAME,
                path: name.to_string(),
            })?;
        if !paths.contains(&path) {
            paths.push(path);
        }
    }
    Ok(paths)
}

pub(crate) fn uuid_value(id: Uuid) -> Value {
    Value::Text(id.to_string())
}

pub(crate) fn opt_uuid_value(id: Option<Uuid>) -> Value {
    id.map_or(Value::Null, uuid_value)
}

pub(crate) fn text_value(value: &str) -> Value {
    Value::Text(value.to_string())
}

pub(crate) fn opt_text_value(value: Option<&str>) -> Value {
    value.map_or(Value::Null, text_value)
}

pub(crate) fn opt_int_value(value: Option<i64>) -> Value {
    value.map_or(Value::Null, Value::Integer)
}

pub(crate) fn bool_value(value: bool) -> Value {
    Value::Integer(i64::from(value))
}

pub(crate) fn read_uuid(row: &Row<'_>, column: &str) -> RepoResult<Uuid> {
    let text: String = row.get(column)?;
    parse_uuid(&text, column)
}

pub(crate) fn read_opt_uuid(row: &Row<'_>, column: &str) -> RepoResult<Option<Uuid>> {
    row.get::<_, Option<String>>(column)?
        .map(|text| parse_uuid(&text, column))
        .transpose()
}

pub(crate) fn read_bool(row: &Row<'_>, column: &str) -> RepoResult<bool> {
    match row.get::<_, i64>(column)? {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(RepoError::InvalidData(format!(
            "invalid flag `{other}` in column {column}"
        ))),
    }
}

fn parse_uuid(text: &str, column: &str) -> RepoResult<Uuid> {
    Uuid::parse_str(text)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid `{text}` in column {column}")))
}
