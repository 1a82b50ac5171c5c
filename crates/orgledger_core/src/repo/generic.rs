//! The one CRUD implementation shared by every entity type.

use super::change_set::{ChangeSet, PendingWrite, WriteKind};
use super::entity::{uuid_value, Entity};
use super::query::{Criterion, Query};
use super::{RepoError, RepoResult};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection};
use std::collections::HashMap;
use std::marker::PhantomData;
use uuid::Uuid;

/// Upper bound on bound parameters per `IN (...)` batch.
const IN_BATCH: usize = 500;

/// Uniform data-access contract for one entity type.
pub trait Repository<T: Entity> {
    /// Loads one live row or fails with `NotFound`.
    fn get_by_id(&self, key: &T::Key) -> RepoResult<T>;
    /// Loads one row if present; `include_inactive` lifts the soft-delete
    /// filter.
    fn find(&self, key: &T::Key, include_inactive: bool) -> RepoResult<Option<T>>;
    fn get_all(&self, query: &Query<'_, T>) -> RepoResult<Vec<T>>;
    /// First match in store order; which one is unspecified when several
    /// rows match and no comparator is set.
    fn get_first_or_default(&self, query: &Query<'_, T>) -> RepoResult<Option<T>>;
    fn count(&self, query: &Query<'_, T>) -> RepoResult<u64>;
    /// Buffers an insert.
    fn add(&self, entity: &T) -> RepoResult<()>;
    /// Buffers several inserts; nothing is buffered if any entity is invalid.
    fn add_range(&self, entities: &[T]) -> RepoResult<()>;
    /// Buffers a full-row update keyed by the entity's identity.
    fn update(&self, entity: &T) -> RepoResult<()>;
    /// Buffers a physical delete.
    fn delete(&self, entity: &T) -> RepoResult<()>;
}

/// SQLite-backed repository bound to one unit of work.
///
/// Entity-specific queries live in `impl SqliteRepository<'_, Entity>`
/// blocks in the per-entity modules.
pub struct SqliteRepository<'uow, T: Entity> {
    conn: &'uow Connection,
    changes: &'uow ChangeSet,
    _entity: PhantomData<fn() -> T>,
}

impl<'uow, T: Entity> SqliteRepository<'uow, T> {
    pub fn new(conn: &'uow Connection, changes: &'uow ChangeSet) -> Self {
        Self {
            conn,
            changes,
            _entity: PhantomData,
        }
    }

    pub(crate) fn conn(&self) -> &'uow Connection {
        self.conn
    }

    fn buffer(&self, kind: WriteKind, entity: &T) {
        let write = match kind {
            WriteKind::Insert => insert_write(entity),
            WriteKind::Update => update_write(entity),
            WriteKind::Delete => delete_write(entity),
        };
        self.changes.push(write);
    }
}

impl<T: Entity> Repository<T> for SqliteRepository<'_, T> {
    fn get_by_id(&self, key: &T::Key) -> RepoResult<T> {
        self.find(key, false)?.ok_or_else(|| RepoError::NotFound {
            entity: T::NAME,
            key: T::describe_key(key),
        })
    }

    fn find(&self, key: &T::Key, include_inactive: bool) -> RepoResult<Option<T>> {
        let query = Query::for_key(key);
        let query = if include_inactive {
            query.with_inactive()
        } else {
            query
        };
        self.get_first_or_default(&query)
    }

    fn get_all(&self, query: &Query<'_, T>) -> RepoResult<Vec<T>> {
        let mut rows = select_rows::<T>(
            self.conn,
            query.criteria(),
            query.includes_inactive(),
            None,
        )?;
        if !query.includes().is_empty() && !rows.is_empty() {
            T::load_includes(self.conn, &mut rows, query.includes())?;
        }
        Ok(query.finish(rows))
    }

    fn get_first_or_default(&self, query: &Query<'_, T>) -> RepoResult<Option<T>> {
        if query.has_predicate() || query.has_ordering() {
            return Ok(self.get_all(query)?.into_iter().next());
        }

        let mut rows = select_rows::<T>(
            self.conn,
            query.criteria(),
            query.includes_inactive(),
            Some(1),
        )?;
        if !query.includes().is_empty() && !rows.is_empty() {
            T::load_includes(self.conn, &mut rows, query.includes())?;
        }
        Ok(rows.into_iter().next())
    }

    fn count(&self, query: &Query<'_, T>) -> RepoResult<u64> {
        if query.has_predicate() {
            return Ok(self.get_all(query)?.len() as u64);
        }
        count_rows::<T>(self.conn, query.criteria(), query.includes_inactive())
    }

    fn add(&self, entity: &T) -> RepoResult<()> {
        entity.validate()?;
        self.buffer(WriteKind::Insert, entity);
        Ok(())
    }

    fn add_range(&self, entities: &[T]) -> RepoResult<()> {
        for entity in entities {
            entity.validate()?;
        }
        for entity in entities {
            self.buffer(WriteKind::Insert, entity);
        }
        Ok(())
    }

    fn update(&self, entity: &T) -> RepoResult<()> {
        entity.validate()?;
        self.buffer(WriteKind::Update, entity);
        Ok(())
    }

    fn delete(&self, entity: &T) -> RepoResult<()> {
        self.buffer(WriteKind::Delete, entity);
        Ok(())
    }
}

fn where_clause<T: Entity>(
    mut sql: String,
    criteria: &[Criterion],
    include_inactive: bool,
) -> (String, Vec<Value>) {
    let mut binds = Vec::new();
    sql.push_str(" WHERE 1 = 1");
    if let (false, Some(column)) = (include_inactive, T::ACTIVE_COLUMN) {
        sql.push_str(&format!(" AND {column} = 1"));
    }
    for criterion in criteria {
        criterion.append_to(&mut sql, &mut binds);
    }
    (sql, binds)
}

/// Reads rows of `T` in insertion (`rowid`) order.
pub(crate) fn select_rows<T: Entity>(
    conn: &Connection,
    criteria: &[Criterion],
    include_inactive: bool,
    limit: Option<u32>,
) -> RepoResult<Vec<T>> {
    let select = format!("SELECT {} FROM {}", T::COLUMNS.join(", "), T::TABLE);
    let (mut sql, binds) = where_clause::<T>(select, criteria, include_inactive);
    sql.push_str(" ORDER BY rowid ASC");
    if let Some(limit) = limit {
        sql.push_str(&format!(" LIMIT {limit}"));
    }

    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(params_from_iter(binds.iter()))?;
    let mut items = Vec::new();
    while let Some(row) = rows.next()? {
        items.push(T::from_row(row)?);
    }
    Ok(items)
}

pub(crate) fn count_rows<T: Entity>(
    conn: &Connection,
    criteria: &[Criterion],
    include_inactive: bool,
) -> RepoResult<u64> {
    let select = format!("SELECT COUNT(*) FROM {}", T::TABLE);
    let (sql, binds) = where_clause::<T>(select, criteria, include_inactive);
    let count: i64 = conn.query_row(&sql, params_from_iter(binds.iter()), |row| row.get(0))?;
    Ok(count.max(0) as u64)
}

/// Loads live rows of `T` whose `column` is one of `ids`, batching the
/// `IN (...)` list.
pub(crate) fn select_in<T: Entity>(
    conn: &Connection,
    column: &'static str,
    ids: impl IntoIterator<Item = Uuid>,
) -> RepoResult<Vec<T>> {
    let mut unique: Vec<Uuid> = ids.into_iter().collect();
    unique.sort_unstable();
    unique.dedup();

    let mut items = Vec::new();
    for batch in unique.chunks(IN_BATCH) {
        let values = batch.iter().copied().map(uuid_value).collect();
        items.extend(select_rows::<T>(
            conn,
            &[Criterion::In(column, values)],
            false,
            None,
        )?);
    }
    Ok(items)
}

/// Loads live rows of `T` by primary key, indexed by key.
pub(crate) fn load_by_ids<T: Entity<Key = Uuid>>(
    conn: &Connection,
    ids: impl IntoIterator<Item = Uuid>,
) -> RepoResult<HashMap<Uuid, T>> {
    Ok(select_in::<T>(conn, "id", ids)?
        .into_iter()
        .map(|item| (item.key(), item))
        .collect())
}

/// Loads live rows of `T` whose `column` is one of `ids`, grouped by the
/// owning id extracted with `owner`. Each group keeps insertion order.
pub(crate) fn load_groups<T: Entity>(
    conn: &Connection,
    column: &'static str,
    ids: impl IntoIterator<Item = Uuid>,
    owner: impl Fn(&T) -> Option<Uuid>,
) -> RepoResult<HashMap<Uuid, Vec<T>>> {
    let mut groups: HashMap<Uuid, Vec<T>> = HashMap::new();
    for item in select_in::<T>(conn, column, ids)? {
        if let Some(owner_id) = owner(&item) {
            groups.entry(owner_id).or_default().push(item);
        }
    }
    Ok(groups)
}

fn insert_write<T: Entity>(entity: &T) -> PendingWrite {
    let placeholders: Vec<String> = (1..=T::COLUMNS.len()).map(|n| format!("?{n}")).collect();
    PendingWrite {
        entity: T::NAME,
        kind: WriteKind::Insert,
        key: T::describe_key(&entity.key()),
        sql: format!(
            "INSERT INTO {} ({}) VALUES ({});",
            T::TABLE,
            T::COLUMNS.join(", "),
            placeholders.join(", ")
        ),
        params: entity.to_values(),
    }
}

fn update_write<T: Entity>(entity: &T) -> PendingWrite {
    let mut params = Vec::with_capacity(T::COLUMNS.len());
    let mut assignments = Vec::new();
    for (column, value) in T::COLUMNS.iter().zip(entity.to_values()) {
        if T::KEY_COLUMNS.contains(column) {
            continue;
        }
        params.push(value);
        assignments.push(format!("{column} = ?{}", params.len()));
    }
    let conditions = key_conditions::<T>(&entity.key(), &mut params);

    PendingWrite {
        entity: T::NAME,
        kind: WriteKind::Update,
        key: T::describe_key(&entity.key()),
        sql: format!(
            "UPDATE {} SET {} WHERE {};",
            T::TABLE,
            assignments.join(", "),
            conditions
        ),
        params,
    }
}

fn delete_write<T: Entity>(entity: &T) -> PendingWrite {
    let mut params = Vec::new();
    let conditions = key_conditions::<T>(&entity.key(), &mut params);
    PendingWrite {
        entity: T::NAME,
        kind: WriteKind::Delete,
        key: T::describe_key(&entity.key()),
        sql: format!("DELETE FROM {} WHERE {};", T::TABLE, conditions),
        params,
    }
}

fn key_conditions<T: Entity>(key: &T::Key, params: &mut Vec<Value>) -> String {
    let mut conditions = Vec::new();
    for (column, value) in T::KEY_COLUMNS.iter().zip(T::key_values(key)) {
        params.push(value);
        conditions.push(format!("{column} = ?{}", params.len()));
    }
    conditions.join(" AND ")
}
