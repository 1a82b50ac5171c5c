//! Ordered write buffer shared by all repositories of one unit of work.

use super::{RepoError, RepoResult};
use log::debug;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection};
use std::cell::RefCell;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteKind {
    Insert,
    Update,
    Delete,
}

impl WriteKind {
    fn as_str(self) -> &'static str {
        match self {
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

/// One buffered statement.
#[derive(Debug, Clone)]
pub(crate) struct PendingWrite {
    pub entity: &'static str,
    pub kind: WriteKind,
    pub key: String,
    pub sql: String,
    pub params: Vec<Value>,
}

/// Writes recorded by repositories and not yet flushed.
///
/// Statements run in the order they were recorded, which is what lets a
/// caller add a task and its assignment (or delete assignments before
/// their task) in one save.
#[derive(Debug, Default)]
pub struct ChangeSet {
    writes: RefCell<Vec<PendingWrite>>,
}

impl ChangeSet {
    pub fn len(&self) -> usize {
        self.writes.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.writes.borrow().is_empty()
    }

    /// Buffered writes as `(entity, kind)` pairs, in flush order.
    pub fn summary(&self) -> Vec<(&'static str, WriteKind)> {
        self.writes
            .borrow()
            .iter()
            .map(|write| (write.entity, write.kind))
            .collect()
    }

    pub fn clear(&self) {
        self.writes.borrow_mut().clear();
    }

    pub(crate) fn push(&self, write: PendingWrite) {
        self.writes.borrow_mut().push(write);
    }

    pub(crate) fn take(&self) -> Vec<PendingWrite> {
        std::mem::take(&mut *self.writes.borrow_mut())
    }
}

/// Executes `writes` in order and returns the number of affected rows.
///
/// An update or delete that touches no row means the target vanished (or
/// never existed) and fails the flush with `NotFound`.
pub(crate) fn apply_writes(conn: &Connection, writes: Vec<PendingWrite>) -> RepoResult<usize> {
    let mut affected = 0;
    for write in writes {
        let changed = conn.execute(&write.sql, params_from_iter(write.params.iter()))?;
        debug!(
            "event=flush_write module=repo status=ok entity={} kind={} changed={}",
            write.entity,
            write.kind.as_str(),
            changed
        );
        if changed == 0 && write.kind != WriteKind::Insert {
            return Err(RepoError::NotFound {
                entity: write.entity,
                key: write.key,
            });
        }
        affected += changed;
    }
    Ok(affected)
}
