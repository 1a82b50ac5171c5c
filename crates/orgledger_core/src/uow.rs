//! Unit of work: one connection, one write buffer, one transaction scope.
//!
//! # Responsibility
//! - Own the SQLite connection for the lifetime of one logical operation.
//! - Hand out repositories that share that connection and a single
//!   [`ChangeSet`], so writes issued through different repositories commit
//!   or roll back together.
//!
//! # Invariants
//! - At most one explicit transaction is open; a nested
//!   `begin_transaction` fails with `TransactionAlreadyActive`.
//! - `commit_transaction` leaves no transaction open, on success or error.
//! - The write buffer is empty after every `save_changes`, whatever its
//!   outcome.
//! - A unit of work is `Send` but not `Sync`: one caller at a time.

use crate::db::{open_db, open_db_in_memory};
use crate::repo::change_set::{apply_writes, PendingWrite};
use crate::repo::{
    AssignmentRepository, ChangeSet, DepartmentRepository, EmployeeRepository, RepoError,
    RepoResult, SqliteRepository, TaskRepository,
};
use log::{debug, info, warn};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::path::Path;
use std::time::Instant;

const FLUSH_SAVEPOINT: &str = "uow_flush";

pub struct UnitOfWork {
    conn: Connection,
    changes: ChangeSet,
}

impl UnitOfWork {
    /// Opens (and migrates) the database file at `path`.
    pub fn open(path: impl AsRef<Path>) -> RepoResult<Self> {
        Ok(Self::from_connection(open_db(path)?))
    }

    pub fn open_in_memory() -> RepoResult<Self> {
        Ok(Self::from_connection(open_db_in_memory()?))
    }

    /// Wraps an already bootstrapped connection.
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn,
            changes: ChangeSet::default(),
        }
    }

    pub fn departments(&self) -> DepartmentRepository<'_> {
        SqliteRepository::new(&self.conn, &self.changes)
    }

    pub fn employees(&self) -> EmployeeRepository<'_> {
        SqliteRepository::new(&self.conn, &self.changes)
    }

    pub fn tasks(&self) -> TaskRepository<'_> {
        SqliteRepository::new(&self.conn, &self.changes)
    }

    pub fn assignments(&self) -> AssignmentRepository<'_> {
        SqliteRepository::new(&self.conn, &self.changes)
    }

    /// Underlying connection, for diagnostics and test fixtures.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn pending_changes(&self) -> &ChangeSet {
        &self.changes
    }

    pub fn has_pending_changes(&self) -> bool {
        !self.changes.is_empty()
    }

    pub fn in_transaction(&self) -> bool {
        !self.conn.is_autocommit()
    }

    /// Flushes buffered writes and returns the number of affected rows.
    ///
    /// Outside an explicit transaction the flush is atomic on its own.
    /// Inside one it runs under a savepoint: a failed flush is undone but
    /// the explicit transaction stays open for the caller to roll back.
    pub fn save_changes(&self) -> RepoResult<usize> {
        let writes = self.changes.take();
        if writes.is_empty() {
            return Ok(0);
        }

        let started_at = Instant::now();
        let write_count = writes.len();
        let (scope, result) = if self.in_transaction() {
            ("savepoint", self.flush_in_savepoint(writes))
        } else {
            ("transaction", self.flush_in_transaction(writes))
        };

        match &result {
            Ok(affected) => debug!(
                "event=save_changes module=uow status=ok scope={} writes={} affected={} duration_ms={}",
                scope,
                write_count,
                affected,
                started_at.elapsed().as_millis()
            ),
            Err(err) => warn!(
                "event=save_changes module=uow status=error scope={} writes={} duration_ms={} error={}",
                scope,
                write_count,
                started_at.elapsed().as_millis(),
                err
            ),
        }
        result
    }

    fn flush_in_transaction(&self, writes: Vec<PendingWrite>) -> RepoResult<usize> {
        let tx = Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)?;
        let affected = apply_writes(&tx, writes)?;
        tx.commit()?;
        Ok(affected)
    }

    fn flush_in_savepoint(&self, writes: Vec<PendingWrite>) -> RepoResult<usize> {
        self.conn.execute_batch(&format!("SAVEPOINT {FLUSH_SAVEPOINT};"))?;
        match apply_writes(&self.conn, writes) {
            Ok(affected) => {
                self.conn
                    .execute_batch(&format!("RELEASE SAVEPOINT {FLUSH_SAVEPOINT};"))?;
                Ok(affected)
            }
            Err(err) => {
                if let Err(undo_err) = self.conn.execute_batch(&format!(
                    "ROLLBACK TO SAVEPOINT {FLUSH_SAVEPOINT}; RELEASE SAVEPOINT {FLUSH_SAVEPOINT};"
                )) {
                    warn!(
                        "event=save_changes module=uow status=error stage=savepoint_undo error={}",
                        undo_err
                    );
                }
                Err(err)
            }
        }
    }

    /// Opens an explicit transaction. Fails fast if one is already open.
    pub fn begin_transaction(&self) -> RepoResult<()> {
        if self.in_transaction() {
            warn!("event=tx_begin module=uow status=error error_code=already_active");
            return Err(RepoError::TransactionAlreadyActive);
        }
        self.conn.execute_batch("BEGIN IMMEDIATE;")?;
        debug!("event=tx_begin module=uow status=ok");
        Ok(())
    }

    /// Flushes pending writes and commits.
    ///
    /// On any failure the transaction is rolled back before the error is
    /// returned, so no transaction is left open either way.
    pub fn commit_transaction(&self) -> RepoResult<usize> {
        if !self.in_transaction() {
            self.changes.clear();
            return Err(RepoError::NoActiveTransaction);
        }

        let result = self.save_changes().and_then(|affected| {
            self.conn.execute_batch("COMMIT;")?;
            Ok(affected)
        });

        match &result {
            Ok(affected) => {
                debug!("event=tx_commit module=uow status=ok affected={}", affected);
            }
            Err(err) => {
                warn!("event=tx_commit module=uow status=error error={}", err);
                self.release_transaction("tx_commit");
            }
        }
        result
    }

    /// Discards pending writes and rolls the open transaction back.
    pub fn rollback_transaction(&self) -> RepoResult<()> {
        self.changes.clear();
        if !self.in_transaction() {
            return Err(RepoError::NoActiveTransaction);
        }
        self.conn.execute_batch("ROLLBACK;")?;
        info!("event=tx_rollback module=uow status=ok");
        Ok(())
    }

    /// Runs `work` inside an explicit transaction, committing on `Ok` and
    /// rolling back on `Err`.
    pub fn run_in_transaction<T, E>(&self, work: impl FnOnce(&Self) -> Result<T, E>) -> Result<T, E>
    where
        E: From<RepoError>,
    {
        self.begin_transaction()?;
        match work(self) {
            Ok(value) => {
                self.commit_transaction()?;
                Ok(value)
            }
            Err(err) => {
                self.changes.clear();
                self.release_transaction("tx_scope");
                Err(err)
            }
        }
    }

    fn release_transaction(&self, event: &str) {
        self.changes.clear();
        if !self.in_transaction() {
            return;
        }
        match self.conn.execute_batch("ROLLBACK;") {
            Ok(()) => info!("event={} module=uow status=rolled_back", event),
            Err(err) => warn!(
                "event={} module=uow status=error stage=rollback error={}",
                event, err
            ),
        }
    }
}

impl Drop for UnitOfWork {
    fn drop(&mut self) {
        if !self.changes.is_empty() {
            warn!(
                "event=uow_drop module=uow status=discarded pending_writes={}",
                self.changes.len()
            );
        }
        if self.in_transaction() {
            warn!("event=uow_drop module=uow status=open_transaction");
            self.release_transaction("uow_drop");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::UnitOfWork;
    use crate::model::Department;
    use crate::repo::{RepoError, Repository};

    #[test]
    fn nested_begin_fails_fast() {
        let uow = UnitOfWork::open_in_memory().unwrap();
        uow.begin_transaction().unwrap();
        assert!(matches!(
            uow.begin_transaction(),
            Err(RepoError::TransactionAlreadyActive)
        ));
        uow.rollback_transaction().unwrap();
        assert!(!uow.in_transaction());
    }

    #[test]
    fn commit_without_transaction_is_rejected() {
        let uow = UnitOfWork::open_in_memory().unwrap();
        assert!(matches!(
            uow.commit_transaction(),
            Err(RepoError::NoActiveTransaction)
        ));
        assert!(matches!(
            uow.rollback_transaction(),
            Err(RepoError::NoActiveTransaction)
        ));
    }

    #[test]
    fn rollback_discards_buffered_and_flushed_writes() {
        let uow = UnitOfWork::open_in_memory().unwrap();
        uow.begin_transaction().unwrap();
        let flushed = Department::new("Flushed");
        uow.departments().add(&flushed).unwrap();
        assert_eq!(uow.save_changes().unwrap(), 1);
        uow.departments().add(&Department::new("Buffered")).unwrap();

        uow.rollback_transaction().unwrap();

        assert!(!uow.has_pending_changes());
        assert!(uow.departments().find(&flushed.id, false).unwrap().is_none());
    }

    #[test]
    fn dropping_open_transaction_rolls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("org.sqlite3");
        let department = Department::new("Ephemeral");
        {
            let uow = UnitOfWork::open(&path).unwrap();
            uow.begin_transaction().unwrap();
            uow.departments().add(&department).unwrap();
            uow.save_changes().unwrap();
        }
        let uow = UnitOfWork::open(&path).unwrap();
        assert!(uow.departments().find(&department.id, false).unwrap().is_none());
    }
}
