use orgledger_core::db::migrations::{latest_version, schema_version};
use orgledger_core::db::{open_db, open_db_in_memory, DbError};
use rusqlite::Connection;

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn).unwrap(), latest_version());
    for table in ["departments", "employees", "tasks", "task_assignments"] {
        assert_table_exists(&conn, table);
    }
}

#[test]
fn reopening_a_file_database_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("org.sqlite3");

    let first = open_db(&path).unwrap();
    assert_eq!(schema_version(&first).unwrap(), latest_version());
    drop(first);

    let second = open_db(&path).unwrap();
    assert_eq!(schema_version(&second).unwrap(), latest_version());
    assert_table_exists(&second, "task_assignments");
}

#[test]
fn newer_schema_version_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.sqlite3");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    match open_db(&path).unwrap_err() {
        DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        } => {
            assert_eq!(db_version, 999);
            assert_eq!(latest_supported, latest_version());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn foreign_keys_are_enforced() {
    let conn = open_db_in_memory().unwrap();
    let enabled: i64 = conn
        .query_row("PRAGMA foreign_keys;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(enabled, 1);

    let orphan = conn.execute(
        "INSERT INTO employees (id, first_name, last_name, salary_cents, department_id, created_at)
         VALUES ('e-1', 'No', 'Department', 0, 'missing', 0);",
        [],
    );
    assert!(orphan.is_err());
}

#[test]
fn task_assignment_pairs_are_unique() {
    let conn = open_db_in_memory().unwrap();
    conn.execute_batch(
        "INSERT INTO departments (id, name, created_at) VALUES ('d', 'Ops', 0);
         INSERT INTO employees (id, first_name, last_name, salary_cents, department_id, created_at)
         VALUES ('e', 'A', 'B', 0, 'd', 0);
         INSERT INTO tasks (id, title, status, priority, start_at, due_at, employee_id, created_at)
         VALUES ('t', 'T', 'new', 2, 0, 0, 'e', 0);
         INSERT INTO task_assignments (task_id, employee_id, assigned_at) VALUES ('t', 'e', 0);",
    )
    .unwrap();

    let duplicate = conn.execute(
        "INSERT INTO task_assignments (task_id, employee_id, assigned_at) VALUES ('t', 'e', 1);",
        [],
    );
    assert!(duplicate.is_err());
}

fn assert_table_exists(conn: &Connection, table_name: &str) {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table_name],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(exists, 1, "table {table_name} does not exist");
}
