use rusqlite::Connection;
use taskforge_core::db::migrations::latest_version;
use taskforge_core::db::{
    open_db, open_db_in_memory, open_db_with_config, BootstrapStage, DbError,
};
use taskforge_core::record::PersistenceKind;
use taskforge_core::StoreConfig;

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    for table in [
        "companies",
        "users",
        "projects",
        "milestones",
        "tasks",
        "roles",
        "permissions",
        "templates",
        "role_permissions",
        "project_members",
    ] {
        assert_table_exists(&conn, table);
    }
}

#[test]
fn foreign_keys_are_enforced() {
    let conn = open_db_in_memory().unwrap();
    let enabled: i64 = conn
        .query_row("PRAGMA foreign_keys;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(enabled, 1);
}

#[test]
fn opening_same_database_twice_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("taskforge.db");

    let conn_first = open_db(&path).unwrap();
    conn_first
        .execute("INSERT INTO roles (name) VALUES ('admin')", [])
        .unwrap();
    drop(conn_first);

    let conn_second = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_second), latest_version());
    let roles: i64 = conn_second
        .query_row("SELECT COUNT(*) FROM roles", [], |row| row.get(0))
        .unwrap();
    assert_eq!(roles, 1);
}

#[test]
fn custom_config_sets_busy_timeout() {
    let dir = tempfile::tempdir().unwrap();
    let config = StoreConfig {
        busy_timeout_ms: 250,
        ..StoreConfig::default()
    };
    let conn = open_db_with_config(dir.path().join("busy.db"), &config).unwrap();
    let timeout: i64 = conn
        .query_row("PRAGMA busy_timeout;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(timeout, 250);
}

#[test]
fn opening_database_with_newer_schema_version_returns_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    let err = open_db(&path).unwrap_err();
    match err {
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
fn unreachable_path_reports_connect_stage_without_driver_text() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing").join("nested").join("taskforge.db");

    let err = open_db(&path).unwrap_err();
    assert!(matches!(
        err,
        DbError::Bootstrap {
            stage: BootstrapStage::Connect,
            kind: PersistenceKind::Other,
            ..
        }
    ));
    assert_eq!(err.code(), "db_open_failed");
    assert_eq!(err.to_string(), "database connect failed: storage failure");
    assert!(std::error::Error::source(&err).is_some());
}

#[test]
fn conflicting_schema_fails_migration_and_keeps_version() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("legacy.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("CREATE TABLE companies (legacy_code TEXT);")
        .unwrap();
    drop(conn);

    let err = open_db(&path).unwrap_err();
    assert!(matches!(err, DbError::Migration { version: 1, .. }));
    let message = err.to_string();
    assert_eq!(message, "failed to apply schema version 1: storage failure");
    assert!(!message.contains("already exists"));

    let conn = Connection::open(&path).unwrap();
    assert_eq!(schema_version(&conn), 0);
    let roles: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'roles'",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(roles, 0);
}

fn schema_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
}

fn assert_table_exists(conn: &Connection, table_name: &str) {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(
                SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1
            );",
            [table_name],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(exists, 1, "table `{table_name}` should exist");
}
