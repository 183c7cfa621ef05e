use rusqlite::Connection;
use venuedir_core::db::migrations::{current_user_version, latest_version};
use venuedir_core::db::{open_db, open_db_in_memory, DbError};

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    assert_table_exists(&conn, "venues");
    assert_table_exists(&conn, "venue_links");
    assert_table_exists(&conn, "event_refs");
}

#[test]
fn opening_same_database_twice_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("venues.db");

    let conn_first = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_first), latest_version());
    drop(conn_first);

    let conn_second = open_db(&path).unwrap();
    assert_eq!(current_user_version(&conn_second).unwrap(), latest_version());
    assert_table_exists(&conn_second, "venues");
}

#[test]
fn file_databases_use_wal_and_foreign_keys() {
    let dir = tempfile::tempdir().unwrap();
    let conn = open_db(dir.path().join("wal.db")).unwrap();

    let journal_mode: String = conn
        .query_row("PRAGMA journal_mode;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(journal_mode.to_ascii_lowercase(), "wal");

    let foreign_keys: i64 = conn
        .query_row("PRAGMA foreign_keys;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(foreign_keys, 1);
}

#[test]
fn live_venue_names_are_unique_at_the_storage_layer() {
    let conn = open_db_in_memory().unwrap();
    conn.execute(
        "INSERT INTO venues (uuid, name) VALUES ('a', 'The Loft');",
        [],
    )
    .unwrap();

    let duplicate = conn.execute(
        "INSERT INTO venues (uuid, name) VALUES ('b', 'The Loft');",
        [],
    );
    assert!(duplicate.is_err());

    conn.execute("UPDATE venues SET is_deleted = 1 WHERE uuid = 'a';", [])
        .unwrap();
    conn.execute(
        "INSERT INTO venues (uuid, name) VALUES ('b', 'The Loft');",
        [],
    )
    .unwrap();
}

#[test]
fn one_link_per_event_is_enforced_by_the_primary_key() {
    let conn = open_db_in_memory().unwrap();
    conn.execute_batch(
        "INSERT INTO venues (uuid, name) VALUES ('a', 'A'), ('b', 'B');
         INSERT INTO venue_links (relation, event_uuid, venue_uuid)
         VALUES ('venue_to_event', 'e1', 'a');",
    )
    .unwrap();

    let second = conn.execute(
        "INSERT INTO venue_links (relation, event_uuid, venue_uuid)
         VALUES ('venue_to_event', 'e1', 'b');",
        [],
    );
    assert!(second.is_err());

    let missing_target = conn.execute(
        "INSERT INTO venue_links (relation, event_uuid, venue_uuid)
         VALUES ('venue_to_event', 'e2', 'nope');",
        [],
    );
    assert!(missing_target.is_err());
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
fn stamped_database_missing_a_venue_table_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tampered.db");

    drop(open_db(&path).unwrap());
    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("DROP TABLE event_refs;").unwrap();
    drop(conn);

    let err = open_db(&path).unwrap_err();
    match err {
        DbError::MissingTable { table, version } => {
            assert_eq!(table, "event_refs");
            assert_eq!(version, 2);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn partially_migrated_database_is_brought_up_to_date() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("v1.db");

    drop(open_db(&path).unwrap());
    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("DROP TABLE event_refs; PRAGMA user_version = 1;")
        .unwrap();
    drop(conn);

    let conn = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn), latest_version());
    assert_table_exists(&conn, "event_refs");
}

fn schema_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
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
