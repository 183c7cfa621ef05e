//! Write-scope helper shared by repositories and services.

use rusqlite::{Connection, ErrorCode, Transaction, TransactionBehavior};

/// Runs `body` inside one `BEGIN IMMEDIATE` transaction.
///
/// When `conn` already has an open transaction, `body` joins it and the
/// outer owner decides commit or rollback. Any error returned by `body`
/// drops the transaction, which rolls it back.
///
/// # Errors
/// - Returns `SQLITE_BUSY` wrapped in `E` when the write lock cannot be taken
///   within the connection busy timeout.
pub fn with_write_tx<T, E>(
    conn: &Connection,
    body: impl FnOnce(&Connection) -> Result<T, E>,
) -> Result<T, E>
where
    E: From<rusqlite::Error>,
{
    if !conn.is_autocommit() {
        return body(conn);
    }

    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
    let value = body(&*tx)?;
    tx.commit()?;
    Ok(value)
}

/// Runs `body` against one read snapshot.
///
/// Multi-statement reads never observe a write committed halfway through.
/// Joins an already-open transaction like `with_write_tx`.
pub fn with_read_snapshot<T, E>(
    conn: &Connection,
    body: impl FnOnce(&Connection) -> Result<T, E>,
) -> Result<T, E>
where
    E: From<rusqlite::Error>,
{
    if !conn.is_autocommit() {
        return body(conn);
    }

    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Deferred)?;
    let value = body(&*tx)?;
    tx.commit()?;
    Ok(value)
}

/// Returns whether a SQLite error means another writer holds the lock.
pub fn is_lock_contention(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(failure, _) => matches!(
            failure.code,
            ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked
        ),
        _ => false,
    }
}
