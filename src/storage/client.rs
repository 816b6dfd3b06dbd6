use rusqlite::{Connection, OpenFlags, Transaction, TransactionBehavior};
use std::path::Path;
use std::time::Duration;
use log::{debug, info, warn};
use parking_lot::Mutex;
use crate::error::{TrackerError, TrackerResult};
use crate::storage::migrations::{self, SchemaStatus};

/// Owns the single SQLite connection. Components receive it as `Arc<StorageClient>`
/// and run every write through [`StorageClient::write`], which holds both the
/// connection lock and an IMMEDIATE transaction for the whole closure.
pub struct StorageClient {
    conn: Mutex<Option<Connection>>,
}

impl StorageClient {
    pub fn open<P: AsRef<Path>>(path: P, busy_timeout: Duration) -> TrackerResult<Self> {
        let path = path.as_ref();
        info!("Opening governor database at {}", path.display());

        let conn = Connection::open(path)?;
        conn.busy_timeout(busy_timeout)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA foreign_keys = ON;",
        )?;

        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> TrackerResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        Self::from_connection(conn)
    }

    /// Wraps an existing connection and brings its schema up to date.
    pub fn from_connection(mut conn: Connection) -> TrackerResult<Self> {
        let status = migrations::migrate(&mut conn)?;
        info!("Database schema at version {}", status.current_version);

        Ok(StorageClient {
            conn: Mutex::new(Some(conn)),
        })
    }

    /// Schema status of the database at `path`, opened read-only and left untouched.
    /// `None` when there is no database file yet.
    pub fn inspect<P: AsRef<Path>>(path: P) -> TrackerResult<Option<SchemaStatus>> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(None);
        }
        let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
        let status = migrations::schema_status(&conn)?;
        Ok(Some(status))
    }

    pub fn schema_status(&self) -> TrackerResult<SchemaStatus> {
        self.read(|conn| migrations::schema_status(conn))
    }

    pub fn revert_to(&self, version: i64) -> TrackerResult<SchemaStatus> {
        let mut guard = self.conn.lock();
        let conn = guard.as_mut().ok_or_else(closed)?;
        migrations::revert_to(conn, version)
    }

    /// Runs read-only work against the connection.
    pub fn read<T, F>(&self, f: F) -> TrackerResult<T>
    where
        F: FnOnce(&Connection) -> TrackerResult<T>,
    {
        let guard = self.conn.lock();
        let conn = guard.as_ref().ok_or_else(closed)?;
        f(conn)
    }

    /// Runs `f` inside an IMMEDIATE transaction. The write lock is taken before the
    /// first statement, so checks made inside `f` still hold when it writes.
    /// Returning an error from `f` rolls everything back.
    pub fn write<T, F>(&self, f: F) -> TrackerResult<T>
    where
        F: FnOnce(&Transaction<'_>) -> TrackerResult<T>,
    {
        let mut guard = self.conn.lock();
        let conn = guard.as_mut().ok_or_else(closed)?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let out = f(&tx)?;
        tx.commit()?;
        Ok(out)
    }

    pub fn is_open(&self) -> bool {
        self.conn.lock().is_some()
    }

    pub fn close(&self) -> TrackerResult<()> {
        info!("Closing StorageClient...");
        let conn = self.conn.lock().take();
        match conn {
            Some(conn) => {
                if let Err((_, e)) = conn.close() {
                    warn!("Error while closing the database: {}", e);
                    return Err(e.into());
                }
                debug!("Database connection closed");
            }
            None => debug!("StorageClient already closed"),
        }
        Ok(())
    }
}

fn closed() -> TrackerError {
    TrackerError::StorageUnavailable("database connection is closed".to_string())
}
