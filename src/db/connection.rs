use rusqlite::Connection;
use std::cell::RefCell;
use std::collections::HashMap;
use std::time::Duration;

use crate::errors::AppError;

pub const SCHEMA_SQL: &str = include_str!("../../sql/schema.sql");

// Thread-local connection slots, one per database path.
thread_local! {
    static DB_CONNS: RefCell<HashMap<String, Connection>> = RefCell::new(HashMap::new());
}

#[derive(Debug, Clone)]
pub struct Database {
    path: String,
}

impl Database {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Provides this thread's mutable connection to the closure.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, AppError>
    where
        F: FnOnce(&mut Connection) -> Result<T, AppError>,
    {
        DB_CONNS
            .try_with(|cell| {
                let mut slots = cell.borrow_mut();
                if !slots.contains_key(&self.path) {
                    let conn = open_connection(&self.path)?;
                    slots.insert(self.path.clone(), conn);
                }
                let conn = slots.get_mut(&self.path).ok_or(AppError::InternalError)?;
                f(conn)
            })
            .map_err(|_| AppError::InternalError)?
    }
}

fn open_connection(path: &str) -> Result<Connection, AppError> {
    let conn = Connection::open(path)
        .map_err(|e| AppError::DbError(format!("Open DB failed: {e}")))?;
    // Feed poller and writers share the file from different threads.
    conn.busy_timeout(Duration::from_secs(5))
        .map_err(|e| AppError::DbError(format!("Set busy timeout failed: {e}")))?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")
        .map_err(|e| AppError::DbError(format!("Enable foreign keys failed: {e}")))?;
    Ok(conn)
}

/// Apply the bundled schema to a raw connection (used by in-memory tests too).
pub fn apply_schema(conn: &Connection) -> Result<(), AppError> {
    conn.execute_batch(SCHEMA_SQL)
        .map_err(|e| AppError::DbError(format!("Failed to apply schema: {e}")))
}

/// Initialize the database from the bundled schema.
pub fn init_db(db: &Database) -> Result<(), AppError> {
    db.with_conn(|conn| apply_schema(conn))?;
    tracing::info!(path = db.path(), "database initialized");
    Ok(())
}
