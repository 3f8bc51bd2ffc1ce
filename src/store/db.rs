//! Shared connection handle. All three logical stores share one embedded
//! SQLite database (see SPEC_FULL.md §6); `Db` is the single point of
//! connection ownership, mirroring the codebase's existing
//! mutex-guarded-`Connection` pattern for its own signal storage.

use parking_lot::Mutex;
use rusqlite::Connection;
use std::sync::Arc;

use crate::errors::StoreError;
use crate::store::schema;

#[derive(Clone)]
pub struct Db {
    conn: Arc<Mutex<Connection>>,
}

impl Db {
    pub fn open(path: &str) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        schema::initialize(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        schema::initialize(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> rusqlite::Result<T>) -> Result<T, StoreError> {
        let conn = self.conn.lock();
        f(&conn).map_err(StoreError::from)
    }
}
