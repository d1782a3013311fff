pub mod batch;
pub mod error;
pub mod guard;
pub mod migrations;
pub mod models;
pub mod queries;
pub mod sessions;

pub use error::DbError;
pub use guard::Access;

use rusqlite::{Connection, Transaction};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::info;

/// How long a statement waits on a locked database file before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Handle to the relational store.
///
/// A single connection behind a mutex: every caller gets exclusive use of it
/// for the duration of a closure, which also serializes write transactions.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let conn = Connection::open(path)?;

        // WAL mode for concurrent reads
        conn.pragma_update(None, "journal_mode", "WAL")?;

        let db = Self::init(conn)?;
        info!("Database opened at {}", path.display());
        Ok(db)
    }

    pub fn open_in_memory() -> anyhow::Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> anyhow::Result<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.busy_timeout(BUSY_TIMEOUT)?;

        migrations::run(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn with_conn<F, T>(&self, f: F) -> Result<T, DbError>
    where
        F: FnOnce(&Connection) -> Result<T, DbError>,
    {
        let conn = self.lock()?;
        f(&conn)
    }

    /// Runs `f` inside a transaction. Commits if `f` returns `Ok`; any error
    /// drops the transaction, which rolls it back.
    pub fn with_transaction<F, T>(&self, f: F) -> Result<T, DbError>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T, DbError>,
    {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let out = f(&tx)?;
        tx.commit()?;
        Ok(out)
    }

    pub(crate) fn lock(&self) -> Result<MutexGuard<'_, Connection>, DbError> {
        self.conn
            .lock()
            .map_err(|e| DbError::Poisoned(e.to_string()))
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use rusqlite::params;

    use crate::Database;

    pub fn db() -> Database {
        Database::open_in_memory().unwrap()
    }

    /// Inserts a user with a fixed id so tests can talk about "user 7".
    pub fn user(db: &Database, id: i64) {
        db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, username, password) VALUES (?1, ?2, 'x')",
                params![id, format!("user{id}")],
            )?;
            Ok(())
        })
        .unwrap();
    }

    /// Inserts a room owned by `owner`, who is also recorded as a member.
    pub fn room(db: &Database, id: i64, owner: i64, name: &str) {
        db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO rooms (id, name, owner_id) VALUES (?1, ?2, ?3)",
                params![id, name, owner],
            )?;
            conn.execute(
                "INSERT INTO user_rooms (user_id, room_id) VALUES (?1, ?2)",
                params![owner, id],
            )?;
            Ok(())
        })
        .unwrap();
    }

    pub fn product(db: &Database, id: i64, room: i64, name: &str, price: i64) {
        db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO products (id, name, price, room_id) VALUES (?1, ?2, ?3, ?4)",
                params![id, name, price, room],
            )?;
            Ok(())
        })
        .unwrap();
    }

    pub fn link(db: &Database, product: i64, user: i64, status: &str) {
        db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO user_products (product_id, user_id, status) VALUES (?1, ?2, ?3)",
                params![product, user, status],
            )?;
            Ok(())
        })
        .unwrap();
    }
}
