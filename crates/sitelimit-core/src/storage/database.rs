//! SQLite-backed key-value store.
//!
//! A single `kv` table holds every persisted field of the tracking state and
//! the settings, one row per key. Several processes may open the same file;
//! [`KvStore::transaction`] takes SQLite's write lock up front so their
//! read-modify-write sequences never interleave.

use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use rusqlite::{params, Connection, TransactionBehavior};

use super::{data_dir, KvStore, KvTxn};
use crate::error::{CoreError, StoreError};

/// How long to wait for another connection's write lock.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite database holding the key-value table.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open the database at `<data dir>/sitelimit.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the data directory is unavailable or the database
    /// cannot be opened or migrated.
    pub fn open() -> Result<Self, CoreError> {
        let path = data_dir()?.join("sitelimit.db");
        Ok(Self::open_at(&path)?)
    }

    /// Open (or create) the database at an explicit path.
    pub fn open_at(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(|source| StoreError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<(), StoreError> {
        self.conn.lock()?.execute_batch(
            "CREATE TABLE IF NOT EXISTS kv (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );",
        )?;
        Ok(())
    }
}

impl KvStore for Database {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        kv_get(&*self.conn.lock()?, key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        kv_set(&*self.conn.lock()?, key, value)
    }

    fn transaction(
        &self,
        f: &mut dyn FnMut(&dyn KvTxn) -> Result<(), StoreError>,
    ) -> Result<(), StoreError> {
        let mut conn = self.conn.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        f(&SqlTxn(&tx))?;
        tx.commit()?;
        Ok(())
    }
}

/// Statements run on the connection of an open transaction.
struct SqlTxn<'a>(&'a Connection);

impl KvTxn for SqlTxn<'_> {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        kv_get(self.0, key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        kv_set(self.0, key, value)
    }
}

fn kv_get(conn: &Connection, key: &str) -> Result<Option<String>, StoreError> {
    let mut stmt = conn.prepare_cached("SELECT value FROM kv WHERE key = ?1")?;
    let result = stmt.query_row(params![key], |row| row.get::<_, String>(0));
    match result {
        Ok(v) => Ok(Some(v)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn kv_set(conn: &Connection, key: &str, value: &str) -> Result<(), StoreError> {
    conn.prepare_cached("INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)")?
        .execute(params![key, value])?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kv_store() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.get("test").unwrap().is_none());
        db.set("test", "hello").unwrap();
        assert_eq!(db.get("test").unwrap().unwrap(), "hello");
    }

    #[test]
    fn transaction_writes_are_visible_to_get() {
        let db = Database::open_in_memory().unwrap();
        db.transaction(&mut |txn| txn.set_many(&[("a", "1".into()), ("b", "true".into())]))
            .unwrap();
        assert_eq!(db.get("a").unwrap().as_deref(), Some("1"));
        assert_eq!(db.get("b").unwrap().as_deref(), Some("true"));
    }

    #[test]
    fn failed_transaction_rolls_back() {
        let db = Database::open_in_memory().unwrap();
        db.set("a", "1").unwrap();
        let result = db.transaction(&mut |txn| {
            txn.set("a", "2")?;
            Err(StoreError::Locked)
        });
        assert!(result.is_err());
        assert_eq!(db.get("a").unwrap().as_deref(), Some("1"));
    }

    #[test]
    fn handles_on_one_file_do_not_lose_increments() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kv.db");
        let handles: Vec<Database> = (0..2).map(|_| Database::open_at(&path).unwrap()).collect();

        std::thread::scope(|s| {
            for db in &handles {
                s.spawn(move || {
                    for _ in 0..100 {
                        db.transaction(&mut |txn| {
                            let n: u64 = txn.get("n")?.map_or(0, |v| v.parse().unwrap());
                            txn.set("n", &(n + 1).to_string())
                        })
                        .unwrap();
                    }
                });
            }
        });

        assert_eq!(handles[0].get("n").unwrap().as_deref(), Some("200"));
    }

    #[test]
    fn values_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kv.db");
        {
            let db = Database::open_at(&path).unwrap();
            db.set("totalTodaySeconds", "120").unwrap();
        }
        let db = Database::open_at(&path).unwrap();
        assert_eq!(db.get("totalTodaySeconds").unwrap().as_deref(), Some("120"));
    }
}
