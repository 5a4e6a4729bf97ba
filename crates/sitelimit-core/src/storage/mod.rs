mod config;
pub mod database;
mod memory;

pub use config::{Config, DaemonConfig, LoggingConfig, TrackingConfig, WarningConfig};
pub use database::Database;
pub use memory::MemoryStore;

use std::path::PathBuf;

use crate::error::{ConfigError, StoreError};

/// Read-write view of a store inside [`KvStore::transaction`].
pub trait KvTxn {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Store several values. The default writes them one by one.
    fn set_many(&self, entries: &[(&str, String)]) -> Result<(), StoreError> {
        for (key, value) in entries {
            self.set(key, value)?;
        }
        Ok(())
    }
}

/// Named-value store the tracker persists through.
///
/// Values are opaque strings (JSON in practice). Single-key `get`/`set` are
/// atomic on their own; read-modify-write sequences go through
/// [`KvStore::transaction`].
pub trait KvStore: Send + Sync {
    /// Get the value stored under `key`, if any.
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Store `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Run `f` with exclusive access to the store.
    ///
    /// No other handle on the same store, in this process or another, reads
    /// or writes in between. If `f` fails, nothing it wrote is kept.
    fn transaction(
        &self,
        f: &mut dyn FnMut(&dyn KvTxn) -> Result<(), StoreError>,
    ) -> Result<(), StoreError>;
}

/// Returns the data directory, creating it if needed.
///
/// `SITELIMIT_DATA_DIR` overrides the location outright. Otherwise this is
/// `~/.config/sitelimit[-dev]/`, with `SITELIMIT_ENV=dev` selecting the
/// development directory.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let dir = match std::env::var_os("SITELIMIT_DATA_DIR") {
        Some(dir) => PathBuf::from(dir),
        None => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");
            let env = std::env::var("SITELIMIT_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("sitelimit-dev")
            } else {
                base_dir.join("sitelimit")
            }
        }
    };

    std::fs::create_dir_all(&dir)
        .map_err(|e| ConfigError::DataDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}
