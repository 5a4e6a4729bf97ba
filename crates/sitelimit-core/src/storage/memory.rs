use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Mutex;

use super::{KvStore, KvTxn};
use crate::error::StoreError;

/// In-process store. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently stored.
    pub fn len(&self) -> usize {
        self.values.lock().map(|v| v.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.values.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.values.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn transaction(
        &self,
        f: &mut dyn FnMut(&dyn KvTxn) -> Result<(), StoreError>,
    ) -> Result<(), StoreError> {
        let mut values = self.values.lock()?;
        let working = Scratch(RefCell::new(values.clone()));
        f(&working)?;
        *values = working.0.into_inner();
        Ok(())
    }
}

/// Copy of the map that replaces the original only on success.
struct Scratch(RefCell<HashMap<String, String>>);

impl KvTxn for Scratch {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.0.borrow().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.0.borrow_mut().insert(key.to_string(), value.to_string());
        Ok(())
    }
}
