//! Settings provider: owns the daily limit.
//!
//! The limit is persisted in the key-value store under
//! [`TIME_LIMIT_KEY`]. Writes are validated and rejected, never clamped.
//! Reads never fail: a store error or a corrupt value yields the default.
//!
//! Construct one provider and share it (`Arc`) with everything that needs
//! the limit, so all subscribers hear about changes. Changes written by
//! another process or provider are picked up by [`SettingsProvider::poll_changes`].

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::Value;

use crate::error::{CoreError, ValidationError};
use crate::storage::KvStore;

pub const DEFAULT_TIME_LIMIT: u32 = 90;
pub const MIN_TIME_LIMIT: u32 = 5;
pub const MAX_TIME_LIMIT: u32 = 480;
pub const TIME_LIMIT_KEY: &str = "timeLimitMinutes";

pub type SettingsListener = Arc<dyn Fn(u32) + Send + Sync>;

/// Handle returned by [`SettingsProvider::on_settings_changed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Check a candidate limit.
///
/// Accepts JSON numbers with no fractional part inside
/// `[MIN_TIME_LIMIT, MAX_TIME_LIMIT]`.
pub fn validate_time_limit(value: &Value) -> Result<u32, ValidationError> {
    let Value::Number(n) = value else {
        return Err(ValidationError::NotANumber);
    };
    let whole = match (n.as_i64(), n.as_f64()) {
        (Some(i), _) => i as f64,
        (None, Some(f)) if f.fract() == 0.0 => f,
        (None, Some(_)) => return Err(ValidationError::NotAnInteger),
        (None, None) => return Err(ValidationError::NotANumber),
    };
    if whole < f64::from(MIN_TIME_LIMIT) {
        return Err(ValidationError::BelowMinimum {
            min: MIN_TIME_LIMIT,
        });
    }
    if whole > f64::from(MAX_TIME_LIMIT) {
        return Err(ValidationError::AboveMaximum {
            max: MAX_TIME_LIMIT,
        });
    }
    Ok(whole as u32)
}

pub struct SettingsProvider {
    store: Arc<dyn KvStore>,
    listeners: Mutex<Vec<(SubscriptionId, SettingsListener)>>,
    next_id: AtomicU64,
    /// Last limit announced to listeners.
    last_seen: AtomicU32,
}

impl SettingsProvider {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        let provider = Self {
            store,
            listeners: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            last_seen: AtomicU32::new(DEFAULT_TIME_LIMIT),
        };
        provider
            .last_seen
            .store(provider.time_limit(), Ordering::SeqCst);
        provider
    }

    /// Current limit in minutes.
    pub fn time_limit(&self) -> u32 {
        let raw = match self.store.get(TIME_LIMIT_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return DEFAULT_TIME_LIMIT,
            Err(e) => {
                tracing::warn!(error = %e, "could not read time limit, using default");
                return DEFAULT_TIME_LIMIT;
            }
        };
        let parsed = serde_json::from_str::<Value>(&raw)
            .ok()
            .and_then(|v| validate_time_limit(&v).ok());
        parsed.unwrap_or_else(|| {
            tracing::warn!(stored = %raw, "stored time limit is invalid, using default");
            DEFAULT_TIME_LIMIT
        })
    }

    /// Validate, persist and announce a new limit.
    ///
    /// # Errors
    /// Returns [`CoreError::Validation`] for rejected values (nothing is
    /// written) or [`CoreError::Store`] if persisting fails.
    pub fn set_time_limit(&self, value: impl Into<Value>) -> Result<u32, CoreError> {
        let minutes = validate_time_limit(&value.into())?;
        self.store.set(TIME_LIMIT_KEY, &minutes.to_string())?;
        tracing::info!(minutes, "time limit updated");
        self.last_seen.store(minutes, Ordering::SeqCst);
        self.notify(minutes);
        Ok(minutes)
    }

    /// Re-read the stored limit and announce it if it differs from the last
    /// one this provider saw. Returns the new limit when it changed.
    pub fn poll_changes(&self) -> Option<u32> {
        let current = self.time_limit();
        let previous = self.last_seen.swap(current, Ordering::SeqCst);
        if previous == current {
            return None;
        }
        tracing::info!(from = previous, to = current, "time limit changed elsewhere");
        self.notify(current);
        Some(current)
    }

    pub fn reset_to_default(&self) -> Result<u32, CoreError> {
        self.set_time_limit(DEFAULT_TIME_LIMIT)
    }

    /// Register `listener` to be called with every new limit.
    pub fn on_settings_changed(
        &self,
        listener: impl Fn(u32) + Send + Sync + 'static,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        if let Ok(mut listeners) = self.listeners.lock() {
            listeners.push((id, Arc::new(listener)));
        }
        id
    }

    /// Returns `false` if `id` was not subscribed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let Ok(mut listeners) = self.listeners.lock() else {
            return false;
        };
        let before = listeners.len();
        listeners.retain(|(sid, _)| *sid != id);
        listeners.len() != before
    }

    fn notify(&self, limit: u32) {
        // Snapshot first so listeners may (un)subscribe while being called.
        let listeners: Vec<SettingsListener> = match self.listeners.lock() {
            Ok(listeners) => listeners.iter().map(|(_, l)| Arc::clone(l)).collect(),
            Err(_) => return,
        };
        for listener in listeners {
            if catch_unwind(AssertUnwindSafe(|| listener(limit))).is_err() {
                tracing::error!(limit, "settings listener panicked");
            }
        }
    }
}
