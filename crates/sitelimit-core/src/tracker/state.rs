//! The persisted tracking record and its single-writer accessor.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::session::SESSION_GAP_MS;
use crate::error::StoreError;
use crate::storage::{KvStore, KvTxn};

/// Store keys, one per field.
pub mod keys {
    pub const TOTAL_TODAY_SECONDS: &str = "totalTodaySeconds";
    pub const LAST_RESET_DATE: &str = "lastResetDate";
    pub const LIMIT_MINUTES: &str = "limitMinutes";
    pub const REMINDED_TODAY: &str = "remindedToday";
    pub const SNOOZE_UNTIL: &str = "snoozeUntil";
    pub const SESSION_START_TIME: &str = "sessionStartTime";
    pub const LAST_ACTIVITY_TIME: &str = "lastActivityTime";
}

/// Accumulated state for the current day.
///
/// Timestamps are epoch milliseconds, with `0` meaning "unset".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingState {
    pub total_today_seconds: u64,
    pub last_reset_date: NaiveDate,
    /// Cached copy of the configured limit. May be stale.
    pub limit_minutes: u32,
    pub reminded_today: bool,
    pub snooze_until: i64,
    pub session_start_time: i64,
    pub last_activity_time: i64,
}

impl TrackingState {
    /// Fresh state for `today`.
    pub fn new(today: NaiveDate, limit_minutes: u32) -> Self {
        Self {
            total_today_seconds: 0,
            last_reset_date: today,
            limit_minutes,
            reminded_today: false,
            snooze_until: 0,
            session_start_time: 0,
            last_activity_time: 0,
        }
    }

    /// Read every field from `store`, taking missing or unreadable ones
    /// from `fresh`.
    ///
    /// # Errors
    /// Returns an error only if the store itself fails.
    pub fn load(store: &dyn KvTxn, fresh: TrackingState) -> Result<Self, StoreError> {
        Ok(Self {
            total_today_seconds: read_field(
                store,
                keys::TOTAL_TODAY_SECONDS,
                fresh.total_today_seconds,
            )?,
            last_reset_date: read_field(store, keys::LAST_RESET_DATE, fresh.last_reset_date)?,
            limit_minutes: read_field(store, keys::LIMIT_MINUTES, fresh.limit_minutes)?,
            reminded_today: read_field(store, keys::REMINDED_TODAY, fresh.reminded_today)?,
            snooze_until: read_field(store, keys::SNOOZE_UNTIL, fresh.snooze_until)?,
            session_start_time: read_field(
                store,
                keys::SESSION_START_TIME,
                fresh.session_start_time,
            )?,
            last_activity_time: read_field(
                store,
                keys::LAST_ACTIVITY_TIME,
                fresh.last_activity_time,
            )?,
        })
    }

    /// Write every field to `store`.
    pub fn save(&self, store: &dyn KvTxn) -> Result<(), StoreError> {
        let encode = |value: serde_json::Value| value.to_string();
        store.set_many(&[
            (
                keys::TOTAL_TODAY_SECONDS,
                encode(self.total_today_seconds.into()),
            ),
            (
                keys::LAST_RESET_DATE,
                encode(self.last_reset_date.to_string().into()),
            ),
            (keys::LIMIT_MINUTES, encode(self.limit_minutes.into())),
            (keys::REMINDED_TODAY, encode(self.reminded_today.into())),
            (keys::SNOOZE_UNTIL, encode(self.snooze_until.into())),
            (
                keys::SESSION_START_TIME,
                encode(self.session_start_time.into()),
            ),
            (
                keys::LAST_ACTIVITY_TIME,
                encode(self.last_activity_time.into()),
            ),
        ])
    }

    pub fn limit_seconds(&self) -> u64 {
        u64::from(self.limit_minutes) * 60
    }

    /// A session is live while it has started and its last activity is
    /// less than the session gap ago.
    pub fn is_session_live(&self, now_ms: i64) -> bool {
        self.session_start_time != 0
            && self.last_activity_time != 0
            && now_ms - self.last_activity_time < SESSION_GAP_MS
    }

    /// Counter plus the whole seconds elapsed in the live session, if any.
    pub fn precise_total_seconds(&self, now_ms: i64) -> u64 {
        if !self.is_session_live(now_ms) {
            return self.total_today_seconds;
        }
        let session_secs = (now_ms - self.session_start_time).max(0) / 1000;
        self.total_today_seconds + session_secs as u64
    }

    pub fn is_snoozed(&self, now_ms: i64) -> bool {
        self.snooze_until != 0 && now_ms < self.snooze_until
    }

    /// Zero the counter, reminder, snooze and session; keep the date.
    pub fn clear_counters(&mut self) {
        self.total_today_seconds = 0;
        self.reminded_today = false;
        self.snooze_until = 0;
        self.session_start_time = 0;
        self.last_activity_time = 0;
    }
}

fn read_field<T: DeserializeOwned>(
    store: &dyn KvTxn,
    key: &str,
    fallback: T,
) -> Result<T, StoreError> {
    let Some(raw) = store.get(key)? else {
        return Ok(fallback);
    };
    match serde_json::from_str(&raw) {
        Ok(value) => Ok(value),
        Err(e) => {
            tracing::warn!(key, error = %e, "ignoring unreadable stored value");
            Ok(fallback)
        }
    }
}

/// Transactional load-modify-save access to [`TrackingState`].
///
/// Every read and write of the tracking record runs inside one store
/// transaction, so the periodic tick and on-demand requests never interleave
/// their read-then-write sequences, even from separate processes sharing
/// the store.
#[derive(Clone)]
pub struct StateCell {
    store: Arc<dyn KvStore>,
}

impl StateCell {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    /// Current state, without writing anything back.
    pub fn read(&self, fresh: TrackingState) -> Result<TrackingState, StoreError> {
        let mut loaded = None;
        self.store.transaction(&mut |txn| {
            loaded = Some(TrackingState::load(txn, fresh.clone())?);
            Ok(())
        })?;
        Ok(loaded.unwrap_or(fresh))
    }

    /// Load, apply `f`, save. Returns `f`'s result and the saved state.
    pub fn update<R>(
        &self,
        fresh: TrackingState,
        f: impl FnOnce(&mut TrackingState) -> R,
    ) -> Result<(R, TrackingState), StoreError> {
        let mut f = Some(f);
        let mut outcome = None;
        self.store.transaction(&mut |txn| {
            let Some(f) = f.take() else {
                return Ok(());
            };
            let mut state = TrackingState::load(txn, fresh.clone())?;
            let result = f(&mut state);
            state.save(txn)?;
            outcome = Some((result, state));
            Ok(())
        })?;
        outcome.ok_or_else(|| StoreError::QueryFailed("transaction body did not run".into()))
    }
}
