use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::host::TabId;
use crate::tracker::{BadgeColor, SessionUpdate};

/// Every observable state change produces an Event.
/// The presentation layer subscribes to them instead of polling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    /// A countable tick added time to today's counter.
    TickCounted {
        total_today_seconds: u64,
        session: SessionUpdate,
        at: DateTime<Utc>,
    },
    BadgeUpdated {
        label: String,
        color: BadgeColor,
        remaining_minutes: u64,
        at: DateTime<Utc>,
    },
    /// The limit is reached and the warning should be presented now.
    WarningDue {
        elapsed_seconds: u64,
        limit_seconds: u64,
        /// Presented on request, bypassing the once-per-day check.
        forced: bool,
        at: DateTime<Utc>,
    },
    Snoozed {
        until_epoch_ms: i64,
        at: DateTime<Utc>,
    },
    DailyReset {
        date: NaiveDate,
        at: DateTime<Utc>,
    },
    CounterReset {
        at: DateTime<Utc>,
    },
    ReminderReset {
        at: DateTime<Utc>,
    },
    LimitChanged {
        limit_minutes: u32,
        at: DateTime<Utc>,
    },
    SitesClosed {
        tab_ids: Vec<TabId>,
        at: DateTime<Utc>,
    },
}
