//! Session continuity.
//!
//! A session is a contiguous span of countable activity. A gap of more than
//! [`SESSION_GAP_MS`] since the last countable tick ends it; the next
//! countable tick starts a new one.

use serde::{Deserialize, Serialize};

use super::state::TrackingState;

/// Gap after which a session is considered ended.
pub const SESSION_GAP_MS: i64 = 5 * 60 * 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionUpdate {
    Started,
    Continued,
}

/// Record a countable tick at `now_ms`.
pub fn record_activity(state: &mut TrackingState, now_ms: i64) -> SessionUpdate {
    let ended = state.session_start_time == 0
        || now_ms - state.last_activity_time > SESSION_GAP_MS;
    if ended {
        state.session_start_time = now_ms;
        state.last_activity_time = now_ms;
        SessionUpdate::Started
    } else {
        state.last_activity_time = now_ms;
        SessionUpdate::Continued
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    const MINUTE: i64 = 60_000;

    fn state() -> TrackingState {
        TrackingState::new(NaiveDate::from_ymd_opt(2026, 3, 4).unwrap(), 90)
    }

    #[test]
    fn first_tick_starts_session() {
        let mut s = state();
        assert_eq!(record_activity(&mut s, 10 * MINUTE), SessionUpdate::Started);
        assert_eq!(s.session_start_time, 10 * MINUTE);
        assert_eq!(s.last_activity_time, 10 * MINUTE);
    }

    #[test]
    fn consecutive_ticks_keep_start_stable() {
        let mut s = state();
        record_activity(&mut s, 10 * MINUTE);
        for i in 1..=20 {
            assert_eq!(
                record_activity(&mut s, (10 + i) * MINUTE),
                SessionUpdate::Continued
            );
        }
        assert_eq!(s.session_start_time, 10 * MINUTE);
        assert_eq!(s.last_activity_time, 30 * MINUTE);
    }

    #[test]
    fn gap_of_exactly_five_minutes_continues() {
        let mut s = state();
        record_activity(&mut s, 10 * MINUTE);
        assert_eq!(
            record_activity(&mut s, 15 * MINUTE),
            SessionUpdate::Continued
        );
        assert_eq!(s.session_start_time, 10 * MINUTE);
    }

    #[test]
    fn gap_over_five_minutes_restarts() {
        let mut s = state();
        record_activity(&mut s, 10 * MINUTE);
        let later = 15 * MINUTE + 1;
        assert_eq!(record_activity(&mut s, later), SessionUpdate::Started);
        assert_eq!(s.session_start_time, later);
        assert_eq!(s.last_activity_time, later);
    }
}
