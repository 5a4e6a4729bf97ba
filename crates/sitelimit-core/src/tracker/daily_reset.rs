//! Daily rollover.

use chrono::{DateTime, NaiveDate, TimeDelta, TimeZone};

use super::state::TrackingState;

/// Roll the state over if its reset date is not `today`.
///
/// Returns `true` when a rollover happened. Calling it again for the same
/// date is a no-op.
pub fn maybe_reset(state: &mut TrackingState, today: NaiveDate) -> bool {
    if state.last_reset_date == today {
        return false;
    }
    reset_day(state, today);
    true
}

/// Zero the day's counters and flags and stamp `today`.
pub fn reset_day(state: &mut TrackingState, today: NaiveDate) {
    state.clear_counters();
    state.last_reset_date = today;
}

/// The first instant of the day after `now`, in `now`'s time zone.
///
/// When local midnight does not exist (a DST gap), the first valid instant
/// within the following hour is used instead.
pub fn next_local_midnight<Tz: TimeZone>(now: &DateTime<Tz>) -> DateTime<Tz> {
    let tz = now.timezone();
    let next_day = now.date_naive().succ_opt();
    let candidate = next_day.and_then(|day| {
        let midnight = day.and_hms_opt(0, 0, 0)?;
        tz.from_local_datetime(&midnight)
            .earliest()
            .or_else(|| {
                tz.from_local_datetime(&(midnight + TimeDelta::hours(1)))
                    .earliest()
            })
    });
    candidate.unwrap_or_else(|| now.clone() + TimeDelta::days(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, Timelike};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
    }

    fn dirty_state() -> TrackingState {
        let mut s = TrackingState::new(day(4), 90);
        s.total_today_seconds = 3600;
        s.reminded_today = true;
        s.snooze_until = 99;
        s.session_start_time = 42;
        s.last_activity_time = 43;
        s
    }

    #[test]
    fn same_date_is_noop() {
        let mut s = dirty_state();
        let before = s.clone();
        assert!(!maybe_reset(&mut s, day(4)));
        assert_eq!(s, before);
    }

    #[test]
    fn new_date_zeroes_all_fields() {
        let mut s = dirty_state();
        assert!(maybe_reset(&mut s, day(5)));
        assert_eq!(s.total_today_seconds, 0);
        assert!(!s.reminded_today);
        assert_eq!(s.snooze_until, 0);
        assert_eq!(s.session_start_time, 0);
        assert_eq!(s.last_activity_time, 0);
        assert_eq!(s.last_reset_date, day(5));
        assert_eq!(s.limit_minutes, 90);
    }

    #[test]
    fn reset_is_idempotent() {
        let mut s = dirty_state();
        assert!(maybe_reset(&mut s, day(5)));
        let after_first = s.clone();
        assert!(!maybe_reset(&mut s, day(5)));
        assert_eq!(s, after_first);
    }

    #[test]
    fn next_midnight_is_start_of_following_day() {
        let tz = FixedOffset::east_opt(3 * 3600).unwrap();
        let now = tz.with_ymd_and_hms(2026, 3, 4, 23, 59, 30).unwrap();
        let next = next_local_midnight(&now);
        assert_eq!(next.date_naive(), day(5));
        assert_eq!((next.hour(), next.minute(), next.second()), (0, 0, 0));
    }

    #[test]
    fn next_midnight_from_midnight_is_a_day_later() {
        let tz = FixedOffset::west_opt(5 * 3600).unwrap();
        let now = tz.with_ymd_and_hms(2026, 3, 4, 0, 0, 0).unwrap();
        assert_eq!(next_local_midnight(&now) - now, TimeDelta::days(1));
    }
}
