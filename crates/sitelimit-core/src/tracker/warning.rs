//! Warning and snooze dispatch.
//!
//! The warning fires at most once per day: `reminded_today` is set in the
//! same critical section that decides to fire, before anything is shown.
//! A snooze only delays the warning; it never re-arms one that already
//! fired.

use serde::{Deserialize, Serialize};

use super::state::TrackingState;

pub const DEFAULT_SNOOZE_MINUTES: u32 = 15;

/// Why a warning is being presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WarningDecision {
    pub elapsed_seconds: u64,
    pub limit_seconds: u64,
}

/// Pure warning policy.
pub fn should_warn(
    elapsed_seconds: u64,
    limit_seconds: u64,
    reminded_today: bool,
    snooze_until: i64,
    now_ms: i64,
) -> bool {
    let snooze_over = snooze_until == 0 || now_ms >= snooze_until;
    elapsed_seconds >= limit_seconds && !reminded_today && snooze_over
}

/// Decide whether to warn for `elapsed_seconds` of use and, if so, mark the
/// day as reminded.
///
/// The periodic tick passes the counter it just credited; on-demand checks
/// pass [`TrackingState::precise_total_seconds`].
pub fn evaluate(
    state: &mut TrackingState,
    elapsed_seconds: u64,
    limit_seconds: u64,
    now_ms: i64,
) -> Option<WarningDecision> {
    if !should_warn(
        elapsed_seconds,
        limit_seconds,
        state.reminded_today,
        state.snooze_until,
        now_ms,
    ) {
        return None;
    }
    state.reminded_today = true;
    Some(WarningDecision {
        elapsed_seconds,
        limit_seconds,
    })
}

/// Missing or zero requests get the default length.
pub fn snooze_minutes(requested: Option<u32>, default_minutes: u32) -> u32 {
    match requested {
        Some(m) if m > 0 => m,
        _ => default_minutes,
    }
}

/// Suppress warnings for `minutes`. Returns the new deadline.
pub fn snooze(state: &mut TrackingState, minutes: u32, now_ms: i64) -> i64 {
    state.snooze_until = now_ms + i64::from(minutes) * 60_000;
    state.snooze_until
}

/// Re-arm the warning without touching accumulated time.
pub fn reset_reminder(state: &mut TrackingState) {
    state.reminded_today = false;
    state.snooze_until = 0;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    const MINUTE: i64 = 60_000;

    fn state(total: u64) -> TrackingState {
        let mut s = TrackingState::new(NaiveDate::from_ymd_opt(2026, 3, 4).unwrap(), 90);
        s.total_today_seconds = total;
        s
    }

    #[test]
    fn below_limit_never_warns() {
        assert!(!should_warn(5399, 5400, false, 0, 0));
    }

    #[test]
    fn exceeded_limit_warns_once() {
        let mut s = state(5430);
        let decision = evaluate(&mut s, 5430, 5400, 1_000).unwrap();
        assert_eq!(decision.elapsed_seconds, 5430);
        assert!(s.reminded_today);
        assert!(evaluate(&mut s, 5490, 5400, 2_000).is_none());
    }

    #[test]
    fn snooze_suppresses_until_deadline() {
        let now = 100 * MINUTE;
        let mut s = state(6000);
        let until = snooze(&mut s, 15, now);
        assert_eq!(until, now + 15 * MINUTE);
        assert!(evaluate(&mut s, 6000, 5400, now).is_none());
        assert!(evaluate(&mut s, 6000, 5400, until - 1).is_none());
        assert!(!s.reminded_today);
        assert!(evaluate(&mut s, 6000, 5400, until).is_some());
    }

    #[test]
    fn elapsed_snooze_does_not_rearm_reminded_day() {
        let mut s = state(6000);
        s.reminded_today = true;
        snooze(&mut s, 15, 0);
        assert!(evaluate(&mut s, 6000, 5400, 30 * MINUTE).is_none());
        assert!(s.reminded_today);
    }

    #[test]
    fn snooze_leaves_reminded_flag_alone() {
        let mut s = state(0);
        s.reminded_today = true;
        snooze(&mut s, 5, 0);
        assert!(s.reminded_today);
    }

    #[test]
    fn reset_reminder_keeps_counter() {
        let mut s = state(6000);
        s.reminded_today = true;
        s.snooze_until = 77;
        reset_reminder(&mut s);
        assert!(!s.reminded_today);
        assert_eq!(s.snooze_until, 0);
        assert_eq!(s.total_today_seconds, 6000);
    }

    #[test]
    fn snooze_minutes_defaults() {
        assert_eq!(snooze_minutes(None, 15), 15);
        assert_eq!(snooze_minutes(Some(0), 15), 15);
        assert_eq!(snooze_minutes(Some(30), 15), 30);
    }
}
