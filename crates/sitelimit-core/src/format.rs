//! Human-readable durations for callers that display tracked time.

/// `"1h 5m"`, `"5m 3s"` or `"42s"`.
pub fn format_duration(total_seconds: u64) -> String {
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    if hours > 0 {
        format!("{hours}h {minutes}m")
    } else if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else {
        format!("{seconds}s")
    }
}

/// `"… remaining"` before the limit, `"+… over limit"` from the limit on.
pub fn format_remaining(total_seconds: u64, limit_seconds: u64) -> String {
    if total_seconds >= limit_seconds {
        format!("+{} over limit", format_duration(total_seconds - limit_seconds))
    } else {
        format!("{} remaining", format_duration(limit_seconds - total_seconds))
    }
}

/// `"1h 30min"`.
pub fn format_hours_minutes(total_seconds: u64) -> String {
    format!("{}h {}min", total_seconds / 3600, (total_seconds % 3600) / 60)
}

/// Share of the limit used, capped at 100.
pub fn progress_percent(total_seconds: u64, limit_seconds: u64) -> f64 {
    if limit_seconds == 0 {
        return 100.0;
    }
    (total_seconds as f64 / limit_seconds as f64 * 100.0).min(100.0)
}
