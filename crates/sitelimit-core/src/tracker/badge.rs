//! Badge rendering: remaining minutes as a short label and a color band.

use serde::{Deserialize, Serialize};

/// Label shown once the limit is reached.
pub const EXCEEDED_LABEL: &str = "!";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BadgeColor {
    Green,
    Amber,
    Red,
}

impl BadgeColor {
    pub fn hex(self) -> &'static str {
        match self {
            BadgeColor::Green => "#10b981",
            BadgeColor::Amber => "#f59e0b",
            BadgeColor::Red => "#ef4444",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Badge {
    pub label: String,
    pub color: BadgeColor,
    pub remaining_minutes: u64,
}

impl Badge {
    pub fn is_exceeded(&self) -> bool {
        self.remaining_minutes == 0
    }
}

/// Remaining whole minutes, rounded up, never negative.
pub fn remaining_minutes(total_seconds: u64, limit_seconds: u64) -> u64 {
    limit_seconds.saturating_sub(total_seconds).div_ceil(60)
}

pub fn render(total_seconds: u64, limit_seconds: u64) -> Badge {
    let remaining = remaining_minutes(total_seconds, limit_seconds);
    let color = match remaining {
        r if r > 30 => BadgeColor::Green,
        r if r > 10 => BadgeColor::Amber,
        _ => BadgeColor::Red,
    };
    let label = if remaining > 0 {
        remaining.to_string()
    } else {
        EXCEEDED_LABEL.to_string()
    };
    Badge {
        label,
        color,
        remaining_minutes: remaining,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn with_remaining(minutes: u64) -> Badge {
        render(0, minutes * 60)
    }

    #[test]
    fn color_band_boundaries() {
        assert_eq!(with_remaining(31).color, BadgeColor::Green);
        assert_eq!(with_remaining(30).color, BadgeColor::Amber);
        assert_eq!(with_remaining(11).color, BadgeColor::Amber);
        assert_eq!(with_remaining(10).color, BadgeColor::Red);
        assert_eq!(with_remaining(1).color, BadgeColor::Red);
    }

    #[test]
    fn exceeded_shows_marker_in_red() {
        let badge = render(5430, 90 * 60);
        assert_eq!(badge.label, "!");
        assert_eq!(badge.color, BadgeColor::Red);
        assert!(badge.is_exceeded());
    }

    #[test]
    fn partial_minute_rounds_up() {
        let badge = render(5390, 5400);
        assert_eq!(badge.remaining_minutes, 1);
        assert_eq!(badge.label, "1");
    }

    #[test]
    fn hex_colors() {
        assert_eq!(BadgeColor::Green.hex(), "#10b981");
        assert_eq!(BadgeColor::Amber.hex(), "#f59e0b");
        assert_eq!(BadgeColor::Red.hex(), "#ef4444");
    }

    proptest! {
        #[test]
        fn label_matches_remaining(total in 0u64..100_000, limit_min in 5u64..=480) {
            let badge = render(total, limit_min * 60);
            if badge.remaining_minutes > 0 {
                prop_assert_eq!(badge.label, badge.remaining_minutes.to_string());
            } else {
                prop_assert_eq!(badge.label.as_str(), EXCEEDED_LABEL);
                prop_assert_eq!(badge.color, BadgeColor::Red);
            }
        }

        #[test]
        fn remaining_never_exceeds_limit(total in 0u64..100_000, limit_min in 5u64..=480) {
            prop_assert!(remaining_minutes(total, limit_min * 60) <= limit_min);
        }
    }
}
