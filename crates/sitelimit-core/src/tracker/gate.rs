//! Idle/focus gate: does this tick count?

use serde::{Deserialize, Serialize};
use url::Url;

use crate::host::IdleState;

/// Outcome of the gate for one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Countable,
    /// Screen is locked.
    Locked,
    /// Window not focused, or the window query failed.
    Unfocused,
    /// Active tab missing or not on a tracked host.
    Untracked,
    /// The host could not classify idle state.
    Unknown,
}

impl Verdict {
    pub fn is_countable(self) -> bool {
        self == Verdict::Countable
    }
}

/// `true` if `url`'s host is one of `hosts` or a subdomain of one.
pub fn is_tracked_url(url: &str, hosts: &[String]) -> bool {
    let Ok(parsed) = Url::parse(url) else {
        return false;
    };
    let Some(hostname) = parsed.host_str() else {
        return false;
    };
    hosts.iter().any(|h| {
        let h = h.to_ascii_lowercase();
        hostname == h
            || hostname
                .strip_suffix(h.as_str())
                .is_some_and(|prefix| prefix.ends_with('.'))
    })
}

/// Decide whether a tick counts.
///
/// `idle` while focused still counts: watching a video produces no input.
pub fn evaluate(
    idle: IdleState,
    window_focused: bool,
    active_url: Option<&str>,
    hosts: &[String],
) -> Verdict {
    if idle == IdleState::Locked {
        return Verdict::Locked;
    }
    if !window_focused {
        return Verdict::Unfocused;
    }
    if !active_url.is_some_and(|url| is_tracked_url(url, hosts)) {
        return Verdict::Untracked;
    }
    match idle {
        IdleState::Active | IdleState::Idle => Verdict::Countable,
        IdleState::Locked => Verdict::Locked,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::TrackingConfig;
    use proptest::prelude::*;

    fn hosts() -> Vec<String> {
        TrackingConfig::default().hosts
    }

    #[test]
    fn tracked_hosts_and_subdomains_match() {
        let hosts = hosts();
        assert!(is_tracked_url("https://youtube.com/", &hosts));
        assert!(is_tracked_url("https://www.youtube.com/watch?v=x", &hosts));
        assert!(is_tracked_url("https://m.youtube.com/", &hosts));
        assert!(is_tracked_url("https://youtu.be/abc", &hosts));
        assert!(is_tracked_url("https://X.com/home", &hosts));
        assert!(is_tracked_url("https://mobile.twitter.com/", &hosts));
    }

    #[test]
    fn lookalike_hosts_do_not_match() {
        let hosts = hosts();
        assert!(!is_tracked_url("https://notyoutube.com/", &hosts));
        assert!(!is_tracked_url("https://box.com/", &hosts));
        assert!(!is_tracked_url("https://youtube.com.evil.org/", &hosts));
        assert!(!is_tracked_url("not a url", &hosts));
        assert!(!is_tracked_url("about:blank", &hosts));
    }

    #[test]
    fn active_or_idle_on_tracked_focused_tab_counts() {
        let hosts = hosts();
        let url = Some("https://youtube.com/watch");
        assert_eq!(evaluate(IdleState::Active, true, url, &hosts), Verdict::Countable);
        assert_eq!(evaluate(IdleState::Idle, true, url, &hosts), Verdict::Countable);
        assert_eq!(evaluate(IdleState::Locked, true, url, &hosts), Verdict::Locked);
    }

    #[test]
    fn unfocused_window_never_counts() {
        let hosts = hosts();
        let url = Some("https://youtube.com/watch");
        assert_eq!(evaluate(IdleState::Active, false, url, &hosts), Verdict::Unfocused);
        assert_eq!(evaluate(IdleState::Idle, false, url, &hosts), Verdict::Unfocused);
    }

    #[test]
    fn untracked_or_missing_url_never_counts() {
        let hosts = hosts();
        assert_eq!(
            evaluate(IdleState::Active, true, Some("https://docs.rs"), &hosts),
            Verdict::Untracked
        );
        assert_eq!(evaluate(IdleState::Active, true, None, &hosts), Verdict::Untracked);
    }

    fn idle_state() -> impl Strategy<Value = IdleState> {
        prop_oneof![
            Just(IdleState::Active),
            Just(IdleState::Idle),
            Just(IdleState::Locked),
        ]
    }

    proptest! {
        #[test]
        fn locked_never_counts(focused in any::<bool>(), url in proptest::option::of("https://[a-z]{1,8}\\.(com|be)/")) {
            let verdict = evaluate(IdleState::Locked, focused, url.as_deref(), &hosts());
            prop_assert_eq!(verdict, Verdict::Locked);
        }

        #[test]
        fn countable_requires_focus_and_tracked_url(
            idle in idle_state(),
            focused in any::<bool>(),
            url in "https://[a-z.]{1,12}/",
        ) {
            let hosts = hosts();
            if evaluate(idle, focused, Some(&url), &hosts).is_countable() {
                prop_assert!(focused);
                prop_assert!(idle != IdleState::Locked);
                prop_assert!(is_tracked_url(&url, &hosts));
            }
        }
    }
}
