//! Host queries: idle classification, window focus and browser tabs.
//!
//! The tracker never talks to the OS or browser directly. Whatever embeds it
//! implements [`Host`]; the daemon uses [`ReportedHost`], which answers from
//! the latest state pushed in by the browser side.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::error::HostError;

/// Host-reported idle classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdleState {
    Active,
    Idle,
    Locked,
}

pub type TabId = u64;

/// A browser tab as reported by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tab {
    pub id: TabId,
    #[serde(default)]
    pub url: Option<String>,
    /// Active tab of the last-focused window.
    #[serde(default)]
    pub active: bool,
}

/// The last-focused top-level window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowInfo {
    pub focused: bool,
}

/// Narrow interface to the host environment.
pub trait Host: Send + Sync {
    /// Idle classification, where `threshold_secs` of no input means `idle`.
    fn query_idle_state(&self, threshold_secs: u64) -> Result<IdleState, HostError>;

    /// The last-focused window, if there is one.
    fn last_focused_window(&self) -> Result<Option<WindowInfo>, HostError>;

    /// The active tab in the last-focused window.
    fn active_tab(&self) -> Result<Option<Tab>, HostError>;

    /// Every open tab.
    fn tabs(&self) -> Result<Vec<Tab>, HostError>;

    /// Close the given tabs.
    fn close_tabs(&self, ids: &[TabId]) -> Result<(), HostError>;
}

/// One host-state report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostSnapshot {
    pub idle: IdleState,
    pub window_focused: bool,
    #[serde(default)]
    pub tabs: Vec<Tab>,
}

/// [`Host`] backed by state the host pushes in.
///
/// The idle threshold is applied by whoever produces the report, so
/// `query_idle_state` ignores its argument. Reports older than `max_age`
/// make every query fail with [`HostError::Stale`].
#[derive(Debug)]
pub struct ReportedHost {
    max_age: Duration,
    latest: Mutex<Option<(Instant, HostSnapshot)>>,
}

impl ReportedHost {
    pub fn new(max_age: Duration) -> Self {
        Self {
            max_age,
            latest: Mutex::new(None),
        }
    }

    /// Replace the current host state.
    pub fn report(&self, snapshot: HostSnapshot) {
        if let Ok(mut latest) = self.latest.lock() {
            *latest = Some((Instant::now(), snapshot));
        }
    }

    fn current(&self) -> Result<HostSnapshot, HostError> {
        let latest = self.latest.lock().map_err(|_| HostError::Unavailable)?;
        let (received_at, snapshot) = latest.as_ref().ok_or(HostError::Unavailable)?;
        let age = received_at.elapsed();
        if age > self.max_age {
            return Err(HostError::Stale {
                age_secs: age.as_secs(),
            });
        }
        Ok(snapshot.clone())
    }
}

impl Host for ReportedHost {
    fn query_idle_state(&self, _threshold_secs: u64) -> Result<IdleState, HostError> {
        Ok(self.current()?.idle)
    }

    fn last_focused_window(&self) -> Result<Option<WindowInfo>, HostError> {
        let snapshot = self.current()?;
        Ok(Some(WindowInfo {
            focused: snapshot.window_focused,
        }))
    }

    fn active_tab(&self) -> Result<Option<Tab>, HostError> {
        Ok(self.current()?.tabs.into_iter().find(|t| t.active))
    }

    fn tabs(&self) -> Result<Vec<Tab>, HostError> {
        Ok(self.current()?.tabs)
    }

    fn close_tabs(&self, ids: &[TabId]) -> Result<(), HostError> {
        let mut latest = self.latest.lock().map_err(|_| HostError::Unavailable)?;
        if let Some((_, snapshot)) = latest.as_mut() {
            snapshot.tabs.retain(|t| !ids.contains(&t.id));
        }
        Ok(())
    }
}
