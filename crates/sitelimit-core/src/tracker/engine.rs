//! The tracker service.
//!
//! Like the rest of the engine it is caller-driven: nothing happens until an
//! alarm fires (`on_alarm`) or a request arrives (`handle`). Every state
//! change goes through one [`StateCell`], and every observable change is
//! published as an [`Event`].

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use tokio::sync::broadcast;

use super::badge::{self, Badge};
use super::daily_reset;
use super::gate::{self, Verdict};
use super::session::{self, SessionUpdate};
use super::state::{StateCell, TrackingState};
use super::warning::{self, WarningDecision, DEFAULT_SNOOZE_MINUTES};
use crate::clock::Clock;
use crate::error::CoreError;
use crate::events::Event;
use crate::host::{Host, IdleState};
use crate::protocol::{Request, Response, ResponseBody, Stats};
use crate::scheduler::{self, AlarmScheduler, AlarmSpec, MIDNIGHT_ALARM, TICK_ALARM, TICK_PERIOD};
use crate::settings::{SettingsProvider, SubscriptionId};
use crate::storage::{Config, KvStore};

/// Seconds credited per countable tick.
pub const TICK_SECONDS: u64 = TICK_PERIOD.as_secs();

const EVENT_CAPACITY: usize = 256;

/// Platform services the tracker runs against.
#[derive(Clone)]
pub struct Platform {
    pub store: Arc<dyn KvStore>,
    pub host: Arc<dyn Host>,
    pub alarms: Arc<dyn AlarmScheduler>,
    pub clock: Arc<dyn Clock>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerOptions {
    /// Hostnames whose time counts, subdomains included.
    pub hosts: Vec<String>,
    pub idle_threshold_secs: u64,
    pub snooze_minutes: u32,
}

impl Default for TrackerOptions {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for TrackerOptions {
    fn from(config: &Config) -> Self {
        Self {
            hosts: config.tracking.hosts.clone(),
            idle_threshold_secs: config.tracking.idle_threshold_secs,
            snooze_minutes: match config.warning.snooze_minutes {
                0 => DEFAULT_SNOOZE_MINUTES,
                m => m,
            },
        }
    }
}

/// What one tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Counted {
        total_today_seconds: u64,
        session: SessionUpdate,
        warned: bool,
    },
    Skipped(Verdict),
}

pub struct Tracker {
    cell: StateCell,
    settings: Arc<SettingsProvider>,
    host: Arc<dyn Host>,
    alarms: Arc<dyn AlarmScheduler>,
    clock: Arc<dyn Clock>,
    options: TrackerOptions,
    events: broadcast::Sender<Event>,
    limit_subscription: SubscriptionId,
}

impl Tracker {
    pub fn new(
        platform: Platform,
        settings: Arc<SettingsProvider>,
        options: TrackerOptions,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        // Limit changes can come from any holder of the provider.
        let limit_subscription = {
            let events = events.clone();
            let cell = StateCell::new(Arc::clone(&platform.store));
            let clock = Arc::clone(&platform.clock);
            settings.on_settings_changed(move |limit_minutes| {
                let today = clock.now().date_naive();
                let total = displayed_total(&cell, today, limit_minutes);
                let _ = events.send(Event::LimitChanged {
                    limit_minutes,
                    at: Utc::now(),
                });
                let _ = events.send(badge_event(&badge::render(
                    total,
                    u64::from(limit_minutes) * 60,
                )));
            })
        };

        Self {
            cell: StateCell::new(platform.store),
            settings,
            host: platform.host,
            alarms: platform.alarms,
            clock: platform.clock,
            options,
            events,
            limit_subscription,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    pub fn settings(&self) -> &Arc<SettingsProvider> {
        &self.settings
    }

    pub fn options(&self) -> &TrackerOptions {
        &self.options
    }

    /// Startup: roll over if needed, arm both alarms, show the badge.
    ///
    /// # Errors
    /// Fails only if an alarm cannot be registered. A store failure during
    /// the rollover check is logged and startup continues.
    pub fn start(&self) -> Result<(), CoreError> {
        if let Err(e) = self.maybe_daily_reset() {
            tracing::warn!(error = %e, "startup rollover check failed");
        }
        self.ensure_tick_schedule()?;
        self.ensure_daily_reset_schedule()?;
        self.refresh_badge();
        tracing::info!(hosts = ?self.options.hosts, "tracker started");
        Ok(())
    }

    pub fn ensure_tick_schedule(&self) -> Result<(), CoreError> {
        scheduler::arm(
            self.alarms.as_ref(),
            TICK_ALARM,
            AlarmSpec::Every(TICK_PERIOD),
        )?;
        Ok(())
    }

    /// Arm the one-shot rollover alarm for the next local midnight.
    pub fn ensure_daily_reset_schedule(&self) -> Result<(), CoreError> {
        let at = daily_reset::next_local_midnight(&self.clock.now());
        scheduler::arm(self.alarms.as_ref(), MIDNIGHT_ALARM, AlarmSpec::At(at))?;
        tracing::debug!(%at, "next rollover armed");
        Ok(())
    }

    /// Dispatch a fired alarm. Failures are logged, never propagated.
    pub fn on_alarm(&self, name: &str) {
        self.settings.poll_changes();
        match name {
            TICK_ALARM => {
                if let Err(e) = self.tick() {
                    tracing::warn!(error = %e, "tick skipped");
                }
            }
            MIDNIGHT_ALARM => {
                if let Err(e) = self.maybe_daily_reset() {
                    tracing::warn!(error = %e, "midnight rollover failed");
                }
                if let Err(e) = self.ensure_daily_reset_schedule() {
                    tracing::error!(error = %e, "could not rearm midnight alarm");
                }
            }
            other => tracing::debug!(alarm = other, "ignoring unknown alarm"),
        }
    }

    /// One pass of the pipeline: gate, session, accumulate, badge, warning.
    pub fn tick(&self) -> Result<TickOutcome, CoreError> {
        let verdict = self.sample_gate();
        let now = self.clock.now();
        let now_ms = now.timestamp_millis();
        let today = now.date_naive();
        let limit = self.settings.time_limit();
        let limit_seconds = u64::from(limit) * 60;

        let ((rolled, counted), state) = self.cell.update(self.fresh(today, limit), |state| {
            let rolled = daily_reset::maybe_reset(state, today);
            state.limit_minutes = limit;
            if !verdict.is_countable() {
                return (rolled, None);
            }
            let session = session::record_activity(state, now_ms);
            state.total_today_seconds += TICK_SECONDS;
            let counted_seconds = state.total_today_seconds;
            let warning = warning::evaluate(state, counted_seconds, limit_seconds, now_ms);
            (rolled, Some((session, warning)))
        })?;

        if rolled {
            self.announce_rollover(today);
        }
        self.publish_badge(state.total_today_seconds, limit_seconds);

        let Some((session, warning)) = counted else {
            tracing::debug!(?verdict, "tick not counted");
            return Ok(TickOutcome::Skipped(verdict));
        };
        self.emit(Event::TickCounted {
            total_today_seconds: state.total_today_seconds,
            session,
            at: Utc::now(),
        });
        if let Some(decision) = warning {
            self.present_warning(decision, false);
        }
        Ok(TickOutcome::Counted {
            total_today_seconds: state.total_today_seconds,
            session,
            warned: warning.is_some(),
        })
    }

    /// Warning evaluation against the precise elapsed time, outside the tick.
    pub fn check_and_warn(&self) -> Result<Option<WarningDecision>, CoreError> {
        let now = self.clock.now();
        let today = now.date_naive();
        let limit = self.settings.time_limit();
        let ((rolled, decision), _) = self.cell.update(self.fresh(today, limit), |state| {
            let rolled = daily_reset::maybe_reset(state, today);
            let now_ms = now.timestamp_millis();
            let elapsed = state.precise_total_seconds(now_ms);
            let decision = warning::evaluate(state, elapsed, u64::from(limit) * 60, now_ms);
            (rolled, decision)
        })?;
        if rolled {
            self.announce_rollover(today);
        }
        if let Some(decision) = decision {
            self.present_warning(decision, false);
        }
        Ok(decision)
    }

    /// Present the warning now, regardless of today's reminder.
    pub fn force_warning(&self) -> Result<WarningDecision, CoreError> {
        let now = self.clock.now();
        let limit = self.settings.time_limit();
        let (elapsed_seconds, _) = self
            .cell
            .update(self.fresh(now.date_naive(), limit), |state| {
                state.reminded_today = false;
                state.precise_total_seconds(now.timestamp_millis())
            })?;
        let decision = WarningDecision {
            elapsed_seconds,
            limit_seconds: u64::from(limit) * 60,
        };
        self.present_warning(decision, true);
        Ok(decision)
    }

    /// Current counters. Never fails: a store error yields fresh-day stats.
    pub fn stats(&self) -> Stats {
        let now = self.clock.now();
        let today = now.date_naive();
        let limit = self.settings.time_limit();
        let state = match self.cell.update(self.fresh(today, limit), |state| {
            daily_reset::maybe_reset(state, today)
        }) {
            Ok((rolled, state)) => {
                if rolled {
                    self.announce_rollover(today);
                }
                state
            }
            Err(e) => {
                tracing::warn!(error = %e, "could not read tracking state, reporting defaults");
                self.fresh(today, limit)
            }
        };
        self.publish_badge(state.total_today_seconds, u64::from(limit) * 60);
        Stats {
            total_today_seconds: state.total_today_seconds,
            limit_minutes: limit,
            session_start_time: state.session_start_time,
            last_activity_time: state.last_activity_time,
        }
    }

    /// Snooze for `minutes` (configured default when missing or zero).
    /// Returns the deadline in epoch milliseconds.
    pub fn snooze(&self, minutes: Option<u32>) -> Result<i64, CoreError> {
        let minutes = warning::snooze_minutes(minutes, self.options.snooze_minutes);
        let now = self.clock.now();
        let (until, _) = self.cell.update(
            self.fresh(now.date_naive(), self.settings.time_limit()),
            |state| warning::snooze(state, minutes, now.timestamp_millis()),
        )?;
        tracing::info!(minutes, until, "warning snoozed");
        self.emit(Event::Snoozed {
            until_epoch_ms: until,
            at: Utc::now(),
        });
        Ok(until)
    }

    /// Explicit user reset of today's counter.
    pub fn reset_counter(&self) -> Result<(), CoreError> {
        let now = self.clock.now();
        let limit = self.settings.time_limit();
        self.cell
            .update(self.fresh(now.date_naive(), limit), TrackingState::clear_counters)?;
        tracing::info!("counter reset");
        self.emit(Event::CounterReset { at: Utc::now() });
        self.publish_badge(0, u64::from(limit) * 60);
        Ok(())
    }

    pub fn reset_reminder(&self) -> Result<(), CoreError> {
        let now = self.clock.now();
        self.cell.update(
            self.fresh(now.date_naive(), self.settings.time_limit()),
            warning::reset_reminder,
        )?;
        self.emit(Event::ReminderReset { at: Utc::now() });
        Ok(())
    }

    /// Close every open tab on a tracked host. Returns how many were closed.
    pub fn close_sites(&self) -> Result<usize, CoreError> {
        let ids: Vec<_> = self
            .host
            .tabs()?
            .into_iter()
            .filter(|tab| {
                tab.url
                    .as_deref()
                    .is_some_and(|url| gate::is_tracked_url(url, &self.options.hosts))
            })
            .map(|tab| tab.id)
            .collect();
        if !ids.is_empty() {
            self.host.close_tabs(&ids)?;
            tracing::info!(count = ids.len(), "closed tracked tabs");
        }
        let closed = ids.len();
        self.emit(Event::SitesClosed {
            tab_ids: ids,
            at: Utc::now(),
        });
        Ok(closed)
    }

    /// Roll over if the stored date is not today. Returns whether it did.
    pub fn maybe_daily_reset(&self) -> Result<bool, CoreError> {
        let today = self.clock.now().date_naive();
        let limit = self.settings.time_limit();
        let (rolled, state) = self.cell.update(self.fresh(today, limit), |state| {
            daily_reset::maybe_reset(state, today)
        })?;
        if rolled {
            self.announce_rollover(today);
            self.publish_badge(state.total_today_seconds, u64::from(limit) * 60);
        }
        Ok(rolled)
    }

    /// Validate and store a new limit, refreshing the cached copy.
    pub fn set_time_limit(&self, value: impl Into<serde_json::Value>) -> Result<u32, CoreError> {
        let limit = self.settings.set_time_limit(value)?;
        let today = self.clock.now().date_naive();
        self.cell.update(self.fresh(today, limit), |state| {
            state.limit_minutes = limit;
        })?;
        Ok(limit)
    }

    /// Answer one external request.
    pub fn handle(&self, request: Request) -> Response {
        tracing::debug!(?request, "handling request");
        self.settings.poll_changes();
        let result = match request {
            Request::GetStats => Ok(ResponseBody::Stats(self.stats())),
            Request::Snooze { minutes } => {
                self.snooze(minutes).map(|until| ResponseBody::Snoozed { until })
            }
            Request::CloseSites => self.close_sites().map(|closed| ResponseBody::Closed { closed }),
            Request::ResetCounter => self.reset_counter().map(|()| ResponseBody::Empty {}),
            Request::ResetReminder => self.reset_reminder().map(|()| ResponseBody::Empty {}),
            Request::CheckAndShowWarning => self.check_and_warn().map(|_| ResponseBody::Empty {}),
            Request::TestTick => self.tick().map(|_| ResponseBody::Empty {}),
            Request::ForcePopup => self.force_warning().map(|_| ResponseBody::Empty {}),
            Request::Acknowledge => Ok(ResponseBody::Empty {}),
        };
        match result {
            Ok(body) => Response::with(body),
            Err(e) => {
                tracing::warn!(error = %e, "request failed");
                Response::error(e.to_string())
            }
        }
    }

    /// Render and publish the badge for the current counter.
    pub fn refresh_badge(&self) -> Badge {
        let today = self.clock.now().date_naive();
        let limit = self.settings.time_limit();
        let total = displayed_total(&self.cell, today, limit);
        self.publish_badge(total, u64::from(limit) * 60)
    }

    fn fresh(&self, today: NaiveDate, limit: u32) -> TrackingState {
        TrackingState::new(today, limit)
    }

    /// Query the host outside the critical section. Failures never count.
    fn sample_gate(&self) -> Verdict {
        let idle = match self.host.query_idle_state(self.options.idle_threshold_secs) {
            Ok(idle) => idle,
            Err(e) => {
                tracing::debug!(error = %e, "idle query failed");
                return Verdict::Unknown;
            }
        };
        if idle == IdleState::Locked {
            return Verdict::Locked;
        }
        let focused = match self.host.last_focused_window() {
            Ok(window) => window.is_some_and(|w| w.focused),
            Err(e) => {
                tracing::debug!(error = %e, "window query failed");
                false
            }
        };
        let url = match self.host.active_tab() {
            Ok(tab) => tab.and_then(|t| t.url),
            Err(e) => {
                tracing::debug!(error = %e, "tab query failed");
                None
            }
        };
        gate::evaluate(idle, focused, url.as_deref(), &self.options.hosts)
    }

    fn present_warning(&self, decision: WarningDecision, forced: bool) {
        tracing::info!(
            elapsed_seconds = decision.elapsed_seconds,
            limit_seconds = decision.limit_seconds,
            forced,
            "daily limit warning"
        );
        self.emit(Event::WarningDue {
            elapsed_seconds: decision.elapsed_seconds,
            limit_seconds: decision.limit_seconds,
            forced,
            at: Utc::now(),
        });
    }

    fn announce_rollover(&self, date: NaiveDate) {
        tracing::info!(%date, "daily counters reset");
        self.emit(Event::DailyReset {
            date,
            at: Utc::now(),
        });
    }

    fn publish_badge(&self, total_seconds: u64, limit_seconds: u64) -> Badge {
        let badge = badge::render(total_seconds, limit_seconds);
        self.emit(badge_event(&badge));
        badge
    }

    fn emit(&self, event: Event) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

impl Drop for Tracker {
    fn drop(&mut self) {
        self.settings.unsubscribe(self.limit_subscription);
    }
}

fn badge_event(badge: &Badge) -> Event {
    Event::BadgeUpdated {
        label: badge.label.clone(),
        color: badge.color,
        remaining_minutes: badge.remaining_minutes,
        at: Utc::now(),
    }
}

/// Today's counter as the badge would show it, without writing anything.
fn displayed_total(cell: &StateCell, today: NaiveDate, limit: u32) -> u64 {
    match cell.read(TrackingState::new(today, limit)) {
        Ok(state) if state.last_reset_date == today => state.total_today_seconds,
        Ok(_) => 0,
        Err(e) => {
            tracing::warn!(error = %e, "could not read counter for badge");
            0
        }
    }
}
