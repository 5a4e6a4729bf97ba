//! Named alarms.
//!
//! The tracker arms two alarms: a periodic [`TICK_ALARM`] and a one-shot
//! [`MIDNIGHT_ALARM`]. Arming always clears a same-named alarm first, so a
//! restart or a rearm never leaves two of them pending.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Local};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::error::ScheduleError;

pub const TICK_ALARM: &str = "tick";
pub const MIDNIGHT_ALARM: &str = "midnight_reset";
pub const TICK_PERIOD: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlarmSpec {
    /// Fire once at an absolute local time.
    At(DateTime<Local>),
    /// Fire every period, first one period from now.
    Every(Duration),
}

pub trait AlarmScheduler: Send + Sync {
    /// Register `name`, replacing any alarm already registered under it.
    fn create(&self, name: &str, spec: AlarmSpec) -> Result<(), ScheduleError>;

    /// Cancel `name`. Returns `true` if it was still pending.
    fn clear(&self, name: &str) -> bool;
}

/// Clear-then-create.
pub fn arm(
    scheduler: &dyn AlarmScheduler,
    name: &str,
    spec: AlarmSpec,
) -> Result<(), ScheduleError> {
    scheduler.clear(name);
    scheduler.create(name, spec)
}

/// Alarms backed by tokio tasks. Fired alarm names arrive on the receiver
/// returned by [`TokioAlarmScheduler::new`].
pub struct TokioAlarmScheduler {
    tasks: Mutex<HashMap<String, JoinHandle<()>>>,
    fired: mpsc::UnboundedSender<String>,
}

impl TokioAlarmScheduler {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (fired, rx) = mpsc::unbounded_channel();
        let scheduler = Self {
            tasks: Mutex::new(HashMap::new()),
            fired,
        };
        (scheduler, rx)
    }

    /// Names of alarms that have not fired (one-shot) or been cleared.
    pub fn pending(&self) -> Vec<String> {
        let Ok(tasks) = self.tasks.lock() else {
            return Vec::new();
        };
        let mut names: Vec<String> = tasks
            .iter()
            .filter(|(_, handle)| !handle.is_finished())
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }
}

impl AlarmScheduler for TokioAlarmScheduler {
    fn create(&self, name: &str, spec: AlarmSpec) -> Result<(), ScheduleError> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|_| ScheduleError::NoRuntime(name.to_string()))?;
        let mut tasks = self.tasks.lock().map_err(|_| ScheduleError::Invalid {
            name: name.to_string(),
            message: "alarm table poisoned".into(),
        })?;
        let tx = self.fired.clone();
        let alarm = name.to_string();

        let handle = match spec {
            AlarmSpec::At(when) => {
                let delay = (when - Local::now()).to_std().unwrap_or(Duration::ZERO);
                runtime.spawn(async move {
                    tokio::time::sleep(delay).await;
                    let _ = tx.send(alarm);
                })
            }
            AlarmSpec::Every(period) => {
                if period.is_zero() {
                    return Err(ScheduleError::Invalid {
                        name: name.to_string(),
                        message: "period must be positive".into(),
                    });
                }
                runtime.spawn(async move {
                    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
                    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                    loop {
                        ticker.tick().await;
                        if tx.send(alarm.clone()).is_err() {
                            break;
                        }
                    }
                })
            }
        };

        if let Some(previous) = tasks.insert(name.to_string(), handle) {
            previous.abort();
        }
        tracing::debug!(alarm = name, "alarm armed");
        Ok(())
    }

    fn clear(&self, name: &str) -> bool {
        let Ok(mut tasks) = self.tasks.lock() else {
            return false;
        };
        match tasks.remove(name) {
            Some(handle) => {
                let pending = !handle.is_finished();
                handle.abort();
                pending
            }
            None => false,
        }
    }
}

impl Drop for TokioAlarmScheduler {
    fn drop(&mut self) {
        if let Ok(tasks) = self.tasks.get_mut() {
            for (_, handle) in tasks.drain() {
                handle.abort();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    #[test]
    fn create_outside_runtime_fails() {
        let (scheduler, _rx) = TokioAlarmScheduler::new();
        let err = scheduler
            .create(TICK_ALARM, AlarmSpec::Every(TICK_PERIOD))
            .unwrap_err();
        assert_eq!(err, ScheduleError::NoRuntime(TICK_ALARM.into()));
    }

    #[tokio::test(start_paused = true)]
    async fn periodic_alarm_fires_each_period() {
        let (scheduler, mut rx) = TokioAlarmScheduler::new();
        scheduler
            .create(TICK_ALARM, AlarmSpec::Every(TICK_PERIOD))
            .unwrap();
        for _ in 0..3 {
            assert_eq!(rx.recv().await.as_deref(), Some(TICK_ALARM));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn zero_period_is_rejected() {
        let (scheduler, _rx) = TokioAlarmScheduler::new();
        assert!(matches!(
            scheduler.create(TICK_ALARM, AlarmSpec::Every(Duration::ZERO)),
            Err(ScheduleError::Invalid { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn one_shot_alarm_fires_once() {
        let (scheduler, mut rx) = TokioAlarmScheduler::new();
        let when = Local::now() + TimeDelta::minutes(10);
        scheduler
            .create(MIDNIGHT_ALARM, AlarmSpec::At(when))
            .unwrap();
        assert_eq!(rx.recv().await.as_deref(), Some(MIDNIGHT_ALARM));
        tokio::time::sleep(Duration::from_secs(3600)).await;
        assert!(rx.try_recv().is_err());
        assert!(scheduler.pending().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn rearming_replaces_pending_alarm() {
        let (scheduler, mut rx) = TokioAlarmScheduler::new();
        for _ in 0..3 {
            arm(&scheduler, TICK_ALARM, AlarmSpec::Every(TICK_PERIOD)).unwrap();
        }
        assert_eq!(scheduler.pending(), vec![TICK_ALARM.to_string()]);

        tokio::time::sleep(TICK_PERIOD + Duration::from_millis(1)).await;
        assert_eq!(rx.try_recv().ok().as_deref(), Some(TICK_ALARM));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn clear_cancels_alarm() {
        let (scheduler, mut rx) = TokioAlarmScheduler::new();
        scheduler
            .create(TICK_ALARM, AlarmSpec::Every(TICK_PERIOD))
            .unwrap();
        assert!(scheduler.clear(TICK_ALARM));
        assert!(!scheduler.clear(TICK_ALARM));
        tokio::time::sleep(TICK_PERIOD * 3).await;
        assert!(rx.try_recv().is_err());
    }
}
