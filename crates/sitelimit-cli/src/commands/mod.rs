pub mod config;
pub mod control;
pub mod daemon;
pub mod limit;
pub mod stats;

use std::sync::Arc;
use std::time::Duration;

use sitelimit_core::{
    Config, Database, Host, KvStore, Platform, ReportedHost, SettingsProvider, SystemClock,
    TokioAlarmScheduler, Tracker, TrackerOptions,
};

pub type CmdResult = Result<(), Box<dyn std::error::Error>>;

/// Host for one-shot commands: nothing reported, so tab queries fail.
pub fn offline_host(config: &Config) -> Arc<ReportedHost> {
    Arc::new(ReportedHost::new(Duration::from_secs(
        config.daemon.host_stale_secs,
    )))
}

/// Tracker over the on-disk store. Alarms are never armed by one-shot
/// commands, so the scheduler's receiver is dropped.
pub fn open_tracker(
    config: &Config,
    host: Arc<dyn Host>,
) -> Result<Tracker, Box<dyn std::error::Error>> {
    let store: Arc<dyn KvStore> = Arc::new(Database::open()?);
    let settings = Arc::new(SettingsProvider::new(Arc::clone(&store)));
    let (alarms, _fired) = TokioAlarmScheduler::new();
    let platform = Platform {
        store,
        host,
        alarms: Arc::new(alarms),
        clock: Arc::new(SystemClock),
    };
    Ok(Tracker::new(platform, settings, TrackerOptions::from(config)))
}
