//! # SiteLimit Core Library
//!
//! Tracks cumulative daily time spent on a fixed set of distracting sites and
//! warns once a configurable daily limit is exceeded. The binary in
//! `sitelimit-cli` is a thin layer over this crate.
//!
//! ## Architecture
//!
//! - **Tracker**: caller-driven engine. A one-minute alarm runs the tick
//!   pipeline (gate, session, accumulate, badge, warning); a one-shot alarm
//!   rolls the day over at local midnight.
//! - **Storage**: key-value persistence (SQLite or in-memory) and TOML
//!   configuration.
//! - **Settings**: owns the daily limit and notifies subscribers on change.
//! - **Host / Scheduler / Clock**: narrow traits over the platform, so the
//!   engine runs the same against a real environment or a test double.
//!
//! ## Key Components
//!
//! - [`Tracker`]: the tracking service
//! - [`SettingsProvider`]: daily limit with validation
//! - [`Database`]: key-value persistence
//! - [`Event`]: everything observable the tracker does

pub mod clock;
pub mod error;
pub mod events;
pub mod format;
pub mod host;
pub mod protocol;
pub mod scheduler;
pub mod settings;
pub mod storage;
pub mod tracker;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{
    ConfigError, CoreError, HostError, Result, ScheduleError, StoreError, ValidationError,
};
pub use events::Event;
pub use host::{Host, HostSnapshot, IdleState, ReportedHost, Tab, TabId, WindowInfo};
pub use protocol::{Request, Response, ResponseBody, Stats};
pub use scheduler::{AlarmScheduler, AlarmSpec, TokioAlarmScheduler};
pub use settings::SettingsProvider;
pub use storage::{Config, Database, KvStore, KvTxn, MemoryStore};
pub use tracker::{Badge, BadgeColor, Platform, TickOutcome, Tracker, TrackerOptions, Verdict};
