//! Background tracking engine.
//!
//! The pure pieces (gate, session, daily reset, warning, badge) operate on a
//! [`TrackingState`]; [`Tracker`] wires them to the store, the host, the
//! alarm scheduler and the event channel.

pub mod badge;
pub mod daily_reset;
mod engine;
pub mod gate;
pub mod session;
pub mod state;
pub mod warning;

pub use badge::{Badge, BadgeColor};
pub use engine::{Platform, TickOutcome, Tracker, TrackerOptions, TICK_SECONDS};
pub use gate::Verdict;
pub use session::SessionUpdate;
pub use state::{StateCell, TrackingState};
pub use warning::WarningDecision;
