use std::sync::Arc;

use clap::Subcommand;
use serde_json::Value;
use sitelimit_core::settings::DEFAULT_TIME_LIMIT;
use sitelimit_core::{Config, Database, SettingsProvider};

use super::{offline_host, open_tracker, CmdResult};

#[derive(Subcommand)]
pub enum LimitAction {
    /// Print the daily limit in minutes
    Get,
    /// Set the daily limit in minutes (5 to 480)
    Set {
        /// New limit
        minutes: String,
    },
    /// Restore the default limit
    Reset,
}

pub fn run(config: &Config, action: LimitAction) -> CmdResult {
    match action {
        LimitAction::Get => {
            let settings = SettingsProvider::new(Arc::new(Database::open()?));
            println!("{}", settings.time_limit());
        }
        LimitAction::Set { minutes } => {
            // Non-JSON input goes through as a string and fails validation.
            let value = serde_json::from_str::<Value>(&minutes).unwrap_or(Value::String(minutes));
            let tracker = open_tracker(config, offline_host(config))?;
            println!("{}", tracker.set_time_limit(value)?);
        }
        LimitAction::Reset => {
            let tracker = open_tracker(config, offline_host(config))?;
            println!("{}", tracker.set_time_limit(DEFAULT_TIME_LIMIT)?);
        }
    }
    Ok(())
}
