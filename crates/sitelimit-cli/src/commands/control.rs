//! One-shot tracker requests.

use clap::{Args, ValueEnum};
use serde_json::json;
use sitelimit_core::{Config, HostSnapshot, IdleState, Request, Tab, TickOutcome, Tracker};

use super::{offline_host, open_tracker, CmdResult};

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum IdleArg {
    Active,
    Idle,
    Locked,
}

impl From<IdleArg> for IdleState {
    fn from(arg: IdleArg) -> Self {
        match arg {
            IdleArg::Active => IdleState::Active,
            IdleArg::Idle => IdleState::Idle,
            IdleArg::Locked => IdleState::Locked,
        }
    }
}

#[derive(Args, Debug)]
pub struct TickArgs {
    /// Idle classification of the machine
    #[arg(long, value_enum, default_value = "active")]
    pub idle: IdleArg,
    /// Whether the browser window is focused
    #[arg(long)]
    pub focused: bool,
    /// URL of the active tab
    #[arg(long)]
    pub url: Option<String>,
}

/// Run `request` and print the response; a failed request is an error.
fn run_request(config: &Config, request: Request) -> CmdResult {
    let tracker = open_tracker(config, offline_host(config))?;
    respond(&tracker, request)
}

fn respond(tracker: &Tracker, request: Request) -> CmdResult {
    let response = tracker.handle(request);
    println!("{}", serde_json::to_string(&response)?);
    if response.ok {
        Ok(())
    } else {
        Err("request failed".into())
    }
}

pub fn snooze(config: &Config, minutes: Option<u32>) -> CmdResult {
    run_request(config, Request::Snooze { minutes })
}

pub fn reset(config: &Config) -> CmdResult {
    run_request(config, Request::ResetCounter)
}

pub fn reset_reminder(config: &Config) -> CmdResult {
    run_request(config, Request::ResetReminder)
}

pub fn check(config: &Config) -> CmdResult {
    let tracker = open_tracker(config, offline_host(config))?;
    let decision = tracker.check_and_warn()?;
    let output = match decision {
        Some(d) => json!({
            "warn": true,
            "elapsedSeconds": d.elapsed_seconds,
            "limitSeconds": d.limit_seconds,
        }),
        None => json!({ "warn": false }),
    };
    println!("{output}");
    Ok(())
}

pub fn tick(config: &Config, args: TickArgs) -> CmdResult {
    let host = offline_host(config);
    host.report(HostSnapshot {
        idle: args.idle.into(),
        window_focused: args.focused,
        tabs: args
            .url
            .map(|url| Tab {
                id: 0,
                url: Some(url),
                active: true,
            })
            .into_iter()
            .collect(),
    });
    let tracker = open_tracker(config, host)?;

    let output = match tracker.tick()? {
        TickOutcome::Counted {
            total_today_seconds,
            session,
            warned,
        } => json!({
            "counted": true,
            "totalTodaySeconds": total_today_seconds,
            "session": session,
            "warned": warned,
        }),
        TickOutcome::Skipped(verdict) => json!({
            "counted": false,
            "verdict": verdict,
        }),
    };
    println!("{output}");
    Ok(())
}
