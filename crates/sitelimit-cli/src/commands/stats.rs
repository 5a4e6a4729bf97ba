use sitelimit_core::format::{
    format_duration, format_hours_minutes, format_remaining, progress_percent,
};
use sitelimit_core::tracker::badge;
use sitelimit_core::Config;

use super::{offline_host, open_tracker, CmdResult};

pub fn run(config: &Config, human: bool) -> CmdResult {
    let tracker = open_tracker(config, offline_host(config))?;
    let stats = tracker.stats();

    if !human {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    let limit_seconds = u64::from(stats.limit_minutes) * 60;
    let total = stats.total_today_seconds;
    let badge = badge::render(total, limit_seconds);
    println!("Today:    {}", format_duration(total));
    println!("Limit:    {}", format_hours_minutes(limit_seconds));
    println!("Status:   {}", format_remaining(total, limit_seconds));
    println!("Progress: {:.0}%", progress_percent(total, limit_seconds));
    println!("Badge:    {} ({})", badge.label, badge.color.hex());
    Ok(())
}
