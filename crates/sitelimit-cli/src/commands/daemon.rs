//! Long-running tracker speaking JSON lines.
//!
//! Inbound (stdin), one object per line:
//! - `{"type":"HOST_STATE","idle":"active","windowFocused":true,"tabs":[...]}`
//!   replaces the host state the tracker samples. No reply unless malformed.
//! - any tracker request, e.g. `{"type":"GET_STATS","id":7}`. The optional
//!   `id` is echoed on the response.
//!
//! Outbound (stdout): `{"kind":"response",...}` for requests and
//! `{"kind":"event",...}` for every tracker event. The daemon exits on
//! Ctrl-C or when stdin closes.
//!
//! The stored limit is re-read every [`SETTINGS_POLL`] so `sitelimit limit
//! set` from another shell reaches a running daemon.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use sitelimit_core::{
    Config, Database, Event, HostSnapshot, KvStore, Platform, ReportedHost, Request, Response,
    SettingsProvider, SystemClock, TokioAlarmScheduler, Tracker, TrackerOptions,
};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Stdout};
use tokio::sync::broadcast::error::RecvError;

use super::{offline_host, CmdResult};

const HOST_STATE: &str = "HOST_STATE";
const SETTINGS_POLL: Duration = Duration::from_secs(5);

#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
enum Outbound {
    Response {
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<Value>,
        #[serde(flatten)]
        response: Response,
    },
    Event {
        #[serde(flatten)]
        event: Event,
    },
}

pub fn run(config: &Config) -> CmdResult {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(serve(config))
}

async fn serve(config: &Config) -> CmdResult {
    let store: Arc<dyn KvStore> = Arc::new(Database::open()?);
    let settings = Arc::new(SettingsProvider::new(Arc::clone(&store)));
    let host = offline_host(config);
    let (alarms, mut fired) = TokioAlarmScheduler::new();
    let platform = Platform {
        store,
        host: host.clone(),
        alarms: Arc::new(alarms),
        clock: Arc::new(SystemClock),
    };
    let tracker = Tracker::new(platform, settings, TrackerOptions::from(config));
    let mut events = tracker.subscribe();
    tracker.start()?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut out = tokio::io::stdout();
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    let mut settings_poll = tokio::time::interval(SETTINGS_POLL);
    settings_poll.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            Some(alarm) = fired.recv() => tracker.on_alarm(&alarm),
            _ = settings_poll.tick() => {
                tracker.settings().poll_changes();
            }
            line = lines.next_line() => match line? {
                Some(line) => {
                    if let Some(reply) = handle_line(&tracker, &host, &line) {
                        write_line(&mut out, &reply).await?;
                    }
                }
                None => {
                    tracing::info!("stdin closed, stopping");
                    break;
                }
            },
            event = events.recv() => match event {
                Ok(event) => write_line(&mut out, &Outbound::Event { event }).await?,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "event output fell behind");
                }
                Err(RecvError::Closed) => break,
            },
            _ = &mut shutdown => {
                tracing::info!("interrupted, stopping");
                break;
            }
        }
    }

    // Flush whatever the last request produced.
    while let Ok(event) = events.try_recv() {
        write_line(&mut out, &Outbound::Event { event }).await?;
    }
    Ok(())
}

/// Interpret one inbound line. Returns the reply to write, if any.
fn handle_line(tracker: &Tracker, host: &ReportedHost, line: &str) -> Option<Outbound> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let mut value: Value = match serde_json::from_str(line) {
        Ok(value) => value,
        Err(e) => return Some(reply(None, Response::error(format!("invalid JSON: {e}")))),
    };
    let id = value.as_object_mut().and_then(|map| map.remove("id"));

    if value.get("type").and_then(Value::as_str) == Some(HOST_STATE) {
        return match serde_json::from_value::<HostSnapshot>(value) {
            Ok(snapshot) => {
                host.report(snapshot);
                None
            }
            Err(e) => Some(reply(id, Response::error(format!("invalid host state: {e}")))),
        };
    }

    let response = match serde_json::from_value::<Request>(value) {
        Ok(request) => tracker.handle(request),
        Err(e) => Response::error(format!("invalid request: {e}")),
    };
    Some(reply(id, response))
}

fn reply(id: Option<Value>, response: Response) -> Outbound {
    Outbound::Response { id, response }
}

async fn write_line(out: &mut Stdout, message: &Outbound) -> std::io::Result<()> {
    let mut line = serde_json::to_vec(message)?;
    line.push(b'\n');
    out.write_all(&line).await?;
    out.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use sitelimit_core::MemoryStore;
    use std::time::Duration;

    fn tracker(host: Arc<ReportedHost>) -> Tracker {
        let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
        let (alarms, _fired) = TokioAlarmScheduler::new();
        Tracker::new(
            Platform {
                store: Arc::clone(&store),
                host,
                alarms: Arc::new(alarms),
                clock: Arc::new(SystemClock),
            },
            Arc::new(SettingsProvider::new(store)),
            TrackerOptions::default(),
        )
    }

    fn reply_json(tracker: &Tracker, host: &ReportedHost, line: &str) -> Option<Value> {
        handle_line(tracker, host, line).map(|reply| serde_json::to_value(reply).unwrap())
    }

    #[test]
    fn host_state_then_tick_counts() {
        let host = Arc::new(ReportedHost::new(Duration::from_secs(60)));
        let tracker = tracker(host.clone());

        let report = json!({
            "type": "HOST_STATE",
            "idle": "active",
            "windowFocused": true,
            "tabs": [{"id": 4, "url": "https://www.youtube.com/", "active": true}]
        });
        assert_eq!(reply_json(&tracker, &host, &report.to_string()), None);
        assert_eq!(
            reply_json(&tracker, &host, r#"{"type":"TEST_TICK"}"#),
            Some(json!({"kind": "response", "ok": true}))
        );

        let stats = reply_json(&tracker, &host, r#"{"type":"GET_STATS","id":7}"#).unwrap();
        assert_eq!(stats["id"], 7);
        assert_eq!(stats["ok"], true);
        assert_eq!(stats["totalTodaySeconds"], 60);
        assert_eq!(stats["limitMinutes"], 90);
    }

    #[test]
    fn malformed_lines_get_error_replies() {
        let host = Arc::new(ReportedHost::new(Duration::from_secs(60)));
        let tracker = tracker(host.clone());

        assert_eq!(reply_json(&tracker, &host, "   "), None);

        let bad_json = reply_json(&tracker, &host, "{nope").unwrap();
        assert_eq!(bad_json["ok"], false);

        let unknown = reply_json(&tracker, &host, r#"{"type":"NUKE","id":"a"}"#).unwrap();
        assert_eq!(unknown["ok"], false);
        assert_eq!(unknown["id"], "a");

        let bad_host = reply_json(&tracker, &host, r#"{"type":"HOST_STATE","idle":"asleep"}"#)
            .unwrap();
        assert_eq!(bad_host["ok"], false);
    }

    #[test]
    fn close_sites_without_host_state_fails() {
        let host = Arc::new(ReportedHost::new(Duration::from_secs(60)));
        let tracker = tracker(host.clone());
        let reply = reply_json(&tracker, &host, r#"{"type":"CLOSE_SITES"}"#).unwrap();
        assert_eq!(reply["ok"], false);
        assert!(reply["error"].as_str().unwrap().contains("Host error"));
    }

    #[test]
    fn events_are_tagged_by_kind_and_type() {
        let event = Outbound::Event {
            event: Event::CounterReset {
                at: chrono::Utc::now(),
            },
        };
        let value = serde_json::to_value(event).unwrap();
        assert_eq!(value["kind"], "event");
        assert_eq!(value["type"], "CounterReset");
    }
}
