//! Request/response messages exchanged with external callers.
//!
//! Requests are JSON objects tagged by `type` (`{"type":"SNOOZE","minutes":5}`);
//! every response carries `ok`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Request {
    GetStats,
    Snooze {
        #[serde(default)]
        minutes: Option<u32>,
    },
    CloseSites,
    ResetCounter,
    ResetReminder,
    CheckAndShowWarning,
    TestTick,
    ForcePopup,
    /// Warning dialog acknowledged; nothing to do.
    #[serde(rename = "OK")]
    Acknowledge,
}

/// Answer to [`Request::GetStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub total_today_seconds: u64,
    pub limit_minutes: u32,
    pub session_start_time: i64,
    pub last_activity_time: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Response {
    pub ok: bool,
    #[serde(flatten)]
    pub body: ResponseBody,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ResponseBody {
    Stats(Stats),
    Snoozed { until: i64 },
    Closed { closed: usize },
    Error { error: String },
    Empty {},
}

impl Response {
    pub fn ok() -> Self {
        Self {
            ok: true,
            body: ResponseBody::Empty {},
        }
    }

    pub fn with(body: ResponseBody) -> Self {
        Self { ok: true, body }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            body: ResponseBody::Error {
                error: message.into(),
            },
        }
    }
}
