use serde::{Deserialize, Serialize};

use crate::{
    analytics::{Analytics, TodayStats},
    event::EngagementSample,
    session::Session,
    settings::{Settings, SettingsUpdate},
    timer::TimerStatus,
};

pub const EXPORT_FORMAT_VERSION: &str = "1.0.0";

/// Inbound requests from the extension UI and content scripts.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum Message {
    #[serde(rename = "pauseTracking", alias = "pause", alias = "PAUSE_TRACKING")]
    PauseTracking,
    #[serde(rename = "resumeTracking", alias = "resume", alias = "RESUME_TRACKING")]
    ResumeTracking,
    #[serde(rename = "getStatus")]
    GetStatus,
    #[serde(rename = "getTodayStats")]
    GetTodayStats {
        #[serde(default, rename = "tzOffsetMinutes")]
        tz_offset_minutes: Option<i32>,
    },
    #[serde(rename = "GET_SESSION_DATA")]
    GetSessionData,
    #[serde(rename = "GET_ANALYTICS")]
    GetAnalytics {
        #[serde(default)]
        timeframe: Option<String>,
        #[serde(default, rename = "tzOffsetMinutes")]
        tz_offset_minutes: Option<i32>,
    },
    #[serde(rename = "engagement")]
    Engagement {
        url: String,
        #[serde(default)]
        title: Option<String>,
        #[serde(default)]
        data: EngagementSample,
    },
    #[serde(rename = "dumpText")]
    DumpText {
        url: String,
        #[serde(default)]
        text: String,
    },
    #[serde(rename = "CONTENT_ANALYSIS")]
    ContentAnalysis {
        #[serde(default)]
        content: String,
        #[serde(default)]
        title: String,
        url: String,
    },
    #[serde(rename = "UPDATE_SETTINGS")]
    UpdateSettings { settings: SettingsUpdate },
    #[serde(rename = "EXPORT_DATA")]
    ExportData,
    #[serde(rename = "START_NEW_SESSION")]
    StartNewSession,
    #[serde(rename = "FLUSH")]
    Flush,
}

#[derive(Clone, Debug, Serialize)]
pub struct TrackingStatus {
    pub paused: bool,
    pub state: TimerStatus,
}

#[derive(Clone, Debug, Serialize)]
pub struct SessionData {
    pub session: Session,
    pub timestamp: i64,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportData {
    pub settings: Settings,
    pub sessions: Vec<Session>,
    pub current_session: Session,
    pub exported_at: i64,
    pub version: &'static str,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlushResult {
    pub flushed: usize,
    pub stored_events: usize,
}

#[derive(Clone, Debug, Serialize)]
#[serde(untagged)]
pub enum Reply {
    Status(TrackingStatus),
    TodayStats(TodayStats),
    SessionData(Box<SessionData>),
    Analytics(Box<Analytics>),
    Settings(Settings),
    Export(Box<ExportData>),
    Flushed(FlushResult),
    /// Fire-and-forget messages carry no payload.
    Accepted,
}

/// Why a message was not applied.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Rejection {
    Invalid(&'static str),
    Internal(&'static str),
}

impl Rejection {
    pub fn code(self) -> &'static str {
        match self {
            Rejection::Invalid(code) | Rejection::Internal(code) => code,
        }
    }
}
