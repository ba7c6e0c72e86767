use serde::{Deserialize, Serialize};

use crate::{
    event::{Event, EventKind},
    settings::Settings,
};

/// Intervals shorter than this are treated as noise and never emitted.
pub const MIN_SESSION_MS: i64 = 1000;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tab {
    #[serde(default)]
    pub id: Option<i64>,
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub active: bool,
}

impl Tab {
    pub fn new(url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: None,
            url: url.into(),
            title: title.into(),
            active: true,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdleState {
    Active,
    Idle,
    Locked,
}

/// Lifecycle signals reported by the browser.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BrowserSignal {
    TabActivated {
        tab: Tab,
    },
    TabUpdated {
        tab: Tab,
        #[serde(default)]
        status: Option<String>,
    },
    /// `tab` is the active tab of the newly focused window, or absent when
    /// every browser window lost focus.
    WindowFocusChanged {
        #[serde(default)]
        tab: Option<Tab>,
    },
    IdleStateChanged {
        state: IdleState,
    },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ActiveTabState {
    Idle,
    Tracking { url: String, title: String, start: i64 },
    Paused { last_url: Option<String> },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerStatus {
    Idle,
    Tracking,
    Paused,
}

/// Schemes that never count as browsing.
pub fn is_internal_url(url: &str) -> bool {
    let lower = url.trim().to_ascii_lowercase();
    !(lower.starts_with("http://") || lower.starts_with("https://"))
}

/// Owns the single "currently active site" and turns transitions into
/// `session_start` / `session_end` events.
///
/// Every method takes `now` explicitly; durations are always computed from the
/// `start` captured when the interval opened.
#[derive(Debug)]
pub struct ActiveTabTimer {
    state: ActiveTabState,
}

impl Default for ActiveTabTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl ActiveTabTimer {
    pub fn new() -> Self {
        Self {
            state: ActiveTabState::Idle,
        }
    }

    pub fn state(&self) -> &ActiveTabState {
        &self.state
    }

    pub fn status(&self) -> TimerStatus {
        match self.state {
            ActiveTabState::Idle => TimerStatus::Idle,
            ActiveTabState::Tracking { .. } => TimerStatus::Tracking,
            ActiveTabState::Paused { .. } => TimerStatus::Paused,
        }
    }

    pub fn is_paused(&self) -> bool {
        matches!(self.state, ActiveTabState::Paused { .. })
    }

    pub fn tracked_url(&self) -> Option<&str> {
        match &self.state {
            ActiveTabState::Tracking { url, .. } => Some(url.as_str()),
            _ => None,
        }
    }

    /// Tab activation, window focus gained, or a URL change on the active tab.
    pub fn activate(&mut self, tab: &Tab, settings: &Settings, now: i64) -> Vec<Event> {
        let mut out = Vec::new();
        if self.is_paused() {
            return out;
        }
        self.close(now, &mut out);
        self.open(tab, settings, now, &mut out);
        out
    }

    /// Focus lost, idle or screen locked.
    pub fn deactivate(&mut self, now: i64) -> Vec<Event> {
        let mut out = Vec::new();
        if self.is_paused() {
            return out;
        }
        self.close(now, &mut out);
        out
    }

    pub fn pause(&mut self, now: i64) -> Vec<Event> {
        let mut out = Vec::new();
        if self.is_paused() {
            return out;
        }
        let last_url = self.tracked_url().map(str::to_string);
        self.close(now, &mut out);
        self.state = ActiveTabState::Paused { last_url };
        out
    }

    /// Leaves `Paused`, tracking `current` (the browser's active tab right now) when allowed.
    pub fn resume(&mut self, current: Option<&Tab>, settings: &Settings, now: i64) -> Vec<Event> {
        let mut out = Vec::new();
        if !self.is_paused() {
            return out;
        }
        self.state = ActiveTabState::Idle;
        if let Some(tab) = current {
            self.open(tab, settings, now, &mut out);
        }
        out
    }

    /// Re-checks the open interval after a settings change.
    pub fn reconcile(&mut self, settings: &Settings, now: i64) -> Vec<Event> {
        let mut out = Vec::new();
        let still_allowed = match &self.state {
            ActiveTabState::Tracking { url, .. } => is_trackable(url, settings),
            _ => true,
        };
        if !still_allowed {
            self.close(now, &mut out);
        }
        out
    }

    fn close(&mut self, now: i64, out: &mut Vec<Event>) {
        let prev = std::mem::replace(&mut self.state, ActiveTabState::Idle);
        if let ActiveTabState::Tracking { url, title, start } = prev {
            let duration = now - start;
            if duration >= MIN_SESSION_MS {
                out.push(Event::new(url, now, EventKind::SessionEnd { title, duration }));
            }
        }
    }

    fn open(&mut self, tab: &Tab, settings: &Settings, now: i64, out: &mut Vec<Event>) {
        if !is_trackable(&tab.url, settings) {
            self.state = ActiveTabState::Idle;
            return;
        }
        out.push(Event::new(
            tab.url.clone(),
            now,
            EventKind::SessionStart {
                title: tab.title.clone(),
            },
        ));
        self.state = ActiveTabState::Tracking {
            url: tab.url.clone(),
            title: tab.title.clone(),
            start: now,
        };
    }
}

fn is_trackable(url: &str, settings: &Settings) -> bool {
    settings.tracking_enabled
        && !url.trim().is_empty()
        && !is_internal_url(url)
        && !settings.is_excluded(url)
}
