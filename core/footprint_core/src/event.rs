use serde::{Deserialize, Serialize};

use crate::content::ContentAnalysisResult;

pub const PAGE_TEXT_SNIPPET_CHARS: usize = 1000;

/// A persisted telemetry event. Append-only until pruned by retention.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub url: String,
    /// Unix epoch milliseconds.
    pub ts: i64,
    #[serde(flatten)]
    pub kind: EventKind,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    SessionStart {
        #[serde(default)]
        title: String,
    },
    SessionEnd {
        #[serde(default)]
        title: String,
        /// Milliseconds.
        duration: i64,
    },
    Engagement {
        data: EngagementSample,
    },
    PageText {
        #[serde(rename = "textSnippet")]
        text_snippet: String,
    },
    ContentAnalysis {
        #[serde(default)]
        title: String,
        analysis: ContentAnalysisResult,
    },
}

impl Event {
    pub fn new(url: impl Into<String>, ts: i64, kind: EventKind) -> Self {
        Self {
            url: url.into(),
            ts,
            kind,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self.kind {
            EventKind::SessionStart { .. } => "session_start",
            EventKind::SessionEnd { .. } => "session_end",
            EventKind::Engagement { .. } => "engagement",
            EventKind::PageText { .. } => "page_text",
            EventKind::ContentAnalysis { .. } => "content_analysis",
        }
    }

    /// Clears titles and drops raw text. Returns `None` when nothing is left worth keeping.
    pub fn redacted(mut self) -> Option<Self> {
        match &mut self.kind {
            EventKind::SessionStart { title }
            | EventKind::SessionEnd { title, .. }
            | EventKind::ContentAnalysis { title, .. } => title.clear(),
            EventKind::PageText { .. } => return None,
            EventKind::Engagement { .. } => {}
        }
        Some(self)
    }
}

/// Interaction counters reported by the page-side sampler.
///
/// Each sample carries counts accumulated since the previous sample for the
/// same page, not running totals.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngagementSample {
    pub clicks: u64,
    #[serde(alias = "keypresses")]
    pub keys: u64,
    pub scrolls: u64,
    /// Milliseconds the page was visible and focused.
    pub focus_time: u64,
    pub mouse_movements: u64,
    pub text_selections: u64,
    pub form_interactions: u64,
    pub user_interactions: Vec<Interaction>,
}

impl EngagementSample {
    pub fn is_empty(&self) -> bool {
        self.clicks == 0
            && self.keys == 0
            && self.scrolls == 0
            && self.focus_time == 0
            && self.mouse_movements == 0
            && self.text_selections == 0
            && self.form_interactions == 0
            && self.user_interactions.is_empty()
    }

    /// Adds `other`'s counters, saturating at `u64::MAX`; interaction records
    /// are not copied.
    pub fn add_counters(&mut self, other: &EngagementSample) {
        self.clicks = self.clicks.saturating_add(other.clicks);
        self.keys = self.keys.saturating_add(other.keys);
        self.scrolls = self.scrolls.saturating_add(other.scrolls);
        self.focus_time = self.focus_time.saturating_add(other.focus_time);
        self.mouse_movements = self.mouse_movements.saturating_add(other.mouse_movements);
        self.text_selections = self.text_selections.saturating_add(other.text_selections);
        self.form_interactions = self.form_interactions.saturating_add(other.form_interactions);
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Interaction {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub element: Option<String>,
    #[serde(default)]
    pub interaction_type: Option<String>,
    #[serde(default)]
    pub timestamp: i64,
}

/// First `PAGE_TEXT_SNIPPET_CHARS` characters of `text`.
pub fn snippet(text: &str) -> String {
    text.chars().take(PAGE_TEXT_SNIPPET_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_shape_is_flat_and_tagged() {
        let e = Event::new(
            "https://github.com/",
            1_000,
            EventKind::SessionEnd {
                title: "GitHub".into(),
                duration: 4_500,
            },
        );
        let v = serde_json::to_value(&e).unwrap();
        assert_eq!(v["type"], "session_end");
        assert_eq!(v["url"], "https://github.com/");
        assert_eq!(v["duration"], 4_500);
        assert_eq!(v["ts"], 1_000);

        let back: Event = serde_json::from_value(v).unwrap();
        assert_eq!(back, e);
    }

    #[test]
    fn engagement_accepts_sampler_payload() {
        let raw = r#"{"type":"engagement","url":"https://a.com/","ts":5,
            "data":{"clicks":3,"keys":10,"scrolls":2,"focusTime":4000,
                    "userInteractions":[{"type":"click","element":"a","interactionType":"link","timestamp":4}],
                    "pageVisible":true}}"#;
        let e: Event = serde_json::from_str(raw).unwrap();
        let EventKind::Engagement { data } = e.kind else {
            panic!("expected engagement");
        };
        assert_eq!(data.clicks, 3);
        assert_eq!(data.focus_time, 4000);
        assert_eq!(data.user_interactions[0].interaction_type.as_deref(), Some("link"));
    }

    #[test]
    fn redaction_strips_titles_and_text() {
        let start = Event::new("u", 1, EventKind::SessionStart { title: "secret".into() });
        let EventKind::SessionStart { title } = start.redacted().unwrap().kind else {
            panic!("kind changed");
        };
        assert!(title.is_empty());

        let text = Event::new("u", 1, EventKind::PageText { text_snippet: "x".into() });
        assert!(text.redacted().is_none());
    }

    #[test]
    fn add_counters_saturates() {
        let mut acc = EngagementSample {
            keys: u64::MAX - 1,
            focus_time: u64::MAX,
            ..Default::default()
        };
        acc.add_counters(&EngagementSample {
            clicks: 1,
            keys: 5,
            focus_time: u64::MAX,
            ..Default::default()
        });
        assert_eq!(acc.clicks, 1);
        assert_eq!(acc.keys, u64::MAX);
        assert_eq!(acc.focus_time, u64::MAX);
    }

    #[test]
    fn snippet_counts_chars_not_bytes() {
        let long = "é".repeat(PAGE_TEXT_SNIPPET_CHARS + 10);
        assert_eq!(snippet(&long).chars().count(), PAGE_TEXT_SNIPPET_CHARS);
    }
}
