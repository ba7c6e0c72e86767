//! The current session and the reducer that folds events into it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    categorize::{categorize, hostname, Category},
    content::{ContentAnalysisResult, Sentiment},
    event::{EngagementSample, Event, EventKind, Interaction},
    insights::{self, Insight},
    settings::Settings,
};

pub const MAX_SITE_INTERACTIONS: usize = 50;

const NEUTRAL_SCORE: u8 = 50;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmotionalTally {
    pub positive: u64,
    pub negative: u64,
    pub neutral: u64,
}

impl EmotionalTally {
    pub fn total(&self) -> u64 {
        self.positive + self.negative + self.neutral
    }

    pub fn record(&mut self, sentiment: Sentiment) {
        match sentiment {
            Sentiment::Positive => self.positive += 1,
            Sentiment::Negative => self.negative += 1,
            Sentiment::Neutral => self.neutral += 1,
        }
    }

    pub fn add(&mut self, other: &EmotionalTally) {
        self.positive += other.positive;
        self.negative += other.negative;
        self.neutral += other.neutral;
    }

    /// 0..=100 where 50 is balanced; 50 when nothing was analysed.
    pub fn score(&self) -> u8 {
        let total = self.total();
        if total == 0 {
            return NEUTRAL_SCORE;
        }
        let pos = self.positive as f64 / total as f64;
        let neg = self.negative as f64 / total as f64;
        (50.0 + (pos - neg) * 50.0).round().clamp(0.0, 100.0) as u8
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngagementTotals {
    pub clicks: u64,
    pub keys: u64,
    pub scrolls: u64,
    pub focus_time: u64,
    pub mouse_movements: u64,
    pub text_selections: u64,
    pub form_interactions: u64,
}

impl EngagementTotals {
    pub fn add(&mut self, s: &EngagementSample) {
        self.clicks = self.clicks.saturating_add(s.clicks);
        self.keys = self.keys.saturating_add(s.keys);
        self.scrolls = self.scrolls.saturating_add(s.scrolls);
        self.focus_time = self.focus_time.saturating_add(s.focus_time);
        self.mouse_movements = self.mouse_movements.saturating_add(s.mouse_movements);
        self.text_selections = self.text_selections.saturating_add(s.text_selections);
        self.form_interactions = self.form_interactions.saturating_add(s.form_interactions);
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteRecord {
    pub domain: String,
    pub url: String,
    pub title: String,
    pub visits: u64,
    /// Milliseconds.
    pub time_spent: i64,
    pub last_visit: i64,
    pub category: Category,
    #[serde(default)]
    pub content_analysis: Option<ContentAnalysisResult>,
    #[serde(default)]
    pub engagement: EngagementTotals,
    #[serde(default)]
    pub interactions: Vec<Interaction>,
}

impl SiteRecord {
    fn new(domain: String) -> Self {
        Self {
            domain,
            ..Default::default()
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub start_time: i64,
    #[serde(default)]
    pub end_time: Option<i64>,
    /// Sum of closed interval durations, milliseconds.
    #[serde(default)]
    pub total_time: i64,
    /// Sum of reported focus time, milliseconds.
    #[serde(default)]
    pub active_time: i64,
    #[serde(default)]
    pub is_paused: bool,
    #[serde(default)]
    pub sites: BTreeMap<String, SiteRecord>,
    #[serde(default)]
    pub categories: BTreeMap<String, u64>,
    #[serde(default)]
    pub emotional_balance: EmotionalTally,
    pub productivity_score: u8,
    #[serde(default)]
    pub insights: Vec<Insight>,
}

impl Session {
    pub fn new(start_time: i64) -> Self {
        Self {
            start_time,
            end_time: None,
            total_time: 0,
            active_time: 0,
            is_paused: false,
            sites: BTreeMap::new(),
            categories: BTreeMap::new(),
            emotional_balance: EmotionalTally::default(),
            productivity_score: NEUTRAL_SCORE,
            insights: Vec::new(),
        }
    }

    /// Wall-clock span from start to the last applied event.
    pub fn wall_time(&self) -> i64 {
        self.end_time
            .map(|end| (end - self.start_time).max(0))
            .unwrap_or(0)
    }

    pub fn has_activity(&self) -> bool {
        !self.sites.is_empty() || self.emotional_balance.total() > 0
    }
}

/// Folds one event into `session`. Events that reference an unknown site are no-ops.
pub fn apply_event(session: &mut Session, event: &Event, settings: &Settings) {
    let domain = hostname(&event.url);
    let mut rescore = false;

    match &event.kind {
        EventKind::SessionStart { title } => {
            let Some(domain) = domain else { return };
            let category = categorize(&event.url, &settings.user_categories);
            let site = session
                .sites
                .entry(domain.clone())
                .or_insert_with(|| SiteRecord::new(domain));
            site.visits += 1;
            site.last_visit = event.ts;
            site.url = event.url.clone();
            if !title.is_empty() {
                site.title = title.clone();
            }
            site.category = category.clone();
            *session.categories.entry(category.to_string()).or_insert(0) += 1;
            rescore = true;
        }
        EventKind::SessionEnd { duration, .. } => {
            let Some(site) = site_mut(session, domain.as_deref()) else {
                return;
            };
            let duration = (*duration).max(0);
            site.time_spent += duration;
            session.total_time += duration;
            rescore = true;
        }
        EventKind::Engagement { data } => {
            let focus = i64::try_from(data.focus_time).unwrap_or(i64::MAX);
            session.active_time = session.active_time.saturating_add(focus);
            if let Some(site) = site_mut(session, domain.as_deref()) {
                site.engagement.add(data);
                site.interactions.extend(data.user_interactions.iter().cloned());
                let overflow = site.interactions.len().saturating_sub(MAX_SITE_INTERACTIONS);
                site.interactions.drain(..overflow);
            }
        }
        EventKind::ContentAnalysis { analysis, .. } => {
            session.emotional_balance.record(analysis.sentiment);
            if let Some(site) = site_mut(session, domain.as_deref()) {
                site.content_analysis = Some(analysis.clone());
            }
            rescore = true;
        }
        EventKind::PageText { .. } => return,
    }

    session.end_time = Some(event.ts);
    if rescore {
        session.productivity_score = productivity_score(session.sites.values());
        session.insights = insights::generate(session);
    }
}

fn site_mut<'a>(session: &'a mut Session, domain: Option<&str>) -> Option<&'a mut SiteRecord> {
    session.sites.get_mut(domain?)
}

/// `round(100·p/t − 30·d/t)` over site time, clamped; 50 when nothing was tracked.
pub fn productivity_score<'a>(sites: impl IntoIterator<Item = &'a SiteRecord>) -> u8 {
    let mut productive = 0i64;
    let mut distracting = 0i64;
    let mut total = 0i64;
    for site in sites {
        total += site.time_spent;
        if site.category.is_productive() {
            productive += site.time_spent;
        } else if site.category.is_distracting() {
            distracting += site.time_spent;
        }
    }
    if total <= 0 {
        return NEUTRAL_SCORE;
    }
    let p = productive as f64 / total as f64;
    let d = distracting as f64 / total as f64;
    (p * 100.0 - d * 30.0).round().clamp(0.0, 100.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::analyze;

    fn start(url: &str, ts: i64) -> Event {
        Event::new(url, ts, EventKind::SessionStart { title: "t".into() })
    }

    fn end(url: &str, ts: i64, duration: i64) -> Event {
        Event::new(
            url,
            ts,
            EventKind::SessionEnd {
                title: "t".into(),
                duration,
            },
        )
    }

    fn replay(events: &[Event]) -> Session {
        let settings = Settings::default();
        let mut s = Session::new(0);
        for e in events {
            apply_event(&mut s, e, &settings);
        }
        s
    }

    #[test]
    fn work_and_entertainment_hour_each_scores_35() {
        let s = replay(&[
            start("https://mail.gmail.com/", 0),
            end("https://mail.gmail.com/", 3_600_000, 3_600_000),
            start("https://www.netflix.com/", 3_600_000),
            end("https://www.netflix.com/", 7_200_000, 3_600_000),
        ]);
        assert_eq!(s.productivity_score, 35);
        assert_eq!(s.total_time, 7_200_000);
        assert_eq!(s.categories.get("work"), Some(&1));
        assert_eq!(s.categories.get("entertainment"), Some(&1));
        assert_eq!(s.wall_time(), 7_200_000);
    }

    #[test]
    fn score_bounds() {
        let s = replay(&[
            start("https://www.youtube.com/", 0),
            end("https://www.youtube.com/", 10_000, 10_000),
        ]);
        assert_eq!(s.productivity_score, 0);

        let s = replay(&[
            start("https://github.com/", 0),
            end("https://github.com/", 10_000, 10_000),
        ]);
        assert_eq!(s.productivity_score, 100);

        assert_eq!(productivity_score(std::iter::empty()), 50);
    }

    #[test]
    fn end_without_start_is_noop() {
        let s = replay(&[end("https://github.com/", 5_000, 5_000)]);
        assert!(s.sites.is_empty());
        assert_eq!(s.total_time, 0);
        assert_eq!(s.end_time, None);
    }

    #[test]
    fn engagement_accumulates_and_caps_interactions() {
        let url = "https://github.com/";
        let sample = EngagementSample {
            clicks: 2,
            focus_time: 1_500,
            user_interactions: (0..30)
                .map(|i| Interaction {
                    kind: "click".into(),
                    timestamp: i,
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        };
        let mut events = vec![start(url, 0)];
        for ts in [1, 2] {
            events.push(Event::new(url, ts, EventKind::Engagement { data: sample.clone() }));
        }
        let s = replay(&events);
        let site = &s.sites["github.com"];
        assert_eq!(site.engagement.clicks, 4);
        assert_eq!(s.active_time, 3_000);
        assert_eq!(site.interactions.len(), MAX_SITE_INTERACTIONS);
        assert_eq!(site.interactions.last().map(|i| i.timestamp), Some(29));
    }

    #[test]
    fn huge_engagement_counters_saturate() {
        let url = "https://github.com/";
        let huge = EngagementSample {
            clicks: u64::MAX,
            focus_time: 1 << 63,
            ..Default::default()
        };
        let s = replay(&[
            start(url, 0),
            Event::new(url, 1, EventKind::Engagement { data: huge.clone() }),
        ]);
        assert_eq!(s.active_time, i64::MAX);

        let s = replay(&[
            start(url, 0),
            Event::new(url, 1, EventKind::Engagement { data: huge.clone() }),
            Event::new(url, 2, EventKind::Engagement { data: huge }),
        ]);
        let site = &s.sites["github.com"];
        assert_eq!(s.active_time, i64::MAX);
        assert_eq!(site.engagement.clicks, u64::MAX);
        assert_eq!(site.engagement.focus_time, u64::MAX);
    }

    #[test]
    fn content_analysis_tallies_even_for_unknown_site() {
        let analysis = analyze("A wonderful, amazing result.", 9);
        let s = replay(&[Event::new(
            "https://unknown.example/",
            9,
            EventKind::ContentAnalysis {
                title: String::new(),
                analysis,
            },
        )]);
        assert_eq!(s.emotional_balance.positive, 1);
        assert!(s.sites.is_empty());
        assert_eq!(s.emotional_balance.score(), 100);
    }

    #[test]
    fn page_text_has_no_effect() {
        let s = replay(&[Event::new(
            "https://github.com/",
            3,
            EventKind::PageText {
                text_snippet: "hello".into(),
            },
        )]);
        assert_eq!(s, Session::new(0));
    }

    #[test]
    fn replay_is_deterministic() {
        let events = vec![
            start("https://github.com/", 0),
            end("https://github.com/", 4_000, 4_000),
            start("https://reddit.com/r/rust", 4_000),
            end("https://reddit.com/r/rust", 9_000, 5_000),
        ];
        assert_eq!(replay(&events), replay(&events));
    }

    #[test]
    fn emotional_score_is_balanced_when_empty() {
        assert_eq!(EmotionalTally::default().score(), 50);
        let t = EmotionalTally {
            positive: 1,
            negative: 3,
            neutral: 0,
        };
        assert_eq!(t.score(), 25);
    }
}
