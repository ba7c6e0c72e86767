//! Window aggregation over session history, plus day-level rollups computed
//! straight from stored events.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::Serialize;
use time::UtcOffset;

use crate::{
    categorize::{categorize, hostname, Category},
    clock::{local_weekday, DAY_MS},
    event::{Event, EventKind},
    insights::Insight,
    session::{EmotionalTally, Session},
    settings::Settings,
};

pub const TOP_SITES_LIMIT: usize = 5;
const TOP_TOPICS_LIMIT: usize = 5;
const WEEKDAYS: [&str; 7] = [
    "Sunday",
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Timeframe {
    Day,
    Week,
    Month,
}

impl Timeframe {
    /// Unknown or missing values fall back to `7d`.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some("1d") => Timeframe::Day,
            Some("30d") => Timeframe::Month,
            _ => Timeframe::Week,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Timeframe::Day => "1d",
            Timeframe::Week => "7d",
            Timeframe::Month => "30d",
        }
    }

    pub fn window_ms(self) -> i64 {
        match self {
            Timeframe::Day => DAY_MS,
            Timeframe::Week => 7 * DAY_MS,
            Timeframe::Month => 30 * DAY_MS,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmotionalBalance {
    pub positive: u8,
    pub negative: u8,
    pub neutral: u8,
    pub score: u8,
}

/// Percentage breakdown of a sentiment tally, with the balance score.
pub fn emotional_balance(tally: &EmotionalTally) -> EmotionalBalance {
    let total = tally.total();
    if total == 0 {
        return EmotionalBalance {
            score: tally.score(),
            ..Default::default()
        };
    }
    let pct = |n: u64| (n as f64 / total as f64 * 100.0).round() as u8;
    EmotionalBalance {
        positive: pct(tally.positive),
        negative: pct(tally.negative),
        neutral: pct(tally.neutral),
        score: tally.score(),
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayTrend {
    pub day: &'static str,
    /// Milliseconds.
    pub total_time: i64,
    pub productive_time: i64,
    pub distracting_time: i64,
    pub sessions: u64,
}

/// Closed-interval time per local weekday, Sunday first.
pub fn weekly_trends(events: &[Event], settings: &Settings, tz: UtcOffset) -> Vec<DayTrend> {
    let mut days: Vec<DayTrend> = WEEKDAYS
        .iter()
        .map(|&day| DayTrend {
            day,
            ..Default::default()
        })
        .collect();

    for e in events {
        let EventKind::SessionEnd { duration, .. } = e.kind else {
            continue;
        };
        let slot = &mut days[local_weekday(e.ts, tz)];
        let category = categorize(&e.url, &settings.user_categories);
        slot.total_time += duration;
        slot.sessions += 1;
        if category.is_productive() {
            slot.productive_time += duration;
        } else if category.is_distracting() {
            slot.distracting_time += duration;
        }
    }
    days
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TopicCount {
    pub topic: String,
    pub count: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentBubbles {
    /// 0..=100; low values mean reading keeps circling the same topics.
    pub diversity: u8,
    pub top_topics: Vec<TopicCount>,
}

pub fn content_bubbles(events: &[Event]) -> ContentBubbles {
    let mut counts: Vec<TopicCount> = Vec::new();
    let mut total = 0u64;
    for e in events {
        let EventKind::ContentAnalysis { analysis, .. } = &e.kind else {
            continue;
        };
        for topic in &analysis.topics {
            total += 1;
            match counts.iter_mut().find(|c| &c.topic == topic) {
                Some(c) => c.count += 1,
                None => counts.push(TopicCount {
                    topic: topic.clone(),
                    count: 1,
                }),
            }
        }
    }
    if counts.is_empty() {
        return ContentBubbles::default();
    }

    let unique = counts.len() as f64;
    let repeat = (total as f64 / unique).max(1.0);
    let diversity = (unique / repeat * 100.0).round().min(100.0) as u8;

    counts.sort_by(|a, b| b.count.cmp(&a.count));
    counts.truncate(TOP_TOPICS_LIMIT);
    ContentBubbles {
        diversity,
        top_topics: counts,
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Analytics {
    pub timeframe: &'static str,
    pub session_count: usize,
    pub total_time: i64,
    pub active_time: i64,
    pub sites_visited: usize,
    pub categories: BTreeMap<String, u64>,
    pub emotional_balance: EmotionalBalance,
    pub avg_productivity_score: u8,
    pub insights: Vec<Insight>,
    pub weekly_trends: Vec<DayTrend>,
    pub content_bubbles: ContentBubbles,
}

/// Inputs for a window aggregation. `events` should already be limited to the window.
pub struct AnalyticsInput<'a> {
    pub history: &'a [Session],
    pub current: &'a Session,
    pub events: &'a [Event],
    pub settings: &'a Settings,
    pub tz: UtcOffset,
}

pub fn aggregate(input: &AnalyticsInput<'_>, timeframe: Timeframe, now: i64) -> Analytics {
    let cutoff = now - timeframe.window_ms();
    let sessions: Vec<&Session> = input
        .history
        .iter()
        .filter(|s| s.start_time != input.current.start_time)
        .chain(std::iter::once(input.current))
        .filter(|s| s.start_time >= cutoff)
        .collect();

    let mut total_time: i64 = 0;
    let mut active_time: i64 = 0;
    let mut domains: BTreeSet<&str> = BTreeSet::new();
    let mut categories: BTreeMap<String, u64> = BTreeMap::new();
    let mut tally = EmotionalTally::default();
    let mut score_sum = 0u64;
    let mut insights = Vec::new();

    for s in &sessions {
        total_time = total_time.saturating_add(s.total_time);
        active_time = active_time.saturating_add(s.active_time);
        domains.extend(s.sites.keys().map(String::as_str));
        for (name, n) in &s.categories {
            *categories.entry(name.clone()).or_insert(0) += n;
        }
        tally.add(&s.emotional_balance);
        score_sum += u64::from(s.productivity_score);
        insights.extend(s.insights.iter().cloned());
    }

    let avg_productivity_score = if sessions.is_empty() {
        0
    } else {
        (score_sum as f64 / sessions.len() as f64).round() as u8
    };

    Analytics {
        timeframe: timeframe.as_str(),
        session_count: sessions.len(),
        total_time,
        active_time,
        sites_visited: domains.len(),
        categories,
        emotional_balance: emotional_balance(&tally),
        avg_productivity_score,
        insights,
        weekly_trends: weekly_trends(input.events, input.settings, input.tz),
        content_bubbles: content_bubbles(input.events),
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopSite {
    pub domain: String,
    /// Seconds.
    pub total_time: i64,
    pub sessions: u64,
    pub category: Category,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TodayStats {
    /// Seconds.
    pub total_time: i64,
    pub top_sites: Vec<TopSite>,
    pub is_paused: bool,
    pub session_count: u64,
}

/// The interval still open in the timer, counted up to `now` in today's totals.
pub struct OpenInterval<'a> {
    pub url: &'a str,
    pub start: i64,
}

/// Day totals from `session_end` events with `ts >= day_start`.
pub fn today_stats(
    events: &[Event],
    open: Option<OpenInterval<'_>>,
    settings: &Settings,
    day_start: i64,
    now: i64,
    is_paused: bool,
) -> TodayStats {
    struct Acc {
        ms: i64,
        sessions: u64,
        category: Category,
        first_seen: usize,
    }

    let mut by_domain: HashMap<String, Acc> = HashMap::new();
    let mut total_ms = 0i64;
    let mut session_count = 0u64;

    let mut add = |url: &str, ms: i64, counts_as_session: bool| {
        let Some(domain) = hostname(url) else { return };
        total_ms += ms;
        let next_index = by_domain.len();
        let acc = by_domain.entry(domain).or_insert_with(|| Acc {
            ms: 0,
            sessions: 0,
            category: categorize(url, &settings.user_categories),
            first_seen: next_index,
        });
        acc.ms += ms;
        if counts_as_session {
            acc.sessions += 1;
        }
    };

    for e in events.iter().filter(|e| e.ts >= day_start) {
        if let EventKind::SessionEnd { duration, .. } = e.kind {
            session_count += 1;
            add(&e.url, duration.max(0), true);
        }
    }
    if let Some(open) = open {
        let from = open.start.max(day_start);
        if now > from {
            add(open.url, now - from, false);
        }
    }

    let mut sites: Vec<(String, Acc)> = by_domain.into_iter().collect();
    sites.sort_by(|a, b| b.1.ms.cmp(&a.1.ms).then(a.1.first_seen.cmp(&b.1.first_seen)));

    TodayStats {
        total_time: total_ms / 1000,
        top_sites: sites
            .into_iter()
            .take(TOP_SITES_LIMIT)
            .map(|(domain, acc)| TopSite {
                domain,
                total_time: acc.ms / 1000,
                sessions: acc.sessions,
                category: acc.category,
            })
            .collect(),
        is_paused,
        session_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::analyze;

    fn end(url: &str, ts: i64, duration: i64) -> Event {
        Event::new(
            url,
            ts,
            EventKind::SessionEnd {
                title: String::new(),
                duration,
            },
        )
    }

    #[test]
    fn timeframe_parse_defaults_to_week() {
        assert_eq!(Timeframe::parse(Some("1d")), Timeframe::Day);
        assert_eq!(Timeframe::parse(Some("30d")), Timeframe::Month);
        assert_eq!(Timeframe::parse(Some("90d")), Timeframe::Week);
        assert_eq!(Timeframe::parse(None), Timeframe::Week);
    }

    #[test]
    fn balance_percentages() {
        let b = emotional_balance(&EmotionalTally {
            positive: 1,
            negative: 1,
            neutral: 1,
        });
        assert_eq!((b.positive, b.negative, b.neutral, b.score), (33, 33, 33, 50));
        assert_eq!(emotional_balance(&EmotionalTally::default()).score, 50);
    }

    #[test]
    fn aggregate_filters_by_window_and_sums() {
        let now = 40 * DAY_MS;
        let mut old = Session::new(now - 10 * DAY_MS);
        old.total_time = 5_000;
        old.productivity_score = 100;
        old.sites.insert("old.com".into(), Default::default());

        let mut recent = Session::new(now - 2 * DAY_MS);
        recent.total_time = 7_000;
        recent.productivity_score = 80;
        recent.sites.insert("a.com".into(), Default::default());
        recent.categories.insert("work".into(), 2);

        let mut current = Session::new(now - 1_000);
        current.total_time = 3_000;
        current.productivity_score = 41;
        current.sites.insert("a.com".into(), Default::default());
        current.categories.insert("work".into(), 1);

        let history = vec![old, recent];
        let settings = Settings::default();
        let input = AnalyticsInput {
            history: &history,
            current: &current,
            events: &[],
            settings: &settings,
            tz: UtcOffset::UTC,
        };

        let week = aggregate(&input, Timeframe::Week, now);
        assert_eq!(week.session_count, 2);
        assert_eq!(week.total_time, 10_000);
        assert_eq!(week.sites_visited, 1);
        assert_eq!(week.categories.get("work"), Some(&3));
        assert_eq!(week.avg_productivity_score, 61);

        let month = aggregate(&input, Timeframe::Month, now);
        assert_eq!(month.session_count, 3);
        assert_eq!(month.sites_visited, 2);
    }

    #[test]
    fn trends_bucket_by_local_weekday() {
        // 1970-01-01 was a Thursday.
        let events = vec![
            end("https://github.com/", 1_000, 60_000),
            end("https://www.youtube.com/", 2_000, 30_000),
            end("https://example.org/", DAY_MS + 1_000, 10_000),
        ];
        let t = weekly_trends(&events, &Settings::default(), UtcOffset::UTC);
        assert_eq!(t[4].day, "Thursday");
        assert_eq!(t[4].total_time, 90_000);
        assert_eq!(t[4].productive_time, 60_000);
        assert_eq!(t[4].distracting_time, 30_000);
        assert_eq!(t[5].sessions, 1);
        assert_eq!(t[5].productive_time, 0);
    }

    #[test]
    fn bubbles_measure_topic_spread() {
        let analysis = |text: &str| {
            Event::new(
                "https://a.com/",
                1,
                EventKind::ContentAnalysis {
                    title: String::new(),
                    analysis: analyze(text, 1),
                },
            )
        };
        let same = vec![
            analysis("software"),
            analysis("programming"),
            analysis("computer"),
        ];
        // one topic repeated three times
        assert_eq!(content_bubbles(&same).diversity, 33);

        let mixed = vec![
            analysis("software code"),
            analysis("software programming"),
            analysis("football game"),
        ];
        let b = content_bubbles(&mixed);
        assert_eq!(b.diversity, 100);
        assert_eq!(b.top_topics[0].topic, "Technology");
        assert_eq!(b.top_topics[0].count, 2);
        assert_eq!(b.top_topics[1].topic, "Sports");

        assert_eq!(content_bubbles(&[]), ContentBubbles::default());
    }

    #[test]
    fn today_stats_counts_only_today_and_open_interval() {
        let day_start = 10 * DAY_MS;
        let events = vec![
            end("https://github.com/", day_start - 1, 500_000),
            end("https://github.com/", day_start + 60_000, 60_000),
            end("https://www.youtube.com/", day_start + 200_000, 120_000),
            end("https://github.com/", day_start + 300_000, 30_000),
        ];
        let open = OpenInterval {
            url: "https://github.com/pulls",
            start: day_start + 300_000,
        };
        let stats = today_stats(
            &events,
            Some(open),
            &Settings::default(),
            day_start,
            day_start + 400_000,
            false,
        );
        assert_eq!(stats.session_count, 3);
        assert_eq!(stats.total_time, 60 + 120 + 30 + 100);
        assert_eq!(stats.top_sites[0].domain, "github.com");
        assert_eq!(stats.top_sites[0].total_time, 190);
        assert_eq!(stats.top_sites[0].sessions, 2);
        assert_eq!(stats.top_sites[0].category, Category::Productivity);
        assert_eq!(stats.top_sites[1].domain, "www.youtube.com");
    }

    #[test]
    fn today_stats_empty() {
        let stats = today_stats(&[], None, &Settings::default(), 0, 1_000, true);
        assert_eq!(stats.total_time, 0);
        assert!(stats.top_sites.is_empty());
        assert!(stats.is_paused);
    }
}
