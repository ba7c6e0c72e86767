//! Best-effort calls to the remote ingestion backend.
//!
//! Every request runs on its own task with a timeout; failures are logged and
//! dropped. Nothing here reports back into local state.

use std::time::Duration;

use serde::Serialize;
use tracing::{debug, warn};

use crate::{clock::ms_to_rfc3339, event::EngagementSample};

pub const DEFAULT_TIMEOUT_SECONDS: u64 = 8;
const MAX_ENGAGEMENT_SCORE: f64 = 100.0;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct IngestPayload {
    pub user_id: String,
    pub url: String,
    pub title: String,
    pub text: String,
    pub start_ts: String,
    pub end_ts: String,
    pub duration_seconds: f64,
    pub clicks: u64,
    pub keypresses: u64,
    pub engagement_score: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AnalyzeRequest {
    pub text: String,
    pub url: String,
    pub analyze_sentiment: bool,
    pub analyze_category: bool,
    pub analyze_emotions: bool,
}

impl AnalyzeRequest {
    pub fn new(text: String, url: String) -> Self {
        Self {
            text,
            url,
            analyze_sentiment: true,
            analyze_category: true,
            analyze_emotions: true,
        }
    }
}

/// One closed interval as the remote side wants it.
pub struct ClosedInterval<'a> {
    pub url: &'a str,
    pub title: &'a str,
    pub text: &'a str,
    pub start_ms: i64,
    pub end_ms: i64,
    pub engagement: &'a EngagementSample,
}

/// Clicks plus keypresses per active minute, capped at 100, one decimal.
pub fn engagement_score(clicks: u64, keypresses: u64, duration_ms: i64) -> f64 {
    if duration_ms <= 0 {
        return 0.0;
    }
    let minutes = duration_ms as f64 / 60_000.0;
    let per_minute = clicks.saturating_add(keypresses) as f64 / minutes;
    (per_minute.min(MAX_ENGAGEMENT_SCORE) * 10.0).round() / 10.0
}

#[derive(Clone)]
pub struct RemoteClient {
    http: reqwest::Client,
    base_url: String,
    user_id: String,
}

impl RemoteClient {
    pub fn new(base_url: &str, user_id: &str, timeout: Duration) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            user_id: user_id.to_string(),
        })
    }

    pub fn ingest_payload(&self, interval: &ClosedInterval<'_>) -> IngestPayload {
        let duration_ms = (interval.end_ms - interval.start_ms).max(0);
        IngestPayload {
            user_id: self.user_id.clone(),
            url: interval.url.to_string(),
            title: interval.title.to_string(),
            text: interval.text.to_string(),
            start_ts: ms_to_rfc3339(interval.start_ms),
            end_ts: ms_to_rfc3339(interval.end_ms),
            duration_seconds: duration_ms as f64 / 1000.0,
            clicks: interval.engagement.clicks,
            keypresses: interval.engagement.keys,
            engagement_score: engagement_score(
                interval.engagement.clicks,
                interval.engagement.keys,
                duration_ms,
            ),
        }
    }

    pub fn spawn_ingest(&self, payload: IngestPayload) {
        self.spawn_post("/tracking/ingest", payload);
    }

    pub fn spawn_analyze(&self, request: AnalyzeRequest) {
        self.spawn_post("/content/analyze", request);
    }

    fn spawn_post<T: Serialize + Send + 'static>(&self, path: &'static str, body: T) {
        let http = self.http.clone();
        let url = format!("{}{}", self.base_url, path);
        tokio::spawn(async move {
            match http.post(&url).json(&body).send().await {
                Ok(res) if res.status().is_success() => {
                    debug!("POST {path} -> {}", res.status());
                }
                Ok(res) => {
                    warn!("POST {path} rejected: http_{}", res.status().as_u16());
                }
                Err(err) => {
                    warn!("POST {path} failed: {err}");
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_is_rate_per_minute_capped() {
        assert_eq!(engagement_score(10, 20, 60_000), 30.0);
        assert_eq!(engagement_score(1, 0, 180_000), 0.3);
        assert_eq!(engagement_score(500, 500, 60_000), 100.0);
        assert_eq!(engagement_score(5, 5, 0), 0.0);
        assert_eq!(engagement_score(u64::MAX, u64::MAX, 60_000), 100.0);
    }

    #[test]
    fn ingest_payload_shape() {
        let client = RemoteClient::new("https://api.example.com/", "u1", Duration::from_secs(1)).unwrap();
        let sample = EngagementSample {
            clicks: 3,
            keys: 9,
            ..Default::default()
        };
        let p = client.ingest_payload(&ClosedInterval {
            url: "https://a.com/",
            title: "A",
            text: "",
            start_ms: 0,
            end_ms: 120_000,
            engagement: &sample,
        });
        assert_eq!(client.base_url, "https://api.example.com");
        assert_eq!(p.start_ts, "1970-01-01T00:00:00Z");
        assert_eq!(p.end_ts, "1970-01-01T00:02:00Z");
        assert_eq!(p.duration_seconds, 120.0);
        assert_eq!(p.engagement_score, 6.0);

        let v = serde_json::to_value(&p).unwrap();
        assert_eq!(v["user_id"], "u1");
        assert_eq!(v["keypresses"], 9);
    }
}
