use serde::{Deserialize, Serialize};

use crate::session::Session;

const NEGATIVE_RATIO_WARNING: f64 = 0.6;
const POSITIVE_RATIO_PRAISE: f64 = 0.6;
const LOW_PRODUCTIVITY: u8 = 30;
const HIGH_PRODUCTIVITY: u8 = 80;
const DIVERSE_CATEGORY_COUNT: usize = 6;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Insight {
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub description: String,
    pub priority: Priority,
}

impl Insight {
    fn new(kind: &str, title: &str, description: &str, priority: Priority) -> Self {
        Self {
            kind: kind.to_string(),
            title: title.to_string(),
            description: description.to_string(),
            priority,
        }
    }
}

/// Evaluates every rule against `session`. Ratio rules are skipped when
/// nothing has been analysed and the praise rule when no time was tracked.
pub fn generate(session: &Session) -> Vec<Insight> {
    let mut out = Vec::new();

    let tally = &session.emotional_balance;
    let analysed = tally.total();
    if analysed > 0 {
        let negative_ratio = tally.negative as f64 / analysed as f64;
        let positive_ratio = tally.positive as f64 / analysed as f64;
        if negative_ratio > NEGATIVE_RATIO_WARNING {
            out.push(Insight::new(
                "emotional_warning",
                "High Negative Content Exposure",
                "You've encountered a lot of negative content today. Consider taking breaks or visiting more positive content.",
                Priority::High,
            ));
        } else if positive_ratio > POSITIVE_RATIO_PRAISE {
            out.push(Insight::new(
                "emotional_positive",
                "Positive Content Day",
                "Great job! You've been consuming mostly positive content today.",
                Priority::Low,
            ));
        }
    }

    if session.productivity_score < LOW_PRODUCTIVITY {
        out.push(Insight::new(
            "productivity_warning",
            "Low Productivity Score",
            "Your focus seems scattered today. Try using website blockers or taking focused work sessions.",
            Priority::Medium,
        ));
    } else if session.productivity_score > HIGH_PRODUCTIVITY && session.total_time > 0 {
        out.push(Insight::new(
            "productivity_praise",
            "Highly Productive Session",
            "Excellent! You've maintained great focus on productive activities.",
            Priority::Low,
        ));
    }

    if session.categories.len() > DIVERSE_CATEGORY_COUNT {
        out.push(Insight::new(
            "diversity_high",
            "Diverse Content Consumption",
            "You've explored many different types of content today. This shows good curiosity!",
            Priority::Low,
        ));
    }

    out
}
