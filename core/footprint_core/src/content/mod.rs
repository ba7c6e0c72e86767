//! Deterministic keyword heuristics over raw page text.
//!
//! Every function tolerates empty input and returns a neutral default instead
//! of failing. Matching is case-insensitive; keywords match on word boundaries
//! except the informative phrases, which are literal substrings.

pub mod tables;

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use tables::{
    BIAS_INDICATORS, HARM_INDICATORS, HEURISTICS_VERSION, INFORMATIVE_PHRASES, NEGATIVE_WORDS,
    POSITIVE_WORDS, TOPIC_KEYWORDS,
};

pub const DEFAULT_MAX_TOPICS: usize = 5;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Negative,
    #[default]
    Neutral,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentQuality {
    #[default]
    Neutral,
    Biased,
    Informative,
    Harmful,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentAnalysisResult {
    pub sentiment: Sentiment,
    pub quality: ContentQuality,
    pub topics: Vec<String>,
    pub readability: u8,
    pub analyzed_at: i64,
    #[serde(default)]
    pub heuristics_version: u32,
}

struct WordCounter(Vec<Regex>);

impl WordCounter {
    fn new(words: &[&str]) -> Self {
        Self(
            words
                .iter()
                .map(|w| {
                    Regex::new(&format!(r"(?-u:\b){}(?-u:\b)", regex::escape(w)))
                        .expect("keyword tables hold escaped literals")
                })
                .collect(),
        )
    }

    /// Total non-overlapping matches of every keyword; `lowered` must already be lowercase.
    fn count(&self, lowered: &str) -> usize {
        self.0.iter().map(|re| re.find_iter(lowered).count()).sum()
    }
}

fn static_regex(pattern: &str) -> Regex {
    Regex::new(pattern).expect("static pattern")
}

static POSITIVE: LazyLock<WordCounter> = LazyLock::new(|| WordCounter::new(POSITIVE_WORDS));
static NEGATIVE: LazyLock<WordCounter> = LazyLock::new(|| WordCounter::new(NEGATIVE_WORDS));
static BIAS: LazyLock<WordCounter> = LazyLock::new(|| WordCounter::new(BIAS_INDICATORS));
static HARM: LazyLock<WordCounter> = LazyLock::new(|| WordCounter::new(HARM_INDICATORS));
static TOPICS: LazyLock<Vec<(&'static str, WordCounter)>> = LazyLock::new(|| {
    TOPIC_KEYWORDS
        .iter()
        .map(|(topic, words)| (*topic, WordCounter::new(words)))
        .collect()
});

static SENTENCE_BREAK: LazyLock<Regex> = LazyLock::new(|| static_regex(r"[.!?]+"));
static SILENT_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| static_regex(r"(?:[^laeiouy]es|ed|[^laeiouy]e)$"));
static LEADING_Y: LazyLock<Regex> = LazyLock::new(|| static_regex(r"^y"));
static VOWEL_GROUP: LazyLock<Regex> = LazyLock::new(|| static_regex(r"[aeiouy]{1,2}"));

pub fn sentiment(text: &str) -> Sentiment {
    if text.trim().is_empty() {
        return Sentiment::Neutral;
    }
    let lowered = text.to_lowercase();
    let positive = POSITIVE.count(&lowered);
    let negative = NEGATIVE.count(&lowered);

    match positive.cmp(&negative) {
        std::cmp::Ordering::Greater => Sentiment::Positive,
        std::cmp::Ordering::Less => Sentiment::Negative,
        std::cmp::Ordering::Equal => Sentiment::Neutral,
    }
}

pub fn content_quality(text: &str) -> ContentQuality {
    let word_count = text.split_whitespace().count();
    if word_count == 0 {
        return ContentQuality::Neutral;
    }
    let lowered = text.to_lowercase();

    let normalized_bias = BIAS.count(&lowered) as f64 / word_count as f64 * 100.0;
    let normalized_harm = HARM.count(&lowered) as f64 / word_count as f64 * 100.0;

    if normalized_harm > 0.5 {
        return ContentQuality::Harmful;
    }
    if normalized_bias > 2.0 {
        return ContentQuality::Biased;
    }
    if INFORMATIVE_PHRASES.iter().any(|p| lowered.contains(p)) {
        return ContentQuality::Informative;
    }
    ContentQuality::Neutral
}

/// Topic names ordered by keyword hits, highest first; ties keep table order.
pub fn extract_topics(text: &str, max_topics: usize) -> Vec<String> {
    if text.trim().is_empty() {
        return Vec::new();
    }
    let lowered = text.to_lowercase();

    let mut scored: Vec<(&str, usize)> = TOPICS
        .iter()
        .map(|(topic, counter)| (*topic, counter.count(&lowered)))
        .filter(|(_, score)| *score > 0)
        .collect();
    scored.sort_by(|a, b| b.1.cmp(&a.1));

    scored
        .into_iter()
        .take(max_topics)
        .map(|(topic, _)| topic.to_string())
        .collect()
}

/// Simplified Flesch reading ease, rounded and clamped to 0..=100.
pub fn readability(text: &str) -> u8 {
    let sentences = SENTENCE_BREAK
        .split(text)
        .filter(|s| !s.trim().is_empty())
        .count();
    let words: Vec<&str> = text.split_whitespace().collect();
    if sentences == 0 || words.is_empty() {
        return 0;
    }
    let syllables: usize = words.iter().map(|w| count_syllables(w)).sum();

    let score = flesch_reading_ease(words.len(), sentences, syllables);
    score.round().clamp(0.0, 100.0) as u8
}

fn flesch_reading_ease(words: usize, sentences: usize, syllables: usize) -> f64 {
    let avg_words_per_sentence = words as f64 / sentences as f64;
    let avg_syllables_per_word = syllables as f64 / words as f64;
    206.835 - 1.015 * avg_words_per_sentence - 84.6 * avg_syllables_per_word
}

fn count_syllables(word: &str) -> usize {
    let word = word.to_lowercase();
    if word.chars().count() <= 3 {
        return 1;
    }
    let trimmed = SILENT_SUFFIX.replace(&word, "");
    let trimmed = LEADING_Y.replace(&trimmed, "");
    VOWEL_GROUP.find_iter(&trimmed).count().max(1)
}

pub fn analyze(text: &str, analyzed_at: i64) -> ContentAnalysisResult {
    ContentAnalysisResult {
        sentiment: sentiment(text),
        quality: content_quality(text),
        topics: extract_topics(text, DEFAULT_MAX_TOPICS),
        readability: readability(text),
        analyzed_at,
        heuristics_version: HEURISTICS_VERSION,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentiment_majority_wins() {
        assert_eq!(
            sentiment("This is an amazing and wonderful day, truly great!"),
            Sentiment::Positive
        );
        assert_eq!(sentiment("This was a terrible, awful problem."), Sentiment::Negative);
        assert_eq!(sentiment("good but bad"), Sentiment::Neutral);
    }

    #[test]
    fn sentiment_needs_word_boundaries() {
        // "goods" and "badge" contain keywords but are not keyword matches.
        assert_eq!(sentiment("goods with a badge"), Sentiment::Neutral);
        assert_eq!(sentiment("GREAT"), Sentiment::Positive);
    }

    #[test]
    fn word_boundaries_are_ascii_only() {
        // Non-ASCII letters do not count as word characters.
        assert_eq!(sentiment("amazingé"), Sentiment::Positive);
        assert_eq!(sentiment("éterrible"), Sentiment::Negative);
    }

    #[test]
    fn empty_text_is_neutral_everywhere() {
        assert_eq!(sentiment(""), Sentiment::Neutral);
        assert_eq!(content_quality("   "), ContentQuality::Neutral);
        assert!(extract_topics("", 5).is_empty());
        assert_eq!(readability(""), 0);
        assert_eq!(readability("..."), 0);
    }

    #[test]
    fn single_harm_word_in_twenty_is_harmful() {
        let text = "The old museum has a small room about the history of the bomb and how the town rebuilt after it";
        assert_eq!(text.split_whitespace().count(), 20);
        assert_eq!(content_quality(text), ContentQuality::Harmful);
    }

    #[test]
    fn quality_bias_and_informative() {
        assert_eq!(
            content_quality("Everyone always says this is obviously the best, and nobody ever disagrees."),
            ContentQuality::Biased
        );
        assert_eq!(
            content_quality("According to the report, the figures were revised."),
            ContentQuality::Informative
        );
        assert_eq!(content_quality("A quiet walk by the river."), ContentQuality::Neutral);
    }

    #[test]
    fn topics_sorted_by_score_and_capped() {
        let text = "The software team shipped new programming tools. The team also watched a football game.";
        assert_eq!(extract_topics(text, 5), vec!["Sports", "Technology"]);
        assert_eq!(extract_topics(text, 1), vec!["Sports"]);
    }

    #[test]
    fn flesch_reference_values() {
        let score = flesch_reading_ease(20, 2, 30);
        assert!((score - 69.785).abs() < 1e-9);
        assert_eq!(score.round(), 70.0);
    }

    #[test]
    fn readability_two_sentences_twenty_words_thirty_syllables() {
        let sentence = "The paper, the paper, a paper, my paper, his paper.";
        let text = format!("{sentence} {sentence}");
        assert_eq!(text.split_whitespace().count(), 20);
        let syllables: usize = text.split_whitespace().map(count_syllables).sum();
        assert_eq!(syllables, 30);
        assert_eq!(readability(&text), 70);
    }

    #[test]
    fn syllable_heuristic() {
        assert_eq!(count_syllables("the"), 1);
        assert_eq!(count_syllables("paper"), 2);
        assert_eq!(count_syllables("makes"), 1);
        assert_eq!(count_syllables("yellow"), 2);
        assert_eq!(count_syllables("rhythm"), 1);
    }

    #[test]
    fn readability_is_clamped() {
        // Very long polysyllabic sentence drives the raw score negative.
        let text = "Incomprehensibilities internationalization institutionalization \
                    counterrevolutionaries electroencephalography";
        assert_eq!(readability(text), 0);
        assert!(readability("Go. Run. Sit. Eat.") <= 100);
    }

    #[test]
    fn analyze_bundles_all_heuristics() {
        let r = analyze("Great research shows the team won the game.", 42);
        assert_eq!(r.sentiment, Sentiment::Positive);
        assert_eq!(r.quality, ContentQuality::Informative);
        assert_eq!(r.topics.first().map(String::as_str), Some("Sports"));
        assert_eq!(r.analyzed_at, 42);
        assert_eq!(r.heuristics_version, HEURISTICS_VERSION);
    }
}
