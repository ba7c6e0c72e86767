//! Keyword tables shared by every content heuristic.
//!
//! Bump `HEURISTICS_VERSION` whenever a list changes so stored analyses can be
//! told apart from ones produced by a newer table.

pub const HEURISTICS_VERSION: u32 = 1;

pub const POSITIVE_WORDS: &[&str] = &[
    "amazing",
    "awesome",
    "brilliant",
    "excellent",
    "fantastic",
    "great",
    "happy",
    "love",
    "perfect",
    "wonderful",
    "good",
    "best",
    "beautiful",
    "inspiring",
    "incredible",
    "outstanding",
    "remarkable",
    "success",
    "achievement",
    "celebration",
    "joy",
    "excited",
    "thrilled",
    "grateful",
];

pub const NEGATIVE_WORDS: &[&str] = &[
    "terrible",
    "awful",
    "horrible",
    "bad",
    "hate",
    "worst",
    "disgusting",
    "angry",
    "frustrated",
    "disappointed",
    "sad",
    "depressed",
    "crisis",
    "disaster",
    "failure",
    "problem",
    "issue",
    "concern",
    "worry",
    "fear",
    "anxiety",
    "stress",
    "conflict",
    "violence",
    "death",
    "destruction",
];

pub const BIAS_INDICATORS: &[&str] = &[
    "always",
    "never",
    "all",
    "none",
    "everyone",
    "nobody",
    "obviously",
    "clearly",
    "undoubtedly",
    "definitely",
    "absolutely",
    "completely",
    "totally",
    "utterly",
    "entirely",
    "without question",
    "no doubt",
];

pub const HARM_INDICATORS: &[&str] = &[
    "violence",
    "violent",
    "kill",
    "murder",
    "suicide",
    "self-harm",
    "hate",
    "harassment",
    "bullying",
    "discrimination",
    "racism",
    "sexism",
    "extremist",
    "terrorist",
    "weapon",
    "bomb",
    "drug",
];

/// Literal substrings, not word-boundary matches.
pub const INFORMATIVE_PHRASES: &[&str] = &[
    "according to",
    "research shows",
    "study finds",
    "data indicates",
    "statistics",
    "evidence",
    "peer-reviewed",
    "scientific",
    "academic",
];

pub const TOPIC_KEYWORDS: &[(&str, &[&str])] = &[
    (
        "Technology",
        &[
            "tech",
            "software",
            "hardware",
            "computer",
            "programming",
            "coding",
            "ai",
            "machine learning",
            "blockchain",
            "cryptocurrency",
        ],
    ),
    (
        "Politics",
        &[
            "politics",
            "government",
            "election",
            "democracy",
            "policy",
            "legislation",
            "congress",
            "senate",
            "president",
            "vote",
        ],
    ),
    (
        "Sports",
        &[
            "sports",
            "football",
            "basketball",
            "soccer",
            "baseball",
            "tennis",
            "olympics",
            "championship",
            "team",
            "game",
        ],
    ),
    (
        "Health",
        &[
            "health",
            "medical",
            "medicine",
            "doctor",
            "hospital",
            "treatment",
            "therapy",
            "fitness",
            "nutrition",
            "wellness",
        ],
    ),
    (
        "Entertainment",
        &[
            "movie",
            "film",
            "music",
            "concert",
            "celebrity",
            "actor",
            "singer",
            "album",
            "show",
            "entertainment",
        ],
    ),
    (
        "Business",
        &[
            "business",
            "company",
            "market",
            "stock",
            "economy",
            "finance",
            "investment",
            "startup",
            "entrepreneur",
            "corporate",
        ],
    ),
    (
        "Science",
        &[
            "science",
            "research",
            "study",
            "experiment",
            "discovery",
            "theory",
            "biology",
            "chemistry",
            "physics",
            "astronomy",
        ],
    ),
    (
        "Travel",
        &[
            "travel",
            "vacation",
            "trip",
            "tourism",
            "destination",
            "flight",
            "hotel",
            "adventure",
            "culture",
            "explore",
        ],
    ),
];
