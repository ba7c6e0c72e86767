use std::fmt;

use serde::{Deserialize, Serialize};

use crate::settings::UserCategories;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Category {
    Productivity,
    Entertainment,
    Social,
    News,
    Shopping,
    Education,
    Health,
    Finance,
    Work,
    Other,
    /// A user-defined category that does not shadow a built-in one.
    Custom(String),
}

impl Category {
    pub fn as_str(&self) -> &str {
        match self {
            Category::Productivity => "productivity",
            Category::Entertainment => "entertainment",
            Category::Social => "social",
            Category::News => "news",
            Category::Shopping => "shopping",
            Category::Education => "education",
            Category::Health => "health",
            Category::Finance => "finance",
            Category::Work => "work",
            Category::Other => "other",
            Category::Custom(name) => name.as_str(),
        }
    }

    pub fn is_productive(&self) -> bool {
        matches!(
            self,
            Category::Productivity | Category::Education | Category::Work
        )
    }

    pub fn is_distracting(&self) -> bool {
        matches!(self, Category::Entertainment | Category::Social)
    }
}

impl Default for Category {
    fn default() -> Self {
        Category::Other
    }
}

impl From<String> for Category {
    fn from(raw: String) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "productivity" => Category::Productivity,
            "entertainment" => Category::Entertainment,
            "social" => Category::Social,
            "news" => Category::News,
            "shopping" => Category::Shopping,
            "education" => Category::Education,
            "health" => Category::Health,
            "finance" => Category::Finance,
            "work" => Category::Work,
            "other" | "" => Category::Other,
            other => Category::Custom(other.to_string()),
        }
    }
}

impl From<&str> for Category {
    fn from(raw: &str) -> Self {
        Category::from(raw.to_string())
    }
}

impl From<Category> for String {
    fn from(c: Category) -> Self {
        match c {
            Category::Custom(name) => name,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Table order matters: the first category with a matching pattern wins.
const BUILTIN_PATTERNS: &[(Category, &[&str])] = &[
    (
        Category::Productivity,
        &[
            "github.com",
            "gitlab.com",
            "stackoverflow.com",
            "docs.google.com",
            "notion.so",
            "trello.com",
            "asana.com",
            "slack.com",
            "discord.com",
            "zoom.us",
            "teams.microsoft.com",
            "atlassian.net",
            "jira.",
            "confluence.",
            "drive.google.com",
            "dropbox.com",
            "onedrive.",
            "figma.com",
            "canva.com",
        ],
    ),
    (
        Category::Entertainment,
        &[
            "youtube.com",
            "netflix.com",
            "hulu.com",
            "disney.",
            "prime.video",
            "spotify.com",
            "soundcloud.com",
            "twitch.tv",
            "gaming.",
            "steam.",
            "epic.games",
            "xbox.com",
            "playstation.com",
            "ign.com",
            "gamespot.com",
            "imdb.com",
            "rottentomatoes.com",
            "metacritic.com",
        ],
    ),
    (
        Category::Social,
        &[
            "facebook.com",
            "instagram.com",
            "twitter.com",
            "x.com",
            "linkedin.com",
            "snapchat.com",
            "tiktok.com",
            "reddit.com",
            "pinterest.com",
            "tumblr.com",
            "whatsapp.com",
            "telegram.org",
            "signal.org",
            "mastodon.",
        ],
    ),
    (
        Category::News,
        &[
            "cnn.com",
            "bbc.com",
            "reuters.com",
            "ap.org",
            "nytimes.com",
            "wsj.com",
            "guardian.co.uk",
            "washingtonpost.com",
            "foxnews.com",
            "npr.org",
            "bloomberg.com",
            "techcrunch.com",
            "wired.com",
            "arstechnica.com",
            "theverge.com",
            "engadget.com",
            "gizmodo.com",
        ],
    ),
    (
        Category::Shopping,
        &[
            "amazon.com",
            "ebay.com",
            "walmart.com",
            "target.com",
            "bestbuy.com",
            "shopify.com",
            "etsy.com",
            "alibaba.com",
            "aliexpress.com",
            "wish.com",
            "nike.com",
            "adidas.com",
            "zara.com",
            "h&m.com",
        ],
    ),
    (
        Category::Education,
        &[
            "coursera.org",
            "udemy.com",
            "khan.academy",
            "edx.org",
            "pluralsight.com",
            "lynda.com",
            "skillshare.com",
            "masterclass.com",
            "mit.edu",
            "stanford.edu",
            "harvard.edu",
            "wikipedia.org",
            "scholar.google.com",
            "researchgate.net",
        ],
    ),
    (
        Category::Health,
        &[
            "webmd.com",
            "mayoclinic.org",
            "healthline.com",
            "nih.gov",
            "cdc.gov",
            "who.int",
            "myfitnesspal.com",
            "fitbit.com",
            "strava.com",
            "headspace.com",
            "calm.com",
        ],
    ),
    (
        Category::Finance,
        &[
            "mint.com",
            "chase.com",
            "bankofamerica.com",
            "wellsfargo.com",
            "paypal.com",
            "venmo.com",
            "robinhood.com",
            "fidelity.com",
            "schwab.com",
            "vanguard.com",
            "coinbase.com",
            "binance.com",
            "bloomberg.com",
        ],
    ),
    (
        Category::Work,
        &[
            "office.com",
            "gmail.com",
            "outlook.com",
            "calendar.google.com",
            "salesforce.com",
            "hubspot.com",
            "mailchimp.com",
            "zapier.com",
        ],
    ),
];

/// Lowercased hostname of `url`, or `None` when it does not parse or has no host.
pub fn hostname(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url.trim()).ok()?;
    let host = parsed.host_str()?.trim();
    if host.is_empty() {
        None
    } else {
        Some(host.to_lowercase())
    }
}

/// Resolves the category of `url`: user categories first, then the built-in
/// table, else `Other`. Never fails.
pub fn categorize(url: &str, user: &UserCategories) -> Category {
    let Some(host) = hostname(url) else {
        return Category::Other;
    };

    for (name, patterns) in user.iter() {
        if matches_any(&host, patterns.iter().map(String::as_str)) {
            return Category::from(name);
        }
    }

    for (category, patterns) in BUILTIN_PATTERNS {
        if matches_any(&host, patterns.iter().copied()) {
            return category.clone();
        }
    }

    Category::Other
}

fn matches_any<'a>(host: &str, mut patterns: impl Iterator<Item = &'a str>) -> bool {
    patterns.any(|p| {
        let p = p.trim().to_lowercase();
        !p.is_empty() && host.contains(p.as_str())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn none() -> UserCategories {
        UserCategories::default()
    }

    #[test]
    fn builtin_table_matches_hostname() {
        assert_eq!(categorize("https://github.com/rust-lang/rust", &none()), Category::Productivity);
        assert_eq!(categorize("https://www.youtube.com/watch?v=1", &none()), Category::Entertainment);
        assert_eq!(categorize("https://en.wikipedia.org/wiki/Rust", &none()), Category::Education);
        assert_eq!(categorize("https://mail.gmail.com/", &none()), Category::Work);
        assert_eq!(categorize("https://example.org/", &none()), Category::Other);
    }

    #[test]
    fn matching_is_case_insensitive_and_host_only() {
        assert_eq!(categorize("https://GitHub.COM/", &none()), Category::Productivity);
        // Pattern in the path must not count.
        assert_eq!(categorize("https://example.org/github.com", &none()), Category::Other);
    }

    #[test]
    fn user_categories_take_precedence() {
        let user = UserCategories::new(vec![
            ("deepwork".into(), vec!["github.com".into()]),
            ("chill".into(), vec!["GITHUB".into()]),
        ]);
        assert_eq!(
            categorize("https://github.com/", &user),
            Category::Custom("deepwork".into())
        );
    }

    #[test]
    fn user_category_with_builtin_name_resolves_to_builtin() {
        let user = UserCategories::new(vec![("Work".into(), vec!["corp.example".into()])]);
        let c = categorize("https://intranet.corp.example/", &user);
        assert_eq!(c, Category::Work);
        assert!(c.is_productive());
    }

    #[test]
    fn malformed_url_is_other() {
        assert_eq!(categorize("not a url", &none()), Category::Other);
        assert_eq!(categorize("", &none()), Category::Other);
        assert_eq!(categorize("about:blank", &none()), Category::Other);
    }

    #[test]
    fn categorize_is_deterministic() {
        let user = UserCategories::new(vec![("reading".into(), vec!["news".into()])]);
        let url = "https://news.ycombinator.com/item?id=1";
        let first = categorize(url, &user);
        for _ in 0..10 {
            assert_eq!(categorize(url, &user), first);
        }
        assert_eq!(first, Category::Custom("reading".into()));
    }

    #[test]
    fn category_serializes_as_plain_string() {
        let json = serde_json::to_string(&Category::Custom("reading".into())).unwrap();
        assert_eq!(json, "\"reading\"");
        let back: Category = serde_json::from_str("\"social\"").unwrap();
        assert_eq!(back, Category::Social);
    }
}
