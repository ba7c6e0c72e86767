use std::fmt;

use serde::{
    de::{MapAccess, Visitor},
    ser::SerializeMap,
    Deserialize, Deserializer, Serialize, Serializer,
};

pub const DEFAULT_EXCLUDED_SITES: [&str; 3] = ["chrome://", "chrome-extension://", "about:"];

const MAX_PATTERN_LEN: usize = 256;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub tracking_enabled: bool,
    pub excluded_sites: Vec<String>,
    pub user_categories: UserCategories,
    pub privacy_mode: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            tracking_enabled: true,
            excluded_sites: DEFAULT_EXCLUDED_SITES.iter().map(|s| s.to_string()).collect(),
            user_categories: UserCategories::default(),
            privacy_mode: false,
        }
    }
}

impl Settings {
    /// True when any exclusion pattern is a substring of `url`.
    pub fn is_excluded(&self, url: &str) -> bool {
        self.excluded_sites
            .iter()
            .any(|p| !p.is_empty() && url.contains(p.as_str()))
    }

    /// Applies a partial update. Returns a static error code on invalid input.
    pub fn apply(&self, update: SettingsUpdate) -> Result<Settings, &'static str> {
        let mut next = self.clone();
        if let Some(v) = update.tracking_enabled {
            next.tracking_enabled = v;
        }
        if let Some(v) = update.privacy_mode {
            next.privacy_mode = v;
        }
        if let Some(sites) = update.excluded_sites {
            next.excluded_sites = normalize_patterns(sites)?;
        }
        if let Some(categories) = update.user_categories {
            let mut out = Vec::with_capacity(categories.0.len());
            for (name, patterns) in categories.0 {
                let name = name.trim().to_lowercase();
                if name.is_empty() {
                    return Err("invalid_category_name");
                }
                out.push((name, normalize_patterns(patterns)?));
            }
            next.user_categories = UserCategories(out);
        }
        Ok(next)
    }
}

fn normalize_patterns(patterns: Vec<String>) -> Result<Vec<String>, &'static str> {
    let mut out = Vec::with_capacity(patterns.len());
    for p in patterns {
        let p = p.trim();
        if p.is_empty() {
            continue;
        }
        if p.len() > MAX_PATTERN_LEN {
            return Err("invalid_pattern");
        }
        if !out.iter().any(|existing: &String| existing == p) {
            out.push(p.to_string());
        }
    }
    Ok(out)
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsUpdate {
    #[serde(default)]
    pub tracking_enabled: Option<bool>,
    #[serde(default)]
    pub excluded_sites: Option<Vec<String>>,
    #[serde(default)]
    pub user_categories: Option<UserCategories>,
    #[serde(default)]
    pub privacy_mode: Option<bool>,
}

/// User-defined category → patterns, kept in the order the user wrote them.
///
/// Serialized as a JSON object; deserialization preserves document order so
/// that the first matching category wins deterministically.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UserCategories(Vec<(String, Vec<String>)>);

impl UserCategories {
    pub fn new(entries: Vec<(String, Vec<String>)>) -> Self {
        Self(entries)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }
}

impl Serialize for UserCategories {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for UserCategories {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct OrderedVisitor;

        impl<'de> Visitor<'de> for OrderedVisitor {
            type Value = UserCategories;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of category name to pattern list")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut out: Vec<(String, Vec<String>)> = Vec::new();
                while let Some((k, v)) = access.next_entry::<String, Vec<String>>()? {
                    // Later duplicates replace earlier ones in place.
                    if let Some(slot) = out.iter_mut().find(|(name, _)| *name == k) {
                        slot.1 = v;
                    } else {
                        out.push((k, v));
                    }
                }
                Ok(UserCategories(out))
            }
        }

        deserializer.deserialize_map(OrderedVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_categories_keep_document_order() {
        let parsed: UserCategories =
            serde_json::from_str(r#"{"zeta":["z.com"],"alpha":["a.com","b.com"]}"#).unwrap();
        let names: Vec<&str> = parsed.iter().map(|(k, _)| k).collect();
        assert_eq!(names, vec!["zeta", "alpha"]);

        let back = serde_json::to_string(&parsed).unwrap();
        assert_eq!(back, r#"{"zeta":["z.com"],"alpha":["a.com","b.com"]}"#);
    }

    #[test]
    fn defaults_exclude_internal_pages() {
        let s = Settings::default();
        assert!(s.tracking_enabled);
        assert!(s.is_excluded("chrome://settings"));
        assert!(s.is_excluded("about:blank"));
        assert!(!s.is_excluded("https://github.com"));
    }

    #[test]
    fn apply_partial_update() {
        let s = Settings::default();
        let update: SettingsUpdate = serde_json::from_str(
            r#"{"privacyMode":true,"excludedSites":[" bank.com ","","bank.com"],"userCategories":{" Work ":["corp.example"]}}"#,
        )
        .unwrap();
        let next = s.apply(update).unwrap();
        assert!(next.privacy_mode);
        assert!(next.tracking_enabled);
        assert_eq!(next.excluded_sites, vec!["bank.com".to_string()]);
        let cats: Vec<(&str, &[String])> = next.user_categories.iter().collect();
        assert_eq!(cats[0].0, "work");
    }

    #[test]
    fn apply_rejects_blank_category() {
        let update = SettingsUpdate {
            user_categories: Some(UserCategories::new(vec![(" ".into(), vec!["x".into()])])),
            ..Default::default()
        };
        assert_eq!(Settings::default().apply(update), Err("invalid_category_name"));
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let s: Settings = serde_json::from_str(r#"{"privacyMode":true}"#).unwrap();
        assert!(s.tracking_enabled);
        assert_eq!(s.excluded_sites.len(), 3);
    }
}
