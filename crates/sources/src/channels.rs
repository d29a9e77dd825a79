//! Live channel classification.
//!
//! Playlist entry names drift constantly ("BeIN Sports 1", "beIN SPORT 1 HD",
//! "BeIN Sport 1 Yedek"), so matching is a list of keyword rules evaluated in
//! order. The default table can be replaced from configuration.

use serde::Deserialize;

/// One target channel plus the rules that recognise its playlist entries.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChannelRule {
    pub id: String,
    pub name: String,
    pub quality: String,
    /// At least one must appear in the normalised entry name.
    #[serde(default)]
    pub name_any: Vec<String>,
    /// None may appear in the normalised entry name.
    #[serde(default)]
    pub name_none: Vec<String>,
    /// URL tokens that identify the channel even when the name does not.
    #[serde(default)]
    pub url_alone: Vec<String>,
    /// When non-empty, the URL must contain one of these.
    #[serde(default)]
    pub url_any: Vec<String>,
    /// None may appear in the URL.
    #[serde(default)]
    pub url_none: Vec<String>,
}

impl ChannelRule {
    pub fn matches(&self, normalized_name: &str, url: &str) -> bool {
        let url = url.to_lowercase();
        let by_name = self.name_any.iter().any(|k| normalized_name.contains(k.as_str()))
            && !self.name_none.iter().any(|k| normalized_name.contains(k.as_str()));
        let by_url = self.url_alone.iter().any(|k| url.contains(k.as_str()));
        if !(by_name || by_url) {
            return false;
        }
        if self.url_none.iter().any(|k| url.contains(k.as_str())) {
            return false;
        }
        self.url_any.is_empty() || self.url_any.iter().any(|k| url.contains(k.as_str()))
    }
}

/// Lowercase, fold "sports" into "sport", collapse whitespace.
pub fn normalize_channel_name(name: &str) -> String {
    name.to_lowercase()
        .replace("sports", "sport")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Backup feeds are labelled "yedek" (Turkish for backup).
pub fn is_backup(name: &str) -> bool {
    name.to_lowercase().contains("yedek")
}

#[derive(Debug, Clone)]
pub struct ChannelClassifier {
    rules: Vec<ChannelRule>,
}

impl ChannelClassifier {
    pub fn new(rules: Vec<ChannelRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[ChannelRule] {
        &self.rules
    }

    pub fn rule(&self, id: &str) -> Option<&ChannelRule> {
        self.rules.iter().find(|r| r.id == id)
    }

    /// First rule matching a playlist entry.
    pub fn classify(&self, entry_name: &str, url: &str) -> Option<&ChannelRule> {
        let normalized = normalize_channel_name(entry_name);
        self.rules.iter().find(|r| r.matches(&normalized, url))
    }
}

impl Default for ChannelClassifier {
    fn default() -> Self {
        Self::new(default_rules())
    }
}

/// Which queries list every channel instead of filtering by name.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct MatchPolicy {
    pub general_terms: Vec<String>,
}

impl Default for MatchPolicy {
    fn default() -> Self {
        Self {
            general_terms: ["spor", "bein", "canlı", "tv", "live", "neonspor"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

impl MatchPolicy {
    pub fn is_general(&self, query: &str) -> bool {
        let query = query.trim().to_lowercase();
        query.is_empty()
            || self
                .general_terms
                .iter()
                .filter(|t| !t.is_empty())
                .any(|t| query.contains(t.as_str()))
    }

    /// Whether `channel_name` should be listed for `query`.
    pub fn accepts(&self, query: &str, channel_name: &str) -> bool {
        if self.is_general(query) {
            return true;
        }
        let query = query.trim().to_lowercase();
        let name = channel_name.to_lowercase();
        let first_word = name.split_whitespace().next().unwrap_or_default();
        // Single letters ("S Sport") would match almost any query.
        name.contains(&query) || (first_word.chars().count() >= 3 && query.contains(first_word))
    }
}

fn words(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn rule(id: &str, name: &str, quality: &str) -> ChannelRule {
    ChannelRule {
        id: id.to_string(),
        name: name.to_string(),
        quality: quality.to_string(),
        name_any: Vec::new(),
        name_none: Vec::new(),
        url_alone: Vec::new(),
        url_any: Vec::new(),
        url_none: Vec::new(),
    }
}

pub fn default_rules() -> Vec<ChannelRule> {
    vec![
        ChannelRule {
            name_any: words(&["bein sport 1"]),
            name_none: words(&["max", "yedek", "2", "smart"]),
            url_none: words(&[
                "sms", "yayinb2", "yayinb3", "yayinb4", "yayinb5", "bm2", "bm3", "bm4", "bm5",
            ]),
            ..rule("beinsport-1", "BeIN Sports 1", "720p")
        },
        ChannelRule {
            name_any: words(&["bein sport 2"]),
            name_none: words(&["max", "yedek", "smart", "3", "4", "5"]),
            url_alone: words(&["yayinb2"]),
            url_any: words(&["yayinb2", "b2"]),
            url_none: words(&[
                "sms", "zirve", "yayinb3", "yayinb4", "yayinb5", "bm1", "bm2", "bm3", "bm4", "bm5",
            ]),
            ..rule("beinsport-2", "BeIN Sports 2", "720p")
        },
        ChannelRule {
            name_any: words(&["tabii spor"]),
            name_none: words(&["trt", "a spor"]),
            ..rule("tabii-spor", "Tabii Spor", "1080p")
        },
        ChannelRule {
            name_any: words(&["s sport"]),
            name_none: words(&["smart"]),
            ..rule("s-sport", "S Sport", "1080p")
        },
        ChannelRule {
            name_any: words(&["tivibu spor"]),
            name_none: words(&["trt"]),
            ..rule("tivibu-spor", "Tivibu Spor", "720p")
        },
        ChannelRule {
            name_any: words(&["smart spor", "spor smart"]),
            name_none: words(&["bein"]),
            ..rule("smart-spor", "Smart Spor", "1080p")
        },
        ChannelRule {
            name_any: words(&["exxen spor"]),
            name_none: words(&["trt"]),
            ..rule("exxen-spor", "Exxen Spor", "1080p")
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify<'a>(c: &'a ChannelClassifier, name: &str, url: &str) -> Option<&'a str> {
        c.classify(name, url).map(|r| r.id.as_str())
    }

    #[test]
    fn bein_channels_are_told_apart() {
        let c = ChannelClassifier::default();
        assert_eq!(
            classify(&c, "BeIN Sports 1", "https://a.example.com/yayinzirve.m3u8"),
            Some("beinsport-1")
        );
        assert_eq!(
            classify(&c, "beIN Sport 2", "https://a.example.com/yayinb2.m3u8"),
            Some("beinsport-2")
        );
        // Wrong feed under the right name.
        assert_eq!(
            classify(&c, "BeIN Sport 1", "https://a.example.com/yayinsms2.m3u8"),
            None
        );
        // Unnamed feed recognised by URL.
        assert_eq!(
            classify(&c, "Kanal", "https://a.example.com/yayinb2.m3u8"),
            Some("beinsport-2")
        );
        assert_eq!(
            classify(&c, "BeIN Sport 1 MAX", "https://a.example.com/x.m3u8"),
            None
        );
    }

    #[test]
    fn smart_spor_is_not_s_sport() {
        let c = ChannelClassifier::default();
        assert_eq!(
            classify(&c, "Smart Spor HD", "https://a.example.com/smart.m3u8"),
            Some("smart-spor")
        );
        assert_eq!(
            classify(&c, "S Sport", "https://a.example.com/ssport.m3u8"),
            Some("s-sport")
        );
    }

    #[test]
    fn names_are_normalized() {
        assert_eq!(normalize_channel_name("  BeIN   SPORTS  1 "), "bein sport 1");
        assert!(is_backup("BeIN Sport 1 Yedek"));
    }

    #[test]
    fn empty_query_and_general_terms_list_everything() {
        let policy = MatchPolicy::default();
        assert!(policy.accepts("", "Exxen Spor"));
        assert!(policy.accepts("canlı spor", "Exxen Spor"));
        assert!(policy.accepts("exxen", "Exxen Spor"));
        assert!(!policy.accepts("exxen", "Tabii Spor"));
        assert!(!policy.accepts("gibi", "Tabii Spor"));
        assert!(!policy.accepts("kurtlar vadisi", "S Sport"));
    }

    #[test]
    fn general_terms_are_configurable() {
        let policy = MatchPolicy {
            general_terms: vec!["hepsi".into(), String::new()],
        };
        assert!(policy.accepts("hepsi", "Tabii Spor"));
        assert!(!policy.accepts("spor", "Ekstra"));
    }
}
