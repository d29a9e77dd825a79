//! M3U playlist parsing and the live channel index built from it.

use std::collections::HashMap;
use std::sync::{LazyLock, PoisonError, RwLock};
use std::time::{Duration, Instant};

use regex::Regex;

use crate::channels::{ChannelClassifier, is_backup};

static RE_EXTINF_ATTR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(\w+(?:-\w+)*)="([^"]*)""#).unwrap());

/// One `#EXTINF` + URL pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistEntry {
    pub name: String,
    pub url: String,
    pub group: Option<String>,
    pub logo: Option<String>,
    pub tvg_id: Option<String>,
}

/// Parse M3U text. `tvg-name` wins over the trailing display name.
pub fn parse_m3u(text: &str) -> Vec<PlaylistEntry> {
    let mut entries = Vec::new();
    let mut pending: Option<PlaylistEntry> = None;

    for line in text.lines().map(str::trim) {
        if line.is_empty() {
            continue;
        }
        if line.starts_with("#EXTINF") {
            pending = Some(parse_extinf(line));
        } else if line.starts_with("http://") || line.starts_with("https://") {
            if let Some(mut entry) = pending.take() {
                entry.url = line.to_string();
                entries.push(entry);
            }
        }
    }

    entries
}

fn parse_extinf(line: &str) -> PlaylistEntry {
    let mut attrs: HashMap<String, String> = HashMap::new();
    for caps in RE_EXTINF_ATTR.captures_iter(line) {
        attrs.insert(caps[1].to_lowercase(), caps[2].trim().to_string());
    }
    let non_empty = |key: &str| attrs.get(key).filter(|v| !v.is_empty()).cloned();

    let display = line
        .rsplit_once(',')
        .map(|(_, name)| name.trim().to_string())
        .unwrap_or_default();

    PlaylistEntry {
        name: non_empty("tvg-name").unwrap_or(display),
        url: String::new(),
        group: non_empty("group-title"),
        logo: non_empty("tvg-logo"),
        tvg_id: non_empty("tvg-id"),
    }
}

/// Current locator for one channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelFeed {
    pub url: String,
    pub category: String,
    pub logo: Option<String>,
    backup: bool,
}

/// Channel id → feed map, rebuilt on every playlist refresh.
///
/// Shared by the live adapter and the background refresh task.
#[derive(Debug, Default)]
pub struct PlaylistIndex {
    feeds: RwLock<HashMap<String, ChannelFeed>>,
    refreshed_at: RwLock<Option<Instant>>,
    refresh: tokio::sync::Mutex<()>,
}

impl PlaylistIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the index from playlist entries. Returns the number of channels found.
    pub fn rebuild(&self, entries: &[PlaylistEntry], classifier: &ChannelClassifier) -> usize {
        let mut feeds: HashMap<String, ChannelFeed> = HashMap::new();
        for entry in entries {
            let Some(rule) = classifier.classify(&entry.name, &entry.url) else {
                continue;
            };
            let backup = is_backup(&entry.name);
            let replace = match feeds.get(&rule.id) {
                None => true,
                Some(existing) => existing.backup && !backup,
            };
            if replace {
                feeds.insert(
                    rule.id.clone(),
                    ChannelFeed {
                        url: entry.url.clone(),
                        category: entry.group.clone().unwrap_or_else(|| "Diğerleri".into()),
                        logo: entry.logo.clone(),
                        backup,
                    },
                );
            }
        }

        let count = feeds.len();
        *self.feeds.write().unwrap_or_else(PoisonError::into_inner) = feeds;
        *self
            .refreshed_at
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(Instant::now());
        count
    }

    pub fn feed(&self, channel_id: &str) -> Option<ChannelFeed> {
        self.feeds
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(channel_id)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.feeds.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True when the index is empty or older than `max_age`.
    pub fn is_stale(&self, max_age: Duration) -> bool {
        if self.is_empty() {
            return true;
        }
        match *self.refreshed_at.read().unwrap_or_else(PoisonError::into_inner) {
            Some(at) => at.elapsed() >= max_age,
            None => true,
        }
    }

    /// Serialises refreshes so concurrent requests fetch the playlist once.
    pub async fn refresh_guard(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.refresh.lock().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLAYLIST: &str = r#"#EXTM3U
#EXTINF:-1 tvg-id="b1" tvg-name="BeIN Sport 1 Yedek" tvg-logo="https://logo.example.com/b1.png" group-title="BeINSports",BeIN 1 Yedek
https://cdn.example.com/bein-backup/yayinzirve.m3u8
#EXTINF:-1 tvg-name="BeIN Sports 1" group-title="BeINSports",BeIN 1
https://cdn.example.com/yayinzirve.m3u8

#EXTINF:-1 group-title="Spor",Exxen Spor
https://cdn.example.com/exxen.m3u8
#EXTINF:-1,Orphan without url
#EXTINF:-1,Tabii Spor
https://cdn.example.com/tabii.m3u8
"#;

    #[test]
    fn parses_attributes_and_display_names() {
        let entries = parse_m3u(PLAYLIST);
        assert_eq!(entries.len(), 4);
        assert_eq!(entries[0].name, "BeIN Sport 1 Yedek");
        assert_eq!(entries[0].tvg_id.as_deref(), Some("b1"));
        assert_eq!(entries[0].logo.as_deref(), Some("https://logo.example.com/b1.png"));
        assert_eq!(entries[2].name, "Exxen Spor");
        assert_eq!(entries[2].group.as_deref(), Some("Spor"));
        assert_eq!(entries[3].name, "Tabii Spor");
        assert_eq!(entries[3].url, "https://cdn.example.com/tabii.m3u8");
    }

    #[test]
    fn rebuild_prefers_primary_feeds() {
        let index = PlaylistIndex::new();
        assert!(index.is_stale(Duration::from_secs(300)));

        let found = index.rebuild(&parse_m3u(PLAYLIST), &ChannelClassifier::default());
        assert_eq!(found, 3);
        // "BeIN Sport 1 Yedek" is excluded by name; the primary feed is kept.
        let bein = index.feed("beinsport-1").unwrap();
        assert_eq!(bein.url, "https://cdn.example.com/yayinzirve.m3u8");
        assert_eq!(bein.category, "BeINSports");
        assert_eq!(index.feed("tabii-spor").unwrap().category, "Diğerleri");
        assert!(!index.is_stale(Duration::from_secs(300)));
    }

    #[test]
    fn backup_is_replaced_by_primary() {
        let entries = vec![
            PlaylistEntry {
                name: "Exxen Spor Yedek".into(),
                url: "https://cdn.example.com/exxen-2.m3u8".into(),
                group: None,
                logo: None,
                tvg_id: None,
            },
            PlaylistEntry {
                name: "Exxen Spor".into(),
                url: "https://cdn.example.com/exxen-1.m3u8".into(),
                group: None,
                logo: None,
                tvg_id: None,
            },
        ];
        let index = PlaylistIndex::new();
        index.rebuild(&entries, &ChannelClassifier::default());
        assert_eq!(
            index.feed("exxen-spor").unwrap().url,
            "https://cdn.example.com/exxen-1.m3u8"
        );
    }
}
