//! Ordered extraction strategies for stream resolution.
//!
//! Upstream players hide the final locator in a handful of known shapes. Each
//! shape is a strategy returning `None` on no match; an [`Extractor`] tries
//! them in order and keeps the first hit.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;
use zeustv_core::types::SubtitleRef;

type StrategyFn<T> = Box<dyn Fn(&str) -> Option<T> + Send + Sync>;

pub struct Extractor<T> {
    strategies: Vec<(&'static str, StrategyFn<T>)>,
}

impl<T> Extractor<T> {
    pub fn new() -> Self {
        Self {
            strategies: Vec::new(),
        }
    }

    pub fn then<F>(mut self, name: &'static str, strategy: F) -> Self
    where
        F: Fn(&str) -> Option<T> + Send + Sync + 'static,
    {
        self.strategies.push((name, Box::new(strategy)));
        self
    }

    /// Run strategies in order against `body`; the first `Some` wins.
    pub fn run(&self, body: &str) -> Option<T> {
        self.strategies.iter().find_map(|(name, strategy)| {
            let hit = strategy(body);
            if hit.is_some() {
                debug!(strategy = %name, "extraction strategy matched");
            }
            hit
        })
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }
}

impl<T> Default for Extractor<T> {
    fn default() -> Self {
        Self::new()
    }
}

static RE_PLAYERJS_FILE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"file\s*:\s*["']([^"']+)["']"#).unwrap());
static RE_PLAYERJS_MEDIA_FILE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)file["\s:=]+["']([^"']+\.(?:m3u8|mp4)[^"']*)["']"#).unwrap()
});
static RE_PLAYERJS_SUBTITLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"["']?subtitle["']?\s*:\s*["']([^"']+)["']"#).unwrap());
static RE_MASTER_M3U8: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(https?://[^\s"'<>\\]+master\.m3u8[^\s"'<>\\]*)"#).unwrap());
static RE_M3U8: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(https?://[^\s"'<>\\]+\.m3u8[^\s"'<>\\]*)"#).unwrap());
static RE_MP4: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(https?://[^\s"'<>\\]+\.mp4[^\s"'<>\\]*)"#).unwrap());
static RE_STREAMING_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""streaming_url"\s*:\s*"([^"]+)""#).unwrap());
static RE_SUBTITLE_ENTRY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*\[([^\]]+)\]\s*(\S+)\s*$").unwrap());
static RE_YOUTUBE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?:youtube(?:-nocookie)?\.com/(?:watch\?(?:[^\s\x22']*&)?v=|embed/|shorts/)|youtu\.be/)([A-Za-z0-9_-]{11})",
    )
    .unwrap()
});

fn first_capture(re: &Regex, body: &str) -> Option<String> {
    re.captures(body)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().replace("\\/", "/"))
        .filter(|s| !s.is_empty())
}

/// `file:"..."` from a Playerjs config.
pub fn playerjs_file(body: &str) -> Option<String> {
    first_capture(&RE_PLAYERJS_FILE, body).filter(|u| u.starts_with("http"))
}

/// Loosely written `file` assignment that points at a manifest or an MP4.
pub fn playerjs_media_file(body: &str) -> Option<String> {
    first_capture(&RE_PLAYERJS_MEDIA_FILE, body).filter(|u| u.starts_with("http"))
}

/// `"subtitle":"[Türkçe]https://...,[İngilizce]https://..."` from a Playerjs config.
pub fn playerjs_subtitles(body: &str) -> Vec<SubtitleRef> {
    first_capture(&RE_PLAYERJS_SUBTITLE, body)
        .map(|raw| parse_subtitle_list(&raw))
        .unwrap_or_default()
}

pub fn master_m3u8(body: &str) -> Option<String> {
    first_capture(&RE_MASTER_M3U8, body)
}

pub fn m3u8(body: &str) -> Option<String> {
    first_capture(&RE_M3U8, body)
}

pub fn mp4(body: &str) -> Option<String> {
    first_capture(&RE_MP4, body)
}

/// `streaming_url` field of a JSON player API response.
pub fn streaming_url(body: &str) -> Option<String> {
    first_capture(&RE_STREAMING_URL, body)
}

/// 11-character YouTube video id from any watch/embed/short link in `body`.
pub fn youtube_id(body: &str) -> Option<String> {
    first_capture(&RE_YOUTUBE, body)
}

/// Map a player language label to an ISO 639-2 code.
pub fn subtitle_lang(label: &str) -> String {
    // Lowercasing `İ` leaves a combining dot behind.
    let lower = label.trim().to_lowercase().replace('\u{307}', "");
    if lower.contains("türkçe") || lower.contains("turkce") || lower.contains("turkish") {
        "tur".to_string()
    } else if lower.contains("ingilizce") || lower.contains("english") {
        "eng".to_string()
    } else {
        lower
    }
}

/// Comma-separated `[Label]url` list. Entries without a label are skipped.
pub fn parse_subtitle_list(raw: &str) -> Vec<SubtitleRef> {
    raw.split(',')
        .filter_map(|entry| {
            let caps = RE_SUBTITLE_ENTRY.captures(entry)?;
            let url = caps[2].replace("\\/", "/");
            if !url.starts_with("http") {
                return None;
            }
            Some(SubtitleRef {
                lang: subtitle_lang(&caps[1]),
                url,
            })
        })
        .collect()
}

/// Player extraction chain shared by the scraped sites: Playerjs config, then
/// manifest links, then progressive files.
pub fn media_url_extractor() -> Extractor<String> {
    Extractor::new()
        .then("playerjs-file", playerjs_file)
        .then("master-m3u8", master_m3u8)
        .then("m3u8", m3u8)
        .then("mp4", mp4)
}
