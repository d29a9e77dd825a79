//! Subtitle materialization.
//!
//! Upstream subtitle files (usually WebVTT) are downloaded, converted to SRT
//! with formatting tags removed, and written under `<static>/subs/<uuid>.srt`
//! so Stremio can fetch them from this server.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use thiserror::Error;
use tracing::{debug, info, warn};
use zeustv_core::types::SubtitleRef;
use zeustv_sources::SourceError;
use zeustv_sources::http::{FetchRequest, HttpClient};

use crate::config::SubtitleConfig;
use crate::stremio::SubtitleObject;

static RE_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>|\{\\[^}]*\}").unwrap());

#[derive(Debug, Error)]
pub enum SubtitleError {
    #[error("download failed: {0}")]
    Download(#[from] SourceError),
    #[error("subtitle io: {0}")]
    Io(#[from] std::io::Error),
}

/// `00:01.5` / `00:00:01,500` → `00:00:01,500`.
fn srt_timestamp(raw: &str) -> Option<String> {
    let raw = raw.trim().replace(',', ".");
    let (clock, fraction) = raw.split_once('.').unwrap_or((raw.as_str(), "0"));
    let parts = clock
        .split(':')
        .map(|p| p.parse::<u32>().ok())
        .collect::<Option<Vec<_>>>()?;
    let (h, m, s) = match parts.as_slice() {
        [m, s] => (0, *m, *s),
        [h, m, s] => (*h, *m, *s),
        _ => return None,
    };
    let millis: String = fraction.chars().chain("000".chars()).take(3).collect();
    let millis: u32 = millis.parse().ok()?;
    Some(format!("{h:02}:{m:02}:{s:02},{millis:03}"))
}

/// Convert WebVTT (or loosely formatted SRT) to clean, renumbered SRT.
pub fn to_srt(text: &str) -> String {
    let text = text.trim_start_matches('\u{feff}').replace("\r\n", "\n");
    let mut out = String::new();
    let mut index = 0;

    for block in text.split("\n\n") {
        let mut lines = block.lines().skip_while(|line| !line.contains("-->"));
        let Some(timing) = lines.next() else {
            continue;
        };
        let Some((start, end)) = timing.split_once("-->") else {
            continue;
        };
        let end = end.split_whitespace().next().unwrap_or_default();
        let (Some(start), Some(end)) = (srt_timestamp(start), srt_timestamp(end)) else {
            debug!(timing = %timing, "skipping cue with unreadable timing");
            continue;
        };
        let body: Vec<String> = lines
            .map(|line| RE_TAG.replace_all(line, "").trim().to_string())
            .filter(|line| !line.is_empty())
            .collect();
        if body.is_empty() {
            continue;
        }

        index += 1;
        out.push_str(&format!("{index}\n{start} --> {end}\n{}\n\n", body.join("\n")));
    }
    out
}

pub struct SubtitleStore {
    dir: PathBuf,
    public_base: String,
    http: HttpClient,
    config: SubtitleConfig,
}

impl SubtitleStore {
    pub fn new(dir: PathBuf, hosting_url: &str, http: HttpClient, config: SubtitleConfig) -> Self {
        Self {
            dir,
            public_base: format!("{}/subs", hosting_url.trim_end_matches('/')),
            http,
            config,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Download and publish every reference. Failures are logged and skipped.
    pub async fn materialize(&self, refs: &[SubtitleRef]) -> Vec<SubtitleObject> {
        let mut published = Vec::new();
        for sub in refs {
            match self.publish(sub).await {
                Ok(object) => published.push(object),
                Err(err) => warn!(url = %sub.url, lang = %sub.lang, error = %err, "subtitle skipped"),
            }
        }
        published
    }

    async fn publish(&self, sub: &SubtitleRef) -> Result<SubtitleObject, SubtitleError> {
        let body = self
            .http
            .text(
                FetchRequest::get(&sub.url)
                    .timeout(Duration::from_secs(self.config.download_timeout_secs)),
            )
            .await?;
        Ok(self.store(&sub.lang, &body).await?)
    }

    /// Convert `body` and write it as a new file.
    pub async fn store(&self, lang: &str, body: &str) -> std::io::Result<SubtitleObject> {
        tokio::fs::create_dir_all(&self.dir).await?;
        self.housekeeping().await?;

        let name = format!("{}.srt", uuid::Uuid::new_v4());
        tokio::fs::write(self.dir.join(&name), to_srt(body)).await?;
        debug!(file = %name, lang = %lang, "subtitle written");
        Ok(SubtitleObject::new(
            format!("{}/{name}", self.public_base),
            lang.to_string(),
        ))
    }

    /// Empty the directory once it holds more than the configured number of entries.
    pub async fn housekeeping(&self) -> std::io::Result<usize> {
        let mut entries = Vec::new();
        let mut dir = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = dir.next_entry().await? {
            entries.push(entry);
        }
        if entries.len() <= self.config.max_files {
            return Ok(0);
        }

        for entry in &entries {
            let path = entry.path();
            if entry.file_type().await?.is_dir() {
                tokio::fs::remove_dir_all(&path).await?;
            } else {
                tokio::fs::remove_file(&path).await?;
            }
        }
        info!(removed = entries.len(), dir = %self.dir.display(), "subtitle directory cleared");
        Ok(entries.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zeustv_sources::http::HttpConfig;

    fn store(dir: PathBuf, max_files: usize) -> SubtitleStore {
        SubtitleStore::new(
            dir,
            "https://zeus.example.com/",
            HttpClient::new(HttpConfig::default()).unwrap(),
            SubtitleConfig {
                download_timeout_secs: 1,
                max_files,
            },
        )
    }

    fn temp_dir() -> PathBuf {
        std::env::temp_dir().join(format!("zeustv_subs_{}", uuid::Uuid::new_v4()))
    }

    #[test]
    fn webvtt_becomes_numbered_srt() {
        let vtt = "\u{feff}WEBVTT\r\n\r\nNOTE yorum\r\n\r\n1\r\n00:01.000 --> 00:04.250 align:start\r\n<i>Merhaba</i> {\\an8}dünya\r\n\r\n00:00:05.5 --> 00:00:07.000\r\n<b></b>\r\n\r\n00:00:08.000 --> 00:00:09.000\r\nİkinci\r\nsatır\r\n";
        assert_eq!(
            to_srt(vtt),
            "1\n00:00:01,000 --> 00:00:04,250\nMerhaba dünya\n\n\
             2\n00:00:08,000 --> 00:00:09,000\nİkinci\nsatır\n\n"
        );
    }

    #[test]
    fn timestamps_are_normalized() {
        assert_eq!(srt_timestamp("01:02.5").as_deref(), Some("00:01:02,500"));
        assert_eq!(srt_timestamp(" 1:02:03,04 ").as_deref(), Some("01:02:03,040"));
        assert_eq!(srt_timestamp("abc"), None);
    }

    #[tokio::test]
    async fn stored_files_get_public_urls() {
        let dir = temp_dir();
        let store = store(dir.clone(), 500);
        let object = store
            .store("tur", "WEBVTT\n\n00:01.000 --> 00:02.000\nSelam\n")
            .await
            .unwrap();
        assert_eq!(object.id, "zeustv-tur");
        assert!(object.url.starts_with("https://zeus.example.com/subs/"));
        assert!(object.url.ends_with(".srt"));

        let name = object.url.rsplit('/').next().unwrap();
        let written = std::fs::read_to_string(dir.join(name)).unwrap();
        assert!(written.contains("00:00:01,000 --> 00:00:02,000"));
        std::fs::remove_dir_all(dir).unwrap();
    }

    #[tokio::test]
    async fn directory_is_cleared_past_the_limit() {
        let dir = temp_dir();
        std::fs::create_dir_all(dir.join("nested")).unwrap();
        for i in 0..3 {
            std::fs::write(dir.join(format!("{i}.srt")), "x").unwrap();
        }
        let store = store(dir.clone(), 3);
        assert_eq!(store.housekeeping().await.unwrap(), 4);
        assert_eq!(std::fs::read_dir(&dir).unwrap().count(), 0);
        assert_eq!(store.housekeeping().await.unwrap(), 0);
        std::fs::remove_dir_all(dir).unwrap();
    }
}
