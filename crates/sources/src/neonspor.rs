//! NeonSpor live sports channels, fed from a public M3U playlist.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, info};
use zeustv_core::types::{EpisodeRef, MediaType, StreamRef};

use crate::channels::{ChannelClassifier, ChannelRule, MatchPolicy};
use crate::http::{FetchRequest, HttpClient};
use crate::playlist::{PlaylistIndex, parse_m3u};
use crate::source::{SourceAdapter, SourceKind, recover};
use crate::{RawDetail, RawGenres, RawRecord, SourceError};

pub const PREFIX: &str = "neonspor-";
const LIVE_SUFFIX: &str = "-live";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NeonSporConfig {
    pub playlist_url: String,
    pub refresh_secs: u64,
    pub timeout_secs: u64,
}

impl Default for NeonSporConfig {
    fn default() -> Self {
        Self {
            playlist_url:
                "https://raw.githubusercontent.com/primatzeka/kurbaga/main/NeonSpor/NeonSpor.m3u"
                    .to_string(),
            refresh_secs: 5 * 60,
            timeout_secs: 15,
        }
    }
}

pub struct NeonSporSource {
    http: HttpClient,
    config: NeonSporConfig,
    index: Arc<PlaylistIndex>,
    classifier: ChannelClassifier,
    policy: MatchPolicy,
}

impl NeonSporSource {
    pub fn new(
        http: HttpClient,
        config: NeonSporConfig,
        index: Arc<PlaylistIndex>,
        classifier: ChannelClassifier,
        policy: MatchPolicy,
    ) -> Self {
        Self {
            http,
            config,
            index,
            classifier,
            policy,
        }
    }

    pub fn index(&self) -> &Arc<PlaylistIndex> {
        &self.index
    }

    /// Fetch the playlist and rebuild the channel index.
    pub async fn refresh(&self) -> Result<usize, SourceError> {
        let _guard = self.index.refresh_guard().await;
        self.refresh_locked().await
    }

    async fn refresh_locked(&self) -> Result<usize, SourceError> {
        let body = self
            .http
            .text(
                FetchRequest::get(&self.config.playlist_url)
                    .timeout(Duration::from_secs(self.config.timeout_secs)),
            )
            .await?;
        let entries = parse_m3u(&body);
        let found = self.index.rebuild(&entries, &self.classifier);
        info!(entries = entries.len(), channels = found, "playlist refreshed");
        Ok(found)
    }

    /// Refresh only when the index is empty or older than the refresh interval.
    async fn ensure_fresh(&self) {
        let max_age = Duration::from_secs(self.config.refresh_secs);
        if !self.index.is_stale(max_age) {
            return;
        }
        let _guard = self.index.refresh_guard().await;
        // Another request may have refreshed while we waited.
        if self.index.is_stale(max_age) {
            recover(self.name(), "refresh", self.refresh_locked().await.map(|_| ()));
        }
    }

    fn channel_for(&self, id: &str) -> Option<&ChannelRule> {
        let channel_id = id.strip_prefix(PREFIX)?;
        let channel_id = channel_id.strip_suffix(LIVE_SUFFIX).unwrap_or(channel_id);
        self.classifier.rule(channel_id)
    }

    fn describe(&self, rule: &ChannelRule) -> (String, String) {
        let feed = self.index.feed(&rule.id);
        let status = if feed.is_some() {
            "[Aktif]"
        } else {
            "[URL Bekleniyor]"
        };
        let category = feed.map(|f| f.category).unwrap_or_else(|| "Spor".into());
        (
            format!(
                "{} - {} kalitede canlı spor yayını {status}",
                rule.name, rule.quality
            ),
            category,
        )
    }
}

#[async_trait::async_trait]
impl SourceAdapter for NeonSporSource {
    fn name(&self) -> &str {
        "NeonSpor"
    }

    fn prefix(&self) -> &str {
        PREFIX
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Playlist
    }

    fn media_types(&self) -> &[MediaType] {
        &[MediaType::LiveTv]
    }

    fn base_url(&self) -> String {
        self.config.playlist_url.clone()
    }

    async fn search(&self, query: &str) -> Vec<RawRecord> {
        self.ensure_fresh().await;

        self.classifier
            .rules()
            .iter()
            .filter(|rule| self.policy.accepts(query, &rule.name))
            .map(|rule| {
                let (description, category) = self.describe(rule);
                RawRecord {
                    id: format!("{PREFIX}{}", rule.id),
                    title: rule.name.clone(),
                    media_type: Some(MediaType::LiveTv),
                    locator: self.config.playlist_url.clone(),
                    poster: self.index.feed(&rule.id).and_then(|f| f.logo),
                    description: Some(description),
                    genres: RawGenres::names(["Spor".to_string(), "Canlı TV".to_string(), category]),
                }
            })
            .collect()
    }

    async fn get_detail(&self, id: &str, media_type: MediaType) -> Option<RawDetail> {
        if media_type != MediaType::LiveTv {
            debug!(id = %id, media_type = %media_type, "live source asked for non-live detail");
        }
        let rule = self.channel_for(id)?;
        self.ensure_fresh().await;
        let (description, category) = self.describe(rule);

        let mut detail = RawDetail::new(format!("{PREFIX}{}", rule.id), &rule.name, MediaType::LiveTv);
        detail.poster = self.index.feed(&rule.id).and_then(|f| f.logo);
        detail.description = Some(description);
        detail.genres = RawGenres::names(["Spor".to_string(), "Canlı TV".to_string(), category]);
        detail.season_count = 1;
        Some(detail)
    }

    async fn get_episodes(&self, id: &str, _season: u32) -> Vec<EpisodeRef> {
        let Some(rule) = self.channel_for(id) else {
            return Vec::new();
        };
        vec![EpisodeRef::new(
            format!("{PREFIX}{}{LIVE_SUFFIX}", rule.id),
            format!("{} - Canlı Yayın", rule.name),
            1,
            1,
        )]
    }

    async fn resolve_stream(&self, stream_id: &str) -> Option<StreamRef> {
        let rule = self.channel_for(stream_id)?;
        self.ensure_fresh().await;
        if let Some(feed) = self.index.feed(&rule.id) {
            return Some(StreamRef::url(feed.url));
        }

        // The channel may have appeared since the last refresh.
        recover(self.name(), "refresh", self.refresh().await.map(|_| ()));
        self.index.feed(&rule.id).map(|feed| StreamRef::url(feed.url))
    }
}
