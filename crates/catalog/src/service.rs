//! Catalog facade used by the HTTP layer: search, meta, stream and subtitle flows.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::{debug, warn};
use zeustv_core::cache::TtlCache;
use zeustv_core::types::{CatalogItem, Detail, EpisodeRef, MediaType, StreamRef, SubtitleRef};
use zeustv_sources::source::finalize_episodes;

use crate::aggregator::{Aggregator, CatalogContext};
use crate::normalize::normalize_detail;
use crate::policy::CatalogConfig;
use crate::router::{AdapterRef, IdRouter, strip_json};

/// Suffix of the single synthetic episode of a live channel.
pub const LIVE_EPISODE_SUFFIX: &str = "-live";

/// A stream ready for display.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedStream {
    pub title: String,
    pub stream: StreamRef,
}

pub struct CatalogService {
    router: Arc<IdRouter>,
    aggregator: Aggregator,
    config: CatalogConfig,
    details: TtlCache<Detail>,
    episodes: TtlCache<Vec<EpisodeRef>>,
    streams: TtlCache<StreamRef>,
    subtitles: TtlCache<Vec<SubtitleRef>>,
}

impl CatalogService {
    pub fn new(router: IdRouter, config: CatalogConfig) -> Self {
        let router = Arc::new(router);
        let aggregator = Aggregator::new(
            router.clone(),
            config.cache.search(),
            config.search_timeout(),
        );
        Self {
            router,
            aggregator,
            config,
            details: TtlCache::new(),
            episodes: TtlCache::new(),
            streams: TtlCache::new(),
            subtitles: TtlCache::new(),
        }
    }

    pub fn router(&self) -> &IdRouter {
        &self.router
    }

    pub async fn search(
        &self,
        query: &str,
        media_type: MediaType,
        context: CatalogContext,
    ) -> Vec<CatalogItem> {
        self.aggregator
            .search_all(query, media_type, context)
            .await
    }

    fn route(&self, id: &str) -> Option<&AdapterRef> {
        match self.router.route_for(id) {
            Ok(adapter) => Some(adapter),
            Err(err) => {
                debug!(id = %id, error = %err, "unroutable id");
                None
            }
        }
    }

    /// Full detail with episodes, or `None` when no source knows the id.
    pub async fn meta(&self, id: &str, media_type: MediaType) -> Option<Detail> {
        let id = strip_json(id);
        let adapter = self.route(id)?;

        let key = format!("detail:{id}");
        if let Some(cached) = self.details.get(&key) {
            if cached.media_type == media_type {
                return Some(cached);
            }
        }

        let raw = adapter.get_detail(id, media_type).await?;
        let name = raw.title.trim().to_string();
        let source = adapter.name();
        let mut detail = match normalize_detail(raw, source, &adapter.base_url()) {
            Ok(detail) => detail,
            Err(err) => {
                warn!(source = %source, id = %id, error = %err, "dropping malformed detail");
                return None;
            }
        };

        detail.episodes = match detail.media_type {
            MediaType::LiveTv => vec![live_episode(&detail.id, &name, source)],
            MediaType::Series if detail.season_count > 0 => self
                .all_episodes(adapter, id, detail.season_count)
                .await
                .into_iter()
                .map(|ep| decorate_episode(ep, &name, source))
                .collect(),
            _ => Vec::new(),
        };

        // A series whose seasons all came back empty is retried on the next request.
        let incomplete = detail.media_type == MediaType::Series
            && detail.season_count > 0
            && detail.episodes.is_empty();
        if !incomplete {
            self.details
                .set(key, detail.clone(), self.config.cache.detail());
        }
        Some(detail)
    }

    /// Every season in order, a bounded number in flight at once.
    async fn all_episodes(&self, adapter: &AdapterRef, id: &str, seasons: u32) -> Vec<EpisodeRef> {
        let per_season: Vec<Vec<EpisodeRef>> = stream::iter(1..=seasons)
            .map(|season| self.season(adapter, id, season))
            .buffered(self.config.season_concurrency.max(1))
            .collect()
            .await;
        per_season.into_iter().flatten().collect()
    }

    async fn season(&self, adapter: &AdapterRef, id: &str, season: u32) -> Vec<EpisodeRef> {
        let key = format!("episodes:{id}:{season}");
        if let Some(cached) = self.episodes.get(&key) {
            return cached;
        }
        let episodes = finalize_episodes(adapter.get_episodes(id, season).await);
        if !episodes.is_empty() {
            self.episodes
                .set(key, episodes.clone(), self.config.cache.episodes());
        }
        episodes
    }

    /// Resolve a stream id. Failures and unknown ids yield `None` and are not cached.
    pub async fn stream(&self, id: &str) -> Option<ResolvedStream> {
        let id = strip_json(id);
        let adapter = self.route(id)?;

        let key = format!("stream:{id}");
        let stream = match self.streams.get(&key) {
            Some(cached) => cached,
            None => {
                let resolved = adapter.resolve_stream(id).await?;
                self.streams.set(
                    key,
                    resolved.clone(),
                    self.config.cache.stream(adapter.kind()),
                );
                if !resolved.subtitle_refs.is_empty() {
                    self.subtitles.set(
                        format!("subs:{id}"),
                        resolved.subtitle_refs.clone(),
                        self.config.cache.subtitles(),
                    );
                }
                resolved
            }
        };

        Some(ResolvedStream {
            title: adapter.stream_title(id, &stream),
            stream,
        })
    }

    /// Subtitle files reported for a stream, resolving it first when needed.
    pub async fn subtitle_refs(&self, id: &str) -> Vec<SubtitleRef> {
        let id = strip_json(id);
        if let Some(cached) = self.subtitles.get(&format!("subs:{id}")) {
            return cached;
        }
        self.stream(id)
            .await
            .map(|resolved| resolved.stream.subtitle_refs)
            .unwrap_or_default()
    }

    /// Drop expired entries from every cache. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        self.aggregator.purge_expired()
            + self.details.purge_expired()
            + self.episodes.purge_expired()
            + self.streams.purge_expired()
            + self.subtitles.purge_expired()
    }
}

fn live_episode(id: &str, name: &str, source: &str) -> EpisodeRef {
    EpisodeRef::new(
        format!("{id}{LIVE_EPISODE_SUFFIX}"),
        format!("{name} - Canlı Yayın [{source}]"),
        1,
        1,
    )
}

/// Display title `"<series> - S01E02 Bölüm İzle [Source]"`; the upstream title
/// stays in `overview`.
fn decorate_episode(mut episode: EpisodeRef, series: &str, source: &str) -> EpisodeRef {
    if episode.overview.trim().is_empty() {
        episode.overview = episode.title.clone();
    }
    episode.title = format!(
        "{series} - S{:02}E{:02} Bölüm İzle [{source}]",
        episode.season, episode.episode
    );
    episode
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StubAdapter;
    use std::sync::atomic::Ordering;
    use zeustv_core::types::StreamTarget;
    use zeustv_sources::{RawDetail, SourceKind};

    fn service(adapters: Vec<StubAdapter>) -> CatalogService {
        let mut router = IdRouter::new();
        for adapter in adapters {
            router.register(Arc::new(adapter)).unwrap();
        }
        CatalogService::new(router, CatalogConfig::default())
    }

    fn series_detail(id: &str, seasons: u32) -> RawDetail {
        let mut raw = RawDetail::new(id, "Gibi", MediaType::Series);
        raw.season_count = seasons;
        raw
    }

    #[tokio::test]
    async fn series_meta_lists_sorted_episodes_across_seasons() {
        let adapter = StubAdapter::new("SourceA", "a-")
            .with_detail(series_detail("a-gibi", 2))
            .with_episodes(vec![
                EpisodeRef::new("a-gibi:s2e1", "2. Sezon 1. Bölüm", 2, 1),
                EpisodeRef::new("a-gibi:3", "3. Bölüm", 1, 3),
                EpisodeRef::new("a-gibi:1", "1. Bölüm", 1, 1),
                EpisodeRef::new("a-gibi:2", "2. Bölüm", 1, 2),
                EpisodeRef::new("a-gibi:1b", "1. Bölüm (tekrar)", 1, 1),
            ]);
        let svc = service(vec![adapter]);

        let detail = svc.meta("a-gibi.json", MediaType::Series).await.unwrap();
        assert_eq!(detail.title, "Gibi [SourceA]");
        let codes: Vec<(u32, u32)> = detail
            .episodes
            .iter()
            .map(|e| (e.season, e.episode))
            .collect();
        assert_eq!(codes, vec![(1, 1), (1, 2), (1, 3), (2, 1)]);
        assert_eq!(detail.episodes[0].stream_id, "a-gibi:1");
        assert_eq!(
            detail.episodes[0].title,
            "Gibi - S01E01 Bölüm İzle [SourceA]"
        );
        assert_eq!(detail.episodes[0].overview, "1. Bölüm");
        assert_eq!(detail.episodes[3].title, "Gibi - S02E01 Bölüm İzle [SourceA]");
    }

    #[tokio::test]
    async fn series_meta_without_episodes_is_not_cached() {
        let adapter = StubAdapter::new("SourceA", "a-")
            .with_detail(series_detail("a-gibi", 1))
            .with_episodes(vec![EpisodeRef::new("a-gibi:1", "1. Bölüm", 1, 1)])
            .with_empty_episode_calls(1);
        let calls = adapter.episode_calls();
        let svc = service(vec![adapter]);

        let first = svc.meta("a-gibi", MediaType::Series).await.unwrap();
        assert!(first.episodes.is_empty());

        let second = svc.meta("a-gibi", MediaType::Series).await.unwrap();
        assert_eq!(second.episodes.len(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        svc.meta("a-gibi", MediaType::Series).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn live_meta_has_single_synthetic_episode() {
        let adapter = StubAdapter::new("NeonSpor", "neonspor-")
            .with_kind(SourceKind::Playlist, vec![MediaType::LiveTv])
            .with_detail(RawDetail::new("neonspor-bein1", "beIN Sports 1", MediaType::LiveTv));
        let svc = service(vec![adapter]);

        let detail = svc
            .meta("neonspor-bein1", MediaType::LiveTv)
            .await
            .unwrap();
        assert_eq!(detail.episodes.len(), 1);
        let live = &detail.episodes[0];
        assert_eq!(live.stream_id, "neonspor-bein1-live");
        assert_eq!(live.title, "beIN Sports 1 - Canlı Yayın [NeonSpor]");
        assert_eq!((live.season, live.episode), (1, 1));
    }

    #[tokio::test]
    async fn unknown_and_missing_meta_is_none() {
        let svc = service(vec![StubAdapter::new("SourceA", "a-")]);
        assert!(svc.meta("zz:1", MediaType::Series).await.is_none());
        assert!(svc.meta("a-missing", MediaType::Series).await.is_none());
    }

    #[tokio::test]
    async fn resolved_streams_are_cached_with_their_subtitles() {
        let stream = StreamRef::url("https://cdn.example.com/master.m3u8").with_subtitles(vec![
            SubtitleRef {
                lang: "tur".into(),
                url: "https://cdn.example.com/tr.vtt".into(),
            },
        ]);
        let adapter = StubAdapter::new("SourceA", "a-").with_stream(stream);
        let calls = adapter.stream_calls();
        let svc = service(vec![adapter]);

        let first = svc.stream("a-gibi:1.json").await.unwrap();
        assert_eq!(first.title, "SourceA");
        assert_eq!(
            first.stream.target,
            StreamTarget::Url("https://cdn.example.com/master.m3u8".into())
        );
        svc.stream("a-gibi:1").await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let subs = svc.subtitle_refs("a-gibi:1").await;
        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0].lang, "tur");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_live_stream_is_none_and_not_cached() {
        let adapter = StubAdapter::new("NeonSpor", "neonspor-")
            .with_kind(SourceKind::Playlist, vec![MediaType::LiveTv]);
        let calls = adapter.stream_calls();
        let svc = service(vec![adapter]);

        assert!(svc.stream("neonspor-bein1-live").await.is_none());
        assert!(svc.stream("neonspor-bein1-live").await.is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(svc.subtitle_refs("neonspor-bein1-live").await.is_empty());
    }

    #[tokio::test]
    async fn live_stream_title_marks_broadcast() {
        let adapter = StubAdapter::new("NeonSpor", "neonspor-")
            .with_kind(SourceKind::Playlist, vec![MediaType::LiveTv])
            .with_stream(StreamRef::url("https://live.example.com/bein1.m3u8"));
        let svc = service(vec![adapter]);

        let resolved = svc.stream("neonspor-bein1-live").await.unwrap();
        assert_eq!(resolved.title, "NeonSpor [Canlı Yayın]");
    }
}
