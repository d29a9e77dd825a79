//! In-memory adapter for exercising the catalog without upstreams.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use zeustv_core::types::{EpisodeRef, MediaType, StreamRef};
use zeustv_sources::{RawDetail, RawRecord, SourceAdapter, SourceKind};

pub struct StubAdapter {
    name: String,
    prefix: String,
    kind: SourceKind,
    media_types: Vec<MediaType>,
    records: Vec<RawRecord>,
    detail: Option<RawDetail>,
    episodes: Vec<EpisodeRef>,
    stream: Option<StreamRef>,
    delay: Option<Duration>,
    empty_episode_calls: usize,
    search_calls: Arc<AtomicUsize>,
    stream_calls: Arc<AtomicUsize>,
    episode_calls: Arc<AtomicUsize>,
}

impl StubAdapter {
    pub fn new(name: &str, prefix: &str) -> Self {
        Self {
            name: name.to_string(),
            prefix: prefix.to_string(),
            kind: SourceKind::Site,
            media_types: vec![MediaType::Movie, MediaType::Series],
            records: Vec::new(),
            detail: None,
            episodes: Vec::new(),
            stream: None,
            delay: None,
            empty_episode_calls: 0,
            search_calls: Arc::new(AtomicUsize::new(0)),
            stream_calls: Arc::new(AtomicUsize::new(0)),
            episode_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_kind(mut self, kind: SourceKind, media_types: Vec<MediaType>) -> Self {
        self.kind = kind;
        self.media_types = media_types;
        self
    }

    pub fn with_records(mut self, records: Vec<RawRecord>) -> Self {
        self.records = records;
        self
    }

    pub fn with_detail(mut self, detail: RawDetail) -> Self {
        self.detail = Some(detail);
        self
    }

    /// Episodes of every season; `get_episodes` filters by season, in the given order.
    pub fn with_episodes(mut self, episodes: Vec<EpisodeRef>) -> Self {
        self.episodes = episodes;
        self
    }

    pub fn with_stream(mut self, stream: StreamRef) -> Self {
        self.stream = Some(stream);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// The first `calls` episode lookups come back empty, like a flaky upstream.
    pub fn with_empty_episode_calls(mut self, calls: usize) -> Self {
        self.empty_episode_calls = calls;
        self
    }

    pub fn search_calls(&self) -> Arc<AtomicUsize> {
        self.search_calls.clone()
    }

    pub fn stream_calls(&self) -> Arc<AtomicUsize> {
        self.stream_calls.clone()
    }

    pub fn episode_calls(&self) -> Arc<AtomicUsize> {
        self.episode_calls.clone()
    }

    async fn pause(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait::async_trait]
impl SourceAdapter for StubAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn prefix(&self) -> &str {
        &self.prefix
    }

    fn kind(&self) -> SourceKind {
        self.kind
    }

    fn media_types(&self) -> &[MediaType] {
        &self.media_types
    }

    fn base_url(&self) -> String {
        format!("https://{}.example.com", self.name.to_lowercase())
    }

    async fn search(&self, _query: &str) -> Vec<RawRecord> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        self.records.clone()
    }

    async fn get_detail(&self, id: &str, media_type: MediaType) -> Option<RawDetail> {
        self.pause().await;
        self.detail
            .clone()
            .filter(|d| d.id == id && d.media_type == media_type)
    }

    async fn get_episodes(&self, _id: &str, season: u32) -> Vec<EpisodeRef> {
        if self.episode_calls.fetch_add(1, Ordering::SeqCst) < self.empty_episode_calls {
            return Vec::new();
        }
        self.episodes
            .iter()
            .filter(|ep| ep.season == season)
            .cloned()
            .collect()
    }

    async fn resolve_stream(&self, _stream_id: &str) -> Option<StreamRef> {
        self.stream_calls.fetch_add(1, Ordering::SeqCst);
        self.stream.clone()
    }
}
