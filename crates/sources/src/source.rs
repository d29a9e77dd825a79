use std::collections::HashSet;

use tracing::warn;
use zeustv_core::types::{EpisodeRef, MediaType, StreamRef, StreamTarget};

use crate::{RawDetail, RawRecord, SourceError};

/// How an upstream is consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// Scraped HTML pages.
    Site,
    /// JSON search API.
    Api,
    /// Plaintext M3U playlist of live channels.
    Playlist,
}

impl SourceKind {
    pub fn is_live(self) -> bool {
        matches!(self, Self::Playlist)
    }
}

/// One upstream content source.
///
/// Every operation degrades to an empty or absent value on failure so that a
/// broken upstream never aborts a fan-out across sources.
#[async_trait::async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Display name, used in title decoration.
    fn name(&self) -> &str;

    /// Fixed id prefix owned by this source. The default source uses `""`.
    fn prefix(&self) -> &str;

    fn kind(&self) -> SourceKind;

    fn media_types(&self) -> &[MediaType];

    /// Base URL used to absolutize relative poster links.
    fn base_url(&self) -> String;

    fn supports(&self, media_type: MediaType) -> bool {
        self.media_types().contains(&media_type)
    }

    async fn search(&self, query: &str) -> Vec<RawRecord>;

    async fn get_detail(&self, id: &str, media_type: MediaType) -> Option<RawDetail>;

    /// Episodes of one 1-based season, sorted by episode number, without duplicates.
    async fn get_episodes(&self, id: &str, season: u32) -> Vec<EpisodeRef>;

    async fn resolve_stream(&self, stream_id: &str) -> Option<StreamRef>;

    /// Title shown next to a resolved stream.
    fn stream_title(&self, _stream_id: &str, stream: &StreamRef) -> String {
        match stream.target {
            StreamTarget::YouTube(_) => format!("{} [YouTube]", self.name()),
            StreamTarget::Url(_) if self.kind().is_live() => {
                format!("{} [Canlı Yayın]", self.name())
            }
            StreamTarget::Url(_) => self.name().to_string(),
        }
    }
}

/// Collapse an internal result into the value the trait contract promises.
pub fn recover<T: Default>(source: &str, op: &str, result: Result<T, SourceError>) -> T {
    match result {
        Ok(value) => value,
        Err(err) => {
            warn!(source = %source, op = %op, error = %err, "upstream call failed");
            T::default()
        }
    }
}

/// Drop repeated episode numbers (first seen wins) and sort ascending.
pub fn finalize_episodes(episodes: Vec<EpisodeRef>) -> Vec<EpisodeRef> {
    let mut seen = HashSet::new();
    let mut unique: Vec<EpisodeRef> = episodes
        .into_iter()
        .filter(|ep| seen.insert(ep.episode))
        .collect();
    unique.sort_by_key(|ep| ep.episode);
    unique
}
