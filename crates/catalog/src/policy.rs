use std::time::Duration;

use serde::Deserialize;
use zeustv_sources::SourceKind;

/// TTLs per payload class, in seconds.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CachePolicy {
    pub search_secs: u64,
    pub detail_secs: u64,
    pub episodes_secs: u64,
    pub stream_secs: u64,
    /// Live playlist URLs rotate upstream, so they are kept briefly.
    pub live_stream_secs: u64,
    pub subtitle_secs: u64,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            search_secs: 60 * 60,
            detail_secs: 60 * 60,
            episodes_secs: 60 * 60,
            stream_secs: 10 * 60,
            live_stream_secs: 2 * 60,
            subtitle_secs: 24 * 60 * 60,
        }
    }
}

impl CachePolicy {
    pub fn search(&self) -> Duration {
        Duration::from_secs(self.search_secs)
    }

    pub fn detail(&self) -> Duration {
        Duration::from_secs(self.detail_secs)
    }

    pub fn episodes(&self) -> Duration {
        Duration::from_secs(self.episodes_secs)
    }

    pub fn subtitles(&self) -> Duration {
        Duration::from_secs(self.subtitle_secs)
    }

    pub fn stream(&self, kind: SourceKind) -> Duration {
        if kind.is_live() {
            Duration::from_secs(self.live_stream_secs)
        } else {
            Duration::from_secs(self.stream_secs)
        }
    }
}

/// Catalog-level settings: cache TTLs and fan-out limits.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub cache: CachePolicy,
    /// Upper bound on one adapter's whole `search`, retries included.
    pub search_timeout_secs: u64,
    /// Seasons fetched concurrently while assembling a series.
    pub season_concurrency: usize,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            cache: CachePolicy::default(),
            search_timeout_secs: 25,
            season_concurrency: 4,
        }
    }
}

impl CatalogConfig {
    pub fn search_timeout(&self) -> Duration {
        Duration::from_secs(self.search_timeout_secs)
    }
}
