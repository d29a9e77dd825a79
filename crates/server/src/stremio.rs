//! Stremio addon protocol payloads.

use serde::Serialize;
use zeustv_catalog::ResolvedStream;
use zeustv_core::types::{CatalogItem, Detail, EpisodeRef, MediaType, StreamTarget};

pub const CACHE_MAX_AGE: u64 = 60 * 60;
pub const STALE_REVALIDATE: u64 = 2 * 60 * 60;
pub const STALE_ERROR: u64 = 24 * 60 * 60;

/// Caching hints Stremio honours on non-empty responses.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheHints {
    pub cache_max_age: u64,
    pub stale_revalidate: u64,
    pub stale_error: u64,
}

impl Default for CacheHints {
    fn default() -> Self {
        Self {
            cache_max_age: CACHE_MAX_AGE,
            stale_revalidate: STALE_REVALIDATE,
            stale_error: STALE_ERROR,
        }
    }
}

/// A resource body plus, when it has content, the cache hints.
#[derive(Debug, Serialize)]
pub struct Cached<T> {
    #[serde(flatten)]
    pub body: T,
    #[serde(flatten)]
    pub hints: Option<CacheHints>,
}

impl<T> Cached<T> {
    pub fn new(body: T, has_content: bool) -> Self {
        Self {
            body,
            hints: has_content.then(CacheHints::default),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CatalogResponse {
    pub metas: Vec<MetaPreview>,
}

#[derive(Debug, Serialize)]
pub struct MetaResponse {
    pub meta: Option<MetaDetail>,
}

#[derive(Debug, Serialize)]
pub struct StreamResponse {
    pub streams: Vec<StreamObject>,
}

#[derive(Debug, Serialize)]
pub struct SubtitlesResponse {
    pub subtitles: Vec<SubtitleObject>,
}

#[derive(Debug, Serialize)]
pub struct MetaPreview {
    pub id: String,
    #[serde(rename = "type")]
    pub media_type: MediaType,
    pub name: String,
    pub poster: String,
    pub description: String,
    pub genres: Vec<String>,
}

impl From<CatalogItem> for MetaPreview {
    fn from(item: CatalogItem) -> Self {
        Self {
            id: item.id,
            media_type: item.media_type,
            name: item.title,
            poster: item.poster_url,
            description: item.description,
            genres: item.genres,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetaDetail {
    pub id: String,
    #[serde(rename = "type")]
    pub media_type: MediaType,
    pub name: String,
    pub poster: String,
    pub poster_shape: &'static str,
    pub background: String,
    pub country: String,
    pub description: String,
    pub genres: Vec<String>,
    pub release_info: String,
    pub imdb_rating: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runtime: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub season: Option<u32>,
    pub videos: Vec<Video>,
}

impl From<Detail> for MetaDetail {
    fn from(detail: Detail) -> Self {
        Self {
            id: detail.id,
            media_type: detail.media_type,
            name: detail.title,
            poster: detail.poster_url,
            poster_shape: "poster",
            background: detail.background_url,
            country: detail.country,
            description: detail.description,
            genres: detail.genres,
            release_info: detail.release_year,
            imdb_rating: detail.imdb_rating,
            runtime: detail.runtime_minutes,
            season: (detail.season_count > 0).then_some(detail.season_count),
            videos: detail.episodes.into_iter().map(Video::from).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Video {
    pub id: String,
    pub title: String,
    pub season: u32,
    pub episode: u32,
    pub released: String,
    pub overview: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
}

impl From<EpisodeRef> for Video {
    fn from(ep: EpisodeRef) -> Self {
        Self {
            id: ep.stream_id,
            title: ep.title,
            season: ep.season,
            episode: ep.episode,
            released: ep.released_at,
            overview: ep.overview,
            thumbnail: ep.thumbnail_url,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamObject {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub yt_id: Option<String>,
    pub title: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub subtitles: Vec<SubtitleObject>,
}

impl From<ResolvedStream> for StreamObject {
    fn from(resolved: ResolvedStream) -> Self {
        let (url, yt_id) = match resolved.stream.target {
            StreamTarget::Url(url) => (Some(url), None),
            StreamTarget::YouTube(id) => (None, Some(id)),
        };
        Self {
            url,
            yt_id,
            title: resolved.title,
            subtitles: resolved
                .stream
                .subtitle_refs
                .into_iter()
                .map(|s| SubtitleObject::new(s.url, s.lang))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SubtitleObject {
    pub id: String,
    pub url: String,
    pub lang: String,
}

impl SubtitleObject {
    pub fn new(url: String, lang: String) -> Self {
        Self {
            id: format!("zeustv-{lang}"),
            url,
            lang,
        }
    }
}
