//! RecTV mobile API client.
//!
//! The API exposes search and per-series season listings; there is no detail
//! endpoint, so details are answered from remembered search hits.

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use serde::Deserialize;
use tracing::debug;
use zeustv_core::cache::TtlCache;
use zeustv_core::ids::{compose_stream_id, decompose_stream_id};
use zeustv_core::types::{EpisodeRef, MediaType, StreamRef};

use crate::http::{FetchRequest, HttpClient};
use crate::source::{SourceAdapter, SourceKind, finalize_episodes, recover};
use crate::{RawDetail, RawGenres, RawRecord, SourceError};

pub const PREFIX: &str = "rectv-";
const USER_AGENT: &str = "okhttp/4.9.0";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RecTvConfig {
    pub base_url: String,
    pub device_id: String,
    pub session_id: String,
    pub search_timeout_secs: u64,
    pub season_timeout_secs: u64,
    /// How long search hits and season listings are remembered.
    pub memory_secs: u64,
}

impl Default for RecTvConfig {
    fn default() -> Self {
        Self {
            base_url: "https://m.prectv60.lol/api".to_string(),
            device_id: "4F5A9C3D9A86FA54EACEDDD635185".to_string(),
            session_id: "c3c5bd17-e37b-4b94-a944-8a3688a30452".to_string(),
            search_timeout_secs: 5,
            season_timeout_secs: 8,
            memory_secs: 60 * 60,
        }
    }
}

/// Numbers the API sends either as JSON numbers or as strings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
enum Scalar {
    Int(i64),
    Float(f64),
    Text(String),
}

impl Scalar {
    fn as_text(&self) -> String {
        match self {
            Self::Int(v) => v.to_string(),
            Self::Float(v) => v.to_string(),
            Self::Text(v) => v.trim().to_string(),
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            Self::Text(v) => v.trim().replace(',', ".").parse().ok(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    posters: Vec<Poster>,
}

#[derive(Debug, Clone, Deserialize)]
struct Poster {
    id: Scalar,
    #[serde(default)]
    title: Option<String>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    image: Option<String>,
    #[serde(default)]
    cover: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    year: Option<Scalar>,
    #[serde(default)]
    imdb: Option<Scalar>,
    #[serde(default)]
    rating: Option<Scalar>,
    #[serde(default)]
    duration: Option<Scalar>,
    #[serde(default)]
    genres: RawGenres,
    #[serde(default)]
    sources: Vec<MediaSource>,
}

impl Poster {
    fn media_type(&self) -> MediaType {
        match self.kind.as_deref() {
            Some("serie") | Some("series") => MediaType::Series,
            _ => MediaType::Movie,
        }
    }

    fn item_id(&self) -> String {
        format!("{PREFIX}{}", self.id.as_text())
    }
}

#[derive(Debug, Clone, Deserialize)]
struct Season {
    #[serde(default)]
    episodes: Vec<Episode>,
}

#[derive(Debug, Clone, Deserialize)]
struct Episode {
    id: Scalar,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    sources: Vec<MediaSource>,
}

#[derive(Debug, Clone, Deserialize)]
struct MediaSource {
    url: String,
}

static RE_HOURS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+)\s*h").unwrap());
static RE_MINUTES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+)\s*m").unwrap());

/// `"1h 49min"`, `"109"` or `109` → 109.
fn runtime_minutes(duration: &Scalar) -> Option<u32> {
    if let Some(n) = duration.as_f64() {
        return (n > 0.0).then_some(n as u32);
    }
    let text = duration.as_text().to_lowercase();
    let hours: u32 = RE_HOURS
        .captures(&text)
        .and_then(|c| c[1].parse().ok())
        .unwrap_or(0);
    let minutes: u32 = RE_MINUTES
        .captures(&text)
        .and_then(|c| c[1].parse().ok())
        .unwrap_or(0);
    let total = hours.saturating_mul(60).saturating_add(minutes);
    (total > 0).then_some(total)
}

fn record_from_poster(poster: &Poster) -> RawRecord {
    RawRecord {
        id: poster.item_id(),
        title: poster.title.clone().unwrap_or_default(),
        media_type: Some(poster.media_type()),
        locator: String::new(),
        poster: poster.image.clone(),
        description: poster.description.clone(),
        genres: poster.genres.clone(),
    }
}

fn detail_from_poster(poster: &Poster) -> RawDetail {
    let media_type = poster.media_type();
    let mut detail = RawDetail::new(
        poster.item_id(),
        poster.title.clone().unwrap_or_default(),
        media_type,
    );
    detail.poster = poster.image.clone();
    detail.background = poster.cover.clone().filter(|c| !c.is_empty());
    detail.description = poster.description.clone();
    detail.genres = poster.genres.clone();
    detail.release_year = poster.year.as_ref().map(Scalar::as_text);
    detail.imdb_rating = poster
        .imdb
        .as_ref()
        .or(poster.rating.as_ref())
        .and_then(Scalar::as_f64);
    if media_type == MediaType::Movie {
        detail.runtime_minutes = poster.duration.as_ref().and_then(runtime_minutes);
    }
    detail
}

fn episodes_of_season(series_id: &str, seasons: &[Season], season: u32) -> Vec<EpisodeRef> {
    let Some(listing) = season
        .checked_sub(1)
        .and_then(|i| seasons.get(i as usize))
    else {
        return Vec::new();
    };
    let episodes = listing
        .episodes
        .iter()
        .enumerate()
        .map(|(i, ep)| {
            let number = i as u32 + 1;
            let title = ep
                .title
                .clone()
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| format!("{number}. Bölüm"));
            EpisodeRef::new(
                compose_stream_id(series_id, &ep.id.as_text()),
                title,
                season,
                number,
            )
        })
        .collect();
    finalize_episodes(episodes)
}

fn find_episode_source(seasons: &[Season], episode_id: &str) -> Option<String> {
    seasons
        .iter()
        .flat_map(|s| s.episodes.iter())
        .find(|ep| ep.id.as_text() == episode_id)
        .and_then(|ep| ep.sources.first())
        .map(|s| s.url.clone())
}

pub struct RecTvSource {
    http: HttpClient,
    config: RecTvConfig,
    posters: TtlCache<Poster>,
    seasons: TtlCache<Vec<Season>>,
}

impl RecTvSource {
    pub fn new(http: HttpClient, config: RecTvConfig) -> Self {
        Self {
            http,
            config,
            posters: TtlCache::new(),
            seasons: TtlCache::new(),
        }
    }

    fn memory_ttl(&self) -> Duration {
        Duration::from_secs(self.config.memory_secs)
    }

    fn request(&self, path: &str, timeout_secs: u64) -> FetchRequest {
        let url = format!(
            "{}/{path}/{}/{}/",
            self.config.base_url, self.config.device_id, self.config.session_id
        );
        FetchRequest::get(url)
            .header("User-Agent", USER_AGENT)
            .header("Accept", "application/json")
            .timeout(Duration::from_secs(timeout_secs))
    }

    async fn try_search(&self, query: &str) -> Result<Vec<RawRecord>, SourceError> {
        let path = format!("search/{}", urlencoding::encode(query));
        let data: SearchResponse = self
            .http
            .json(self.request(&path, self.config.search_timeout_secs))
            .await?;

        let ttl = self.memory_ttl();
        Ok(data
            .posters
            .iter()
            .map(|poster| {
                self.posters.set(poster.item_id(), poster.clone(), ttl);
                record_from_poster(poster)
            })
            .collect())
    }

    async fn seasons_of(&self, series_id: &str) -> Result<Vec<Season>, SourceError> {
        if let Some(cached) = self.seasons.get(series_id) {
            return Ok(cached);
        }
        let numeric = series_id.strip_prefix(PREFIX).unwrap_or(series_id);
        let path = format!("season/by/serie/{numeric}");
        let seasons: Vec<Season> = self
            .http
            .json(self.request(&path, self.config.season_timeout_secs))
            .await?;
        self.seasons
            .set(series_id, seasons.clone(), self.memory_ttl());
        Ok(seasons)
    }

    pub fn purge_expired(&self) -> usize {
        self.posters.purge_expired() + self.seasons.purge_expired()
    }
}

#[async_trait::async_trait]
impl SourceAdapter for RecTvSource {
    fn name(&self) -> &str {
        "RecTV"
    }

    fn prefix(&self) -> &str {
        PREFIX
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Api
    }

    fn media_types(&self) -> &[MediaType] {
        &[MediaType::Movie, MediaType::Series]
    }

    fn base_url(&self) -> String {
        self.config.base_url.clone()
    }

    async fn search(&self, query: &str) -> Vec<RawRecord> {
        recover(self.name(), "search", self.try_search(query).await)
    }

    async fn get_detail(&self, id: &str, media_type: MediaType) -> Option<RawDetail> {
        let mut detail = match self.posters.get(id) {
            Some(poster) => detail_from_poster(&poster),
            None => {
                let numeric = id.strip_prefix(PREFIX)?;
                debug!(id = %id, "no remembered search hit, using placeholder detail");
                let title = match media_type {
                    MediaType::Series => format!("RecTV Serie {numeric}"),
                    _ => format!("RecTV Film {numeric}"),
                };
                RawDetail::new(id, title, media_type)
            }
        };

        if detail.media_type != media_type {
            return None;
        }
        if media_type == MediaType::Series {
            let seasons = recover(self.name(), "seasons", self.seasons_of(id).await);
            if seasons.is_empty() {
                return None;
            }
            detail.season_count = seasons.len() as u32;
        }
        Some(detail)
    }

    async fn get_episodes(&self, id: &str, season: u32) -> Vec<EpisodeRef> {
        let seasons = recover(self.name(), "seasons", self.seasons_of(id).await);
        episodes_of_season(id, &seasons, season)
    }

    async fn resolve_stream(&self, stream_id: &str) -> Option<StreamRef> {
        match decompose_stream_id(stream_id) {
            Some((series_id, episode_id)) => {
                let seasons = recover(self.name(), "seasons", self.seasons_of(series_id).await);
                find_episode_source(&seasons, episode_id).map(StreamRef::url)
            }
            None => self
                .posters
                .get(stream_id)
                .and_then(|poster| poster.sources.first().map(|s| s.url.clone()))
                .map(StreamRef::url),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_search() -> SearchResponse {
        serde_json::from_value(json!({
            "posters": [
                {
                    "id": 4669,
                    "title": "Gibi",
                    "type": "serie",
                    "image": "https://img.example.com/gibi.jpg",
                    "cover": "https://img.example.com/gibi-cover.jpg",
                    "description": "Yılmaz ve İlkkan",
                    "year": 2021,
                    "imdb": "8.6",
                    "genres": [{"id": 1, "title": "Komedi"}],
                    "sources": []
                },
                {
                    "id": "77",
                    "title": "Film",
                    "type": "movie",
                    "image": null,
                    "duration": "1h 49min",
                    "genres": null,
                    "sources": [{"id": 1, "url": "https://cdn.example.com/film.m3u8", "type": "m3u8"}]
                }
            ]
        }))
        .unwrap()
    }

    #[test]
    fn search_posters_become_records() {
        let data = sample_search();
        let series = record_from_poster(&data.posters[0]);
        assert_eq!(series.id, "rectv-4669");
        assert_eq!(series.media_type, Some(MediaType::Series));
        assert_eq!(series.poster.as_deref(), Some("https://img.example.com/gibi.jpg"));

        let movie = record_from_poster(&data.posters[1]);
        assert_eq!(movie.id, "rectv-77");
        assert_eq!(movie.media_type, Some(MediaType::Movie));
        assert_eq!(movie.genres, RawGenres::Missing);
    }

    #[test]
    fn detail_takes_rating_year_and_runtime() {
        let data = sample_search();
        let series = detail_from_poster(&data.posters[0]);
        assert_eq!(series.imdb_rating, Some(8.6));
        assert_eq!(series.release_year.as_deref(), Some("2021"));
        assert_eq!(series.runtime_minutes, None);

        let movie = detail_from_poster(&data.posters[1]);
        assert_eq!(movie.runtime_minutes, Some(109));
    }

    #[test]
    fn episodes_are_numbered_by_position_with_composite_ids() {
        let seasons: Vec<Season> = serde_json::from_value(json!([
            {"title": "1. Sezon", "episodes": [
                {"id": 35256, "title": "1. Bölüm", "sources": [{"url": "https://cdn.example.com/1.m3u8"}]},
                {"id": 35257, "title": "", "sources": [{"url": "https://cdn.example.com/2.m3u8"}]}
            ]},
            {"title": "2. Sezon", "episodes": [
                {"id": 40001, "title": "1. Bölüm", "sources": []}
            ]}
        ]))
        .unwrap();

        let first = episodes_of_season("rectv-4669", &seasons, 1);
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].stream_id, "rectv-4669:35256");
        assert_eq!(first[1].episode, 2);
        assert_eq!(first[1].title, "2. Bölüm");
        assert!(episodes_of_season("rectv-4669", &seasons, 0).is_empty());
        assert!(episodes_of_season("rectv-4669", &seasons, 3).is_empty());

        assert_eq!(
            find_episode_source(&seasons, "35257").as_deref(),
            Some("https://cdn.example.com/2.m3u8")
        );
        assert_eq!(find_episode_source(&seasons, "40001"), None);
    }

    #[test]
    fn runtime_parsing() {
        assert_eq!(runtime_minutes(&Scalar::Int(95)), Some(95));
        assert_eq!(runtime_minutes(&Scalar::Text("2h 5min".into())), Some(125));
        assert_eq!(runtime_minutes(&Scalar::Text("bilinmiyor".into())), None);
        assert_eq!(
            runtime_minutes(&Scalar::Text("99999999h 30min".into())),
            Some(u32::MAX)
        );
    }
}
