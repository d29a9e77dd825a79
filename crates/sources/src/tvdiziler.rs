//! TvDiziler scraper. Series only; many episodes are YouTube uploads.

use std::collections::HashSet;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::Deserialize;
use tracing::debug;
use zeustv_core::types::{EpisodeRef, MediaType, StreamRef};

use crate::extract::{Extractor, master_m3u8, m3u8, mp4, playerjs_media_file, youtube_id};
use crate::html::{
    IMG_SRC_ATTRS, absolute_url, attr_of, is_placeholder_image, matches_query, path_of,
    slug_to_title, text_of,
};
use crate::http::{FetchRequest, HttpClient};
use crate::source::{SourceAdapter, SourceKind, finalize_episodes, recover};
use crate::{RawDetail, RawGenres, RawRecord, SourceError};

pub const PREFIX: &str = "tvdiziler-";

const SEARCH_TIMEOUT: Duration = Duration::from_secs(8);
const HOME_TIMEOUT: Duration = Duration::from_secs(5);
const PAGE_TIMEOUT: Duration = Duration::from_secs(8);
const EPISODE_TIMEOUT: Duration = Duration::from_secs(10);
const PLAYER_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TvDizilerConfig {
    pub base_url: String,
}

impl Default for TvDizilerConfig {
    fn default() -> Self {
        Self {
            base_url: "https://tvdiziler.cc".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    success: i64,
    #[serde(default)]
    data: Option<String>,
}

static SEL_SERIES_LINK: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"a[href*="dizi/"]"#).unwrap());
static SEL_H2: LazyLock<Selector> = LazyLock::new(|| Selector::parse("h2").unwrap());
static SEL_IMG: LazyLock<Selector> = LazyLock::new(|| Selector::parse("img").unwrap());
static SEL_H1: LazyLock<Selector> = LazyLock::new(|| Selector::parse("h1").unwrap());
static SEL_TITLE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("title").unwrap());
static SEL_P: LazyLock<Selector> = LazyLock::new(|| Selector::parse("p").unwrap());
static SEL_EPISODE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"a[href*="-bolum-izle"]"#).unwrap());
static SEL_IFRAME: LazyLock<Selector> = LazyLock::new(|| Selector::parse("iframe").unwrap());
static SEL_YOUTUBE_LINK: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"a[href*="youtube"]"#).unwrap());
static SEL_PLAYER_FRAME: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"iframe[src*="vid/ply/"], iframe[data-src*="vid/ply/"]"#).unwrap());

static RE_SERIES_SLUG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"dizi/([^/?#]+)").unwrap());
static RE_TITLE_NOISE: LazyLock<[Regex; 7]> = LazyLock::new(|| {
    [
        Regex::new("Yayınlandı").unwrap(),
        Regex::new(r"Sezon \d+").unwrap(),
        Regex::new(r"Bölüm \d+").unwrap(),
        Regex::new(r"\d{2}\s\w+\s\d{4}").unwrap(),
        Regex::new(r"(?i)\s+izle\b").unwrap(),
        Regex::new(r"(?i)\s+son\s+bolum\b").unwrap(),
        Regex::new(r"(?i)\s+full\b").unwrap(),
    ]
});
static RE_EPISODE_NOISE: LazyLock<[Regex; 4]> = LazyLock::new(|| {
    [
        Regex::new(r"(?i)Dizinin İlk Bölümünü İzle").unwrap(),
        Regex::new(r"(?i)Dizinin Son Bölümünü İzle").unwrap(),
        Regex::new(r"(?i)\s+izle\b").unwrap(),
        Regex::new(r"(?i)\s+full\b").unwrap(),
    ]
});
static RE_EPISODE_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-(\d+)-bolum-izle(?:-full)?").unwrap());
static RE_TRAILING_PARENS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*\([^)]*\)\s*$").unwrap());
static RE_SITE_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s*-\s*Tvdiziler\.cc.*$").unwrap());
static RE_PAREN_YEAR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\((\d{4})\)").unwrap());
static RE_YEAR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b(?:19|20)\d{2}\b").unwrap());
static RE_IMDB: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)IMDb[:\s]+(\d+\.?\d*)").unwrap());
static RE_PLAYER_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)["']([^"']*/vid/ply/[^"']*)["']"#).unwrap());

fn strip_noise(raw: &str, patterns: &[Regex]) -> String {
    let cleaned = patterns
        .iter()
        .fold(raw.to_string(), |acc, re| re.replace_all(&acc, " ").into_owned());
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Poster of a search link: its own image, else a raster upload beside it.
fn link_poster(link: ElementRef<'_>) -> Option<String> {
    let own = link
        .select(&SEL_IMG)
        .next()
        .and_then(|img| attr_of(img, &IMG_SRC_ATTRS[..3]))
        .filter(|src| src.len() >= 5);
    if own.is_some() {
        return own;
    }
    let parent = link.parent().and_then(ElementRef::wrap)?;
    parent
        .select(&SEL_IMG)
        .filter_map(|img| attr_of(img, &IMG_SRC_ATTRS[..3]))
        .find(|src| {
            (src.contains("uploads/series/")
                || src.contains(".jpg")
                || src.contains(".png")
                || src.contains(".webp"))
                && !is_placeholder_image(src)
        })
}

fn link_title(link: ElementRef<'_>, slug: &str) -> String {
    let raw = link
        .select(&SEL_H2)
        .map(text_of)
        .find(|t| !t.is_empty())
        .or_else(|| {
            link.select(&SEL_IMG)
                .next()
                .and_then(|img| attr_of(img, &["alt", "title"]))
        })
        .unwrap_or_else(|| slug_to_title(slug));
    strip_noise(&raw, &*RE_TITLE_NOISE)
}

/// Series links in a search snippet or the home page that match `query`.
/// Film links are ignored: their pages have no player this source understands.
fn parse_results(body: &str, query: &str) -> Vec<RawRecord> {
    let doc = Html::parse_document(body);
    let mut seen = HashSet::new();
    let mut records = Vec::new();
    for link in doc.select(&SEL_SERIES_LINK) {
        let Some(href) = link.value().attr("href") else {
            continue;
        };
        if href.contains("/tur/") {
            continue;
        }
        let Some(slug) = RE_SERIES_SLUG.captures(href).map(|c| c[1].to_string()) else {
            continue;
        };
        if !seen.insert(slug.clone()) {
            continue;
        }
        let title = link_title(link, &slug);
        if title.is_empty() || !matches_query(query, &title, &slug) {
            continue;
        }
        records.push(RawRecord {
            id: format!("{PREFIX}{slug}"),
            title,
            media_type: Some(MediaType::Series),
            locator: format!("/dizi/{slug}"),
            poster: link_poster(link),
            description: None,
            genres: RawGenres::Missing,
        });
    }
    records
}

fn parse_detail(body: &str, id: &str, slug: &str) -> RawDetail {
    let doc = Html::parse_document(body);
    let name = doc
        .select(&SEL_H1)
        .next()
        .map(|h1| RE_TRAILING_PARENS.replace(&text_of(h1), "").trim().to_string())
        .or_else(|| {
            doc.select(&SEL_TITLE)
                .next()
                .map(|t| RE_SITE_SUFFIX.replace(&text_of(t), "").trim().to_string())
        })
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| slug_to_title(slug));

    let mut detail = RawDetail::new(id, name.clone(), MediaType::Series);
    detail.poster = doc
        .select(&SEL_IMG)
        .filter_map(|img| attr_of(img, &IMG_SRC_ATTRS[..3]))
        .find(|src| {
            src.contains("uploads/series/") && !src.contains("thumb") && !src.contains("cover/cat")
        });
    detail.background = detail.poster.clone();
    detail.description = Some(
        doc.select(&SEL_P)
            .map(text_of)
            .find(|t| t.chars().count() > 50 && !t.contains("@admin"))
            .unwrap_or_else(|| format!("{name} izle - ücretsiz 1080p | TvDiziler.cc")),
    );
    detail.country = Some("TR".to_string());
    detail.release_year = doc
        .select(&SEL_H1)
        .next()
        .and_then(|h1| {
            RE_PAREN_YEAR
                .captures(&text_of(h1))
                .map(|c| c[1].to_string())
        })
        .or_else(|| RE_YEAR.find(body).map(|m| m.as_str().to_string()));
    detail.imdb_rating = RE_IMDB.captures(body).and_then(|c| c[1].parse().ok());
    // Episode links carry no season, so everything is listed as season 1.
    detail.season_count = 1;
    detail
}

fn parse_episodes(body: &str) -> Vec<EpisodeRef> {
    let doc = Html::parse_document(body);
    let episodes = doc
        .select(&SEL_EPISODE)
        .filter_map(|link| {
            let href = link.value().attr("href")?;
            let number: u32 = RE_EPISODE_NUMBER.captures(href)?[1].parse().ok()?;
            let title = Some(strip_noise(&text_of(link), &*RE_EPISODE_NOISE))
                .filter(|t| t.chars().count() >= 3)
                .unwrap_or_else(|| format!("Bölüm {number}"));
            let stream_id = format!("{PREFIX}{}", path_of(href).trim_start_matches('/'));
            let mut episode = EpisodeRef::new(stream_id, title, 1, number);
            episode.thumbnail_url = link
                .select(&SEL_IMG)
                .next()
                .and_then(|img| attr_of(img, &IMG_SRC_ATTRS[..2]));
            Some(episode)
        })
        .collect();
    finalize_episodes(episodes)
}

/// YouTube id from the page body, from (possibly URL-encoded) iframe sources,
/// or from YouTube links.
fn page_youtube_id(body: &str) -> Option<String> {
    if let Some(id) = youtube_id(body) {
        return Some(id);
    }
    let doc = Html::parse_document(body);
    doc.select(&SEL_IFRAME)
        .filter_map(|frame| attr_of(frame, &["src"]))
        .find_map(|src| {
            let decoded = urlencoding::decode(&src)
                .map(|d| d.into_owned())
                .unwrap_or_else(|_| src.clone());
            youtube_id(&decoded)
        })
        .or_else(|| {
            doc.select(&SEL_YOUTUBE_LINK)
                .filter_map(|a| attr_of(a, &["href"]))
                .find_map(|href| youtube_id(&href))
        })
}

fn player_path(body: &str) -> Option<String> {
    let doc = Html::parse_document(body);
    doc.select(&SEL_PLAYER_FRAME)
        .find_map(|frame| attr_of(frame, &["src", "data-src"]))
        .or_else(|| {
            RE_PLAYER_PATH
                .captures(body)
                .map(|c| c[1].to_string())
        })
}

fn player_extractor() -> Extractor<String> {
    Extractor::new()
        .then("playerjs-file", playerjs_media_file)
        .then("master-m3u8", master_m3u8)
        .then("m3u8", m3u8)
        .then("mp4", mp4)
}

pub struct TvDizilerSource {
    http: HttpClient,
    config: TvDizilerConfig,
}

impl TvDizilerSource {
    pub fn new(http: HttpClient, config: TvDizilerConfig) -> Self {
        Self { http, config }
    }

    fn base(&self) -> &str {
        self.config.base_url.trim_end_matches('/')
    }

    async fn search_endpoint(&self, query: &str) -> Result<Vec<RawRecord>, SourceError> {
        let url = format!("{}/search?qr={}", self.base(), urlencoding::encode(query));
        let req = FetchRequest::post_form(url, Vec::<(String, String)>::new())
            .header("Accept", "application/json, text/javascript, */*; q=0.01")
            .header("X-Requested-With", "XMLHttpRequest")
            .header("Referer", format!("{}/home", self.base()))
            .timeout(SEARCH_TIMEOUT);
        let resp: SearchResponse = self.http.json(req).await?;
        match resp.data {
            Some(html) if resp.success == 1 => Ok(parse_results(&html, query)),
            _ => Ok(Vec::new()),
        }
    }

    async fn try_search(&self, query: &str) -> Result<Vec<RawRecord>, SourceError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        match self.search_endpoint(query).await {
            Ok(records) if !records.is_empty() => return Ok(records),
            Ok(_) => {}
            Err(err) => debug!(error = %err, "tvdiziler search endpoint failed, scanning home page"),
        }
        let home = self
            .http
            .text(
                FetchRequest::get(format!("{}/home", self.base()))
                    .timeout(HOME_TIMEOUT)
                    .cached(),
            )
            .await?;
        Ok(parse_results(&home, query))
    }

    async fn series_page(&self, slug: &str) -> Result<String, SourceError> {
        self.http
            .text(
                FetchRequest::get(format!("{}/dizi/{slug}", self.base()))
                    .timeout(PAGE_TIMEOUT)
                    .cached(),
            )
            .await
    }

    async fn try_stream(&self, stream_id: &str) -> Result<Option<StreamRef>, SourceError> {
        let Some(path) = stream_id.strip_prefix(PREFIX) else {
            return Ok(None);
        };
        let page_url = format!("{}/{}", self.base(), path.trim_start_matches('/'));
        let page = self
            .http
            .text(
                FetchRequest::get(page_url.clone())
                    .header("Referer", self.base().to_string())
                    .timeout(EPISODE_TIMEOUT),
            )
            .await?;

        if let Some(id) = page_youtube_id(&page) {
            return Ok(Some(StreamRef::youtube(id)));
        }

        let extractor = player_extractor();
        if let Some(frame) = player_path(&page) {
            let player_url = absolute_url(&format!("{}/", self.base()), &frame);
            match self
                .http
                .text(
                    FetchRequest::get(player_url)
                        .header("Referer", page_url)
                        .timeout(PLAYER_TIMEOUT),
                )
                .await
            {
                Ok(player) => {
                    if let Some(url) = extractor.run(&player) {
                        return Ok(Some(StreamRef::url(url)));
                    }
                }
                Err(err) => debug!(error = %err, "tvdiziler player page failed"),
            }
        }

        Ok(extractor.run(&page).map(StreamRef::url))
    }
}

#[async_trait::async_trait]
impl SourceAdapter for TvDizilerSource {
    fn name(&self) -> &str {
        "TvDiziler"
    }

    fn prefix(&self) -> &str {
        PREFIX
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Site
    }

    fn media_types(&self) -> &[MediaType] {
        &[MediaType::Series]
    }

    fn base_url(&self) -> String {
        self.base().to_string()
    }

    async fn search(&self, query: &str) -> Vec<RawRecord> {
        recover(self.name(), "search", self.try_search(query).await)
    }

    async fn get_detail(&self, id: &str, media_type: MediaType) -> Option<RawDetail> {
        if media_type != MediaType::Series {
            return None;
        }
        let slug = id.strip_prefix(PREFIX)?;
        let page = recover(
            self.name(),
            "detail",
            self.series_page(slug).await.map(Some),
        )?;
        Some(parse_detail(&page, id, slug))
    }

    async fn get_episodes(&self, id: &str, season: u32) -> Vec<EpisodeRef> {
        let Some(slug) = id.strip_prefix(PREFIX) else {
            return Vec::new();
        };
        if season != 1 {
            return Vec::new();
        }
        let page = recover(
            self.name(),
            "episodes",
            self.series_page(slug).await.map(Some),
        );
        page.map(|body| parse_episodes(&body)).unwrap_or_default()
    }

    async fn resolve_stream(&self, stream_id: &str) -> Option<StreamRef> {
        recover(self.name(), "stream", self.try_stream(stream_id).await)
    }
}
