//! Dizipal site scraper, the default source.
//!
//! Ids carry no prefix: a catalog item is the bare slug (`gibi-d24`), an
//! episode is its site path without the leading slash
//! (`dizi/gibi-d24/sezon-1/bolum-5`). The site hops between numbered domains,
//! so the base URL is probed and remembered unless one is configured.

use std::collections::HashSet;
use std::sync::LazyLock;
use std::time::Duration;

use futures::StreamExt;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::Deserialize;
use tracing::{debug, info};
use zeustv_core::cache::TtlCache;
use zeustv_core::types::{EpisodeRef, MediaType, StreamRef};

use crate::extract::{media_url_extractor, playerjs_file, playerjs_subtitles, streaming_url};
use crate::html::{
    IMG_SRC_ATTRS, absolute_url, attr_of, card_of, card_poster, is_placeholder_image,
    matches_query, normalize_for_match, origin_of, page_text, path_of, slug_to_title, text_of,
};
use crate::http::{FetchRequest, HttpClient};
use crate::source::{SourceAdapter, SourceKind, finalize_episodes, recover};
use crate::{RawDetail, RawGenres, RawRecord, SourceError};

const SEARCH_TIMEOUT: Duration = Duration::from_secs(5);
const LISTING_TIMEOUT: Duration = Duration::from_secs(5);
const PAGE_TIMEOUT: Duration = Duration::from_secs(8);
const STREAM_PAGE_TIMEOUT: Duration = Duration::from_secs(12);
const PLAYER_TIMEOUT: Duration = Duration::from_secs(15);
const PLAYER_API_TIMEOUT: Duration = Duration::from_secs(10);
const POSTER_BACKFILL_CONCURRENCY: usize = 4;
const DOMAIN_KEY: &str = "active";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DizipalConfig {
    /// Fixed base URL. Skips domain probing when set.
    pub base_url: Option<String>,
    /// Domain name stem; candidates are `<stem><n>.com`.
    pub domain_stem: String,
    pub first_domain: u32,
    pub probe_attempts: u32,
    pub probe_timeout_secs: u64,
    pub domain_ttl_secs: u64,
    /// Pages per listing (`/diziler`, `/filmler`) scanned when search finds nothing.
    pub listing_pages: u32,
}

impl Default for DizipalConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            domain_stem: "dizipall".to_string(),
            first_domain: 27,
            probe_attempts: 10,
            probe_timeout_secs: 3,
            domain_ttl_secs: 6 * 60 * 60,
            listing_pages: 3,
        }
    }
}

/// Finds the currently live numbered domain.
struct DomainResolver {
    http: HttpClient,
    config: DizipalConfig,
    active: TtlCache<String>,
}

impl DomainResolver {
    fn fallback(&self) -> String {
        format!(
            "https://{}{}.com",
            self.config.domain_stem, self.config.first_domain
        )
    }

    /// Base URL without probing: configured, remembered, or the first candidate.
    fn current(&self) -> String {
        self.config
            .base_url
            .clone()
            .or_else(|| self.active.get(DOMAIN_KEY))
            .unwrap_or_else(|| self.fallback())
    }

    async fn resolve(&self) -> String {
        if let Some(base) = &self.config.base_url {
            return base.trim_end_matches('/').to_string();
        }
        if let Some(base) = self.active.get(DOMAIN_KEY) {
            return base;
        }

        let timeout = Duration::from_secs(self.config.probe_timeout_secs);
        let first = self.config.first_domain;
        for n in first..first + self.config.probe_attempts {
            let candidate = format!("https://{}{n}.com/", self.config.domain_stem);
            match self.http.probe(&candidate, timeout).await {
                Ok(final_url) => {
                    let base = origin_of(&final_url)
                        .unwrap_or_else(|| candidate.trim_end_matches('/').to_string());
                    info!(base = %base, "dizipal domain detected");
                    self.active.set(
                        DOMAIN_KEY,
                        base.clone(),
                        Duration::from_secs(self.config.domain_ttl_secs),
                    );
                    return base;
                }
                Err(err) => debug!(candidate = %candidate, error = %err, "dizipal domain probe failed"),
            }
        }
        self.fallback()
    }
}

/// One search hit parsed from a result card or the JSON search API.
#[derive(Debug, Clone, PartialEq)]
struct Card {
    media_type: MediaType,
    slug: String,
    title: String,
    poster: Option<String>,
}

impl Card {
    fn path(&self) -> String {
        format!("/{}/{}", section_of(self.media_type), self.slug)
    }

    fn needs_poster(&self) -> bool {
        self.poster.as_deref().is_none_or(is_placeholder_image)
    }

    fn into_record(self) -> RawRecord {
        RawRecord {
            locator: self.path(),
            id: self.slug,
            title: self.title,
            media_type: Some(self.media_type),
            poster: self.poster,
            description: None,
            genres: RawGenres::Missing,
        }
    }
}

fn section_of(media_type: MediaType) -> &'static str {
    match media_type {
        MediaType::Movie => "film",
        _ => "dizi",
    }
}

static SEL_RESULT_LINK: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"a[href*="/dizi/"], a[href*="/film/"]"#).unwrap());
static SEL_HEADING: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("h2, h3, h4, h5").unwrap());
static SEL_IMG: LazyLock<Selector> = LazyLock::new(|| Selector::parse("img").unwrap());
static SEL_P: LazyLock<Selector> = LazyLock::new(|| Selector::parse("p").unwrap());
static SEL_H1_LINK: LazyLock<Selector> = LazyLock::new(|| Selector::parse("h1 a").unwrap());
static SEL_H1: LazyLock<Selector> = LazyLock::new(|| Selector::parse("h1").unwrap());
static SEL_TITLE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("title").unwrap());
static SEL_GENRE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"a[href*="/tur/"]"#).unwrap());
static SEL_PROFILE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".series-profile-info").unwrap());
static SEL_EPISODE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"a[href*="/bolum-"]"#).unwrap());
static SEL_PLAYER_FRAMES: LazyLock<[Selector; 4]> = LazyLock::new(|| {
    [
        Selector::parse("#vast_new > iframe").unwrap(),
        Selector::parse(r#"iframe[src*="dizipal"]"#).unwrap(),
        Selector::parse(r#"iframe[src*="embed"]"#).unwrap(),
        Selector::parse("iframe[src]").unwrap(),
    ]
});
static SEL_LAZY_FRAME: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("iframe[data-src]").unwrap());

static RE_SLUG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/(dizi|film)/([^/?#]+)").unwrap());
static RE_YEAR_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}\s*-\s*").unwrap());
static RE_TITLE_NOISE: LazyLock<[Regex; 5]> = LazyLock::new(|| {
    [
        Regex::new("Yayınlandı").unwrap(),
        Regex::new(r"Sezon \d+").unwrap(),
        Regex::new(r"\s+\d+\.\d+\s+\d{4}").unwrap(),
        Regex::new(r"\s+\d{4}").unwrap(),
        Regex::new(r"\s+\d+\.\d+").unwrap(),
    ]
});
static RE_IMDB: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"IMDb[^0-9]{0,20}(\d+(?:[.,]\d+)?)").unwrap());
static RE_YEAR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b(?:19|20)\d{2}\b").unwrap());
static RE_SEASON_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"/dizi/([^/"'?#\s]+)/sezon-(\d+)"#).unwrap());

/// Upper bound on seasons read from a page; each one becomes an upstream fetch.
const MAX_SEASONS: u32 = 50;
static RE_RUNTIME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Süre[:\s]+(\d+)\s*dk").unwrap());
static RE_RUNTIME_LOOSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d+)\s*dk\b").unwrap());
static RE_EPISODE_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/sezon-(\d+)/bolum-(\d+)").unwrap());
static RE_GENERIC_EPISODE_TITLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+\.\s*Sezon\s*\d+\.\s*Bölüm$").unwrap());
static RE_FILECODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"dizipal[^/]*/([a-f0-9]{10,20})").unwrap());
static RE_SLUG_SUFFIX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"-d\d+$").unwrap());

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn clean_card_title(raw: &str) -> String {
    let cleaned = RE_TITLE_NOISE.iter().fold(
        RE_YEAR_PREFIX.replace(raw.trim(), "").into_owned(),
        |acc, re| re.replace_all(&acc, "").into_owned(),
    );
    collapse_whitespace(&cleaned)
}

/// Search terms tried in order until one yields results.
fn query_variations(query: &str) -> Vec<String> {
    let lower = query.to_lowercase();
    let mut variations = vec![query.to_string(), lower.clone(), normalize_for_match(query)];
    let words: Vec<&str> = lower
        .split_whitespace()
        .filter(|w| w.chars().count() > 2)
        .collect();
    if words.len() > 1 {
        variations.push(words[words.len() - 1].to_string());
        variations.push(words[0].to_string());
        variations.push(words.join(" "));
    }
    let mut seen = HashSet::new();
    variations.retain(|v| !v.trim().is_empty() && seen.insert(v.clone()));
    variations
}

fn card_title(card: ElementRef<'_>, link: ElementRef<'_>, slug: &str) -> String {
    let from_heading = card
        .select(&SEL_HEADING)
        .map(text_of)
        .find(|t| !t.is_empty());
    let from_img = || {
        card.select(&SEL_IMG)
            .find_map(|img| attr_of(img, &["alt", "title"]))
    };
    let from_link = || attr_of(link, &["title"]).or_else(|| Some(text_of(link)).filter(|t| !t.is_empty()));
    let from_paragraph = || {
        card.select(&SEL_P)
            .map(text_of)
            .find(|t| !t.is_empty())
    };
    let raw = from_heading
        .or_else(from_img)
        .or_else(from_link)
        .or_else(from_paragraph)
        .unwrap_or_else(|| slug_to_title(slug));
    clean_card_title(&raw)
}

/// Result cards in a search snippet or listing page that match `query`.
fn parse_cards(body: &str, query: &str) -> Vec<Card> {
    let doc = Html::parse_document(body);
    let mut seen = HashSet::new();
    let mut cards = Vec::new();
    for link in doc.select(&SEL_RESULT_LINK) {
        let Some(href) = link.value().attr("href") else {
            continue;
        };
        if href.contains("/sezon-") || href.contains("/bolum-") || href.contains("/tur/") {
            continue;
        }
        let Some(caps) = RE_SLUG.captures(href) else {
            continue;
        };
        let media_type = if &caps[1] == "film" {
            MediaType::Movie
        } else {
            MediaType::Series
        };
        let slug = caps[2].to_string();
        if !seen.insert((media_type, slug.clone())) {
            continue;
        }

        let card = card_of(link);
        let title = card_title(card, link, &slug);
        if title.chars().count() < 2 || !matches_query(query, &title, &slug) {
            continue;
        }
        cards.push(Card {
            media_type,
            poster: card_poster(card),
            slug,
            title,
        });
    }
    cards
}

/// `{results|data: [{url, title, poster}]}` answers from the search endpoint.
fn parse_json_cards(body: &str, query: &str) -> Vec<Card> {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(body) else {
        return Vec::new();
    };
    let items = value
        .get("results")
        .or_else(|| value.get("data"))
        .unwrap_or(&value);
    let Some(items) = items.as_array() else {
        return Vec::new();
    };

    let field = |item: &serde_json::Value, names: &[&str]| {
        names
            .iter()
            .find_map(|n| item.get(*n).and_then(|v| v.as_str()))
            .map(str::to_string)
    };
    let mut seen = HashSet::new();
    items
        .iter()
        .filter_map(|item| {
            let href = field(item, &["url", "link", "href"])?;
            let caps = RE_SLUG.captures(&href)?;
            let media_type = if &caps[1] == "film" {
                MediaType::Movie
            } else {
                MediaType::Series
            };
            let slug = caps[2].to_string();
            let title = field(item, &["title", "name"])
                .map(|t| clean_card_title(&t))
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| slug_to_title(&slug));
            if !matches_query(query, &title, &slug) || !seen.insert((media_type, slug.clone())) {
                return None;
            }
            Some(Card {
                media_type,
                poster: field(item, &["poster", "image", "thumbnail"]),
                slug,
                title,
            })
        })
        .collect()
}

fn detail_poster(doc: &Html, name: &str) -> Option<String> {
    let uploads = doc
        .select(&SEL_IMG)
        .filter_map(|img| attr_of(img, &IMG_SRC_ATTRS[..3]))
        .find(|src| {
            (src.contains("/uploads/series/")
                || src.contains("/uploads/movies/")
                || src.contains("/uploads/video/"))
                && !is_placeholder_image(src)
        });
    if uploads.is_some() {
        return uploads;
    }
    let needle: String = name.chars().take(10).collect();
    if needle.is_empty() {
        return None;
    }
    doc.select(&SEL_IMG)
        .filter(|img| img.value().attr("alt").is_some_and(|alt| alt.contains(&needle)))
        .filter_map(|img| attr_of(img, &IMG_SRC_ATTRS[..2]))
        .find(|src| !is_placeholder_image(src))
}

fn parse_detail(body: &str, id: &str, media_type: MediaType) -> RawDetail {
    let doc = Html::parse_document(body);

    let name = doc
        .select(&SEL_H1_LINK)
        .chain(doc.select(&SEL_H1))
        .map(text_of)
        .find(|t| !t.is_empty())
        .or_else(|| {
            doc.select(&SEL_TITLE).next().map(|t| {
                let full = text_of(t);
                let head = full.split('|').next().unwrap_or_default();
                head.split("izle").next().unwrap_or_default().trim().to_string()
            })
        })
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| slug_to_title(id));

    let text = page_text(&doc);
    let mut detail = RawDetail::new(id, name.clone(), media_type);
    detail.poster = detail_poster(&doc, &name);
    detail.imdb_rating = RE_IMDB
        .captures(&text)
        .and_then(|c| c[1].replace(',', ".").parse().ok());
    detail.description = doc
        .select(&SEL_P)
        .map(text_of)
        .find(|t| t.chars().count() > 50);
    detail.country = Some(if text.contains("Yerli") || text.contains("Türk") {
        "TR".to_string()
    } else {
        "US".to_string()
    });
    detail.release_year = doc
        .select(&SEL_PROFILE)
        .map(text_of)
        .chain(std::iter::once(text.clone()))
        .find_map(|t| RE_YEAR.find(&t).map(|m| m.as_str().to_string()));

    let genres: Vec<String> = doc
        .select(&SEL_GENRE)
        .map(text_of)
        .filter(|g| !g.is_empty())
        .fold(Vec::new(), |mut acc, g| {
            if !acc.contains(&g) {
                acc.push(g);
            }
            acc
        });
    if !genres.is_empty() {
        detail.genres = RawGenres::names(genres);
    }

    match media_type {
        MediaType::Movie => {
            detail.season_count = 0;
            detail.runtime_minutes = RE_RUNTIME
                .captures(&text)
                .or_else(|| RE_RUNTIME_LOOSE.captures(&text))
                .and_then(|c| c[1].parse().ok());
        }
        _ => {
            detail.season_count = season_count(body, id);
        }
    }
    detail
}

/// Highest season linked under this series' own `/dizi/<slug>/sezon-N` path.
fn season_count(body: &str, id: &str) -> u32 {
    let slug = id.trim_matches('/');
    let slug = slug.strip_prefix("dizi/").unwrap_or(slug);
    RE_SEASON_LINK
        .captures_iter(body)
        .filter(|c| &c[1] == slug)
        .filter_map(|c| c[2].parse::<u32>().ok())
        .max()
        .unwrap_or(1)
        .clamp(1, MAX_SEASONS)
}

fn parse_episodes(body: &str, season: u32) -> Vec<EpisodeRef> {
    let doc = Html::parse_document(body);
    let episodes = doc
        .select(&SEL_EPISODE)
        .filter_map(|link| {
            let href = link.value().attr("href")?;
            let caps = RE_EPISODE_PATH.captures(href)?;
            let link_season: u32 = caps[1].parse().ok()?;
            let number: u32 = caps[2].parse().ok()?;
            if link_season != season {
                return None;
            }
            let title = attr_of(link, &["title"])
                .map(|t| collapse_whitespace(&t))
                .or_else(|| Some(text_of(link)))
                .filter(|t| !t.is_empty() && !RE_GENERIC_EPISODE_TITLE.is_match(t))
                .unwrap_or_else(|| format!("Bölüm {number}"));
            let stream_id = path_of(href).trim_start_matches('/').to_string();
            let mut episode = EpisodeRef::new(stream_id, title, season, number);
            episode.thumbnail_url = link
                .select(&SEL_IMG)
                .next()
                .and_then(|img| attr_of(img, &IMG_SRC_ATTRS[..2]));
            Some(episode)
        })
        .collect();
    finalize_episodes(episodes)
}

fn player_frame(body: &str) -> Option<String> {
    let doc = Html::parse_document(body);
    SEL_PLAYER_FRAMES
        .iter()
        .find_map(|sel| {
            doc.select(sel)
                .find_map(|frame| attr_of(frame, &["src"]))
        })
        .or_else(|| {
            doc.select(&SEL_LAZY_FRAME)
                .find_map(|frame| attr_of(frame, &["data-src"]))
        })
}

/// Site path of a stream id: episode ids are paths already, bare slugs are movies.
fn stream_path(stream_id: &str) -> String {
    let trimmed = stream_id.trim_start_matches('/');
    if trimmed.contains('/') {
        format!("/{trimmed}")
    } else {
        format!("/film/{trimmed}")
    }
}

fn title_from_slug(slug: &str) -> String {
    slug_to_title(&RE_SLUG_SUFFIX.replace(slug, ""))
}

/// Human stream title derived from the site path.
fn stream_title_for(stream_id: &str) -> String {
    let path = stream_path(stream_id);
    let parts: Vec<&str> = path.split('/').filter(|p| !p.is_empty()).collect();
    match parts.as_slice() {
        ["film", slug, ..] => format!("{} - Film İzle", title_from_slug(slug)),
        ["dizi", slug, season, episode, ..] => {
            let season = season.strip_prefix("sezon-").and_then(|n| n.parse::<u32>().ok());
            let episode = episode.strip_prefix("bolum-").and_then(|n| n.parse::<u32>().ok());
            match (season, episode) {
                (Some(s), Some(e)) => {
                    format!("{} - S{s:02}E{e:02} Bölüm İzle", title_from_slug(slug))
                }
                _ => "Zeus TV İzle".to_string(),
            }
        }
        _ => "Zeus TV İzle".to_string(),
    }
}

/// `https://x.dizipal.website/0123456789ab` → its `ajax/stream2` API URL.
fn player_api_url(player_url: &str) -> Option<String> {
    let code = RE_FILECODE.captures(player_url)?.get(1)?.as_str().to_string();
    let (dir, _) = player_url.rsplit_once('/')?;
    Some(format!("{dir}/ajax/stream2?filecode={code}"))
}

pub struct DizipalSource {
    http: HttpClient,
    domains: DomainResolver,
    listing_pages: u32,
}

impl DizipalSource {
    pub fn new(http: HttpClient, config: DizipalConfig) -> Self {
        let listing_pages = config.listing_pages;
        Self {
            domains: DomainResolver {
                http: http.clone(),
                config,
                active: TtlCache::new(),
            },
            http,
            listing_pages,
        }
    }

    pub fn purge_expired(&self) -> usize {
        self.domains.active.purge_expired()
    }

    async fn page(&self, url: String, timeout: Duration) -> Result<String, SourceError> {
        self.http
            .text(FetchRequest::get(url).timeout(timeout).cached())
            .await
    }

    async fn search_endpoint(&self, base: &str, term: &str) -> Result<Vec<Card>, SourceError> {
        let req = FetchRequest::post_form(format!("{base}/search"), [("query", term)])
            .header("Accept", "application/json, text/javascript, */*; q=0.01")
            .header("X-Requested-With", "XMLHttpRequest")
            .header("Referer", format!("{base}/"))
            .header("Origin", base.to_string())
            .timeout(SEARCH_TIMEOUT);
        let body = self.http.text(req).await?;
        let trimmed = body.trim_start();
        if trimmed.starts_with('{') || trimmed.starts_with('[') {
            let cards = parse_json_cards(trimmed, term);
            if !cards.is_empty() {
                return Ok(cards);
            }
        }
        Ok(parse_cards(&body, term))
    }

    /// Home page, then the series and movie listings, until something matches.
    async fn search_listings(&self, base: &str, query: &str) -> Vec<Card> {
        let mut pages = vec![base.to_string()];
        for section in ["diziler", "filmler"] {
            pages.extend((1..=self.listing_pages).map(|n| match n {
                1 => format!("{base}/{section}"),
                n => format!("{base}/{section}/{n}"),
            }));
        }
        for url in pages {
            match self.page(url.clone(), LISTING_TIMEOUT).await {
                Ok(body) => {
                    let cards = parse_cards(&body, query);
                    if !cards.is_empty() {
                        debug!(url = %url, count = cards.len(), "listing fallback matched");
                        return cards;
                    }
                }
                Err(err) => debug!(url = %url, error = %err, "listing page skipped"),
            }
        }
        Vec::new()
    }

    async fn backfill_posters(&self, base: &str, cards: Vec<Card>) -> Vec<Card> {
        futures::stream::iter(cards)
            .map(|mut card| async move {
                if card.needs_poster() {
                    if let Ok(body) = self.page(format!("{base}{}", card.path()), PAGE_TIMEOUT).await {
                        let detail = parse_detail(&body, &card.slug, card.media_type);
                        if detail.poster.is_some() {
                            card.poster = detail.poster;
                        }
                    }
                }
                card
            })
            .buffered(POSTER_BACKFILL_CONCURRENCY)
            .collect()
            .await
    }

    async fn try_search(&self, query: &str) -> Result<Vec<RawRecord>, SourceError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        let base = self.domains.resolve().await;

        let mut cards = Vec::new();
        for term in query_variations(query) {
            match self.search_endpoint(&base, &term).await {
                Ok(found) if !found.is_empty() => {
                    cards = found;
                    break;
                }
                Ok(_) => {}
                Err(err) => debug!(term = %term, error = %err, "dizipal search variation failed"),
            }
        }
        if cards.is_empty() {
            cards = self.search_listings(&base, query).await;
        }

        let cards = self.backfill_posters(&base, cards).await;
        Ok(cards.into_iter().map(Card::into_record).collect())
    }

    async fn try_detail(&self, id: &str, media_type: MediaType) -> Result<RawDetail, SourceError> {
        let base = self.domains.resolve().await;
        let url = format!("{base}/{}/{id}", section_of(media_type));
        let body = self.page(url, PAGE_TIMEOUT).await?;
        Ok(parse_detail(&body, id, media_type))
    }

    async fn try_episodes(&self, id: &str, season: u32) -> Result<Vec<EpisodeRef>, SourceError> {
        let base = self.domains.resolve().await;
        let body = self.page(format!("{base}/dizi/{id}"), PAGE_TIMEOUT).await?;
        Ok(parse_episodes(&body, season))
    }

    async fn try_stream(&self, stream_id: &str) -> Result<Option<StreamRef>, SourceError> {
        let base = self.domains.resolve().await;
        let page_url = format!("{base}{}", stream_path(stream_id));
        let page = self
            .http
            .text(FetchRequest::get(page_url).timeout(STREAM_PAGE_TIMEOUT))
            .await?;
        let frame = player_frame(&page)
            .ok_or_else(|| SourceError::UnrecognizedShape("no player iframe".into()))?;
        let player_url = absolute_url(&base, &frame);

        let player = self
            .http
            .text(
                FetchRequest::get(player_url.clone())
                    .header("Referer", base.clone())
                    .timeout(PLAYER_TIMEOUT),
            )
            .await?;

        if let Some(file) = playerjs_file(&player) {
            return Ok(Some(
                StreamRef::url(file).with_subtitles(playerjs_subtitles(&player)),
            ));
        }

        if let Some(api) = player_api_url(&player_url) {
            let req = FetchRequest::get(api)
                .header("Referer", base.clone())
                .header("X-Requested-With", "XMLHttpRequest")
                .header("Accept", "application/json, text/javascript, */*; q=0.01")
                .timeout(PLAYER_API_TIMEOUT);
            match self.http.text(req).await {
                Ok(body) => {
                    if let Some(url) = streaming_url(&body) {
                        return Ok(Some(StreamRef::url(url)));
                    }
                }
                Err(err) => debug!(error = %err, "dizipal player api failed"),
            }
        }

        Ok(media_url_extractor().run(&player).map(StreamRef::url))
    }
}

#[async_trait::async_trait]
impl SourceAdapter for DizipalSource {
    fn name(&self) -> &str {
        "Dizipal"
    }

    fn prefix(&self) -> &str {
        ""
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Site
    }

    fn media_types(&self) -> &[MediaType] {
        &[MediaType::Movie, MediaType::Series]
    }

    fn base_url(&self) -> String {
        self.domains.current()
    }

    async fn search(&self, query: &str) -> Vec<RawRecord> {
        recover(self.name(), "search", self.try_search(query).await)
    }

    async fn get_detail(&self, id: &str, media_type: MediaType) -> Option<RawDetail> {
        if !self.supports(media_type) {
            return None;
        }
        recover(
            self.name(),
            "detail",
            self.try_detail(id, media_type).await.map(Some),
        )
    }

    async fn get_episodes(&self, id: &str, season: u32) -> Vec<EpisodeRef> {
        recover(self.name(), "episodes", self.try_episodes(id, season).await)
    }

    async fn resolve_stream(&self, stream_id: &str) -> Option<StreamRef> {
        recover(self.name(), "stream", self.try_stream(stream_id).await)
    }

    fn stream_title(&self, stream_id: &str, _stream: &StreamRef) -> String {
        stream_title_for(stream_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEARCH_SNIPPET: &str = r#"
        <ul class="results">
          <li class="item">
            <a href="/dizi/gibi-d24"><img src="/uploads/series/gibi.webp" alt="Gibi"></a>
            <h3>Gibi Yayınlandı 2021</h3>
            <a href="/dizi/gibi-d24/sezon-1/bolum-1">1. Bölüm</a>
          </li>
          <li class="item">
            <a href="https://dizipall30.com/film/gibi-film">
              <img src="data:image/svg+xml;base64,AAAA">
              <p>2023 - Gibi Film</p>
            </a>
          </li>
          <li class="item"><a href="/dizi/ezel"><h3>Ezel</h3></a></li>
          <li><a href="/tur/komedi">Komedi</a></li>
        </ul>"#;

    #[test]
    fn search_snippet_yields_matching_cards() {
        let cards = parse_cards(SEARCH_SNIPPET, "gibi");
        assert_eq!(cards.len(), 2);

        assert_eq!(cards[0].media_type, MediaType::Series);
        assert_eq!(cards[0].slug, "gibi-d24");
        assert_eq!(cards[0].title, "Gibi");
        assert_eq!(cards[0].poster.as_deref(), Some("/uploads/series/gibi.webp"));

        assert_eq!(cards[1].media_type, MediaType::Movie);
        assert_eq!(cards[1].title, "Gibi Film");
        assert!(cards[1].needs_poster());

        let record = cards[0].clone().into_record();
        assert_eq!(record.id, "gibi-d24");
        assert_eq!(record.locator, "/dizi/gibi-d24");
    }

    #[test]
    fn json_search_answers_are_understood() {
        let body = r#"{"results":[
            {"url":"https://dizipall30.com/dizi/kurtlar-vadisi","title":"Kurtlar Vadisi","poster":"/uploads/series/kv.jpg"},
            {"url":"/film/baska","title":"Başka"},
            {"title":"no url"}
        ]}"#;
        let cards = parse_json_cards(body, "kurtlar");
        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0].slug, "kurtlar-vadisi");
        assert_eq!(cards[0].poster.as_deref(), Some("/uploads/series/kv.jpg"));
    }

    #[test]
    fn variations_cover_single_words_of_long_queries() {
        assert_eq!(query_variations("Gibi"), vec!["Gibi", "gibi"]);
        let v = query_variations("Kurtlar Vadisi Pusu");
        assert_eq!(v[0], "Kurtlar Vadisi Pusu");
        assert!(v.contains(&"pusu".to_string()));
        assert!(v.contains(&"kurtlar".to_string()));
    }

    const SERIES_PAGE: &str = r#"
        <html><head><title>Gibi izle | Dizipal</title></head><body>
          <h1>Gibi</h1>
          <img src="/assets/logo.svg" alt="logo">
          <img data-src="https://dizipall30.com/uploads/series/gibi-poster.jpg" alt="Gibi">
          <div class="series-profile-info"><span>Yapım: 2021</span><span>IMDb 8.6</span></div>
          <p>Kısa.</p>
          <p>Yılmaz ve İlkkan'ın absürt maceralarını anlatan yerli komedi dizisi, her bölümde yeni bir tuhaflık.</p>
          <a href="/tur/komedi">Komedi</a><a href="/tur/yerli">Yerli</a><a href="/tur/komedi">Komedi</a>
          <a href="/dizi/gibi-d24/sezon-1">1. Sezon</a><a href="/dizi/gibi-d24/sezon-3">3. Sezon</a>
          <a href="/dizi/gibi-d24/sezon-1/bolum-2" title="1. Sezon 2. Bölüm"><img src="/thumbs/2.jpg"></a>
          <a href="/dizi/gibi-d24/sezon-1/bolum-1">Tanışma</a>
          <a href="https://dizipall30.com/dizi/gibi-d24/sezon-3/bolum-1">Final</a>
          <a href="/dizi/gibi-d24/sezon-1/bolum-2">tekrar</a>
        </body></html>"#;

    #[test]
    fn series_detail_page_is_parsed() {
        let detail = parse_detail(SERIES_PAGE, "gibi-d24", MediaType::Series);
        assert_eq!(detail.title, "Gibi");
        assert_eq!(
            detail.poster.as_deref(),
            Some("https://dizipall30.com/uploads/series/gibi-poster.jpg")
        );
        assert_eq!(detail.imdb_rating, Some(8.6));
        assert_eq!(detail.release_year.as_deref(), Some("2021"));
        assert_eq!(detail.season_count, 3);
        assert_eq!(detail.country.as_deref(), Some("TR"));
        assert!(detail.description.unwrap().starts_with("Yılmaz"));
        assert_eq!(detail.genres, RawGenres::names(["Komedi", "Yerli"]));
        assert_eq!(detail.runtime_minutes, None);
    }

    #[test]
    fn season_count_ignores_foreign_links_and_is_capped() {
        let page = r#"<a href="/dizi/gibi-d24/sezon-2">2. Sezon</a>
            <a href="/dizi/baska-dizi/sezon-9999">Başka</a>
            <a href="/sezon-5000">?</a>"#;
        assert_eq!(season_count(page, "gibi-d24"), 2);
        assert_eq!(season_count(page, "/dizi/gibi-d24/"), 2);
        assert_eq!(season_count(page, "yok-dizi"), 1);
        assert_eq!(
            season_count(r#"<a href="/dizi/gibi-d24/sezon-9999">x</a>"#, "gibi-d24"),
            MAX_SEASONS
        );
    }

    #[test]
    fn movie_detail_reads_runtime() {
        let page = r#"<html><body><h1><a href="/film/x">Tek Film</a></h1>
            <div>Süre: 118 dk</div></body></html>"#;
        let detail = parse_detail(page, "tek-film", MediaType::Movie);
        assert_eq!(detail.title, "Tek Film");
        assert_eq!(detail.runtime_minutes, Some(118));
        assert_eq!(detail.season_count, 0);
        assert_eq!(detail.country.as_deref(), Some("US"));
    }

    #[test]
    fn episodes_of_one_season_are_sorted_and_unique() {
        let episodes = parse_episodes(SERIES_PAGE, 1);
        assert_eq!(episodes.len(), 2);
        assert_eq!(episodes[0].episode, 1);
        assert_eq!(episodes[0].title, "Tanışma");
        assert_eq!(episodes[0].stream_id, "dizi/gibi-d24/sezon-1/bolum-1");
        assert_eq!(episodes[1].title, "Bölüm 2");
        assert_eq!(episodes[1].thumbnail_url.as_deref(), Some("/thumbs/2.jpg"));

        let third = parse_episodes(SERIES_PAGE, 3);
        assert_eq!(third.len(), 1);
        assert_eq!(third[0].stream_id, "dizi/gibi-d24/sezon-3/bolum-1");
    }

    #[test]
    fn player_iframe_preference() {
        let page = r#"<iframe src="https://ads.example.com/x"></iframe>
            <div id="vast_new"><iframe src="https://x.dizipal.website/play/0123456789abcdef"></iframe></div>"#;
        assert_eq!(
            player_frame(page).as_deref(),
            Some("https://x.dizipal.website/play/0123456789abcdef")
        );
        assert_eq!(
            player_frame(r#"<iframe data-src="/embed/lazy"></iframe>"#).as_deref(),
            Some("/embed/lazy")
        );
        assert_eq!(player_frame("<div></div>"), None);
    }

    #[test]
    fn player_api_url_keeps_directory() {
        assert_eq!(
            player_api_url("https://x.dizipal.website/0123456789abcdef").as_deref(),
            Some("https://x.dizipal.website/ajax/stream2?filecode=0123456789abcdef")
        );
        assert_eq!(player_api_url("https://other.example.com/e/abc"), None);
    }

    #[test]
    fn stream_titles_come_from_paths() {
        assert_eq!(
            stream_title_for("dizi/gibi-d24/sezon-1/bolum-5"),
            "Gibi - S01E05 Bölüm İzle"
        );
        assert_eq!(stream_title_for("/film/tek-film-d7"), "Tek Film - Film İzle");
        assert_eq!(stream_title_for("tek-film"), "Tek Film - Film İzle");
        assert_eq!(stream_title_for("dizi/gibi-d24"), "Zeus TV İzle");
    }

    #[test]
    fn stream_paths_treat_bare_slugs_as_movies() {
        assert_eq!(stream_path("tek-film"), "/film/tek-film");
        assert_eq!(
            stream_path("dizi/gibi/sezon-1/bolum-1"),
            "/dizi/gibi/sezon-1/bolum-1"
        );
    }

    #[test]
    fn configured_base_url_skips_probing() {
        let http = HttpClient::new(Default::default()).unwrap();
        let source = DizipalSource::new(
            http,
            DizipalConfig {
                base_url: Some("https://mirror.example.com".into()),
                ..DizipalConfig::default()
            },
        );
        assert_eq!(source.base_url(), "https://mirror.example.com");
        assert_eq!(source.prefix(), "");
    }
}
