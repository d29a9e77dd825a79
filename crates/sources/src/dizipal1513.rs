//! Dizipal1513 scraper: JSON search behind a form token, HTML series pages,
//! and a PHP player that hands out HLS manifests.

use std::collections::HashSet;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use scraper::{Html, Selector};
use serde::Deserialize;
use tracing::debug;
use zeustv_core::types::{EpisodeRef, MediaType, StreamRef};

use crate::extract::{master_m3u8, mp4};
use crate::html::{IMG_SRC_ATTRS, attr_of, origin_of, path_of, slug_to_title, text_of};
use crate::http::{FetchRequest, HttpClient};
use crate::source::{SourceAdapter, SourceKind, finalize_episodes, recover};
use crate::{RawDetail, RawGenres, RawRecord, SourceError};

pub const PREFIX: &str = "dizipal1513-";

const HOME_TIMEOUT: Duration = Duration::from_secs(5);
const SEARCH_TIMEOUT: Duration = Duration::from_secs(5);
const PAGE_TIMEOUT: Duration = Duration::from_secs(8);
const EPISODE_TIMEOUT: Duration = Duration::from_secs(10);
const PLAYER_TIMEOUT: Duration = Duration::from_secs(15);
const PLAYER_API_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Dizipal1513Config {
    pub base_url: String,
    /// Search form key used when the home page does not carry one.
    pub default_form_key: String,
    /// Player host assumed for bare `iframe.php?v=` references.
    pub player_host: String,
    /// Poster template; `{imdb}` is replaced with the IMDb id.
    pub poster_template: String,
}

impl Default for Dizipal1513Config {
    fn default() -> Self {
        Self {
            base_url: "https://dizipal1513.com".to_string(),
            default_form_key: "ca1d4a53d0f4761a949b85e51e18f096".to_string(),
            player_host: "https://sn.dplayer82.site".to_string(),
            poster_template:
                "https://images.cdnhipter.xyz/images/tv/poster/360/540/80/{imdb}.jpg?v=3.645"
                    .to_string(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Option<SearchData>,
}

#[derive(Debug, Default, Deserialize)]
struct SearchData {
    #[serde(default)]
    result: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    #[serde(default)]
    used_slug: Option<String>,
    #[serde(default)]
    object_name: Option<String>,
    #[serde(default)]
    object_related_imdb_id: Option<String>,
}

static SEL_FORM_KEY: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"input[name="cKey"]"#).unwrap());
static SEL_FORM_VALUE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"input[name="cValue"]"#).unwrap());
static SEL_H1: LazyLock<Selector> = LazyLock::new(|| Selector::parse("h1").unwrap());
static SEL_TITLE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("title").unwrap());
static SEL_POSTER: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"img[src*="poster"], img[src*="images"], .poster img, .series-poster img"#)
        .unwrap()
});
static SEL_BACKDROP: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"img[src*="backdrop"], img[src*="brand"], .background img"#).unwrap()
});
static SEL_DESCRIPTION: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#".description, .content, [itemprop="description"]"#).unwrap()
});
static SEL_EPISODE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"a[href*="/bolum/"]"#).unwrap());
static SEL_IMG: LazyLock<Selector> = LazyLock::new(|| Selector::parse("img").unwrap());
static SEL_IFRAME: LazyLock<Selector> = LazyLock::new(|| Selector::parse("iframe").unwrap());

static RE_USED_SLUG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(series|movie|dizi|film)/([^/?#]+)").unwrap());
static RE_SITE_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s*-\s*Dizipal.*$").unwrap());
static RE_EPISODE_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/bolum/[^?#]*-(\d+)x(\d+)").unwrap());
static RE_YEAR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b(?:19|20)\d{2}\b").unwrap());
static RE_PLAYER_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(https?://[^"'\s]+iframe\.php\?v=[^"'\s&]+)"#).unwrap()
});
static RE_PLAYER_PARAM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"iframe\.php\?v=([^"'\s&]+)"#).unwrap());
static RE_DPLAYER_HOST: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(https?://[^"'\s/]*dplayer[^"'\s/]*)"#).unwrap());
static RE_PLAYER_APIS: LazyLock<[(&'static str, Regex); 3]> = LazyLock::new(|| {
    [
        ("source2.php", Regex::new(r#"source2\.php\?v=([^"'\s&]+)"#).unwrap()),
        ("l.php", Regex::new(r#"[^a-z0-9]l\.php\?v=([^"'\s&]+)"#).unwrap()),
        ("ld.php", Regex::new(r#"ld\.php\?v=([^"'\s&]+)"#).unwrap()),
    ]
});
static RE_MASTER_PARAM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)master\.m3u8\?v=([^"'\s&]+)"#).unwrap());

fn parse_form_tokens(body: &str) -> (Option<String>, Option<String>) {
    let doc = Html::parse_document(body);
    let value_of = |sel: &Selector| {
        doc.select(sel)
            .next()
            .and_then(|input| attr_of(input, &["value"]))
    };
    (value_of(&SEL_FORM_KEY), value_of(&SEL_FORM_VALUE))
}

fn records_from_search(resp: SearchResponse, poster_template: &str) -> Vec<RawRecord> {
    let mut seen = HashSet::new();
    resp.data
        .map(|d| d.result)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|hit| {
            let used_slug = hit.used_slug?;
            let caps = RE_USED_SLUG.captures(&used_slug)?;
            if !matches!(&caps[1], "series" | "dizi") {
                return None;
            }
            let slug = caps[2].to_string();
            if !seen.insert(slug.clone()) {
                return None;
            }
            Some(RawRecord {
                id: format!("{PREFIX}{slug}"),
                title: hit
                    .object_name
                    .filter(|n| !n.trim().is_empty())
                    .unwrap_or_else(|| slug.clone()),
                media_type: Some(MediaType::Series),
                locator: format!("/{}", used_slug.trim_start_matches('/')),
                poster: hit
                    .object_related_imdb_id
                    .filter(|imdb| !imdb.is_empty())
                    .map(|imdb| poster_template.replace("{imdb}", &imdb)),
                description: None,
                genres: RawGenres::Missing,
            })
        })
        .collect()
}

fn parse_detail(body: &str, id: &str, slug: &str) -> RawDetail {
    let doc = Html::parse_document(body);
    let name = doc
        .select(&SEL_H1)
        .next()
        .map(text_of)
        .or_else(|| {
            doc.select(&SEL_TITLE)
                .next()
                .map(|t| RE_SITE_SUFFIX.replace(&text_of(t), "").trim().to_string())
        })
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| slug_to_title(slug));

    let mut detail = RawDetail::new(id, name.clone(), MediaType::Series);
    detail.poster = doc
        .select(&SEL_POSTER)
        .next()
        .and_then(|img| attr_of(img, &IMG_SRC_ATTRS[..2]));
    detail.background = doc
        .select(&SEL_BACKDROP)
        .next()
        .and_then(|img| attr_of(img, &IMG_SRC_ATTRS[..2]));
    let description = doc
        .select(&SEL_DESCRIPTION)
        .next()
        .map(text_of)
        .filter(|d| !d.is_empty());
    detail.release_year = description
        .as_deref()
        .and_then(|d| RE_YEAR.find(d))
        .map(|m| m.as_str().to_string());
    detail.description =
        Some(description.unwrap_or_else(|| format!("{name} izle - ücretsiz 1080p | Dizipal izle")));
    detail.country = Some("TR".to_string());
    detail.season_count = episode_codes(&doc)
        .map(|(season, _)| season)
        .max()
        .unwrap_or(1);
    detail
}

/// `(season, episode)` of every episode link on a series page.
fn episode_codes(doc: &Html) -> impl Iterator<Item = (u32, u32)> + '_ {
    doc.select(&SEL_EPISODE).filter_map(|link| {
        let caps = RE_EPISODE_CODE.captures(link.value().attr("href")?)?;
        Some((caps[1].parse().ok()?, caps[2].parse().ok()?))
    })
}

fn parse_episodes(body: &str, season: u32) -> Vec<EpisodeRef> {
    let doc = Html::parse_document(body);
    let episodes = doc
        .select(&SEL_EPISODE)
        .filter_map(|link| {
            let href = link.value().attr("href")?;
            let caps = RE_EPISODE_CODE.captures(href)?;
            let link_season: u32 = caps[1].parse().ok()?;
            let number: u32 = caps[2].parse().ok()?;
            if link_season != season {
                return None;
            }
            let title = Some(text_of(link))
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| format!("Bölüm {number}"));
            let stream_id = format!("{PREFIX}{}", path_of(href).trim_start_matches('/'));
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

/// Player URL from the first iframe, or from a scripted `iframe.php?v=` reference.
fn player_url(body: &str, default_host: &str) -> Option<String> {
    let doc = Html::parse_document(body);
    if let Some(src) = doc
        .select(&SEL_IFRAME)
        .next()
        .and_then(|frame| attr_of(frame, &["src", "data-src"]))
    {
        return Some(src);
    }
    if let Some(caps) = RE_PLAYER_URL.captures(body) {
        return Some(caps[1].to_string());
    }
    let param = RE_PLAYER_PARAM.captures(body)?[1].to_string();
    let host = RE_DPLAYER_HOST
        .captures(body)
        .map(|c| c[1].to_string())
        .unwrap_or_else(|| default_host.trim_end_matches('/').to_string());
    Some(format!("{host}/iframe.php?v={param}"))
}

/// Highest-priority player API call found in the player page.
fn player_api(player: &str, host: &str) -> Option<String> {
    RE_PLAYER_APIS.iter().find_map(|(endpoint, re)| {
        re.captures(player)
            .map(|c| format!("{host}/{endpoint}?v={}", &c[1]))
    })
}

/// Manifest link in the player page, absolute or as a bare `master.m3u8?v=` parameter.
fn player_manifest(player: &str, host: &str) -> Option<String> {
    master_m3u8(player).or_else(|| {
        RE_MASTER_PARAM
            .captures(player)
            .map(|c| format!("{host}/master.m3u8?v={}", &c[1]))
    })
}

pub struct Dizipal1513Source {
    http: HttpClient,
    config: Dizipal1513Config,
}

impl Dizipal1513Source {
    pub fn new(http: HttpClient, config: Dizipal1513Config) -> Self {
        Self { http, config }
    }

    fn base(&self) -> &str {
        self.config.base_url.trim_end_matches('/')
    }

    async fn form_tokens(&self) -> (String, String) {
        let home = self
            .http
            .text(
                FetchRequest::get(self.base().to_string())
                    .timeout(HOME_TIMEOUT)
                    .cached(),
            )
            .await;
        let (key, value) = match home {
            Ok(body) => parse_form_tokens(&body),
            Err(err) => {
                debug!(error = %err, "dizipal1513 home page unavailable, using default form key");
                (None, None)
            }
        };
        (
            key.unwrap_or_else(|| self.config.default_form_key.clone()),
            value.unwrap_or_default(),
        )
    }

    async fn try_search(&self, query: &str) -> Result<Vec<RawRecord>, SourceError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        let (key, value) = self.form_tokens().await;
        let form = [
            ("cKey", key),
            ("cValue", value),
            ("type", "hepsi".to_string()),
            ("searchterm", query.to_string()),
        ];
        let req = FetchRequest::post_form(format!("{}/bg/searchcontent", self.base()), form)
            .header("Accept", "application/json, text/javascript, */*; q=0.01")
            .header("X-Requested-With", "XMLHttpRequest")
            .header("Referer", self.base().to_string())
            .timeout(SEARCH_TIMEOUT);
        let resp: SearchResponse = self.http.json(req).await?;
        Ok(records_from_search(resp, &self.config.poster_template))
    }

    async fn series_page(&self, slug: &str) -> Result<String, SourceError> {
        self.http
            .text(
                FetchRequest::get(format!("{}/series/{slug}", self.base()))
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

        if let Some(player_url) = player_url(&page, &self.config.player_host) {
            match self.from_player(&player_url, &page_url).await {
                Ok(Some(url)) => return Ok(Some(StreamRef::url(url))),
                Ok(None) => {}
                Err(err) => debug!(error = %err, "dizipal1513 player failed"),
            }
        }

        Ok(master_m3u8(&page).or_else(|| mp4(&page)).map(StreamRef::url))
    }

    async fn from_player(
        &self,
        player_url: &str,
        referer: &str,
    ) -> Result<Option<String>, SourceError> {
        let player = self
            .http
            .text(
                FetchRequest::get(player_url.to_string())
                    .header("Referer", referer.to_string())
                    .timeout(PLAYER_TIMEOUT),
            )
            .await?;
        let host = origin_of(player_url).unwrap_or_default();

        if let Some(api) = player_api(&player, &host) {
            let req = FetchRequest::get(api)
                .header("Accept", "*/*")
                .header("Referer", player_url.to_string())
                .timeout(PLAYER_API_TIMEOUT);
            match self.http.text(req).await {
                Ok(body) => {
                    if let Some(url) = master_m3u8(&body) {
                        return Ok(Some(url));
                    }
                }
                Err(err) => debug!(error = %err, "dizipal1513 player api failed"),
            }
        }

        Ok(player_manifest(&player, &host))
    }
}

#[async_trait::async_trait]
impl SourceAdapter for Dizipal1513Source {
    fn name(&self) -> &str {
        "Dizipal1513"
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
        recover(
            self.name(),
            "episodes",
            self.series_page(slug).await.map(Some),
        )
        .map(|body| parse_episodes(&body, season))
        .unwrap_or_default()
    }

    async fn resolve_stream(&self, stream_id: &str) -> Option<StreamRef> {
        recover(self.name(), "stream", self.try_stream(stream_id).await)
    }
}
