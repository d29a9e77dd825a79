//! Raw adapter records to canonical catalog types.
//!
//! Every coercion here is total: odd upstream shapes collapse to empty values
//! instead of failing. Only a record without an id or a title is rejected.

use thiserror::Error;
use zeustv_core::types::{CatalogItem, Detail, MediaType};
use zeustv_sources::html::{absolute_url, is_placeholder_image};
use zeustv_sources::{RawDetail, RawGenre, RawGenres, RawRecord};

pub const DEFAULT_COUNTRY: &str = "TR";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("missing field `{0}`")]
    MissingField(&'static str),
}

/// Usable absolute poster URL, or `""`.
///
/// Inline images (data URLs, base64, SVG) and known placeholders are blanked.
/// Protocol-relative links get `https:`; root- or path-relative links are
/// resolved against `base_url`.
pub fn sanitize_poster(raw: Option<&str>, base_url: &str) -> String {
    let Some(raw) = raw.map(str::trim) else {
        return String::new();
    };
    let lower = raw.to_ascii_lowercase();
    if lower.starts_with("data:") || is_placeholder_image(&lower) {
        return String::new();
    }
    if lower.starts_with("http://") || lower.starts_with("https://") {
        return raw.to_string();
    }
    if let Some(rest) = raw.strip_prefix("//") {
        return format!("https://{rest}");
    }
    if base_url.is_empty() {
        return raw.to_string();
    }
    absolute_url(base_url, raw)
}

/// Ordered, non-empty genre names from whatever shape the upstream sent.
pub fn coerce_genres(raw: &RawGenres) -> Vec<String> {
    let names: Vec<&str> = match raw {
        RawGenres::Missing => Vec::new(),
        RawGenres::Text(text) => text.split(',').collect(),
        RawGenres::List(entries) => entries
            .iter()
            .flatten()
            .filter_map(|genre| match genre {
                RawGenre::Name(name) => Some(name.as_str()),
                RawGenre::Titled { title } => title.as_deref(),
                RawGenre::Other(_) => None,
            })
            .collect(),
    };
    names
        .into_iter()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

/// `"Gibi"` from `SourceA` → `"Gibi [SourceA]"`.
pub fn decorate_title(title: &str, source: &str) -> String {
    format!("{} [{source}]", title.trim())
}

/// Series when the locator has a series-like path segment, movie otherwise.
pub fn infer_media_type(locator: &str) -> MediaType {
    let lower = locator.to_ascii_lowercase();
    let series = lower
        .split(['/', '?', '#'])
        .any(|segment| matches!(segment, "dizi" | "diziler" | "series" | "serie" | "bolum"));
    if series {
        MediaType::Series
    } else {
        MediaType::Movie
    }
}

/// Trimmed id without surrounding slashes.
pub fn clean_id(id: &str) -> String {
    id.trim().trim_matches('/').to_string()
}

fn required(value: &str, field: &'static str) -> Result<String, NormalizeError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(NormalizeError::MissingField(field));
    }
    Ok(value.to_string())
}

fn text_or_empty(value: Option<String>) -> String {
    value.map(|v| v.trim().to_string()).unwrap_or_default()
}

pub fn normalize_record(
    raw: RawRecord,
    source: &str,
    base_url: &str,
) -> Result<CatalogItem, NormalizeError> {
    let id = required(&clean_id(&raw.id), "id")?;
    let title = required(&raw.title, "title")?;
    let media_type = raw
        .media_type
        .unwrap_or_else(|| infer_media_type(&raw.locator));

    Ok(CatalogItem {
        id,
        title: decorate_title(&title, source),
        media_type,
        poster_url: sanitize_poster(raw.poster.as_deref(), base_url),
        description: text_or_empty(raw.description),
        genres: coerce_genres(&raw.genres),
        source_name: source.to_string(),
    })
}

/// Detail without episodes; the caller attaches those.
pub fn normalize_detail(
    raw: RawDetail,
    source: &str,
    base_url: &str,
) -> Result<Detail, NormalizeError> {
    let id = required(&clean_id(&raw.id), "id")?;
    let title = required(&raw.title, "title")?;
    let poster_url = sanitize_poster(raw.poster.as_deref(), base_url);
    let background_url = match sanitize_poster(raw.background.as_deref(), base_url) {
        bg if bg.is_empty() => poster_url.clone(),
        bg => bg,
    };
    let country = match text_or_empty(raw.country) {
        c if c.is_empty() => DEFAULT_COUNTRY.to_string(),
        c => c,
    };
    let is_movie = raw.media_type == MediaType::Movie;

    Ok(Detail {
        id,
        title: decorate_title(&title, source),
        media_type: raw.media_type,
        poster_url,
        background_url,
        country,
        description: text_or_empty(raw.description),
        genres: coerce_genres(&raw.genres),
        release_year: text_or_empty(raw.release_year),
        imdb_rating: raw
            .imdb_rating
            .filter(|r| r.is_finite() && *r >= 0.0)
            .unwrap_or(0.0),
        season_count: if is_movie { 0 } else { raw.season_count },
        runtime_minutes: if is_movie { raw.runtime_minutes } else { None },
        episodes: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://dizipall27.com";

    #[test]
    fn inline_and_placeholder_posters_are_blanked() {
        for raw in [
            "data:image/png;base64,iVBORw0KGgo=",
            "data:image/svg+xml,%3Csvg%3E",
            "https://cdn.example.com/img/placeholder.jpg",
            "/img/logo.svg",
            "x.jp",
            "",
        ] {
            assert_eq!(sanitize_poster(Some(raw), BASE), "", "{raw}");
        }
        assert_eq!(sanitize_poster(None, BASE), "");
    }

    #[test]
    fn relative_posters_are_made_absolute() {
        assert_eq!(
            sanitize_poster(Some("//img.example.com/p.jpg"), BASE),
            "https://img.example.com/p.jpg"
        );
        assert_eq!(
            sanitize_poster(Some("/uploads/series/gibi.webp"), BASE),
            "https://dizipall27.com/uploads/series/gibi.webp"
        );
    }

    #[test]
    fn sanitizing_is_idempotent() {
        let once = sanitize_poster(Some("/uploads/a.jpg"), BASE);
        assert_eq!(sanitize_poster(Some(&once), BASE), once);

        let absolute = "https://images.example.com/t/p/w500/abc.jpg";
        assert_eq!(sanitize_poster(Some(absolute), BASE), absolute);
        assert_eq!(sanitize_poster(Some(absolute), ""), absolute);
    }

    #[test]
    fn genres_are_coerced_from_every_shape() {
        assert_eq!(
            coerce_genres(&RawGenres::Text("Dram, Komedi,, ".into())),
            vec!["Dram", "Komedi"]
        );
        let mixed = RawGenres::List(vec![
            Some(RawGenre::Titled {
                title: Some("Aksiyon".into()),
            }),
            None,
            Some(RawGenre::Name(" ".into())),
            Some(RawGenre::Titled { title: None }),
            Some(RawGenre::Other(serde_json::json!(7))),
            Some(RawGenre::Name("Suç".into())),
        ]);
        assert_eq!(coerce_genres(&mixed), vec!["Aksiyon", "Suç"]);
        assert!(coerce_genres(&RawGenres::Missing).is_empty());
        assert!(coerce_genres(&RawGenres::List(Vec::new())).is_empty());
    }

    #[test]
    fn media_type_is_inferred_from_locator() {
        assert_eq!(infer_media_type("/dizi/gibi"), MediaType::Series);
        assert_eq!(infer_media_type("https://x.example.com/series/gibi"), MediaType::Series);
        assert_eq!(infer_media_type("/film/yedinci-kogustaki-mucize"), MediaType::Movie);
        assert_eq!(infer_media_type("gibi"), MediaType::Movie);
        assert_eq!(infer_media_type("/dizipal-film/x"), MediaType::Movie);
    }

    #[test]
    fn record_is_decorated_and_typed() {
        let raw = RawRecord {
            id: "a-gibi".into(),
            title: " Gibi ".into(),
            locator: "/dizi/gibi".into(),
            poster: Some("/uploads/gibi.jpg".into()),
            ..RawRecord::default()
        };
        let item = normalize_record(raw, "SourceA", "https://a.example.com").unwrap();
        assert_eq!(item.id, "a-gibi");
        assert_eq!(item.title, "Gibi [SourceA]");
        assert_eq!(item.media_type, MediaType::Series);
        assert_eq!(item.poster_url, "https://a.example.com/uploads/gibi.jpg");
        assert_eq!(item.source_name, "SourceA");
    }

    #[test]
    fn record_without_title_is_rejected() {
        let raw = RawRecord {
            id: "a-1".into(),
            ..RawRecord::default()
        };
        assert_eq!(
            normalize_record(raw, "SourceA", BASE),
            Err(NormalizeError::MissingField("title"))
        );
        let raw = RawRecord {
            id: " / ".into(),
            title: "X".into(),
            ..RawRecord::default()
        };
        assert_eq!(
            normalize_record(raw, "SourceA", BASE),
            Err(NormalizeError::MissingField("id"))
        );
    }

    #[test]
    fn detail_defaults_are_applied() {
        let mut raw = RawDetail::new("rectv-7", "Film", MediaType::Movie);
        raw.poster = Some("https://img.example.com/p.jpg".into());
        raw.season_count = 3;
        raw.runtime_minutes = Some(104);
        raw.imdb_rating = Some(f64::NAN);
        let detail = normalize_detail(raw, "RecTV", "").unwrap();
        assert_eq!(detail.title, "Film [RecTV]");
        assert_eq!(detail.country, "TR");
        assert_eq!(detail.background_url, "https://img.example.com/p.jpg");
        assert_eq!(detail.season_count, 0);
        assert_eq!(detail.runtime_minutes, Some(104));
        assert_eq!(detail.imdb_rating, 0.0);

        let mut series = RawDetail::new("x", "Dizi", MediaType::Series);
        series.season_count = 2;
        series.runtime_minutes = Some(40);
        series.country = Some("US".into());
        let detail = normalize_detail(series, "Dizipal", BASE).unwrap();
        assert_eq!(detail.season_count, 2);
        assert_eq!(detail.runtime_minutes, None);
        assert_eq!(detail.country, "US");
    }
}
