#![allow(clippy::type_complexity)]
pub mod channels;
pub mod dizipal;
pub mod dizipal1513;
pub mod extract;
pub mod html;
pub mod http;
pub mod neonspor;
pub mod playlist;
pub mod rectv;
pub mod source;
pub mod tvdiziler;

use serde::Deserialize;
use thiserror::Error;
use zeustv_core::types::MediaType;

pub use source::{SourceAdapter, SourceKind};

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),
    #[error("upstream returned {status} for {url}")]
    Status { status: u16, url: String },
    #[error("unrecognized upstream shape: {0}")]
    UnrecognizedShape(String),
    #[error("decode error: {0}")]
    Decode(String),
}

impl SourceError {
    /// Transport failures and 5xx responses are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::UpstreamUnavailable(_) => true,
            Self::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// One genre entry as upstreams send it: a bare string or an object with a `title`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RawGenre {
    Name(String),
    Titled { title: Option<String> },
    Other(serde_json::Value),
}

/// Genre payload in whichever shape the upstream used.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RawGenres {
    #[default]
    Missing,
    Text(String),
    List(Vec<Option<RawGenre>>),
}

impl RawGenres {
    pub fn names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::List(
            names
                .into_iter()
                .map(|n| Some(RawGenre::Name(n.into())))
                .collect(),
        )
    }
}

/// A search hit before normalization.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRecord {
    pub id: String,
    pub title: String,
    /// `None` when the upstream gives no explicit type; the normalizer infers it from `locator`.
    pub media_type: Option<MediaType>,
    /// Upstream URL or path the record was scraped from.
    pub locator: String,
    pub poster: Option<String>,
    pub description: Option<String>,
    pub genres: RawGenres,
}

/// Detail page contents before normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct RawDetail {
    pub id: String,
    pub title: String,
    pub media_type: MediaType,
    pub poster: Option<String>,
    pub background: Option<String>,
    pub country: Option<String>,
    pub description: Option<String>,
    pub genres: RawGenres,
    pub release_year: Option<String>,
    pub imdb_rating: Option<f64>,
    pub season_count: u32,
    pub runtime_minutes: Option<u32>,
}

impl RawDetail {
    pub fn new(id: impl Into<String>, title: impl Into<String>, media_type: MediaType) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            media_type,
            poster: None,
            background: None,
            country: None,
            description: None,
            genres: RawGenres::Missing,
            release_year: None,
            imdb_rating: None,
            season_count: 0,
            runtime_minutes: None,
        }
    }
}
