use serde::{Deserialize, Serialize};

/// Placeholder release date used when an upstream does not date its episodes.
pub const DEFAULT_RELEASED_AT: &str = "2024-01-09T00:00:00.000Z";

/// Content kind as exposed to Stremio (`movie`, `series`, `tv`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MediaType {
    #[serde(rename = "movie")]
    Movie,
    #[serde(rename = "series")]
    Series,
    #[serde(rename = "tv")]
    LiveTv,
}

impl MediaType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Movie => "movie",
            Self::Series => "series",
            Self::LiveTv => "tv",
        }
    }

    /// Parse the `type` segment of a Stremio resource path.
    pub fn from_stremio(value: &str) -> Option<Self> {
        match value {
            "movie" => Some(Self::Movie),
            "series" => Some(Self::Series),
            "tv" | "channel" => Some(Self::LiveTv),
            _ => None,
        }
    }
}

impl std::fmt::Display for MediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A search-result row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub id: String,
    pub title: String,
    pub media_type: MediaType,
    pub poster_url: String,
    pub description: String,
    pub genres: Vec<String>,
    pub source_name: String,
}

/// Full metadata for one content entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detail {
    pub id: String,
    pub title: String,
    pub media_type: MediaType,
    pub poster_url: String,
    pub background_url: String,
    pub country: String,
    pub description: String,
    pub genres: Vec<String>,
    pub release_year: String,
    pub imdb_rating: f64,
    pub season_count: u32,
    pub runtime_minutes: Option<u32>,
    pub episodes: Vec<EpisodeRef>,
}

/// One playable unit within a [`Detail`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeRef {
    pub stream_id: String,
    pub title: String,
    pub season: u32,
    pub episode: u32,
    pub thumbnail_url: Option<String>,
    pub released_at: String,
    /// Upstream episode title, before display decoration.
    pub overview: String,
}

impl EpisodeRef {
    pub fn new(
        stream_id: impl Into<String>,
        title: impl Into<String>,
        season: u32,
        episode: u32,
    ) -> Self {
        let title = title.into();
        Self {
            stream_id: stream_id.into(),
            overview: title.clone(),
            title,
            season,
            episode,
            thumbnail_url: None,
            released_at: DEFAULT_RELEASED_AT.to_string(),
        }
    }
}

/// Final media locator: a direct URL or a YouTube video id, never both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamTarget {
    Url(String),
    YouTube(String),
}

/// A language-tagged subtitle file reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtitleRef {
    pub lang: String,
    pub url: String,
}

/// A resolved playable stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamRef {
    pub target: StreamTarget,
    pub subtitle_refs: Vec<SubtitleRef>,
}

impl StreamRef {
    pub fn url(url: impl Into<String>) -> Self {
        Self {
            target: StreamTarget::Url(url.into()),
            subtitle_refs: Vec::new(),
        }
    }

    pub fn youtube(id: impl Into<String>) -> Self {
        Self {
            target: StreamTarget::YouTube(id.into()),
            subtitle_refs: Vec::new(),
        }
    }

    pub fn with_subtitles(mut self, refs: Vec<SubtitleRef>) -> Self {
        self.subtitle_refs = refs;
        self
    }
}
