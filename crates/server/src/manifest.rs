use serde::Serialize;

pub const ADDON_ID: &str = "com.zeustv.addon";
pub const SERIES_CATALOG: &str = "zeustv";
pub const MOVIE_CATALOG: &str = "zeustv-movies";
pub const LIVE_CATALOG: &str = "neonspor";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub id: &'static str,
    pub version: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub logo: String,
    pub background: String,
    pub resources: Vec<&'static str>,
    pub types: Vec<&'static str>,
    pub catalogs: Vec<CatalogDecl>,
    pub behavior_hints: BehaviorHints,
}

#[derive(Debug, Clone, Serialize)]
pub struct CatalogDecl {
    #[serde(rename = "type")]
    pub media_type: &'static str,
    pub id: &'static str,
    pub name: &'static str,
    pub extra: Vec<ExtraDecl>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtraDecl {
    pub name: &'static str,
    pub is_required: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BehaviorHints {
    pub configurable: bool,
    pub configuration_required: bool,
}

fn search_catalog(
    media_type: &'static str,
    id: &'static str,
    name: &'static str,
    required: bool,
) -> CatalogDecl {
    CatalogDecl {
        media_type,
        id,
        name,
        extra: vec![ExtraDecl {
            name: "search",
            is_required: required,
        }],
    }
}

impl Manifest {
    pub fn new(hosting_url: &str) -> Self {
        let base = hosting_url.trim_end_matches('/');
        Self {
            id: ADDON_ID,
            version: env!("CARGO_PKG_VERSION"),
            name: "Zeus TV",
            description: "Türkçe dizi, film ve canlı spor kanallarını Stremio'ya getirir.",
            logo: format!("{base}/logo.png"),
            background: format!("{base}/background.jpg"),
            resources: vec!["catalog", "meta", "stream", "subtitles"],
            types: vec!["movie", "series", "tv"],
            catalogs: vec![
                search_catalog("series", SERIES_CATALOG, "Zeus TV Diziler", true),
                search_catalog("movie", MOVIE_CATALOG, "Zeus TV Filmler", true),
                search_catalog("tv", LIVE_CATALOG, "NeonSpor Canlı", false),
            ],
            behavior_hints: BehaviorHints {
                configurable: false,
                configuration_required: false,
            },
        }
    }

    pub fn is_known_catalog(id: &str) -> bool {
        matches!(id, SERIES_CATALOG | MOVIE_CATALOG | LIVE_CATALOG)
    }
}
