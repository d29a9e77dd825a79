use axum::extract::{Path, State};
use axum::http::Uri;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::debug;
use zeustv_catalog::CatalogContext;
use zeustv_catalog::router::strip_json;
use zeustv_core::types::MediaType;

use crate::error::not_found;
use crate::manifest::Manifest;
use crate::state::AppState;
use crate::stremio::{
    Cached, CatalogResponse, MetaDetail, MetaPreview, MetaResponse, StreamObject,
    StreamResponse, SubtitlesResponse,
};

pub fn build_router(state: AppState) -> Router {
    let subs_dir = state.subtitles.dir().to_path_buf();
    Router::new()
        .route("/health", get(health))
        .route("/{config}/manifest.json", get(manifest))
        .merge(addon_router())
        .nest("/addon", addon_router())
        .nest_service("/subs", ServeDir::new(subs_dir))
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn addon_router() -> Router<AppState> {
    Router::new()
        .route("/manifest.json", get(manifest))
        .route("/catalog/{media_type}/{id}", get(catalog))
        .route("/catalog/{media_type}/{id}/{extra}", get(catalog_with_extra))
        .route("/meta/{media_type}/{*id}", get(meta))
        .route("/stream/{media_type}/{*id}", get(stream))
        .route("/subtitles/{media_type}/{*id}", get(subtitles))
}

// ---------------------------------------------------------------------------
// Health & manifest
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

async fn manifest(State(state): State<AppState>) -> Json<Manifest> {
    Json(state.manifest.as_ref().clone())
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// Value of `search=` in a still percent-encoded extra segment such as
/// `search=Tom%20%26%20Jerry&skip=0`.
fn search_term(extra: &str) -> Option<String> {
    url::form_urlencoded::parse(extra.as_bytes())
        .find(|(key, _)| key == "search")
        .map(|(_, value)| value.trim().to_string())
}

async fn catalog(
    State(state): State<AppState>,
    Path((media_type, id)): Path<(String, String)>,
) -> Json<Cached<CatalogResponse>> {
    Json(run_catalog(&state, &media_type, strip_json(&id), None).await)
}

// `Path` decodes the extra segment, which would split an encoded `&` inside
// the term; read the raw segment from the URI instead.
async fn catalog_with_extra(
    State(state): State<AppState>,
    Path((media_type, id, _extra)): Path<(String, String, String)>,
    uri: Uri,
) -> Json<Cached<CatalogResponse>> {
    let raw_extra = uri.path().rsplit('/').next().unwrap_or_default();
    let query = search_term(strip_json(raw_extra));
    Json(run_catalog(&state, &media_type, strip_json(&id), query.as_deref()).await)
}

async fn run_catalog(
    state: &AppState,
    media_type: &str,
    catalog_id: &str,
    query: Option<&str>,
) -> Cached<CatalogResponse> {
    let empty = || Cached::new(CatalogResponse { metas: Vec::new() }, false);

    let Some(media_type) = MediaType::from_stremio(media_type) else {
        return empty();
    };
    if !Manifest::is_known_catalog(catalog_id) {
        debug!(catalog = %catalog_id, "unknown catalog");
        return empty();
    }
    let context = CatalogContext::for_catalog(catalog_id, media_type);
    let query = match (context, query) {
        (CatalogContext::LiveTv, query) => query.unwrap_or_default(),
        (CatalogContext::General, Some(query)) if !query.is_empty() => query,
        (CatalogContext::General, _) => return empty(),
    };

    let metas: Vec<MetaPreview> = state
        .catalog
        .search(query, media_type, context)
        .await
        .into_iter()
        .map(MetaPreview::from)
        .collect();
    let has_content = !metas.is_empty();
    Cached::new(CatalogResponse { metas }, has_content)
}

// ---------------------------------------------------------------------------
// Meta, stream, subtitles
// ---------------------------------------------------------------------------

async fn meta(
    State(state): State<AppState>,
    Path((media_type, id)): Path<(String, String)>,
) -> Json<Cached<MetaResponse>> {
    let meta = match MediaType::from_stremio(&media_type) {
        Some(media_type) => state.catalog.meta(&id, media_type).await,
        None => None,
    };
    let found = meta.is_some();
    Json(Cached::new(
        MetaResponse {
            meta: meta.map(MetaDetail::from),
        },
        found,
    ))
}

async fn stream(
    State(state): State<AppState>,
    Path((_media_type, id)): Path<(String, String)>,
) -> Json<Cached<StreamResponse>> {
    let streams: Vec<StreamObject> = state
        .catalog
        .stream(&id)
        .await
        .map(StreamObject::from)
        .into_iter()
        .collect();
    let has_content = !streams.is_empty();
    Json(Cached::new(StreamResponse { streams }, has_content))
}

async fn subtitles(
    State(state): State<AppState>,
    Path((_media_type, id)): Path<(String, String)>,
) -> Json<Cached<SubtitlesResponse>> {
    let refs = state.catalog.subtitle_refs(&id).await;
    let subtitles = state.subtitles.materialize(&refs).await;
    let has_content = !subtitles.is_empty();
    Json(Cached::new(SubtitlesResponse { subtitles }, has_content))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_term_is_read_from_extra() {
        assert_eq!(search_term("search=gibi").as_deref(), Some("gibi"));
        assert_eq!(
            search_term("skip=20&search=k%C4%B1z%C4%B1l%20goncalar").as_deref(),
            Some("kızıl goncalar")
        );
        assert_eq!(search_term("skip=20"), None);
        assert_eq!(search_term("search=").as_deref(), Some(""));
    }

    #[test]
    fn encoded_ampersand_stays_in_search_term() {
        assert_eq!(
            search_term("search=Tom%20%26%20Jerry&skip=0").as_deref(),
            Some("Tom & Jerry")
        );
    }
}
