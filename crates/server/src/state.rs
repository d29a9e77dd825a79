use std::sync::Arc;

use zeustv_catalog::CatalogService;

use crate::manifest::Manifest;
use crate::subtitles::SubtitleStore;

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<CatalogService>,
    pub subtitles: Arc<SubtitleStore>,
    pub manifest: Arc<Manifest>,
}
