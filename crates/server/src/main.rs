use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;
use zeustv_catalog::CatalogService;
use zeustv_server::bootstrap::Sources;
use zeustv_server::config::AppConfig;
use zeustv_server::manifest::Manifest;
use zeustv_server::state::AppState;
use zeustv_server::subtitles::SubtitleStore;
use zeustv_server::tasks;
use zeustv_sources::http::HttpClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::load().context("failed to load configuration")?;

    let subs_dir = config.subs_dir();
    std::fs::create_dir_all(&subs_dir).context("failed to create subtitle dir")?;

    let http = HttpClient::new(config.http.clone()).context("failed to build http client")?;
    let sources = Arc::new(Sources::new(http.clone(), &config.sources));
    let router = sources.router().context("failed to register sources")?;
    let catalog = Arc::new(CatalogService::new(router, config.catalog.clone()));

    tasks::spawn_cache_sweep(
        catalog.clone(),
        sources.clone(),
        Duration::from_secs(config.sweep_secs),
    );
    tasks::spawn_playlist_refresh(
        sources.neonspor.clone(),
        Duration::from_secs(config.sources.neonspor.refresh_secs),
    );

    let state = AppState {
        catalog,
        subtitles: Arc::new(SubtitleStore::new(
            subs_dir,
            &config.hosting_url,
            http,
            config.subtitles.clone(),
        )),
        manifest: Arc::new(Manifest::new(&config.hosting_url)),
    };
    let app = zeustv_server::routes::build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind)
        .await
        .context("failed to bind")?;
    info!(addr = %config.bind, hosting_url = %config.hosting_url, "server listening");
    info!("manifest: {}/manifest.json", config.hosting_url);

    axum::serve(listener, app).await?;
    Ok(())
}
