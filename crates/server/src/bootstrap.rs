//! Wiring of the concrete sources into the catalog.

use std::sync::Arc;

use zeustv_catalog::{IdRouter, RouterError};
use zeustv_sources::channels::ChannelClassifier;
use zeustv_sources::dizipal::DizipalSource;
use zeustv_sources::dizipal1513::Dizipal1513Source;
use zeustv_sources::http::HttpClient;
use zeustv_sources::neonspor::NeonSporSource;
use zeustv_sources::playlist::PlaylistIndex;
use zeustv_sources::rectv::RecTvSource;
use zeustv_sources::tvdiziler::TvDizilerSource;

use crate::config::SourcesConfig;

/// Every upstream the server talks to, sharing one HTTP client.
pub struct Sources {
    pub http: HttpClient,
    pub dizipal: Arc<DizipalSource>,
    pub dizipal1513: Arc<Dizipal1513Source>,
    pub tvdiziler: Arc<TvDizilerSource>,
    pub rectv: Arc<RecTvSource>,
    pub neonspor: Arc<NeonSporSource>,
}

impl Sources {
    pub fn new(http: HttpClient, config: &SourcesConfig) -> Self {
        let classifier = ChannelClassifier::new(config.channels.clone());
        Self {
            dizipal: Arc::new(DizipalSource::new(http.clone(), config.dizipal.clone())),
            dizipal1513: Arc::new(Dizipal1513Source::new(
                http.clone(),
                config.dizipal1513.clone(),
            )),
            tvdiziler: Arc::new(TvDizilerSource::new(http.clone(), config.tvdiziler.clone())),
            rectv: Arc::new(RecTvSource::new(http.clone(), config.rectv.clone())),
            neonspor: Arc::new(NeonSporSource::new(
                http.clone(),
                config.neonspor.clone(),
                Arc::new(PlaylistIndex::new()),
                classifier,
                config.match_policy.clone(),
            )),
            http,
        }
    }

    /// Router over all sources. Registration order is the merge order of search results.
    pub fn router(&self) -> Result<IdRouter, RouterError> {
        let mut router = IdRouter::new();
        router.register(self.dizipal.clone())?;
        router.register(self.dizipal1513.clone())?;
        router.register(self.tvdiziler.clone())?;
        router.register(self.rectv.clone())?;
        router.register(self.neonspor.clone())?;
        Ok(router)
    }

    /// Drop expired upstream-side memory: page cache, resolved domains, RecTV lookups.
    pub fn purge_expired(&self) -> usize {
        self.http.purge_expired() + self.dizipal.purge_expired() + self.rectv.purge_expired()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zeustv_sources::http::HttpConfig;

    #[test]
    fn all_sources_register_with_distinct_prefixes() {
        let sources = Sources::new(
            HttpClient::new(HttpConfig::default()).unwrap(),
            &SourcesConfig::default(),
        );
        let router = sources.router().unwrap();
        let names: Vec<&str> = router.adapters().iter().map(|a| a.name()).collect();
        assert_eq!(
            names,
            vec!["Dizipal", "Dizipal1513", "TvDiziler", "RecTV", "NeonSpor"]
        );
        assert_eq!(router.route_for("rectv-12:34").unwrap().name(), "RecTV");
        assert_eq!(router.route_for("dizipal1513-gibi").unwrap().name(), "Dizipal1513");
        assert_eq!(router.route_for("neonspor-bein1-live").unwrap().name(), "NeonSpor");
        assert_eq!(router.route_for("kurtlar-vadisi").unwrap().name(), "Dizipal");
    }
}
