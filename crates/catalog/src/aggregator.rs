//! Cross-source search.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tracing::{debug, warn};
use zeustv_core::cache::TtlCache;
use zeustv_core::types::{CatalogItem, MediaType};
use zeustv_sources::RawRecord;

use crate::normalize::normalize_record;
use crate::router::{AdapterRef, IdRouter};

/// Which kind of catalog a search comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogContext {
    /// Movie/series catalogs: every source that can answer, live channels included.
    General,
    /// The live-TV catalog: playlist sources only.
    LiveTv,
}

impl CatalogContext {
    pub fn for_catalog(catalog_id: &str, media_type: MediaType) -> Self {
        if media_type == MediaType::LiveTv || catalog_id == "neonspor" {
            Self::LiveTv
        } else {
            Self::General
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::General => "general",
            Self::LiveTv => "live",
        }
    }

    fn includes(self, adapter: &AdapterRef, media_type: MediaType) -> bool {
        match self {
            Self::LiveTv => adapter.kind().is_live(),
            Self::General => adapter.kind().is_live() || adapter.supports(media_type),
        }
    }

    /// Live channels also surface in general searches.
    fn admits(self, item: MediaType, requested: MediaType) -> bool {
        item == requested || (self == Self::General && item == MediaType::LiveTv)
    }
}

pub struct Aggregator {
    router: Arc<IdRouter>,
    results: TtlCache<Vec<CatalogItem>>,
    ttl: Duration,
    timeout: Duration,
}

impl Aggregator {
    pub fn new(router: Arc<IdRouter>, ttl: Duration, timeout: Duration) -> Self {
        Self {
            router,
            results: TtlCache::new(),
            ttl,
            timeout,
        }
    }

    pub fn cache_key(query: &str, media_type: MediaType, context: CatalogContext) -> String {
        format!(
            "search:{}:{}:{}",
            context.as_str(),
            media_type,
            query.trim().to_lowercase()
        )
    }

    /// Fan a query out to every applicable adapter and merge the results.
    ///
    /// Never fails: adapters that error or time out simply contribute nothing.
    pub async fn search_all(
        &self,
        query: &str,
        media_type: MediaType,
        context: CatalogContext,
    ) -> Vec<CatalogItem> {
        let key = Self::cache_key(query, media_type, context);
        if let Some(hit) = self.results.get(&key) {
            debug!(key = %key, "search cache hit");
            return hit;
        }

        let adapters: Vec<&AdapterRef> = self
            .router
            .adapters()
            .iter()
            .filter(|a| context.includes(a, media_type))
            .collect();
        let batches = join_all(adapters.iter().map(|a| self.search_one(a, query))).await;

        let mut seen = HashSet::new();
        let mut items = Vec::new();
        for (adapter, records) in adapters.iter().zip(batches) {
            let base_url = adapter.base_url();
            for raw in records {
                let item = match normalize_record(raw, adapter.name(), &base_url) {
                    Ok(item) => item,
                    Err(err) => {
                        warn!(source = %adapter.name(), error = %err, "dropping malformed item");
                        continue;
                    }
                };
                if !context.admits(item.media_type, media_type) {
                    continue;
                }
                if seen.insert(item.id.clone()) {
                    items.push(item);
                }
            }
        }

        debug!(query = %query, media_type = %media_type, results = items.len(), "search merged");
        // An empty merge usually means every upstream was down; do not pin it.
        if !items.is_empty() {
            self.results.set(key, items.clone(), self.ttl);
        }
        items
    }

    async fn search_one(&self, adapter: &AdapterRef, query: &str) -> Vec<RawRecord> {
        match tokio::time::timeout(self.timeout, adapter.search(query)).await {
            Ok(records) => records,
            Err(_) => {
                warn!(source = %adapter.name(), timeout = ?self.timeout, "search timed out");
                Vec::new()
            }
        }
    }

    pub fn purge_expired(&self) -> usize {
        self.results.purge_expired()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StubAdapter;
    use zeustv_sources::SourceKind;

    fn record(id: &str, title: &str, media_type: Option<MediaType>) -> RawRecord {
        RawRecord {
            id: id.into(),
            title: title.into(),
            media_type,
            ..RawRecord::default()
        }
    }

    fn aggregator(adapters: Vec<StubAdapter>) -> Aggregator {
        let mut router = IdRouter::new();
        for adapter in adapters {
            router.register(Arc::new(adapter)).unwrap();
        }
        Aggregator::new(
            Arc::new(router),
            Duration::from_secs(60),
            Duration::from_millis(200),
        )
    }

    #[tokio::test]
    async fn single_match_is_decorated() {
        let a = StubAdapter::new("SourceA", "a-")
            .with_records(vec![record("a-gibi", "Gibi", Some(MediaType::Series))]);
        let b = StubAdapter::new("SourceB", "b-");
        let agg = aggregator(vec![a, b]);

        let items = agg
            .search_all("gibi", MediaType::Series, CatalogContext::General)
            .await;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, "a-gibi");
        assert_eq!(items[0].title, "Gibi [SourceA]");
        assert_eq!(items[0].media_type, MediaType::Series);
    }

    #[tokio::test]
    async fn hanging_adapter_does_not_block_others() {
        let slow = StubAdapter::new("Slow", "slow-")
            .with_records(vec![record("slow-1", "Gibi", Some(MediaType::Series))])
            .with_delay(Duration::from_secs(5));
        let fast = StubAdapter::new("Fast", "fast-")
            .with_records(vec![record("fast-1", "Gibi", Some(MediaType::Series))]);
        let agg = aggregator(vec![slow, fast]);

        let items = agg
            .search_all("gibi", MediaType::Series, CatalogContext::General)
            .await;
        let ids: Vec<&str> = items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["fast-1"]);
    }

    #[tokio::test]
    async fn filters_by_type_and_drops_malformed_and_duplicates() {
        let a = StubAdapter::new("SourceA", "a-").with_records(vec![
            record("a-1", "Dizi", Some(MediaType::Series)),
            record("a-2", "Film", Some(MediaType::Movie)),
            record("a-3", "", Some(MediaType::Series)),
            record("a-1", "Dizi again", Some(MediaType::Series)),
            RawRecord {
                locator: "/dizi/inferred".into(),
                ..record("a-4", "Inferred", None)
            },
        ]);
        let agg = aggregator(vec![a]);

        let items = agg
            .search_all("x", MediaType::Series, CatalogContext::General)
            .await;
        let ids: Vec<&str> = items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["a-1", "a-4"]);
        assert_eq!(items[0].title, "Dizi [SourceA]");
    }

    #[tokio::test]
    async fn live_context_only_asks_playlist_sources() {
        let site = StubAdapter::new("Site", "site-")
            .with_records(vec![record("site-1", "Spor Dizi", Some(MediaType::Series))]);
        let live = StubAdapter::new("Live", "live-")
            .with_kind(SourceKind::Playlist, vec![MediaType::LiveTv])
            .with_records(vec![record("live-bein1", "beIN Sports 1", Some(MediaType::LiveTv))]);
        let agg = aggregator(vec![site, live]);

        let live_items = agg
            .search_all("", MediaType::LiveTv, CatalogContext::LiveTv)
            .await;
        let ids: Vec<&str> = live_items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["live-bein1"]);

        let general = agg
            .search_all("spor", MediaType::Series, CatalogContext::General)
            .await;
        let ids: Vec<&str> = general.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["site-1", "live-bein1"]);
    }

    #[tokio::test]
    async fn results_are_cached_per_query_and_type() {
        let a = StubAdapter::new("SourceA", "a-")
            .with_records(vec![record("a-gibi", "Gibi", Some(MediaType::Series))]);
        let calls = a.search_calls();
        let agg = aggregator(vec![a]);

        agg.search_all("Gibi", MediaType::Series, CatalogContext::General)
            .await;
        agg.search_all(" gibi ", MediaType::Series, CatalogContext::General)
            .await;
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);

        agg.search_all("gibi", MediaType::Movie, CatalogContext::General)
            .await;
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 2);
    }

    #[test]
    fn context_follows_catalog() {
        assert_eq!(
            CatalogContext::for_catalog("neonspor", MediaType::Series),
            CatalogContext::LiveTv
        );
        assert_eq!(
            CatalogContext::for_catalog("zeustv", MediaType::LiveTv),
            CatalogContext::LiveTv
        );
        assert_eq!(
            CatalogContext::for_catalog("zeustv", MediaType::Series),
            CatalogContext::General
        );
    }
}
