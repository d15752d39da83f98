use std::sync::Arc;
use crate::{
    config::Config,
    error::AppResult,
    infrastructure::{
        middleware::HasViewerSource, Cache, EntityStore, MediaStore, SqliteStore,
    },
    services::{FeedAssembler, PostService, SocialGraph},
};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn EntityStore>,
    pub feeds: FeedAssembler,
    pub graph: SocialGraph,
    pub posts: PostService,
    pub config: Arc<Config>,
}

impl AppState {
    pub async fn new(config: Config) -> AppResult<Self> {
        let store: Arc<dyn EntityStore> = Arc::new(SqliteStore::new(&config.database.url).await?);
        Ok(Self::with_store(config, store))
    }

    /// Wire the services around an existing store
    pub fn with_store(config: Config, store: Arc<dyn EntityStore>) -> Self {
        // Process-wide fragment cache; entries age out, writes never evict them
        let index_cache = Arc::new(Cache::new(config.cache.capacity, config.cache.ttl()));

        Self {
            feeds: FeedAssembler::new(store.clone(), index_cache),
            graph: SocialGraph::new(store.clone()),
            posts: PostService::new(store.clone(), MediaStore::new(&config.media.root)),
            store,
            config: Arc::new(config),
        }
    }
}

impl HasViewerSource for AppState {
    fn entity_store(&self) -> &Arc<dyn EntityStore> {
        &self.store
    }

    fn user_header(&self) -> &str {
        &self.config.auth.user_header
    }
}
