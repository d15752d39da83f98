// Feed assembler - ordered, paginated post listings for the home, group,
// profile and following contexts

use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::core::paginator::{Page, Paginator, POSTS_PER_PAGE};
use crate::error::{AppError, AppResult};
use crate::infrastructure::cache::Cache;
use crate::infrastructure::database::EntityStore;
use crate::models::{Group, PostFilter, PostView, UserId};

/// Fragment name under which home feed pages are cached
const INDEX_FRAGMENT: &str = "index_page";

/// One page of a feed together with its pagination metadata
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Feed {
    pub page: Page<PostView>,
    pub paginator: Paginator,
}

#[derive(Clone)]
pub struct FeedAssembler {
    store: Arc<dyn EntityStore>,
    index_cache: Arc<Cache<String, Feed>>,
}

impl FeedAssembler {
    pub fn new(store: Arc<dyn EntityStore>, index_cache: Arc<Cache<String, Feed>>) -> Self {
        Self { store, index_cache }
    }

    /// Cache key for a home feed page, derived from the page identity
    pub fn index_cache_key(number: i64, num_pages: i64) -> String {
        format!("{}:{}", INDEX_FRAGMENT, Page::<PostView>::label(number, num_pages))
    }

    /// Home feed: every post. Pages are served from the fragment cache while fresh.
    #[instrument(skip(self))]
    pub async fn index(&self, page: Option<&str>) -> AppResult<Feed> {
        let paginator = Paginator::new(self.store.count_posts(PostFilter::All).await?, POSTS_PER_PAGE);
        let number = paginator.clamp_number(page);
        let key = Self::index_cache_key(number, paginator.num_pages);

        if let Some(feed) = self.index_cache.get(&key).await {
            debug!("Fragment cache hit for {}", key);
            return Ok(feed);
        }

        let feed = self.page_of(PostFilter::All, paginator, number).await?;
        self.index_cache.insert(key, feed.clone()).await;
        Ok(feed)
    }

    #[instrument(skip(self))]
    pub async fn group(&self, slug: &str, page: Option<&str>) -> AppResult<(Group, Feed)> {
        let group = self
            .store
            .get_group_by_slug(slug)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Group {} not found", slug)))?;

        let feed = self.assemble(PostFilter::Group(group.id), page).await?;
        Ok((group, feed))
    }

    #[instrument(skip(self))]
    pub async fn profile(&self, author: UserId, page: Option<&str>) -> AppResult<Feed> {
        self.assemble(PostFilter::Author(author), page).await
    }

    /// Posts by authors `user` follows; following nobody gives an empty feed
    #[instrument(skip(self))]
    pub async fn following(&self, user: UserId, page: Option<&str>) -> AppResult<Feed> {
        self.assemble(PostFilter::FollowedBy(user), page).await
    }

    async fn assemble(&self, filter: PostFilter, page: Option<&str>) -> AppResult<Feed> {
        let paginator = Paginator::new(self.store.count_posts(filter).await?, POSTS_PER_PAGE);
        let number = paginator.clamp_number(page);
        self.page_of(filter, paginator, number).await
    }

    async fn page_of(&self, filter: PostFilter, paginator: Paginator, number: i64) -> AppResult<Feed> {
        let posts = self
            .store
            .list_posts(filter, paginator.per_page, paginator.offset(number))
            .await?;

        Ok(Feed {
            page: paginator.page(number, posts),
            paginator,
        })
    }
}
