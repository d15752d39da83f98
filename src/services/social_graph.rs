// Social graph manager - follow edges between users and authors

use std::sync::Arc;
use tracing::{debug, info, instrument};

use crate::error::AppResult;
use crate::infrastructure::database::EntityStore;
use crate::models::UserId;

#[derive(Clone)]
pub struct SocialGraph {
    store: Arc<dyn EntityStore>,
}

impl SocialGraph {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self { store }
    }

    /// Create the edge `user -> author`. Self-follows and existing edges are no-ops.
    #[instrument(skip(self))]
    pub async fn follow(&self, user: UserId, author: UserId) -> AppResult<bool> {
        if user == author {
            debug!("Ignoring self-follow by {}", user);
            return Ok(false);
        }
        if self.store.follow_exists(user, author).await? {
            return Ok(false);
        }

        let created = self.store.create_follow(user, author).await?;
        if created {
            info!("Creating follow relationship: {} -> {}", user, author);
        }
        Ok(created)
    }

    /// Remove the edge `user -> author` if present
    #[instrument(skip(self))]
    pub async fn unfollow(&self, user: UserId, author: UserId) -> AppResult<bool> {
        let removed = self.store.delete_follow(user, author).await?;
        if removed {
            info!("Removed follow relationship: {} -> {}", user, author);
        }
        Ok(removed)
    }

    pub async fn is_following(&self, user: UserId, author: UserId) -> AppResult<bool> {
        self.store.follow_exists(user, author).await
    }

    pub async fn follower_count(&self, author: UserId) -> AppResult<i64> {
        self.store.count_followers(author).await
    }

    pub async fn following_count(&self, user: UserId) -> AppResult<i64> {
        self.store.count_following(user).await
    }
}
