// Profile view - an author's feed plus their place in the social graph

use serde::Serialize;

use crate::error::AppResult;
use crate::infrastructure::viewer::ViewerContext;
use crate::models::User;
use crate::services::{feed::Feed, FeedAssembler, PostService, SocialGraph};

#[derive(Debug, Clone, Serialize)]
pub struct ProfileView {
    pub username: String,
    pub user_profile: User,
    #[serde(flatten)]
    pub feed: Feed,
    /// Whether the viewer follows this author; always false for anonymous viewers
    pub following: bool,
    pub counter: i64,
    pub followers: i64,
    pub follows: i64,
}

pub async fn profile_view(
    posts: &PostService,
    feeds: &FeedAssembler,
    graph: &SocialGraph,
    viewer: &ViewerContext,
    username: &str,
    page: Option<&str>,
) -> AppResult<ProfileView> {
    let author = posts.get_author(username).await?;
    let feed = feeds.profile(author.id, page).await?;

    let following = match viewer.user_id() {
        Some(user) => graph.is_following(user, author.id).await?,
        None => false,
    };

    Ok(ProfileView {
        username: author.username.clone(),
        counter: feed.paginator.count,
        followers: graph.follower_count(author.id).await?,
        follows: graph.following_count(author.id).await?,
        user_profile: author,
        feed,
        following,
    })
}
