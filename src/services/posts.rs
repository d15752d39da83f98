// Post service - authoring, editing, commenting and the post detail view

use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::core::validation::{clean_image, clean_text};
use crate::error::{AppError, AppResult};
use crate::infrastructure::database::EntityStore;
use crate::infrastructure::media::MediaStore;
use crate::infrastructure::viewer::ViewerContext;
use crate::models::{
    Comment, CommentForm, CommentView, Group, GroupId, NewPost, Post, PostForm, PostId, PostView,
    User,
};
use crate::services::authorization::can_edit;

/// Everything the post detail page shows
#[derive(Debug, Clone, Serialize)]
pub struct PostDetail {
    pub username: String,
    pub user_profile: User,
    pub post: PostView,
    /// Total number of posts by the author
    pub counter: i64,
    pub items: Vec<CommentView>,
}

/// Result of an edit attempt. Both variants end in a redirect to the detail view.
#[derive(Debug, Clone, PartialEq)]
pub enum EditOutcome {
    Saved(Post),
    /// The viewer is not the author; nothing was written
    Denied,
}

#[derive(Clone)]
pub struct PostService {
    store: Arc<dyn EntityStore>,
    media: MediaStore,
}

impl PostService {
    pub fn new(store: Arc<dyn EntityStore>, media: MediaStore) -> Self {
        Self { store, media }
    }

    pub async fn groups(&self) -> AppResult<Vec<Group>> {
        self.store.list_groups().await
    }

    pub async fn get_author(&self, username: &str) -> AppResult<User> {
        self.store
            .get_user_by_username(username)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", username)))
    }

    /// Look up a post that must belong to `username`
    pub async fn get_authored_post(&self, username: &str, post_id: PostId) -> AppResult<(User, Post)> {
        let author = self.get_author(username).await?;
        match self.store.get_post(post_id).await? {
            Some(post) if post.author_id == author.id => Ok((author, post)),
            _ => Err(AppError::NotFound(format!(
                "Post {} by {} not found",
                post_id, username
            ))),
        }
    }

    #[instrument(skip(self, author, form), fields(author = %author.username))]
    pub async fn create_post(&self, author: &User, form: PostForm) -> AppResult<Post> {
        let text = clean_text("text", &form.text)?;
        let group_id = self.clean_group(form.group).await?;
        let image = self.store_image(form.image.as_deref()).await?;

        let post = self
            .store
            .create_post(NewPost {
                author_id: author.id,
                text,
                group_id,
                image,
            })
            .await?;

        info!("Created post {} by {}", post.id, author.username);
        Ok(post)
    }

    #[instrument(skip(self, viewer, form))]
    pub async fn edit_post(
        &self,
        viewer: &ViewerContext,
        username: &str,
        post_id: PostId,
        form: PostForm,
    ) -> AppResult<EditOutcome> {
        let (_, mut post) = self.get_authored_post(username, post_id).await?;

        if !can_edit(viewer, &post) {
            warn!(
                "Viewer {:?} may not edit post {}, redirecting to read view",
                viewer.user_id(),
                post_id
            );
            return Ok(EditOutcome::Denied);
        }

        post.text = clean_text("text", &form.text)?;
        post.group_id = self.clean_group(form.group).await?;
        // Keep the current image unless a new one is uploaded
        if let Some(image) = self.store_image(form.image.as_deref()).await? {
            post.image = Some(image);
        }

        self.store.update_post(&post).await?;
        info!("Post {} edited by its author", post.id);
        Ok(EditOutcome::Saved(post))
    }

    /// Add a comment by `author`; blank text is ignored and yields `None`
    #[instrument(skip(self, author, form))]
    pub async fn add_comment(
        &self,
        author: &User,
        username: &str,
        post_id: PostId,
        form: CommentForm,
    ) -> AppResult<Option<Comment>> {
        let (_, post) = self.get_authored_post(username, post_id).await?;

        let Ok(text) = clean_text("text", &form.text) else {
            return Ok(None);
        };

        let comment = self.store.create_comment(post.id, author.id, &text).await?;
        info!("{} commented on post {}", author.username, post.id);
        Ok(Some(comment))
    }

    #[instrument(skip(self))]
    pub async fn detail(&self, username: &str, post_id: PostId) -> AppResult<PostDetail> {
        let (author, post) = self.get_authored_post(username, post_id).await?;
        let view = self
            .store
            .get_post_view(post.id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Post {} not found", post_id)))?;

        let counter = self
            .store
            .count_posts(crate::models::PostFilter::Author(author.id))
            .await?;
        let items = self.store.list_comments(post.id).await?;

        Ok(PostDetail {
            username: username.to_string(),
            user_profile: author,
            post: view,
            counter,
            items,
        })
    }

    async fn clean_group(&self, group: Option<GroupId>) -> AppResult<Option<GroupId>> {
        match group {
            None => Ok(None),
            Some(id) => match self.store.get_group(id).await? {
                Some(group) => Ok(Some(group.id)),
                None => Err(AppError::field(
                    "group",
                    "Select a valid choice. That choice is not one of the available choices.",
                )),
            },
        }
    }

    async fn store_image(&self, encoded: Option<&str>) -> AppResult<Option<String>> {
        match encoded.filter(|e| !e.trim().is_empty()) {
            None => Ok(None),
            Some(encoded) => {
                let encoded = encoded.to_string();
                let image = tokio::task::spawn_blocking(move || clean_image(&encoded))
                    .await
                    .map_err(|e| AppError::Internal(format!("Image check failed: {}", e)))??;
                Ok(Some(self.media.save_post_image(&image).await?))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::validation::INVALID_IMAGE_MESSAGE;
    use crate::infrastructure::database::SqliteStore;
    use base64::Engine;

    struct Fixture {
        store: Arc<dyn EntityStore>,
        posts: PostService,
        vasya: User,
        petya: User,
        media: tempfile::TempDir,
    }

    async fn fixture() -> Fixture {
        let media = tempfile::tempdir().unwrap();
        let store: Arc<dyn EntityStore> = Arc::new(SqliteStore::new_in_memory().await.unwrap());
        let vasya = store.create_user("Vasya", "").await.unwrap();
        let petya = store.create_user("Petya", "").await.unwrap();
        let posts = PostService::new(store.clone(), MediaStore::new(media.path()));
        Fixture {
            store,
            posts,
            vasya,
            petya,
            media,
        }
    }

    fn form(text: &str) -> PostForm {
        PostForm {
            text: text.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_post_trims_text() {
        let fx = fixture().await;
        let post = fx.posts.create_post(&fx.vasya, form("  test  ")).await.unwrap();
        assert_eq!(post.text, "test");
        assert_eq!(post.author_id, fx.vasya.id);
    }

    #[tokio::test]
    async fn test_create_post_requires_text() {
        let fx = fixture().await;
        let result = fx.posts.create_post(&fx.vasya, form("")).await;
        assert!(matches!(result, Err(AppError::FieldError { ref field, .. }) if field == "text"));
    }

    #[tokio::test]
    async fn test_create_post_unknown_group() {
        let fx = fixture().await;
        let mut data = form("grouped");
        data.group = Some(42);
        let result = fx.posts.create_post(&fx.vasya, data).await;
        assert!(matches!(result, Err(AppError::FieldError { ref field, .. }) if field == "group"));
    }

    #[tokio::test]
    async fn test_fake_image_is_field_error() {
        let fx = fixture().await;
        let mut data = form("ложная картинка");
        data.image = Some(base64::engine::general_purpose::STANDARD.encode(b"plain text"));

        match fx.posts.create_post(&fx.vasya, data).await {
            Err(AppError::FieldError { field, message }) => {
                assert_eq!(field, "image");
                assert_eq!(message, INVALID_IMAGE_MESSAGE);
            }
            other => panic!("expected image error, got {:?}", other),
        }
        assert_eq!(
            fx.store.count_posts(crate::models::PostFilter::All).await.unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn test_corrupt_png_is_field_error() {
        let fx = fixture().await;
        let mut corrupt = b"\x89PNG\r\n\x1a\n".to_vec();
        corrupt.extend_from_slice(&[0u8; 32]);
        let mut data = form("битая картинка");
        data.image = Some(base64::engine::general_purpose::STANDARD.encode(&corrupt));

        let result = fx.posts.create_post(&fx.vasya, data).await;
        assert!(matches!(result, Err(AppError::FieldError { ref field, .. }) if field == "image"));
        assert!(std::fs::read_dir(fx.media.path().join("posts")).is_err());
    }

    #[tokio::test]
    async fn test_author_edit_saves() {
        let fx = fixture().await;
        let post = fx.posts.create_post(&fx.vasya, form("hello")).await.unwrap();
        let viewer = ViewerContext::authenticated_user(fx.vasya.clone(), "req".into());

        let outcome = fx
            .posts
            .edit_post(&viewer, "Vasya", post.id, form("hello world"))
            .await
            .unwrap();
        assert!(matches!(outcome, EditOutcome::Saved(ref p) if p.text == "hello world"));

        let detail = fx.posts.detail("Vasya", post.id).await.unwrap();
        assert_eq!(detail.post.post.text, "hello world");
    }

    #[tokio::test]
    async fn test_non_author_edit_is_denied_and_text_unchanged() {
        let fx = fixture().await;
        let post = fx.posts.create_post(&fx.vasya, form("хочу на море")).await.unwrap();
        let viewer = ViewerContext::authenticated_user(fx.petya.clone(), "req".into());

        let outcome = fx
            .posts
            .edit_post(&viewer, "Vasya", post.id, form("hijacked"))
            .await
            .unwrap();
        assert_eq!(outcome, EditOutcome::Denied);

        let stored = fx.store.get_post(post.id).await.unwrap().unwrap();
        assert_eq!(stored.text, "хочу на море");
    }

    #[tokio::test]
    async fn test_post_must_belong_to_named_user() {
        let fx = fixture().await;
        let post = fx.posts.create_post(&fx.vasya, form("mine")).await.unwrap();

        assert!(matches!(
            fx.posts.detail("Petya", post.id).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            fx.posts.detail("Nobody", post.id).await,
            Err(AppError::NotFound(_))
        ));

        let comment = CommentForm {
            text: "wrong address".to_string(),
        };
        assert!(matches!(
            fx.posts.add_comment(&fx.petya, "Petya", post.id, comment).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_comments_listed_oldest_first() {
        let fx = fixture().await;
        let post = fx.posts.create_post(&fx.vasya, form("пост для коммента")).await.unwrap();

        let comment_form = |text: &str| CommentForm {
            text: text.to_string(),
        };
        fx.posts
            .add_comment(&fx.petya, "Vasya", post.id, comment_form("first"))
            .await
            .unwrap();
        fx.posts
            .add_comment(&fx.vasya, "Vasya", post.id, comment_form("second"))
            .await
            .unwrap();
        let blank = fx
            .posts
            .add_comment(&fx.petya, "Vasya", post.id, comment_form("  "))
            .await
            .unwrap();
        assert!(blank.is_none());

        let detail = fx.posts.detail("Vasya", post.id).await.unwrap();
        let texts: Vec<&str> = detail.items.iter().map(|c| c.comment.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "second"]);
        assert_eq!(detail.items[0].author, "Petya");
        assert_eq!(detail.counter, 1);
        assert_eq!(detail.post.comment_count, 2);
    }
}
