// Entity store - persistence for users, groups, posts, comments and follow edges.
// Services reach storage only through the `EntityStore` trait.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{
    sqlite::{Sqlite, SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow},
    QueryBuilder, Row,
};
use std::str::FromStr;
use tracing::info;

use crate::core::validation::{validate_slug, validate_username};
use crate::error::{AppError, AppResult};
use crate::models::{
    from_millis, Comment, CommentView, Group, GroupId, GroupRef, NewPost, Post, PostFilter,
    PostId, PostView, User, UserId,
};

#[async_trait]
pub trait EntityStore: Send + Sync {
    // Users
    async fn create_user(&self, username: &str, full_name: &str) -> AppResult<User>;
    async fn get_user_by_username(&self, username: &str) -> AppResult<Option<User>>;

    // Groups
    async fn create_group(&self, title: &str, slug: &str, description: &str) -> AppResult<Group>;
    async fn get_group(&self, id: GroupId) -> AppResult<Option<Group>>;
    async fn get_group_by_slug(&self, slug: &str) -> AppResult<Option<Group>>;
    async fn list_groups(&self) -> AppResult<Vec<Group>>;

    // Posts
    async fn create_post(&self, post: NewPost) -> AppResult<Post>;
    async fn get_post(&self, id: PostId) -> AppResult<Option<Post>>;
    async fn get_post_view(&self, id: PostId) -> AppResult<Option<PostView>>;
    async fn update_post(&self, post: &Post) -> AppResult<()>;
    async fn count_posts(&self, filter: PostFilter) -> AppResult<i64>;
    /// Newest first, joined with author and group
    async fn list_posts(&self, filter: PostFilter, limit: i64, offset: i64)
        -> AppResult<Vec<PostView>>;

    // Comments
    async fn create_comment(&self, post_id: PostId, author_id: UserId, text: &str)
        -> AppResult<Comment>;
    /// Oldest first
    async fn list_comments(&self, post_id: PostId) -> AppResult<Vec<CommentView>>;

    // Follow edges
    async fn follow_exists(&self, user_id: UserId, author_id: UserId) -> AppResult<bool>;
    /// Returns true when a new edge was written
    async fn create_follow(&self, user_id: UserId, author_id: UserId) -> AppResult<bool>;
    /// Returns true when an edge was removed
    async fn delete_follow(&self, user_id: UserId, author_id: UserId) -> AppResult<bool>;
    async fn count_followers(&self, author_id: UserId) -> AppResult<i64>;
    async fn count_following(&self, user_id: UserId) -> AppResult<i64>;
}

const POST_VIEW_SELECT: &str = "SELECT p.id AS id, p.text AS text, p.pub_date AS pub_date, \
     p.author_id AS author_id, p.group_id AS group_id, p.image AS image, \
     u.username AS author, g.slug AS group_slug, g.title AS group_title, \
     (SELECT COUNT(*) FROM comments c WHERE c.post_id = p.id) AS comment_count \
     FROM posts p \
     JOIN users u ON u.id = p.author_id \
     LEFT JOIN post_groups g ON g.id = p.group_id";

/// SQLite-backed entity store
pub struct SqliteStore {
    pub pool: SqlitePool,
}

impl SqliteStore {
    pub async fn new(database_url: &str) -> AppResult<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| AppError::ConfigurationError(format!("Invalid DATABASE_URL: {}", e)))?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePool::connect_with(options).await?;

        let store = Self { pool };
        store.init().await?;
        Ok(store)
    }

    /// Private in-memory database. A single long-lived connection keeps the data alive.
    pub async fn new_in_memory() -> AppResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| AppError::ConfigurationError(e.to_string()))?
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.init().await?;
        Ok(store)
    }

    pub async fn init(&self) -> AppResult<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username TEXT NOT NULL UNIQUE,
                full_name TEXT NOT NULL DEFAULT '',
                created INTEGER NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS post_groups (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL,
                slug TEXT NOT NULL UNIQUE,
                description TEXT NOT NULL DEFAULT ''
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS posts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                text TEXT NOT NULL CHECK (length(trim(text)) > 0),
                pub_date INTEGER NOT NULL,
                author_id INTEGER NOT NULL REFERENCES users(id),
                group_id INTEGER REFERENCES post_groups(id) ON DELETE SET NULL,
                image TEXT
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS comments (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                post_id INTEGER NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
                author_id INTEGER NOT NULL REFERENCES users(id),
                text TEXT NOT NULL,
                created INTEGER NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS follows (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL REFERENCES users(id),
                author_id INTEGER NOT NULL REFERENCES users(id),
                created INTEGER NOT NULL,
                UNIQUE(user_id, author_id),
                CHECK (user_id <> author_id)
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_posts_pub_date ON posts(pub_date DESC, id DESC)")
            .execute(&self.pool)
            .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_posts_author ON posts(author_id, pub_date DESC)")
            .execute(&self.pool)
            .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_posts_group ON posts(group_id, pub_date DESC)")
            .execute(&self.pool)
            .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_comments_post ON comments(post_id, created)")
            .execute(&self.pool)
            .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_follows_author ON follows(author_id)")
            .execute(&self.pool)
            .await?;

        info!("Entity store schema ready");
        Ok(())
    }

    fn user_from_row(row: &SqliteRow) -> User {
        User {
            id: row.get("id"),
            username: row.get("username"),
            full_name: row.get("full_name"),
            created: from_millis(row.get("created")),
        }
    }

    fn group_from_row(row: &SqliteRow) -> Group {
        Group {
            id: row.get("id"),
            title: row.get("title"),
            slug: row.get("slug"),
            description: row.get("description"),
        }
    }

    fn post_from_row(row: &SqliteRow) -> Post {
        Post {
            id: row.get("id"),
            text: row.get("text"),
            pub_date: from_millis(row.get("pub_date")),
            author_id: row.get("author_id"),
            group_id: row.get("group_id"),
            image: row.get("image"),
        }
    }

    fn post_view_from_row(row: &SqliteRow) -> PostView {
        let group_slug: Option<String> = row.get("group_slug");
        let group_title: Option<String> = row.get("group_title");
        PostView {
            post: Self::post_from_row(row),
            author: row.get("author"),
            group: group_slug
                .zip(group_title)
                .map(|(slug, title)| GroupRef { slug, title }),
            comment_count: row.get("comment_count"),
        }
    }

    fn push_filter(builder: &mut QueryBuilder<'_, Sqlite>, filter: PostFilter) {
        match filter {
            PostFilter::All => {}
            PostFilter::Group(group_id) => {
                builder.push(" WHERE p.group_id = ").push_bind(group_id);
            }
            PostFilter::Author(author_id) => {
                builder.push(" WHERE p.author_id = ").push_bind(author_id);
            }
            PostFilter::FollowedBy(user_id) => {
                builder
                    .push(" WHERE p.author_id IN (SELECT author_id FROM follows WHERE user_id = ")
                    .push_bind(user_id)
                    .push(")");
            }
        }
    }
}

#[async_trait]
impl EntityStore for SqliteStore {
    async fn create_user(&self, username: &str, full_name: &str) -> AppResult<User> {
        validate_username(username)?;
        let now = Utc::now().timestamp_millis();
        let result = sqlx::query("INSERT INTO users (username, full_name, created) VALUES (?, ?, ?)")
            .bind(username)
            .bind(full_name)
            .bind(now)
            .execute(&self.pool)
            .await?;

        Ok(User {
            id: result.last_insert_rowid(),
            username: username.to_string(),
            full_name: full_name.to_string(),
            created: from_millis(now),
        })
    }

    async fn get_user_by_username(&self, username: &str) -> AppResult<Option<User>> {
        let row = sqlx::query("SELECT id, username, full_name, created FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(Self::user_from_row))
    }

    async fn create_group(&self, title: &str, slug: &str, description: &str) -> AppResult<Group> {
        validate_slug(slug)?;
        let result = sqlx::query("INSERT INTO post_groups (title, slug, description) VALUES (?, ?, ?)")
            .bind(title)
            .bind(slug)
            .bind(description)
            .execute(&self.pool)
            .await?;

        Ok(Group {
            id: result.last_insert_rowid(),
            title: title.to_string(),
            slug: slug.to_string(),
            description: description.to_string(),
        })
    }

    async fn get_group(&self, id: GroupId) -> AppResult<Option<Group>> {
        let row = sqlx::query("SELECT id, title, slug, description FROM post_groups WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(Self::group_from_row))
    }

    async fn get_group_by_slug(&self, slug: &str) -> AppResult<Option<Group>> {
        let row = sqlx::query("SELECT id, title, slug, description FROM post_groups WHERE slug = ?")
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(Self::group_from_row))
    }

    async fn list_groups(&self) -> AppResult<Vec<Group>> {
        let rows = sqlx::query("SELECT id, title, slug, description FROM post_groups ORDER BY title")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(Self::group_from_row).collect())
    }

    async fn create_post(&self, post: NewPost) -> AppResult<Post> {
        let now = Utc::now().timestamp_millis();
        let result = sqlx::query(
            "INSERT INTO posts (text, pub_date, author_id, group_id, image) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&post.text)
        .bind(now)
        .bind(post.author_id)
        .bind(post.group_id)
        .bind(&post.image)
        .execute(&self.pool)
        .await?;

        Ok(Post {
            id: result.last_insert_rowid(),
            text: post.text,
            pub_date: from_millis(now),
            author_id: post.author_id,
            group_id: post.group_id,
            image: post.image,
        })
    }

    async fn get_post(&self, id: PostId) -> AppResult<Option<Post>> {
        let row = sqlx::query(
            "SELECT id, text, pub_date, author_id, group_id, image FROM posts WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(Self::post_from_row))
    }

    async fn get_post_view(&self, id: PostId) -> AppResult<Option<PostView>> {
        let mut builder = QueryBuilder::<Sqlite>::new(POST_VIEW_SELECT);
        builder.push(" WHERE p.id = ").push_bind(id);
        let row = builder.build().fetch_optional(&self.pool).await?;
        Ok(row.as_ref().map(Self::post_view_from_row))
    }

    async fn update_post(&self, post: &Post) -> AppResult<()> {
        let result = sqlx::query("UPDATE posts SET text = ?, group_id = ?, image = ? WHERE id = ?")
            .bind(&post.text)
            .bind(post.group_id)
            .bind(&post.image)
            .bind(post.id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Post {} not found", post.id)));
        }
        Ok(())
    }

    async fn count_posts(&self, filter: PostFilter) -> AppResult<i64> {
        let mut builder = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM posts p");
        Self::push_filter(&mut builder, filter);
        let row = builder.build().fetch_one(&self.pool).await?;
        Ok(row.get::<i64, _>(0))
    }

    async fn list_posts(
        &self,
        filter: PostFilter,
        limit: i64,
        offset: i64,
    ) -> AppResult<Vec<PostView>> {
        let mut builder = QueryBuilder::<Sqlite>::new(POST_VIEW_SELECT);
        Self::push_filter(&mut builder, filter);
        builder
            .push(" ORDER BY p.pub_date DESC, p.id DESC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);

        let rows = builder.build().fetch_all(&self.pool).await?;
        Ok(rows.iter().map(Self::post_view_from_row).collect())
    }

    async fn create_comment(
        &self,
        post_id: PostId,
        author_id: UserId,
        text: &str,
    ) -> AppResult<Comment> {
        let now = Utc::now().timestamp_millis();
        let result = sqlx::query(
            "INSERT INTO comments (post_id, author_id, text, created) VALUES (?, ?, ?, ?)",
        )
        .bind(post_id)
        .bind(author_id)
        .bind(text)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(Comment {
            id: result.last_insert_rowid(),
            post_id,
            author_id,
            text: text.to_string(),
            created: from_millis(now),
        })
    }

    async fn list_comments(&self, post_id: PostId) -> AppResult<Vec<CommentView>> {
        let rows = sqlx::query(
            "SELECT c.id AS id, c.post_id AS post_id, c.author_id AS author_id, c.text AS text, \
             c.created AS created, u.username AS author \
             FROM comments c JOIN users u ON u.id = c.author_id \
             WHERE c.post_id = ? ORDER BY c.created ASC, c.id ASC",
        )
        .bind(post_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| CommentView {
                comment: Comment {
                    id: row.get("id"),
                    post_id: row.get("post_id"),
                    author_id: row.get("author_id"),
                    text: row.get("text"),
                    created: from_millis(row.get("created")),
                },
                author: row.get("author"),
            })
            .collect())
    }

    async fn follow_exists(&self, user_id: UserId, author_id: UserId) -> AppResult<bool> {
        let row = sqlx::query("SELECT 1 FROM follows WHERE user_id = ? AND author_id = ?")
            .bind(user_id)
            .bind(author_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    async fn create_follow(&self, user_id: UserId, author_id: UserId) -> AppResult<bool> {
        // Unique and self-follow constraints turn duplicates into no-ops
        let result = sqlx::query(
            "INSERT OR IGNORE INTO follows (user_id, author_id, created) VALUES (?, ?, ?)",
        )
        .bind(user_id)
        .bind(author_id)
        .bind(Utc::now().timestamp_millis())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_follow(&self, user_id: UserId, author_id: UserId) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM follows WHERE user_id = ? AND author_id = ?")
            .bind(user_id)
            .bind(author_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn count_followers(&self, author_id: UserId) -> AppResult<i64> {
        let row = sqlx::query("SELECT COUNT(*) FROM follows WHERE author_id = ?")
            .bind(author_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get::<i64, _>(0))
    }

    async fn count_following(&self, user_id: UserId) -> AppResult<i64> {
        let row = sqlx::query("SELECT COUNT(*) FROM follows WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get::<i64, _>(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store_with_users() -> (SqliteStore, User, User) {
        let store = SqliteStore::new_in_memory().await.unwrap();
        let vasya = store.create_user("Vasya", "").await.unwrap();
        let petya = store.create_user("Petya", "").await.unwrap();
        (store, vasya, petya)
    }

    #[tokio::test]
    async fn test_listing_is_newest_first_with_prefetched_relations() {
        let (store, vasya, _) = store_with_users().await;
        let cats = store.create_group("Cats", "cats", "fluffy").await.unwrap();

        let first = store
            .create_post(NewPost {
                author_id: vasya.id,
                text: "first".into(),
                group_id: Some(cats.id),
                image: None,
            })
            .await
            .unwrap();
        let second = store
            .create_post(NewPost {
                author_id: vasya.id,
                text: "second".into(),
                group_id: None,
                image: None,
            })
            .await
            .unwrap();
        store.create_comment(first.id, vasya.id, "nice").await.unwrap();

        let posts = store.list_posts(PostFilter::All, 10, 0).await.unwrap();
        assert_eq!(posts.len(), 2);
        assert_eq!(posts[0].post.id, second.id);
        assert_eq!(posts[1].post.id, first.id);
        assert_eq!(posts[1].author, "Vasya");
        assert_eq!(posts[1].group.as_ref().unwrap().slug, "cats");
        assert_eq!(posts[1].comment_count, 1);

        assert_eq!(store.count_posts(PostFilter::Group(cats.id)).await.unwrap(), 1);
        assert_eq!(store.count_posts(PostFilter::Author(vasya.id)).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_follow_constraints() {
        let (store, vasya, petya) = store_with_users().await;

        assert!(store.create_follow(vasya.id, petya.id).await.unwrap());
        assert!(!store.create_follow(vasya.id, petya.id).await.unwrap());
        assert!(!store.create_follow(vasya.id, vasya.id).await.unwrap());
        assert_eq!(store.count_followers(petya.id).await.unwrap(), 1);
        assert_eq!(store.count_following(vasya.id).await.unwrap(), 1);

        assert!(store.delete_follow(vasya.id, petya.id).await.unwrap());
        assert!(!store.delete_follow(vasya.id, petya.id).await.unwrap());
        assert!(!store.follow_exists(vasya.id, petya.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_invalid_username_and_slug_rejected() {
        let (store, _, _) = store_with_users().await;

        let user = store.create_user("two words", "").await;
        assert!(matches!(user, Err(AppError::FieldError { ref field, .. }) if field == "username"));
        assert!(store.get_user_by_username("two words").await.unwrap().is_none());

        let group = store.create_group("Dogs", "dogs/cats", "").await;
        assert!(matches!(group, Err(AppError::FieldError { ref field, .. }) if field == "slug"));
        assert!(store.list_groups().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_text_rejected_by_schema() {
        let (store, vasya, _) = store_with_users().await;
        let result = store
            .create_post(NewPost {
                author_id: vasya.id,
                text: "   ".into(),
                group_id: None,
                image: None,
            })
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_update_missing_post() {
        let (store, vasya, _) = store_with_users().await;
        let ghost = Post {
            id: 999,
            text: "nothing".into(),
            pub_date: Utc::now(),
            author_id: vasya.id,
            group_id: None,
            image: None,
        };
        assert!(matches!(store.update_post(&ghost).await, Err(AppError::NotFound(_))));
    }
}
