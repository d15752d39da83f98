// Blog HTTP interface - routes requests to the feed, graph and post services.
// Responses carry the page context as JSON; mutations answer with redirects.

use axum::{
    extract::{rejection::JsonRejection, FromRequestParts, Path, Query, State},
    http::{header, request::Parts, StatusCode, Uri},
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower_http::{services::ServeDir, trace::TraceLayer};

use crate::{
    app_state::AppState,
    error::{AppError, AppResult},
    infrastructure::middleware::{viewer_context_middleware, Vc},
    models::{CommentForm, Group, PostForm, PostId},
    services::{can_edit, profile_view, EditOutcome, Feed, PostDetail, ProfileView},
};

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct GroupFeed {
    pub group: Group,
    #[serde(flatten)]
    pub feed: Feed,
}

/// `/{username}/{post_id}/...` segments. A post id that is not a number names no post.
#[derive(Debug)]
pub struct PostPath {
    pub username: String,
    pub post_id: PostId,
}

impl<S> FromRequestParts<S> for PostPath
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let segments = Path::<(String, PostId)>::from_request_parts(parts, state).await;
        match segments {
            Ok(Path((username, post_id))) => Ok(Self { username, post_id }),
            Err(_) => Err(AppError::NotFound(format!("No post at {}", parts.uri.path()))),
        }
    }
}

/// Unwrap a JSON form once the caller has passed the login and permission checks
fn form_body<T>(body: Result<Json<T>, JsonRejection>) -> AppResult<T> {
    body.map(|Json(form)| form)
        .map_err(|rejection| AppError::BadRequest(rejection.body_text()))
}

/// 302 redirect, the status used for every post-mutation hop
fn found(location: impl Into<String>) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.into())]).into_response()
}

fn profile_url(username: &str) -> String {
    format!("/{}/", username)
}

fn post_url(username: &str, post_id: PostId) -> String {
    format!("/{}/{}/", username, post_id)
}

// HTTP Handlers

pub async fn index_handler(
    State(app): State<AppState>,
    Query(query): Query<PageQuery>,
) -> AppResult<Json<Feed>> {
    Ok(Json(app.feeds.index(query.page.as_deref()).await?))
}

pub async fn group_posts_handler(
    State(app): State<AppState>,
    Path(slug): Path<String>,
    Query(query): Query<PageQuery>,
) -> AppResult<Json<GroupFeed>> {
    let (group, feed) = app.feeds.group(&slug, query.page.as_deref()).await?;
    Ok(Json(GroupFeed { group, feed }))
}

pub async fn new_post_form_handler(
    State(app): State<AppState>,
    vc: Vc,
    uri: Uri,
) -> AppResult<Json<Value>> {
    vc.require_login(&app.config.auth.login_url, uri.path())?;
    let groups = app.posts.groups().await?;
    Ok(Json(json!({ "groups": groups })))
}

pub async fn new_post_handler(
    State(app): State<AppState>,
    vc: Vc,
    uri: Uri,
    body: Result<Json<PostForm>, JsonRejection>,
) -> AppResult<Response> {
    let author = vc.require_login(&app.config.auth.login_url, uri.path())?;
    app.posts.create_post(author, form_body(body)?).await?;
    Ok(found("/"))
}

pub async fn profile_handler(
    State(app): State<AppState>,
    vc: Vc,
    Path(username): Path<String>,
    Query(query): Query<PageQuery>,
) -> AppResult<Json<ProfileView>> {
    let view = profile_view(
        &app.posts,
        &app.feeds,
        &app.graph,
        &vc,
        &username,
        query.page.as_deref(),
    )
    .await?;
    Ok(Json(view))
}

pub async fn post_view_handler(
    State(app): State<AppState>,
    PostPath { username, post_id }: PostPath,
) -> AppResult<Json<PostDetail>> {
    Ok(Json(app.posts.detail(&username, post_id).await?))
}

pub async fn post_edit_form_handler(
    State(app): State<AppState>,
    vc: Vc,
    uri: Uri,
    PostPath { username, post_id }: PostPath,
) -> AppResult<Response> {
    vc.require_login(&app.config.auth.login_url, uri.path())?;
    let (_, post) = app.posts.get_authored_post(&username, post_id).await?;
    if !can_edit(&vc, &post) {
        return Ok(found(post_url(&username, post_id)));
    }

    let groups = app.posts.groups().await?;
    Ok(Json(json!({ "post": post, "groups": groups })).into_response())
}

pub async fn post_edit_handler(
    State(app): State<AppState>,
    vc: Vc,
    uri: Uri,
    PostPath { username, post_id }: PostPath,
    body: Result<Json<PostForm>, JsonRejection>,
) -> AppResult<Response> {
    vc.require_login(&app.config.auth.login_url, uri.path())?;
    let (_, post) = app.posts.get_authored_post(&username, post_id).await?;
    if !can_edit(&vc, &post) {
        return Ok(found(post_url(&username, post_id)));
    }

    match app.posts.edit_post(&vc, &username, post_id, form_body(body)?).await? {
        EditOutcome::Saved(_) | EditOutcome::Denied => Ok(found(post_url(&username, post_id))),
    }
}

pub async fn comment_redirect_handler(
    State(app): State<AppState>,
    vc: Vc,
    uri: Uri,
    PostPath { username, post_id }: PostPath,
) -> AppResult<Response> {
    vc.require_login(&app.config.auth.login_url, uri.path())?;
    Ok(found(post_url(&username, post_id)))
}

pub async fn add_comment_handler(
    State(app): State<AppState>,
    vc: Vc,
    uri: Uri,
    PostPath { username, post_id }: PostPath,
    body: Result<Json<CommentForm>, JsonRejection>,
) -> AppResult<Response> {
    let author = vc.require_login(&app.config.auth.login_url, uri.path())?;
    app.posts.add_comment(author, &username, post_id, form_body(body)?).await?;
    Ok(found(post_url(&username, post_id)))
}

pub async fn follow_index_handler(
    State(app): State<AppState>,
    vc: Vc,
    uri: Uri,
    Query(query): Query<PageQuery>,
) -> AppResult<Json<Feed>> {
    let user = vc.require_login(&app.config.auth.login_url, uri.path())?;
    Ok(Json(app.feeds.following(user.id, query.page.as_deref()).await?))
}

pub async fn profile_follow_handler(
    State(app): State<AppState>,
    vc: Vc,
    uri: Uri,
    Path(username): Path<String>,
) -> AppResult<Response> {
    let user = vc.require_login(&app.config.auth.login_url, uri.path())?;
    let author = app.posts.get_author(&username).await?;
    app.graph.follow(user.id, author.id).await?;
    Ok(found(profile_url(&author.username)))
}

pub async fn profile_unfollow_handler(
    State(app): State<AppState>,
    vc: Vc,
    uri: Uri,
    Path(username): Path<String>,
) -> AppResult<Response> {
    let user = vc.require_login(&app.config.auth.login_url, uri.path())?;
    let author = app.posts.get_author(&username).await?;
    app.graph.unfollow(user.id, author.id).await?;
    Ok(found(profile_url(&author.username)))
}

pub async fn page_not_found_handler(uri: Uri) -> Response {
    let body = Json(json!({
        "error": "Page not found",
        "path": uri.path(),
        "status": StatusCode::NOT_FOUND.as_u16()
    }));
    (StatusCode::NOT_FOUND, body).into_response()
}

pub fn create_blog_router(state: AppState) -> Router {
    let media = ServeDir::new(&state.config.media.root);

    Router::new()
        // Feeds
        .route("/", get(index_handler))
        .route("/follow/", get(follow_index_handler))
        .route("/group/{slug}/", get(group_posts_handler))

        // Authoring
        .route("/new", get(new_post_form_handler).post(new_post_handler))

        // Profiles and the social graph
        .route("/{username}/", get(profile_handler))
        .route("/{username}/follow", get(profile_follow_handler).post(profile_follow_handler))
        .route("/{username}/unfollow", get(profile_unfollow_handler).post(profile_unfollow_handler))

        // Single posts
        .route("/{username}/{post_id}/", get(post_view_handler))
        .route("/{username}/{post_id}/edit/", get(post_edit_form_handler).post(post_edit_handler))
        .route("/{username}/{post_id}/comment/", get(comment_redirect_handler).post(add_comment_handler))

        .nest_service("/media", media)
        .fallback(page_not_found_handler)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            viewer_context_middleware::<AppState>,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
