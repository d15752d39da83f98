// ViewerContext middleware - resolves the acting identity once per request
// and injects it into request extensions for handlers

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    error::AppResult,
    infrastructure::{database::EntityStore, viewer::ViewerContext},
};

/// Application state that can resolve viewers
pub trait HasViewerSource {
    fn entity_store(&self) -> &Arc<dyn EntityStore>;
    /// Lower-case name of the header carrying the authenticated username
    fn user_header(&self) -> &str;
}

pub async fn viewer_context_middleware<T>(
    State(app_state): State<T>,
    mut request: Request,
    next: Next,
) -> AppResult<Response>
where
    T: HasViewerSource + Clone + Send + Sync + 'static,
{
    let username = extract_username(request.headers(), app_state.user_header());
    let viewer_context = create_viewer_context(username, app_state.entity_store().as_ref()).await?;

    request.extensions_mut().insert(Arc::new(viewer_context));

    Ok(next.run(request).await)
}

/// Username asserted by the upstream authentication service, if any
fn extract_username(headers: &HeaderMap, header_name: &str) -> Option<String> {
    headers
        .get(header_name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

async fn create_viewer_context(
    username: Option<String>,
    store: &dyn EntityStore,
) -> AppResult<ViewerContext> {
    let request_id = format!("req-{}", Uuid::new_v4());

    let Some(username) = username else {
        return Ok(ViewerContext::anonymous(request_id));
    };

    match store.get_user_by_username(&username).await? {
        Some(user) => {
            debug!(request_id = %request_id, user = %user.username, "authenticated viewer");
            Ok(ViewerContext::authenticated_user(user, request_id))
        }
        None => {
            warn!("Authenticated username {} has no account, treating as anonymous", username);
            Ok(ViewerContext::anonymous(request_id))
        }
    }
}
