use crate::error::{AppError, AppResult};
use crate::models::{User, UserId};

/// The identity acting on a request, as supplied by the authentication service
#[derive(Debug, Clone, Default)]
pub struct ViewerContext {
    pub user: Option<User>,
    pub request_id: String,
}

impl ViewerContext {
    pub fn anonymous(request_id: String) -> Self {
        ViewerContext {
            user: None,
            request_id,
        }
    }

    pub fn authenticated_user(user: User, request_id: String) -> Self {
        ViewerContext {
            user: Some(user),
            request_id,
        }
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.user.as_ref().map(|u| u.id)
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    /// The acting user, or a redirect to the login entry point that returns to `next`
    pub fn require_login(&self, login_url: &str, next: &str) -> AppResult<&User> {
        self.user.as_ref().ok_or_else(|| AppError::LoginRequired {
            location: format!("{}?next={}", login_url, next),
        })
    }
}
