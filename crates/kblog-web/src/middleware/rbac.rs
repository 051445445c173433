use axum::extract::{OriginalUri, Request, State};
use axum::middleware::Next;
use axum::response::Response;
use kblog_core::{AuthError, TokenError};

use crate::auth::middleware::AuthUser;
use crate::error::AppError;
use crate::state::AppState;

const API_PREFIX: &str = "/api";

/// Path as stored in the permission table: the request path without `/api`.
fn permission_path(request: &Request) -> String {
    let path = request
        .extensions()
        .get::<OriginalUri>()
        .map(|u| u.0.path())
        .unwrap_or_else(|| request.uri().path());

    match path.strip_prefix(API_PREFIX) {
        Some(rest) if rest.is_empty() => "/".to_string(),
        Some(rest) if rest.starts_with('/') => rest.to_string(),
        _ => path.to_string(),
    }
}

/// Requires one of the caller's permissions to cover this method and path.
/// Must run inside [`require_auth`](crate::auth::middleware::require_auth).
pub async fn require_permission(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let user_id = request
        .extensions()
        .get::<AuthUser>()
        .map(|u| u.claims.user_id)
        .ok_or(AppError::Auth(AuthError::Token(TokenError::Missing)))?;
    let method = request.method().as_str().to_string();
    let path = permission_path(&request);

    match state.permissions.check(user_id, &method, &path).await {
        Ok(()) => Ok(next.run(request).await),
        // The token outlived its user.
        Err(AuthError::NotFound(_)) => Err(AppError::Auth(AuthError::Forbidden { method, path })),
        Err(e) => Err(e.into()),
    }
}
