use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use kblog_core::{LoginIdentifier, Registration};

use crate::auth::middleware::{refresh_token_header, AuthUser, RefreshToken};
use crate::dto::*;
use crate::error::AppError;
use crate::state::AppState;

pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<UserResponse>), AppError> {
    require_non_empty("username", &body.username)?;
    require_non_empty("email", &body.email)?;
    require_non_empty("password", &body.password)?;

    let user = state
        .accounts
        .register(Registration {
            username: body.username.trim().to_string(),
            email: body.email.trim().to_string(),
            password: body.password,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(user.into())))
}

pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    require_non_empty("username", &body.username)?;

    let identifier = LoginIdentifier::parse(&body.username);
    let session = state.accounts.login(&identifier, &body.password).await?;

    Ok(Json(TokenResponse::new(
        session.tokens,
        state.config.auth.jwt.access_ttl_secs,
        Some(session.user),
    )))
}

pub async fn refresh(
    State(state): State<AppState>,
    RefreshToken(token): RefreshToken,
) -> Result<Json<TokenResponse>, AppError> {
    let tokens = state.accounts.refresh(&token).await?;
    Ok(Json(TokenResponse::new(
        tokens,
        state.config.auth.jwt.access_ttl_secs,
        None,
    )))
}

/// Revokes the bearer token, plus the `Refresh-Token` header value when present.
pub async fn logout(
    user: AuthUser,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, AppError> {
    state
        .accounts
        .logout(&user.claims, refresh_token_header(&headers))
        .await?;
    Ok(Json(serde_json::json!({ "success": true })))
}

pub async fn my_permissions(
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<PermissionsResponse>, AppError> {
    let permissions = state
        .permissions
        .effective_permissions(user.claims.user_id)
        .await?;
    Ok(Json(PermissionsResponse {
        user_id: user.claims.user_id,
        permissions,
    }))
}

pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
