use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use kblog_core::{Registration, RoleId, UserId};

use crate::dto::*;
use crate::error::AppError;
use crate::state::AppState;

pub async fn create_user(
    State(state): State<AppState>,
    Json(body): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserResponse>), AppError> {
    require_non_empty("username", &body.username)?;
    require_non_empty("email", &body.email)?;
    require_non_empty("password", &body.password)?;

    let user = state
        .accounts
        .create_user(
            Registration {
                username: body.username.trim().to_string(),
                email: body.email.trim().to_string(),
                password: body.password,
            },
            body.role_id,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(user.into())))
}

pub async fn update_user_roles(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
    Json(body): Json<UpdateUserRolesRequest>,
) -> Result<Json<UserResponse>, AppError> {
    if body.role_ids.is_empty() {
        return Err(AppError::BadRequest("role_ids must not be empty".to_string()));
    }
    let user = state
        .accounts
        .update_user_roles(user_id, &body.role_ids)
        .await?;
    Ok(Json(user.into()))
}

pub async fn update_role_permissions(
    State(state): State<AppState>,
    Path(role_id): Path<RoleId>,
    Json(body): Json<UpdateRolePermissionsRequest>,
) -> Result<Json<RolePermissionsResponse>, AppError> {
    let update = state
        .accounts
        .update_role_permissions(role_id, &body.permission_ids)
        .await?;
    Ok(Json(RolePermissionsResponse {
        affected_users: update.member_ids.len(),
        role: update.role,
    }))
}

pub async fn delete_user(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
) -> Result<StatusCode, AppError> {
    state.accounts.delete_user(user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
