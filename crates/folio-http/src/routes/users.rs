//! `/api/users`: login, profile and admin user management

use super::{hash_password, verify_password};
use crate::error::{HttpError, HttpResult};
use crate::extract::{AdminUser, AuthUser, JsonBody};
use crate::response::ApiResponse;
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::Router;
use folio_auth::AuthError;
use folio_orm::{validate_password, NewUser, Role, User, UserChanges};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::info;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/login", post(login))
        .route("/profile", get(profile))
        .route("/", get(list_users).post(create_user))
        .route("/:id", put(update_user).delete(delete_user))
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user: User,
    pub token: String,
}

async fn login(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<LoginRequest>,
) -> HttpResult<ApiResponse<LoginResponse>> {
    let (Some(username), Some(password)) = (
        body.username.filter(|u| !u.is_empty()),
        body.password.filter(|p| !p.is_empty()),
    ) else {
        return Err(HttpError::bad_request("Please provide a username and password"));
    };

    let user = state
        .db
        .users
        .find_by_username(&username)
        .await?
        .ok_or(AuthError::InvalidCredentials)?;

    if !verify_password(&state, password, user.password_hash.clone()).await? {
        return Err(AuthError::InvalidCredentials.into());
    }
    if !user.status {
        return Err(AuthError::UserDisabled.into());
    }

    let token = state.jwt.issue(&user)?;
    info!(user = %user.username, "User logged in");

    Ok(ApiResponse::with_message("Login successful", LoginResponse { user, token }))
}

async fn profile(State(state): State<AppState>, AuthUser(claims): AuthUser) -> HttpResult<ApiResponse<User>> {
    let user = state
        .db
        .users
        .find_by_id(claims.id)
        .await?
        .ok_or_else(|| HttpError::not_found("User not found"))?;
    Ok(ApiResponse::ok(user))
}

async fn list_users(State(state): State<AppState>, _admin: AdminUser) -> HttpResult<ApiResponse<Vec<User>>> {
    Ok(ApiResponse::ok(state.db.users.list().await?))
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub username: Option<String>,
    pub password: Option<String>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub status: Option<bool>,
}

async fn create_user(
    State(state): State<AppState>,
    _admin: AdminUser,
    JsonBody(body): JsonBody<CreateUserRequest>,
) -> HttpResult<(StatusCode, ApiResponse<User>)> {
    let (Some(username), Some(password), Some(email)) = (body.username, body.password, body.email) else {
        return Err(HttpError::bad_request("Username, password and email are required"));
    };

    validate_password(&password)?;
    let role = body.role.as_deref().map(Role::from_str).transpose()?.unwrap_or_default();

    let new_user = NewUser {
        username: username.trim().to_string(),
        email: email.trim().to_string(),
        password_hash: String::new(),
        role,
        status: body.status.unwrap_or(true),
    };
    new_user.validate()?;

    let new_user = NewUser {
        password_hash: hash_password(&state, password).await?,
        ..new_user
    };
    let user = state.db.users.create(new_user).await?;
    info!(user = %user.username, role = %user.role, "User created");

    Ok(ApiResponse::with_message("User created", user).created())
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
    pub status: Option<bool>,
}

async fn update_user(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<i64>,
    JsonBody(body): JsonBody<UpdateUserRequest>,
) -> HttpResult<ApiResponse<User>> {
    let mut changes = UserChanges {
        username: body.username.map(|u| u.trim().to_string()),
        email: body.email.map(|e| e.trim().to_string()),
        password_hash: None,
        role: body.role.as_deref().map(Role::from_str).transpose()?,
        status: body.status,
    };
    changes.validate()?;

    if let Some(password) = body.password.filter(|p| !p.is_empty()) {
        validate_password(&password)?;
        changes.password_hash = Some(hash_password(&state, password).await?);
    }

    let user = state
        .db
        .users
        .update(id, changes)
        .await?
        .ok_or_else(|| HttpError::not_found("User not found"))?;
    info!(user = %user.username, "User updated");

    Ok(ApiResponse::with_message("User updated", user))
}

async fn delete_user(
    State(state): State<AppState>,
    AdminUser(claims): AdminUser,
    Path(id): Path<i64>,
) -> HttpResult<ApiResponse<()>> {
    if id == claims.id {
        return Err(HttpError::bad_request("You cannot delete your own account"));
    }

    let user = state
        .db
        .users
        .delete(id)
        .await?
        .ok_or_else(|| HttpError::not_found("User not found"))?;
    info!(user = %user.username, "User deleted");

    Ok(ApiResponse::message("User deleted"))
}
