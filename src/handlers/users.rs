use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Router,
};
use serde::Deserialize;

use super::require_text;
use crate::auth::password::hash_password;
use crate::auth::CurrentUser;
use crate::db::models::{NewUser, Role};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

const MIN_PASSWORD_LEN: usize = 6;

#[derive(Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub password: String,
    pub name: String,
    #[serde(default)]
    pub role: Role,
}

async fn list_users(
    State(state): State<AppState>,
    user: CurrentUser,
) -> ApiResult<impl IntoResponse> {
    user.require_admin()?;
    let users = state.storage.list_users().await?;
    Ok(Json(users))
}

async fn create_user(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<CreateUserRequest>,
) -> ApiResult<impl IntoResponse> {
    user.require_admin()?;
    require_text(&request.username, "Username")?;
    require_text(&request.name, "Name")?;
    if request.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::validation(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }

    let created = state
        .storage
        .create_user(NewUser {
            username: request.username.trim().to_string(),
            password_hash: hash_password(&request.password)?,
            name: request.name.trim().to_string(),
            role: request.role,
        })
        .await?;
    log::info!(
        "User {} ({}) created by {}",
        created.username,
        created.role,
        user.user_id
    );
    Ok((StatusCode::CREATED, Json(created)))
}

pub fn user_routes() -> Router<AppState> {
    Router::new().route("/", get(list_users).post(create_user))
}
