use axum::{
    extract::{Json, State},
    http::header,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::json;

use crate::auth::password::verify_password;
use crate::auth::session::expired_session_cookie;
use crate::auth::CurrentUser;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> ApiResult<impl IntoResponse> {
    let (username, password) = match (request.username, request.password) {
        (Some(u), Some(p)) if !u.trim().is_empty() && !p.is_empty() => (u, p),
        _ => return Err(ApiError::validation("Username and password are required")),
    };

    let user = state.storage.get_user_by_username(username.trim()).await?;
    let user = match user {
        Some(user) if verify_password(&password, &user.password_hash) => user,
        _ => {
            log::warn!("Failed login for {}", username);
            return Err(ApiError::Unauthorized("Invalid credentials".to_string()));
        }
    };

    let session_id = state.sessions.create(&user);
    log::info!("User {} ({}) logged in", user.username, user.role);
    Ok((
        [(header::SET_COOKIE, state.sessions.session_cookie(&session_id))],
        Json(user),
    ))
}

async fn logout(State(state): State<AppState>, user: Option<CurrentUser>) -> impl IntoResponse {
    if let Some(user) = user {
        state.sessions.destroy(&user.session_id);
        log::info!("User {} logged out", user.user_id);
    }
    (
        [(header::SET_COOKIE, expired_session_cookie())],
        Json(json!({ "message": "Logged out successfully" })),
    )
}

async fn me(
    State(state): State<AppState>,
    user: Option<CurrentUser>,
) -> ApiResult<impl IntoResponse> {
    let user = user.ok_or_else(|| ApiError::Unauthorized("Not authenticated".to_string()))?;
    let user = state
        .storage
        .get_user(user.user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    Ok(Json(user))
}

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/me", get(me))
}
