//! Cookie sessions and the request extractor that enforces them.

use axum::{async_trait, extract::FromRequestParts, http::header, http::request::Parts};

use crate::db::models::Role;
use crate::error::ApiError;
use crate::state::AppState;

pub mod password;
pub mod session;

use session::session_id_from_cookie_header;

/// The user behind the request's session cookie. Extracting it rejects
/// anonymous requests with 401.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub session_id: String,
    pub user_id: i32,
    pub role: Role,
    pub name: String,
}

impl CurrentUser {
    pub fn require_admin(&self) -> Result<(), ApiError> {
        if self.role == Role::Admin {
            Ok(())
        } else {
            log::warn!("User {} ({}) denied admin route", self.user_id, self.role);
            Err(ApiError::Forbidden("Forbidden".to_string()))
        }
    }
}

pub(crate) fn session_id(parts: &Parts) -> Option<String> {
    parts
        .headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find_map(session_id_from_cookie_header)
        .map(str::to_string)
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let session_id =
            session_id(parts).ok_or_else(|| ApiError::Unauthorized("Unauthorized".to_string()))?;
        let session = state
            .sessions
            .get(&session_id)
            .ok_or_else(|| ApiError::Unauthorized("Unauthorized".to_string()))?;

        Ok(CurrentUser {
            session_id,
            user_id: session.user_id,
            role: session.role,
            name: session.name,
        })
    }
}
