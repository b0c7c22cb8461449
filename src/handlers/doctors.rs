use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Router,
};

use super::{parse_id, require_text};
use crate::auth::CurrentUser;
use crate::db::models::NewDoctor;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

async fn list_doctors(
    State(state): State<AppState>,
    _user: CurrentUser,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.storage.list_doctors().await?))
}

async fn get_doctor(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let id = parse_id(&id, "Invalid doctor ID")?;
    let doctor = state
        .storage
        .get_doctor(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Doctor not found"))?;
    Ok(Json(doctor))
}

async fn create_doctor(
    State(state): State<AppState>,
    _user: CurrentUser,
    Json(doctor): Json<NewDoctor>,
) -> ApiResult<impl IntoResponse> {
    require_text(&doctor.name, "Name")?;
    let created = state
        .storage
        .create_doctor(NewDoctor {
            name: doctor.name.trim().to_string(),
            ..doctor
        })
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub fn doctor_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_doctors).post(create_doctor))
        .route("/:id", get(get_doctor))
}
